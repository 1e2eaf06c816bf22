// tests/rbac_api.rs

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{id_of, TestApp};

#[tokio::test]
async fn malformed_permission_keeps_the_previous_grants() {
    let app = TestApp::new().await;
    let operator_id = app.create_operator("Transportes Sur", "76.111.111-1").await;
    let role_id = app
        .create_role(operator_id, "Despachador", &["operations.read", "drivers.read"])
        .await;

    for bad in ["operations", ".read", "drivers.", ""] {
        let (status, body) = app
            .patch(
                &format!("/api/roles/{role_id}"),
                &app.super_token,
                json!({ "permissions": ["vehicles.read", bad] }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "'{bad}' deveria ser rejeitado: {body}");
    }

    let (status, body) = app.get(&format!("/api/roles/{role_id}"), &app.super_token).await;
    assert_eq!(status, StatusCode::OK);
    let mut permissions: Vec<&str> = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    permissions.sort();
    assert_eq!(permissions, vec!["drivers.read", "operations.read"]);
}

#[tokio::test]
async fn permission_update_replaces_the_whole_set() {
    let app = TestApp::new().await;
    let operator_id = app.create_operator("Transportes Sur", "76.111.111-1").await;
    let role_id = app.create_role(operator_id, "Despachador", &["operations.read"]).await;

    let (status, body) = app
        .patch(
            &format!("/api/roles/{role_id}"),
            &app.super_token,
            json!({ "permissions": ["drivers.read", "drivers.create"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let permissions = body["permissions"].as_array().unwrap();
    assert_eq!(permissions.len(), 2);
    assert!(!permissions.contains(&json!("operations.read")));
}

#[tokio::test]
async fn guards_follow_the_role_grants() {
    let app = TestApp::new().await;
    let operator_id = app.create_operator("Transportes Sur", "76.111.111-1").await;
    let role_id = app.create_role(operator_id, "Consulta", &["drivers.read"]).await;
    let (_, token) = app.create_user(operator_id, role_id, "consulta").await;

    let (status, _) = app.get("/api/drivers", &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/api/drivers", &token, json!({ "fullName": "Juan Pérez", "rut": "12.345.678-9" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = app.get("/api/operations", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Super passa em qualquer guarda
    let (status, _) = app.get("/api/operations", &app.super_token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/api/drivers", None, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = app.send(Method::GET, "/api/health", None, None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn role_with_users_cannot_be_deleted() {
    let app = TestApp::new().await;
    let operator_id = app.create_operator("Transportes Sur", "76.111.111-1").await;
    let role_id = app.create_role(operator_id, "Despachador", &["operations.read"]).await;
    let (user_id, _) = app.create_user(operator_id, role_id, "despacho").await;

    let (status, body) = app.get(&format!("/api/roles/{role_id}/users/count"), &app.super_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userCount"], 1);

    let (status, body) = app.delete(&format!("/api/roles/{role_id}"), &app.super_token).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, _) = app.delete(&format!("/api/users/{user_id}"), &app.super_token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.delete(&format!("/api/roles/{role_id}"), &app.super_token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/api/roles/{role_id}"), &app.super_token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn system_admin_role_cannot_be_deleted() {
    let app = TestApp::new().await;
    let operator_id = app.create_operator("Transportes Sur", "76.111.111-1").await;
    let admin_role = app.admin_role(operator_id).await;

    let (status, _) = app.delete(&format!("/api/roles/{admin_role}"), &app.super_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn role_list_is_isolated_per_operator() {
    let app = TestApp::new().await;
    let (operator_a, token_a) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;
    let operator_b = app.create_operator("Transportes Norte", "76.222.222-2").await;

    let role_a = app.create_role(operator_a, "Despachador", &["operations.read"]).await;
    let role_b = app.create_role(operator_b, "Despachador", &["drivers.read"]).await;

    let (status, body) = app.get("/api/roles", &token_a).await;
    assert_eq!(status, StatusCode::OK);
    let roles = body.as_array().unwrap();
    assert!(roles.iter().all(|r| r["operatorId"] == json!(operator_a)));
    assert!(roles.iter().any(|r| id_of(r) == role_a));
    assert!(!roles.iter().any(|r| id_of(r) == role_b));

    // O cargo do outro operador nem "existe" para A
    let (status, _) = app.get(&format!("/api/roles/{role_b}"), &token_a).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn grant_catalog_is_listed() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/roles/grants", &app.super_token).await;
    assert_eq!(status, StatusCode::OK);
    let grants = body.as_array().unwrap();
    assert!(grants
        .iter()
        .any(|g| g["resource"] == "operations" && g["action"] == "import"));
}
