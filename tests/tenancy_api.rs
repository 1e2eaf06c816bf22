// tests/tenancy_api.rs

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{operation_body, TestApp};

#[tokio::test]
async fn records_of_another_operator_are_not_found() {
    let app = TestApp::new().await;
    let (_, token_a) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;
    let (_, token_b) = app
        .operator_with_admin("Transportes Norte", "76.222.222-2", "admin-norte")
        .await;

    let driver_b = app.create_driver(&token_b, "Pedro Soto", "9.876.543-2").await;
    let truck_b = app.create_vehicle(&token_b, "ZZXX99").await;
    let (_, operation_b) = app
        .post("/api/operations", &token_b, operation_body("OP-1", driver_b, truck_b))
        .await;

    let (status, _) = app.get(&format!("/api/drivers/{driver_b}"), &token_a).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .patch(&format!("/api/vehicles/{truck_b}"), &token_a, json!({ "brand": "Scania" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let operation_id = operation_b["id"].as_str().unwrap();
    let (status, _) = app.get(&format!("/api/operations/{operation_id}/report"), &token_a).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/drivers", &token_a).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn asking_for_another_operator_is_forbidden() {
    let app = TestApp::new().await;
    let (_, token_a) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;
    let operator_b = app.create_operator("Transportes Norte", "76.222.222-2").await;

    let (status, body) = app
        .send(Method::GET, "/api/drivers", Some(&token_a), Some(operator_b), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = app
        .get(&format!("/api/drivers?operatorId={operator_b}"), &token_a)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/api/drivers",
            &token_a,
            json!({ "fullName": "Juan Pérez", "rut": "12.345.678-9", "operatorId": operator_b }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn super_user_can_narrow_to_one_operator() {
    let app = TestApp::new().await;
    let (operator_a, token_a) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;
    let (_, token_b) = app
        .operator_with_admin("Transportes Norte", "76.222.222-2", "admin-norte")
        .await;
    app.create_driver(&token_a, "Juan Pérez", "12.345.678-9").await;
    app.create_driver(&token_b, "Pedro Soto", "9.876.543-2").await;

    let (_, all) = app.get("/api/drivers", &app.super_token).await;
    assert_eq!(all["total"], 2);

    let (status, only_a) = app
        .send(Method::GET, "/api/drivers", Some(&app.super_token), Some(operator_a), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(only_a["total"], 1);
    assert_eq!(only_a["data"][0]["operatorId"], json!(operator_a));
}

#[tokio::test]
async fn same_rut_is_allowed_in_different_operators() {
    let app = TestApp::new().await;
    let (_, token_a) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;
    let (_, token_b) = app
        .operator_with_admin("Transportes Norte", "76.222.222-2", "admin-norte")
        .await;

    app.create_driver(&token_a, "Juan Pérez", "12.345.678-9").await;
    app.create_driver(&token_b, "Juan Pérez", "12.345.678-9").await;

    let (status, _) = app
        .post("/api/drivers", &token_a, json!({ "fullName": "Otro", "rut": "12.345.678-9" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn only_platform_users_create_operators() {
    let app = TestApp::new().await;
    let (_, token_a) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;

    let (status, _) = app
        .post("/api/operators", &token_a, json!({ "name": "Pirata", "taxId": "76.333.333-3" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/api/operators", &token_a).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}
