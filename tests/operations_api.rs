// tests/operations_api.rs

mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{id_of, operation_body, TestApp};

#[tokio::test]
async fn reassigning_a_driver_closes_the_previous_assignment() {
    let app = TestApp::new().await;
    let (_, token) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;
    let driver = app.create_driver(&token, "Juan Pérez", "12.345.678-9").await;
    let truck_1 = app.create_vehicle(&token, "ABCD12").await;
    let truck_2 = app.create_vehicle(&token, "EFGH34").await;

    for vehicle in [truck_1, truck_2] {
        let (status, body) = app
            .post(
                "/api/operations/assignments",
                &token,
                json!({ "driverId": driver, "vehicleId": vehicle }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (status, body) = app
        .get(
            &format!("/api/operations/assignments?driverId={driver}&activeOnly=false"),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    let active: Vec<&Value> = rows.iter().filter(|r| r["isActive"] == true).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["vehicleId"], json!(truck_2));

    let closed = rows.iter().find(|r| r["vehicleId"] == json!(truck_1)).unwrap();
    assert_eq!(closed["isActive"], false);
    assert!(!closed["unassignedAt"].is_null());
}

#[tokio::test]
async fn operation_numbers_are_unique_per_operator_only() {
    let app = TestApp::new().await;
    let (_, token_a) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;
    let (_, token_b) = app
        .operator_with_admin("Transportes Norte", "76.222.222-2", "admin-norte")
        .await;

    let driver_a = app.create_driver(&token_a, "Juan Pérez", "12.345.678-9").await;
    let truck_a = app.create_vehicle(&token_a, "ABCD12").await;
    let driver_b = app.create_driver(&token_b, "Pedro Soto", "9.876.543-2").await;
    let truck_b = app.create_vehicle(&token_b, "ZZXX99").await;

    let (status, body) = app
        .post("/api/operations", &token_a, operation_body("OP-100", driver_a, truck_a))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "scheduled");

    let (status, body) = app
        .post("/api/operations", &token_b, operation_body("OP-100", driver_b, truck_b))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, body) = app
        .post("/api/operations", &token_a, operation_body("OP-100", driver_a, truck_a))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
async fn batch_import_reports_partial_success() {
    let app = TestApp::new().await;
    let (_, token) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;
    app.create_driver(&token, "Juan Pérez", "12.345.678-9").await;
    app.create_vehicle(&token, "ABCD12").await;

    let row = |number: &str, rut: &str| {
        json!({
            "operationNumber": number,
            "scheduledStartDate": "2026-03-10 08:00",
            "driverRut": rut,
            "vehiclePlateNumber": "ABCD12",
            "operationType": "Carga general",
            "origin": "Santiago",
            "destination": "Valparaíso",
            "clientName": ""
        })
    };

    let (status, body) = app
        .post(
            "/api/operations/batch",
            &token,
            json!({
                "rows": [
                    row("OP-1", "12.345.678-9"),
                    row("OP-2", "99.999.999-9"),
                    row("OP-1", "12.345.678-9"),
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    assert_eq!(body["success"], false);
    assert_eq!(body["totalRows"], 3);
    assert_eq!(body["successCount"], 1);
    assert_eq!(body["errorCount"], 2);
    assert_eq!(body["createdOperations"].as_array().unwrap().len(), 1);
    assert_eq!(body["duplicates"], json!(["OP-1"]));

    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["field"], "driverRut");
    assert_eq!(errors[0]["value"], "99.999.999-9");
    assert_eq!(errors[1]["field"], "operationNumber");

    let (_, listed) = app.get("/api/operations", &token).await;
    assert_eq!(listed["total"], 1);
}

#[tokio::test]
async fn batch_import_for_another_operator_is_forbidden() {
    let app = TestApp::new().await;
    let (_, token) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;
    let other = app.create_operator("Transportes Norte", "76.222.222-2").await;

    let (status, _) = app
        .post("/api/operations/batch", &token, json!({ "operatorId": other, "rows": [] }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn status_follows_the_lifecycle() {
    let app = TestApp::new().await;
    let (_, token) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;
    let driver = app.create_driver(&token, "Juan Pérez", "12.345.678-9").await;
    let truck = app.create_vehicle(&token, "ABCD12").await;
    let (_, created) = app
        .post("/api/operations", &token, operation_body("OP-7", driver, truck))
        .await;
    let id = id_of(&created);
    let status_uri = format!("/api/operations/{id}/status");

    let (status, _) = app.patch(&status_uri, &token, json!({ "status": "completed" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.patch(&status_uri, &token, json!({ "status": "in-progress" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(!body["actualStartDate"].is_null());

    // Em andamento: nem edição nem remoção
    let (status, _) = app
        .patch(&format!("/api/operations/{id}"), &token, json!({ "origin": "Rancagua" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.delete(&format!("/api/operations/{id}"), &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.patch(&status_uri, &token, json!({ "status": "completed" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["actualEndDate"].is_null());
}

#[tokio::test]
async fn driver_with_history_is_deactivated_instead_of_deleted() {
    let app = TestApp::new().await;
    let (_, token) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;
    let driver = app.create_driver(&token, "Juan Pérez", "12.345.678-9").await;
    let truck = app.create_vehicle(&token, "ABCD12").await;
    let (_, created) = app
        .post("/api/operations", &token, operation_body("OP-9", driver, truck))
        .await;
    let operation_id = id_of(&created);

    // Operação aberta bloqueia
    let (status, _) = app.delete(&format!("/api/drivers/{driver}"), &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .patch(
            &format!("/api/operations/{operation_id}/status"),
            &token,
            json!({ "status": "cancelled" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.delete(&format!("/api/drivers/{driver}"), &token).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["outcome"], "deactivated");

    let (_, body) = app.get(&format!("/api/drivers/{driver}"), &token).await;
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn trucks_alias_serves_vehicles() {
    let app = TestApp::new().await;
    let (_, token) = app
        .operator_with_admin("Transportes Sur", "76.111.111-1", "admin-sur")
        .await;
    let truck = app.create_vehicle(&token, "ABCD12").await;

    let (status, body) = app.get(&format!("/api/trucks/{truck}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plateNumber"], "ABCD12");
}

#[tokio::test]
async fn batch_template_is_an_xlsx_download() {
    let app = TestApp::new().await;

    let response = app
        .send(Method::GET, "/api/operations/batch-template", Some(&app.super_token), None, None)
        .await;
    // O corpo não é JSON
    assert_eq!(response.0, StatusCode::OK);
    assert!(response.1.is_null());
}
