// tests/common/mod.rs
//
// Aplicação completa sobre o store em memória, dirigida com `oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use fleet_backend::{
    build_router,
    config::{AppState, Config},
};

pub const ADMIN_PASSWORD: &str = "admin-senha";
pub const USER_PASSWORD: &str = "senha-123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    /// Token do SuperAdmin da plataforma
    pub super_token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let state = AppState::in_memory(Config::for_tests());
        state
            .operator_service
            .bootstrap(ADMIN_PASSWORD)
            .await
            .expect("bootstrap do store vazio");

        let router = build_router(state.clone());
        let mut app = Self {
            router,
            state,
            super_token: String::new(),
        };
        app.super_token = app.login("admin", ADMIN_PASSWORD).await;
        app
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        operator: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(operator_id) = operator {
            builder = builder.header("x-operator-id", operator_id.to_string());
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request válido"),
            None => builder.body(Body::empty()).expect("request válido"),
        };

        let response = self.router.clone().oneshot(request).await.expect("router não falha");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("corpo legível")
            .to_bytes();

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None, None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), None, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(token), None, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None, None).await
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login de {username}: {body}");
        body["token"].as_str().expect("token na resposta").to_string()
    }

    /// Operador novo (com o seu cargo Admin), criado pelo SuperAdmin.
    pub async fn create_operator(&self, name: &str, tax_id: &str) -> Uuid {
        let (status, body) = self
            .post("/api/operators", &self.super_token, json!({ "name": name, "taxId": tax_id }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        id_of(&body)
    }

    pub async fn create_role(&self, operator_id: Uuid, name: &str, permissions: &[&str]) -> Uuid {
        let (status, body) = self
            .post(
                "/api/roles",
                &self.super_token,
                json!({ "name": name, "operatorId": operator_id, "permissions": permissions }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        id_of(&body)
    }

    pub async fn admin_role(&self, operator_id: Uuid) -> Uuid {
        let (status, body) = self
            .send(Method::GET, "/api/roles", Some(&self.super_token), Some(operator_id), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body.as_array()
            .and_then(|roles| roles.iter().find(|r| r["name"] == "Admin"))
            .map(id_of)
            .expect("operador sem cargo Admin")
    }

    /// Cria o usuário no operador e devolve (id, token).
    pub async fn create_user(&self, operator_id: Uuid, role_id: Uuid, username: &str) -> (Uuid, String) {
        let (status, body) = self
            .post(
                "/api/users",
                &self.super_token,
                json!({
                    "username": username,
                    "email": format!("{username}@frota.cl"),
                    "password": USER_PASSWORD,
                    "roleId": role_id,
                    "operatorId": operator_id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let token = self.login(username, USER_PASSWORD).await;
        (id_of(&body), token)
    }

    /// Operador com um usuário Admin logado.
    pub async fn operator_with_admin(&self, name: &str, tax_id: &str, username: &str) -> (Uuid, String) {
        let operator_id = self.create_operator(name, tax_id).await;
        let role_id = self.admin_role(operator_id).await;
        let (_, token) = self.create_user(operator_id, role_id, username).await;
        (operator_id, token)
    }

    pub async fn create_driver(&self, token: &str, full_name: &str, rut: &str) -> Uuid {
        let (status, body) = self
            .post("/api/drivers", token, json!({ "fullName": full_name, "rut": rut }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        id_of(&body)
    }

    pub async fn create_vehicle(&self, token: &str, plate: &str) -> Uuid {
        let (status, body) = self
            .post("/api/vehicles", token, json!({ "plateNumber": plate, "brand": "Volvo" }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        id_of(&body)
    }
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .unwrap_or_else(|| panic!("resposta sem id: {value}"))
}

pub fn operation_body(number: &str, driver_id: Uuid, vehicle_id: Uuid) -> Value {
    json!({
        "operationNumber": number,
        "driverId": driver_id,
        "vehicleId": vehicle_id,
        "operationType": "Carga general",
        "origin": "Santiago",
        "destination": "Valparaíso",
        "scheduledStartDate": "2026-03-10T08:00:00Z",
        "scheduledEndDate": "2026-03-10T14:00:00Z",
        "distance": 120.5
    })
}
