// src/lib.rs

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

/// Monta o router completo: `/api` (público + protegido), Swagger, CORS e trace.
pub fn build_router(app_state: AppState) -> Router {
    let operator_routes = Router::new()
        .route(
            "/",
            post(handlers::operators::create_operator).get(handlers::operators::list_operators),
        )
        .route(
            "/{id}",
            get(handlers::operators::get_operator)
                .patch(handlers::operators::update_operator)
                .delete(handlers::operators::delete_operator),
        );

    let user_routes = Router::new()
        .route("/", post(handlers::users::create_user).get(handlers::users::list_users))
        .route(
            "/{id}",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        );

    let role_routes = Router::new()
        .route("/", post(handlers::rbac::create_role).get(handlers::rbac::list_roles))
        .route("/grants", get(handlers::rbac::list_grants))
        .route(
            "/{id}",
            get(handlers::rbac::get_role)
                .patch(handlers::rbac::update_role)
                .delete(handlers::rbac::delete_role),
        )
        .route("/{id}/users/count", get(handlers::rbac::count_role_users));

    let driver_routes = Router::new()
        .route("/", post(handlers::fleet::create_driver).get(handlers::fleet::list_drivers))
        .route(
            "/{id}",
            get(handlers::fleet::get_driver)
                .patch(handlers::fleet::update_driver)
                .delete(handlers::fleet::delete_driver),
        );

    // Servido em /vehicles e no alias legado /trucks
    let vehicle_routes = Router::new()
        .route("/", post(handlers::fleet::create_vehicle).get(handlers::fleet::list_vehicles))
        .route(
            "/{id}",
            get(handlers::fleet::get_vehicle)
                .patch(handlers::fleet::update_vehicle)
                .delete(handlers::fleet::delete_vehicle),
        );

    let client_routes = Router::new()
        .route("/", post(handlers::fleet::create_client).get(handlers::fleet::list_clients))
        .route(
            "/{id}",
            get(handlers::fleet::get_client)
                .patch(handlers::fleet::update_client)
                .delete(handlers::fleet::delete_client),
        );

    let provider_routes = Router::new()
        .route("/", post(handlers::fleet::create_provider).get(handlers::fleet::list_providers))
        .route(
            "/{id}",
            get(handlers::fleet::get_provider)
                .patch(handlers::fleet::update_provider)
                .delete(handlers::fleet::delete_provider),
        );

    let route_routes = Router::new()
        .route("/", post(handlers::fleet::create_route).get(handlers::fleet::list_routes))
        .route(
            "/{id}",
            get(handlers::fleet::get_route)
                .patch(handlers::fleet::update_route)
                .delete(handlers::fleet::delete_route),
        );

    let operation_routes = Router::new()
        .route(
            "/",
            post(handlers::operations::create_operation).get(handlers::operations::list_operations),
        )
        .route(
            "/assignments",
            get(handlers::operations::list_assignments).post(handlers::operations::assign_driver),
        )
        .route("/assignments/{id}", delete(handlers::operations::unassign_driver))
        .route("/batch-template", get(handlers::operations::download_batch_template))
        .route("/batch-upload", post(handlers::operations::upload_batch))
        .route("/batch", post(handlers::operations::import_batch))
        .route(
            "/{id}",
            get(handlers::operations::get_operation)
                .patch(handlers::operations::update_operation)
                .delete(handlers::operations::delete_operation),
        )
        .route("/{id}/status", patch(handlers::operations::update_operation_status))
        .route("/{id}/report", get(handlers::operations::operation_report));

    // Tudo abaixo exige Bearer válido
    let protected = Router::new()
        .route("/auth/me", get(handlers::auth::get_me))
        .nest("/operators", operator_routes)
        .nest("/users", user_routes)
        .nest("/roles", role_routes)
        .route("/audit", get(handlers::audit::list_audit))
        .nest("/drivers", driver_routes)
        .nest("/vehicles", vehicle_routes.clone())
        .nest("/trucks", vehicle_routes)
        .nest("/clients", client_routes)
        .nest("/providers", provider_routes)
        .nest("/routes", route_routes)
        .nest("/operations", operation_routes)
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let api = Router::new()
        .route("/health", get(|| async { "OK" }))
        // Públicas
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .merge(protected);

    Router::new()
        .nest("/api", api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(&app_state.config.frontend_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

fn cors_layer(frontend_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT_LANGUAGE,
            header::HeaderName::from_static("x-operator-id"),
        ]);

    match frontend_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!("FRONTEND_ORIGIN inválido ('{}'); CORS sem origem liberada", frontend_origin);
            layer
        }
    }
}
