// src/handlers/operators.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::{
        error::ApiError,
        pagination::{PageQuery, Paginated},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermOperatorsCreate, PermOperatorsDelete, PermOperatorsRead, PermOperatorsUpdate, RequirePermission},
        tenancy::TenantContext,
    },
    models::operator::{CreateOperatorPayload, Operator, UpdateOperatorPayload},
};

#[utoipa::path(
    post,
    path = "/api/operators",
    tag = "Operators",
    request_body = CreateOperatorPayload,
    responses(
        (status = 201, description = "Operador criado (com cargo Admin)", body = Operator),
        (status = 403, description = "Apenas usuários da plataforma")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_operator(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermOperatorsCreate>,
    Json(payload): Json<CreateOperatorPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let operator = app_state
        .operator_service
        .create_operator(&user, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(operator)))
}

#[utoipa::path(
    get,
    path = "/api/operators",
    tag = "Operators",
    params(PageQuery),
    responses(
        (status = 200, description = "Operadores visíveis ao usuário", body = Paginated<Operator>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_operators(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperatorsRead>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Operator>>, ApiError> {
    let operators = app_state
        .operator_service
        .list_operators(&tenant.0, &page)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(operators))
}

#[utoipa::path(
    get,
    path = "/api/operators/{id}",
    tag = "Operators",
    params(("id" = Uuid, Path, description = "ID do operador")),
    responses(
        (status = 200, description = "Operador", body = Operator),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_operator(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperatorsRead>,
    Path(id): Path<Uuid>,
) -> Result<Json<Operator>, ApiError> {
    let operator = app_state
        .operator_service
        .get_operator(&tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(operator))
}

#[utoipa::path(
    patch,
    path = "/api/operators/{id}",
    tag = "Operators",
    request_body = UpdateOperatorPayload,
    params(("id" = Uuid, Path, description = "ID do operador")),
    responses(
        (status = 200, description = "Operador atualizado", body = Operator)
    ),
    security(("api_jwt" = []))
)]
pub async fn update_operator(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperatorsUpdate>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOperatorPayload>,
) -> Result<Json<Operator>, ApiError> {
    let operator = app_state
        .operator_service
        .update_operator(&user, &tenant.0, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(operator))
}

#[utoipa::path(
    delete,
    path = "/api/operators/{id}",
    tag = "Operators",
    params(("id" = Uuid, Path, description = "ID do operador")),
    responses(
        (status = 204, description = "Operador removido"),
        (status = 400, description = "O operador ainda possui dependentes")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_operator(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequirePermission<PermOperatorsDelete>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    app_state
        .operator_service
        .delete_operator(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(StatusCode::NO_CONTENT)
}
