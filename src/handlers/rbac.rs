// src/handlers/rbac.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermRolesCreate, PermRolesDelete, PermRolesRead, PermRolesUpdate, RequirePermission},
        tenancy::TenantContext,
    },
    models::rbac::{CreateRolePayload, Grant, RoleSummary, UpdateRolePayload},
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleUserCount {
    pub role_id: Uuid,
    pub user_count: i64,
}

#[utoipa::path(
    post,
    path = "/api/roles",
    tag = "RBAC",
    request_body = CreateRolePayload,
    responses(
        (status = 201, description = "Cargo criado", body = RoleSummary),
        (status = 400, description = "Permissão em formato inválido"),
        (status = 409, description = "Já existe um cargo com esse nome")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_role(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesCreate>,
    Json(payload): Json<CreateRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let role = app_state
        .rbac_service
        .create_role(&user, &tenant.0, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path = "/api/roles",
    tag = "RBAC",
    responses(
        (status = 200, description = "Cargos do operador", body = Vec<RoleSummary>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_roles(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesRead>,
) -> Result<Json<Vec<RoleSummary>>, ApiError> {
    let roles = app_state
        .rbac_service
        .list_roles(&tenant.0)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(roles))
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "ID do cargo")),
    responses(
        (status = 200, description = "Cargo", body = RoleSummary),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_role(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesRead>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoleSummary>, ApiError> {
    let role = app_state
        .rbac_service
        .get_role(&tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(role))
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}/users/count",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "ID do cargo")),
    responses(
        (status = 200, description = "Quantidade de usuários no cargo", body = RoleUserCount)
    ),
    security(("api_jwt" = []))
)]
pub async fn count_role_users(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesRead>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoleUserCount>, ApiError> {
    let user_count = app_state
        .rbac_service
        .user_count_by_role_id(&tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(RoleUserCount { role_id: id, user_count }))
}

#[utoipa::path(
    patch,
    path = "/api/roles/{id}",
    tag = "RBAC",
    request_body = UpdateRolePayload,
    params(("id" = Uuid, Path, description = "ID do cargo")),
    responses(
        (status = 200, description = "Cargo atualizado (permissões substituídas)", body = RoleSummary),
        (status = 400, description = "Permissão inválida ou cargo de sistema")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_role(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesUpdate>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRolePayload>,
) -> Result<Json<RoleSummary>, ApiError> {
    let role = app_state
        .rbac_service
        .update_role(&user, &tenant.0, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(role))
}

#[utoipa::path(
    delete,
    path = "/api/roles/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "ID do cargo")),
    responses(
        (status = 204, description = "Cargo removido"),
        (status = 409, description = "O cargo possui usuários")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_role(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermRolesDelete>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    app_state
        .rbac_service
        .delete_role(&user, &tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/roles/grants",
    tag = "RBAC",
    responses(
        (status = 200, description = "Permissões conhecidas (recurso, ação)", body = Vec<Grant>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_grants(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequirePermission<PermRolesRead>,
) -> Result<Json<Vec<Grant>>, ApiError> {
    let grants = app_state
        .rbac_service
        .list_grants()
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(grants))
}
