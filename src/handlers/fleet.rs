// src/handlers/fleet.rs
//
// Cadastros de frota. Clientes e fornecedores compartilham a implementação;
// muda só o `PartnerKind` e a permissão exigida.

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
        rbac::{
            PermClientsCreate, PermClientsDelete, PermClientsRead, PermClientsUpdate, PermDriversCreate,
            PermDriversDelete, PermDriversRead, PermDriversUpdate, PermProvidersCreate, PermProvidersDelete,
            PermProvidersRead, PermProvidersUpdate, PermRoutesCreate, PermRoutesDelete, PermRoutesRead,
            PermRoutesUpdate, PermVehiclesCreate, PermVehiclesDelete, PermVehiclesRead, PermVehiclesUpdate,
            RequirePermission,
        },
        tenancy::TenantContext,
    },
    models::fleet::{
        CatalogFilter, CreateDriverPayload, CreatePartnerPayload, CreateRoutePayload, CreateVehiclePayload,
        DeleteResponse, Driver, Partner, PartnerKind, Route, UpdateDriverPayload, UpdatePartnerPayload,
        UpdateRoutePayload, UpdateVehiclePayload, Vehicle,
    },
};

// =============================================================================
//  MOTORISTAS
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/drivers",
    tag = "Drivers",
    request_body = CreateDriverPayload,
    responses(
        (status = 201, description = "Motorista criado", body = Driver),
        (status = 409, description = "RUT já cadastrado no operador")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_driver(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermDriversCreate>,
    Json(payload): Json<CreateDriverPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let driver = app_state
        .fleet_service
        .create_driver(&user, &tenant.0, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(driver)))
}

#[utoipa::path(
    get,
    path = "/api/drivers",
    tag = "Drivers",
    params(CatalogFilter, PageQuery),
    responses((status = 200, description = "Motoristas", body = Paginated<Driver>)),
    security(("api_jwt" = []))
)]
pub async fn list_drivers(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermDriversRead>,
    Query(filter): Query<CatalogFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Driver>>, ApiError> {
    let drivers = app_state
        .fleet_service
        .list_drivers(&tenant.0, &filter, &page)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(drivers))
}

#[utoipa::path(
    get,
    path = "/api/drivers/{id}",
    tag = "Drivers",
    params(("id" = Uuid, Path, description = "ID do motorista")),
    responses((status = 200, description = "Motorista", body = Driver)),
    security(("api_jwt" = []))
)]
pub async fn get_driver(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermDriversRead>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, ApiError> {
    let driver = app_state
        .fleet_service
        .get_driver(&tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(driver))
}

#[utoipa::path(
    patch,
    path = "/api/drivers/{id}",
    tag = "Drivers",
    request_body = UpdateDriverPayload,
    params(("id" = Uuid, Path, description = "ID do motorista")),
    responses((status = 200, description = "Motorista atualizado", body = Driver)),
    security(("api_jwt" = []))
)]
pub async fn update_driver(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermDriversUpdate>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDriverPayload>,
) -> Result<Json<Driver>, ApiError> {
    let driver = app_state
        .fleet_service
        .update_driver(&user, &tenant.0, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(driver))
}

#[utoipa::path(
    delete,
    path = "/api/drivers/{id}",
    tag = "Drivers",
    params(("id" = Uuid, Path, description = "ID do motorista")),
    responses(
        (status = 200, description = "Removido ou desativado (possui histórico)", body = DeleteResponse),
        (status = 400, description = "Possui operações em aberto")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_driver(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermDriversDelete>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let outcome = app_state
        .fleet_service
        .delete_driver(&user, &tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(DeleteResponse { outcome }))
}

// =============================================================================
//  VEÍCULOS (também servidos em /trucks)
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/vehicles",
    tag = "Vehicles",
    request_body = CreateVehiclePayload,
    responses(
        (status = 201, description = "Veículo criado", body = Vehicle),
        (status = 409, description = "Patente já cadastrada no operador")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_vehicle(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermVehiclesCreate>,
    Json(payload): Json<CreateVehiclePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let vehicle = app_state
        .fleet_service
        .create_vehicle(&user, &tenant.0, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(vehicle)))
}

#[utoipa::path(
    get,
    path = "/api/vehicles",
    tag = "Vehicles",
    params(CatalogFilter, PageQuery),
    responses((status = 200, description = "Veículos", body = Paginated<Vehicle>)),
    security(("api_jwt" = []))
)]
pub async fn list_vehicles(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermVehiclesRead>,
    Query(filter): Query<CatalogFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Vehicle>>, ApiError> {
    let vehicles = app_state
        .fleet_service
        .list_vehicles(&tenant.0, &filter, &page)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(vehicles))
}

#[utoipa::path(
    get,
    path = "/api/vehicles/{id}",
    tag = "Vehicles",
    params(("id" = Uuid, Path, description = "ID do veículo")),
    responses((status = 200, description = "Veículo", body = Vehicle)),
    security(("api_jwt" = []))
)]
pub async fn get_vehicle(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermVehiclesRead>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vehicle>, ApiError> {
    let vehicle = app_state
        .fleet_service
        .get_vehicle(&tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(vehicle))
}

#[utoipa::path(
    patch,
    path = "/api/vehicles/{id}",
    tag = "Vehicles",
    request_body = UpdateVehiclePayload,
    params(("id" = Uuid, Path, description = "ID do veículo")),
    responses((status = 200, description = "Veículo atualizado", body = Vehicle)),
    security(("api_jwt" = []))
)]
pub async fn update_vehicle(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermVehiclesUpdate>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVehiclePayload>,
) -> Result<Json<Vehicle>, ApiError> {
    let vehicle = app_state
        .fleet_service
        .update_vehicle(&user, &tenant.0, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(vehicle))
}

#[utoipa::path(
    delete,
    path = "/api/vehicles/{id}",
    tag = "Vehicles",
    params(("id" = Uuid, Path, description = "ID do veículo")),
    responses(
        (status = 200, description = "Removido ou desativado (possui histórico)", body = DeleteResponse),
        (status = 400, description = "Possui operações em aberto")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_vehicle(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermVehiclesDelete>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let outcome = app_state
        .fleet_service
        .delete_vehicle(&user, &tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(DeleteResponse { outcome }))
}

// =============================================================================
//  CLIENTES E FORNECEDORES
// =============================================================================

async fn create_partner(
    app_state: &AppState,
    locale: &Locale,
    user: &AuthenticatedUser,
    tenant: &TenantContext,
    kind: PartnerKind,
    payload: CreatePartnerPayload,
) -> Result<(StatusCode, Json<Partner>), ApiError> {
    let partner = app_state
        .fleet_service
        .create_partner(&user.0, &tenant.0, kind, payload)
        .await
        .map_err(|e| e.to_api_error(locale))?;

    Ok((StatusCode::CREATED, Json(partner)))
}

async fn list_partners(
    app_state: &AppState,
    locale: &Locale,
    tenant: &TenantContext,
    kind: PartnerKind,
    filter: &CatalogFilter,
    page: &PageQuery,
) -> Result<Json<Paginated<Partner>>, ApiError> {
    let partners = app_state
        .fleet_service
        .list_partners(kind, &tenant.0, filter, page)
        .await
        .map_err(|e| e.to_api_error(locale))?;

    Ok(Json(partners))
}

async fn get_partner(
    app_state: &AppState,
    locale: &Locale,
    tenant: &TenantContext,
    kind: PartnerKind,
    id: Uuid,
) -> Result<Json<Partner>, ApiError> {
    let partner = app_state
        .fleet_service
        .get_partner(kind, &tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(locale))?;

    Ok(Json(partner))
}

async fn update_partner(
    app_state: &AppState,
    locale: &Locale,
    user: &AuthenticatedUser,
    tenant: &TenantContext,
    kind: PartnerKind,
    id: Uuid,
    payload: UpdatePartnerPayload,
) -> Result<Json<Partner>, ApiError> {
    let partner = app_state
        .fleet_service
        .update_partner(&user.0, &tenant.0, kind, id, payload)
        .await
        .map_err(|e| e.to_api_error(locale))?;

    Ok(Json(partner))
}

async fn delete_partner(
    app_state: &AppState,
    locale: &Locale,
    user: &AuthenticatedUser,
    tenant: &TenantContext,
    kind: PartnerKind,
    id: Uuid,
) -> Result<Json<DeleteResponse>, ApiError> {
    let outcome = app_state
        .fleet_service
        .delete_partner(&user.0, &tenant.0, kind, id)
        .await
        .map_err(|e| e.to_api_error(locale))?;

    Ok(Json(DeleteResponse { outcome }))
}

#[utoipa::path(
    post,
    path = "/api/clients",
    tag = "Clients",
    request_body = CreatePartnerPayload,
    responses(
        (status = 201, description = "Cliente criado", body = Partner),
        (status = 409, description = "RUT já cadastrado no operador")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_client(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermClientsCreate>,
    Json(payload): Json<CreatePartnerPayload>,
) -> Result<impl IntoResponse, ApiError> {
    create_partner(&app_state, &locale, &user, &tenant, PartnerKind::Client, payload).await
}

#[utoipa::path(
    get,
    path = "/api/clients",
    tag = "Clients",
    params(CatalogFilter, PageQuery),
    responses((status = 200, description = "Clientes", body = Paginated<Partner>)),
    security(("api_jwt" = []))
)]
pub async fn list_clients(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermClientsRead>,
    Query(filter): Query<CatalogFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Partner>>, ApiError> {
    list_partners(&app_state, &locale, &tenant, PartnerKind::Client, &filter, &page).await
}

#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses((status = 200, description = "Cliente", body = Partner)),
    security(("api_jwt" = []))
)]
pub async fn get_client(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermClientsRead>,
    Path(id): Path<Uuid>,
) -> Result<Json<Partner>, ApiError> {
    get_partner(&app_state, &locale, &tenant, PartnerKind::Client, id).await
}

#[utoipa::path(
    patch,
    path = "/api/clients/{id}",
    tag = "Clients",
    request_body = UpdatePartnerPayload,
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses((status = 200, description = "Cliente atualizado", body = Partner)),
    security(("api_jwt" = []))
)]
pub async fn update_client(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermClientsUpdate>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePartnerPayload>,
) -> Result<Json<Partner>, ApiError> {
    update_partner(&app_state, &locale, &user, &tenant, PartnerKind::Client, id, payload).await
}

#[utoipa::path(
    delete,
    path = "/api/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses((status = 200, description = "Removido ou desativado", body = DeleteResponse)),
    security(("api_jwt" = []))
)]
pub async fn delete_client(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermClientsDelete>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    delete_partner(&app_state, &locale, &user, &tenant, PartnerKind::Client, id).await
}

#[utoipa::path(
    post,
    path = "/api/providers",
    tag = "Providers",
    request_body = CreatePartnerPayload,
    responses(
        (status = 201, description = "Fornecedor criado", body = Partner),
        (status = 409, description = "RUT já cadastrado no operador")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_provider(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermProvidersCreate>,
    Json(payload): Json<CreatePartnerPayload>,
) -> Result<impl IntoResponse, ApiError> {
    create_partner(&app_state, &locale, &user, &tenant, PartnerKind::Provider, payload).await
}

#[utoipa::path(
    get,
    path = "/api/providers",
    tag = "Providers",
    params(CatalogFilter, PageQuery),
    responses((status = 200, description = "Fornecedores", body = Paginated<Partner>)),
    security(("api_jwt" = []))
)]
pub async fn list_providers(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermProvidersRead>,
    Query(filter): Query<CatalogFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Partner>>, ApiError> {
    list_partners(&app_state, &locale, &tenant, PartnerKind::Provider, &filter, &page).await
}

#[utoipa::path(
    get,
    path = "/api/providers/{id}",
    tag = "Providers",
    params(("id" = Uuid, Path, description = "ID do fornecedor")),
    responses((status = 200, description = "Fornecedor", body = Partner)),
    security(("api_jwt" = []))
)]
pub async fn get_provider(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermProvidersRead>,
    Path(id): Path<Uuid>,
) -> Result<Json<Partner>, ApiError> {
    get_partner(&app_state, &locale, &tenant, PartnerKind::Provider, id).await
}

#[utoipa::path(
    patch,
    path = "/api/providers/{id}",
    tag = "Providers",
    request_body = UpdatePartnerPayload,
    params(("id" = Uuid, Path, description = "ID do fornecedor")),
    responses((status = 200, description = "Fornecedor atualizado", body = Partner)),
    security(("api_jwt" = []))
)]
pub async fn update_provider(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermProvidersUpdate>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePartnerPayload>,
) -> Result<Json<Partner>, ApiError> {
    update_partner(&app_state, &locale, &user, &tenant, PartnerKind::Provider, id, payload).await
}

#[utoipa::path(
    delete,
    path = "/api/providers/{id}",
    tag = "Providers",
    params(("id" = Uuid, Path, description = "ID do fornecedor")),
    responses((status = 200, description = "Removido ou desativado", body = DeleteResponse)),
    security(("api_jwt" = []))
)]
pub async fn delete_provider(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermProvidersDelete>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    delete_partner(&app_state, &locale, &user, &tenant, PartnerKind::Provider, id).await
}

// =============================================================================
//  ROTAS
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/routes",
    tag = "Routes",
    request_body = CreateRoutePayload,
    responses(
        (status = 201, description = "Rota criada", body = Route),
        (status = 409, description = "Código já cadastrado no operador")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_route(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermRoutesCreate>,
    Json(payload): Json<CreateRoutePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let route = app_state
        .fleet_service
        .create_route(&user, &tenant.0, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(route)))
}

#[utoipa::path(
    get,
    path = "/api/routes",
    tag = "Routes",
    params(CatalogFilter, PageQuery),
    responses((status = 200, description = "Rotas", body = Paginated<Route>)),
    security(("api_jwt" = []))
)]
pub async fn list_routes(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermRoutesRead>,
    Query(filter): Query<CatalogFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Route>>, ApiError> {
    let routes = app_state
        .fleet_service
        .list_routes(&tenant.0, &filter, &page)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(routes))
}

#[utoipa::path(
    get,
    path = "/api/routes/{id}",
    tag = "Routes",
    params(("id" = Uuid, Path, description = "ID da rota")),
    responses((status = 200, description = "Rota", body = Route)),
    security(("api_jwt" = []))
)]
pub async fn get_route(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermRoutesRead>,
    Path(id): Path<Uuid>,
) -> Result<Json<Route>, ApiError> {
    let route = app_state
        .fleet_service
        .get_route(&tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(route))
}

#[utoipa::path(
    patch,
    path = "/api/routes/{id}",
    tag = "Routes",
    request_body = UpdateRoutePayload,
    params(("id" = Uuid, Path, description = "ID da rota")),
    responses((status = 200, description = "Rota atualizada", body = Route)),
    security(("api_jwt" = []))
)]
pub async fn update_route(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermRoutesUpdate>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoutePayload>,
) -> Result<Json<Route>, ApiError> {
    let route = app_state
        .fleet_service
        .update_route(&user, &tenant.0, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(route))
}

#[utoipa::path(
    delete,
    path = "/api/routes/{id}",
    tag = "Routes",
    params(("id" = Uuid, Path, description = "ID da rota")),
    responses(
        (status = 200, description = "Removida ou desativada (possui histórico)", body = DeleteResponse),
        (status = 400, description = "Possui operações em aberto")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_route(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermRoutesDelete>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let outcome = app_state
        .fleet_service
        .delete_route(&user, &tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(DeleteResponse { outcome }))
}
