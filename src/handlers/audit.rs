// src/handlers/audit.rs

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    common::{
        error::ApiError,
        pagination::{PageQuery, Paginated},
    },
    config::AppState,
    middleware::{
        i18n::Locale,
        rbac::{PermAuditRead, RequirePermission},
        tenancy::TenantContext,
    },
    models::audit::{AuditFilter, AuditLog},
};

#[utoipa::path(
    get,
    path = "/api/audit",
    tag = "Audit",
    params(AuditFilter, PageQuery),
    responses(
        (status = 200, description = "Eventos de auditoria, mais recentes primeiro", body = Paginated<AuditLog>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_audit(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermAuditRead>,
    Query(filter): Query<AuditFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<AuditLog>>, ApiError> {
    let entries = app_state
        .audit_service
        .list(&tenant.0, &filter, &page)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(entries))
}
