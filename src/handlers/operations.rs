// src/handlers/operations.rs

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{
        error::{ApiError, AppError},
        pagination::{PageQuery, Paginated},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{
            PermOperationsAssign, PermOperationsCreate, PermOperationsDelete, PermOperationsImport,
            PermOperationsRead, PermOperationsUpdate, RequirePermission,
        },
        tenancy::TenantContext,
    },
    models::operations::{
        AssignDriverPayload, AssignmentFilter, BatchImportPayload, BatchImportResult, CreateOperationPayload,
        DriverVehicle, Operation, OperationFilter, UpdateOperationPayload, UpdateStatusPayload,
    },
    services::excel_service,
};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// =============================================================================
//  1. CRUD
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/operations",
    tag = "Operations",
    request_body = CreateOperationPayload,
    responses(
        (status = 201, description = "Operação criada e motorista atribuído ao veículo", body = Operation),
        (status = 400, description = "Referência inválida, inativa ou datas fora de ordem"),
        (status = 409, description = "Número de operação já usado no operador")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_operation(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperationsCreate>,
    Json(payload): Json<CreateOperationPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let operation = app_state
        .operation_service
        .create_operation(&user, &tenant.0, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(operation)))
}

#[utoipa::path(
    get,
    path = "/api/operations",
    tag = "Operations",
    params(OperationFilter, PageQuery),
    responses((status = 200, description = "Operações", body = Paginated<Operation>)),
    security(("api_jwt" = []))
)]
pub async fn list_operations(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperationsRead>,
    Query(filter): Query<OperationFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Operation>>, ApiError> {
    let operations = app_state
        .operation_service
        .list_operations(&tenant.0, &filter, &page)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(operations))
}

#[utoipa::path(
    get,
    path = "/api/operations/{id}",
    tag = "Operations",
    params(("id" = Uuid, Path, description = "ID da operação")),
    responses(
        (status = 200, description = "Operação", body = Operation),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_operation(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperationsRead>,
    Path(id): Path<Uuid>,
) -> Result<Json<Operation>, ApiError> {
    let operation = app_state
        .operation_service
        .get_operation(&tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(operation))
}

#[utoipa::path(
    patch,
    path = "/api/operations/{id}",
    tag = "Operations",
    request_body = UpdateOperationPayload,
    params(("id" = Uuid, Path, description = "ID da operação")),
    responses(
        (status = 200, description = "Operação atualizada", body = Operation),
        (status = 400, description = "A operação não está agendada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_operation(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperationsUpdate>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOperationPayload>,
) -> Result<Json<Operation>, ApiError> {
    let operation = app_state
        .operation_service
        .update_operation(&user, &tenant.0, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(operation))
}

#[utoipa::path(
    patch,
    path = "/api/operations/{id}/status",
    tag = "Operations",
    request_body = UpdateStatusPayload,
    params(("id" = Uuid, Path, description = "ID da operação")),
    responses(
        (status = 200, description = "Status alterado", body = Operation),
        (status = 400, description = "Transição não permitida")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_operation_status(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperationsUpdate>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<Json<Operation>, ApiError> {
    let operation = app_state
        .operation_service
        .update_status(&user, &tenant.0, id, payload.status)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(operation))
}

#[utoipa::path(
    delete,
    path = "/api/operations/{id}",
    tag = "Operations",
    params(("id" = Uuid, Path, description = "ID da operação")),
    responses(
        (status = 204, description = "Operação removida"),
        (status = 400, description = "Só agendadas ou canceladas")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_operation(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperationsDelete>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    app_state
        .operation_service
        .delete_operation(&user, &tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  2. ATRIBUIÇÕES MOTORISTA/VEÍCULO
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/operations/assignments",
    tag = "Operations",
    params(AssignmentFilter),
    responses((status = 200, description = "Atribuições", body = Vec<DriverVehicle>)),
    security(("api_jwt" = []))
)]
pub async fn list_assignments(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperationsRead>,
    Query(filter): Query<AssignmentFilter>,
) -> Result<Json<Vec<DriverVehicle>>, ApiError> {
    let assignments = app_state
        .operation_service
        .list_assignments(&tenant.0, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(assignments))
}

#[utoipa::path(
    post,
    path = "/api/operations/assignments",
    tag = "Operations",
    request_body = AssignDriverPayload,
    responses(
        (status = 201, description = "Motorista atribuído; a atribuição anterior é encerrada", body = DriverVehicle)
    ),
    security(("api_jwt" = []))
)]
pub async fn assign_driver(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperationsAssign>,
    Json(payload): Json<AssignDriverPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let assignment = app_state
        .operation_service
        .assign_driver(&user, &tenant.0, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    delete,
    path = "/api/operations/assignments/{id}",
    tag = "Operations",
    params(("id" = Uuid, Path, description = "ID da atribuição")),
    responses((status = 200, description = "Atribuição encerrada", body = DriverVehicle)),
    security(("api_jwt" = []))
)]
pub async fn unassign_driver(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperationsAssign>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverVehicle>, ApiError> {
    let assignment = app_state
        .operation_service
        .unassign(&user, &tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(assignment))
}

// =============================================================================
//  3. IMPORTAÇÃO EM LOTE
// =============================================================================

/// Formulário do upload, só para a documentação.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub operator_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/operations/batch-template",
    tag = "Operations",
    responses((status = 200, description = "Planilha modelo (.xlsx, plantilla_operaciones.xlsx)")),
    security(("api_jwt" = []))
)]
pub async fn download_batch_template(
    locale: Locale,
    _guard: RequirePermission<PermOperationsImport>,
) -> Result<Response, ApiError> {
    let bytes = excel_service::generate_template().map_err(|e| e.to_api_error(&locale))?;

    let headers = [
        (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"plantilla_operaciones.xlsx\"".to_string(),
        ),
    ];

    Ok((headers, bytes).into_response())
}

#[utoipa::path(
    post,
    path = "/api/operations/batch-upload",
    tag = "Operations",
    request_body(content = BatchUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Resultado por linha; falhas não impedem as demais", body = BatchImportResult),
        (status = 400, description = "Arquivo ausente ou planilha ilegível")
    ),
    security(("api_jwt" = []))
)]
pub async fn upload_batch(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperationsImport>,
    mut multipart: Multipart,
) -> Result<Json<BatchImportResult>, ApiError> {
    let mut file: Option<Vec<u8>> = None;
    let mut requested_operator: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Formulário inválido: {}", e)).to_api_error(&locale))?
    {
        match field.name() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request(format!("Falha ao ler o arquivo: {}", e)).to_api_error(&locale))?;
                file = Some(bytes.to_vec());
            }
            Some("operatorId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(format!("Formulário inválido: {}", e)).to_api_error(&locale))?;
                if !text.trim().is_empty() {
                    let id = Uuid::parse_str(text.trim())
                        .map_err(|_| AppError::bad_request("operatorId inválido.").to_api_error(&locale))?;
                    requested_operator = Some(id);
                }
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::bad_request("Envie a planilha no campo 'file'.").to_api_error(&locale))?;
    let operator_id = tenant
        .0
        .target_operator(requested_operator)
        .map_err(|e| e.to_api_error(&locale))?;

    let result = app_state
        .import_service
        .import_workbook(Some(&user), operator_id, &file)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    tracing::info!(
        "Importação no operador {}: {} ok, {} com erro",
        operator_id,
        result.success_count,
        result.error_count
    );
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/api/operations/batch",
    tag = "Operations",
    request_body = BatchImportPayload,
    responses((status = 200, description = "Resultado por linha", body = BatchImportResult)),
    security(("api_jwt" = []))
)]
pub async fn import_batch(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperationsImport>,
    Json(payload): Json<BatchImportPayload>,
) -> Result<Json<BatchImportResult>, ApiError> {
    let operator_id = tenant
        .0
        .target_operator(payload.operator_id)
        .map_err(|e| e.to_api_error(&locale))?;

    let result = app_state
        .import_service
        .import_raw(Some(&user), operator_id, payload.rows)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(result))
}

// =============================================================================
//  4. RELATÓRIO PDF
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/operations/{id}/report",
    tag = "Operations",
    params(("id" = Uuid, Path, description = "ID da operação")),
    responses(
        (status = 200, description = "Relatório da operação (application/pdf)"),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn operation_report(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    _guard: RequirePermission<PermOperationsRead>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (number, pdf_bytes) = app_state
        .document_service
        .operation_report(&tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"operacion_{}.pdf\"", number),
        ),
    ];

    Ok((headers, pdf_bytes).into_response())
}
