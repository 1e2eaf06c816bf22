// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::get_me,

        // --- Operators ---
        handlers::operators::create_operator,
        handlers::operators::list_operators,
        handlers::operators::get_operator,
        handlers::operators::update_operator,
        handlers::operators::delete_operator,

        // --- Users ---
        handlers::users::create_user,
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::delete_user,

        // --- RBAC ---
        handlers::rbac::create_role,
        handlers::rbac::list_roles,
        handlers::rbac::get_role,
        handlers::rbac::count_role_users,
        handlers::rbac::update_role,
        handlers::rbac::delete_role,
        handlers::rbac::list_grants,

        // --- Audit ---
        handlers::audit::list_audit,

        // --- Frota ---
        handlers::fleet::create_driver,
        handlers::fleet::list_drivers,
        handlers::fleet::get_driver,
        handlers::fleet::update_driver,
        handlers::fleet::delete_driver,
        handlers::fleet::create_vehicle,
        handlers::fleet::list_vehicles,
        handlers::fleet::get_vehicle,
        handlers::fleet::update_vehicle,
        handlers::fleet::delete_vehicle,
        handlers::fleet::create_client,
        handlers::fleet::list_clients,
        handlers::fleet::get_client,
        handlers::fleet::update_client,
        handlers::fleet::delete_client,
        handlers::fleet::create_provider,
        handlers::fleet::list_providers,
        handlers::fleet::get_provider,
        handlers::fleet::update_provider,
        handlers::fleet::delete_provider,
        handlers::fleet::create_route,
        handlers::fleet::list_routes,
        handlers::fleet::get_route,
        handlers::fleet::update_route,
        handlers::fleet::delete_route,

        // --- OPERATIONS ---
        handlers::operations::create_operation,
        handlers::operations::list_operations,
        handlers::operations::get_operation,
        handlers::operations::update_operation,
        handlers::operations::update_operation_status,
        handlers::operations::delete_operation,
        handlers::operations::list_assignments,
        handlers::operations::assign_driver,
        handlers::operations::unassign_driver,
        handlers::operations::download_batch_template,
        handlers::operations::upload_batch,
        handlers::operations::import_batch,
        handlers::operations::operation_report,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::Principal,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,
            models::auth::CreateUserPayload,
            models::auth::UpdateUserPayload,

            // --- Operators ---
            models::operator::Operator,
            models::operator::CreateOperatorPayload,
            models::operator::UpdateOperatorPayload,

            // --- RBAC ---
            models::rbac::Grant,
            models::rbac::Role,
            models::rbac::RoleSummary,
            models::rbac::CreateRolePayload,
            models::rbac::UpdateRolePayload,
            handlers::rbac::RoleUserCount,

            // --- Audit ---
            models::audit::AuditLog,

            // --- Frota ---
            models::fleet::Driver,
            models::fleet::CreateDriverPayload,
            models::fleet::UpdateDriverPayload,
            models::fleet::Vehicle,
            models::fleet::CreateVehiclePayload,
            models::fleet::UpdateVehiclePayload,
            models::fleet::PartnerKind,
            models::fleet::Partner,
            models::fleet::CreatePartnerPayload,
            models::fleet::UpdatePartnerPayload,
            models::fleet::Route,
            models::fleet::CreateRoutePayload,
            models::fleet::UpdateRoutePayload,
            models::fleet::DeleteOutcome,
            models::fleet::DeleteResponse,

            // --- Operations ---
            models::operations::OperationStatus,
            models::operations::Operation,
            models::operations::CreateOperationPayload,
            models::operations::UpdateOperationPayload,
            models::operations::UpdateStatusPayload,
            models::operations::DriverVehicle,
            models::operations::AssignDriverPayload,
            models::operations::RawOperationRow,
            models::operations::ImportRowError,
            models::operations::BatchImportResult,
            models::operations::BatchImportPayload,
            handlers::operations::BatchUploadForm,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Operators", description = "Operadores (tenants) da plataforma"),
        (name = "Users", description = "Usuários do operador"),
        (name = "RBAC", description = "Controle de Acesso (Cargos e Permissões)"),
        (name = "Audit", description = "Trilha de auditoria"),
        (name = "Drivers", description = "Motoristas"),
        (name = "Vehicles", description = "Veículos (também em /trucks)"),
        (name = "Clients", description = "Clientes"),
        (name = "Providers", description = "Fornecedores"),
        (name = "Routes", description = "Rotas cadastradas"),
        (name = "Operations", description = "Operações, atribuições, importação em lote e relatórios")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_the_batch_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/operations/batch-upload"));
        assert!(doc.paths.paths.contains_key("/api/operations/{id}/report"));
        assert!(doc.paths.paths.contains_key("/api/roles/grants"));
    }
}
