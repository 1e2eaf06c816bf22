pub mod audit_service;
pub mod auth;
pub mod document_service;
pub mod excel_service;
pub mod fleet_service;
pub mod import_service;
pub mod operation_service;
pub mod operator_service;
pub mod rbac_service;
pub mod user_service;
