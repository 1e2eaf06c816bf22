// src/db.rs
//
// Contratos dos repositórios. Há duas implementações:
// - `Pg*Repository` (sqlx/Postgres), a durável;
// - `MemoryStore`, usada em desenvolvimento e nos testes.
//
// Toda leitura de dado de tenant recebe um `TenantScope` obrigatório.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::error::AppResult;
use crate::common::pagination::{PageQuery, Paginated};
use crate::common::scope::TenantScope;
use crate::models::{
    audit::{AuditFilter, AuditLog, NewAuditLog},
    auth::{NewUser, User, UserFilter},
    fleet::{CatalogFilter, Driver, Partner, PartnerKind, Route, Vehicle},
    operations::{
        AssignmentFilter, DriverVehicle, NewAssignment, NewOperation, Operation, OperationFilter,
        OperationRef, ReferenceCount,
    },
    operator::{NewOperator, Operator},
    rbac::{Grant, NewRole, PermissionKey, Role, RoleUserStats},
};

pub mod audit_repo;
pub mod fleet_repo;
pub mod memory;
pub mod operations_repo;
pub mod operator_repo;
pub mod rbac_repo;
pub mod user_repo;

pub use memory::MemoryStore;

#[async_trait]
pub trait OperatorRepository: Send + Sync {
    async fn create(&self, new: NewOperator) -> AppResult<Operator>;
    /// Sem escopo: usado na autenticação, antes de existir um `Principal`.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Operator>>;
    async fn find_by_tax_id(&self, tax_id: &str) -> AppResult<Option<Operator>>;
    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Operator>>;
    async fn list(&self, scope: &TenantScope, page: &PageQuery) -> AppResult<Paginated<Operator>>;
    async fn update(&self, operator: &Operator) -> AppResult<Operator>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    /// Usuários, operações e cadastros de frota que ainda apontam para o operador.
    async fn count_dependents(&self, id: Uuid) -> AppResult<i64>;
    async fn count(&self) -> AppResult<i64>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, new: NewUser) -> AppResult<User>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    /// Busca por usuário ou e-mail (login).
    async fn find_by_login(&self, login: &str) -> AppResult<Option<User>>;
    async fn username_taken(&self, username: &str, except: Option<Uuid>) -> AppResult<bool>;
    async fn email_taken(&self, email: &str, except: Option<Uuid>) -> AppResult<bool>;
    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<User>>;
    async fn list(
        &self,
        scope: &TenantScope,
        filter: &UserFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<User>>;
    async fn update(&self, user: &User) -> AppResult<User>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn touch_last_activity(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
    async fn role_user_stats(&self, role_id: Uuid) -> AppResult<RoleUserStats>;
}

#[async_trait]
pub trait RbacRepository: Send + Sync {
    async fn list_grants(&self) -> AppResult<Vec<Grant>>;
    /// Cria o cargo e vincula as permissões numa única transação.
    async fn create_role(&self, new: NewRole, permissions: &[PermissionKey]) -> AppResult<Role>;
    async fn find_role(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Role>>;
    async fn find_role_by_name(&self, operator_id: Uuid, name: &str) -> AppResult<Option<Role>>;
    async fn list_roles(&self, scope: &TenantScope) -> AppResult<Vec<Role>>;
    /// Renomeia e/ou substitui o conjunto inteiro de permissões, atomicamente.
    async fn update_role(&self, role: &Role, permissions: Option<&[PermissionKey]>) -> AppResult<Role>;
    /// Remove os vínculos role_grants e depois o cargo, na mesma transação.
    async fn delete_role(&self, id: Uuid) -> AppResult<()>;
    async fn role_permissions(&self, role_id: Uuid) -> AppResult<Vec<String>>;
}

#[async_trait]
pub trait DriverRepository: Send + Sync {
    async fn create(&self, driver: Driver) -> AppResult<Driver>;
    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Driver>>;
    async fn find_by_rut(&self, operator_id: Uuid, rut: &str) -> AppResult<Option<Driver>>;
    async fn list(
        &self,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Driver>>;
    async fn update(&self, driver: &Driver) -> AppResult<Driver>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn create(&self, vehicle: Vehicle) -> AppResult<Vehicle>;
    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Vehicle>>;
    async fn find_by_plate(&self, operator_id: Uuid, plate_number: &str) -> AppResult<Option<Vehicle>>;
    async fn list(
        &self,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Vehicle>>;
    async fn update(&self, vehicle: &Vehicle) -> AppResult<Vehicle>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait PartnerRepository: Send + Sync {
    async fn create(&self, kind: PartnerKind, partner: Partner) -> AppResult<Partner>;
    async fn find(&self, kind: PartnerKind, scope: &TenantScope, id: Uuid) -> AppResult<Option<Partner>>;
    async fn find_by_name(&self, kind: PartnerKind, operator_id: Uuid, name: &str) -> AppResult<Option<Partner>>;
    async fn find_by_tax_id(&self, kind: PartnerKind, operator_id: Uuid, tax_id: &str) -> AppResult<Option<Partner>>;
    async fn list(
        &self,
        kind: PartnerKind,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Partner>>;
    async fn update(&self, kind: PartnerKind, partner: &Partner) -> AppResult<Partner>;
    async fn delete(&self, kind: PartnerKind, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait RouteRepository: Send + Sync {
    async fn create(&self, route: Route) -> AppResult<Route>;
    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Route>>;
    async fn find_by_name(&self, operator_id: Uuid, name: &str) -> AppResult<Option<Route>>;
    async fn find_by_code(&self, operator_id: Uuid, code: &str) -> AppResult<Option<Route>>;
    async fn list(
        &self,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Route>>;
    async fn update(&self, route: &Route) -> AppResult<Route>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait OperationsRepository: Send + Sync {
    async fn create(&self, new: NewOperation) -> AppResult<Operation>;
    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Operation>>;
    async fn find_by_number(&self, operator_id: Uuid, number: &str) -> AppResult<Option<Operation>>;
    async fn list(
        &self,
        scope: &TenantScope,
        filter: &OperationFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Operation>>;
    async fn update(&self, operation: &Operation) -> AppResult<Operation>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn count_references(&self, reference: OperationRef) -> AppResult<ReferenceCount>;

    /// Desativa a atribuição ativa do motorista e cria a nova, atomicamente.
    async fn assign_driver(&self, new: NewAssignment) -> AppResult<DriverVehicle>;
    async fn find_assignment(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<DriverVehicle>>;
    async fn unassign(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<DriverVehicle>;
    async fn list_assignments(
        &self,
        scope: &TenantScope,
        filter: &AssignmentFilter,
    ) -> AppResult<Vec<DriverVehicle>>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert(&self, entry: NewAuditLog) -> AppResult<AuditLog>;
    async fn list(
        &self,
        scope: &TenantScope,
        filter: &AuditFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<AuditLog>>;
}

// Conjunto de repositórios injetado nos serviços
#[derive(Clone)]
pub struct Repositories {
    pub operators: Arc<dyn OperatorRepository>,
    pub users: Arc<dyn UserRepository>,
    pub rbac: Arc<dyn RbacRepository>,
    pub drivers: Arc<dyn DriverRepository>,
    pub vehicles: Arc<dyn VehicleRepository>,
    pub partners: Arc<dyn PartnerRepository>,
    pub routes: Arc<dyn RouteRepository>,
    pub operations: Arc<dyn OperationsRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            operators: Arc::new(operator_repo::PgOperatorRepository::new(pool.clone())),
            users: Arc::new(user_repo::PgUserRepository::new(pool.clone())),
            rbac: Arc::new(rbac_repo::PgRbacRepository::new(pool.clone())),
            drivers: Arc::new(fleet_repo::PgDriverRepository::new(pool.clone())),
            vehicles: Arc::new(fleet_repo::PgVehicleRepository::new(pool.clone())),
            partners: Arc::new(fleet_repo::PgPartnerRepository::new(pool.clone())),
            routes: Arc::new(fleet_repo::PgRouteRepository::new(pool.clone())),
            operations: Arc::new(operations_repo::PgOperationsRepository::new(pool.clone())),
            audit: Arc::new(audit_repo::PgAuditRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            operators: store.clone(),
            users: store.clone(),
            rbac: store.clone(),
            drivers: store.clone(),
            vehicles: store.clone(),
            partners: store.clone(),
            routes: store.clone(),
            operations: store.clone(),
            audit: store,
        }
    }
}
