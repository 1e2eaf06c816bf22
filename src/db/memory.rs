// src/db/memory.rs
//
// Store em memória que implementa todos os repositórios.
//
// - Não é durável: tudo se perde ao reiniciar o processo.
// - Um único `RwLock` guarda o estado inteiro; toda escrita que no Postgres
//   seria uma transação acontece aqui sob a mesma trava de escrita.
// - As restrições de unicidade do esquema são reproduzidas à mão, com as
//   mesmas mensagens de conflito.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::common::error::{AppError, AppResult};
use crate::common::pagination::{PageQuery, Paginated};
use crate::common::scope::TenantScope;
use crate::db::{
    AuditRepository, DriverRepository, OperationsRepository, OperatorRepository, PartnerRepository,
    RbacRepository, RouteRepository, UserRepository, VehicleRepository,
};
use crate::models::{
    audit::{AuditFilter, AuditLog, NewAuditLog},
    auth::{NewUser, User, UserFilter},
    fleet::{CatalogFilter, Driver, Partner, PartnerKind, Route, Vehicle},
    operations::{
        AssignmentFilter, DriverVehicle, NewAssignment, NewOperation, Operation, OperationFilter,
        OperationRef, OperationStatus, ReferenceCount,
    },
    operator::{NewOperator, Operator},
    rbac::{Grant, NewRole, PermissionKey, Role, RoleUserStats},
};

#[derive(Debug, Default)]
struct MemoryState {
    operators: HashMap<Uuid, Operator>,
    users: HashMap<Uuid, User>,
    grants: HashMap<Uuid, Grant>,
    roles: HashMap<Uuid, Role>,
    role_grants: HashSet<(Uuid, Uuid)>,
    drivers: HashMap<Uuid, Driver>,
    vehicles: HashMap<Uuid, Vehicle>,
    clients: HashMap<Uuid, Partner>,
    providers: HashMap<Uuid, Partner>,
    routes: HashMap<Uuid, Route>,
    operations: HashMap<Uuid, Operation>,
    assignments: HashMap<Uuid, DriverVehicle>,
    audit: Vec<AuditLog>,
}

impl MemoryState {
    fn partners(&self, kind: PartnerKind) -> &HashMap<Uuid, Partner> {
        match kind {
            PartnerKind::Client => &self.clients,
            PartnerKind::Provider => &self.providers,
        }
    }

    fn partners_mut(&mut self, kind: PartnerKind) -> &mut HashMap<Uuid, Partner> {
        match kind {
            PartnerKind::Client => &mut self.clients,
            PartnerKind::Provider => &mut self.providers,
        }
    }

    // Equivalente ao INSERT ... ON CONFLICT DO NOTHING + SELECT
    fn ensure_grants(&mut self, keys: &[PermissionKey]) -> Vec<Grant> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let existing = self
                .grants
                .values()
                .find(|g| g.resource == key.resource && g.action == key.action)
                .cloned();
            let grant = match existing {
                Some(grant) => grant,
                None => {
                    let grant = Grant {
                        id: Uuid::new_v4(),
                        resource: key.resource.clone(),
                        action: key.action.clone(),
                        created_at: Utc::now(),
                    };
                    self.grants.insert(grant.id, grant.clone());
                    grant
                }
            };
            out.push(grant);
        }
        out
    }

    fn link_grants(&mut self, role_id: Uuid, grants: &[Grant]) {
        for grant in grants {
            self.role_grants.insert((role_id, grant.id));
        }
    }

    fn role_name_taken(&self, operator_id: Uuid, name: &str, except: Option<Uuid>) -> bool {
        self.roles
            .values()
            .any(|r| r.operator_id == operator_id && r.name == name && Some(r.id) != except)
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: &PageQuery) -> Paginated<T> {
    let total = items.len() as i64;
    Paginated::new(page.slice(&items), total, page)
}

fn missing(what: &str) -> AppError {
    AppError::not_found(format!("{what} não encontrado(a)."))
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
//  OPERADORES
// =============================================================================

#[async_trait]
impl OperatorRepository for MemoryStore {
    async fn create(&self, new: NewOperator) -> AppResult<Operator> {
        let mut state = self.state.write().await;
        if state.operators.values().any(|o| o.tax_id == new.tax_id) {
            return Err(AppError::conflict("Já existe um operador com esse RUT."));
        }
        let now = Utc::now();
        let operator = Operator {
            id: Uuid::new_v4(),
            name: new.name,
            tax_id: new.tax_id,
            is_super: new.is_super,
            status: true,
            expiration: new.expiration,
            created_at: now,
            updated_at: now,
        };
        state.operators.insert(operator.id, operator.clone());
        Ok(operator)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Operator>> {
        Ok(self.state.read().await.operators.get(&id).cloned())
    }

    async fn find_by_tax_id(&self, tax_id: &str) -> AppResult<Option<Operator>> {
        let state = self.state.read().await;
        Ok(state.operators.values().find(|o| o.tax_id == tax_id).cloned())
    }

    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Operator>> {
        let state = self.state.read().await;
        Ok(state.operators.get(&id).filter(|o| scope.permits(o.id)).cloned())
    }

    async fn list(&self, scope: &TenantScope, page: &PageQuery) -> AppResult<Paginated<Operator>> {
        let state = self.state.read().await;
        let mut items: Vec<Operator> = state
            .operators
            .values()
            .filter(|o| scope.permits(o.id))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(items, page))
    }

    async fn update(&self, operator: &Operator) -> AppResult<Operator> {
        let mut state = self.state.write().await;
        if state
            .operators
            .values()
            .any(|o| o.tax_id == operator.tax_id && o.id != operator.id)
        {
            return Err(AppError::conflict("Já existe um operador com esse RUT."));
        }
        let stored = state.operators.get_mut(&operator.id).ok_or_else(|| missing("Operador"))?;
        *stored = Operator {
            updated_at: Utc::now(),
            ..operator.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        let role_ids: HashSet<Uuid> = state
            .roles
            .values()
            .filter(|r| r.operator_id == id)
            .map(|r| r.id)
            .collect();
        state.role_grants.retain(|(role_id, _)| !role_ids.contains(role_id));
        state.roles.retain(|_, r| r.operator_id != id);
        state.operators.remove(&id);
        for entry in state.audit.iter_mut().filter(|e| e.operator_id == Some(id)) {
            entry.operator_id = None;
        }
        Ok(())
    }

    async fn count_dependents(&self, id: Uuid) -> AppResult<i64> {
        let state = self.state.read().await;
        let count = state.users.values().filter(|u| u.operator_id == id).count()
            + state.operations.values().filter(|o| o.operator_id == id).count()
            + state.drivers.values().filter(|d| d.operator_id == id).count()
            + state.vehicles.values().filter(|v| v.operator_id == id).count()
            + state.clients.values().filter(|p| p.operator_id == id).count()
            + state.providers.values().filter(|p| p.operator_id == id).count()
            + state.routes.values().filter(|r| r.operator_id == id).count();
        Ok(count as i64)
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.state.read().await.operators.len() as i64)
    }
}

// =============================================================================
//  USUÁRIOS
// =============================================================================

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, new: NewUser) -> AppResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| {
            u.username == new.username || u.email.eq_ignore_ascii_case(&new.email)
        }) {
            return Err(AppError::conflict("Usuário ou e-mail já cadastrado."));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            operator_id: new.operator_id,
            role_id: new.role_id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            full_name: new.full_name,
            status: true,
            last_activity_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == login || u.email.eq_ignore_ascii_case(login))
            .cloned())
    }

    async fn username_taken(&self, username: &str, except: Option<Uuid>) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .any(|u| u.username == username && Some(u.id) != except))
    }

    async fn email_taken(&self, email: &str, except: Option<Uuid>) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != except))
    }

    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).filter(|u| scope.permits(u.operator_id)).cloned())
    }

    async fn list(
        &self,
        scope: &TenantScope,
        filter: &UserFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<User>> {
        let needle = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let state = self.state.read().await;
        let mut items: Vec<User> = state
            .users
            .values()
            .filter(|u| scope.permits(u.operator_id))
            .filter(|u| filter.role_id.is_none_or(|r| r == u.role_id))
            .filter(|u| filter.status.is_none_or(|s| s == u.status))
            .filter(|u| {
                needle.as_deref().is_none_or(|n| {
                    u.username.to_lowercase().contains(n)
                        || u.email.to_lowercase().contains(n)
                        || u.full_name.as_deref().is_some_and(|f| f.to_lowercase().contains(n))
                })
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(paginate(items, page))
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| {
            u.id != user.id
                && (u.username == user.username || u.email.eq_ignore_ascii_case(&user.email))
        }) {
            return Err(AppError::conflict("Usuário ou e-mail já cadastrado."));
        }
        let stored = state.users.get_mut(&user.id).ok_or_else(|| missing("Usuário"))?;
        *stored = User {
            updated_at: Utc::now(),
            ..user.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.users.remove(&id);
        for op in state.operations.values_mut().filter(|o| o.created_by == Some(id)) {
            op.created_by = None;
        }
        for entry in state.audit.iter_mut().filter(|e| e.user_id == Some(id)) {
            entry.user_id = None;
        }
        Ok(())
    }

    async fn touch_last_activity(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        if let Some(user) = self.state.write().await.users.get_mut(&id) {
            user.last_activity_at = Some(at);
        }
        Ok(())
    }

    async fn role_user_stats(&self, role_id: Uuid) -> AppResult<RoleUserStats> {
        let state = self.state.read().await;
        let (total, active) = state
            .users
            .values()
            .filter(|u| u.role_id == role_id)
            .fold((0, 0), |(total, active), u| (total + 1, active + i64::from(u.status)));
        Ok(RoleUserStats { total, active })
    }
}

// =============================================================================
//  CARGOS E PERMISSÕES
// =============================================================================

#[async_trait]
impl RbacRepository for MemoryStore {
    async fn list_grants(&self) -> AppResult<Vec<Grant>> {
        let state = self.state.read().await;
        let mut grants: Vec<Grant> = state.grants.values().cloned().collect();
        grants.sort_by(|a, b| (&a.resource, &a.action).cmp(&(&b.resource, &b.action)));
        Ok(grants)
    }

    async fn create_role(&self, new: NewRole, permissions: &[PermissionKey]) -> AppResult<Role> {
        let mut state = self.state.write().await;
        if state.role_name_taken(new.operator_id, &new.name, None) {
            return Err(AppError::conflict("Já existe um cargo com esse nome."));
        }
        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            operator_id: new.operator_id,
            name: new.name,
            is_system_role: new.is_system_role,
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(role.id, role.clone());
        let grants = state.ensure_grants(permissions);
        state.link_grants(role.id, &grants);
        Ok(role)
    }

    async fn find_role(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.get(&id).filter(|r| scope.permits(r.operator_id)).cloned())
    }

    async fn find_role_by_name(&self, operator_id: Uuid, name: &str) -> AppResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .values()
            .find(|r| r.operator_id == operator_id && r.name == name)
            .cloned())
    }

    async fn list_roles(&self, scope: &TenantScope) -> AppResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state
            .roles
            .values()
            .filter(|r| scope.permits(r.operator_id))
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn update_role(&self, role: &Role, permissions: Option<&[PermissionKey]>) -> AppResult<Role> {
        let mut state = self.state.write().await;
        if state.role_name_taken(role.operator_id, &role.name, Some(role.id)) {
            return Err(AppError::conflict("Já existe um cargo com esse nome."));
        }
        let updated = {
            let stored = state.roles.get_mut(&role.id).ok_or_else(|| missing("Cargo"))?;
            stored.name = role.name.clone();
            stored.updated_at = Utc::now();
            stored.clone()
        };
        if let Some(keys) = permissions {
            state.role_grants.retain(|(role_id, _)| *role_id != role.id);
            let grants = state.ensure_grants(keys);
            state.link_grants(role.id, &grants);
        }
        Ok(updated)
    }

    async fn delete_role(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.role_grants.retain(|(role_id, _)| *role_id != id);
        state.roles.remove(&id);
        Ok(())
    }

    async fn role_permissions(&self, role_id: Uuid) -> AppResult<Vec<String>> {
        let state = self.state.read().await;
        let mut permissions: Vec<String> = state
            .role_grants
            .iter()
            .filter(|(r, _)| *r == role_id)
            .filter_map(|(_, grant_id)| state.grants.get(grant_id))
            .map(Grant::permission)
            .collect();
        permissions.sort();
        Ok(permissions)
    }
}

// =============================================================================
//  CADASTROS DE FROTA
// =============================================================================

#[async_trait]
impl DriverRepository for MemoryStore {
    async fn create(&self, driver: Driver) -> AppResult<Driver> {
        let mut state = self.state.write().await;
        if state
            .drivers
            .values()
            .any(|d| d.operator_id == driver.operator_id && d.rut == driver.rut)
        {
            return Err(AppError::conflict("Já existe um motorista com esse RUT."));
        }
        state.drivers.insert(driver.id, driver.clone());
        Ok(driver)
    }

    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Driver>> {
        let state = self.state.read().await;
        Ok(state.drivers.get(&id).filter(|d| scope.permits(d.operator_id)).cloned())
    }

    async fn find_by_rut(&self, operator_id: Uuid, rut: &str) -> AppResult<Option<Driver>> {
        let state = self.state.read().await;
        Ok(state
            .drivers
            .values()
            .find(|d| d.operator_id == operator_id && d.rut == rut)
            .cloned())
    }

    async fn list(
        &self,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Driver>> {
        let state = self.state.read().await;
        let mut items: Vec<Driver> = state
            .drivers
            .values()
            .filter(|d| scope.permits(d.operator_id) && filter.matches_status(d.status))
            .filter(|d| filter.matches_text(&[d.full_name.as_str(), d.rut.as_str()]))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(paginate(items, page))
    }

    async fn update(&self, driver: &Driver) -> AppResult<Driver> {
        let mut state = self.state.write().await;
        if state
            .drivers
            .values()
            .any(|d| d.id != driver.id && d.operator_id == driver.operator_id && d.rut == driver.rut)
        {
            return Err(AppError::conflict("Já existe um motorista com esse RUT."));
        }
        let stored = state.drivers.get_mut(&driver.id).ok_or_else(|| missing("Motorista"))?;
        *stored = Driver {
            updated_at: Utc::now(),
            ..driver.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.drivers.remove(&id);
        state.assignments.retain(|_, a| a.driver_id != id);
        Ok(())
    }
}

#[async_trait]
impl VehicleRepository for MemoryStore {
    async fn create(&self, vehicle: Vehicle) -> AppResult<Vehicle> {
        let mut state = self.state.write().await;
        if state
            .vehicles
            .values()
            .any(|v| v.operator_id == vehicle.operator_id && v.plate_number == vehicle.plate_number)
        {
            return Err(AppError::conflict("Já existe um veículo com essa patente."));
        }
        state.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Vehicle>> {
        let state = self.state.read().await;
        Ok(state.vehicles.get(&id).filter(|v| scope.permits(v.operator_id)).cloned())
    }

    async fn find_by_plate(&self, operator_id: Uuid, plate_number: &str) -> AppResult<Option<Vehicle>> {
        let state = self.state.read().await;
        Ok(state
            .vehicles
            .values()
            .find(|v| v.operator_id == operator_id && v.plate_number == plate_number)
            .cloned())
    }

    async fn list(
        &self,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Vehicle>> {
        let state = self.state.read().await;
        let mut items: Vec<Vehicle> = state
            .vehicles
            .values()
            .filter(|v| scope.permits(v.operator_id) && filter.matches_status(v.status))
            .filter(|v| {
                filter.matches_text(&[
                    v.plate_number.as_str(),
                    v.brand.as_deref().unwrap_or_default(),
                    v.model.as_deref().unwrap_or_default(),
                ])
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| a.plate_number.cmp(&b.plate_number));
        Ok(paginate(items, page))
    }

    async fn update(&self, vehicle: &Vehicle) -> AppResult<Vehicle> {
        let mut state = self.state.write().await;
        if state.vehicles.values().any(|v| {
            v.id != vehicle.id
                && v.operator_id == vehicle.operator_id
                && v.plate_number == vehicle.plate_number
        }) {
            return Err(AppError::conflict("Já existe um veículo com essa patente."));
        }
        let stored = state.vehicles.get_mut(&vehicle.id).ok_or_else(|| missing("Veículo"))?;
        *stored = Vehicle {
            updated_at: Utc::now(),
            ..vehicle.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.vehicles.remove(&id);
        state.assignments.retain(|_, a| a.vehicle_id != id);
        Ok(())
    }
}

#[async_trait]
impl PartnerRepository for MemoryStore {
    async fn create(&self, kind: PartnerKind, partner: Partner) -> AppResult<Partner> {
        let mut state = self.state.write().await;
        if state.partners(kind).values().any(|p| {
            p.operator_id == partner.operator_id
                && (p.business_name == partner.business_name || p.tax_id == partner.tax_id)
        }) {
            return Err(AppError::conflict(format!(
                "{} com essa razão social ou RUT já existe.",
                kind.label()
            )));
        }
        state.partners_mut(kind).insert(partner.id, partner.clone());
        Ok(partner)
    }

    async fn find(&self, kind: PartnerKind, scope: &TenantScope, id: Uuid) -> AppResult<Option<Partner>> {
        let state = self.state.read().await;
        Ok(state
            .partners(kind)
            .get(&id)
            .filter(|p| scope.permits(p.operator_id))
            .cloned())
    }

    async fn find_by_name(&self, kind: PartnerKind, operator_id: Uuid, name: &str) -> AppResult<Option<Partner>> {
        let state = self.state.read().await;
        Ok(state
            .partners(kind)
            .values()
            .find(|p| p.operator_id == operator_id && p.business_name == name)
            .cloned())
    }

    async fn find_by_tax_id(&self, kind: PartnerKind, operator_id: Uuid, tax_id: &str) -> AppResult<Option<Partner>> {
        let state = self.state.read().await;
        Ok(state
            .partners(kind)
            .values()
            .find(|p| p.operator_id == operator_id && p.tax_id == tax_id)
            .cloned())
    }

    async fn list(
        &self,
        kind: PartnerKind,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Partner>> {
        let state = self.state.read().await;
        let mut items: Vec<Partner> = state
            .partners(kind)
            .values()
            .filter(|p| scope.permits(p.operator_id) && filter.matches_status(p.status))
            .filter(|p| filter.matches_text(&[p.business_name.as_str(), p.tax_id.as_str()]))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.business_name.cmp(&b.business_name));
        Ok(paginate(items, page))
    }

    async fn update(&self, kind: PartnerKind, partner: &Partner) -> AppResult<Partner> {
        let mut state = self.state.write().await;
        if state.partners(kind).values().any(|p| {
            p.id != partner.id
                && p.operator_id == partner.operator_id
                && (p.business_name == partner.business_name || p.tax_id == partner.tax_id)
        }) {
            return Err(AppError::conflict(format!(
                "{} com essa razão social ou RUT já existe.",
                kind.label()
            )));
        }
        let stored = state
            .partners_mut(kind)
            .get_mut(&partner.id)
            .ok_or_else(|| missing(kind.label()))?;
        *stored = Partner {
            updated_at: Utc::now(),
            ..partner.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, kind: PartnerKind, id: Uuid) -> AppResult<()> {
        self.state.write().await.partners_mut(kind).remove(&id);
        Ok(())
    }
}

#[async_trait]
impl RouteRepository for MemoryStore {
    async fn create(&self, route: Route) -> AppResult<Route> {
        let mut state = self.state.write().await;
        if state.routes.values().any(|r| {
            r.operator_id == route.operator_id && (r.name == route.name || r.code == route.code)
        }) {
            return Err(AppError::conflict("Já existe uma rota com esse nome ou código."));
        }
        state.routes.insert(route.id, route.clone());
        Ok(route)
    }

    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Route>> {
        let state = self.state.read().await;
        Ok(state.routes.get(&id).filter(|r| scope.permits(r.operator_id)).cloned())
    }

    async fn find_by_name(&self, operator_id: Uuid, name: &str) -> AppResult<Option<Route>> {
        let state = self.state.read().await;
        Ok(state
            .routes
            .values()
            .find(|r| r.operator_id == operator_id && r.name == name)
            .cloned())
    }

    async fn find_by_code(&self, operator_id: Uuid, code: &str) -> AppResult<Option<Route>> {
        let state = self.state.read().await;
        Ok(state
            .routes
            .values()
            .find(|r| r.operator_id == operator_id && r.code == code)
            .cloned())
    }

    async fn list(
        &self,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Route>> {
        let state = self.state.read().await;
        let mut items: Vec<Route> = state
            .routes
            .values()
            .filter(|r| scope.permits(r.operator_id) && filter.matches_status(r.status))
            .filter(|r| filter.matches_text(&[r.name.as_str(), r.code.as_str(), r.origin.as_str(), r.destination.as_str()]))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(items, page))
    }

    async fn update(&self, route: &Route) -> AppResult<Route> {
        let mut state = self.state.write().await;
        if state.routes.values().any(|r| {
            r.id != route.id
                && r.operator_id == route.operator_id
                && (r.name == route.name || r.code == route.code)
        }) {
            return Err(AppError::conflict("Já existe uma rota com esse nome ou código."));
        }
        let stored = state.routes.get_mut(&route.id).ok_or_else(|| missing("Rota"))?;
        *stored = Route {
            updated_at: Utc::now(),
            ..route.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.state.write().await.routes.remove(&id);
        Ok(())
    }
}

// =============================================================================
//  OPERAÇÕES E ATRIBUIÇÕES
// =============================================================================

#[async_trait]
impl OperationsRepository for MemoryStore {
    async fn create(&self, new: NewOperation) -> AppResult<Operation> {
        let mut state = self.state.write().await;
        if state
            .operations
            .values()
            .any(|o| o.operator_id == new.operator_id && o.operation_number == new.operation_number)
        {
            return Err(AppError::conflict(
                "Já existe uma operação com esse número neste operador.",
            ));
        }
        let now = Utc::now();
        let operation = Operation {
            id: Uuid::new_v4(),
            operator_id: new.operator_id,
            operation_number: new.operation_number,
            driver_id: new.driver_id,
            vehicle_id: new.vehicle_id,
            client_id: new.client_id,
            provider_id: new.provider_id,
            route_id: new.route_id,
            operation_type: new.operation_type,
            origin: new.origin,
            destination: new.destination,
            status: OperationStatus::Scheduled,
            scheduled_start_date: new.scheduled_start_date,
            scheduled_end_date: new.scheduled_end_date,
            actual_start_date: None,
            actual_end_date: None,
            distance: new.distance,
            cargo_description: new.cargo_description,
            cargo_weight: new.cargo_weight,
            notes: new.notes,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        state.operations.insert(operation.id, operation.clone());
        Ok(operation)
    }

    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Operation>> {
        let state = self.state.read().await;
        Ok(state.operations.get(&id).filter(|o| scope.permits(o.operator_id)).cloned())
    }

    async fn find_by_number(&self, operator_id: Uuid, number: &str) -> AppResult<Option<Operation>> {
        let state = self.state.read().await;
        Ok(state
            .operations
            .values()
            .find(|o| o.operator_id == operator_id && o.operation_number == number)
            .cloned())
    }

    async fn list(
        &self,
        scope: &TenantScope,
        filter: &OperationFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Operation>> {
        let state = self.state.read().await;
        let mut items: Vec<Operation> = state
            .operations
            .values()
            .filter(|o| scope.permits(o.operator_id) && filter.matches(o))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.scheduled_start_date
                .cmp(&a.scheduled_start_date)
                .then_with(|| a.operation_number.cmp(&b.operation_number))
        });
        Ok(paginate(items, page))
    }

    async fn update(&self, operation: &Operation) -> AppResult<Operation> {
        let mut state = self.state.write().await;
        if state.operations.values().any(|o| {
            o.id != operation.id
                && o.operator_id == operation.operator_id
                && o.operation_number == operation.operation_number
        }) {
            return Err(AppError::conflict(
                "Já existe uma operação com esse número neste operador.",
            ));
        }
        let stored = state
            .operations
            .get_mut(&operation.id)
            .ok_or_else(|| missing("Operação"))?;
        *stored = Operation {
            updated_at: Utc::now(),
            ..operation.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.operations.remove(&id);
        for assignment in state.assignments.values_mut().filter(|a| a.operation_id == Some(id)) {
            assignment.operation_id = None;
        }
        Ok(())
    }

    async fn count_references(&self, reference: OperationRef) -> AppResult<ReferenceCount> {
        let state = self.state.read().await;
        Ok(state
            .operations
            .values()
            .filter(|o| reference.matches(o))
            .fold(ReferenceCount::default(), |mut acc, o| {
                acc.total += 1;
                if o.status.is_open() {
                    acc.open += 1;
                }
                acc
            }))
    }

    async fn assign_driver(&self, new: NewAssignment) -> AppResult<DriverVehicle> {
        // Desativação e inserção sob a mesma trava de escrita
        let mut state = self.state.write().await;
        for current in state
            .assignments
            .values_mut()
            .filter(|a| a.driver_id == new.driver_id && a.is_active)
        {
            current.is_active = false;
            current.unassigned_at = Some(new.assigned_at);
        }
        let assignment = DriverVehicle {
            id: Uuid::new_v4(),
            operator_id: new.operator_id,
            driver_id: new.driver_id,
            vehicle_id: new.vehicle_id,
            operation_id: new.operation_id,
            is_active: true,
            assigned_at: new.assigned_at,
            unassigned_at: None,
        };
        state.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn find_assignment(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<DriverVehicle>> {
        let state = self.state.read().await;
        Ok(state
            .assignments
            .get(&id)
            .filter(|a| scope.permits(a.operator_id))
            .cloned())
    }

    async fn unassign(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<DriverVehicle> {
        let mut state = self.state.write().await;
        let assignment = state
            .assignments
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Atribuição não encontrada."))?;
        assignment.is_active = false;
        assignment.unassigned_at.get_or_insert(at);
        Ok(assignment.clone())
    }

    async fn list_assignments(
        &self,
        scope: &TenantScope,
        filter: &AssignmentFilter,
    ) -> AppResult<Vec<DriverVehicle>> {
        let state = self.state.read().await;
        let mut items: Vec<DriverVehicle> = state
            .assignments
            .values()
            .filter(|a| scope.permits(a.operator_id) && filter.matches(a))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
        Ok(items)
    }
}

// =============================================================================
//  AUDITORIA
// =============================================================================

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn insert(&self, entry: NewAuditLog) -> AppResult<AuditLog> {
        let log = AuditLog {
            id: Uuid::new_v4(),
            operator_id: entry.operator_id,
            user_id: entry.user_id,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            details: entry.details,
            created_at: Utc::now(),
        };
        self.state.write().await.audit.push(log.clone());
        Ok(log)
    }

    async fn list(
        &self,
        scope: &TenantScope,
        filter: &AuditFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<AuditLog>> {
        let state = self.state.read().await;
        // Mais recentes primeiro (ordem de inserção invertida)
        let items: Vec<AuditLog> = state
            .audit
            .iter()
            .rev()
            .filter(|e| match scope.operator_filter() {
                None => true,
                Some(id) => e.operator_id == Some(id),
            })
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        Ok(paginate(items, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_assignment(operator_id: Uuid, driver_id: Uuid, vehicle_id: Uuid) -> NewAssignment {
        NewAssignment {
            operator_id,
            driver_id,
            vehicle_id,
            operation_id: None,
            assigned_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn reassigning_driver_keeps_a_single_active_row() {
        let store = MemoryStore::new();
        let (op, driver) = (Uuid::new_v4(), Uuid::new_v4());
        let (v1, v2) = (Uuid::new_v4(), Uuid::new_v4());

        let first = store.assign_driver(new_assignment(op, driver, v1)).await.unwrap();
        let second = store.assign_driver(new_assignment(op, driver, v2)).await.unwrap();

        let all = store
            .list_assignments(
                &TenantScope::Operator(op),
                &AssignmentFilter { driver_id: Some(driver), active_only: Some(false), ..Default::default() },
            )
            .await
            .unwrap();
        let active: Vec<_> = all.iter().filter(|a| a.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);

        let old = all.iter().find(|a| a.id == first.id).unwrap();
        assert!(!old.is_active);
        assert!(old.unassigned_at.is_some());
    }

    #[tokio::test]
    async fn role_names_are_unique_per_operator_only() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let role = |operator_id| NewRole { operator_id, name: "Despachador".into(), is_system_role: false };

        store.create_role(role(a), &[]).await.unwrap();
        store.create_role(role(b), &[]).await.unwrap();
        let err = store.create_role(role(a), &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn roles_share_existing_grant_rows() {
        let store = MemoryStore::new();
        let keys = vec![PermissionKey::new("drivers", "read")];
        let role = |name: &str| NewRole { operator_id: Uuid::new_v4(), name: name.into(), is_system_role: false };

        store.create_role(role("Leitor"), &keys).await.unwrap();
        store.create_role(role("Auditor"), &keys).await.unwrap();
        assert_eq!(store.list_grants().await.unwrap().len(), 1);
    }
}
