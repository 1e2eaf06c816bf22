// src/services/fleet_service.rs

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::{AppError, AppResult},
        pagination::{PageQuery, Paginated},
        permissions,
        scope::TenantScope,
    },
    db::Repositories,
    models::{
        audit::NewAuditLog,
        auth::Principal,
        fleet::{
            CatalogFilter, CreateDriverPayload, CreatePartnerPayload, CreateRoutePayload, CreateVehiclePayload,
            DeleteOutcome, Driver, Partner, PartnerKind, Route, UpdateDriverPayload, UpdatePartnerPayload,
            UpdateRoutePayload, UpdateVehiclePayload, Vehicle,
        },
        operations::OperationRef,
    },
    services::audit_service::AuditService,
};

// Cadastros de frota: motoristas, veículos, clientes/fornecedores e rotas.
#[derive(Clone)]
pub struct FleetService {
    repos: Repositories,
    audit: AuditService,
}

impl FleetService {
    pub fn new(repos: Repositories, audit: AuditService) -> Self {
        Self { repos, audit }
    }

    /// Operador de destino de um cadastro novo: precisa existir e estar ativo.
    async fn writable_operator(&self, scope: &TenantScope, requested: Option<Uuid>) -> AppResult<Uuid> {
        let operator_id = scope.target_operator(requested)?;
        let operator = self
            .repos
            .operators
            .find_by_id(operator_id)
            .await?
            .ok_or_else(|| AppError::not_found("Operador não encontrado."))?;
        if !operator.is_usable(Utc::now()) {
            return Err(AppError::bad_request("O operador está inativo ou expirado."));
        }
        Ok(operator_id)
    }

    /// Regra de exclusão: operação aberta bloqueia; só histórico vira
    /// desativação; sem referências, remove de fato.
    async fn delete_decision(&self, reference: OperationRef, label: &str) -> AppResult<DeleteOutcome> {
        let refs = self.repos.operations.count_references(reference).await?;
        if refs.open > 0 {
            return Err(AppError::bad_request(format!(
                "{label} possui {} operação(ões) agendada(s) ou em andamento.",
                refs.open
            )));
        }
        Ok(if refs.total > 0 {
            DeleteOutcome::Deactivated
        } else {
            DeleteOutcome::Deleted
        })
    }

    async fn record(&self, actor: &Principal, operator_id: Uuid, action: &str, resource: &str, id: Uuid, details: serde_json::Value) {
        self.audit
            .record(NewAuditLog::new(Some(actor), operator_id, action, resource, Some(id)).with_details(details))
            .await;
    }

    // =========================================================================
    //  MOTORISTAS
    // =========================================================================

    pub async fn create_driver(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        payload: CreateDriverPayload,
    ) -> AppResult<Driver> {
        payload.validate()?;
        let operator_id = self.writable_operator(scope, payload.operator_id).await?;

        let rut = payload.rut.trim().to_string();
        if self.repos.drivers.find_by_rut(operator_id, &rut).await?.is_some() {
            return Err(AppError::conflict("Já existe um motorista com esse RUT."));
        }

        let now = Utc::now();
        let driver = self
            .repos
            .drivers
            .create(Driver {
                id: Uuid::new_v4(),
                operator_id,
                full_name: payload.full_name.trim().to_string(),
                rut,
                license_number: payload.license_number,
                license_expiration: payload.license_expiration,
                phone: payload.phone,
                email: payload.email,
                status: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!("Motorista '{}' criado ({})", driver.full_name, driver.id);
        self.record(actor, operator_id, "create", permissions::DRIVERS, driver.id, json!({ "rut": driver.rut }))
            .await;
        Ok(driver)
    }

    pub async fn list_drivers(
        &self,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Driver>> {
        self.repos.drivers.list(scope, filter, page).await
    }

    pub async fn get_driver(&self, scope: &TenantScope, id: Uuid) -> AppResult<Driver> {
        self.repos
            .drivers
            .find(scope, id)
            .await?
            .ok_or_else(|| AppError::not_found("Motorista não encontrado."))
    }

    pub async fn update_driver(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        id: Uuid,
        payload: UpdateDriverPayload,
    ) -> AppResult<Driver> {
        payload.validate()?;
        let mut driver = self.get_driver(scope, id).await?;

        if let Some(rut) = payload.rut.as_deref().map(str::trim) {
            if let Some(other) = self.repos.drivers.find_by_rut(driver.operator_id, rut).await? {
                if other.id != driver.id {
                    return Err(AppError::conflict("Já existe um motorista com esse RUT."));
                }
            }
            driver.rut = rut.to_string();
        }
        if let Some(full_name) = payload.full_name {
            driver.full_name = full_name.trim().to_string();
        }
        if payload.license_number.is_some() {
            driver.license_number = payload.license_number;
        }
        if payload.license_expiration.is_some() {
            driver.license_expiration = payload.license_expiration;
        }
        if payload.phone.is_some() {
            driver.phone = payload.phone;
        }
        if payload.email.is_some() {
            driver.email = payload.email;
        }
        if let Some(status) = payload.status {
            driver.status = status;
        }

        let updated = self.repos.drivers.update(&driver).await?;
        self.record(actor, updated.operator_id, "update", permissions::DRIVERS, updated.id, json!({ "status": updated.status }))
            .await;
        Ok(updated)
    }

    pub async fn delete_driver(&self, actor: &Principal, scope: &TenantScope, id: Uuid) -> AppResult<DeleteOutcome> {
        let mut driver = self.get_driver(scope, id).await?;
        let outcome = self.delete_decision(OperationRef::Driver(driver.id), "O motorista").await?;

        match outcome {
            DeleteOutcome::Deleted => self.repos.drivers.delete(driver.id).await?,
            DeleteOutcome::Deactivated => {
                driver.status = false;
                self.repos.drivers.update(&driver).await?;
            }
        }

        tracing::info!("Motorista {} removido ({:?})", driver.id, outcome);
        self.record(actor, driver.operator_id, "delete", permissions::DRIVERS, driver.id, json!({ "outcome": outcome }))
            .await;
        Ok(outcome)
    }

    // =========================================================================
    //  VEÍCULOS
    // =========================================================================

    pub async fn create_vehicle(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        payload: CreateVehiclePayload,
    ) -> AppResult<Vehicle> {
        payload.validate()?;
        let operator_id = self.writable_operator(scope, payload.operator_id).await?;

        let plate_number = payload.plate_number.trim().to_string();
        if self.repos.vehicles.find_by_plate(operator_id, &plate_number).await?.is_some() {
            return Err(AppError::conflict("Já existe um veículo com essa patente."));
        }

        let now = Utc::now();
        let vehicle = self
            .repos
            .vehicles
            .create(Vehicle {
                id: Uuid::new_v4(),
                operator_id,
                plate_number,
                brand: payload.brand,
                model: payload.model,
                year: payload.year,
                vehicle_type: payload.vehicle_type,
                capacity: payload.capacity,
                status: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!("Veículo '{}' criado ({})", vehicle.plate_number, vehicle.id);
        self.record(
            actor,
            operator_id,
            "create",
            permissions::VEHICLES,
            vehicle.id,
            json!({ "plateNumber": vehicle.plate_number }),
        )
        .await;
        Ok(vehicle)
    }

    pub async fn list_vehicles(
        &self,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Vehicle>> {
        self.repos.vehicles.list(scope, filter, page).await
    }

    pub async fn get_vehicle(&self, scope: &TenantScope, id: Uuid) -> AppResult<Vehicle> {
        self.repos
            .vehicles
            .find(scope, id)
            .await?
            .ok_or_else(|| AppError::not_found("Veículo não encontrado."))
    }

    pub async fn update_vehicle(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        id: Uuid,
        payload: UpdateVehiclePayload,
    ) -> AppResult<Vehicle> {
        payload.validate()?;
        let mut vehicle = self.get_vehicle(scope, id).await?;

        if let Some(plate) = payload.plate_number.as_deref().map(str::trim) {
            if let Some(other) = self.repos.vehicles.find_by_plate(vehicle.operator_id, plate).await? {
                if other.id != vehicle.id {
                    return Err(AppError::conflict("Já existe um veículo com essa patente."));
                }
            }
            vehicle.plate_number = plate.to_string();
        }
        if payload.brand.is_some() {
            vehicle.brand = payload.brand;
        }
        if payload.model.is_some() {
            vehicle.model = payload.model;
        }
        if payload.year.is_some() {
            vehicle.year = payload.year;
        }
        if payload.vehicle_type.is_some() {
            vehicle.vehicle_type = payload.vehicle_type;
        }
        if payload.capacity.is_some() {
            vehicle.capacity = payload.capacity;
        }
        if let Some(status) = payload.status {
            vehicle.status = status;
        }

        let updated = self.repos.vehicles.update(&vehicle).await?;
        self.record(actor, updated.operator_id, "update", permissions::VEHICLES, updated.id, json!({ "status": updated.status }))
            .await;
        Ok(updated)
    }

    pub async fn delete_vehicle(&self, actor: &Principal, scope: &TenantScope, id: Uuid) -> AppResult<DeleteOutcome> {
        let mut vehicle = self.get_vehicle(scope, id).await?;
        let outcome = self.delete_decision(OperationRef::Vehicle(vehicle.id), "O veículo").await?;

        match outcome {
            DeleteOutcome::Deleted => self.repos.vehicles.delete(vehicle.id).await?,
            DeleteOutcome::Deactivated => {
                vehicle.status = false;
                self.repos.vehicles.update(&vehicle).await?;
            }
        }

        tracing::info!("Veículo {} removido ({:?})", vehicle.id, outcome);
        self.record(actor, vehicle.operator_id, "delete", permissions::VEHICLES, vehicle.id, json!({ "outcome": outcome }))
            .await;
        Ok(outcome)
    }

    // =========================================================================
    //  CLIENTES E FORNECEDORES
    // =========================================================================

    pub async fn create_partner(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        kind: PartnerKind,
        payload: CreatePartnerPayload,
    ) -> AppResult<Partner> {
        payload.validate()?;
        let operator_id = self.writable_operator(scope, payload.operator_id).await?;

        let tax_id = payload.tax_id.trim().to_string();
        if self.repos.partners.find_by_tax_id(kind, operator_id, &tax_id).await?.is_some() {
            return Err(AppError::conflict(format!("Já existe um {} com esse RUT.", kind.label().to_lowercase())));
        }

        let now = Utc::now();
        let partner = self
            .repos
            .partners
            .create(
                kind,
                Partner {
                    id: Uuid::new_v4(),
                    operator_id,
                    business_name: payload.business_name.trim().to_string(),
                    tax_id,
                    contact_name: payload.contact_name,
                    phone: payload.phone,
                    email: payload.email,
                    address: payload.address,
                    status: true,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await?;

        tracing::info!("{} '{}' criado ({})", kind.label(), partner.business_name, partner.id);
        self.record(actor, operator_id, "create", kind.resource(), partner.id, json!({ "taxId": partner.tax_id }))
            .await;
        Ok(partner)
    }

    pub async fn list_partners(
        &self,
        kind: PartnerKind,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Partner>> {
        self.repos.partners.list(kind, scope, filter, page).await
    }

    pub async fn get_partner(&self, kind: PartnerKind, scope: &TenantScope, id: Uuid) -> AppResult<Partner> {
        self.repos
            .partners
            .find(kind, scope, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{} não encontrado.", kind.label())))
    }

    pub async fn update_partner(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        kind: PartnerKind,
        id: Uuid,
        payload: UpdatePartnerPayload,
    ) -> AppResult<Partner> {
        payload.validate()?;
        let mut partner = self.get_partner(kind, scope, id).await?;

        if let Some(tax_id) = payload.tax_id.as_deref().map(str::trim) {
            if let Some(other) = self.repos.partners.find_by_tax_id(kind, partner.operator_id, tax_id).await? {
                if other.id != partner.id {
                    return Err(AppError::conflict(format!(
                        "Já existe um {} com esse RUT.",
                        kind.label().to_lowercase()
                    )));
                }
            }
            partner.tax_id = tax_id.to_string();
        }
        if let Some(name) = payload.business_name {
            partner.business_name = name.trim().to_string();
        }
        if payload.contact_name.is_some() {
            partner.contact_name = payload.contact_name;
        }
        if payload.phone.is_some() {
            partner.phone = payload.phone;
        }
        if payload.email.is_some() {
            partner.email = payload.email;
        }
        if payload.address.is_some() {
            partner.address = payload.address;
        }
        if let Some(status) = payload.status {
            partner.status = status;
        }

        let updated = self.repos.partners.update(kind, &partner).await?;
        self.record(actor, updated.operator_id, "update", kind.resource(), updated.id, json!({ "status": updated.status }))
            .await;
        Ok(updated)
    }

    pub async fn delete_partner(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        kind: PartnerKind,
        id: Uuid,
    ) -> AppResult<DeleteOutcome> {
        let mut partner = self.get_partner(kind, scope, id).await?;
        let reference = match kind {
            PartnerKind::Client => OperationRef::Client(partner.id),
            PartnerKind::Provider => OperationRef::Provider(partner.id),
        };
        let label = format!("O {}", kind.label().to_lowercase());
        let outcome = self.delete_decision(reference, &label).await?;

        match outcome {
            DeleteOutcome::Deleted => self.repos.partners.delete(kind, partner.id).await?,
            DeleteOutcome::Deactivated => {
                partner.status = false;
                self.repos.partners.update(kind, &partner).await?;
            }
        }

        tracing::info!("{} {} removido ({:?})", kind.label(), partner.id, outcome);
        self.record(actor, partner.operator_id, "delete", kind.resource(), partner.id, json!({ "outcome": outcome }))
            .await;
        Ok(outcome)
    }

    // =========================================================================
    //  ROTAS
    // =========================================================================

    pub async fn create_route(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        payload: CreateRoutePayload,
    ) -> AppResult<Route> {
        payload.validate()?;
        let operator_id = self.writable_operator(scope, payload.operator_id).await?;

        let code = payload.code.trim().to_string();
        if self.repos.routes.find_by_code(operator_id, &code).await?.is_some() {
            return Err(AppError::conflict("Já existe uma rota com esse código."));
        }

        let now = Utc::now();
        let route = self
            .repos
            .routes
            .create(Route {
                id: Uuid::new_v4(),
                operator_id,
                name: payload.name.trim().to_string(),
                code,
                origin: payload.origin,
                destination: payload.destination,
                distance: payload.distance,
                estimated_duration: payload.estimated_duration,
                status: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!("Rota '{}' criada ({})", route.name, route.id);
        self.record(actor, operator_id, "create", permissions::ROUTES, route.id, json!({ "code": route.code }))
            .await;
        Ok(route)
    }

    pub async fn list_routes(
        &self,
        scope: &TenantScope,
        filter: &CatalogFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Route>> {
        self.repos.routes.list(scope, filter, page).await
    }

    pub async fn get_route(&self, scope: &TenantScope, id: Uuid) -> AppResult<Route> {
        self.repos
            .routes
            .find(scope, id)
            .await?
            .ok_or_else(|| AppError::not_found("Rota não encontrada."))
    }

    pub async fn update_route(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        id: Uuid,
        payload: UpdateRoutePayload,
    ) -> AppResult<Route> {
        payload.validate()?;
        let mut route = self.get_route(scope, id).await?;

        if let Some(code) = payload.code.as_deref().map(str::trim) {
            if let Some(other) = self.repos.routes.find_by_code(route.operator_id, code).await? {
                if other.id != route.id {
                    return Err(AppError::conflict("Já existe uma rota com esse código."));
                }
            }
            route.code = code.to_string();
        }
        if let Some(name) = payload.name {
            route.name = name.trim().to_string();
        }
        if let Some(origin) = payload.origin {
            route.origin = origin;
        }
        if let Some(destination) = payload.destination {
            route.destination = destination;
        }
        if payload.distance.is_some() {
            route.distance = payload.distance;
        }
        if payload.estimated_duration.is_some() {
            route.estimated_duration = payload.estimated_duration;
        }
        if let Some(status) = payload.status {
            route.status = status;
        }

        let updated = self.repos.routes.update(&route).await?;
        self.record(actor, updated.operator_id, "update", permissions::ROUTES, updated.id, json!({ "status": updated.status }))
            .await;
        Ok(updated)
    }

    pub async fn delete_route(&self, actor: &Principal, scope: &TenantScope, id: Uuid) -> AppResult<DeleteOutcome> {
        let mut route = self.get_route(scope, id).await?;
        let outcome = self.delete_decision(OperationRef::Route(route.id), "A rota").await?;

        match outcome {
            DeleteOutcome::Deleted => self.repos.routes.delete(route.id).await?,
            DeleteOutcome::Deactivated => {
                route.status = false;
                self.repos.routes.update(&route).await?;
            }
        }

        tracing::info!("Rota {} removida ({:?})", route.id, outcome);
        self.record(actor, route.operator_id, "delete", permissions::ROUTES, route.id, json!({ "outcome": outcome }))
            .await;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::operator::NewOperator;

    async fn setup() -> (FleetService, Principal, TenantScope) {
        let repos = Repositories::in_memory();
        let operator = repos
            .operators
            .create(NewOperator {
                name: "Transportes Norte".into(),
                tax_id: "76.111.222-3".into(),
                is_super: false,
                expiration: None,
            })
            .await
            .unwrap();
        let audit = AuditService::new(repos.audit.clone());
        let actor = Principal {
            user_id: Uuid::new_v4(),
            username: "despacho".into(),
            email: "despacho@norte.cl".into(),
            operator_id: operator.id,
            role_id: Uuid::new_v4(),
            is_super: false,
        };
        (FleetService::new(repos, audit), actor, TenantScope::Operator(operator.id))
    }

    fn driver_payload(rut: &str) -> CreateDriverPayload {
        CreateDriverPayload {
            full_name: "Pedro Soto".into(),
            rut: rut.into(),
            license_number: None,
            license_expiration: None,
            phone: None,
            email: None,
            operator_id: None,
        }
    }

    #[tokio::test]
    async fn duplicate_rut_in_same_operator_conflicts() {
        let (service, actor, scope) = setup().await;
        service.create_driver(&actor, &scope, driver_payload("12.345.678-9")).await.unwrap();

        let err = service
            .create_driver(&actor, &scope, driver_payload("12.345.678-9"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn unreferenced_driver_is_hard_deleted() {
        let (service, actor, scope) = setup().await;
        let driver = service.create_driver(&actor, &scope, driver_payload("9.876.543-2")).await.unwrap();

        let outcome = service.delete_driver(&actor, &scope, driver.id).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(matches!(
            service.get_driver(&scope, driver.id).await,
            Err(AppError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn other_tenant_cannot_see_driver() {
        let (service, actor, scope) = setup().await;
        let driver = service.create_driver(&actor, &scope, driver_payload("5.555.555-5")).await.unwrap();

        let foreign = TenantScope::Operator(Uuid::new_v4());
        assert!(matches!(
            service.get_driver(&foreign, driver.id).await,
            Err(AppError::ResourceNotFound(_))
        ));
    }
}
