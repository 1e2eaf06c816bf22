// src/services/operation_service.rs

use chrono::{DateTime, Utc};
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
        fleet::{Driver, PartnerKind, Vehicle},
        operations::{
            AssignDriverPayload, AssignmentFilter, CreateOperationPayload, DriverVehicle, NewAssignment,
            NewOperation, Operation, OperationDetail, OperationFilter, OperationStatus, UpdateOperationPayload,
        },
        operator::Operator,
    },
    services::audit_service::AuditService,
};

#[derive(Clone)]
pub struct OperationService {
    repos: Repositories,
    audit: AuditService,
}

// Referências opcionais de uma operação
struct OptionalRefs {
    client_id: Option<Uuid>,
    provider_id: Option<Uuid>,
    route_id: Option<Uuid>,
}

impl OperationService {
    pub fn new(repos: Repositories, audit: AuditService) -> Self {
        Self { repos, audit }
    }

    // =========================================================================
    //  VALIDAÇÕES
    // =========================================================================

    async fn active_operator(&self, operator_id: Uuid) -> AppResult<Operator> {
        let operator = self
            .repos
            .operators
            .find_by_id(operator_id)
            .await?
            .ok_or_else(|| AppError::not_found("Operador não encontrado."))?;
        if !operator.is_usable(Utc::now()) {
            return Err(AppError::bad_request("O operador está inativo ou expirado."));
        }
        Ok(operator)
    }

    /// Motorista precisa existir, ser do mesmo operador e estar ativo.
    async fn usable_driver(&self, operator_id: Uuid, driver_id: Uuid) -> AppResult<Driver> {
        let driver = self
            .repos
            .drivers
            .find(&TenantScope::All, driver_id)
            .await?
            .ok_or_else(|| AppError::not_found("Motorista não encontrado."))?;
        if driver.operator_id != operator_id {
            return Err(AppError::bad_request("O motorista não pertence ao operador da operação."));
        }
        if !driver.status {
            return Err(AppError::bad_request("O motorista está inativo."));
        }
        Ok(driver)
    }

    async fn usable_vehicle(&self, operator_id: Uuid, vehicle_id: Uuid) -> AppResult<Vehicle> {
        let vehicle = self
            .repos
            .vehicles
            .find(&TenantScope::All, vehicle_id)
            .await?
            .ok_or_else(|| AppError::not_found("Veículo não encontrado."))?;
        if vehicle.operator_id != operator_id {
            return Err(AppError::bad_request("O veículo não pertence ao operador da operação."));
        }
        if !vehicle.status {
            return Err(AppError::bad_request("O veículo está inativo."));
        }
        Ok(vehicle)
    }

    async fn check_optional_refs(&self, operator_id: Uuid, refs: &OptionalRefs) -> AppResult<()> {
        let scope = TenantScope::Operator(operator_id);
        if let Some(id) = refs.client_id {
            self.repos
                .partners
                .find(PartnerKind::Client, &scope, id)
                .await?
                .ok_or_else(|| AppError::bad_request("O cliente não pertence ao operador da operação."))?;
        }
        if let Some(id) = refs.provider_id {
            self.repos
                .partners
                .find(PartnerKind::Provider, &scope, id)
                .await?
                .ok_or_else(|| AppError::bad_request("O fornecedor não pertence ao operador da operação."))?;
        }
        if let Some(id) = refs.route_id {
            self.repos
                .routes
                .find(&scope, id)
                .await?
                .ok_or_else(|| AppError::bad_request("A rota não pertence ao operador da operação."))?;
        }
        Ok(())
    }

    fn check_dates(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> AppResult<()> {
        match end {
            Some(end) if end < start => Err(AppError::bad_request(
                "A data de término não pode ser anterior à data de início.",
            )),
            _ => Ok(()),
        }
    }

    // =========================================================================
    //  OPERAÇÕES
    // =========================================================================

    pub async fn create_operation(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        payload: CreateOperationPayload,
    ) -> AppResult<Operation> {
        let operator_id = scope.target_operator(payload.operator_id)?;
        self.create_for_operator(Some(actor), operator_id, payload).await
    }

    /// Caminho único de criação; o importador também passa por aqui.
    pub async fn create_for_operator(
        &self,
        actor: Option<&Principal>,
        operator_id: Uuid,
        payload: CreateOperationPayload,
    ) -> AppResult<Operation> {
        payload.validate()?;

        self.active_operator(operator_id).await?;
        self.usable_driver(operator_id, payload.driver_id).await?;
        self.usable_vehicle(operator_id, payload.vehicle_id).await?;
        self.check_optional_refs(
            operator_id,
            &OptionalRefs {
                client_id: payload.client_id,
                provider_id: payload.provider_id,
                route_id: payload.route_id,
            },
        )
        .await?;
        Self::check_dates(payload.scheduled_start_date, payload.scheduled_end_date)?;

        let operation_number = payload.operation_number.trim().to_string();
        if self
            .repos
            .operations
            .find_by_number(operator_id, &operation_number)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("Já existe uma operação com esse número neste operador."));
        }

        let operation = self
            .repos
            .operations
            .create(NewOperation {
                operator_id,
                operation_number,
                driver_id: payload.driver_id,
                vehicle_id: payload.vehicle_id,
                client_id: payload.client_id,
                provider_id: payload.provider_id,
                route_id: payload.route_id,
                operation_type: payload.operation_type,
                origin: payload.origin,
                destination: payload.destination,
                scheduled_start_date: payload.scheduled_start_date,
                scheduled_end_date: payload.scheduled_end_date,
                distance: payload.distance,
                cargo_description: payload.cargo_description,
                cargo_weight: payload.cargo_weight,
                notes: payload.notes,
                created_by: actor.map(|a| a.user_id),
            })
            .await?;

        self.repos
            .operations
            .assign_driver(NewAssignment {
                operator_id,
                driver_id: operation.driver_id,
                vehicle_id: operation.vehicle_id,
                operation_id: Some(operation.id),
                assigned_at: Utc::now(),
            })
            .await?;

        tracing::info!("Operação '{}' criada ({})", operation.operation_number, operation.id);
        self.audit
            .record(
                NewAuditLog::new(actor, operator_id, "create", permissions::OPERATIONS, Some(operation.id))
                    .with_details(json!({ "operationNumber": operation.operation_number })),
            )
            .await;

        Ok(operation)
    }

    pub async fn list_operations(
        &self,
        scope: &TenantScope,
        filter: &OperationFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Operation>> {
        self.repos.operations.list(scope, filter, page).await
    }

    pub async fn get_operation(&self, scope: &TenantScope, id: Uuid) -> AppResult<Operation> {
        self.repos
            .operations
            .find(scope, id)
            .await?
            .ok_or_else(|| AppError::not_found("Operação não encontrada."))
    }

    pub async fn update_operation(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        id: Uuid,
        payload: UpdateOperationPayload,
    ) -> AppResult<Operation> {
        payload.validate()?;

        let mut operation = self.get_operation(scope, id).await?;
        if operation.status != OperationStatus::Scheduled {
            return Err(AppError::bad_request("Só operações agendadas podem ser editadas."));
        }

        let operator_id = operation.operator_id;
        self.active_operator(operator_id).await?;

        if let Some(number) = payload.operation_number.as_deref().map(str::trim) {
            if let Some(other) = self.repos.operations.find_by_number(operator_id, number).await? {
                if other.id != operation.id {
                    return Err(AppError::conflict("Já existe uma operação com esse número neste operador."));
                }
            }
            operation.operation_number = number.to_string();
        }

        let previous_pair = (operation.driver_id, operation.vehicle_id);
        if let Some(driver_id) = payload.driver_id {
            self.usable_driver(operator_id, driver_id).await?;
            operation.driver_id = driver_id;
        }
        if let Some(vehicle_id) = payload.vehicle_id {
            self.usable_vehicle(operator_id, vehicle_id).await?;
            operation.vehicle_id = vehicle_id;
        }

        if let Some(client_id) = payload.client_id {
            operation.client_id = client_id;
        }
        if let Some(provider_id) = payload.provider_id {
            operation.provider_id = provider_id;
        }
        if let Some(route_id) = payload.route_id {
            operation.route_id = route_id;
        }
        self.check_optional_refs(
            operator_id,
            &OptionalRefs {
                client_id: operation.client_id,
                provider_id: operation.provider_id,
                route_id: operation.route_id,
            },
        )
        .await?;

        if let Some(operation_type) = payload.operation_type {
            operation.operation_type = operation_type;
        }
        if let Some(origin) = payload.origin {
            operation.origin = origin;
        }
        if let Some(destination) = payload.destination {
            operation.destination = destination;
        }
        if let Some(start) = payload.scheduled_start_date {
            operation.scheduled_start_date = start;
        }
        if payload.scheduled_end_date.is_some() {
            operation.scheduled_end_date = payload.scheduled_end_date;
        }
        Self::check_dates(operation.scheduled_start_date, operation.scheduled_end_date)?;

        if payload.distance.is_some() {
            operation.distance = payload.distance;
        }
        if payload.cargo_description.is_some() {
            operation.cargo_description = payload.cargo_description;
        }
        if payload.cargo_weight.is_some() {
            operation.cargo_weight = payload.cargo_weight;
        }
        if payload.notes.is_some() {
            operation.notes = payload.notes;
        }

        let updated = self.repos.operations.update(&operation).await?;

        if (updated.driver_id, updated.vehicle_id) != previous_pair {
            self.repos
                .operations
                .assign_driver(NewAssignment {
                    operator_id,
                    driver_id: updated.driver_id,
                    vehicle_id: updated.vehicle_id,
                    operation_id: Some(updated.id),
                    assigned_at: Utc::now(),
                })
                .await?;
        }

        tracing::info!("Operação {} atualizada", updated.id);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), operator_id, "update", permissions::OPERATIONS, Some(updated.id))
                    .with_details(json!({ "operationNumber": updated.operation_number })),
            )
            .await;

        Ok(updated)
    }

    pub async fn update_status(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        id: Uuid,
        next: OperationStatus,
    ) -> AppResult<Operation> {
        let mut operation = self.get_operation(scope, id).await?;
        let previous = operation.status;

        if !previous.can_transition_to(next) {
            return Err(AppError::bad_request(format!(
                "Transição de status inválida: {} -> {}.",
                previous.as_str(),
                next.as_str()
            )));
        }

        let now = Utc::now();
        match next {
            OperationStatus::InProgress => operation.actual_start_date = Some(now),
            OperationStatus::Completed | OperationStatus::Cancelled => operation.actual_end_date = Some(now),
            OperationStatus::Scheduled => {}
        }
        operation.status = next;

        let updated = self.repos.operations.update(&operation).await?;

        tracing::info!(
            "Operação {}: {} -> {}",
            updated.id,
            previous.as_str(),
            next.as_str()
        );
        self.audit
            .record(
                NewAuditLog::new(Some(actor), updated.operator_id, "status", permissions::OPERATIONS, Some(updated.id))
                    .with_details(json!({ "from": previous, "to": next })),
            )
            .await;

        Ok(updated)
    }

    pub async fn delete_operation(&self, actor: &Principal, scope: &TenantScope, id: Uuid) -> AppResult<()> {
        let operation = self.get_operation(scope, id).await?;
        if !matches!(operation.status, OperationStatus::Scheduled | OperationStatus::Cancelled) {
            return Err(AppError::bad_request(
                "Só operações agendadas ou canceladas podem ser removidas.",
            ));
        }

        self.repos.operations.delete(operation.id).await?;

        tracing::info!("Operação '{}' removida", operation.operation_number);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), operation.operator_id, "delete", permissions::OPERATIONS, Some(operation.id))
                    .with_details(json!({ "operationNumber": operation.operation_number })),
            )
            .await;
        Ok(())
    }

    /// Operação com os nomes resolvidos, para o relatório PDF.
    pub async fn detail(&self, scope: &TenantScope, id: Uuid) -> AppResult<OperationDetail> {
        let operation = self.get_operation(scope, id).await?;
        let owner = TenantScope::Operator(operation.operator_id);

        let operator = self
            .repos
            .operators
            .find_by_id(operation.operator_id)
            .await?
            .ok_or_else(|| AppError::not_found("Operador não encontrado."))?;
        let driver = self.repos.drivers.find(&owner, operation.driver_id).await?;
        let vehicle = self.repos.vehicles.find(&owner, operation.vehicle_id).await?;

        let client_name = match operation.client_id {
            Some(id) => self
                .repos
                .partners
                .find(PartnerKind::Client, &owner, id)
                .await?
                .map(|p| p.business_name),
            None => None,
        };
        let provider_name = match operation.provider_id {
            Some(id) => self
                .repos
                .partners
                .find(PartnerKind::Provider, &owner, id)
                .await?
                .map(|p| p.business_name),
            None => None,
        };
        let route_name = match operation.route_id {
            Some(id) => self.repos.routes.find(&owner, id).await?.map(|r| r.name),
            None => None,
        };

        Ok(OperationDetail {
            operator_name: operator.name,
            driver_name: driver.as_ref().map(|d| d.full_name.clone()).unwrap_or_default(),
            driver_rut: driver.map(|d| d.rut).unwrap_or_default(),
            vehicle_plate_number: vehicle.map(|v| v.plate_number).unwrap_or_default(),
            client_name,
            provider_name,
            route_name,
            operation,
        })
    }

    // =========================================================================
    //  ATRIBUIÇÕES MOTORISTA/VEÍCULO
    // =========================================================================

    pub async fn assign_driver(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        payload: AssignDriverPayload,
    ) -> AppResult<DriverVehicle> {
        let driver = self
            .repos
            .drivers
            .find(scope, payload.driver_id)
            .await?
            .ok_or_else(|| AppError::not_found("Motorista não encontrado."))?;
        let operator_id = driver.operator_id;
        self.usable_driver(operator_id, driver.id).await?;
        self.usable_vehicle(operator_id, payload.vehicle_id).await?;

        let assignment = self
            .repos
            .operations
            .assign_driver(NewAssignment {
                operator_id,
                driver_id: driver.id,
                vehicle_id: payload.vehicle_id,
                operation_id: None,
                assigned_at: Utc::now(),
            })
            .await?;

        tracing::info!("Motorista {} atribuído ao veículo {}", driver.id, payload.vehicle_id);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), operator_id, "assign", permissions::OPERATIONS, Some(assignment.id))
                    .with_details(json!({ "driverId": driver.id, "vehicleId": payload.vehicle_id })),
            )
            .await;

        Ok(assignment)
    }

    pub async fn unassign(&self, actor: &Principal, scope: &TenantScope, id: Uuid) -> AppResult<DriverVehicle> {
        let assignment = self
            .repos
            .operations
            .find_assignment(scope, id)
            .await?
            .ok_or_else(|| AppError::not_found("Atribuição não encontrada."))?;

        let closed = self.repos.operations.unassign(assignment.id, Utc::now()).await?;

        tracing::info!("Atribuição {} encerrada", closed.id);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), closed.operator_id, "unassign", permissions::OPERATIONS, Some(closed.id))
                    .with_details(json!({ "driverId": closed.driver_id, "vehicleId": closed.vehicle_id })),
            )
            .await;

        Ok(closed)
    }

    pub async fn list_assignments(
        &self,
        scope: &TenantScope,
        filter: &AssignmentFilter,
    ) -> AppResult<Vec<DriverVehicle>> {
        self.repos.operations.list_assignments(scope, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::operator::NewOperator;

    struct Fixture {
        service: OperationService,
        repos: Repositories,
        actor: Principal,
        scope: TenantScope,
        driver: Driver,
        vehicle: Vehicle,
    }

    async fn fixture() -> Fixture {
        let repos = Repositories::in_memory();
        let operator = repos
            .operators
            .create(NewOperator {
                name: "Logística Central".into(),
                tax_id: "76.333.444-5".into(),
                is_super: false,
                expiration: None,
            })
            .await
            .unwrap();
        let now = Utc::now();
        let driver = repos
            .drivers
            .create(Driver {
                id: Uuid::new_v4(),
                operator_id: operator.id,
                full_name: "Ana Rojas".into(),
                rut: "11.111.111-1".into(),
                license_number: None,
                license_expiration: None,
                phone: None,
                email: None,
                status: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let vehicle = repos
            .vehicles
            .create(Vehicle {
                id: Uuid::new_v4(),
                operator_id: operator.id,
                plate_number: "ABCD-12".into(),
                brand: None,
                model: None,
                year: None,
                vehicle_type: None,
                capacity: None,
                status: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let actor = Principal {
            user_id: Uuid::new_v4(),
            username: "ops".into(),
            email: "ops@central.cl".into(),
            operator_id: operator.id,
            role_id: Uuid::new_v4(),
            is_super: false,
        };
        let audit = AuditService::new(repos.audit.clone());
        Fixture {
            service: OperationService::new(repos.clone(), audit),
            repos,
            actor,
            scope: TenantScope::Operator(operator.id),
            driver,
            vehicle,
        }
    }

    fn payload(f: &Fixture, number: &str) -> CreateOperationPayload {
        CreateOperationPayload {
            operation_number: number.into(),
            driver_id: f.driver.id,
            vehicle_id: f.vehicle.id,
            client_id: None,
            provider_id: None,
            route_id: None,
            operation_type: "Carga".into(),
            origin: "Santiago".into(),
            destination: "Valparaíso".into(),
            scheduled_start_date: Utc::now(),
            scheduled_end_date: None,
            distance: None,
            cargo_description: None,
            cargo_weight: None,
            notes: None,
            operator_id: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_driver_to_vehicle() {
        let f = fixture().await;
        let op = f.service.create_operation(&f.actor, &f.scope, payload(&f, "OP-1")).await.unwrap();
        assert_eq!(op.status, OperationStatus::Scheduled);

        let active = f
            .service
            .list_assignments(
                &f.scope,
                &AssignmentFilter {
                    driver_id: Some(f.driver.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].operation_id, Some(op.id));
    }

    #[tokio::test]
    async fn end_before_start_is_rejected() {
        let f = fixture().await;
        let mut p = payload(&f, "OP-2");
        p.scheduled_end_date = Some(p.scheduled_start_date - chrono::Duration::hours(1));
        let err = f.service.create_operation(&f.actor, &f.scope, p).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn inactive_driver_is_rejected() {
        let f = fixture().await;
        let mut driver = f.driver.clone();
        driver.status = false;
        f.repos.drivers.update(&driver).await.unwrap();

        let err = f
            .service
            .create_operation(&f.actor, &f.scope, payload(&f, "OP-3"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn status_transitions_stamp_actual_dates() {
        let f = fixture().await;
        let op = f.service.create_operation(&f.actor, &f.scope, payload(&f, "OP-4")).await.unwrap();

        let started = f
            .service
            .update_status(&f.actor, &f.scope, op.id, OperationStatus::InProgress)
            .await
            .unwrap();
        assert!(started.actual_start_date.is_some());
        assert!(started.actual_end_date.is_none());

        let back = f
            .service
            .update_status(&f.actor, &f.scope, op.id, OperationStatus::Scheduled)
            .await;
        assert!(matches!(back, Err(AppError::BadRequest(_))));

        let done = f
            .service
            .update_status(&f.actor, &f.scope, op.id, OperationStatus::Completed)
            .await
            .unwrap();
        assert!(done.actual_end_date.is_some());

        // Concluída não pode ser editada nem removida
        let edit = f
            .service
            .update_operation(&f.actor, &f.scope, op.id, UpdateOperationPayload::default())
            .await;
        assert!(matches!(edit, Err(AppError::BadRequest(_))));
        assert!(matches!(
            f.service.delete_operation(&f.actor, &f.scope, op.id).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn detail_resolves_names() {
        let f = fixture().await;
        let op = f.service.create_operation(&f.actor, &f.scope, payload(&f, "OP-5")).await.unwrap();
        let detail = f.service.detail(&f.scope, op.id).await.unwrap();
        assert_eq!(detail.operator_name, "Logística Central");
        assert_eq!(detail.driver_rut, "11.111.111-1");
        assert_eq!(detail.vehicle_plate_number, "ABCD-12");
        assert!(detail.client_name.is_none());
    }
}
