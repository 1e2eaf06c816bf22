// src/services/import_service.rs
//
// Reconciliação de lote: cada linha é resolvida contra os cadastros do
// operador e criada pelo mesmo caminho da criação individual. Linhas são
// independentes; um erro vira registro no resultado e o laço segue.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{
        error::{AppError, AppResult},
        permissions,
    },
    db::Repositories,
    models::{
        audit::NewAuditLog,
        auth::Principal,
        fleet::PartnerKind,
        operations::{
            BatchImportResult, CreateOperationPayload, ImportRowError, OperationImportRow, RawOperationRow,
        },
    },
    services::{audit_service::AuditService, excel_service, operation_service::OperationService},
};

#[derive(Clone)]
pub struct ImportService {
    repos: Repositories,
    operations: OperationService,
    audit: AuditService,
}

// Falha de uma linha: campo + mensagem + valor ofensivo
type RowFailure = (&'static str, String, Option<String>);

impl ImportService {
    pub fn new(repos: Repositories, operations: OperationService, audit: AuditService) -> Self {
        Self { repos, operations, audit }
    }

    /// Planilha enviada: lê, valida superficialmente e reconcilia.
    pub async fn import_workbook(
        &self,
        actor: Option<&Principal>,
        operator_id: Uuid,
        bytes: &[u8],
    ) -> AppResult<BatchImportResult> {
        let rows = excel_service::parse_workbook(bytes)?;
        self.import_raw(actor, operator_id, rows).await
    }

    /// Linhas cruas (upload ou JSON). Erros da validação rasa e da
    /// reconciliação saem juntos, ordenados por linha.
    pub async fn import_raw(
        &self,
        actor: Option<&Principal>,
        operator_id: Uuid,
        rows: Vec<RawOperationRow>,
    ) -> AppResult<BatchImportResult> {
        let total_rows = rows.len();
        let (valid, shallow_errors) = excel_service::validate_rows(rows);
        let rejected: HashSet<usize> = shallow_errors.iter().map(|e| e.row).collect();

        let mut result = self.import_operations(actor, operator_id, valid).await?;

        result.total_rows = total_rows;
        result.error_count += rejected.len();
        result.errors.extend(shallow_errors);
        result.errors.sort_by_key(|e| e.row);
        result.success = result.error_count == 0;
        Ok(result)
    }

    /// Motor de reconciliação. Só falha por operador desconhecido/inativo;
    /// qualquer erro depois disso, inclusive de banco, vira erro da linha.
    pub async fn import_operations(
        &self,
        actor: Option<&Principal>,
        operator_id: Uuid,
        rows: Vec<OperationImportRow>,
    ) -> AppResult<BatchImportResult> {
        let operator = self
            .repos
            .operators
            .find_by_id(operator_id)
            .await?
            .ok_or_else(|| AppError::not_found("Operador não encontrado."))?;
        if !operator.is_usable(Utc::now()) {
            return Err(AppError::bad_request("O operador está inativo ou expirado."));
        }

        let mut result = BatchImportResult {
            total_rows: rows.len(),
            ..Default::default()
        };
        let mut seen_numbers: HashSet<String> = HashSet::new();

        for row in rows {
            let row_number = row.row;
            let number = row.operation_number.clone();

            let outcome = match self.is_duplicate(&seen_numbers, operator_id, &number).await {
                Ok(true) => {
                    result.duplicates.push(number.clone());
                    Err(("operationNumber", "Número de operação duplicado.".to_string(), Some(number.clone())))
                }
                Ok(false) => self.resolve_and_create(actor, operator_id, row).await,
                Err(e) => Err(row_failure(row_number, e)),
            };

            match outcome {
                Ok(id) => {
                    // Só números efetivamente criados bloqueiam linhas seguintes
                    seen_numbers.insert(number);
                    result.created_operations.push(id);
                    result.success_count += 1;
                }
                Err((field, message, value)) => {
                    result
                        .errors
                        .push(ImportRowError::new(row_number, field, message, value.as_deref()));
                    result.error_count += 1;
                }
            }
        }

        result.success = result.error_count == 0;

        tracing::info!(
            "Importação no operador {}: {} criada(s), {} erro(s)",
            operator_id,
            result.success_count,
            result.error_count
        );
        self.audit
            .record(
                NewAuditLog::new(actor, operator_id, "import", permissions::OPERATIONS, None).with_details(json!({
                    "totalRows": result.total_rows,
                    "successCount": result.success_count,
                    "errorCount": result.error_count,
                })),
            )
            .await;

        Ok(result)
    }

    async fn is_duplicate(&self, seen: &HashSet<String>, operator_id: Uuid, number: &str) -> AppResult<bool> {
        if seen.contains(number) {
            return Ok(true);
        }
        Ok(self.repos.operations.find_by_number(operator_id, number).await?.is_some())
    }

    async fn resolve_and_create(
        &self,
        actor: Option<&Principal>,
        operator_id: Uuid,
        row: OperationImportRow,
    ) -> Result<Uuid, RowFailure> {
        let row_number = row.row;
        let fail = |e: AppError| row_failure(row_number, e);

        let driver = match self
            .repos
            .drivers
            .find_by_rut(operator_id, &row.driver_rut)
            .await
            .map_err(fail)?
        {
            Some(driver) if driver.status => driver,
            Some(_) => {
                return Err(("driverRut", "O motorista está inativo.".into(), Some(row.driver_rut)));
            }
            None => {
                return Err(("driverRut", "Motorista não encontrado.".into(), Some(row.driver_rut)));
            }
        };

        let vehicle = match self
            .repos
            .vehicles
            .find_by_plate(operator_id, &row.vehicle_plate_number)
            .await
            .map_err(fail)?
        {
            Some(vehicle) if vehicle.status => vehicle,
            Some(_) => {
                return Err((
                    "vehiclePlateNumber",
                    "O veículo está inativo.".into(),
                    Some(row.vehicle_plate_number),
                ));
            }
            None => {
                return Err((
                    "vehiclePlateNumber",
                    "Veículo não encontrado.".into(),
                    Some(row.vehicle_plate_number),
                ));
            }
        };

        let client_id = match row.client_name.as_deref() {
            Some(name) => match self
                .repos
                .partners
                .find_by_name(PartnerKind::Client, operator_id, name)
                .await
                .map_err(fail)?
            {
                Some(client) => Some(client.id),
                None => return Err(("clientName", "Cliente não encontrado.".into(), Some(name.to_string()))),
            },
            None => None,
        };

        let provider_id = match row.provider_name.as_deref() {
            Some(name) => match self
                .repos
                .partners
                .find_by_name(PartnerKind::Provider, operator_id, name)
                .await
                .map_err(fail)?
            {
                Some(provider) => Some(provider.id),
                None => {
                    return Err((
                        "providerName",
                        "Fornecedor não encontrado.".into(),
                        Some(name.to_string()),
                    ));
                }
            },
            None => None,
        };

        let route_id = match row.route_name.as_deref() {
            Some(name) => match self.repos.routes.find_by_name(operator_id, name).await.map_err(fail)? {
                Some(route) => Some(route.id),
                None => return Err(("routeName", "Rota não encontrada.".into(), Some(name.to_string()))),
            },
            None => None,
        };

        let payload = CreateOperationPayload {
            operation_number: row.operation_number,
            driver_id: driver.id,
            vehicle_id: vehicle.id,
            client_id,
            provider_id,
            route_id,
            operation_type: row.operation_type,
            origin: row.origin,
            destination: row.destination,
            scheduled_start_date: row.scheduled_start_date.and_utc(),
            scheduled_end_date: row.scheduled_end_date.map(|d| d.and_utc()),
            distance: row.distance,
            cargo_description: row.cargo_description,
            cargo_weight: row.cargo_weight,
            notes: row.notes,
            operator_id: Some(operator_id),
        };

        self.operations
            .create_for_operator(actor, operator_id, payload)
            .await
            .map(|operation| operation.id)
            .map_err(fail)
    }
}

// Erro de infraestrutura fica no log; a linha recebe mensagem genérica
fn row_failure(row: usize, e: AppError) -> RowFailure {
    let message = match e {
        AppError::BadRequest(msg)
        | AppError::Conflict(msg)
        | AppError::ResourceNotFound(msg)
        | AppError::Forbidden(msg) => msg,
        e @ (AppError::DatabaseError(_) | AppError::InternalServerError(_)) => {
            tracing::error!("Falha de infraestrutura na linha {} da importação: {:?}", row, e);
            "Erro inesperado ao processar a linha.".to_string()
        }
        other => other.to_string(),
    };
    ("row", message, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        fleet::{Driver, Vehicle},
        operator::NewOperator,
    };
    use crate::{
        common::{
            pagination::{PageQuery, Paginated},
            scope::TenantScope,
        },
        db::{MemoryStore, OperationsRepository},
        models::operations::{
            AssignmentFilter, DriverVehicle, NewAssignment, NewOperation, Operation, OperationFilter, OperationRef,
            ReferenceCount,
        },
    };
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate};
    use std::sync::Arc;

    // Delega ao MemoryStore, mas falha ao gravar um número específico
    struct FailingCreate {
        store: Arc<MemoryStore>,
        broken_number: &'static str,
    }

    #[async_trait]
    impl OperationsRepository for FailingCreate {
        async fn create(&self, new: NewOperation) -> AppResult<Operation> {
            if new.operation_number == self.broken_number {
                return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
            }
            self.store.create(new).await
        }
        async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Operation>> {
            self.store.find(scope, id).await
        }
        async fn find_by_number(&self, operator_id: Uuid, number: &str) -> AppResult<Option<Operation>> {
            self.store.find_by_number(operator_id, number).await
        }
        async fn list(
            &self,
            scope: &TenantScope,
            filter: &OperationFilter,
            page: &PageQuery,
        ) -> AppResult<Paginated<Operation>> {
            OperationsRepository::list(self.store.as_ref(), scope, filter, page).await
        }
        async fn update(&self, operation: &Operation) -> AppResult<Operation> {
            OperationsRepository::update(self.store.as_ref(), operation).await
        }
        async fn delete(&self, id: Uuid) -> AppResult<()> {
            OperationsRepository::delete(self.store.as_ref(), id).await
        }
        async fn count_references(&self, reference: OperationRef) -> AppResult<ReferenceCount> {
            self.store.count_references(reference).await
        }
        async fn assign_driver(&self, new: NewAssignment) -> AppResult<DriverVehicle> {
            self.store.assign_driver(new).await
        }
        async fn find_assignment(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<DriverVehicle>> {
            self.store.find_assignment(scope, id).await
        }
        async fn unassign(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<DriverVehicle> {
            self.store.unassign(id, at).await
        }
        async fn list_assignments(
            &self,
            scope: &TenantScope,
            filter: &AssignmentFilter,
        ) -> AppResult<Vec<DriverVehicle>> {
            self.store.list_assignments(scope, filter).await
        }
    }

    fn repositories_failing_on(broken_number: &'static str) -> Repositories {
        let store = Arc::new(MemoryStore::default());
        Repositories {
            operators: store.clone(),
            users: store.clone(),
            rbac: store.clone(),
            drivers: store.clone(),
            vehicles: store.clone(),
            partners: store.clone(),
            routes: store.clone(),
            operations: Arc::new(FailingCreate { store: store.clone(), broken_number }),
            audit: store,
        }
    }

    async fn setup() -> (ImportService, Repositories, Uuid) {
        setup_with(Repositories::in_memory()).await
    }

    async fn setup_with(repos: Repositories) -> (ImportService, Repositories, Uuid) {
        let operator = repos
            .operators
            .create(NewOperator {
                name: "Transportes Lote".into(),
                tax_id: "76.555.666-7".into(),
                is_super: false,
                expiration: None,
            })
            .await
            .unwrap();
        let now = Utc::now();
        repos
            .drivers
            .create(Driver {
                id: Uuid::new_v4(),
                operator_id: operator.id,
                full_name: "Luis Muñoz".into(),
                rut: "12.345.678-9".into(),
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
        repos
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

        let audit = AuditService::new(repos.audit.clone());
        let operations = OperationService::new(repos.clone(), audit.clone());
        (ImportService::new(repos.clone(), operations, audit), repos, operator.id)
    }

    fn row(row: usize, number: &str, rut: &str) -> OperationImportRow {
        OperationImportRow {
            row,
            operation_number: number.into(),
            driver_rut: rut.into(),
            vehicle_plate_number: "ABCD-12".into(),
            operation_type: "Carga".into(),
            origin: "Santiago".into(),
            destination: "Concepción".into(),
            scheduled_start_date: NaiveDate::from_ymd_opt(2025, 3, 10)
                .and_then(|d| d.and_hms_opt(8, 0, 0))
                .unwrap(),
            scheduled_end_date: None,
            client_name: None,
            provider_name: None,
            route_name: None,
            distance: None,
            cargo_description: None,
            cargo_weight: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn partial_success_reports_each_failure() {
        let (service, _, operator_id) = setup().await;
        let rows = vec![
            row(2, "OP-1", "12.345.678-9"),
            row(3, "OP-2", "99.999.999-9"),
            row(4, "OP-1", "12.345.678-9"),
        ];

        let result = service.import_operations(None, operator_id, rows).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.total_rows, 3);
        assert_eq!(result.success_count, 1);
        assert_eq!(result.error_count, 2);
        assert_eq!(result.created_operations.len(), 1);
        assert_eq!(result.duplicates, vec!["OP-1".to_string()]);

        assert_eq!(result.errors[0].row, 3);
        assert_eq!(result.errors[0].field, "driverRut");
        assert_eq!(result.errors[1].row, 4);
        assert_eq!(result.errors[1].field, "operationNumber");
    }

    #[tokio::test]
    async fn unknown_optional_reference_fails_only_that_row() {
        let (service, _, operator_id) = setup().await;
        let mut typo = row(2, "OP-10", "12.345.678-9");
        typo.client_name = Some("Cliente Inexistente".into());

        let result = service
            .import_operations(None, operator_id, vec![typo, row(3, "OP-11", "12.345.678-9")])
            .await
            .unwrap();

        assert_eq!(result.success_count, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "clientName");
        assert_eq!(result.errors[0].value.as_deref(), Some("Cliente Inexistente"));
    }

    #[tokio::test]
    async fn unknown_operator_fails_the_whole_call() {
        let (service, _, _) = setup().await;
        let err = service
            .import_operations(None, Uuid::new_v4(), vec![row(2, "OP-1", "12.345.678-9")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn shallow_errors_are_merged_with_engine_errors() {
        let (service, repos, operator_id) = setup().await;
        let raw = vec![
            RawOperationRow {
                row: Some(2),
                operation_number: Some("OP-20".into()),
                scheduled_start_date: Some("2025-03-10 08:00".into()),
                driver_rut: Some("12.345.678-9".into()),
                vehicle_plate_number: Some("ABCD-12".into()),
                operation_type: Some("Carga".into()),
                origin: Some("Santiago".into()),
                destination: Some("Temuco".into()),
                ..Default::default()
            },
            RawOperationRow {
                row: Some(3),
                operation_number: Some("OP-21".into()),
                ..Default::default()
            },
        ];

        let result = service.import_raw(None, operator_id, raw).await.unwrap();
        assert_eq!(result.total_rows, 2);
        assert_eq!(result.success_count, 1);
        assert_eq!(result.error_count, 1);
        assert!(result.errors.iter().all(|e| e.row == 3));

        let created = repos
            .operations
            .find_by_number(operator_id, "OP-20")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.scheduled_start_date.to_rfc3339(), "2025-03-10T08:00:00+00:00");
    }

    #[tokio::test]
    async fn failed_row_does_not_reserve_its_number() {
        let (service, _, operator_id) = setup().await;
        let rows = vec![row(2, "OP-9", "99.999.999-9"), row(3, "OP-9", "12.345.678-9")];

        let result = service.import_operations(None, operator_id, rows).await.unwrap();

        assert_eq!(result.success_count, 1);
        assert_eq!(result.created_operations.len(), 1);
        assert!(result.duplicates.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].row, 2);
        assert_eq!(result.errors[0].field, "driverRut");
    }

    #[tokio::test]
    async fn database_failure_on_one_row_keeps_the_rest_of_the_batch() {
        let (service, repos, operator_id) = setup_with(repositories_failing_on("OP-31")).await;
        let rows = vec![
            row(2, "OP-30", "12.345.678-9"),
            row(3, "OP-31", "12.345.678-9"),
            row(4, "OP-32", "12.345.678-9"),
        ];

        let result = service.import_operations(None, operator_id, rows).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.created_operations.len(), 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].row, 3);
        assert_eq!(result.errors[0].field, "row");
        assert_eq!(result.errors[0].message, "Erro inesperado ao processar a linha.");
        assert!(repos.operations.find_by_number(operator_id, "OP-32").await.unwrap().is_some());
    }
}
