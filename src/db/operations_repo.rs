// src/db/operations_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::error::{map_unique_violation, AppError, AppResult};
use crate::common::pagination::{PageQuery, Paginated};
use crate::common::scope::TenantScope;
use crate::db::OperationsRepository;
use crate::models::operations::{
    AssignmentFilter, DriverVehicle, NewAssignment, NewOperation, Operation, OperationFilter,
    OperationRef, ReferenceCount,
};

const OPERATION_COLUMNS: &str = r#"
    id, operator_id, operation_number, driver_id, vehicle_id, client_id, provider_id, route_id,
    operation_type, origin, destination, status, scheduled_start_date, scheduled_end_date,
    actual_start_date, actual_end_date, distance, cargo_description, cargo_weight, notes,
    created_by, created_at, updated_at
"#;

const ASSIGNMENT_COLUMNS: &str =
    "id, operator_id, driver_id, vehicle_id, operation_id, is_active, assigned_at, unassigned_at";

const DUPLICATE_NUMBER: &str = "Já existe uma operação com esse número neste operador.";

#[derive(Clone)]
pub struct PgOperationsRepository {
    pool: PgPool,
}

impl PgOperationsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OperationsRepository for PgOperationsRepository {
    // =========================================================================
    //  OPERAÇÕES
    // =========================================================================

    async fn create(&self, new: NewOperation) -> AppResult<Operation> {
        let sql = format!(
            r#"
            INSERT INTO operations (
                operator_id, operation_number, driver_id, vehicle_id, client_id, provider_id, route_id,
                operation_type, origin, destination, scheduled_start_date, scheduled_end_date,
                distance, cargo_description, cargo_weight, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {OPERATION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Operation>(&sql)
            .bind(new.operator_id)
            .bind(&new.operation_number)
            .bind(new.driver_id)
            .bind(new.vehicle_id)
            .bind(new.client_id)
            .bind(new.provider_id)
            .bind(new.route_id)
            .bind(&new.operation_type)
            .bind(&new.origin)
            .bind(&new.destination)
            .bind(new.scheduled_start_date)
            .bind(new.scheduled_end_date)
            .bind(new.distance)
            .bind(&new.cargo_description)
            .bind(new.cargo_weight)
            .bind(&new.notes)
            .bind(new.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, DUPLICATE_NUMBER))
    }

    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Operation>> {
        let sql = format!(
            "SELECT {OPERATION_COLUMNS} FROM operations WHERE id = $1 AND ($2::uuid IS NULL OR operator_id = $2)"
        );
        Ok(sqlx::query_as::<_, Operation>(&sql)
            .bind(id)
            .bind(scope.operator_filter())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_number(&self, operator_id: Uuid, number: &str) -> AppResult<Option<Operation>> {
        let sql = format!(
            "SELECT {OPERATION_COLUMNS} FROM operations WHERE operator_id = $1 AND operation_number = $2"
        );
        Ok(sqlx::query_as::<_, Operation>(&sql)
            .bind(operator_id)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(
        &self,
        scope: &TenantScope,
        filter: &OperationFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<Operation>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));

        let predicate = r#"
            ($1::uuid IS NULL OR operator_id = $1)
            AND ($2::operation_status IS NULL OR status = $2)
            AND ($3::uuid IS NULL OR driver_id = $3)
            AND ($4::uuid IS NULL OR vehicle_id = $4)
            AND ($5::uuid IS NULL OR client_id = $5)
            AND ($6::timestamptz IS NULL OR scheduled_start_date >= $6)
            AND ($7::timestamptz IS NULL OR scheduled_start_date <= $7)
            AND ($8::text IS NULL OR operation_number ILIKE $8 OR origin ILIKE $8 OR destination ILIKE $8)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM operations WHERE {predicate}"))
            .bind(scope.operator_filter())
            .bind(filter.status)
            .bind(filter.driver_id)
            .bind(filter.vehicle_id)
            .bind(filter.client_id)
            .bind(filter.from)
            .bind(filter.to)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            r#"
            SELECT {OPERATION_COLUMNS} FROM operations
            WHERE {predicate}
            ORDER BY scheduled_start_date DESC, operation_number
            LIMIT $9 OFFSET $10
            "#
        );
        let data = sqlx::query_as::<_, Operation>(&sql)
            .bind(scope.operator_filter())
            .bind(filter.status)
            .bind(filter.driver_id)
            .bind(filter.vehicle_id)
            .bind(filter.client_id)
            .bind(filter.from)
            .bind(filter.to)
            .bind(&search)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(data, total, page))
    }

    async fn update(&self, op: &Operation) -> AppResult<Operation> {
        let sql = format!(
            r#"
            UPDATE operations
            SET operation_number = $2, driver_id = $3, vehicle_id = $4, client_id = $5,
                provider_id = $6, route_id = $7, operation_type = $8, origin = $9,
                destination = $10, status = $11, scheduled_start_date = $12,
                scheduled_end_date = $13, actual_start_date = $14, actual_end_date = $15,
                distance = $16, cargo_description = $17, cargo_weight = $18, notes = $19,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {OPERATION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Operation>(&sql)
            .bind(op.id)
            .bind(&op.operation_number)
            .bind(op.driver_id)
            .bind(op.vehicle_id)
            .bind(op.client_id)
            .bind(op.provider_id)
            .bind(op.route_id)
            .bind(&op.operation_type)
            .bind(&op.origin)
            .bind(&op.destination)
            .bind(op.status)
            .bind(op.scheduled_start_date)
            .bind(op.scheduled_end_date)
            .bind(op.actual_start_date)
            .bind(op.actual_end_date)
            .bind(op.distance)
            .bind(&op.cargo_description)
            .bind(op.cargo_weight)
            .bind(&op.notes)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, DUPLICATE_NUMBER))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM operations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_references(&self, reference: OperationRef) -> AppResult<ReferenceCount> {
        // A coluna vem de um enum fechado, nunca da requisição
        let sql = format!(
            r#"
            SELECT COUNT(*) FILTER (WHERE status IN ('scheduled', 'in-progress')), COUNT(*)
            FROM operations
            WHERE {} = $1
            "#,
            reference.column()
        );
        let (open, total): (i64, i64) = sqlx::query_as(&sql)
            .bind(reference.id())
            .fetch_one(&self.pool)
            .await?;
        Ok(ReferenceCount { open, total })
    }

    // =========================================================================
    //  ATRIBUIÇÕES MOTORISTA/VEÍCULO
    // =========================================================================

    async fn assign_driver(&self, new: NewAssignment) -> AppResult<DriverVehicle> {
        let mut tx = self.pool.begin().await?;

        // Trava a atribuição ativa do motorista antes de desativá-la
        let current: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM driver_vehicles WHERE driver_id = $1 AND is_active FOR UPDATE",
        )
        .bind(new.driver_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(current_id) = current {
            sqlx::query(
                "UPDATE driver_vehicles SET is_active = FALSE, unassigned_at = $2 WHERE id = $1",
            )
            .bind(current_id)
            .bind(new.assigned_at)
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!(
            r#"
            INSERT INTO driver_vehicles (operator_id, driver_id, vehicle_id, operation_id, is_active, assigned_at)
            VALUES ($1, $2, $3, $4, TRUE, $5)
            RETURNING {ASSIGNMENT_COLUMNS}
            "#
        );
        let assignment = sqlx::query_as::<_, DriverVehicle>(&sql)
            .bind(new.operator_id)
            .bind(new.driver_id)
            .bind(new.vehicle_id)
            .bind(new.operation_id)
            .bind(new.assigned_at)
            .fetch_one(&mut *tx)
            .await
            // Índice parcial: outra transação ativou o motorista no meio do caminho
            .map_err(|e| map_unique_violation(e, "O motorista já possui uma atribuição ativa."))?;

        tx.commit().await?;
        Ok(assignment)
    }

    async fn find_assignment(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<DriverVehicle>> {
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM driver_vehicles WHERE id = $1 AND ($2::uuid IS NULL OR operator_id = $2)"
        );
        Ok(sqlx::query_as::<_, DriverVehicle>(&sql)
            .bind(id)
            .bind(scope.operator_filter())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn unassign(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<DriverVehicle> {
        let sql = format!(
            r#"
            UPDATE driver_vehicles
            SET is_active = FALSE, unassigned_at = COALESCE(unassigned_at, $2)
            WHERE id = $1
            RETURNING {ASSIGNMENT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, DriverVehicle>(&sql)
            .bind(id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Atribuição não encontrada."))
    }

    async fn list_assignments(
        &self,
        scope: &TenantScope,
        filter: &AssignmentFilter,
    ) -> AppResult<Vec<DriverVehicle>> {
        let sql = format!(
            r#"
            SELECT {ASSIGNMENT_COLUMNS} FROM driver_vehicles
            WHERE ($1::uuid IS NULL OR operator_id = $1)
              AND ($2::uuid IS NULL OR driver_id = $2)
              AND ($3::uuid IS NULL OR vehicle_id = $3)
              AND (NOT $4 OR is_active)
            ORDER BY assigned_at DESC
            "#
        );
        Ok(sqlx::query_as::<_, DriverVehicle>(&sql)
            .bind(scope.operator_filter())
            .bind(filter.driver_id)
            .bind(filter.vehicle_id)
            .bind(filter.active_only.unwrap_or(true))
            .fetch_all(&self.pool)
            .await?)
    }
}
