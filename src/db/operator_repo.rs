// src/db/operator_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::error::{map_unique_violation, AppResult};
use crate::common::pagination::{PageQuery, Paginated};
use crate::common::scope::TenantScope;
use crate::db::OperatorRepository;
use crate::models::operator::{NewOperator, Operator};

const OPERATOR_COLUMNS: &str =
    "id, name, tax_id, is_super, status, expiration, created_at, updated_at";

#[derive(Clone)]
pub struct PgOperatorRepository {
    pool: PgPool,
}

impl PgOperatorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OperatorRepository for PgOperatorRepository {
    async fn create(&self, new: NewOperator) -> AppResult<Operator> {
        let sql = format!(
            r#"
            INSERT INTO operators (name, tax_id, is_super, expiration)
            VALUES ($1, $2, $3, $4)
            RETURNING {OPERATOR_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Operator>(&sql)
            .bind(&new.name)
            .bind(&new.tax_id)
            .bind(new.is_super)
            .bind(new.expiration)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "Já existe um operador com esse RUT."))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Operator>> {
        let sql = format!("SELECT {OPERATOR_COLUMNS} FROM operators WHERE id = $1");
        Ok(sqlx::query_as::<_, Operator>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_tax_id(&self, tax_id: &str) -> AppResult<Option<Operator>> {
        let sql = format!("SELECT {OPERATOR_COLUMNS} FROM operators WHERE tax_id = $1");
        Ok(sqlx::query_as::<_, Operator>(&sql)
            .bind(tax_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Operator>> {
        let sql = format!(
            "SELECT {OPERATOR_COLUMNS} FROM operators WHERE id = $1 AND ($2::uuid IS NULL OR id = $2)"
        );
        Ok(sqlx::query_as::<_, Operator>(&sql)
            .bind(id)
            .bind(scope.operator_filter())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(&self, scope: &TenantScope, page: &PageQuery) -> AppResult<Paginated<Operator>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM operators WHERE ($1::uuid IS NULL OR id = $1)")
                .bind(scope.operator_filter())
                .fetch_one(&self.pool)
                .await?;

        let sql = format!(
            r#"
            SELECT {OPERATOR_COLUMNS} FROM operators
            WHERE ($1::uuid IS NULL OR id = $1)
            ORDER BY name
            LIMIT $2 OFFSET $3
            "#
        );
        let data = sqlx::query_as::<_, Operator>(&sql)
            .bind(scope.operator_filter())
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(data, total, page))
    }

    async fn update(&self, operator: &Operator) -> AppResult<Operator> {
        let sql = format!(
            r#"
            UPDATE operators
            SET name = $2, tax_id = $3, is_super = $4, status = $5, expiration = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {OPERATOR_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Operator>(&sql)
            .bind(operator.id)
            .bind(&operator.name)
            .bind(&operator.tax_id)
            .bind(operator.is_super)
            .bind(operator.status)
            .bind(operator.expiration)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "Já existe um operador com esse RUT."))
    }

    // Cargos do operador caem junto (sem usuários, não há quem os use)
    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_grants WHERE role_id IN (SELECT id FROM roles WHERE operator_id = $1)")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM roles WHERE operator_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM operators WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count_dependents(&self, id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM users WHERE operator_id = $1)
                 + (SELECT COUNT(*) FROM operations WHERE operator_id = $1)
                 + (SELECT COUNT(*) FROM drivers WHERE operator_id = $1)
                 + (SELECT COUNT(*) FROM vehicles WHERE operator_id = $1)
                 + (SELECT COUNT(*) FROM clients WHERE operator_id = $1)
                 + (SELECT COUNT(*) FROM providers WHERE operator_id = $1)
                 + (SELECT COUNT(*) FROM routes WHERE operator_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM operators")
            .fetch_one(&self.pool)
            .await?)
    }
}
