// src/db/audit_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::common::error::AppResult;
use crate::common::pagination::{PageQuery, Paginated};
use crate::common::scope::TenantScope;
use crate::db::AuditRepository;
use crate::models::audit::{AuditFilter, AuditLog, NewAuditLog};

const AUDIT_COLUMNS: &str =
    "id, operator_id, user_id, action, entity_type, entity_id, details, created_at";

#[derive(Clone)]
pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn insert(&self, entry: NewAuditLog) -> AppResult<AuditLog> {
        let sql = format!(
            r#"
            INSERT INTO audit_logs (operator_id, user_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {AUDIT_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, AuditLog>(&sql)
            .bind(entry.operator_id)
            .bind(entry.user_id)
            .bind(&entry.action)
            .bind(&entry.entity_type)
            .bind(entry.entity_id)
            .bind(&entry.details)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list(
        &self,
        scope: &TenantScope,
        filter: &AuditFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<AuditLog>> {
        let predicate = r#"
            ($1::uuid IS NULL OR operator_id = $1)
            AND ($2::text IS NULL OR entity_type = $2)
            AND ($3::text IS NULL OR action = $3)
            AND ($4::uuid IS NULL OR user_id = $4)
            AND ($5::uuid IS NULL OR entity_id = $5)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM audit_logs WHERE {predicate}"))
            .bind(scope.operator_filter())
            .bind(&filter.entity_type)
            .bind(&filter.action)
            .bind(filter.user_id)
            .bind(filter.entity_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE {predicate} ORDER BY created_at DESC LIMIT $6 OFFSET $7"
        );
        let data = sqlx::query_as::<_, AuditLog>(&sql)
            .bind(scope.operator_filter())
            .bind(&filter.entity_type)
            .bind(&filter.action)
            .bind(filter.user_id)
            .bind(filter.entity_id)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(data, total, page))
    }
}
