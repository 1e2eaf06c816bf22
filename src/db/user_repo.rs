// src/db/user_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::error::{map_unique_violation, AppResult};
use crate::common::pagination::{PageQuery, Paginated};
use crate::common::scope::TenantScope;
use crate::db::UserRepository;
use crate::models::auth::{NewUser, User, UserFilter};
use crate::models::rbac::RoleUserStats;

const USER_COLUMNS: &str = "id, operator_id, role_id, username, email, password_hash, full_name, \
                            status, last_activity_at, created_at, updated_at";

const DUPLICATE_USER: &str = "Usuário ou e-mail já cadastrado.";

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, new: NewUser) -> AppResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (operator_id, role_id, username, email, password_hash, full_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(new.operator_id)
            .bind(new.role_id)
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.full_name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, DUPLICATE_USER))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR LOWER(email) = LOWER($1) LIMIT 1"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn username_taken(&self, username: &str, except: Option<Uuid>) -> AppResult<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(username)
        .bind(except)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn email_taken(&self, email: &str, except: Option<Uuid>) -> AppResult<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND ($2::uuid IS NULL OR operator_id = $2)"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(scope.operator_filter())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(
        &self,
        scope: &TenantScope,
        filter: &UserFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<User>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));

        let predicate = r#"
            ($1::uuid IS NULL OR operator_id = $1)
            AND ($2::uuid IS NULL OR role_id = $2)
            AND ($3::bool IS NULL OR status = $3)
            AND ($4::text IS NULL OR username ILIKE $4 OR email ILIKE $4 OR full_name ILIKE $4)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {predicate}"))
            .bind(scope.operator_filter())
            .bind(filter.role_id)
            .bind(filter.status)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {predicate} ORDER BY username LIMIT $5 OFFSET $6"
        );
        let data = sqlx::query_as::<_, User>(&sql)
            .bind(scope.operator_filter())
            .bind(filter.role_id)
            .bind(filter.status)
            .bind(&search)
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(data, total, page))
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let sql = format!(
            r#"
            UPDATE users
            SET role_id = $2, username = $3, email = $4, password_hash = $5,
                full_name = $6, status = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(user.role_id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.full_name)
            .bind(user.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, DUPLICATE_USER))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn touch_last_activity(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_activity_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn role_user_stats(&self, role_id: Uuid) -> AppResult<RoleUserStats> {
        let (total, active): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE status) FROM users WHERE role_id = $1",
        )
        .bind(role_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(RoleUserStats { total, active })
    }
}
