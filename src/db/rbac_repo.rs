// src/db/rbac_repo.rs

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::common::error::{map_unique_violation, AppResult};
use crate::common::scope::TenantScope;
use crate::db::RbacRepository;
use crate::models::rbac::{Grant, NewRole, PermissionKey, Role};

const ROLE_COLUMNS: &str = "id, operator_id, name, is_system_role, created_at, updated_at";
const DUPLICATE_ROLE: &str = "Já existe um cargo com esse nome.";

#[derive(Clone)]
pub struct PgRbacRepository {
    pool: PgPool,
}

impl PgRbacRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Busca ou cria os grants dentro da conexão/transação recebida
async fn ensure_grants_in(conn: &mut PgConnection, keys: &[PermissionKey]) -> AppResult<Vec<Grant>> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let resources: Vec<String> = keys.iter().map(|k| k.resource.clone()).collect();
    let actions: Vec<String> = keys.iter().map(|k| k.action.clone()).collect();

    // Inserção em massa usando UNNEST; grants existentes são preservados
    sqlx::query(
        r#"
        INSERT INTO grants (resource, action)
        SELECT * FROM UNNEST($1::text[], $2::text[])
        ON CONFLICT (resource, action) DO NOTHING
        "#,
    )
    .bind(&resources)
    .bind(&actions)
    .execute(&mut *conn)
    .await?;

    let grants = sqlx::query_as::<_, Grant>(
        r#"
        SELECT g.id, g.resource, g.action, g.created_at
        FROM grants g
        JOIN UNNEST($1::text[], $2::text[]) AS k(resource, action)
          ON g.resource = k.resource AND g.action = k.action
        ORDER BY g.resource, g.action
        "#,
    )
    .bind(&resources)
    .bind(&actions)
    .fetch_all(&mut *conn)
    .await?;

    Ok(grants)
}

async fn link_grants(conn: &mut PgConnection, role_id: Uuid, grants: &[Grant]) -> AppResult<()> {
    if grants.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = grants.iter().map(|g| g.id).collect();
    sqlx::query(
        r#"
        INSERT INTO role_grants (role_id, grant_id)
        SELECT $1, unnest($2::uuid[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(role_id)
    .bind(&ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl RbacRepository for PgRbacRepository {
    async fn list_grants(&self) -> AppResult<Vec<Grant>> {
        Ok(sqlx::query_as::<_, Grant>(
            "SELECT id, resource, action, created_at FROM grants ORDER BY resource, action",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_role(&self, new: NewRole, permissions: &[PermissionKey]) -> AppResult<Role> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO roles (operator_id, name, is_system_role)
            VALUES ($1, $2, $3)
            RETURNING {ROLE_COLUMNS}
            "#
        );
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(new.operator_id)
            .bind(&new.name)
            .bind(new.is_system_role)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, DUPLICATE_ROLE))?;

        let grants = ensure_grants_in(&mut tx, permissions).await?;
        link_grants(&mut tx, role.id, &grants).await?;

        tx.commit().await?;
        Ok(role)
    }

    async fn find_role(&self, scope: &TenantScope, id: Uuid) -> AppResult<Option<Role>> {
        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1 AND ($2::uuid IS NULL OR operator_id = $2)"
        );
        Ok(sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .bind(scope.operator_filter())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_role_by_name(&self, operator_id: Uuid, name: &str) -> AppResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE operator_id = $1 AND name = $2");
        Ok(sqlx::query_as::<_, Role>(&sql)
            .bind(operator_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_roles(&self, scope: &TenantScope) -> AppResult<Vec<Role>> {
        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE ($1::uuid IS NULL OR operator_id = $1) ORDER BY name"
        );
        Ok(sqlx::query_as::<_, Role>(&sql)
            .bind(scope.operator_filter())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_role(&self, role: &Role, permissions: Option<&[PermissionKey]>) -> AppResult<Role> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE roles SET name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ROLE_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, Role>(&sql)
            .bind(role.id)
            .bind(&role.name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, DUPLICATE_ROLE))?;

        // Substituição completa do conjunto de permissões
        if let Some(keys) = permissions {
            sqlx::query("DELETE FROM role_grants WHERE role_id = $1")
                .bind(role.id)
                .execute(&mut *tx)
                .await?;
            let grants = ensure_grants_in(&mut tx, keys).await?;
            link_grants(&mut tx, role.id, &grants).await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_role(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_grants WHERE role_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn role_permissions(&self, role_id: Uuid) -> AppResult<Vec<String>> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT g.resource || '.' || g.action
            FROM role_grants rg
            JOIN grants g ON g.id = rg.grant_id
            WHERE rg.role_id = $1
            ORDER BY 1
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
