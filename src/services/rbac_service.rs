// src/services/rbac_service.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::{AppError, AppResult},
        permissions,
        scope::TenantScope,
    },
    db::Repositories,
    models::{
        audit::NewAuditLog,
        auth::Principal,
        rbac::{CreateRolePayload, Grant, NewRole, PermissionKey, Role, RoleSummary, UpdateRolePayload},
    },
    services::audit_service::AuditService,
};

/// Decisão pura do avaliador: super usuários passam sempre; os demais só
/// com a permissão `"<recurso>.<ação>"` no cargo.
pub fn evaluate(is_super: bool, granted: &HashSet<String>, resource: &str, action: &str) -> bool {
    is_super || granted.contains(&format!("{resource}.{action}"))
}

struct CachedPermissions {
    loaded_at: Instant,
    permissions: Arc<HashSet<String>>,
}

// Permissões resolvidas por cargo, com validade limitada
struct PermissionCache {
    ttl: Duration,
    entries: RwLock<HashMap<Uuid, CachedPermissions>>,
}

impl PermissionCache {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn get(&self, role_id: Uuid) -> Option<Arc<HashSet<String>>> {
        let entries = self.entries.read().await;
        entries
            .get(&role_id)
            .filter(|cached| cached.loaded_at.elapsed() < self.ttl)
            .map(|cached| cached.permissions.clone())
    }

    async fn put(&self, role_id: Uuid, permissions: Arc<HashSet<String>>) {
        self.entries.write().await.insert(
            role_id,
            CachedPermissions {
                loaded_at: Instant::now(),
                permissions,
            },
        );
    }

    async fn invalidate(&self, role_id: Uuid) {
        self.entries.write().await.remove(&role_id);
    }
}

#[derive(Clone)]
pub struct RbacService {
    repos: Repositories,
    audit: AuditService,
    cache: Arc<PermissionCache>,
}

impl RbacService {
    pub fn new(repos: Repositories, audit: AuditService, cache_ttl: Duration) -> Self {
        Self {
            repos,
            audit,
            cache: Arc::new(PermissionCache::new(cache_ttl)),
        }
    }

    // =========================================================================
    //  AVALIADOR
    // =========================================================================

    pub async fn can_access(&self, principal: &Principal, resource: &str, action: &str) -> AppResult<bool> {
        if principal.is_super {
            return Ok(true);
        }
        let granted = self.permissions_for_role(principal.role_id).await?;
        Ok(evaluate(false, &granted, resource, action))
    }

    async fn permissions_for_role(&self, role_id: Uuid) -> AppResult<Arc<HashSet<String>>> {
        if let Some(cached) = self.cache.get(role_id).await {
            return Ok(cached);
        }
        let loaded: HashSet<String> = self.repos.rbac.role_permissions(role_id).await?.into_iter().collect();
        let loaded = Arc::new(loaded);
        self.cache.put(role_id, loaded.clone()).await;
        Ok(loaded)
    }

    // =========================================================================
    //  CARGOS
    // =========================================================================

    pub async fn create_role(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        payload: CreateRolePayload,
    ) -> AppResult<RoleSummary> {
        payload.validate()?;

        let operator_id = scope.target_operator(payload.operator_id)?;
        let operator = self
            .repos
            .operators
            .find_by_id(operator_id)
            .await?
            .ok_or_else(|| AppError::not_found("Operador não encontrado."))?;
        if !operator.status {
            return Err(AppError::bad_request("O operador está inativo."));
        }

        // Valida tudo antes de qualquer escrita
        let keys = PermissionKey::parse_all(&payload.permissions)?;

        let name = role_name(&payload.name)?;
        if self.repos.rbac.find_role_by_name(operator_id, &name).await?.is_some() {
            return Err(AppError::conflict("Já existe um cargo com esse nome."));
        }

        let role = self
            .repos
            .rbac
            .create_role(
                NewRole {
                    operator_id,
                    name,
                    is_system_role: false,
                },
                &keys,
            )
            .await?;

        tracing::info!("Cargo '{}' criado no operador {}", role.name, operator_id);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), operator_id, "create", permissions::ROLES, Some(role.id))
                    .with_details(json!({ "name": role.name, "permissions": payload.permissions })),
            )
            .await;

        self.summarize(role).await
    }

    /// Cargo de sistema com todas as permissões do catálogo (Admin / SuperAdmin).
    pub async fn create_system_role(&self, operator_id: Uuid, name: &str) -> AppResult<Role> {
        let keys: Vec<PermissionKey> = permissions::catalog()
            .into_iter()
            .map(|(resource, action)| PermissionKey::new(resource, action))
            .collect();
        self.repos
            .rbac
            .create_role(
                NewRole {
                    operator_id,
                    name: name.to_string(),
                    is_system_role: true,
                },
                &keys,
            )
            .await
    }

    pub async fn update_role(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        id: Uuid,
        payload: UpdateRolePayload,
    ) -> AppResult<RoleSummary> {
        payload.validate()?;

        let mut role = self.find_role(scope, id).await?;

        // Strings inválidas abortam antes de tocar nos vínculos atuais
        let keys = payload
            .permissions
            .as_ref()
            .map(|p| PermissionKey::parse_all(p))
            .transpose()?;

        if let Some(name) = payload.name.as_deref().map(role_name).transpose()? {
            if name != role.name {
                if role.is_system_role {
                    return Err(AppError::bad_request("Cargos de sistema não podem ser renomeados."));
                }
                if let Some(other) = self.repos.rbac.find_role_by_name(role.operator_id, &name).await? {
                    if other.id != role.id {
                        return Err(AppError::conflict("Já existe um cargo com esse nome."));
                    }
                }
                role.name = name;
            }
        }

        let updated = self.repos.rbac.update_role(&role, keys.as_deref()).await?;
        self.cache.invalidate(updated.id).await;

        tracing::info!("Cargo {} atualizado", updated.id);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), updated.operator_id, "update", permissions::ROLES, Some(updated.id))
                    .with_details(json!({ "name": updated.name, "permissions": payload.permissions })),
            )
            .await;

        self.summarize(updated).await
    }

    pub async fn delete_role(&self, actor: &Principal, scope: &TenantScope, id: Uuid) -> AppResult<()> {
        let role = self.find_role(scope, id).await?;

        if role.is_system_role {
            return Err(AppError::bad_request("Cargos de sistema não podem ser removidos."));
        }

        let stats = self.repos.users.role_user_stats(role.id).await?;
        if stats.total > 0 {
            return Err(AppError::conflict(format!(
                "O cargo possui {} usuário(s) vinculado(s).",
                stats.total
            )));
        }

        self.repos.rbac.delete_role(role.id).await?;
        self.cache.invalidate(role.id).await;

        tracing::info!("Cargo '{}' removido do operador {}", role.name, role.operator_id);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), role.operator_id, "delete", permissions::ROLES, Some(role.id))
                    .with_details(json!({ "name": role.name })),
            )
            .await;
        Ok(())
    }

    pub async fn list_roles(&self, scope: &TenantScope) -> AppResult<Vec<RoleSummary>> {
        let roles = self.repos.rbac.list_roles(scope).await?;
        let mut summaries = Vec::with_capacity(roles.len());
        for role in roles {
            summaries.push(self.summarize(role).await?);
        }
        Ok(summaries)
    }

    pub async fn get_role(&self, scope: &TenantScope, id: Uuid) -> AppResult<RoleSummary> {
        let role = self.find_role(scope, id).await?;
        self.summarize(role).await
    }

    pub async fn user_count_by_role_id(&self, scope: &TenantScope, id: Uuid) -> AppResult<i64> {
        let role = self.find_role(scope, id).await?;
        Ok(self.repos.users.role_user_stats(role.id).await?.total)
    }

    pub async fn list_grants(&self) -> AppResult<Vec<Grant>> {
        self.repos.rbac.list_grants().await
    }

    async fn find_role(&self, scope: &TenantScope, id: Uuid) -> AppResult<Role> {
        self.repos
            .rbac
            .find_role(scope, id)
            .await?
            .ok_or_else(|| AppError::not_found("Cargo não encontrado."))
    }

    async fn summarize(&self, role: Role) -> AppResult<RoleSummary> {
        let permissions = self.repos.rbac.role_permissions(role.id).await?;
        let stats = self.repos.users.role_user_stats(role.id).await?;
        Ok(RoleSummary {
            role,
            permissions,
            status: stats.role_status(),
            user_count: stats.total,
        })
    }
}

// Nome sem espaços nas pontas; vazio depois do trim é rejeitado
fn role_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("O nome do cargo não pode ficar em branco."));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::operator::NewOperator;

    fn granted(perms: &[&str]) -> HashSet<String> {
        perms.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn super_users_pass_even_without_grant_rows() {
        assert!(evaluate(true, &HashSet::new(), "anything", "whatever"));
    }

    #[test]
    fn regular_users_need_the_exact_pair() {
        let perms = granted(&["drivers.read", "operations.create"]);
        assert!(evaluate(false, &perms, "drivers", "read"));
        assert!(evaluate(false, &perms, "operations", "create"));
        assert!(!evaluate(false, &perms, "drivers", "delete"));
        assert!(!evaluate(false, &perms, "operations", "read"));
    }

    fn principal(operator_id: Uuid, role_id: Uuid) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            username: "tester".into(),
            email: "tester@fleet.cl".into(),
            operator_id,
            role_id,
            is_super: false,
        }
    }

    async fn service_with_operator() -> (RbacService, Uuid) {
        let repos = Repositories::in_memory();
        let operator = repos
            .operators
            .create(NewOperator {
                name: "Transportes Sur".into(),
                tax_id: "76.000.000-1".into(),
                is_super: false,
                expiration: None,
            })
            .await
            .unwrap();
        let audit = AuditService::new(repos.audit.clone());
        (RbacService::new(repos, audit, Duration::from_secs(60)), operator.id)
    }

    #[tokio::test]
    async fn invalid_permission_leaves_existing_grants_untouched() {
        let (service, operator_id) = service_with_operator().await;
        let scope = TenantScope::Operator(operator_id);
        let actor = principal(operator_id, Uuid::new_v4());

        let role = service
            .create_role(
                &actor,
                &scope,
                CreateRolePayload {
                    name: "Despachador".into(),
                    operator_id: None,
                    permissions: vec!["operations.read".into()],
                },
            )
            .await
            .unwrap();

        let err = service
            .update_role(
                &actor,
                &scope,
                role.role.id,
                UpdateRolePayload {
                    name: None,
                    permissions: Some(vec!["operations.create".into(), "broken".into()]),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let after = service.get_role(&scope, role.role.id).await.unwrap();
        assert_eq!(after.permissions, vec!["operations.read".to_string()]);
    }

    #[tokio::test]
    async fn cache_is_invalidated_when_permissions_change() {
        let (service, operator_id) = service_with_operator().await;
        let scope = TenantScope::Operator(operator_id);
        let role = service
            .create_role(
                &principal(operator_id, Uuid::new_v4()),
                &scope,
                CreateRolePayload {
                    name: "Leitor".into(),
                    operator_id: None,
                    permissions: vec!["drivers.read".into()],
                },
            )
            .await
            .unwrap();
        let user = principal(operator_id, role.role.id);

        assert!(service.can_access(&user, "drivers", "read").await.unwrap());
        assert!(!service.can_access(&user, "drivers", "delete").await.unwrap());

        service
            .update_role(
                &user,
                &scope,
                role.role.id,
                UpdateRolePayload {
                    name: None,
                    permissions: Some(vec!["drivers.delete".into()]),
                },
            )
            .await
            .unwrap();

        assert!(!service.can_access(&user, "drivers", "read").await.unwrap());
        assert!(service.can_access(&user, "drivers", "delete").await.unwrap());
    }

    #[tokio::test]
    async fn system_roles_cannot_be_renamed_or_deleted() {
        let (service, operator_id) = service_with_operator().await;
        let scope = TenantScope::Operator(operator_id);
        let actor = principal(operator_id, Uuid::new_v4());
        let admin = service
            .create_system_role(operator_id, permissions::ADMIN_ROLE)
            .await
            .unwrap();

        let rename = service
            .update_role(
                &actor,
                &scope,
                admin.id,
                UpdateRolePayload {
                    name: Some("Root".into()),
                    permissions: None,
                },
            )
            .await;
        assert!(matches!(rename, Err(AppError::BadRequest(_))));
        assert!(matches!(
            service.delete_role(&actor, &scope, admin.id).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn blank_role_names_are_rejected() {
        let (service, operator_id) = service_with_operator().await;
        let scope = TenantScope::Operator(operator_id);
        let actor = principal(operator_id, Uuid::new_v4());

        let created = service
            .create_role(
                &actor,
                &scope,
                CreateRolePayload {
                    name: "   ".into(),
                    operator_id: None,
                    permissions: vec![],
                },
            )
            .await;
        assert!(matches!(created, Err(AppError::BadRequest(_))));

        let role = service
            .create_role(
                &actor,
                &scope,
                CreateRolePayload {
                    name: "  Despachador ".into(),
                    operator_id: None,
                    permissions: vec![],
                },
            )
            .await
            .unwrap();
        assert_eq!(role.role.name, "Despachador");

        let renamed = service
            .update_role(
                &actor,
                &scope,
                role.role.id,
                UpdateRolePayload {
                    name: Some("\t ".into()),
                    permissions: None,
                },
            )
            .await;
        assert!(matches!(renamed, Err(AppError::BadRequest(_))));
        assert_eq!(service.get_role(&scope, role.role.id).await.unwrap().role.name, "Despachador");
    }
}
