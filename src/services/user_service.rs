// src/services/user_service.rs

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
        auth::{CreateUserPayload, NewUser, Principal, UpdateUserPayload, User, UserFilter},
    },
    services::{audit_service::AuditService, auth::AuthService},
};

#[derive(Clone)]
pub struct UserService {
    repos: Repositories,
    auth: AuthService,
    audit: AuditService,
}

impl UserService {
    pub fn new(repos: Repositories, auth: AuthService, audit: AuditService) -> Self {
        Self { repos, auth, audit }
    }

    pub async fn create_user(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        payload: CreateUserPayload,
    ) -> AppResult<User> {
        payload.validate()?;

        let operator_id = scope.target_operator(payload.operator_id)?;
        self.repos
            .operators
            .find_by_id(operator_id)
            .await?
            .ok_or_else(|| AppError::not_found("Operador não encontrado."))?;

        self.ensure_role_in_operator(operator_id, payload.role_id).await?;

        let username = payload.username.trim().to_string();
        let email = payload.email.trim().to_string();
        if self.repos.users.username_taken(&username, None).await? {
            return Err(AppError::conflict("Nome de usuário já cadastrado."));
        }
        if self.repos.users.email_taken(&email, None).await? {
            return Err(AppError::conflict("E-mail já cadastrado."));
        }

        let password_hash = self.auth.hash_password(&payload.password).await?;
        let user = self
            .repos
            .users
            .create(NewUser {
                operator_id,
                role_id: payload.role_id,
                username,
                email,
                password_hash,
                full_name: payload.full_name,
            })
            .await?;

        tracing::info!("Usuário '{}' criado no operador {}", user.username, operator_id);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), operator_id, "create", permissions::USERS, Some(user.id))
                    .with_details(json!({ "username": user.username, "roleId": user.role_id })),
            )
            .await;

        Ok(user)
    }

    pub async fn list_users(
        &self,
        scope: &TenantScope,
        filter: &UserFilter,
        page: &PageQuery,
    ) -> AppResult<Paginated<User>> {
        self.repos.users.list(scope, filter, page).await
    }

    pub async fn get_user(&self, scope: &TenantScope, id: Uuid) -> AppResult<User> {
        self.repos
            .users
            .find(scope, id)
            .await?
            .ok_or_else(|| AppError::not_found("Usuário não encontrado."))
    }

    pub async fn update_user(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        id: Uuid,
        payload: UpdateUserPayload,
    ) -> AppResult<User> {
        payload.validate()?;

        let mut user = self.get_user(scope, id).await?;

        if let Some(username) = payload.username.as_deref().map(str::trim) {
            if self.repos.users.username_taken(username, Some(user.id)).await? {
                return Err(AppError::conflict("Nome de usuário já cadastrado."));
            }
            user.username = username.to_string();
        }
        if let Some(email) = payload.email.as_deref().map(str::trim) {
            if self.repos.users.email_taken(email, Some(user.id)).await? {
                return Err(AppError::conflict("E-mail já cadastrado."));
            }
            user.email = email.to_string();
        }
        if let Some(role_id) = payload.role_id {
            self.ensure_role_in_operator(user.operator_id, role_id).await?;
            user.role_id = role_id;
        }
        if let Some(status) = payload.status {
            if !status && user.id == actor.user_id {
                return Err(AppError::bad_request("Não é possível desativar o próprio usuário."));
            }
            user.status = status;
        }
        if payload.full_name.is_some() {
            user.full_name = payload.full_name;
        }
        let password_changed = payload.password.is_some();
        if let Some(password) = payload.password {
            user.password_hash = self.auth.hash_password(&password).await?;
        }

        let updated = self.repos.users.update(&user).await?;

        tracing::info!("Usuário {} atualizado", updated.id);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), updated.operator_id, "update", permissions::USERS, Some(updated.id))
                    .with_details(json!({
                        "roleId": updated.role_id,
                        "status": updated.status,
                        "passwordChanged": password_changed,
                    })),
            )
            .await;

        Ok(updated)
    }

    pub async fn delete_user(&self, actor: &Principal, scope: &TenantScope, id: Uuid) -> AppResult<()> {
        let user = self.get_user(scope, id).await?;
        if user.id == actor.user_id {
            return Err(AppError::bad_request("Não é possível remover o próprio usuário."));
        }

        self.repos.users.delete(user.id).await?;

        tracing::info!("Usuário '{}' removido", user.username);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), user.operator_id, "delete", permissions::USERS, Some(user.id))
                    .with_details(json!({ "username": user.username })),
            )
            .await;
        Ok(())
    }

    async fn ensure_role_in_operator(&self, operator_id: Uuid, role_id: Uuid) -> AppResult<()> {
        self.repos
            .rbac
            .find_role(&TenantScope::Operator(operator_id), role_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::bad_request("O cargo informado não pertence ao operador."))
    }
}
