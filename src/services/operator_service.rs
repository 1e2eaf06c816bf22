// src/services/operator_service.rs

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
        auth::{NewUser, Principal},
        operator::{CreateOperatorPayload, NewOperator, Operator, UpdateOperatorPayload},
    },
    services::{audit_service::AuditService, auth::AuthService, rbac_service::RbacService},
};

pub const PLATFORM_OPERATOR_NAME: &str = "Plataforma";
pub const PLATFORM_TAX_ID: &str = "00.000.000-0";
pub const BOOTSTRAP_USERNAME: &str = "admin";

#[derive(Clone)]
pub struct OperatorService {
    repos: Repositories,
    rbac: RbacService,
    auth: AuthService,
    audit: AuditService,
}

impl OperatorService {
    pub fn new(repos: Repositories, rbac: RbacService, auth: AuthService, audit: AuditService) -> Self {
        Self { repos, rbac, auth, audit }
    }

    /// Cria o operador e o seu cargo "Admin" com todas as permissões do catálogo.
    pub async fn create_operator(&self, actor: &Principal, payload: CreateOperatorPayload) -> AppResult<Operator> {
        if !actor.is_super {
            return Err(AppError::forbidden("Apenas usuários da plataforma podem criar operadores."));
        }
        payload.validate()?;

        if self.repos.operators.find_by_tax_id(payload.tax_id.trim()).await?.is_some() {
            return Err(AppError::conflict("Já existe um operador com esse RUT."));
        }

        let operator = self
            .repos
            .operators
            .create(NewOperator {
                name: payload.name.trim().to_string(),
                tax_id: payload.tax_id.trim().to_string(),
                is_super: payload.is_super,
                expiration: payload.expiration,
            })
            .await?;

        // Sem transação entre repositórios: desfaz o operador se o cargo falhar
        if let Err(e) = self.rbac.create_system_role(operator.id, permissions::ADMIN_ROLE).await {
            tracing::error!("Falha ao criar cargo Admin do operador {}: {:?}", operator.id, e);
            self.repos.operators.delete(operator.id).await?;
            return Err(e);
        }

        tracing::info!("Operador '{}' criado ({})", operator.name, operator.id);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), operator.id, "create", permissions::OPERATORS, Some(operator.id))
                    .with_details(json!({ "name": operator.name, "taxId": operator.tax_id })),
            )
            .await;

        Ok(operator)
    }

    /// Semeia o operador da plataforma + usuário SuperAdmin num store vazio.
    /// Retorna `None` quando já existe algum operador.
    pub async fn bootstrap(&self, admin_password: &str) -> AppResult<Option<Operator>> {
        if self.repos.operators.count().await? > 0 {
            return Ok(None);
        }

        let operator = self
            .repos
            .operators
            .create(NewOperator {
                name: PLATFORM_OPERATOR_NAME.to_string(),
                tax_id: PLATFORM_TAX_ID.to_string(),
                is_super: true,
                expiration: None,
            })
            .await?;

        let role = self
            .rbac
            .create_system_role(operator.id, permissions::SUPER_ADMIN_ROLE)
            .await?;

        let password_hash = self.auth.hash_password(admin_password).await?;
        let user = self
            .repos
            .users
            .create(NewUser {
                operator_id: operator.id,
                role_id: role.id,
                username: BOOTSTRAP_USERNAME.to_string(),
                email: "admin@localhost".to_string(),
                password_hash,
                full_name: Some("Administrador".to_string()),
            })
            .await?;

        tracing::info!("🌱 Operador da plataforma criado; usuário inicial '{}'", user.username);
        self.audit
            .record(NewAuditLog::new(None, operator.id, "bootstrap", permissions::OPERATORS, Some(operator.id)))
            .await;

        Ok(Some(operator))
    }

    pub async fn list_operators(&self, scope: &TenantScope, page: &PageQuery) -> AppResult<Paginated<Operator>> {
        self.repos.operators.list(scope, page).await
    }

    pub async fn get_operator(&self, scope: &TenantScope, id: Uuid) -> AppResult<Operator> {
        self.repos
            .operators
            .find(scope, id)
            .await?
            .ok_or_else(|| AppError::not_found("Operador não encontrado."))
    }

    pub async fn update_operator(
        &self,
        actor: &Principal,
        scope: &TenantScope,
        id: Uuid,
        payload: UpdateOperatorPayload,
    ) -> AppResult<Operator> {
        payload.validate()?;

        let mut operator = self.get_operator(scope, id).await?;

        if let Some(name) = payload.name {
            operator.name = name.trim().to_string();
        }
        if let Some(tax_id) = payload.tax_id {
            let tax_id = tax_id.trim().to_string();
            if let Some(other) = self.repos.operators.find_by_tax_id(&tax_id).await? {
                if other.id != operator.id {
                    return Err(AppError::conflict("Já existe um operador com esse RUT."));
                }
            }
            operator.tax_id = tax_id;
        }
        if let Some(is_super) = payload.is_super {
            if !actor.is_super && is_super != operator.is_super {
                return Err(AppError::forbidden(
                    "Apenas usuários da plataforma podem alterar o indicador super.",
                ));
            }
            operator.is_super = is_super;
        }
        if let Some(status) = payload.status {
            operator.status = status;
        }
        if let Some(expiration) = payload.expiration {
            operator.expiration = expiration;
        }

        let updated = self.repos.operators.update(&operator).await?;

        tracing::info!("Operador {} atualizado", updated.id);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), updated.id, "update", permissions::OPERATORS, Some(updated.id))
                    .with_details(json!({
                        "status": updated.status,
                        "expired": !updated.is_usable(Utc::now()),
                    })),
            )
            .await;

        Ok(updated)
    }

    pub async fn delete_operator(&self, actor: &Principal, id: Uuid) -> AppResult<()> {
        if !actor.is_super {
            return Err(AppError::forbidden("Apenas usuários da plataforma podem remover operadores."));
        }
        if actor.operator_id == id {
            return Err(AppError::bad_request("Não é possível remover o próprio operador."));
        }

        let operator = self.get_operator(&TenantScope::All, id).await?;

        let dependents = self.repos.operators.count_dependents(operator.id).await?;
        if dependents > 0 {
            return Err(AppError::bad_request(
                "O operador possui usuários, cadastros ou operações e não pode ser removido.",
            ));
        }

        self.repos.operators.delete(operator.id).await?;

        tracing::info!("Operador '{}' removido", operator.name);
        self.audit
            .record(
                NewAuditLog::new(Some(actor), actor.operator_id, "delete", permissions::OPERATORS, Some(operator.id))
                    .with_details(json!({ "name": operator.name })),
            )
            .await;
        Ok(())
    }
}
