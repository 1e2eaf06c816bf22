// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
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
        auth::{AuthResponse, Claims, LoginUserPayload, NewUser, Principal, RegisterUserPayload, User},
    },
    services::audit_service::AuditService,
};

#[derive(Clone)]
pub struct AuthService {
    repos: Repositories,
    audit: AuditService,
    jwt_secret: String,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(
        repos: Repositories,
        audit: AuditService,
        jwt_secret: String,
        token_ttl_hours: i64,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            repos,
            audit,
            jwt_secret,
            token_ttl: Duration::hours(token_ttl_hours),
            bcrypt_cost,
        }
    }

    pub async fn hash_password(&self, password: &str) -> AppResult<String> {
        let password_clone = password.to_owned();
        let cost = self.bcrypt_cost;
        let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, cost))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
        Ok(hashed)
    }

    async fn verify_password(&self, password: &str, password_hash: &str) -> AppResult<bool> {
        let password_clone = password.to_owned();
        let hash_clone = password_hash.to_owned();

        // Executa a verificação em um thread separado
        let valid = tokio::task::spawn_blocking(move || verify(&password_clone, &hash_clone))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;
        Ok(valid)
    }

    pub async fn register_user(&self, payload: RegisterUserPayload) -> AppResult<AuthResponse> {
        payload.validate()?;

        let operator = self
            .repos
            .operators
            .find_by_id(payload.operator_id)
            .await?
            .ok_or_else(|| AppError::not_found("Operador não encontrado."))?;
        if !operator.is_usable(Utc::now()) {
            return Err(AppError::bad_request("O operador está inativo ou expirado."));
        }

        // O cargo precisa ser do mesmo operador
        self.repos
            .rbac
            .find_role(&TenantScope::Operator(operator.id), payload.role_id)
            .await?
            .ok_or_else(|| AppError::bad_request("O cargo informado não pertence ao operador."))?;

        if self.repos.users.username_taken(&payload.username, None).await? {
            return Err(AppError::conflict("Nome de usuário já cadastrado."));
        }
        if self.repos.users.email_taken(&payload.email, None).await? {
            return Err(AppError::conflict("E-mail já cadastrado."));
        }

        let password_hash = self.hash_password(&payload.password).await?;
        let user = self
            .repos
            .users
            .create(NewUser {
                operator_id: operator.id,
                role_id: payload.role_id,
                username: payload.username.trim().to_string(),
                email: payload.email.trim().to_string(),
                password_hash,
                full_name: payload.full_name,
            })
            .await?;

        tracing::info!("Usuário '{}' registrado no operador {}", user.username, operator.id);
        let principal = Principal::from_user(&user, operator.is_super);
        self.audit
            .record(NewAuditLog::new(
                Some(&principal),
                operator.id,
                "register",
                permissions::USERS,
                Some(user.id),
            ))
            .await;

        let token = self.create_token(&principal)?;
        Ok(AuthResponse { token, user: principal })
    }

    pub async fn login_user(&self, payload: LoginUserPayload) -> AppResult<AuthResponse> {
        payload.validate()?;

        let user = self
            .repos
            .users
            .find_by_login(payload.username.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !self.verify_password(&payload.password, &user.password_hash).await? {
            tracing::warn!("Senha inválida para '{}'", user.username);
            return Err(AppError::InvalidCredentials);
        }

        let principal = self.principal_for(&user).await?;

        let now = Utc::now();
        self.repos.users.touch_last_activity(user.id, now).await?;
        self.audit
            .record(NewAuditLog::new(
                Some(&principal),
                user.operator_id,
                "login",
                permissions::USERS,
                Some(user.id),
            ))
            .await;

        let token = self.create_token(&principal)?;
        Ok(AuthResponse { token, user: principal })
    }

    /// Valida o JWT e recarrega o usuário: desativações valem na hora.
    pub async fn validate_token(&self, token: &str) -> AppResult<Principal> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        let user = self
            .repos
            .users
            .find_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        self.principal_for(&user).await.map_err(|_| AppError::InvalidToken)
    }

    pub async fn me(&self, principal: &Principal) -> AppResult<User> {
        self.repos
            .users
            .find_by_id(principal.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Usuário não encontrado."))
    }

    // Usuário ativo, operador ativo e dentro da validade
    async fn principal_for(&self, user: &User) -> AppResult<Principal> {
        if !user.status {
            return Err(AppError::InvalidCredentials);
        }
        let operator = self
            .repos
            .operators
            .find_by_id(user.operator_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        if !operator.is_usable(Utc::now()) {
            tracing::warn!("Login bloqueado: operador {} inativo ou expirado", operator.id);
            return Err(AppError::InvalidCredentials);
        }
        Ok(Principal::from_user(user, operator.is_super))
    }

    fn create_token(&self, principal: &Principal) -> AppResult<String> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;

        let claims = Claims {
            sub: principal.user_id,
            username: principal.username.clone(),
            email: principal.email.clone(),
            operator_id: principal.operator_id,
            role_id: principal.role_id,
            is_super: principal.is_super,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}
