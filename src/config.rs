// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::Repositories,
    services::{
        audit_service::AuditService, auth::AuthService, document_service::DocumentService,
        fleet_service::FleetService, import_service::ImportService, operation_service::OperationService,
        operator_service::OperatorService, rbac_service::RbacService, user_service::UserService,
    },
};

#[derive(Debug, Clone)]
pub struct Config {
    /// Ausente = store em memória (desenvolvimento/testes)
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub bind_addr: String,
    pub frontend_origin: String,
    pub permission_cache_ttl: Duration,
    pub fonts_dir: String,
    pub bootstrap_admin_password: Option<String>,
    pub bcrypt_cost: u32,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} contém um valor inválido: '{raw}'")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 10)?,
            jwt_secret,
            jwt_ttl_hours: parse_var("JWT_TTL_HOURS", 24)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            frontend_origin: env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string()),
            permission_cache_ttl: Duration::from_secs(parse_var("PERMISSION_CACHE_TTL_SECS", 60)?),
            fonts_dir: env::var("FONTS_DIR").unwrap_or_else(|_| "./fonts".to_string()),
            bootstrap_admin_password: env::var("BOOTSTRAP_ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
            bcrypt_cost: parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
        })
    }

    /// Configuração dos testes: sem banco, bcrypt barato.
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            db_max_connections: 1,
            jwt_secret: "segredo-de-testes".to_string(),
            jwt_ttl_hours: 1,
            bind_addr: "127.0.0.1:0".to_string(),
            frontend_origin: "http://localhost:5173".to_string(),
            permission_cache_ttl: Duration::from_secs(60),
            fonts_dir: "./fonts".to_string(),
            bootstrap_admin_password: None,
            bcrypt_cost: 4,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: Option<PgPool>,
    pub repos: Repositories,
    pub audit_service: AuditService,
    pub auth_service: AuthService,
    pub rbac_service: RbacService,
    pub operator_service: OperatorService,
    pub user_service: UserService,
    pub fleet_service: FleetService,
    pub operation_service: OperationService,
    pub import_service: ImportService,
    pub document_service: DocumentService,
}

impl AppState {
    /// Conecta ao Postgres se houver DATABASE_URL; senão usa o store em memória.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        match config.database_url.clone() {
            Some(database_url) => {
                // Conecta ao banco de dados, usando '?' para propagar erros
                let db_pool = PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(&database_url)
                    .await
                    .context("Falha ao conectar no banco de dados")?;

                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
                let repos = Repositories::postgres(db_pool.clone());
                Ok(Self::assemble(config, Some(db_pool), repos))
            }
            None => {
                tracing::warn!("DATABASE_URL ausente: usando store em memória (dados não persistem)");
                Ok(Self::in_memory(config))
            }
        }
    }

    pub fn in_memory(config: Config) -> Self {
        Self::assemble(config, None, Repositories::in_memory())
    }

    // --- Monta o gráfico de dependências ---
    fn assemble(config: Config, db_pool: Option<PgPool>, repos: Repositories) -> Self {
        let audit_service = AuditService::new(repos.audit.clone());
        let auth_service = AuthService::new(
            repos.clone(),
            audit_service.clone(),
            config.jwt_secret.clone(),
            config.jwt_ttl_hours,
            config.bcrypt_cost,
        );
        let rbac_service = RbacService::new(repos.clone(), audit_service.clone(), config.permission_cache_ttl);
        let operator_service = OperatorService::new(
            repos.clone(),
            rbac_service.clone(),
            auth_service.clone(),
            audit_service.clone(),
        );
        let user_service = UserService::new(repos.clone(), auth_service.clone(), audit_service.clone());
        let fleet_service = FleetService::new(repos.clone(), audit_service.clone());
        let operation_service = OperationService::new(repos.clone(), audit_service.clone());
        let import_service = ImportService::new(repos.clone(), operation_service.clone(), audit_service.clone());
        let document_service = DocumentService::new(operation_service.clone(), config.fonts_dir.clone());

        Self {
            config: Arc::new(config),
            db_pool,
            repos,
            audit_service,
            auth_service,
            rbac_service,
            operator_service,
            user_service,
            fleet_service,
            operation_service,
            import_service,
            document_service,
        }
    }
}
