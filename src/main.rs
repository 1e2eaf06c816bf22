// src/main.rs

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use fleet_backend::{
    build_router,
    config::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env().context("Falha ao carregar a configuração")?;
    let app_state = AppState::from_config(config)
        .await
        .context("Falha ao inicializar o estado da aplicação")?;

    // Migrações só fazem sentido com Postgres
    if let Some(pool) = &app_state.db_pool {
        sqlx::migrate!()
            .run(pool)
            .await
            .context("Falha ao rodar as migrações do banco de dados")?;
        tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");
    }

    if let Some(password) = app_state.config.bootstrap_admin_password.clone() {
        match app_state.operator_service.bootstrap(&password).await {
            Ok(Some(operator)) => tracing::info!("Operador inicial '{}' criado com o usuário admin", operator.name),
            Ok(None) => tracing::debug!("Bootstrap ignorado: já existem operadores"),
            Err(e) => return Err(anyhow::anyhow!("Falha no bootstrap do administrador: {e}")),
        }
    }

    let addr = app_state.config.bind_addr.clone();
    let app = build_router(app_state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Falha ao iniciar o listener TCP em {addr}"))?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("Erro no servidor Axum")?;
    Ok(())
}
