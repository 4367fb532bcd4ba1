//! Ponto de entrada do serviço do mutirão de saúde
//!
//! # Variáveis de ambiente
//! - `CAMP_ADDR`: endereço HTTP (padrão: "0.0.0.0:3000")
//! - `DATABASE_PATH`: arquivo SQLite (padrão: "data/camp.db")
//! - `DB_MAX_CONNECTIONS`: tamanho do pool (padrão: 5)
//! - `CAMP_ENV_FILE`: arquivo reescrito pelo modo de manutenção (padrão: ".env")
//! - `MAINTENANCE_MODE`: recusa as rotas `/api` com 503 (padrão: false)
//! - `CAMP_SEED`: insere os dados iniciais (padrão: true)
//! - `LOG_FORMAT`: `text` ou `json` (padrão: text)
//! - `MAX_CONCURRENT_REQUESTS`: limite de requisições simultâneas (padrão: 256)
//! - `RUST_LOG`: filtro de logs

use anyhow::{Context, Result};
use camp_server::{app, built_info, AppConfig, AppState, LogFormat};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "camp_server=info,camp_db=info,tower_http=info";

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (text, json) = match format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Falha ao aguardar sinal de encerramento: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Encerrando servidor...");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Configuração inválida")?;
    init_tracing(config.log_format);

    info!(
        "Iniciando {} v{} ({})",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::PROFILE
    );

    let pool = camp_db::init_db_pool(&config.database).await?;

    if config.seed {
        camp_db::seed::seed_defaults(&pool)
            .await
            .context("Falha ao inserir dados iniciais")?;
    }

    if config.maintenance_mode {
        warn!("Modo de manutenção ativo: rotas /api respondem 503");
    }

    let addr = config.addr;
    let router = app(AppState::new(pool.clone(), config));

    info!("Servidor escutando em {}", addr);
    axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Falha no servidor HTTP")?;

    pool.close().await;
    info!("Servidor encerrado");
    Ok(())
}
