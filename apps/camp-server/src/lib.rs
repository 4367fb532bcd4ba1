//! Camp Server - API HTTP do mutirão de saúde
//!
//! Expõe em JSON o cadastro de pacientes, o lançamento de exames, a farmácia,
//! a pesquisa de satisfação, as configurações e os relatórios. O estado fica
//! todo no banco SQLite acessado via `camp-db`.

use axum::{middleware, Router};
use camp_db::Pool;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod extract;
pub mod maintenance;
pub mod qr;
pub mod routes;

pub use config::{AppConfig, LogFormat};
pub use error::{ApiError, ApiResult};

/// Informações geradas em tempo de compilação pelo `built`
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Estado compartilhado pelos handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: Pool, config: AppConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }
}

/// Monta o roteador com todas as rotas e camadas
pub fn app(state: AppState) -> Router {
    let max_concurrent_requests = state.config.max_concurrent_requests;

    routes::router()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            maintenance::guard,
        ))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(max_concurrent_requests))
        .with_state(state)
}
