//! Rotas HTTP, um módulo por recurso

use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::AppState;

pub mod health;
pub mod maintenance;
pub mod medicine_issues;
pub mod medicines;
pub mod patients;
pub mod qr;
pub mod registration;
pub mod reports;
pub mod satisfaction;
pub mod scan;
pub mod settings;
pub mod test_results;
pub mod test_types;

/// Corpo padrão das remoções e confirmações simples
#[derive(Debug, Serialize)]
pub struct Message {
    pub success: bool,
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

pub fn router() -> Router<AppState> {
    let api = Router::new()
        .merge(registration::router())
        .merge(patients::router())
        .merge(test_types::router())
        .merge(test_results::router())
        .merge(medicines::router())
        .merge(medicine_issues::router())
        .merge(qr::router())
        .merge(scan::router())
        .merge(satisfaction::router())
        .merge(settings::router())
        .merge(reports::router())
        .merge(maintenance::router());

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
}
