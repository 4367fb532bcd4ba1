use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::{built_info, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRes {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub maintenance_mode: bool,
}

/// Situação do serviço e do banco de dados
pub async fn health(State(state): State<AppState>) -> Json<HealthRes> {
    let database = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.pool)
        .await
    {
        Ok(_) => true,
        Err(err) => {
            warn!("Banco de dados indisponível: {}", err);
            false
        }
    };

    Json(HealthRes {
        ok: database,
        service: built_info::PKG_NAME,
        version: built_info::PKG_VERSION,
        database,
        maintenance_mode: state.config.maintenance_mode,
    })
}
