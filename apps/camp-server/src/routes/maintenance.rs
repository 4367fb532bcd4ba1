use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::maintenance::persist_flag;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/maintenance", get(status).post(update))
        .route("/maintenance/enable", get(enable))
        .route("/maintenance/disable", get(disable))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRes {
    pub maintenance_mode: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub maintenance_mode: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRes {
    pub success: bool,
    pub message: String,
    pub maintenance_mode: bool,
    pub timestamp: DateTime<Utc>,
}

/// Valor em vigor desde a inicialização
async fn status(State(state): State<AppState>) -> Json<StatusRes> {
    Json(StatusRes {
        maintenance_mode: state.config.maintenance_mode,
    })
}

async fn set(state: &AppState, enabled: bool) -> ApiResult<Json<UpdateRes>> {
    persist_flag(&state.config.env_file, enabled).await?;
    Ok(Json(UpdateRes {
        success: true,
        message: format!(
            "Modo de manutenção {}. Reinicie o serviço para aplicar.",
            if enabled { "ativado" } else { "desativado" }
        ),
        maintenance_mode: enabled,
        timestamp: Utc::now(),
    }))
}

async fn update(
    State(state): State<AppState>,
    Json(body): Json<UpdateBody>,
) -> ApiResult<Json<UpdateRes>> {
    let enabled = body
        .maintenance_mode
        .ok_or_else(|| ApiError::BadRequest("maintenanceMode é obrigatório".to_string()))?;
    set(&state, enabled).await
}

async fn enable(State(state): State<AppState>) -> ApiResult<Json<UpdateRes>> {
    set(&state, true).await
}

async fn disable(State(state): State<AppState>) -> ApiResult<Json<UpdateRes>> {
    set(&state, false).await
}
