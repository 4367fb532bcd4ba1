use axum::extract::State;
use axum::routing::get;
use axum::Router;
use camp_db::models::PatientRecord;
use camp_db::patients;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/scan", get(scan))
}

#[derive(Debug, Deserialize)]
pub struct ScanParams {
    pub qr: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRes {
    pub success: bool,
    pub patient: PatientRecord,
    pub scanned_value: String,
}

/// Prontuário do paciente cujo código foi lido no QR code
async fn scan(
    State(state): State<AppState>,
    Query(params): Query<ScanParams>,
) -> ApiResult<Json<ScanRes>> {
    let scanned_value = params
        .qr
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Valor do QR code é obrigatório".to_string()))?;

    let patient = patients::record(&state.pool, &scanned_value).await?;
    Ok(Json(ScanRes {
        success: true,
        patient,
        scanned_value,
    }))
}
