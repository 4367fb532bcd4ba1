use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use camp_db::models::{PatientRecord, PatientSummary, PatientUpdate};
use camp_db::patients;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ApiResult;
use crate::extract::{Json, Query};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients/search", get(search))
        .route("/patients/:id", get(record).put(update))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchRes {
    pub success: bool,
    pub patients: Vec<PatientSummary>,
}

#[derive(Debug, Serialize)]
pub struct PatientRes {
    pub success: bool,
    pub patient: PatientRecord,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchRes>> {
    let patients = patients::search(&state.pool, params.q.as_deref()).await?;
    Ok(Json(SearchRes {
        success: true,
        patients,
    }))
}

async fn record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PatientRes>> {
    let patient = patients::record(&state.pool, &id).await?;
    Ok(Json(PatientRes {
        success: true,
        patient,
    }))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<PatientUpdate>,
) -> ApiResult<Json<PatientRes>> {
    changes.validate()?;
    let patient = patients::update(&state.pool, &id, &changes).await?;
    Ok(Json(PatientRes {
        success: true,
        patient,
    }))
}
