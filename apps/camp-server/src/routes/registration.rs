use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use camp_db::models::{NewRegistration, RegistrationDetail};
use camp_db::registrations;
use serde::Serialize;
use validator::Validate;

use crate::error::ApiResult;
use crate::extract::Json;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/registration", post(create))
        .route("/registration/:id", get(lookup))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRes {
    pub success: bool,
    pub registration_id: String,
    pub patient_id: String,
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<NewRegistration>,
) -> ApiResult<Json<CreatedRes>> {
    input.validate()?;
    let created = registrations::create(&state.pool, &input).await?;
    Ok(Json(CreatedRes {
        success: true,
        registration_id: created.registration_id,
        patient_id: created.patient_id,
    }))
}

/// Aceita o código do paciente ou o ID do atendimento
async fn lookup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RegistrationDetail>> {
    Ok(Json(registrations::lookup(&state.pool, &id).await?))
}
