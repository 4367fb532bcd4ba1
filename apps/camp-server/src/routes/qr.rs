use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use camp_db::registrations;
use serde::Serialize;
use tracing::debug;

use crate::error::ApiResult;
use crate::extract::Json;
use crate::{qr, AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/qr/:registration_id", get(qr_code))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrRes {
    pub success: bool,
    pub registration_id: String,
    pub patient_id: String,
    pub qr_code: String,
    pub qr_value: String,
}

/// QR code com o código legível do paciente. A imagem é gerada na primeira
/// consulta e guardada no atendimento.
async fn qr_code(
    State(state): State<AppState>,
    Path(registration_id): Path<String>,
) -> ApiResult<Json<QrRes>> {
    let found = registrations::get_with_patient(&state.pool, &registration_id).await?;
    let qr_value = found.patient.id.clone();

    let qr_code = match found.registration.qr_code {
        Some(stored) => stored,
        None => {
            let generated = qr::png_data_url(&qr_value)?;
            registrations::store_qr_code(&state.pool, &registration_id, &generated).await?;
            debug!("QR code gerado para o atendimento {}", registration_id);
            generated
        }
    };

    Ok(Json(QrRes {
        success: true,
        registration_id,
        patient_id: found.patient.id,
        qr_code,
        qr_value,
    }))
}
