use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use camp_db::medicines;
use camp_db::models::{Medicine, MedicineInput};
use validator::Validate;

use super::Message;
use crate::error::ApiResult;
use crate::extract::Json;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/medicines", get(list).post(create))
        .route("/medicines/:id", get(show).put(update).delete(remove))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Medicine>>> {
    Ok(Json(medicines::list(&state.pool).await?))
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Medicine>> {
    Ok(Json(medicines::get(&state.pool, &id).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<MedicineInput>,
) -> ApiResult<Json<Medicine>> {
    input.validate()?;
    Ok(Json(medicines::create(&state.pool, &input).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<MedicineInput>,
) -> ApiResult<Json<Medicine>> {
    input.validate()?;
    Ok(Json(medicines::update(&state.pool, &id, &input).await?))
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Message>> {
    medicines::delete(&state.pool, &id).await?;
    Ok(Json(Message::new("Medicamento removido")))
}
