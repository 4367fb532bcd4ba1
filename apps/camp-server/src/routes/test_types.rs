use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use camp_db::models::{TestType, TestTypeInput};
use camp_db::test_types;
use validator::Validate;

use super::Message;
use crate::error::ApiResult;
use crate::extract::Json;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/test-types", get(list).post(create))
        .route("/test-types/:id", get(show).put(update).delete(remove))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<TestType>>> {
    Ok(Json(test_types::list(&state.pool).await?))
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<TestType>> {
    Ok(Json(test_types::get(&state.pool, &id).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<TestTypeInput>,
) -> ApiResult<Json<TestType>> {
    input.validate()?;
    Ok(Json(test_types::create(&state.pool, &input).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<TestTypeInput>,
) -> ApiResult<Json<TestType>> {
    input.validate()?;
    Ok(Json(test_types::update(&state.pool, &id, &input).await?))
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Message>> {
    test_types::delete(&state.pool, &id).await?;
    Ok(Json(Message::new("Tipo de exame removido")))
}
