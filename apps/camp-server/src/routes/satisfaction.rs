use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use camp_db::models::{NewSatisfactionRating, SatisfactionRating};
use camp_db::satisfaction;
use validator::Validate;

use crate::error::ApiResult;
use crate::extract::Json;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/satisfaction", get(list).post(create))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<SatisfactionRating>>> {
    Ok(Json(satisfaction::list(&state.pool).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<NewSatisfactionRating>,
) -> ApiResult<(StatusCode, Json<SatisfactionRating>)> {
    input.validate()?;
    let rating = satisfaction::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(rating)))
}
