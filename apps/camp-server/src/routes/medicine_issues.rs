use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use camp_db::medicine_issues;
use camp_db::models::{
    MedicineIssueDetail, MedicineIssueUpdate, NewMedicineIssue, PageRequest, Pagination,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Message;
use crate::error::ApiResult;
use crate::extract::{Json, Query};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/medicine-issues", get(list).post(create))
        .route(
            "/medicine-issues/:id",
            get(show).put(update).delete(remove),
        )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub registration_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRes {
    pub medicine_issues: Vec<MedicineIssueDetail>,
    pub pagination: Pagination,
}

async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListRes>> {
    let registration_id = params
        .registration_id
        .as_deref()
        .filter(|id| !id.trim().is_empty());
    let page = PageRequest::new(params.page, params.limit);

    let (medicine_issues, pagination) =
        medicine_issues::list(&state.pool, registration_id, page).await?;
    Ok(Json(ListRes {
        medicine_issues,
        pagination,
    }))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<NewMedicineIssue>,
) -> ApiResult<(StatusCode, Json<MedicineIssueDetail>)> {
    input.validate()?;
    let issued = medicine_issues::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MedicineIssueDetail>> {
    Ok(Json(medicine_issues::get(&state.pool, &id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<MedicineIssueUpdate>,
) -> ApiResult<Json<MedicineIssueDetail>> {
    changes.validate()?;
    Ok(Json(medicine_issues::update(&state.pool, &id, &changes).await?))
}

/// Remove a dispensação e devolve o estoque
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Message>> {
    medicine_issues::delete(&state.pool, &id).await?;
    Ok(Json(Message::new("Dispensação removida")))
}
