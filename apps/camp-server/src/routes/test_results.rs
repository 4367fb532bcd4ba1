use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use camp_db::models::{
    KeyedTestResultUpdate, NewTestResult, PageRequest, Pagination, PendingRegistration,
    TestResultDetail, TestResultStatus, TestResultUpdate,
};
use camp_db::test_results::{self, PendingFilter, TestResultFilter};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Message;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/test-results",
            get(list).post(create).put(update_by_key),
        )
        .route("/test-results/pending", get(pending))
        .route(
            "/test-results/:id",
            get(show).put(update).delete(remove),
        )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub registration_id: Option<String>,
    pub test_type_id: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingParams {
    pub test_type_id: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRes {
    pub test_results: Vec<TestResultDetail>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRes {
    pub pending_results: Vec<PendingRegistration>,
    pub pagination: Pagination,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListRes>> {
    let status = match non_empty(params.status) {
        Some(raw) => Some(raw.parse::<TestResultStatus>().map_err(ApiError::BadRequest)?),
        None => None,
    };
    let filter = TestResultFilter {
        registration_id: non_empty(params.registration_id),
        test_type_id: non_empty(params.test_type_id),
        status,
        search: non_empty(params.search),
    };

    let page = PageRequest::new(params.page, params.limit);
    let (test_results, pagination) = test_results::list(&state.pool, &filter, page).await?;
    Ok(Json(ListRes {
        test_results,
        pagination,
    }))
}

async fn pending(
    State(state): State<AppState>,
    Query(params): Query<PendingParams>,
) -> ApiResult<Json<PendingRes>> {
    let filter = PendingFilter {
        test_type_id: non_empty(params.test_type_id),
        search: non_empty(params.search),
    };

    let page = PageRequest::new(params.page, params.limit);
    let (pending_results, pagination) = test_results::pending(&state.pool, &filter, page).await?;
    Ok(Json(PendingRes {
        pending_results,
        pagination,
    }))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<NewTestResult>,
) -> ApiResult<(StatusCode, Json<TestResultDetail>)> {
    input.validate()?;
    let created = test_results::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TestResultDetail>> {
    Ok(Json(test_results::get(&state.pool, &id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<TestResultUpdate>,
) -> ApiResult<Json<TestResultDetail>> {
    changes.validate()?;
    Ok(Json(test_results::update(&state.pool, &id, &changes).await?))
}

/// Atualização pelo par (atendimento, tipo de exame)
async fn update_by_key(
    State(state): State<AppState>,
    Json(input): Json<KeyedTestResultUpdate>,
) -> ApiResult<Json<TestResultDetail>> {
    input.validate()?;
    let updated = test_results::update_by_key(
        &state.pool,
        &input.registration_id,
        &input.test_type_id,
        &input.changes(),
    )
    .await?;
    Ok(Json(updated))
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Message>> {
    test_results::delete(&state.pool, &id).await?;
    Ok(Json(Message::new("Resultado de exame removido")))
}
