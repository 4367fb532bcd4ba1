use axum::extract::State;
use axum::routing::get;
use axum::Router;
use camp_db::reports::{self, DateRange, Report, ReportKind};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::{Json, Query};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/reports", get(report))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// `type` ausente equivale a `overview`
async fn report(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> ApiResult<Json<Report>> {
    let kind = match params.kind.as_deref().filter(|k| !k.is_empty()) {
        Some(raw) => raw.parse::<ReportKind>()?,
        None => ReportKind::Overview,
    };
    let range = DateRange::parse(params.start_date.as_deref(), params.end_date.as_deref())?;

    Ok(Json(reports::generate(&state.pool, kind, &range).await?))
}
