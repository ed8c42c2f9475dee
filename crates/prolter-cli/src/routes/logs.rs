//! Action log listing

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use prolter_store::SystemLog;
use serde::Deserialize;

use crate::server::{ApiResult, AppState};

const DEFAULT_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/settings/system-logs", get(recent))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<i64>,
}

async fn recent(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<Vec<SystemLog>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(Json(state.audit.recent(limit).await?))
}
