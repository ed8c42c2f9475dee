//! System monitor endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use prolter_core::monitor::{self, HistoryInterval, LogSource, MetricCard, MetricSample, ServiceStatus};
use prolter_store::{LogEntry, LogLevel};
use serde::Deserialize;
use serde_json::{json, Value};

use super::body;
use crate::server::{ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/settings/system-monitor/cards", get(cards))
        .route("/api/settings/system-monitor/services", get(services))
        .route("/api/settings/system-monitor/services/restart", post(restart))
        .route("/api/settings/system-monitor/logs", get(logs))
        .route("/api/settings/system-monitor/history", get(history))
}

#[derive(Debug, Deserialize)]
struct RestartPayload {
    #[serde(default)]
    service: String,
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    interval: Option<String>,
}

async fn cards(State(state): State<AppState>) -> ApiResult<Json<Vec<MetricCard>>> {
    Ok(Json(monitor::metric_cards(&state.policy).await?))
}

async fn services(State(state): State<AppState>) -> Json<Vec<ServiceStatus>> {
    Json(monitor::service_statuses(&state.policy).await)
}

async fn restart(
    State(state): State<AppState>,
    payload: Result<Json<RestartPayload>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let RestartPayload { service } = body(payload)?;

    if let Err(e) = monitor::restart_service(&state.policy, &service).await {
        state
            .audit
            .record(
                LogEntry::new("RESTART_SERVICE", "Service", format!("Failed to restart {service}: {e}"))
                    .target_id(&service)
                    .level(LogLevel::Error),
            )
            .await;
        return Err(e.into());
    }

    state
        .audit
        .record(
            LogEntry::new("RESTART_SERVICE", "Service", format!("Restarted {service}"))
                .target_id(&service),
        )
        .await;
    Ok(Json(json!({ "success": true })))
}

async fn logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<Value>> {
    let source = LogSource::from_param(query.source.as_deref());
    let logs = monitor::read_logs(&state.policy, source).await?;
    Ok(Json(json!({ "logs": logs })))
}

/// Takes a fresh sample on every call, then returns the requested window
async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<MetricSample>>> {
    let interval = HistoryInterval::from_param(query.interval.as_deref());
    let sample = monitor::sample_host().await?;
    Ok(Json(state.history.record(sample, interval)))
}
