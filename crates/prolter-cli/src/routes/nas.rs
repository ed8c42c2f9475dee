//! NAS (RADIUS client) endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use prolter_core::monitor;
use prolter_store::{LogEntry, NasInput, NasSummary, NasUpdate};
use serde_json::{json, Value};
use std::net::IpAddr;
use tracing::warn;

use super::{body, parse_id};
use crate::server::{ApiError, ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/network-radius/list", get(list))
        .route("/api/network-radius/create", post(create))
        .route("/api/network-radius/status-check/:id", get(status_check))
        .route("/api/settings/network/radius/update", post(update))
        .route("/api/settings/network/radius/delete/:id", delete(remove))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<NasSummary>>> {
    Ok(Json(state.nas.list().await?))
}

async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NasInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let input = body(payload)?;
    let id = state.nas.create(&input).await?;

    state
        .audit
        .record(
            LogEntry::new("CREATE_NAS", "NAS", format!("Created NAS {}", input.shortname))
                .target_id(id),
        )
        .await;
    Ok(Json(json!({ "id": id })))
}

async fn update(
    State(state): State<AppState>,
    payload: Result<Json<NasUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let NasUpdate { id, fields } = body(payload)?;
    if !state.nas.update(id, &fields).await? {
        return Err(ApiError::not_found("NAS"));
    }

    state
        .audit
        .record(
            LogEntry::new("UPDATE_NAS", "NAS", format!("Updated NAS {}", fields.shortname))
                .target_id(id),
        )
        .await;
    Ok(Json(json!({ "success": true })))
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    if !state.nas.delete(id).await? {
        return Err(ApiError::not_found("NAS"));
    }

    state
        .audit
        .record(LogEntry::new("DELETE_NAS", "NAS", format!("Deleted NAS {id}")).target_id(id))
        .await;
    Ok(Json(json!({ "success": true })))
}

/// Ping the device once and store `ok` / `fail`
async fn status_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    let nasname = state
        .nas
        .address(id)
        .await?
        .ok_or_else(|| ApiError::not_found("NAS"))?;

    let alive = match nasname.trim().parse::<IpAddr>() {
        Ok(addr) => monitor::ping_host(&state.policy, addr).await,
        Err(_) => {
            warn!(id, %nasname, "Stored NAS address is not an IP; marking unreachable");
            false
        }
    };
    let status = reachability(alive);
    state.nas.set_status(id, status).await?;

    Ok(Json(json!({ "id": id, "status": status })))
}

fn reachability(alive: bool) -> &'static str {
    if alive {
        "ok"
    } else {
        "fail"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reachability_labels() {
        assert_eq!(reachability(true), "ok");
        assert_eq!(reachability(false), "fail");
    }
}
