//! VPN connection endpoints and config emission

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use prolter_core::netconf::{strongswan, VpnPeer};
use prolter_core::StrongSwanOptions;
use prolter_store::{LogEntry, LogLevel, VpnInput, VpnSummary};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{body, parse_id};
use crate::server::{ApiError, ApiResult, AppState};

const MASKED_PSK: &str = "********";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/settings/network/vpn", get(list))
        .route("/api/settings/network/vpn/add", post(add))
        .route("/api/settings/network/vpn/update/:id", put(update))
        .route("/api/settings/network/vpn/toggle/:id", patch(toggle))
        .route("/api/settings/network/vpn/remove/:id", delete(remove))
        .route("/api/settings/network/vpn/generate/:id", post(generate))
        .route("/api/settings/network/vpn/generate-l2tp/:id", post(generate_l2tp))
        .route("/api/settings/network/vpn/config/:id", get(preview))
        .route("/api/settings/network/vpn/download/:id", get(download))
}

#[derive(Debug, Deserialize)]
struct TogglePayload {
    enabled: bool,
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<VpnSummary>>> {
    Ok(Json(state.vpn.list().await?))
}

async fn add(
    State(state): State<AppState>,
    payload: Result<Json<VpnInput>, JsonRejection>,
) -> ApiResult<Json<VpnSummary>> {
    let input = body(payload)?;
    let vpn = state.vpn.create(&input).await?;

    state
        .audit
        .record(
            LogEntry::new("CREATE_VPN", "VPN", format!("Created VPN {}", vpn.name))
                .target_id(vpn.id),
        )
        .await;
    Ok(Json(vpn))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<VpnInput>, JsonRejection>,
) -> ApiResult<Json<VpnSummary>> {
    let id = parse_id(&id)?;
    let input = body(payload)?;
    let vpn = state
        .vpn
        .update(id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("VPN"))?;

    state
        .audit
        .record(LogEntry::new("UPDATE_VPN", "VPN", format!("Updated VPN {}", vpn.name)).target_id(id))
        .await;
    Ok(Json(vpn))
}

async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TogglePayload>, JsonRejection>,
) -> ApiResult<Json<VpnSummary>> {
    let id = parse_id(&id)?;
    let TogglePayload { enabled } = body(payload)?;
    let vpn = state
        .vpn
        .toggle(id, enabled)
        .await?
        .ok_or_else(|| ApiError::not_found("VPN"))?;

    let verb = if enabled { "Enabled" } else { "Disabled" };
    state
        .audit
        .record(LogEntry::new("TOGGLE_VPN", "VPN", format!("{verb} VPN {}", vpn.name)).target_id(id))
        .await;
    Ok(Json(vpn))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<VpnSummary>> {
    let id = parse_id(&id)?;
    let vpn = state
        .vpn
        .delete(id)
        .await?
        .ok_or_else(|| ApiError::not_found("VPN"))?;

    state
        .audit
        .record(LogEntry::new("DELETE_VPN", "VPN", format!("Removed VPN {}", vpn.name)).target_id(id))
        .await;
    Ok(Json(vpn))
}

async fn load_peer(state: &AppState, raw_id: &str) -> ApiResult<(i32, VpnPeer)> {
    let id = parse_id(raw_id)?;
    let peer = state
        .vpn
        .peer(id)
        .await?
        .ok_or_else(|| ApiError::not_found("VPN"))?;
    Ok((id, peer))
}

/// Append the strongSwan tunnel and PSK for this connection
async fn generate(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let (id, peer) = load_peer(&state, &id).await?;
    let name = peer.name.clone();

    let emitter = state.emitter.clone();
    tokio::task::spawn_blocking(move || emitter.emit_strongswan(&peer))
        .await
        .map_err(|e| ApiError::Internal(format!("Config writer task failed: {e}")))??;

    info!(id, vpn = %name, "strongSwan config emitted");
    state
        .audit
        .record(
            LogEntry::new("GENERATE_VPN_CONFIG", "VPN", format!("Wrote strongSwan config for {name}"))
                .target_id(id),
        )
        .await;

    let paths = state.emitter.paths();
    Ok(Json(json!({
        "message": format!(
            "VPN config written to {} and {}",
            paths.ipsec_conf.display(),
            paths.ipsec_secrets.display()
        )
    })))
}

/// Append the xl2tpd client section and write the PPP options file
async fn generate_l2tp(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let (id, peer) = load_peer(&state, &id).await?;
    let name = peer.name.clone();

    let emitter = state.emitter.clone();
    let options_file = tokio::task::spawn_blocking(move || emitter.emit_xl2tpd(&peer))
        .await
        .map_err(|e| ApiError::Internal(format!("Config writer task failed: {e}")))??;

    state
        .audit
        .record(
            LogEntry::new("GENERATE_L2TP_CONFIG", "VPN", format!("Wrote xl2tpd config for {name}"))
                .target_id(id),
        )
        .await;

    Ok(Json(json!({
        "message": format!("L2TP config written to {}", state.emitter.paths().xl2tpd_conf.display()),
        "options_file": options_file.display().to_string(),
    })))
}

/// Rendered tunnel block, nothing written. The PSK is masked.
async fn preview(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let (_, peer) = load_peer(&state, &id).await?;
    Ok(Json(render_preview(peer, state.emitter.options())))
}

fn render_preview(mut peer: VpnPeer, options: &StrongSwanOptions) -> Value {
    peer.pre_shared_key = MASKED_PSK.to_string();
    json!({
        "ipsec_conf": strongswan::render_tunnel_config(&peer, options),
        "ipsec_secrets": strongswan::render_secret_entry(&peer, options),
    })
}

/// Unmasked `<name>-ipsec.conf` / `<name>-ipsec.secrets` for the remote
/// side. Every download is logged.
async fn download(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let (id, peer) = load_peer(&state, &id).await?;
    let files = render_download(&peer, state.emitter.options())?;

    state
        .audit
        .record(
            LogEntry::new("DOWNLOAD_VPN_CONFIG", "VPN", format!("Downloaded config for {}", peer.name))
                .target_id(id)
                .level(LogLevel::Warning),
        )
        .await;
    Ok(Json(files))
}

fn render_download(peer: &VpnPeer, options: &StrongSwanOptions) -> ApiResult<Value> {
    peer.validate()?;
    Ok(json!({
        "files": [
            {
                "filename": format!("{}-ipsec.conf", peer.name),
                "content": strongswan::render_tunnel_config(peer, options),
            },
            {
                "filename": format!("{}-ipsec.secrets", peer.name),
                "content": strongswan::render_secret_entry(peer, options),
            },
        ]
    }))
}
