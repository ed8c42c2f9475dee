//! HTTP API server
//!
//! Startup order: bootstrap credentials, cipher key, database pool, router.
//! Any failure before the listener binds is fatal.

use anyhow::Context;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use prolter_core::{ConfigEmitter, EmitError, MetricHistory, MonitorError, ServicePolicy};
use prolter_crypto::{CredentialCell, SecretCipher};
use prolter_store::{ActionLog, NasRepository, StoreError, VpnRepository};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServeArgs;
use crate::routes;

#[derive(Clone)]
pub struct AppState {
    pub nas: NasRepository,
    pub vpn: VpnRepository,
    pub audit: ActionLog,
    pub emitter: Arc<ConfigEmitter>,
    pub policy: Arc<ServicePolicy>,
    pub history: Arc<MetricHistory>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(msg) => ApiError::BadRequest(msg),
            other => {
                error!(error = %other, "Store error");
                ApiError::Internal("Database operation failed".to_string())
            }
        }
    }
}

impl From<EmitError> for ApiError {
    fn from(e: EmitError) -> Self {
        match e {
            EmitError::MissingField(_)
            | EmitError::InvalidIdentifier(_)
            | EmitError::InvalidField { .. } => {
                ApiError::BadRequest(e.to_string())
            }
            // The path tells the operator which file is now out of step
            EmitError::Io { .. } => ApiError::Internal(e.to_string()),
            EmitError::Poisoned => ApiError::Internal("Failed to write config".to_string()),
        }
    }
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::UnknownService(_) => {
                ApiError::BadRequest("Invalid or unauthorized service.".to_string())
            }
            other => {
                error!(error = %other, "Monitor command failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::nas::router())
        .merge(routes::vpn::router())
        .merge(routes::monitor::router())
        .merge(routes::logs::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let credentials = CredentialCell::new(args.bootstrap.loader());
    let creds = credentials
        .get()
        .await
        .context("Failed to load bootstrap database credentials")?;

    let cipher = SecretCipher::from_env().context("Secret encryption key unavailable")?;

    let pool = prolter_store::connect(&args.db.settings(), creds)
        .await
        .context("Failed to connect to PostgreSQL")?;
    if args.init_schema {
        prolter_store::ensure_schema(&pool).await?;
    }

    let state = AppState {
        nas: NasRepository::new(pool.clone(), cipher.clone()),
        vpn: VpnRepository::new(pool.clone(), cipher),
        audit: ActionLog::new(pool),
        emitter: Arc::new(args.netconf.emitter()),
        policy: Arc::new(ServicePolicy::default()),
        history: Arc::new(MetricHistory::default()),
    };

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!(addr = %args.listen, "Prolter API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}
