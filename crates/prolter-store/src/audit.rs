//! Action log (`system_logs`)
//!
//! Recording never fails the caller: a rejected insert is logged and dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::error;

use crate::error::Result;

pub const SYSTEM_USER: &str = "system";
pub const MAX_RECENT: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// One action to record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub user_id: Option<String>,
    /// e.g. CREATE_NAS, DELETE_VPN
    pub action: String,
    /// e.g. NAS, VPN
    pub target: String,
    pub target_id: Option<String>,
    pub message: String,
    pub level: LogLevel,
}

impl LogEntry {
    pub fn new(action: impl Into<String>, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: None,
            action: action.into(),
            target: target.into(),
            target_id: None,
            message: message.into(),
            level: LogLevel::Info,
        }
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn target_id(mut self, id: impl ToString) -> Self {
        self.target_id = Some(id.to_string());
        self
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }
}

/// A stored log row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SystemLog {
    pub id: i64,
    pub user_id: Option<String>,
    pub action: String,
    pub target: String,
    pub target_id: Option<String>,
    pub message: String,
    pub level: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ActionLog {
    pool: PgPool,
}

impl ActionLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, entry: LogEntry) {
        let result = sqlx::query(
            "INSERT INTO system_logs (user_id, action, target, target_id, message, level, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, NOW())",
        )
        .bind(entry.user_id.as_deref().unwrap_or(SYSTEM_USER))
        .bind(&entry.action)
        .bind(&entry.target)
        .bind(entry.target_id.as_deref())
        .bind(&entry.message)
        .bind(entry.level.as_str())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(action = %entry.action, target = %entry.target, error = %e, "Failed to record action log");
        }
    }

    /// Newest first, `limit` clamped to 1..=500
    pub async fn recent(&self, limit: i64) -> Result<Vec<SystemLog>> {
        let rows = sqlx::query_as(
            "SELECT id::bigint AS id, user_id, action, target, target_id, message, level,
                    created_at::timestamptz AS created_at
             FROM system_logs
             ORDER BY created_at DESC, id DESC
             LIMIT $1",
        )
        .bind(clamp_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_RECENT)
}
