//! PostgreSQL pool setup
//!
//! Host, port and TLS come from configuration; user, password and database
//! name come from the decrypted bootstrap credentials.

use prolter_crypto::BootstrapCredentials;
use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::Executor;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    /// libpq-style: disable, prefer, require, verify-ca, verify-full
    pub ssl_mode: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            ssl_mode: "prefer".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 10,
        }
    }
}

pub fn connect_options(
    settings: &DatabaseSettings,
    creds: &BootstrapCredentials,
) -> Result<PgConnectOptions> {
    let ssl_mode = PgSslMode::from_str(&settings.ssl_mode)
        .map_err(|e| StoreError::Config(format!("ssl mode {:?}: {e}", settings.ssl_mode)))?;

    Ok(PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&creds.db_user)
        .password(creds.db_password.expose_secret())
        .database(&creds.db_name)
        .ssl_mode(ssl_mode))
}

/// Open the pool and check one connection
pub async fn connect(settings: &DatabaseSettings, creds: &BootstrapCredentials) -> Result<PgPool> {
    let options = connect_options(settings, creds)?;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect_with(options)
        .await?;

    info!(
        host = %settings.host,
        port = settings.port,
        database = %creds.db_name,
        "PostgreSQL pool created"
    );
    Ok(pool)
}

/// Tables this crate reads and writes
pub const SCHEMA: &str = include_str!("../schema.sql");

/// Create missing tables. Existing tables are left alone.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    pool.execute(SCHEMA).await?;
    info!("Database schema checked");
    Ok(())
}
