//! Prolter Store - PostgreSQL persistence
//!
//! This crate provides:
//! - Pool setup from the decrypted bootstrap credentials
//! - NAS inventory with encrypted device secrets
//! - VPN connections with encrypted pre-shared keys
//! - The `system_logs` action log

pub mod audit;
pub mod db;
pub mod error;
pub mod nas;
pub mod vpn;

pub use audit::{ActionLog, LogEntry, LogLevel, SystemLog};
pub use db::{connect, ensure_schema, DatabaseSettings};
pub use error::{Result, StoreError};
pub use nas::{NasInput, NasRepository, NasSummary, NasUpdate};
pub use vpn::{VpnInput, VpnRepository, VpnSummary};
