//! Prolter Core - network config emission and system monitoring
//!
//! Shared by the HTTP API and the admin CLI.

pub mod monitor;
pub mod netconf;

pub use monitor::{LogSource, MetricHistory, MonitorError, ServicePolicy};
pub use netconf::{ConfigEmitter, EmitError, EmitterPaths, StrongSwanOptions, VpnPeer};
