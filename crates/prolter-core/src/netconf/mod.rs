//! VPN peer config generation
//!
//! Two target formats: strongSwan (`ipsec.conf` + `ipsec.secrets`) and
//! xl2tpd (`xl2tpd.conf` + per-user PPP options). Rendering is pure; only
//! [`ConfigEmitter`] touches the filesystem.

pub mod emitter;
pub mod strongswan;
pub mod xl2tpd;

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

pub use emitter::{ConfigEmitter, EmitterPaths};

pub const DEFAULT_LEFT_ID: &str = "@vpn.prolter.local";
pub const DEFAULT_LEFT_SUBNET: &str = "192.168.250.1/24";

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("VPN peer is missing {0}")]
    MissingField(&'static str),

    #[error("Invalid identifier for a file name: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Emitter lock poisoned")]
    Poisoned,
}

/// A VPN peer with its secrets already decrypted.
/// Lives only for the duration of a render/emit call.
#[derive(Clone, Deserialize)]
pub struct VpnPeer {
    pub name: String,
    #[serde(default)]
    pub remote_address: Option<String>,
    pub local_subnet: String,
    pub remote_subnet: String,
    pub pre_shared_key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl std::fmt::Debug for VpnPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VpnPeer")
            .field("name", &self.name)
            .field("remote_address", &self.remote_address)
            .field("local_subnet", &self.local_subnet)
            .field("remote_subnet", &self.remote_subnet)
            .field("enabled", &self.enabled)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl VpnPeer {
    /// Every field lands inside `ipsec.conf`, `ipsec.secrets` or the xl2tpd
    /// files, so nothing may break out of its line or quotes. Rows written
    /// by older portals were never checked, so emission runs this too.
    pub fn validate(&self) -> Result<(), EmitError> {
        let name_ok = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !name_ok {
            return Err(EmitError::InvalidField {
                field: "name",
                reason: "must be non-empty and use only letters, digits, '-', '_' or '.'",
            });
        }

        for (field, value) in [
            ("local_subnet", self.local_subnet.as_str()),
            ("remote_subnet", self.remote_subnet.as_str()),
        ] {
            if value.is_empty() || !is_single_token(value) {
                return Err(EmitError::InvalidField { field, reason: "must be a single token" });
            }
        }

        let optional_tokens = [
            ("remote_address", self.remote_address.as_deref()),
            ("username", self.username.as_deref()),
        ];
        for (field, value) in optional_tokens {
            if value.is_some_and(|v| !is_single_token(v)) {
                return Err(EmitError::InvalidField { field, reason: "must be a single token" });
            }
        }

        if self.pre_shared_key.is_empty()
            || self.pre_shared_key.contains(|c: char| c == '"' || c.is_control())
        {
            return Err(EmitError::InvalidField {
                field: "pre_shared_key",
                reason: "must be non-empty without quotes or control characters",
            });
        }

        if self.password.as_deref().is_some_and(|p| p.contains(char::is_control)) {
            return Err(EmitError::InvalidField {
                field: "password",
                reason: "must not contain control characters",
            });
        }
        Ok(())
    }
}

fn is_single_token(value: &str) -> bool {
    !value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '"')
}

/// Server-side identity for the strongSwan `left` end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrongSwanOptions {
    pub left_id: String,
    pub left_subnet: String,
}

impl Default for StrongSwanOptions {
    fn default() -> Self {
        Self {
            left_id: DEFAULT_LEFT_ID.to_string(),
            left_subnet: DEFAULT_LEFT_SUBNET.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_peer() -> VpnPeer {
    VpnPeer {
        name: "peer1".to_string(),
        remote_address: Some("203.0.113.5".to_string()),
        local_subnet: "192.168.250.0/24".to_string(),
        remote_subnet: "10.0.0.0/24".to_string(),
        pre_shared_key: "abc123".to_string(),
        enabled: true,
        username: Some("branch01".to_string()),
        password: Some("l2tp-pass".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secrets() {
        let rendered = format!("{:?}", test_peer());
        assert!(rendered.contains("peer1"));
        assert!(!rendered.contains("abc123"));
        assert!(!rendered.contains("l2tp-pass"));
    }

    #[test]
    fn test_validate_accepts_ordinary_peer() {
        assert!(test_peer().validate().is_ok());

        let mut peer = test_peer();
        peer.remote_address = None;
        peer.username = None;
        peer.password = None;
        assert!(peer.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_line_breakouts() {
        let cases: [fn(&mut VpnPeer); 6] = [
            |p| p.name = "legacy\nconn %default\n  authby=never".to_string(),
            |p| p.pre_shared_key = "k\"\n: PSK \"attacker".to_string(),
            |p| p.remote_subnet = "10.0.0.0/24 0.0.0.0/0".to_string(),
            |p| p.local_subnet = String::new(),
            |p| p.remote_address = Some("1.2.3.4\n  leftid=@x".to_string()),
            |p| p.password = Some("pw\nplugin evil.so".to_string()),
        ];
        for mutate in cases {
            let mut peer = test_peer();
            mutate(&mut peer);
            assert!(
                matches!(peer.validate(), Err(EmitError::InvalidField { .. })),
                "accepted {peer:?}"
            );
        }
    }

    #[test]
    fn test_peer_from_json_defaults() {
        let peer: VpnPeer = serde_json::from_str(
            r#"{"name":"hq","local_subnet":"a","remote_subnet":"b","pre_shared_key":"k"}"#,
        )
        .unwrap();
        assert!(peer.enabled);
        assert!(peer.remote_address.is_none());
        assert!(peer.username.is_none());
    }
}
