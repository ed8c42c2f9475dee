//! VPN connection records
//!
//! Pre-shared keys and L2TP passwords are stored encrypted. They leave the
//! database only through [`VpnRepository::peer`], which decrypts them for a
//! single render/emit call. List and mutation results never carry secrets.

use prolter_core::VpnPeer;
use prolter_crypto::{cipher::is_encrypted_blob, SecretCipher};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Columns returned to API callers
const SUMMARY_COLUMNS: &str =
    "id, name, remote_address, local_subnet, remote_subnet, enabled, username";

fn default_true() -> bool {
    true
}

/// Create / update payload
#[derive(Debug, Clone, Deserialize)]
pub struct VpnInput {
    pub name: String,
    #[serde(default)]
    pub remote_address: Option<String>,
    pub local_subnet: String,
    pub remote_subnet: String,
    pub pre_shared_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl VpnInput {
    /// Same field rules the emitter enforces, checked before anything is
    /// stored.
    pub fn validate(&self) -> Result<()> {
        self.to_peer()
            .validate()
            .map_err(|e| StoreError::invalid(e.to_string()))
    }

    /// The peer this input would render as, with empty optionals dropped
    pub fn to_peer(&self) -> VpnPeer {
        VpnPeer {
            name: self.name.clone(),
            remote_address: non_empty(&self.remote_address).map(str::to_string),
            local_subnet: self.local_subnet.clone(),
            remote_subnet: self.remote_subnet.clone(),
            pre_shared_key: self.pre_shared_key.clone(),
            enabled: self.enabled,
            username: non_empty(&self.username).map(str::to_string),
            password: non_empty(&self.password).map(str::to_string),
        }
    }
}

/// A VPN connection without its secrets
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VpnSummary {
    pub id: i32,
    pub name: String,
    pub remote_address: Option<String>,
    pub local_subnet: String,
    pub remote_subnet: String,
    pub enabled: bool,
    pub username: Option<String>,
}

#[derive(FromRow)]
struct VpnSecretRow {
    name: String,
    remote_address: Option<String>,
    local_subnet: String,
    remote_subnet: String,
    pre_shared_key: String,
    enabled: bool,
    username: Option<String>,
    password: Option<String>,
}

impl VpnSecretRow {
    fn into_peer(self, cipher: &SecretCipher) -> Result<VpnPeer> {
        let pre_shared_key = reveal(cipher, &self.name, "pre_shared_key", self.pre_shared_key)?;
        let password = self
            .password
            .filter(|p| !p.is_empty())
            .map(|p| reveal(cipher, &self.name, "password", p))
            .transpose()?;

        Ok(VpnPeer {
            name: self.name,
            remote_address: self.remote_address,
            local_subnet: self.local_subnet,
            remote_subnet: self.remote_subnet,
            pre_shared_key,
            enabled: self.enabled,
            username: self.username,
            password,
        })
    }
}

// Rows written before encryption was enforced hold plaintext
fn reveal(cipher: &SecretCipher, vpn: &str, field: &str, stored: String) -> Result<String> {
    if is_encrypted_blob(&stored) {
        return Ok(cipher.decrypt(&stored)?);
    }
    warn!(vpn, field, "VPN secret stored in plaintext; re-save the connection to encrypt it");
    Ok(stored)
}

#[derive(Clone)]
pub struct VpnRepository {
    pool: PgPool,
    cipher: SecretCipher,
}

impl VpnRepository {
    pub fn new(pool: PgPool, cipher: SecretCipher) -> Self {
        Self { pool, cipher }
    }

    pub async fn list(&self) -> Result<Vec<VpnSummary>> {
        let rows = sqlx::query_as(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM vpn_connections ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create(&self, input: &VpnInput) -> Result<VpnSummary> {
        input.validate()?;
        let psk = self.cipher.encrypt(&input.pre_shared_key)?;
        let password = self.encrypt_password(input)?;

        let row: VpnSummary = sqlx::query_as(&format!(
            "INSERT INTO vpn_connections
                (name, remote_address, local_subnet, remote_subnet, pre_shared_key, enabled, username, password)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {SUMMARY_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(non_empty(&input.remote_address))
        .bind(&input.local_subnet)
        .bind(&input.remote_subnet)
        .bind(psk)
        .bind(input.enabled)
        .bind(non_empty(&input.username))
        .bind(password)
        .fetch_one(&self.pool)
        .await?;

        debug!(id = row.id, name = %row.name, "VPN connection created");
        Ok(row)
    }

    pub async fn update(&self, id: i32, input: &VpnInput) -> Result<Option<VpnSummary>> {
        input.validate()?;
        let psk = self.cipher.encrypt(&input.pre_shared_key)?;
        let password = self.encrypt_password(input)?;

        let row = sqlx::query_as(&format!(
            "UPDATE vpn_connections SET
                name = $1,
                remote_address = $2,
                local_subnet = $3,
                remote_subnet = $4,
                pre_shared_key = $5,
                enabled = $6,
                username = $7,
                password = $8
             WHERE id = $9
             RETURNING {SUMMARY_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(non_empty(&input.remote_address))
        .bind(&input.local_subnet)
        .bind(&input.remote_subnet)
        .bind(psk)
        .bind(input.enabled)
        .bind(non_empty(&input.username))
        .bind(password)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn toggle(&self, id: i32, enabled: bool) -> Result<Option<VpnSummary>> {
        let row = sqlx::query_as(&format!(
            "UPDATE vpn_connections SET enabled = $1 WHERE id = $2 RETURNING {SUMMARY_COLUMNS}"
        ))
        .bind(enabled)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete(&self, id: i32) -> Result<Option<VpnSummary>> {
        let row = sqlx::query_as(&format!(
            "DELETE FROM vpn_connections WHERE id = $1 RETURNING {SUMMARY_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Load a connection with its secrets decrypted
    pub async fn peer(&self, id: i32) -> Result<Option<VpnPeer>> {
        let row: Option<VpnSecretRow> = sqlx::query_as(
            "SELECT name, remote_address, local_subnet, remote_subnet,
                    pre_shared_key, enabled, username, password
             FROM vpn_connections WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row.into_peer(&self.cipher)).transpose()
    }

    fn encrypt_password(&self, input: &VpnInput) -> Result<Option<String>> {
        input
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| self.cipher.encrypt(p))
            .transpose()
            .map_err(StoreError::from)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input() -> VpnInput {
        serde_json::from_value(json!({
            "name": "branch-01",
            "remote_address": "203.0.113.5",
            "local_subnet": "192.168.250.0/24",
            "remote_subnet": "10.0.0.0/24",
            "pre_shared_key": "abc123"
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_input() {
        let vpn = input();
        assert!(vpn.enabled);
        assert!(vpn.validate().is_ok());
    }

    #[test]
    fn test_rejects_config_injection() {
        let mut vpn = input();
        vpn.name = "evil\n  leftid=@attacker".to_string();
        assert!(vpn.validate().is_err());

        let mut vpn = input();
        vpn.pre_shared_key = "x\"\n@any : PSK \"y".to_string();
        assert!(vpn.validate().is_err());

        let mut vpn = input();
        vpn.remote_subnet = "10.0.0.0/24 0.0.0.0/0".to_string();
        assert!(vpn.validate().is_err());

        let mut vpn = input();
        vpn.username = Some("../../etc/x y".to_string());
        assert!(vpn.validate().is_err());
    }

    #[test]
    fn test_validation_message_names_field() {
        let mut vpn = input();
        vpn.local_subnet = "a b".to_string();
        match vpn.validate() {
            Err(StoreError::Validation(msg)) => assert!(msg.contains("local_subnet")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_to_peer_drops_empty_optionals() {
        let mut vpn = input();
        vpn.username = Some(String::new());
        vpn.password = Some(String::new());
        let peer = vpn.to_peer();
        assert!(peer.username.is_none());
        assert!(peer.password.is_none());
        assert_eq!(peer.remote_address.as_deref(), Some("203.0.113.5"));
    }

    #[test]
    fn test_into_peer_decrypts_secrets() {
        let cipher = SecretCipher::new("vpn-test-key");
        let row = VpnSecretRow {
            name: "branch-01".to_string(),
            remote_address: Some("203.0.113.5".to_string()),
            local_subnet: "192.168.250.0/24".to_string(),
            remote_subnet: "10.0.0.0/24".to_string(),
            pre_shared_key: cipher.encrypt("abc123").unwrap(),
            enabled: true,
            username: Some("branch01".to_string()),
            password: Some(cipher.encrypt("l2tp").unwrap()),
        };
        let peer = row.into_peer(&cipher).unwrap();
        assert_eq!(peer.pre_shared_key, "abc123");
        assert_eq!(peer.password.as_deref(), Some("l2tp"));
    }

    #[test]
    fn test_into_peer_passes_legacy_plaintext() {
        let cipher = SecretCipher::new("vpn-test-key");
        let row = VpnSecretRow {
            name: "old".to_string(),
            remote_address: None,
            local_subnet: "a".to_string(),
            remote_subnet: "b".to_string(),
            pre_shared_key: "plain-psk".to_string(),
            enabled: false,
            username: None,
            password: Some(String::new()),
        };
        let peer = row.into_peer(&cipher).unwrap();
        assert_eq!(peer.pre_shared_key, "plain-psk");
        assert!(peer.password.is_none());
    }

    #[test]
    fn test_into_peer_wrong_key_errors_or_differs() {
        let row = VpnSecretRow {
            name: "x".to_string(),
            remote_address: None,
            local_subnet: "a".to_string(),
            remote_subnet: "b".to_string(),
            pre_shared_key: SecretCipher::new("k1").encrypt("abc123").unwrap(),
            enabled: true,
            username: None,
            password: None,
        };
        match row.into_peer(&SecretCipher::new("k2")) {
            Ok(peer) => assert_ne!(peer.pre_shared_key, "abc123"),
            Err(e) => assert!(matches!(e, StoreError::Cipher(_))),
        }
    }
}
