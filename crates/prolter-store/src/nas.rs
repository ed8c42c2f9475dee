//! NAS (RADIUS client) inventory
//!
//! SNMP community strings and device passwords are encrypted before every
//! write. Listings never select them.

use prolter_crypto::SecretCipher;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, PgPool};
use std::net::IpAddr;
use tracing::debug;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Deserialize)]
pub struct PopRef {
    pub id: String,
}

/// Create / update payload
#[derive(Debug, Clone, Deserialize)]
pub struct NasInput {
    pub nasname: String,
    pub shortname: String,
    #[serde(rename = "type")]
    pub nas_type: String,
    #[serde(default)]
    pub pop: Option<PopRef>,
    #[serde(default)]
    pub snmp_version: Option<String>,
    #[serde(default, deserialize_with = "coerce_opt_i32")]
    pub snmp_port: Option<i32>,
    #[serde(default, deserialize_with = "coerce_opt_i32")]
    pub timeout: Option<i32>,
    #[serde(default)]
    pub community: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Update payload carries the id in the body
#[derive(Debug, Clone, Deserialize)]
pub struct NasUpdate {
    pub id: i32,
    #[serde(flatten)]
    pub fields: NasInput,
}

impl NasInput {
    pub fn validate(&self) -> Result<()> {
        self.nasname
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| StoreError::invalid(format!("nasname must be an IP address: {:?}", self.nasname)))?;
        if self.shortname.is_empty() {
            return Err(StoreError::invalid("shortname is required"));
        }
        if self.nas_type.is_empty() {
            return Err(StoreError::invalid("type is required"));
        }
        self.pop_id()?;
        Ok(())
    }

    /// PoP ids arrive as strings from the form; the column is an integer
    pub fn pop_id(&self) -> Result<Option<i32>> {
        match &self.pop {
            None => Ok(None),
            Some(pop) if pop.id.trim().is_empty() => Ok(None),
            Some(pop) => pop
                .id
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| StoreError::invalid(format!("invalid pop id: {:?}", pop.id))),
        }
    }
}

// Numbers may arrive as JSON numbers or numeric strings; "" means absent
fn coerce_opt_i32<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("not an integer: {n}"))),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("not an integer: {s:?}"))),
        Some(other) => Err(D::Error::custom(format!("not an integer: {other}"))),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PopSummary {
    pub id: i32,
    pub name: Option<String>,
}

/// List row, no secrets
#[derive(Debug, Clone, Serialize)]
pub struct NasSummary {
    pub id: i32,
    pub nasname: String,
    pub shortname: String,
    #[serde(rename = "type")]
    pub nas_type: String,
    pub snmp_status: String,
    pub pop: Option<PopSummary>,
}

#[derive(Debug, FromRow)]
struct NasListRow {
    id: i32,
    nasname: String,
    shortname: String,
    nas_type: String,
    snmp_status: Option<String>,
    pop_id: Option<i32>,
    pop_name: Option<String>,
}

impl From<NasListRow> for NasSummary {
    fn from(row: NasListRow) -> Self {
        NasSummary {
            id: row.id,
            nasname: row.nasname,
            shortname: row.shortname,
            nas_type: row.nas_type,
            snmp_status: row.snmp_status.unwrap_or_else(|| "pending".to_string()),
            pop: row.pop_id.map(|id| PopSummary {
                id,
                name: row.pop_name,
            }),
        }
    }
}

/// `Some(blob)` for a non-empty value, `None` otherwise
fn encrypt_opt(cipher: &SecretCipher, value: Option<&str>) -> Result<Option<String>> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| cipher.encrypt(v))
        .transpose()
        .map_err(StoreError::from)
}

fn none_if_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct NasRepository {
    pool: PgPool,
    cipher: SecretCipher,
}

impl NasRepository {
    pub fn new(pool: PgPool, cipher: SecretCipher) -> Self {
        Self { pool, cipher }
    }

    pub async fn list(&self) -> Result<Vec<NasSummary>> {
        let rows: Vec<NasListRow> = sqlx::query_as(
            "SELECT
                n.id,
                n.nasname,
                n.shortname,
                n.type AS nas_type,
                n.snmp_status,
                p.id AS pop_id,
                p.name AS pop_name
             FROM nas n
             LEFT JOIN pops p ON n.pop_id = p.id
             ORDER BY n.id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(NasSummary::from).collect())
    }

    /// Insert and return the new id
    pub async fn create(&self, input: &NasInput) -> Result<i32> {
        input.validate()?;
        let community = encrypt_opt(&self.cipher, input.community.as_deref())?;
        let password = encrypt_opt(&self.cipher, input.password.as_deref())?;

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO nas (
                nasname, shortname, type, pop_id,
                snmp_version, snmp_port, timeout,
                community, username, password
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING id",
        )
        .bind(input.nasname.trim())
        .bind(&input.shortname)
        .bind(&input.nas_type)
        .bind(input.pop_id()?)
        .bind(none_if_empty(input.snmp_version.as_deref()))
        .bind(input.snmp_port)
        .bind(input.timeout)
        .bind(community)
        .bind(none_if_empty(input.username.as_deref()))
        .bind(password)
        .fetch_one(&self.pool)
        .await?;

        debug!(id, nasname = %input.nasname, "NAS created");
        Ok(id)
    }

    /// Returns false if no row had this id
    pub async fn update(&self, id: i32, input: &NasInput) -> Result<bool> {
        input.validate()?;
        let community = encrypt_opt(&self.cipher, input.community.as_deref())?;
        let password = encrypt_opt(&self.cipher, input.password.as_deref())?;

        let result = sqlx::query(
            "UPDATE nas SET
                nasname = $1,
                shortname = $2,
                type = $3,
                pop_id = $4,
                snmp_version = $5,
                snmp_port = $6,
                timeout = $7,
                community = $8,
                username = $9,
                password = $10,
                updated_at = now()
             WHERE id = $11",
        )
        .bind(input.nasname.trim())
        .bind(&input.shortname)
        .bind(&input.nas_type)
        .bind(input.pop_id()?)
        .bind(none_if_empty(input.snmp_version.as_deref()))
        .bind(input.snmp_port)
        .bind(input.timeout)
        .bind(community)
        .bind(none_if_empty(input.username.as_deref()))
        .bind(password)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM nas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Management address of the device
    pub async fn address(&self, id: i32) -> Result<Option<String>> {
        let addr = sqlx::query_scalar("SELECT nasname FROM nas WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(addr)
    }

    pub async fn set_status(&self, id: i32, status: &str) -> Result<()> {
        sqlx::query("UPDATE nas SET snmp_status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
