//! Command-line / environment configuration

use clap::Args;
use prolter_core::netconf::{DEFAULT_LEFT_ID, DEFAULT_LEFT_SUBNET};
use prolter_core::{ConfigEmitter, EmitterPaths, StrongSwanOptions};
use prolter_crypto::bootstrap::{DEFAULT_CREDENTIALS_FILE, DEFAULT_PASSPHRASE_FILE};
use prolter_crypto::{CredentialLoader, PassphraseSource};
use prolter_store::DatabaseSettings;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Where the bootstrap DB credentials come from
#[derive(Args, Debug, Clone)]
pub struct BootstrapArgs {
    /// GPG-encrypted credentials file
    #[arg(long, env = "PROLTER_CREDENTIALS_FILE", default_value = DEFAULT_CREDENTIALS_FILE)]
    pub credentials_file: PathBuf,

    /// File holding the GPG passphrase
    #[arg(long, env = "PROLTER_PASSPHRASE_FILE", default_value = DEFAULT_PASSPHRASE_FILE)]
    pub passphrase_file: PathBuf,

    /// Read the passphrase from this environment variable instead of the file
    #[arg(long, env = "PROLTER_PASSPHRASE_ENV")]
    pub passphrase_env: Option<String>,

    /// gpg binary
    #[arg(long, env = "PROLTER_GPG_BIN", default_value = "gpg")]
    pub gpg_bin: String,
}

impl BootstrapArgs {
    pub fn passphrase_source(&self) -> PassphraseSource {
        match &self.passphrase_env {
            Some(var) if !var.is_empty() => PassphraseSource::Env(var.clone()),
            _ => PassphraseSource::File(self.passphrase_file.clone()),
        }
    }

    pub fn loader(&self) -> CredentialLoader {
        CredentialLoader::gpg(
            self.passphrase_source(),
            self.credentials_file.clone(),
            &self.gpg_bin,
        )
    }
}

#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    #[arg(long = "db-host", env = "PGHOST", default_value = "localhost")]
    pub host: String,

    #[arg(long = "db-port", env = "PGPORT", default_value_t = 5432)]
    pub port: u16,

    /// disable, prefer, require, verify-ca or verify-full
    #[arg(long = "db-ssl-mode", env = "PGSSLMODE", default_value = "prefer")]
    pub ssl_mode: String,

    #[arg(long = "db-max-connections", env = "PROLTER_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,
}

impl DbArgs {
    pub fn settings(&self) -> DatabaseSettings {
        DatabaseSettings {
            host: self.host.clone(),
            port: self.port,
            ssl_mode: self.ssl_mode.clone(),
            max_connections: self.max_connections,
            ..DatabaseSettings::default()
        }
    }
}

/// Target files and identity for VPN config emission
#[derive(Args, Debug, Clone)]
pub struct NetconfArgs {
    #[arg(long, env = "PROLTER_IPSEC_CONF", default_value = "/etc/ipsec.conf")]
    pub ipsec_conf: PathBuf,

    #[arg(long, env = "PROLTER_IPSEC_SECRETS", default_value = "/etc/ipsec.secrets")]
    pub ipsec_secrets: PathBuf,

    #[arg(long, env = "PROLTER_XL2TPD_CONF", default_value = "/etc/xl2tpd/xl2tpd.conf")]
    pub xl2tpd_conf: PathBuf,

    /// Directory for per-peer `options.l2tpd.<user>` files
    #[arg(long, env = "PROLTER_PPP_DIR", default_value = "/etc/ppp")]
    pub ppp_dir: PathBuf,

    #[command(flatten)]
    pub identity: IdentityArgs,
}

impl NetconfArgs {
    pub fn paths(&self) -> EmitterPaths {
        EmitterPaths {
            ipsec_conf: self.ipsec_conf.clone(),
            ipsec_secrets: self.ipsec_secrets.clone(),
            xl2tpd_conf: self.xl2tpd_conf.clone(),
            ppp_dir: self.ppp_dir.clone(),
        }
    }

    pub fn emitter(&self) -> ConfigEmitter {
        ConfigEmitter::new(self.paths(), self.identity.options())
    }
}

/// Server side of the strongSwan tunnel
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    #[arg(long, env = "PROLTER_VPN_LEFT_ID", default_value = DEFAULT_LEFT_ID)]
    pub left_id: String,

    #[arg(long, env = "PROLTER_VPN_LEFT_SUBNET", default_value = DEFAULT_LEFT_SUBNET)]
    pub left_subnet: String,
}

impl IdentityArgs {
    pub fn options(&self) -> StrongSwanOptions {
        StrongSwanOptions {
            left_id: self.left_id.clone(),
            left_subnet: self.left_subnet.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "PROLTER_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Create missing tables before serving
    #[arg(long)]
    pub init_schema: bool,

    #[command(flatten)]
    pub bootstrap: BootstrapArgs,

    #[command(flatten)]
    pub db: DbArgs,

    #[command(flatten)]
    pub netconf: NetconfArgs,
}
