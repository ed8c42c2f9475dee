//! Prolter - ISP back-office API and admin CLI
//!
//! Usage:
//!   prolter serve              - Start the HTTP API
//!   prolter secret encrypt     - Encrypt a value for storage
//!   prolter secret decrypt     - Decrypt a stored value
//!   prolter bootstrap check    - Verify the encrypted DB credentials load
//!   prolter db init            - Create missing tables
//!   prolter vpn render         - Print a strongSwan peer block

mod config;
mod routes;
mod server;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use prolter_core::netconf::{strongswan, VpnPeer};
use prolter_crypto::SecretCipher;
use secrecy::ExposeSecret;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{BootstrapArgs, DbArgs, IdentityArgs, ServeArgs};

const DEFAULT_LOG_FILTER: &str =
    "prolter_cli=info,prolter_core=info,prolter_crypto=info,prolter_store=info,tower_http=info";

#[derive(Parser)]
#[command(name = "prolter")]
#[command(author = "Prolter")]
#[command(version)]
#[command(about = "ISP back-office API and admin tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve(ServeArgs),

    /// Encrypt or decrypt stored secrets with NAS_ENCRYPTION_KEY
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },

    /// Bootstrap credential tools
    Bootstrap {
        #[command(subcommand)]
        action: BootstrapAction,
    },

    /// Database maintenance
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// VPN config tools
    Vpn {
        #[command(subcommand)]
        action: VpnAction,
    },
}

#[derive(Subcommand)]
enum SecretAction {
    /// Print `hex(iv):hex(ciphertext)` for a value
    Encrypt {
        value: String,
    },

    /// Print the plaintext of a stored blob
    Decrypt {
        blob: String,
    },
}

#[derive(Subcommand)]
enum BootstrapAction {
    /// Decrypt the credentials file and print user / database (password masked)
    Check(BootstrapArgs),
}

#[derive(Subcommand)]
enum DbAction {
    /// Create missing tables
    Init {
        #[command(flatten)]
        bootstrap: BootstrapArgs,

        #[command(flatten)]
        db: DbArgs,
    },
}

#[derive(Subcommand)]
enum VpnAction {
    /// Print the `conn` block and secret line without touching disk
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    remote_address: Option<String>,

    #[arg(long, default_value = "192.168.250.0/24")]
    local_subnet: String,

    #[arg(long)]
    remote_subnet: String,

    #[arg(long)]
    psk: String,

    #[command(flatten)]
    identity: IdentityArgs,
}

impl RenderArgs {
    fn peer(&self) -> anyhow::Result<VpnPeer> {
        let peer = VpnPeer {
            name: self.name.clone(),
            remote_address: self.remote_address.clone(),
            local_subnet: self.local_subnet.clone(),
            remote_subnet: self.remote_subnet.clone(),
            pre_shared_key: self.psk.clone(),
            enabled: true,
            username: None,
            password: None,
        };
        peer.validate()?;
        Ok(peer)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => server::serve(args).await?,

        Commands::Secret { action } => {
            let cipher = SecretCipher::from_env()?;
            match action {
                SecretAction::Encrypt { value } => println!("{}", cipher.encrypt(&value)?),
                SecretAction::Decrypt { blob } => println!("{}", cipher.decrypt(&blob)?),
            }
        }

        Commands::Bootstrap { action } => match action {
            BootstrapAction::Check(args) => {
                let creds = args.loader().load()?;
                println!("user:     {}", creds.db_user);
                println!("password: {}", mask(creds.db_password.expose_secret()));
                println!("database: {}", creds.db_name);
            }
        },

        Commands::Db { action } => match action {
            DbAction::Init { bootstrap, db } => {
                let creds = bootstrap.loader().load()?;
                let pool = prolter_store::connect(&db.settings(), &creds)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                prolter_store::ensure_schema(&pool).await?;
                println!("Schema ready on {}", creds.db_name);
            }
        },

        Commands::Vpn { action } => match action {
            VpnAction::Render(args) => {
                let peer = args.peer()?;
                let options = args.identity.options();
                println!("{}", strongswan::render_tunnel_config(&peer, &options));
                println!();
                println!("{}", strongswan::render_secret_entry(&peer, &options));
            }
        },
    }

    Ok(())
}

/// Shows only the length
fn mask(secret: &str) -> String {
    format!("{} ({} chars)", "*".repeat(8), secret.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_args_build_peer() {
        let cli = Cli::parse_from([
            "prolter", "vpn", "render", "--name", "peer1", "--remote-subnet", "10.0.0.0/24", "--psk",
            "abc123",
        ]);
        let Commands::Vpn { action: VpnAction::Render(args) } = cli.command else {
            panic!("expected vpn render");
        };
        let peer = args.peer().unwrap();
        assert_eq!(peer.name, "peer1");
        assert!(peer.remote_address.is_none());
    }

    #[test]
    fn test_render_rejects_injection() {
        let cli = Cli::parse_from([
            "prolter", "vpn", "render", "--name", "p1", "--remote-subnet", "10.0.0.0/24", "--psk",
            "x\"\nevil",
        ]);
        let Commands::Vpn { action: VpnAction::Render(args) } = cli.command else {
            panic!("expected vpn render");
        };
        assert!(args.peer().is_err());
    }

    #[test]
    fn test_mask_hides_value() {
        let masked = mask("hunter2");
        assert!(!masked.contains("hunter2"));
        assert!(masked.ends_with("(7 chars)"));
    }
}
