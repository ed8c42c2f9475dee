//! Writes rendered peer config into the system config files
//!
//! Appends are serialised through one mutex so two peers never interleave.
//! There is no rollback: if the second write fails after the first
//! succeeded, the two files disagree and the error says which path failed.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};

use super::{strongswan, xl2tpd, EmitError, StrongSwanOptions, VpnPeer};

/// Target files. Defaults are the stock system locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterPaths {
    pub ipsec_conf: PathBuf,
    pub ipsec_secrets: PathBuf,
    pub xl2tpd_conf: PathBuf,
    pub ppp_dir: PathBuf,
}

impl Default for EmitterPaths {
    fn default() -> Self {
        Self {
            ipsec_conf: PathBuf::from("/etc/ipsec.conf"),
            ipsec_secrets: PathBuf::from("/etc/ipsec.secrets"),
            xl2tpd_conf: PathBuf::from("/etc/xl2tpd/xl2tpd.conf"),
            ppp_dir: PathBuf::from("/etc/ppp"),
        }
    }
}

impl EmitterPaths {
    /// All files under one directory (tests, staging)
    pub fn under(dir: &Path) -> Self {
        Self {
            ipsec_conf: dir.join("ipsec.conf"),
            ipsec_secrets: dir.join("ipsec.secrets"),
            xl2tpd_conf: dir.join("xl2tpd.conf"),
            ppp_dir: dir.to_path_buf(),
        }
    }
}

pub struct ConfigEmitter {
    paths: EmitterPaths,
    options: StrongSwanOptions,
    lock: Mutex<()>,
}

impl ConfigEmitter {
    pub fn new(paths: EmitterPaths, options: StrongSwanOptions) -> Self {
        Self {
            paths,
            options,
            lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &EmitterPaths {
        &self.paths
    }

    pub fn options(&self) -> &StrongSwanOptions {
        &self.options
    }

    /// Append the `conn` block and the PSK line for `peer`
    pub fn emit_strongswan(&self, peer: &VpnPeer) -> Result<(), EmitError> {
        peer.validate()?;
        let conf = strongswan::render_tunnel_config(peer, &self.options);
        let secret = strongswan::render_secret_entry(peer, &self.options);

        let _guard = self.lock.lock().map_err(|_| EmitError::Poisoned)?;
        append(&self.paths.ipsec_conf, &format!("\n\n{conf}"))?;
        append(&self.paths.ipsec_secrets, &format!("\n{secret}"))?;

        info!(peer = %peer.name, conf = %self.paths.ipsec_conf.display(), "Wrote strongSwan peer config");
        Ok(())
    }

    /// Append the client section and (over)write the peer's PPP options file.
    /// Returns the options file path.
    pub fn emit_xl2tpd(&self, peer: &VpnPeer) -> Result<PathBuf, EmitError> {
        peer.validate()?;
        let client = xl2tpd::render_client_config(peer, &self.paths.ppp_dir)?;
        let options = xl2tpd::render_ppp_options(peer)?;
        let options_path = xl2tpd::ppp_options_path(peer, &self.paths.ppp_dir)?;

        let _guard = self.lock.lock().map_err(|_| EmitError::Poisoned)?;
        append(&self.paths.xl2tpd_conf, &format!("\n\n{client}"))?;
        write_private(&options_path, &options)?;

        info!(peer = %peer.name, options = %options_path.display(), "Wrote xl2tpd peer config");
        Ok(options_path)
    }
}

fn append(path: &Path, text: &str) -> Result<(), EmitError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(text.as_bytes()))
        .map_err(|source| io_error(path, source))
}

// Holds a password: owner-only on unix
fn write_private(path: &Path, text: &str) -> Result<(), EmitError> {
    let mut opts = OpenOptions::new();
    opts.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    opts.open(path)
        .and_then(|mut file| file.write_all(text.as_bytes()))
        .map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> EmitError {
    error!(path = %path.display(), error = %source, "Config emission failed");
    EmitError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netconf::test_peer;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn emitter(dir: &TempDir) -> ConfigEmitter {
        ConfigEmitter::new(EmitterPaths::under(dir.path()), StrongSwanOptions::default())
    }

    #[test]
    fn test_strongswan_appends_both_files() {
        let dir = TempDir::new().unwrap();
        let em = emitter(&dir);
        fs::write(&em.paths().ipsec_conf, "config setup\n  uniqueids=yes").unwrap();

        let mut second = test_peer();
        second.name = "peer2".to_string();
        second.pre_shared_key = "xyz".to_string();

        em.emit_strongswan(&test_peer()).unwrap();
        em.emit_strongswan(&second).unwrap();

        let conf = fs::read_to_string(&em.paths().ipsec_conf).unwrap();
        assert!(conf.starts_with("config setup\n  uniqueids=yes\n\nconn peer1\n"));
        assert!(conf.contains("esp=aes256-sha256\n\nconn peer2\n"));

        let secrets = fs::read_to_string(&em.paths().ipsec_secrets).unwrap();
        assert_eq!(
            secrets,
            "\n@vpn.prolter.local : PSK \"abc123\"\n@vpn.prolter.local : PSK \"xyz\""
        );
    }

    #[test]
    fn test_second_write_failure_is_reported_without_rollback() {
        let dir = TempDir::new().unwrap();
        let mut paths = EmitterPaths::under(dir.path());
        paths.ipsec_secrets = dir.path().join("missing-dir").join("ipsec.secrets");
        let em = ConfigEmitter::new(paths.clone(), StrongSwanOptions::default());

        match em.emit_strongswan(&test_peer()) {
            Err(EmitError::Io { path, .. }) => assert_eq!(path, paths.ipsec_secrets),
            other => panic!("expected Io error, got {other:?}"),
        }
        // first file already has the block
        let conf = fs::read_to_string(&paths.ipsec_conf).unwrap();
        assert!(conf.contains("conn peer1"));
    }

    #[test]
    fn test_xl2tpd_writes_options_file() {
        let dir = TempDir::new().unwrap();
        let em = emitter(&dir);

        let options_path = em.emit_xl2tpd(&test_peer()).unwrap();
        assert_eq!(options_path, dir.path().join("options.l2tpd.branch01"));

        let conf = fs::read_to_string(&em.paths().xl2tpd_conf).unwrap();
        assert!(conf.starts_with("\n\n[client-branch01]\n"));

        // rewritten, not appended
        em.emit_xl2tpd(&test_peer()).unwrap();
        let options = fs::read_to_string(&options_path).unwrap();
        assert_eq!(options.matches("name branch01").count(), 1);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&options_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o077, 0);
        }
    }

    #[test]
    fn test_xl2tpd_validation_happens_before_any_write() {
        let dir = TempDir::new().unwrap();
        let em = emitter(&dir);
        let mut peer = test_peer();
        peer.password = None;

        assert!(em.emit_xl2tpd(&peer).is_err());
        assert!(!em.paths().xl2tpd_conf.exists());
    }

    #[test]
    fn test_unchecked_peer_never_reaches_disk() {
        let dir = TempDir::new().unwrap();
        let em = emitter(&dir);

        let mut peer = test_peer();
        peer.name = "legacy\nconn %default\n  authby=never".to_string();
        peer.pre_shared_key = "k\"\n: PSK \"attacker".to_string();

        assert!(matches!(
            em.emit_strongswan(&peer),
            Err(EmitError::InvalidField { field: "name", .. })
        ));
        assert!(matches!(em.emit_xl2tpd(&peer), Err(EmitError::InvalidField { .. })));
        assert!(!em.paths().ipsec_conf.exists());
        assert!(!em.paths().ipsec_secrets.exists());
        assert!(!em.paths().xl2tpd_conf.exists());
    }

    #[test]
    fn test_concurrent_emission_does_not_interleave() {
        let dir = TempDir::new().unwrap();
        let em = Arc::new(emitter(&dir));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let em = Arc::clone(&em);
                std::thread::spawn(move || {
                    let mut peer = test_peer();
                    peer.name = format!("peer{i}");
                    em.emit_strongswan(&peer).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let conf = fs::read_to_string(&em.paths().ipsec_conf).unwrap();
        let blocks: Vec<&str> = conf.split("\n\n").filter(|b| !b.is_empty()).collect();
        assert_eq!(blocks.len(), 16);
        for block in blocks {
            assert!(block.starts_with("conn peer"));
            assert_eq!(block.lines().count(), 12);
        }

        let secrets = fs::read_to_string(&em.paths().ipsec_secrets).unwrap();
        assert_eq!(secrets.lines().filter(|l| !l.is_empty()).count(), 16);
    }
}
