//! Bootstrap database credentials
//!
//! The database user, password and name live in a GPG-encrypted file whose
//! plaintext is a handful of `export const dbUser = "..."` lines. They are
//! decrypted once at startup, before the pool exists. Any failure here is
//! fatal for the process.
//!
//! The passphrase never touches a command line: it is written to the
//! decryptor's stdin (`--passphrase-fd 0`).

use secrecy::{ExposeSecret, SecretString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

/// Default location of the encrypted credentials file
pub const DEFAULT_CREDENTIALS_FILE: &str = "/opt/Prolter/db/creds.ts.gpg";
/// Default location of the passphrase file
pub const DEFAULT_PASSPHRASE_FILE: &str = "/opt/Prolter/.gpgpass";

const FIELD_USER: &str = "dbUser";
const FIELD_PASSWORD: &str = "dbPassword";
const FIELD_NAME: &str = "dbName";

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Passphrase file {path} unreadable: {source}")]
    PassphraseFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Passphrase variable {0} is not set")]
    PassphraseEnv(String),

    #[error("Passphrase is empty")]
    EmptyPassphrase,

    #[error("Encrypted credentials file not found: {0}")]
    EncryptedFileMissing(PathBuf),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Decryption command failed ({status}): {stderr}")]
    Decrypt { status: String, stderr: String },

    #[error("Decrypted credentials are not valid UTF-8")]
    NotUtf8,

    #[error("Credential {0} missing from decrypted file")]
    MissingField(&'static str),

    #[error("Credential loader task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The triple needed to open the primary database connection
#[derive(Debug)]
pub struct BootstrapCredentials {
    pub db_user: String,
    pub db_password: SecretString,
    pub db_name: String,
}

/// Where the GPG passphrase comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassphraseSource {
    /// Plaintext file, whitespace-trimmed
    File(PathBuf),
    /// Named environment variable
    Env(String),
}

impl Default for PassphraseSource {
    fn default() -> Self {
        PassphraseSource::File(PathBuf::from(DEFAULT_PASSPHRASE_FILE))
    }
}

impl PassphraseSource {
    pub fn read(&self) -> Result<SecretString, BootstrapError> {
        let raw = match self {
            PassphraseSource::File(path) => {
                std::fs::read_to_string(path).map_err(|source| BootstrapError::PassphraseFile {
                    path: path.clone(),
                    source,
                })?
            }
            PassphraseSource::Env(var) => {
                std::env::var(var).map_err(|_| BootstrapError::PassphraseEnv(var.clone()))?
            }
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BootstrapError::EmptyPassphrase);
        }
        Ok(SecretString::new(trimmed.to_string()))
    }
}

/// Decrypts a whole file given a passphrase
pub trait FileDecryptor: Send + Sync {
    fn decrypt_file(&self, path: &Path, passphrase: &SecretString)
        -> Result<Vec<u8>, BootstrapError>;
}

/// Runs the `gpg` binary with an argument list; passphrase goes over stdin.
#[derive(Debug, Clone)]
pub struct GpgDecryptor {
    program: String,
}

impl Default for GpgDecryptor {
    fn default() -> Self {
        Self::new("gpg")
    }
}

impl GpgDecryptor {
    pub fn new(program: &str) -> Self {
        Self { program: program.to_string() }
    }
}

impl FileDecryptor for GpgDecryptor {
    fn decrypt_file(
        &self,
        path: &Path,
        passphrase: &SecretString,
    ) -> Result<Vec<u8>, BootstrapError> {
        let mut child = Command::new(&self.program)
            .args([
                "--quiet",
                "--batch",
                "--yes",
                "--pinentry-mode",
                "loopback",
                "--passphrase-fd",
                "0",
                "--decrypt",
            ])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BootstrapError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Dropping stdin closes the pipe so the child sees EOF.
        // A child that exits before reading gives EPIPE here; its status wins.
        let write_result = match child.stdin.take() {
            Some(mut stdin) => stdin
                .write_all(passphrase.expose_secret().as_bytes())
                .and_then(|()| stdin.write_all(b"\n")),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(BootstrapError::Decrypt {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        write_result?;

        debug!(bytes = output.stdout.len(), "Decrypted credentials file");
        Ok(output.stdout)
    }
}

/// Parse `export const NAME = "value"` lines.
///
/// Only `dbUser`, `dbPassword` and `dbName` are recognised; anything else is
/// ignored. All three must be present.
pub fn parse_exports(text: &str) -> Result<BootstrapCredentials, BootstrapError> {
    let mut user = None;
    let mut password = None;
    let mut name = None;

    for (key, value) in text.lines().filter_map(parse_export_line) {
        match key {
            FIELD_USER => user = Some(value.to_string()),
            FIELD_PASSWORD => password = Some(value.to_string()),
            FIELD_NAME => name = Some(value.to_string()),
            _ => {}
        }
    }

    Ok(BootstrapCredentials {
        db_user: user.ok_or(BootstrapError::MissingField(FIELD_USER))?,
        db_password: SecretString::new(
            password.ok_or(BootstrapError::MissingField(FIELD_PASSWORD))?,
        ),
        db_name: name.ok_or(BootstrapError::MissingField(FIELD_NAME))?,
    })
}

/// `export const NAME = "value";` -> `(NAME, value)`.
/// The value runs to the last quote on the line and must not be empty.
fn parse_export_line(line: &str) -> Option<(&str, &str)> {
    const MARKER: &str = "export const ";

    let rest = &line[line.find(MARKER)? + MARKER.len()..];
    let name_end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let (name, rest) = rest.split_at(name_end);
    if name.is_empty() {
        return None;
    }

    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let rest = rest.strip_prefix(is_quote)?;
    let close = rest.rfind(is_quote)?;
    let value = &rest[..close];
    if value.is_empty() {
        return None;
    }
    Some((name, value))
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// One-shot loader: read passphrase, decrypt, parse.
pub struct CredentialLoader {
    passphrase: PassphraseSource,
    encrypted_file: PathBuf,
    decryptor: Box<dyn FileDecryptor>,
}

impl CredentialLoader {
    pub fn new(
        passphrase: PassphraseSource,
        encrypted_file: PathBuf,
        decryptor: impl FileDecryptor + 'static,
    ) -> Self {
        Self {
            passphrase,
            encrypted_file,
            decryptor: Box::new(decryptor),
        }
    }

    /// Loader backed by the system `gpg` (or a replacement binary)
    pub fn gpg(passphrase: PassphraseSource, encrypted_file: PathBuf, program: &str) -> Self {
        Self::new(passphrase, encrypted_file, GpgDecryptor::new(program))
    }

    pub fn load(&self) -> Result<BootstrapCredentials, BootstrapError> {
        match self.try_load() {
            Ok(creds) => {
                info!(user = %creds.db_user, database = %creds.db_name, "Loaded bootstrap DB credentials");
                Ok(creds)
            }
            Err(e) => {
                error!(
                    error = %e,
                    file = %self.encrypted_file.display(),
                    "Failed to load encrypted DB credentials"
                );
                Err(e)
            }
        }
    }

    fn try_load(&self) -> Result<BootstrapCredentials, BootstrapError> {
        let passphrase = self.passphrase.read()?;

        if !self.encrypted_file.is_file() {
            return Err(BootstrapError::EncryptedFileMissing(self.encrypted_file.clone()));
        }

        let plaintext = self.decryptor.decrypt_file(&self.encrypted_file, &passphrase)?;
        let text = String::from_utf8(plaintext).map_err(|_| BootstrapError::NotUtf8)?;
        parse_exports(&text)
    }
}

/// Initialise-once wrapper around [`CredentialLoader`].
///
/// Concurrent first callers wait on the same initialisation, so the decrypt
/// subprocess runs at most once per successful load. A failed load leaves
/// the cell empty.
pub struct CredentialCell {
    loader: Arc<CredentialLoader>,
    cell: OnceCell<BootstrapCredentials>,
}

impl CredentialCell {
    pub fn new(loader: CredentialLoader) -> Self {
        Self {
            loader: Arc::new(loader),
            cell: OnceCell::new(),
        }
    }

    /// The decrypt subprocess and its stdin write block, so they run on the
    /// blocking pool.
    pub async fn get(&self) -> Result<&BootstrapCredentials, BootstrapError> {
        self.cell
            .get_or_try_init(|| async {
                let loader = Arc::clone(&self.loader);
                tokio::task::spawn_blocking(move || loader.load())
                    .await
                    .map_err(|e| BootstrapError::Task(e.to_string()))?
            })
            .await
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}
