//! Prolter Crypto - credential protection
//!
//! This crate provides:
//! - AES-256-CBC encryption for secrets stored in the database
//!   (NAS community strings, device passwords, VPN pre-shared keys)
//! - Loading of the GPG-encrypted bootstrap database credentials

pub mod bootstrap;
pub mod cipher;

pub use bootstrap::{
    BootstrapCredentials, BootstrapError, CredentialCell, CredentialLoader, FileDecryptor,
    GpgDecryptor, PassphraseSource,
};
pub use cipher::{CipherError, SecretCipher};
