//! Store error types

use prolter_crypto::CipherError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Secret encryption error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Database configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
