//! AES-256-CBC secret encryption for values stored in the database
//!
//! Blobs look like `ivHex:cipherHex`: a fresh 16-byte IV per call, PKCS#7
//! padding, lowercase hex. The format (and the key derivation below) must
//! stay bit-compatible with rows that are already encrypted.
//!
//! Known weaknesses, kept on purpose for compatibility:
//! - the key is the raw env string padded with `'0'`, not a real KDF
//! - CBC has no MAC, so a tampered blob with intact padding decrypts to
//!   garbage instead of failing

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// 256-bit key (32 bytes)
pub const KEY_SIZE: usize = 32;
/// CBC initialization vector (16 bytes)
pub const IV_SIZE: usize = 16;
/// Environment variable holding the raw key
pub const KEY_ENV: &str = "NAS_ENCRYPTION_KEY";

const KEY_PAD: u8 = b'0';

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("{KEY_ENV} is not defined in the environment variables")]
    MissingKey,

    #[error("Malformed encrypted value: {0}")]
    Malformed(&'static str),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed - wrong key or truncated data")]
    DecryptionFailed,
}

/// Holds the derived key. Cheap to clone, scrubbed on drop.
#[derive(Clone)]
pub struct SecretCipher {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher {
    /// Derive the key from a raw string: truncated to 32 bytes, or
    /// right-padded with ASCII `'0'`.
    pub fn new(raw_key: &str) -> Self {
        let mut key = Zeroizing::new([KEY_PAD; KEY_SIZE]);
        let raw = raw_key.as_bytes();
        let n = raw.len().min(KEY_SIZE);
        key[..n].copy_from_slice(&raw[..n]);
        Self { key }
    }

    /// Build from `NAS_ENCRYPTION_KEY`. Unset or empty is a configuration error.
    pub fn from_env() -> Result<Self, CipherError> {
        match std::env::var(KEY_ENV) {
            Ok(raw) if !raw.is_empty() => Ok(Self::new(&raw)),
            _ => Err(CipherError::MissingKey),
        }
    }

    /// Encrypt `plaintext` into `hex(iv):hex(ciphertext)`
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new_from_slices(self.key.as_ref(), &iv)
            .map_err(|_| CipherError::EncryptionFailed)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
    }

    /// Decrypt a blob produced by [`SecretCipher::encrypt`].
    ///
    /// Invalid UTF-8 in the recovered bytes is replaced, not rejected.
    pub fn decrypt(&self, blob: &str) -> Result<String, CipherError> {
        let (iv_hex, cipher_hex) = blob
            .split_once(':')
            .ok_or(CipherError::Malformed("missing ':' separator"))?;

        let iv = hex::decode(iv_hex).map_err(|_| CipherError::Malformed("IV is not hex"))?;
        if iv.len() != IV_SIZE {
            return Err(CipherError::Malformed("IV must be 16 bytes"));
        }
        let ciphertext =
            hex::decode(cipher_hex).map_err(|_| CipherError::Malformed("ciphertext is not hex"))?;

        let plaintext = Aes256CbcDec::new_from_slices(self.key.as_ref(), &iv)
            .map_err(|_| CipherError::DecryptionFailed)?
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CipherError::DecryptionFailed)?;

        Ok(String::from_utf8_lossy(&plaintext).into_owned())
    }
}

/// Encrypt with the key currently in the environment
pub fn encrypt(plaintext: &str) -> Result<String, CipherError> {
    SecretCipher::from_env()?.encrypt(plaintext)
}

/// Decrypt with the key currently in the environment
pub fn decrypt(blob: &str) -> Result<String, CipherError> {
    SecretCipher::from_env()?.decrypt(blob)
}

/// True if `value` has the `<32 hex>:<hex>` shape of an encrypted blob.
pub fn is_encrypted_blob(value: &str) -> bool {
    let Some((iv, ct)) = value.split_once(':') else {
        return false;
    };
    iv.len() == IV_SIZE * 2
        && !ct.is_empty()
        && ct.len() % 2 == 0
        && iv.bytes().chain(ct.bytes()).all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> SecretCipher {
        SecretCipher::new("unit-test-key")
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let c = cipher();
        for plaintext in ["public", "", "p@ss:word with spaces", "ключ-сообщества"] {
            let blob = c.encrypt(plaintext).unwrap();
            assert_eq!(c.decrypt(&blob).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_blob_format() {
        let blob = cipher().encrypt("community").unwrap();
        let (iv, ct) = blob.split_once(':').unwrap();
        assert_eq!(iv.len(), 32);
        // one AES block for a 9-byte plaintext
        assert_eq!(ct.len(), 32);
        assert!(is_encrypted_blob(&blob));
        assert_eq!(blob, blob.to_lowercase());
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let c = cipher();
        let a = c.encrypt("same secret").unwrap();
        let b = c.encrypt("same secret").unwrap();
        assert_ne!(a, b);
        assert_eq!(c.decrypt(&a).unwrap(), "same secret");
        assert_eq!(c.decrypt(&b).unwrap(), "same secret");
    }

    #[test]
    fn test_missing_separator_fails() {
        let err = cipher().decrypt("00112233445566778899aabbccddeeff").unwrap_err();
        assert!(matches!(err, CipherError::Malformed(_)));
    }

    #[test]
    fn test_bad_iv_fails() {
        let c = cipher();
        assert!(matches!(c.decrypt("zz:00"), Err(CipherError::Malformed(_))));
        assert!(matches!(c.decrypt("0011:00112233"), Err(CipherError::Malformed(_))));
    }

    #[test]
    fn test_tampered_ciphertext_is_not_detected() {
        let c = cipher();
        // 40 bytes -> three blocks, padding lives in the untouched last block
        let plaintext = "a fairly long shared key for the tunnel!";
        assert_eq!(plaintext.len(), 40);
        let blob = c.encrypt(plaintext).unwrap();
        let (iv, ct) = blob.split_once(':').unwrap();

        let mut bytes = hex::decode(ct).unwrap();
        bytes[0] ^= 0xFF;
        let tampered = format!("{}:{}", iv, hex::encode(bytes));

        let garbage = c.decrypt(&tampered).unwrap();
        assert_ne!(garbage, plaintext);
    }

    #[test]
    fn test_wrong_key_does_not_return_plaintext() {
        let blob = SecretCipher::new("key-one").encrypt("secret data").unwrap();
        match SecretCipher::new("key-two").decrypt(&blob) {
            Ok(text) => assert_ne!(text, "secret data"),
            Err(e) => assert!(matches!(e, CipherError::DecryptionFailed)),
        }
    }

    #[test]
    fn test_key_padding_and_truncation() {
        // padding with '0' means these two raw keys are the same key
        let blob = SecretCipher::new("abc").encrypt("x").unwrap();
        assert_eq!(SecretCipher::new("abc00000").decrypt(&blob).unwrap(), "x");

        let long = "k".repeat(40);
        let blob = SecretCipher::new(&long).encrypt("y").unwrap();
        assert_eq!(SecretCipher::new(&"k".repeat(32)).decrypt(&blob).unwrap(), "y");
    }

    // the only test that touches the process environment
    #[test]
    fn test_env_key_helpers() {
        std::env::set_var(KEY_ENV, "env-test-key");
        let blob = encrypt("from env").unwrap();
        assert_eq!(decrypt(&blob).unwrap(), "from env");

        std::env::remove_var(KEY_ENV);
        assert!(matches!(encrypt("x"), Err(CipherError::MissingKey)));
        assert!(matches!(decrypt(&blob), Err(CipherError::MissingKey)));
    }

    #[test]
    fn test_is_encrypted_blob() {
        assert!(!is_encrypted_blob("plaintext-psk"));
        assert!(!is_encrypted_blob("abcd:ef"));
        assert!(!is_encrypted_blob("00112233445566778899aabbccddeeff:"));
        assert!(is_encrypted_blob("00112233445566778899aabbccddeeff:00"));
    }
}
