// =====================================================================================
// FIELD ENCRYPTION - AES-256-GCM FOR SENSITIVE TEXT AT REST
// =====================================================================================

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use tracing::warn;

use shared_config::AppConfig;

#[derive(Error, Debug, PartialEq)]
pub enum CryptoError {
    #[error("Encryption key is not configured")]
    KeyMissing,

    #[error("Encryption key must be 32 bytes of base64: {0}")]
    InvalidKey(String),

    #[error("Failed to generate nonce")]
    Nonce,

    #[error("Failed to seal value")]
    Seal,

    #[error("Ciphertext is malformed or was not produced with this key")]
    Open,
}

/// Encrypts individual text fields before they are persisted.
pub trait FieldCipher: Send + Sync {
    fn encrypt(&self, plain_text: &str) -> Result<String, CryptoError>;
    fn decrypt(&self, cipher_text: &str) -> Result<String, CryptoError>;
}

pub struct AesGcmCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl AesGcmCipher {
    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        if raw.len() != 32 {
            return Err(CryptoError::InvalidKey(format!("got {} bytes", raw.len())));
        }

        let unbound = UnboundKey::new(&AES_256_GCM, &raw)
            .map_err(|_| CryptoError::InvalidKey("rejected by AES-256-GCM".to_string()))?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }
}

impl FieldCipher for AesGcmCipher {
    fn encrypt(&self, plain_text: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| CryptoError::Nonce)?;

        let mut in_out = plain_text.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce_bytes), Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);

        Ok(BASE64.encode(sealed))
    }

    fn decrypt(&self, cipher_text: &str) -> Result<String, CryptoError> {
        let sealed = BASE64.decode(cipher_text).map_err(|_| CryptoError::Open)?;
        if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(CryptoError::Open);
        }

        let (nonce_bytes, rest) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CryptoError::Open)?;

        let mut in_out = rest.to_vec();
        let plain = self.key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Open)?;

        String::from_utf8(plain.to_vec()).map_err(|_| CryptoError::Open)
    }
}

/// Stand-in used when no key is configured; every call fails so callers take their plaintext path.
pub struct DisabledCipher;

impl FieldCipher for DisabledCipher {
    fn encrypt(&self, _plain_text: &str) -> Result<String, CryptoError> {
        Err(CryptoError::KeyMissing)
    }

    fn decrypt(&self, _cipher_text: &str) -> Result<String, CryptoError> {
        Err(CryptoError::KeyMissing)
    }
}

pub fn cipher_from_config(config: &AppConfig) -> Arc<dyn FieldCipher> {
    match config.field_encryption_key.as_deref() {
        Some(key) if !key.is_empty() => match AesGcmCipher::from_base64_key(key) {
            Ok(cipher) => Arc::new(cipher),
            Err(e) => {
                warn!("Field encryption disabled: {}", e);
                Arc::new(DisabledCipher)
            }
        },
        _ => Arc::new(DisabledCipher),
    }
}
