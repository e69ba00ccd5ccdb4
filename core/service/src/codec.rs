//! Crypto seam for the download flow.
//!
//! Verification and decryption are CPU-bound: each call re-runs the
//! deliberately slow KDF or verifier. [`PasswordCodec`] moves that work onto
//! the blocking pool so request tasks keep making progress.

use async_trait::async_trait;
use std::sync::Arc;

use docseal_common::{Error, Password, Result, SensitiveBytes};
use docseal_crypto::{ProtectionEncoder, Salt};

/// Password verification and decryption as seen by the flow.
#[async_trait]
pub trait ProtectionCodec: Send + Sync {
    /// Check a password against a stored verifier. Never fails; any internal
    /// error counts as a mismatch.
    async fn verify_password(&self, password: &Password, verifier: &str) -> bool;

    /// Decrypt stored ciphertext with a key derived from `password` and `salt`.
    ///
    /// # Errors
    /// - `DecryptionFailed` if authentication fails
    async fn decrypt(
        &self,
        ciphertext: Vec<u8>,
        password: &Password,
        salt: &Salt,
    ) -> Result<SensitiveBytes>;
}

/// [`ProtectionCodec`] backed by a [`ProtectionEncoder`].
#[derive(Debug, Clone)]
pub struct PasswordCodec {
    encoder: Arc<ProtectionEncoder>,
}

impl PasswordCodec {
    pub fn new(encoder: ProtectionEncoder) -> Self {
        Self {
            encoder: Arc::new(encoder),
        }
    }

    pub fn encoder(&self) -> &ProtectionEncoder {
        &self.encoder
    }
}

#[async_trait]
impl ProtectionCodec for PasswordCodec {
    async fn verify_password(&self, password: &Password, verifier: &str) -> bool {
        let encoder = Arc::clone(&self.encoder);
        let password = password.clone();
        let verifier = verifier.to_string();

        tokio::task::spawn_blocking(move || encoder.verify(&password, &verifier))
            .await
            .unwrap_or(false)
    }

    async fn decrypt(
        &self,
        ciphertext: Vec<u8>,
        password: &Password,
        salt: &Salt,
    ) -> Result<SensitiveBytes> {
        let encoder = Arc::clone(&self.encoder);
        let password = password.clone();
        let salt = salt.clone();

        tokio::task::spawn_blocking(move || encoder.decrypt(&ciphertext, &password, &salt))
            .await
            .map_err(|e| Error::Internal(format!("Decryption task failed: {}", e)))?
    }
}
