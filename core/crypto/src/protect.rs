//! Password protection of document content.
//!
//! Protecting a document version produces three persisted values from one
//! password: the ciphertext, the encryption salt used to derive its key, and
//! a self-salted verifier. The encryption salt and the verifier's internal
//! salt are drawn independently; neither is derived from the other.

use rand::{CryptoRng, RngCore};
use std::fmt;

use crate::aead;
use crate::hasher::PasswordHasher;
use crate::kdf::{derive_key, KdfParams};
use crate::keys::Salt;
use docseal_common::{Error, Password, Result, SensitiveBytes};

/// Output of [`ProtectionEncoder::protect`].
pub struct ProtectedContent {
    /// Authenticated ciphertext of the original content.
    pub ciphertext: Vec<u8>,
    /// Salt for re-deriving the encryption key.
    pub salt: Salt,
    /// Password verifier (PHC string).
    pub verifier: String,
}

impl fmt::Debug for ProtectedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedContent")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// Encrypts and decrypts document content under a password.
#[derive(Debug, Clone)]
pub struct ProtectionEncoder {
    kdf: KdfParams,
    hasher: PasswordHasher,
}

impl ProtectionEncoder {
    /// Create an encoder.
    ///
    /// # Errors
    /// - Returns error if the KDF parameters are below the minimum cost
    pub fn new(kdf: KdfParams, hasher: PasswordHasher) -> Result<Self> {
        kdf.validate()?;
        Ok(Self { kdf, hasher })
    }

    /// Get the KDF parameters.
    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf
    }

    /// Protect content with a password, using the OS CSPRNG.
    ///
    /// # Errors
    /// - `InvalidInput` if the password is empty
    /// - Crypto errors from encryption or hashing
    pub fn protect(&self, content: &[u8], password: &Password) -> Result<ProtectedContent> {
        self.protect_with(content, password, &mut rand::rngs::OsRng)
    }

    /// Protect content, drawing both salts from `rng`.
    ///
    /// Pinning `rng` pins the encryption salt and the verifier salt; the
    /// cipher nonce always comes from the OS.
    pub fn protect_with<R: RngCore + CryptoRng>(
        &self,
        content: &[u8],
        password: &Password,
        rng: &mut R,
    ) -> Result<ProtectedContent> {
        if password.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }

        let salt = Salt::generate_with(rng);
        let key = derive_key(password.expose().as_bytes(), &salt, &self.kdf)?;
        let ciphertext = aead::encrypt(&key, content)?;
        let verifier = self.hasher.hash_with(password.expose(), rng)?;

        Ok(ProtectedContent {
            ciphertext,
            salt,
            verifier,
        })
    }

    /// Check a password against a stored verifier.
    pub fn verify(&self, password: &Password, verifier: &str) -> bool {
        self.hasher.verify(password.expose(), verifier)
    }

    /// Re-derive the key from the password and stored salt, then decrypt.
    ///
    /// # Errors
    /// - `DecryptionFailed` if the password, salt or ciphertext do not match
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        password: &Password,
        salt: &Salt,
    ) -> Result<SensitiveBytes> {
        let key = derive_key(password.expose().as_bytes(), salt, &self.kdf)?;
        aead::decrypt(&key, ciphertext)
    }
}
