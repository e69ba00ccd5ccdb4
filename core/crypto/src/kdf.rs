//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! The derivation is deliberately slow: every download of a protected
//! document pays the full iteration count once.

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::keys::{EncryptionKey, Salt, KEY_LENGTH};
use docseal_common::{Error, Result};

/// Lowest iteration count accepted for key derivation.
pub const MIN_ITERATIONS: u32 = 100_000;

/// Parameters for PBKDF2 key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of HMAC-SHA256 iterations.
    pub iterations: u32,
}

impl KdfParams {
    /// Create parameters with an explicit iteration count.
    ///
    /// # Errors
    /// - Returns error if `iterations` is below MIN_ITERATIONS
    pub fn new(iterations: u32) -> Result<Self> {
        let params = Self { iterations };
        params.validate()?;
        Ok(params)
    }

    /// Check the parameters against the minimum cost.
    pub fn validate(&self) -> Result<()> {
        if self.iterations < MIN_ITERATIONS {
            return Err(Error::InvalidInput(format!(
                "KDF iterations must be at least {}, got {}",
                MIN_ITERATIONS, self.iterations
            )));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: MIN_ITERATIONS,
        }
    }
}

/// Derive an encryption key from a password and salt.
///
/// # Postconditions
/// - Returns a KEY_LENGTH-byte key
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns error if `params` are below the minimum cost
///
/// An empty password is accepted here; rejecting it is the encoder's policy.
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<EncryptionKey> {
    params.validate()?;

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password, salt.as_bytes(), params.iterations, &mut key_bytes);

    let key = EncryptionKey::from_bytes(key_bytes);
    zeroize::Zeroize::zeroize(&mut key_bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SALT_LENGTH;

    #[test]
    fn test_derive_key_deterministic() {
        let password = b"test-password-123";
        let salt = Salt::from_bytes([42u8; SALT_LENGTH]);
        let params = KdfParams::default();

        let key1 = derive_key(password, &salt, &params).unwrap();
        let key2 = derive_key(password, &salt, &params).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salt() {
        let password = b"test-password-123";
        let params = KdfParams::default();

        let key1 = derive_key(password, &Salt::from_bytes([1u8; SALT_LENGTH]), &params).unwrap();
        let key2 = derive_key(password, &Salt::from_bytes([2u8; SALT_LENGTH]), &params).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_password() {
        let salt = Salt::from_bytes([42u8; SALT_LENGTH]);
        let params = KdfParams::default();

        let key1 = derive_key(b"password1", &salt, &params).unwrap();
        let key2 = derive_key(b"password2", &salt, &params).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_empty_password_accepted() {
        let salt = Salt::generate();
        assert!(derive_key(b"", &salt, &KdfParams::default()).is_ok());
    }

    #[test]
    fn test_low_iterations_rejected() {
        assert!(KdfParams::new(1_000).is_err());
        assert!(KdfParams::new(MIN_ITERATIONS).is_ok());

        let weak = KdfParams { iterations: 10 };
        assert!(derive_key(b"pw", &Salt::generate(), &weak).is_err());
    }

    #[test]
    fn test_iteration_count_changes_key() {
        let salt = Salt::from_bytes(*b"0123456789abcdef");
        let a = derive_key(b"password", &salt, &KdfParams::new(100_000).unwrap()).unwrap();
        let b = derive_key(b"password", &salt, &KdfParams::new(100_001).unwrap()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }
}
