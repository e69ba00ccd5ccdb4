//! Password verifiers using Argon2id.
//!
//! A verifier is a PHC string (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`)
//! carrying its own random salt and cost parameters. It never decodes to the
//! password and is unrelated to the encryption salt.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use docseal_common::{Error, Result};

/// Width of the persisted verifier column.
pub const MAX_VERIFIER_LENGTH: usize = 255;

/// Length of the random salt embedded in each verifier.
const VERIFIER_SALT_LENGTH: usize = 16;

/// Argon2id cost parameters for new verifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasherParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Number of passes.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl HasherParams {
    /// Create explicit parameters.
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }
}

impl Default for HasherParams {
    fn default() -> Self {
        Self {
            memory_cost: Params::DEFAULT_M_COST,
            time_cost: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Produces and checks password verifiers.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Create a hasher with the given cost parameters.
    ///
    /// # Errors
    /// - Returns error if the parameters are rejected by Argon2
    pub fn new(params: HasherParams) -> Result<Self> {
        let params = Params::new(
            params.memory_cost,
            params.time_cost,
            params.parallelism,
            None,
        )
        .map_err(|e| Error::Crypto(format!("Invalid hasher parameters: {}", e)))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password into a fresh verifier.
    ///
    /// Two calls with the same password produce different strings.
    pub fn hash(&self, password: &str) -> Result<String> {
        self.hash_with(password, &mut rand::rngs::OsRng)
    }

    /// Hash a password, drawing the verifier salt from `rng`.
    pub fn hash_with<R: RngCore + CryptoRng>(&self, password: &str, rng: &mut R) -> Result<String> {
        let mut salt_bytes = [0u8; VERIFIER_SALT_LENGTH];
        rng.fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| Error::Crypto(format!("Salt encoding failed: {}", e)))?;

        let verifier = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Crypto(format!("Password hashing failed: {}", e)))?
            .to_string();

        if verifier.len() > MAX_VERIFIER_LENGTH {
            return Err(Error::Crypto(format!(
                "Verifier exceeds {} characters",
                MAX_VERIFIER_LENGTH
            )));
        }

        Ok(verifier)
    }

    /// Check a password against a stored verifier.
    ///
    /// Returns false for a mismatch, a malformed verifier or any internal
    /// failure. Never logs. Cost parameters are taken from the verifier
    /// itself, so older verifiers keep working after a cost change.
    pub fn verify(&self, password: &str, verifier: &str) -> bool {
        let parsed = match PasswordHash::new(verifier) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(HasherParams::new(1024, 1, 1)).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let verifier = hasher.hash("correct horse").unwrap();

        assert!(hasher.verify("correct horse", &verifier));
        assert!(!hasher.verify("battery staple", &verifier));
    }

    #[test]
    fn test_empty_password_roundtrip() {
        let hasher = hasher();
        let verifier = hasher.hash("").unwrap();

        assert!(hasher.verify("", &verifier));
        assert!(!hasher.verify(" ", &verifier));
    }

    #[test]
    fn test_hashes_differ_but_both_verify() {
        let hasher = hasher();
        let v1 = hasher.hash("same").unwrap();
        let v2 = hasher.hash("same").unwrap();

        assert_ne!(v1, v2);
        assert!(hasher.verify("same", &v1));
        assert!(hasher.verify("same", &v2));
    }

    #[test]
    fn test_malformed_verifier_is_false() {
        let hasher = hasher();

        assert!(!hasher.verify("pw", ""));
        assert!(!hasher.verify("pw", "not-a-phc-string"));
        assert!(!hasher.verify("pw", "$2b$12$abcdefghijklmnopqrstuv"));
    }

    #[test]
    fn test_verifier_format() {
        let verifier = hasher().hash("format").unwrap();

        assert!(verifier.starts_with("$argon2id$v=19$"));
        assert!(verifier.len() <= MAX_VERIFIER_LENGTH);
        assert!(!verifier.contains("format"));
    }

    #[test]
    fn test_verify_uses_params_from_verifier() {
        let strong = PasswordHasher::new(HasherParams::new(2048, 2, 1)).unwrap();
        let verifier = strong.hash("portable").unwrap();

        assert!(hasher().verify("portable", &verifier));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(PasswordHasher::new(HasherParams::new(1, 0, 0)).is_err());
    }
}
