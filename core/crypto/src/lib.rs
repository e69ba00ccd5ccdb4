//! Cryptographic primitives for docseal.
//!
//! This module provides:
//! - Key derivation using PBKDF2-HMAC-SHA256
//! - Authenticated encryption using XChaCha20-Poly1305
//! - Password verifiers using self-salted Argon2id PHC strings
//! - The protection encoder that ties the three together
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext, password, key or verifier is ever logged
//! - Verifier comparison is constant-time (delegated to Argon2)

pub mod aead;
pub mod hasher;
pub mod kdf;
pub mod keys;
pub mod protect;

pub use aead::{decrypt, encrypt};
pub use hasher::{HasherParams, PasswordHasher};
pub use kdf::{derive_key, KdfParams};
pub use keys::{EncryptionKey, Salt};
pub use protect::{ProtectedContent, ProtectionEncoder};
