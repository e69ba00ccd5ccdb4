//! Authenticated encryption using XChaCha20-Poly1305.
//!
//! Stored ciphertext is self-describing:
//! `version (1) || nonce (24) || encrypted data || tag (16)`.
//! The version byte is bound as associated data, so rewriting it fails
//! authentication like any other tamper.

use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng, Payload},
    XChaCha20Poly1305,
};

use crate::keys::EncryptionKey;
use docseal_common::{Error, Result, SensitiveBytes};

/// Current ciphertext format version.
pub const FORMAT_VERSION: u8 = 0x01;

/// Size of the version header.
pub const HEADER_SIZE: usize = 1;

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Fixed overhead added to every plaintext.
pub const OVERHEAD: usize = HEADER_SIZE + NONCE_SIZE + TAG_SIZE;

/// Encrypt plaintext using XChaCha20-Poly1305.
///
/// # Postconditions
/// - Returns version || nonce || ciphertext || tag
/// - The nonce is freshly generated, so two calls never produce the same output
/// - The output length is plaintext length + OVERHEAD
///
/// # Errors
/// - Returns error if encryption fails
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()));
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let sealed = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad: &[FORMAT_VERSION],
            },
        )
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + NONCE_SIZE + sealed.len());
    result.push(FORMAT_VERSION);
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&sealed);

    Ok(result)
}

/// Decrypt ciphertext produced by [`encrypt`].
///
/// # Postconditions
/// - Returns the original plaintext only after the tag verifies
///
/// # Errors
/// - `DecryptionFailed` for an unknown version, truncated input, tampered
///   data or a wrong key. Partial plaintext is never returned.
pub fn decrypt(key: &EncryptionKey, ciphertext: &[u8]) -> Result<SensitiveBytes> {
    if ciphertext.len() < OVERHEAD {
        return Err(Error::DecryptionFailed);
    }

    let (header, rest) = ciphertext.split_at(HEADER_SIZE);
    if header[0] != FORMAT_VERSION {
        return Err(Error::DecryptionFailed);
    }

    let (nonce_bytes, sealed) = rest.split_at(NONCE_SIZE);
    let nonce = GenericArray::from_slice(nonce_bytes);

    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()));

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: sealed,
                aad: header,
            },
        )
        .map(SensitiveBytes::new)
        .map_err(|_| Error::DecryptionFailed)
}
