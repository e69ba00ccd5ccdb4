//! Persisted document version records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use docseal_common::{ContentLocator, DocumentId, Error, Result, VersionId};
use docseal_crypto::Salt;

/// Protection columns stored with every document version.
///
/// When `is_password_protected` is false the other two fields are ignored.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProtectionMaterial {
    /// Gate for the protected download path.
    pub is_password_protected: bool,
    /// Password verifier (Argon2id PHC string).
    #[serde(default)]
    pub password_hash: Option<String>,
    /// Salt for re-deriving the encryption key.
    #[serde(default)]
    pub encryption_salt: Option<Salt>,
}

/// Validated view of [`ProtectionMaterial`].
#[derive(Debug, Clone, Copy)]
pub enum Protection<'a> {
    /// Content is stored as plaintext.
    Unprotected,
    /// Content is stored as ciphertext.
    PasswordProtected {
        /// Verifier to check the supplied password against.
        verifier: &'a str,
        /// Salt for key derivation.
        salt: &'a Salt,
    },
}

impl ProtectionMaterial {
    /// Material for content stored in the clear.
    pub fn unprotected() -> Self {
        Self::default()
    }

    /// Material for content encrypted under a password.
    pub fn protected(password_hash: String, encryption_salt: Salt) -> Self {
        Self {
            is_password_protected: true,
            password_hash: Some(password_hash),
            encryption_salt: Some(encryption_salt),
        }
    }

    /// Check the protection invariant and return a typed view.
    ///
    /// # Errors
    /// - `Internal` if the version is flagged as protected but the verifier
    ///   or salt is missing
    pub fn view(&self) -> Result<Protection<'_>> {
        if !self.is_password_protected {
            return Ok(Protection::Unprotected);
        }

        match (self.password_hash.as_deref(), self.encryption_salt.as_ref()) {
            (Some(verifier), Some(salt)) if !verifier.is_empty() => {
                Ok(Protection::PasswordProtected { verifier, salt })
            }
            _ => Err(Error::Internal(
                "Protected version is missing its verifier or salt".to_string(),
            )),
        }
    }
}

impl fmt::Debug for ProtectionMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectionMaterial")
            .field("is_password_protected", &self.is_password_protected)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "[REDACTED]"))
            .field("encryption_salt", &self.encryption_salt)
            .finish()
    }
}

/// One stored revision of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Version identifier.
    pub id: VersionId,
    /// Owning document.
    pub document_id: DocumentId,
    /// Sequential version number within the document, starting at 1.
    pub number: u32,
    /// Original file name, used for the response disposition.
    pub file_name: String,
    /// Media type of the original content.
    pub media_type: String,
    /// Size of the original content in bytes.
    pub size: u64,
    /// Number of pages, when known.
    #[serde(default)]
    pub page_count: Option<u32>,
    /// Where the stored bytes live.
    pub locator: ContentLocator,
    /// Protection columns.
    #[serde(default)]
    pub protection: ProtectionMaterial,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
}

impl VersionRecord {
    /// Public metadata for this version.
    pub fn details(&self) -> VersionDetails {
        VersionDetails {
            id: self.id,
            document_id: self.document_id,
            number: self.number,
            file_name: self.file_name.clone(),
            media_type: self.media_type.clone(),
            size: self.size,
            page_count: self.page_count,
            is_password_protected: self.protection.is_password_protected,
            created_at: self.created_at,
        }
    }
}

/// Version metadata returned to callers.
///
/// Carries no verifier, no salt and no content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDetails {
    pub id: VersionId,
    pub document_id: DocumentId,
    pub number: u32,
    pub file_name: String,
    pub media_type: String,
    pub size: u64,
    pub page_count: Option<u32>,
    pub is_password_protected: bool,
    pub created_at: DateTime<Utc>,
}

/// Indirect locator for fetching a version's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadUrl {
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    pub size: Option<u64>,
}
