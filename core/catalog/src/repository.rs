//! Collaborator contracts consumed by the download flow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{DownloadUrl, VersionRecord};
use docseal_common::{DocumentId, Identity, Result, VersionId};

/// Permission a caller may hold on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Read metadata and content through the download flow.
    View,
    /// Reach the protected download endpoints at all.
    Download,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::View => write!(f, "node.view"),
            Permission::Download => write!(f, "node.download"),
        }
    }
}

/// Source of document version records.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Find the document that owns a version.
    ///
    /// # Errors
    /// - `NotFound` if the version does not exist
    async fn resolve_owner_document(&self, version: &VersionId) -> Result<DocumentId>;

    /// Load a version record, including its protection material.
    ///
    /// # Errors
    /// - `NotFound` if the version does not exist
    async fn load_version(&self, version: &VersionId) -> Result<VersionRecord>;

    /// Build the indirect download locator for a version.
    ///
    /// # Errors
    /// - `NotFound` if the version does not exist
    async fn download_url(&self, version: &VersionId) -> Result<DownloadUrl>;

    /// Number the next version of a document would receive.
    ///
    /// # Errors
    /// - `NotFound` if the document does not exist
    async fn next_version_number(&self, document: &DocumentId) -> Result<u32>;

    /// Commit a new version record.
    ///
    /// The record and its protection material become visible together or
    /// not at all.
    ///
    /// # Errors
    /// - `NotFound` if the owning document does not exist
    /// - `AlreadyExists` if the version id is taken
    async fn publish_version(&self, record: VersionRecord) -> Result<()>;
}

/// Authorization decisions for document access.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Check whether `identity` holds `permission` on `document`.
    async fn has_permission(
        &self,
        document: &DocumentId,
        identity: &Identity,
        permission: Permission,
    ) -> Result<bool>;

    /// Shorthand for [`Permission::View`].
    async fn has_view_permission(&self, document: &DocumentId, identity: &Identity) -> Result<bool> {
        self.has_permission(document, identity, Permission::View).await
    }

    /// Shorthand for [`Permission::Download`].
    async fn has_download_permission(
        &self,
        document: &DocumentId,
        identity: &Identity,
    ) -> Result<bool> {
        self.has_permission(document, identity, Permission::Download)
            .await
    }
}
