//! In-memory catalog with JSON snapshots.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::model::{DownloadUrl, VersionDetails, VersionRecord};
use crate::repository::{DocumentRepository, Permission, PermissionChecker};
use docseal_common::{ContentLocator, DocumentId, Error, Identity, Result, VersionId};
use docseal_storage::ContentStore;

/// Name of the catalog snapshot within a content store.
pub const CATALOG_FILENAME: &str = "catalog.json";

/// Default prefix for download locators.
pub const DEFAULT_URL_PREFIX: &str = "/document-versions";

/// A document and its access grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub id: DocumentId,
    pub title: String,
    /// User id of the owner. Owners hold every permission.
    pub owner: String,
    /// Explicit grants by user id.
    #[serde(default)]
    pub grants: BTreeMap<String, BTreeSet<Permission>>,
    pub created_at: DateTime<Utc>,
}

impl DocumentEntry {
    fn allows(&self, identity: &Identity, permission: Permission) -> bool {
        if self.owner == identity.user_id() {
            return true;
        }
        self.grants
            .get(identity.user_id())
            .is_some_and(|granted| granted.contains(&permission))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogSnapshot {
    documents: Vec<DocumentEntry>,
    versions: Vec<VersionRecord>,
}

#[derive(Debug, Default)]
struct CatalogState {
    documents: HashMap<DocumentId, DocumentEntry>,
    versions: HashMap<VersionId, VersionRecord>,
}

impl CatalogState {
    fn document(&self, id: &DocumentId) -> Result<&DocumentEntry> {
        self.documents
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("Document not found: {}", id)))
    }

    fn document_mut(&mut self, id: &DocumentId) -> Result<&mut DocumentEntry> {
        self.documents
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("Document not found: {}", id)))
    }

    fn version(&self, id: &VersionId) -> Result<&VersionRecord> {
        self.versions
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("Document version not found: {}", id)))
    }
}

/// In-memory document catalog.
///
/// Implements both [`DocumentRepository`] and [`PermissionChecker`]. Clones
/// share state. The whole catalog can be written to and restored from a
/// [`ContentStore`] as a single JSON document.
#[derive(Clone)]
pub struct MemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
    url_prefix: String,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::with_url_prefix(DEFAULT_URL_PREFIX)
    }

    /// Create an empty catalog whose download locators start with `prefix`.
    pub fn with_url_prefix(prefix: impl Into<String>) -> Self {
        Self {
            state: Arc::new(RwLock::new(CatalogState::default())),
            url_prefix: prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Register a new document owned by `owner`.
    pub async fn create_document(&self, owner: &Identity, title: impl Into<String>) -> DocumentId {
        let entry = DocumentEntry {
            id: DocumentId::new(),
            title: title.into(),
            owner: owner.user_id().to_string(),
            grants: BTreeMap::new(),
            created_at: Utc::now(),
        };
        let id = entry.id;

        self.state.write().await.documents.insert(id, entry);
        info!(document = %id, owner = %owner, "Document created");
        id
    }

    /// Get a document entry.
    ///
    /// # Errors
    /// - `NotFound` if the document does not exist
    pub async fn document(&self, id: &DocumentId) -> Result<DocumentEntry> {
        self.state.read().await.document(id).cloned()
    }

    /// Grant a permission on a document.
    ///
    /// # Errors
    /// - `NotFound` if the document does not exist
    pub async fn grant(
        &self,
        document: &DocumentId,
        identity: &Identity,
        permission: Permission,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .document_mut(document)?
            .grants
            .entry(identity.user_id().to_string())
            .or_default()
            .insert(permission);

        debug!(document = %document, user = %identity, permission = %permission, "Permission granted");
        Ok(())
    }

    /// Revoke a permission on a document. Revoking an absent grant is a no-op.
    ///
    /// # Errors
    /// - `NotFound` if the document does not exist
    pub async fn revoke(
        &self,
        document: &DocumentId,
        identity: &Identity,
        permission: Permission,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state.document_mut(document)?;

        if let Some(granted) = entry.grants.get_mut(identity.user_id()) {
            granted.remove(&permission);
            if granted.is_empty() {
                entry.grants.remove(identity.user_id());
            }
        }

        debug!(document = %document, user = %identity, permission = %permission, "Permission revoked");
        Ok(())
    }

    /// List the versions of a document, oldest first.
    ///
    /// # Errors
    /// - `NotFound` if the document does not exist
    pub async fn versions(&self, document: &DocumentId) -> Result<Vec<VersionDetails>> {
        let state = self.state.read().await;
        state.document(document)?;

        let mut versions: Vec<VersionDetails> = state
            .versions
            .values()
            .filter(|v| v.document_id == *document)
            .map(VersionRecord::details)
            .collect();
        versions.sort_by_key(|v| v.number);
        Ok(versions)
    }

    /// Serialize the catalog to JSON.
    pub async fn to_json(&self) -> Result<String> {
        let state = self.state.read().await;

        let mut snapshot = CatalogSnapshot {
            documents: state.documents.values().cloned().collect(),
            versions: state.versions.values().cloned().collect(),
        };
        snapshot.documents.sort_by_key(|d| d.created_at);
        snapshot
            .versions
            .sort_by(|a, b| (a.created_at, a.number).cmp(&(b.created_at, b.number)));

        serde_json::to_string_pretty(&snapshot).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Restore a catalog from JSON.
    ///
    /// # Errors
    /// - `Serialization` if the JSON is malformed
    /// - `Internal` if a version references an unknown document
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: CatalogSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;

        let mut state = CatalogState::default();
        for document in snapshot.documents {
            state.documents.insert(document.id, document);
        }
        for version in snapshot.versions {
            if !state.documents.contains_key(&version.document_id) {
                return Err(Error::Internal(format!(
                    "Version {} references unknown document {}",
                    version.id, version.document_id
                )));
            }
            state.versions.insert(version.id, version);
        }

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
        })
    }

    /// Write the catalog snapshot to a content store.
    pub async fn save(&self, store: &dyn ContentStore) -> Result<()> {
        let locator = ContentLocator::parse(CATALOG_FILENAME)?;
        let json = self.to_json().await?;
        store.write(&locator, json.into_bytes()).await?;
        Ok(())
    }

    /// Load a catalog snapshot from a content store.
    ///
    /// Returns an empty catalog if the store holds no snapshot yet.
    pub async fn load(store: &dyn ContentStore) -> Result<Self> {
        let locator = ContentLocator::parse(CATALOG_FILENAME)?;
        if !store.exists(&locator).await? {
            return Ok(Self::new());
        }

        let bytes = store.read(&locator).await?;
        let json = String::from_utf8(bytes)
            .map_err(|_| Error::Serialization("Catalog is not valid UTF-8".to_string()))?;
        Self::from_json(&json)
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentRepository for MemoryCatalog {
    async fn resolve_owner_document(&self, version: &VersionId) -> Result<DocumentId> {
        Ok(self.state.read().await.version(version)?.document_id)
    }

    async fn load_version(&self, version: &VersionId) -> Result<VersionRecord> {
        self.state.read().await.version(version).cloned()
    }

    async fn download_url(&self, version: &VersionId) -> Result<DownloadUrl> {
        let state = self.state.read().await;
        let record = state.version(version)?;

        Ok(DownloadUrl {
            download_url: format!("{}/{}/download", self.url_prefix, record.id),
            size: Some(record.size),
        })
    }

    async fn next_version_number(&self, document: &DocumentId) -> Result<u32> {
        let state = self.state.read().await;
        state.document(document)?;

        let latest = state
            .versions
            .values()
            .filter(|v| v.document_id == *document)
            .map(|v| v.number)
            .max()
            .unwrap_or(0);
        Ok(latest + 1)
    }

    async fn publish_version(&self, record: VersionRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.document(&record.document_id)?;

        if state.versions.contains_key(&record.id) {
            return Err(Error::AlreadyExists(format!(
                "Document version already exists: {}",
                record.id
            )));
        }
        if state
            .versions
            .values()
            .any(|v| v.document_id == record.document_id && v.number == record.number)
        {
            return Err(Error::AlreadyExists(format!(
                "Document {} already has version number {}",
                record.document_id, record.number
            )));
        }

        info!(
            document = %record.document_id,
            version = %record.id,
            number = record.number,
            protected = record.protection.is_password_protected,
            "Version published"
        );
        state.versions.insert(record.id, record);
        Ok(())
    }
}

#[async_trait]
impl PermissionChecker for MemoryCatalog {
    async fn has_permission(
        &self,
        document: &DocumentId,
        identity: &Identity,
        permission: Permission,
    ) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .get(document)
            .is_some_and(|entry| entry.allows(identity, permission)))
    }
}
