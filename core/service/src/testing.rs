//! Shared fixtures for service tests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use crate::codec::{PasswordCodec, ProtectionCodec};
use crate::flow::DownloadService;
use crate::publish::{PublishRequest, Publisher};
use docseal_catalog::{
    DocumentRepository, MemoryCatalog, Permission, ProtectionMaterial, VersionRecord,
};
use docseal_common::{
    ContentLocator, DocumentId, Identity, Password, Result, SensitiveBytes, VersionId,
};
use docseal_crypto::{HasherParams, KdfParams, PasswordHasher, ProtectionEncoder, Salt};
use docseal_storage::{ContentStore, MemoryStore};

pub(crate) const PASSWORD: &str = "correct horse battery staple";

pub(crate) fn encoder() -> ProtectionEncoder {
    let hasher = PasswordHasher::new(HasherParams::new(1024, 1, 1)).unwrap();
    ProtectionEncoder::new(KdfParams::default(), hasher).unwrap()
}

/// Codec that counts calls before delegating.
pub(crate) struct CountingCodec {
    inner: PasswordCodec,
    verify: AtomicUsize,
    decrypt: AtomicUsize,
}

impl CountingCodec {
    pub(crate) fn new(encoder: ProtectionEncoder) -> Self {
        Self {
            inner: PasswordCodec::new(encoder),
            verify: AtomicUsize::new(0),
            decrypt: AtomicUsize::new(0),
        }
    }

    pub(crate) fn verify_calls(&self) -> usize {
        self.verify.load(Ordering::SeqCst)
    }

    pub(crate) fn decrypt_calls(&self) -> usize {
        self.decrypt.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtectionCodec for CountingCodec {
    async fn verify_password(&self, password: &Password, verifier: &str) -> bool {
        self.verify.fetch_add(1, Ordering::SeqCst);
        self.inner.verify_password(password, verifier).await
    }

    async fn decrypt(
        &self,
        ciphertext: Vec<u8>,
        password: &Password,
        salt: &Salt,
    ) -> Result<SensitiveBytes> {
        self.decrypt.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(ciphertext, password, salt).await
    }
}

/// A catalog with one document, an owner, a reader without rights, and a
/// service wired to a counting codec.
pub(crate) struct Fixture {
    pub(crate) catalog: MemoryCatalog,
    pub(crate) store: MemoryStore,
    pub(crate) codec: Arc<CountingCodec>,
    pub(crate) service: Arc<DownloadService>,
    pub(crate) publisher: Publisher,
    pub(crate) owner: Identity,
    pub(crate) stranger: Identity,
    pub(crate) document: DocumentId,
    staging: TempDir,
}

impl Fixture {
    pub(crate) async fn new() -> Self {
        let catalog = MemoryCatalog::new();
        let store = MemoryStore::new();
        let staging = TempDir::new().unwrap();
        let codec = Arc::new(CountingCodec::new(encoder()));

        let owner = Identity::new("owner").unwrap();
        let stranger = Identity::new("stranger").unwrap();
        let document = catalog.create_document(&owner, "Quarterly report").await;

        let service = Arc::new(DownloadService::new(
            Arc::new(catalog.clone()),
            Arc::new(catalog.clone()),
            Arc::new(store.clone()),
            codec.clone(),
            staging.path(),
        ));
        let publisher = Publisher::new(
            Arc::new(catalog.clone()),
            Arc::new(store.clone()),
            encoder(),
        );

        Self {
            catalog,
            store,
            codec,
            service,
            publisher,
            owner,
            stranger,
            document,
            staging,
        }
    }

    pub(crate) fn staging(&self) -> &Path {
        self.staging.path()
    }

    /// Add a user holding only the given permissions.
    pub(crate) async fn user_with(&self, name: &str, permissions: &[Permission]) -> Identity {
        let identity = Identity::new(name).unwrap();
        for permission in permissions {
            self.catalog
                .grant(&self.document, &identity, *permission)
                .await
                .unwrap();
        }
        identity
    }

    pub(crate) async fn add_plain(&self, file_name: &str, content: &[u8]) -> VersionId {
        self.add(file_name, content, None).await
    }

    pub(crate) async fn add_protected(&self, file_name: &str, content: &[u8]) -> VersionId {
        self.add(file_name, content, Some(Password::from(PASSWORD))).await
    }

    async fn add(&self, file_name: &str, content: &[u8], password: Option<Password>) -> VersionId {
        self.publisher
            .publish_version(PublishRequest {
                document_id: self.document,
                file_name: file_name.to_string(),
                media_type: None,
                page_count: None,
                content: content.to_vec(),
                password,
            })
            .await
            .unwrap()
            .id
    }

    /// Commit a record flagged as protected but missing its salt.
    pub(crate) async fn add_broken_protection(&self, file_name: &str, content: &[u8]) -> VersionId {
        let id = VersionId::new();
        let locator = ContentLocator::parse(&format!("broken/{}", id)).unwrap();
        self.store.write(&locator, content.to_vec()).await.unwrap();

        self.catalog
            .publish_version(VersionRecord {
                id,
                document_id: self.document,
                number: self.catalog.next_version_number(&self.document).await.unwrap(),
                file_name: file_name.to_string(),
                media_type: String::new(),
                size: content.len() as u64,
                page_count: None,
                locator,
                protection: ProtectionMaterial {
                    is_password_protected: true,
                    password_hash: Some("$argon2id$v=19$m=1024,t=1,p=1$c2FsdHNhbHQ$aGFzaA".to_string()),
                    encryption_salt: None,
                },
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        id
    }

    pub(crate) async fn store_bytes(&self, locator: &ContentLocator) -> Vec<u8> {
        self.store.read(locator).await.unwrap()
    }

    pub(crate) async fn remove_content(&self, version: &VersionId) {
        let record = self.catalog.load_version(version).await.unwrap();
        self.store.delete(&record.locator).await.unwrap();
    }

    pub(crate) async fn corrupt_content(&self, version: &VersionId) {
        let record = self.catalog.load_version(version).await.unwrap();
        let mut bytes = self.store_bytes(&record.locator).await;
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        self.store.write(&record.locator, bytes).await.unwrap();
    }
}
