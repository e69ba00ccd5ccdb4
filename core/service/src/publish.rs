//! Publishing document versions.
//!
//! Every publish writes a fresh revision locator and then commits the record
//! in one repository call. Stored ciphertext is never rewritten in place, so
//! a reader sees either the previous record or the new one.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use docseal_catalog::{
    DocumentRepository, Protection, ProtectionMaterial, VersionDetails, VersionRecord,
};
use docseal_common::{
    ContentLocator, DocumentId, Error, Password, Result, SensitiveBytes, VersionId,
};
use docseal_crypto::ProtectionEncoder;
use docseal_storage::ContentStore;

/// Content to publish as a new version.
#[derive(Debug)]
pub struct PublishRequest {
    pub document_id: DocumentId,
    pub file_name: String,
    /// Guessed from the file extension when absent.
    pub media_type: Option<String>,
    pub page_count: Option<u32>,
    pub content: Vec<u8>,
    /// Protect the version under this password.
    pub password: Option<Password>,
}

/// Encodes content and commits new versions.
pub struct Publisher {
    repository: Arc<dyn DocumentRepository>,
    store: Arc<dyn ContentStore>,
    encoder: Arc<ProtectionEncoder>,
}

impl Publisher {
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        store: Arc<dyn ContentStore>,
        encoder: ProtectionEncoder,
    ) -> Self {
        Self {
            repository,
            store,
            encoder: Arc::new(encoder),
        }
    }

    /// Publish content as the next version of a document.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty or path-like file name, or an empty password
    /// - `NotFound` if the document does not exist
    /// - Storage errors writing the content
    pub async fn publish_version(&self, request: PublishRequest) -> Result<VersionDetails> {
        validate_file_name(&request.file_name)?;

        let number = self.repository.next_version_number(&request.document_id).await?;
        let version_id = VersionId::new();
        let locator = revision_locator(&request.document_id, &version_id)?;
        let size = request.content.len() as u64;

        let (stored, protection) = match request.password {
            Some(password) => self.encode(request.content, password).await?,
            None => (request.content, ProtectionMaterial::unprotected()),
        };

        self.store.write(&locator, stored).await?;

        let media_type = request
            .media_type
            .unwrap_or_else(|| media_type_for(&request.file_name).to_string());
        let record = VersionRecord {
            id: version_id,
            document_id: request.document_id,
            number,
            file_name: request.file_name,
            media_type,
            size,
            page_count: request.page_count,
            locator: locator.clone(),
            protection,
            created_at: chrono::Utc::now(),
        };
        let details = record.details();

        if let Err(e) = self.repository.publish_version(record).await {
            if let Err(cleanup) = self.store.delete(&locator).await {
                warn!(locator = %locator, error = %cleanup, "Failed to remove unpublished content");
            }
            return Err(e);
        }

        info!(
            document_id = %details.document_id,
            version_id = %details.id,
            number = details.number,
            protected = details.is_password_protected,
            "Version published"
        );
        Ok(details)
    }

    /// Publish an existing version's content again under a new protection
    /// state, as the next version of the same document.
    ///
    /// # Errors
    /// - `NotPermitted` if the version is protected and `current` is missing
    ///   or does not verify
    /// - `DecryptionFailed` if the stored content does not decrypt
    pub async fn republish(
        &self,
        version_id: &VersionId,
        current: Option<Password>,
        password: Option<Password>,
    ) -> Result<VersionDetails> {
        let record = self.repository.load_version(version_id).await?;
        let stored = self.store.read(&record.locator).await?;

        let content = match record.protection.view()? {
            Protection::Unprotected => stored,
            Protection::PasswordProtected { verifier, salt } => {
                let current = current
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| Error::NotPermitted("Password required".to_string()))?;
                let encoder = Arc::clone(&self.encoder);
                let verifier = verifier.to_string();
                let salt = salt.clone();

                let plaintext = tokio::task::spawn_blocking(move || -> Result<SensitiveBytes> {
                    if !encoder.verify(&current, &verifier) {
                        return Err(Error::NotPermitted("Incorrect password".to_string()));
                    }
                    encoder.decrypt(&stored, &current, &salt)
                })
                .await
                .map_err(|e| Error::Internal(format!("Decryption task failed: {}", e)))??;
                plaintext.as_bytes().to_vec()
            }
        };

        self.publish_version(PublishRequest {
            document_id: record.document_id,
            file_name: record.file_name,
            media_type: Some(record.media_type),
            page_count: record.page_count,
            content,
            password,
        })
        .await
    }

    async fn encode(
        &self,
        content: Vec<u8>,
        password: Password,
    ) -> Result<(Vec<u8>, ProtectionMaterial)> {
        let encoder = Arc::clone(&self.encoder);
        let protected = tokio::task::spawn_blocking(move || encoder.protect(&content, &password))
            .await
            .map_err(|e| Error::Internal(format!("Encoding task failed: {}", e)))??;

        Ok((
            protected.ciphertext,
            ProtectionMaterial::protected(protected.verifier, protected.salt),
        ))
    }
}

fn validate_file_name(file_name: &str) -> Result<()> {
    if file_name.trim().is_empty() {
        return Err(Error::InvalidInput("File name cannot be empty".to_string()));
    }
    if file_name.contains('/') || file_name.contains('\\') {
        return Err(Error::InvalidInput(
            "File name cannot contain path separators".to_string(),
        ));
    }
    Ok(())
}

fn revision_locator(document_id: &DocumentId, version_id: &VersionId) -> Result<ContentLocator> {
    ContentLocator::from_components(vec![
        "documents".to_string(),
        document_id.to_string(),
        version_id.to_string(),
        "content".to_string(),
    ])
}

/// Media type for a file name, by extension.
pub fn media_type_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("json") => "application/json",
        _ => crate::flow::DEFAULT_MEDIA_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, PASSWORD};
    use docseal_catalog::DocumentRepository;

    #[tokio::test]
    async fn test_publish_unprotected() {
        let fixture = Fixture::new().await;
        let details = fixture
            .publisher
            .publish_version(PublishRequest {
                document_id: fixture.document,
                file_name: "scan.TIFF".to_string(),
                media_type: None,
                page_count: Some(2),
                content: b"II*\0".to_vec(),
                password: None,
            })
            .await
            .unwrap();

        assert_eq!(details.number, 1);
        assert_eq!(details.media_type, "image/tiff");
        assert!(!details.is_password_protected);

        let record = fixture.catalog.load_version(&details.id).await.unwrap();
        assert_eq!(fixture.store_bytes(&record.locator).await, b"II*\0");
    }

    #[tokio::test]
    async fn test_publish_protected_stores_ciphertext() {
        let fixture = Fixture::new().await;
        let version = fixture.add_protected("secret.txt", b"top secret").await;

        let record = fixture.catalog.load_version(&version).await.unwrap();
        assert!(record.protection.is_password_protected);
        assert!(record.protection.password_hash.as_deref().unwrap().starts_with("$argon2id$"));
        assert!(record.protection.encryption_salt.is_some());
        assert_eq!(record.size, 10);

        let stored = fixture.store_bytes(&record.locator).await;
        assert_ne!(stored, b"top secret");
        assert!(!stored.windows(10).any(|w| w == b"top secret"));
    }

    #[tokio::test]
    async fn test_publish_rejects_empty_password() {
        let fixture = Fixture::new().await;
        let result = fixture
            .publisher
            .publish_version(PublishRequest {
                document_id: fixture.document,
                file_name: "a.txt".to_string(),
                media_type: None,
                page_count: None,
                content: b"x".to_vec(),
                password: Some(Password::from("")),
            })
            .await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(fixture.catalog.versions(&fixture.document).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_rejects_bad_file_name() {
        let fixture = Fixture::new().await;
        for name in ["", "  ", "../etc/passwd", "a\\b"] {
            let result = fixture
                .publisher
                .publish_version(PublishRequest {
                    document_id: fixture.document,
                    file_name: name.to_string(),
                    media_type: None,
                    page_count: None,
                    content: vec![1],
                    password: None,
                })
                .await;
            assert!(matches!(result, Err(Error::InvalidInput(_))), "{:?}", name);
        }
    }

    #[tokio::test]
    async fn test_publish_unknown_document() {
        let fixture = Fixture::new().await;
        let result = fixture
            .publisher
            .publish_version(PublishRequest {
                document_id: DocumentId::new(),
                file_name: "a.txt".to_string(),
                media_type: None,
                page_count: None,
                content: vec![1],
                password: None,
            })
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_republish_creates_new_revision() {
        let fixture = Fixture::new().await;
        let original = fixture.add_protected("secret.txt", b"rotate me").await;
        let before = fixture.catalog.load_version(&original).await.unwrap();
        let stored_before = fixture.store_bytes(&before.locator).await;

        let details = fixture
            .publisher
            .republish(
                &original,
                Some(Password::from(PASSWORD)),
                Some(Password::from("new password")),
            )
            .await
            .unwrap();

        assert_eq!(details.number, 2);
        let after = fixture.catalog.load_version(&details.id).await.unwrap();
        assert_ne!(after.locator, before.locator);
        assert_ne!(after.protection.encryption_salt, before.protection.encryption_salt);

        // The earlier revision is untouched
        assert_eq!(fixture.store_bytes(&before.locator).await, stored_before);
        assert_eq!(
            fixture.catalog.load_version(&original).await.unwrap().protection,
            before.protection
        );
    }

    #[tokio::test]
    async fn test_republish_requires_current_password() {
        let fixture = Fixture::new().await;
        let original = fixture.add_protected("secret.txt", b"data").await;

        let missing = fixture.publisher.republish(&original, None, None).await;
        assert!(matches!(missing, Err(Error::NotPermitted(_))));

        let wrong = fixture
            .publisher
            .republish(&original, Some(Password::from("nope")), None)
            .await;
        assert!(matches!(wrong, Err(Error::NotPermitted(_))));
    }

    #[tokio::test]
    async fn test_republish_removes_protection() {
        let fixture = Fixture::new().await;
        let original = fixture.add_protected("secret.txt", b"now public").await;

        let details = fixture
            .publisher
            .republish(&original, Some(Password::from(PASSWORD)), None)
            .await
            .unwrap();

        assert!(!details.is_password_protected);
        let record = fixture.catalog.load_version(&details.id).await.unwrap();
        assert_eq!(fixture.store_bytes(&record.locator).await, b"now public");
    }

    /// Delegates to a catalog but refuses every commit.
    struct RejectingRepository {
        inner: docseal_catalog::MemoryCatalog,
        rejected: std::sync::Mutex<Option<ContentLocator>>,
    }

    #[async_trait::async_trait]
    impl DocumentRepository for RejectingRepository {
        async fn resolve_owner_document(&self, version: &VersionId) -> Result<DocumentId> {
            self.inner.resolve_owner_document(version).await
        }

        async fn load_version(&self, version: &VersionId) -> Result<VersionRecord> {
            self.inner.load_version(version).await
        }

        async fn download_url(&self, version: &VersionId) -> Result<docseal_catalog::DownloadUrl> {
            self.inner.download_url(version).await
        }

        async fn next_version_number(&self, document: &DocumentId) -> Result<u32> {
            self.inner.next_version_number(document).await
        }

        async fn publish_version(&self, record: VersionRecord) -> Result<()> {
            *self.rejected.lock().unwrap() = Some(record.locator);
            Err(Error::AlreadyExists("version number taken".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_commit_removes_content() {
        let fixture = Fixture::new().await;
        let repository = Arc::new(RejectingRepository {
            inner: fixture.catalog.clone(),
            rejected: std::sync::Mutex::new(None),
        });
        let publisher = Publisher::new(
            repository.clone(),
            Arc::new(fixture.store.clone()),
            crate::testing::encoder(),
        );

        let result = publisher
            .publish_version(PublishRequest {
                document_id: fixture.document,
                file_name: "race.txt".to_string(),
                media_type: None,
                page_count: None,
                content: b"lost".to_vec(),
                password: Some(Password::from(PASSWORD)),
            })
            .await;

        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        let locator = repository.rejected.lock().unwrap().clone().unwrap();
        assert!(!fixture.store.exists(&locator).await.unwrap());
    }

    #[test]
    fn test_media_type_for() {
        assert_eq!(media_type_for("a.PDF"), "application/pdf");
        assert_eq!(media_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(media_type_for("blob"), "application/octet-stream");
    }
}
