//! Protected download flow.
//!
//! One invocation per request:
//!
//! ```text
//! Requested -> PermissionChecked -> Located -> ProtectionEvaluated
//!   unprotected:  -> Served
//!   protected:    -> PasswordVerified -> Decrypted -> Served
//!   otherwise:    -> Rejected
//! ```
//!
//! Permission and existence failures short-circuit before any password or
//! cipher work. Decrypted content only ever lives in a [`StagedArtifact`],
//! which is removed on every exit path.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::artifact::StagedArtifact;
use crate::codec::ProtectionCodec;
use crate::error::{DownloadError, DownloadResult, ForbiddenReason};
use docseal_catalog::{
    DocumentRepository, DownloadUrl, PermissionChecker, Protection, VersionDetails, VersionRecord,
};
use docseal_common::{DocumentId, Identity, Password, VersionId};
use docseal_storage::{ByteStream, ContentStore};

/// Media type used when a version does not declare one.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Position in the download state machine, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStage {
    Requested,
    PermissionChecked,
    Located,
    ProtectionEvaluated,
    PasswordVerified,
    Decrypted,
    Served,
    Rejected,
}

impl fmt::Display for DownloadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DownloadStage::Requested => "requested",
            DownloadStage::PermissionChecked => "permission_checked",
            DownloadStage::Located => "located",
            DownloadStage::ProtectionEvaluated => "protection_evaluated",
            DownloadStage::PasswordVerified => "password_verified",
            DownloadStage::Decrypted => "decrypted",
            DownloadStage::Served => "served",
            DownloadStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A download request.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub version_id: VersionId,
    pub identity: Identity,
    pub password: Option<Password>,
}

/// Content ready to be sent.
pub struct DownloadResponse {
    /// Original file name, for the attachment disposition.
    pub file_name: String,
    pub media_type: String,
    /// Length of `body` in bytes.
    pub size: u64,
    pub body: ByteStream,
}

impl fmt::Debug for DownloadResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadResponse")
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Executes downloads, download-URL issuance and details reads.
pub struct DownloadService {
    repository: Arc<dyn DocumentRepository>,
    permissions: Arc<dyn PermissionChecker>,
    store: Arc<dyn ContentStore>,
    codec: Arc<dyn ProtectionCodec>,
    staging_dir: PathBuf,
}

impl DownloadService {
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        permissions: Arc<dyn PermissionChecker>,
        store: Arc<dyn ContentStore>,
        codec: Arc<dyn ProtectionCodec>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repository,
            permissions,
            store,
            codec,
            staging_dir: staging_dir.into(),
        }
    }

    pub fn repository(&self) -> &Arc<dyn DocumentRepository> {
        &self.repository
    }

    pub fn permissions(&self) -> &Arc<dyn PermissionChecker> {
        &self.permissions
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Run the download state machine.
    ///
    /// # Errors
    /// - `Forbidden(NoPermission)` without view permission
    /// - `NotFound` if the version or its content is missing
    /// - `Forbidden(PasswordRequired)` for a protected version without a password
    /// - `Forbidden(IncorrectPassword)` if verification fails
    /// - `Internal` if decryption fails after verification
    pub async fn download(&self, request: DownloadRequest) -> DownloadResult<DownloadResponse> {
        let DownloadRequest {
            version_id,
            identity,
            password,
        } = request;
        trace_stage(&version_id, DownloadStage::Requested);

        self.authorize_view(&version_id, &identity).await?;
        trace_stage(&version_id, DownloadStage::PermissionChecked);

        let record = self.locate(&version_id).await?;
        trace_stage(&version_id, DownloadStage::Located);

        let protection = record.protection.view()?;
        trace_stage(&version_id, DownloadStage::ProtectionEvaluated);

        let response = match protection {
            Protection::Unprotected => self.serve_stored(&record).await?,
            Protection::PasswordProtected { verifier, salt } => {
                let password = match password.filter(|p| !p.is_empty()) {
                    Some(password) => password,
                    None => {
                        info!(version_id = %version_id, user_id = %identity, "Password required for protected download");
                        return Err(reject(&version_id, ForbiddenReason::PasswordRequired));
                    }
                };

                if !self.codec.verify_password(&password, verifier).await {
                    warn!(version_id = %version_id, user_id = %identity, "Incorrect password for protected download");
                    return Err(reject(&version_id, ForbiddenReason::IncorrectPassword));
                }
                trace_stage(&version_id, DownloadStage::PasswordVerified);

                let ciphertext = self.store.read(&record.locator).await?;
                let plaintext = self
                    .codec
                    .decrypt(ciphertext, &password, salt)
                    .await
                    .map_err(|e| {
                        error!(version_id = %version_id, user_id = %identity, error = %e, "Failed to decrypt protected version");
                        DownloadError::Internal(format!("Failed to decrypt version {}", version_id))
                    })?;
                drop(password);
                trace_stage(&version_id, DownloadStage::Decrypted);

                let artifact =
                    StagedArtifact::stage(&self.staging_dir, &record.file_name, plaintext).await?;
                let size = artifact.size();
                DownloadResponse {
                    file_name: record.file_name.clone(),
                    media_type: media_type_of(&record),
                    size,
                    body: artifact.into_stream().await?,
                }
            }
        };

        trace_stage(&version_id, DownloadStage::Served);
        info!(
            version_id = %version_id,
            user_id = %identity,
            protected = record.protection.is_password_protected,
            size = response.size,
            "Download served"
        );
        Ok(response)
    }

    /// Issue the indirect download locator for a version.
    pub async fn download_url(
        &self,
        version_id: &VersionId,
        identity: &Identity,
    ) -> DownloadResult<DownloadUrl> {
        self.authorize_view(version_id, identity).await?;
        Ok(self.repository.download_url(version_id).await?)
    }

    /// Read version metadata.
    pub async fn details(
        &self,
        version_id: &VersionId,
        identity: &Identity,
    ) -> DownloadResult<VersionDetails> {
        self.authorize_view(version_id, identity).await?;
        let record = self.repository.load_version(version_id).await?;
        Ok(record.details())
    }

    async fn authorize_view(
        &self,
        version_id: &VersionId,
        identity: &Identity,
    ) -> DownloadResult<DocumentId> {
        let document = self.repository.resolve_owner_document(version_id).await?;
        if !self
            .permissions
            .has_view_permission(&document, identity)
            .await?
        {
            warn!(version_id = %version_id, document_id = %document, user_id = %identity, "View permission denied");
            return Err(reject(version_id, ForbiddenReason::NoPermission));
        }
        Ok(document)
    }

    async fn locate(&self, version_id: &VersionId) -> DownloadResult<VersionRecord> {
        let record = self.repository.load_version(version_id).await?;
        if !self.store.exists(&record.locator).await? {
            warn!(version_id = %version_id, locator = %record.locator, "Stored content missing");
            return Err(DownloadError::NotFound(format!(
                "Content for version {} not found",
                version_id
            )));
        }
        Ok(record)
    }

    async fn serve_stored(&self, record: &VersionRecord) -> DownloadResult<DownloadResponse> {
        let metadata = self.store.metadata(&record.locator).await?;
        let body = self.store.read_stream(&record.locator).await?;

        Ok(DownloadResponse {
            file_name: record.file_name.clone(),
            media_type: media_type_of(record),
            size: metadata.size,
            body,
        })
    }
}

fn media_type_of(record: &VersionRecord) -> String {
    if record.media_type.is_empty() {
        DEFAULT_MEDIA_TYPE.to_string()
    } else {
        record.media_type.clone()
    }
}

fn reject(version_id: &VersionId, reason: ForbiddenReason) -> DownloadError {
    trace_stage(version_id, DownloadStage::Rejected);
    DownloadError::Forbidden(reason)
}

fn trace_stage(version_id: &VersionId, stage: DownloadStage) {
    debug!(version_id = %version_id, stage = %stage, "Download stage");
}
