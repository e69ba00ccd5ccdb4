//! Interceptor chain around the download flow.
//!
//! Download and download-URL requests pass, in order, through a download
//! permission check on the owning document, the rate limit gate, and then
//! the flow. Details requests go straight to the flow.

use std::sync::Arc;
use tracing::warn;

use crate::error::{DownloadError, DownloadResult, ForbiddenReason};
use crate::flow::{DownloadRequest, DownloadResponse, DownloadService};
use crate::ratelimit::{RateLimitKey, RateLimitedAction, RateLimiter};
use docseal_catalog::{DownloadUrl, VersionDetails};
use docseal_common::{Identity, Password, VersionId};

/// Authenticated caller of an operation.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub identity: Identity,
}

impl CallerContext {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    /// Key the rate limiter counts attempts under.
    pub fn rate_limit_key(&self) -> RateLimitKey {
        RateLimitKey::for_identity(&self.identity)
    }
}

/// Entry point for the exposed operations.
pub struct DownloadGateway {
    service: Arc<DownloadService>,
    limiter: Arc<dyn RateLimiter>,
}

impl DownloadGateway {
    pub fn new(service: Arc<DownloadService>, limiter: Arc<dyn RateLimiter>) -> Self {
        Self { service, limiter }
    }

    pub fn service(&self) -> &Arc<DownloadService> {
        &self.service
    }

    /// Download a version's content.
    pub async fn download(
        &self,
        caller: &CallerContext,
        version_id: VersionId,
        password: Option<Password>,
    ) -> DownloadResult<DownloadResponse> {
        self.require_download_permission(caller, &version_id).await?;
        self.throttle(caller, &version_id, RateLimitedAction::Download)
            .await?;

        self.service
            .download(DownloadRequest {
                version_id,
                identity: caller.identity.clone(),
                password,
            })
            .await
    }

    /// Issue the indirect download locator for a version.
    pub async fn download_url(
        &self,
        caller: &CallerContext,
        version_id: VersionId,
    ) -> DownloadResult<DownloadUrl> {
        self.require_download_permission(caller, &version_id).await?;
        self.throttle(caller, &version_id, RateLimitedAction::DownloadUrl)
            .await?;

        self.service.download_url(&version_id, &caller.identity).await
    }

    /// Read version metadata. Not rate limited.
    pub async fn details(
        &self,
        caller: &CallerContext,
        version_id: VersionId,
    ) -> DownloadResult<VersionDetails> {
        self.service.details(&version_id, &caller.identity).await
    }

    async fn require_download_permission(
        &self,
        caller: &CallerContext,
        version_id: &VersionId,
    ) -> DownloadResult<()> {
        let document = self
            .service
            .repository()
            .resolve_owner_document(version_id)
            .await?;

        if !self
            .service
            .permissions()
            .has_download_permission(&document, &caller.identity)
            .await?
        {
            warn!(version_id = %version_id, document_id = %document, user_id = %caller.identity, "Download permission denied");
            return Err(DownloadError::Forbidden(ForbiddenReason::NoPermission));
        }
        Ok(())
    }

    async fn throttle(
        &self,
        caller: &CallerContext,
        version_id: &VersionId,
        action: RateLimitedAction,
    ) -> DownloadResult<()> {
        if !self.limiter.allow(&caller.rate_limit_key(), action).await {
            warn!(version_id = %version_id, user_id = %caller.identity, action = %action, "Rate limit exceeded");
            return Err(DownloadError::RateLimited);
        }
        Ok(())
    }
}
