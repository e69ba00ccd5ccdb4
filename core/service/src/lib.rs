//! Protected document download service for docseal.
//!
//! This module provides:
//! - The download state machine ([`DownloadService`])
//! - The interceptor chain in front of it ([`DownloadGateway`])
//! - Publishing of new, optionally protected, versions ([`Publisher`])
//! - Transient plaintext artifacts, rate limiting and configuration

pub mod artifact;
pub mod codec;
pub mod config;
pub mod error;
pub mod flow;
pub mod gateway;
pub mod publish;
pub mod ratelimit;

#[cfg(test)]
pub(crate) mod testing;

pub use artifact::StagedArtifact;
pub use codec::{PasswordCodec, ProtectionCodec};
pub use config::{RateLimitConfig, ServerConfig, ServiceConfig, StorageConfig};
pub use error::{DownloadError, DownloadResult, ForbiddenReason};
pub use flow::{DownloadRequest, DownloadResponse, DownloadService, DownloadStage};
pub use gateway::{CallerContext, DownloadGateway};
pub use publish::{PublishRequest, Publisher};
pub use ratelimit::{FixedWindowLimiter, RateLimitKey, RateLimitedAction, RateLimiter, Unlimited};
