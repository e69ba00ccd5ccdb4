//! Error taxonomy for the download flow.

use thiserror::Error;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    /// Caller lacks the required permission on the owning document.
    NoPermission,
    /// Version is protected and no password was supplied.
    PasswordRequired,
    /// Supplied password did not match the stored verifier.
    IncorrectPassword,
}

impl ForbiddenReason {
    /// Message safe to return to the caller.
    pub fn message(&self) -> &'static str {
        match self {
            ForbiddenReason::NoPermission => "Permission denied",
            ForbiddenReason::PasswordRequired => "Password required for this protected file",
            ForbiddenReason::IncorrectPassword => "Incorrect password",
        }
    }
}

/// Terminal failure of a download, download-URL or details request.
///
/// Messages carry identifiers only.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{}", .0.message())]
    Forbidden(ForbiddenReason),

    /// Version or its stored content is missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Corruption, misconfiguration or an I/O failure after authorization.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Malformed identifier or argument.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller exceeded the configured attempt budget.
    #[error("Rate limit exceeded")]
    RateLimited,
}

/// Result type for flow operations.
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

impl DownloadError {
    /// HTTP status class for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            DownloadError::Forbidden(_) => 403,
            DownloadError::NotFound(_) => 404,
            DownloadError::Internal(_) => 500,
            DownloadError::Validation(_) => 422,
            DownloadError::RateLimited => 429,
        }
    }

    /// Message for the response body.
    ///
    /// Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            DownloadError::Forbidden(reason) => reason.message().to_string(),
            DownloadError::NotFound(_) => "Document version not found".to_string(),
            DownloadError::Internal(_) => "Failed to process file".to_string(),
            DownloadError::Validation(message) => message.clone(),
            DownloadError::RateLimited => "Too many requests".to_string(),
        }
    }
}

impl From<docseal_common::Error> for DownloadError {
    fn from(err: docseal_common::Error) -> Self {
        use docseal_common::Error;

        match err {
            Error::NotFound(message) => DownloadError::NotFound(message),
            Error::InvalidInput(message) => DownloadError::Validation(message),
            Error::NotPermitted(_) => DownloadError::Forbidden(ForbiddenReason::NoPermission),
            other => DownloadError::Internal(other.to_string()),
        }
    }
}
