//! Service configuration.
//!
//! Loaded once at process start and shared by reference. Every field has a
//! default, so an empty JSON object is a valid configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use docseal_common::{Error, Result};
use docseal_crypto::{HasherParams, KdfParams, PasswordHasher, ProtectionEncoder};

/// Only supported rate limit storage backend.
pub const MEMORY_ENDPOINT: &str = "memory://";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Key derivation cost.
    pub kdf: KdfParams,
    /// Password verifier cost.
    pub hasher: HasherParams,
    /// Download attempt throttling.
    pub rate_limit: RateLimitConfig,
    /// Directory for transient plaintext artifacts.
    pub staging_dir: Option<PathBuf>,
    /// Content store selection.
    pub storage: StorageConfig,
    /// HTTP surface.
    pub server: ServerConfig,
}

/// Download attempt throttling. Off unless enabled explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Attempts allowed per caller and action within one window.
    pub max_attempts: u32,
    pub window_seconds: u64,
    pub storage_endpoint: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 1,
            window_seconds: 60,
            storage_endpoint: MEMORY_ENDPOINT.to_string(),
        }
    }
}

impl RateLimitConfig {
    /// Check the limits are usable.
    ///
    /// # Errors
    /// - `InvalidInput` for a zero budget, zero window or unsupported endpoint
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.max_attempts == 0 {
            return Err(Error::InvalidInput(
                "rate_limit.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.window_seconds == 0 {
            return Err(Error::InvalidInput(
                "rate_limit.window_seconds must be at least 1".to_string(),
            ));
        }
        if self.storage_endpoint != MEMORY_ENDPOINT {
            return Err(Error::InvalidInput(format!(
                "Unsupported rate limit storage endpoint: {}",
                self.storage_endpoint
            )));
        }
        Ok(())
    }
}

/// Content store selection, resolved through the store registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub provider: String,
    pub config: Value,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            config: Value::Null,
        }
    }
}

/// HTTP surface settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Bearer token to user id.
    pub tokens: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8000)),
            tokens: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen", &self.listen)
            .field("tokens", &format_args!("[{} REDACTED]", self.tokens.len()))
            .finish()
    }
}

impl ServiceConfig {
    /// Parse configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Read and validate a configuration file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = Self::from_json(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check all sections.
    ///
    /// # Errors
    /// - `InvalidInput` if any cost or limit is out of range
    pub fn validate(&self) -> Result<()> {
        self.kdf.validate()?;
        PasswordHasher::new(self.hasher)?;
        self.rate_limit.validate()?;
        Ok(())
    }

    /// Directory for transient artifacts.
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Build the protection encoder from the cost settings.
    pub fn build_encoder(&self) -> Result<ProtectionEncoder> {
        ProtectionEncoder::new(self.kdf, PasswordHasher::new(self.hasher)?)
    }
}
