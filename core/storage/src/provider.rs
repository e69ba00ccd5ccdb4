//! Content store trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use docseal_common::{ContentLocator, Result};

/// Metadata for a stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Where the object lives.
    pub locator: ContentLocator,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Byte stream type for download operations.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Store for document content bytes.
///
/// Writes must be atomic per locator: a concurrent reader sees either the
/// previous bytes or the new bytes, never a mix.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Get the store name (e.g., "local", "memory").
    fn name(&self) -> &str;

    /// Write data at a locator, creating intermediate levels as needed.
    ///
    /// # Postconditions
    /// - Object is created or replaced at the locator
    /// - Returns metadata of the written object
    async fn write(&self, locator: &ContentLocator, data: Vec<u8>) -> Result<Metadata>;

    /// Read the complete object.
    ///
    /// # Errors
    /// - `NotFound` if nothing is stored at the locator
    async fn read(&self, locator: &ContentLocator) -> Result<Vec<u8>>;

    /// Read the object as a stream of chunks.
    async fn read_stream(&self, locator: &ContentLocator) -> Result<ByteStream>;

    /// Check if content exists at a locator.
    async fn exists(&self, locator: &ContentLocator) -> Result<bool>;

    /// Delete the object.
    ///
    /// # Errors
    /// - `NotFound` if nothing is stored at the locator
    async fn delete(&self, locator: &ContentLocator) -> Result<()>;

    /// Get metadata for a locator.
    async fn metadata(&self, locator: &ContentLocator) -> Result<Metadata>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_serialization() {
        let metadata = Metadata {
            locator: ContentLocator::parse("docs/a.bin").unwrap(),
            size: 1024,
            modified: Utc::now(),
        };

        let json = serde_json::to_string(&metadata).unwrap();
        let deserialized: Metadata = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.locator, metadata.locator);
        assert_eq!(deserialized.size, metadata.size);
    }
}
