//! In-memory content store for testing.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::provider::{ByteStream, ContentStore, Metadata};
use docseal_common::{ContentLocator, Error, Result};

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    metadata: Metadata,
}

/// In-memory content store.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop.
#[derive(Clone, Default)]
pub struct MemoryStore {
    storage: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(locator: &ContentLocator) -> String {
        locator.to_string_path()
    }

    fn poisoned() -> Error {
        Error::Storage("Memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&self, locator: &ContentLocator, data: Vec<u8>) -> Result<Metadata> {
        let metadata = Metadata {
            locator: locator.clone(),
            size: data.len() as u64,
            modified: Utc::now(),
        };

        let entry = Entry {
            data,
            metadata: metadata.clone(),
        };

        self.storage
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(Self::key(locator), entry);

        Ok(metadata)
    }

    async fn read(&self, locator: &ContentLocator) -> Result<Vec<u8>> {
        let storage = self.storage.read().map_err(|_| Self::poisoned())?;

        storage
            .get(&Self::key(locator))
            .map(|entry| entry.data.clone())
            .ok_or_else(|| Error::NotFound(format!("Content not found: {}", locator)))
    }

    async fn read_stream(&self, locator: &ContentLocator) -> Result<ByteStream> {
        let data = self.read(locator).await?;
        let stream = stream::once(async move { Ok(data) });
        Ok(Box::pin(stream))
    }

    async fn exists(&self, locator: &ContentLocator) -> Result<bool> {
        let storage = self.storage.read().map_err(|_| Self::poisoned())?;
        Ok(storage.contains_key(&Self::key(locator)))
    }

    async fn delete(&self, locator: &ContentLocator) -> Result<()> {
        let mut storage = self.storage.write().map_err(|_| Self::poisoned())?;

        storage
            .remove(&Self::key(locator))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Content not found: {}", locator)))
    }

    async fn metadata(&self, locator: &ContentLocator) -> Result<Metadata> {
        let storage = self.storage.read().map_err(|_| Self::poisoned())?;

        storage
            .get(&Self::key(locator))
            .map(|entry| entry.metadata.clone())
            .ok_or_else(|| Error::NotFound(format!("Content not found: {}", locator)))
    }
}
