//! Local filesystem content store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;
use uuid::Uuid;

use crate::provider::{ByteStream, ContentStore, Metadata};
use docseal_common::{ContentLocator, Error, Result};

/// Chunk size for streamed reads.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem content store.
///
/// Stores content under a root directory, one file per locator.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a new local store with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Create root if it doesn't exist (sync for constructor)
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a locator to a filesystem path.
    fn to_fs_path(&self, locator: &ContentLocator) -> PathBuf {
        let mut fs_path = self.root.clone();
        for component in locator.components() {
            fs_path.push(component);
        }
        fs_path
    }

    fn create_metadata(locator: &ContentLocator, fs_meta: std::fs::Metadata) -> Metadata {
        let modified: DateTime<Utc> = fs_meta
            .modified()
            .map(|t| t.into())
            .unwrap_or_else(|_| Utc::now());

        Metadata {
            locator: locator.clone(),
            size: fs_meta.len(),
            modified,
        }
    }

    async fn open_file(&self, locator: &ContentLocator) -> Result<fs::File> {
        let fs_path = self.to_fs_path(locator);
        match fs::File::open(&fs_path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Content not found: {}", locator)))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[async_trait]
impl ContentStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn write(&self, locator: &ContentLocator, data: Vec<u8>) -> Result<Metadata> {
        let fs_path = self.to_fs_path(locator);
        let parent = fs_path
            .parent()
            .ok_or_else(|| Error::InvalidInput(format!("Invalid locator: {}", locator)))?;
        fs::create_dir_all(parent).await?;

        // Write beside the target, then rename into place
        let tmp_path = parent.join(format!(".{}.{}.tmp", locator.name(), Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp_path, &data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(Error::Io(e));
        }
        if let Err(e) = fs::rename(&tmp_path, &fs_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(Error::Io(e));
        }

        debug!(locator = %locator, size = data.len(), "Content written");

        let fs_meta = fs::metadata(&fs_path).await?;
        Ok(Self::create_metadata(locator, fs_meta))
    }

    async fn read(&self, locator: &ContentLocator) -> Result<Vec<u8>> {
        let mut file = self.open_file(locator).await?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).await?;
        Ok(data)
    }

    async fn read_stream(&self, locator: &ContentLocator) -> Result<ByteStream> {
        let file = self.open_file(locator).await?;

        let stream = stream::unfold(Some(file), |state| async move {
            let mut file = match state {
                Some(file) => file,
                None => return None,
            };
            let mut buf = vec![0u8; READ_CHUNK_SIZE];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(buf), Some(file)))
                }
                Err(e) => Some((Err(Error::Io(e)), None)),
            }
        });

        Ok(Box::pin(stream))
    }

    async fn exists(&self, locator: &ContentLocator) -> Result<bool> {
        let fs_path = self.to_fs_path(locator);
        match fs::metadata(&fs_path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn delete(&self, locator: &ContentLocator) -> Result<()> {
        let fs_path = self.to_fs_path(locator);

        match fs::remove_file(&fs_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Content not found: {}", locator)))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn metadata(&self, locator: &ContentLocator) -> Result<Metadata> {
        let fs_path = self.to_fs_path(locator);

        match fs::metadata(&fs_path).await {
            Ok(meta) => Ok(Self::create_metadata(locator, meta)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Content not found: {}", locator)))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::TempDir;

    fn loc(s: &str) -> ContentLocator {
        ContentLocator::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_local_write_read() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path()).unwrap();
        let data = b"Hello, Local!".to_vec();

        store.write(&loc("docs/ab/test.txt"), data.clone()).await.unwrap();
        let read = store.read(&loc("docs/ab/test.txt")).await.unwrap();

        assert_eq!(read, data);
        assert!(temp.path().join("docs/ab/test.txt").is_file());
    }

    #[tokio::test]
    async fn test_local_write_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path()).unwrap();

        store.write(&loc("d/file.bin"), vec![1; 100]).await.unwrap();
        store.write(&loc("d/file.bin"), vec![2; 50]).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp.path().join("d")).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.read(&loc("d/file.bin")).await.unwrap(), vec![2; 50]);
    }

    #[tokio::test]
    async fn test_local_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path()).unwrap();

        assert!(!store.exists(&loc("nope")).await.unwrap());
        assert!(matches!(store.read(&loc("nope")).await, Err(Error::NotFound(_))));
        assert!(matches!(store.read_stream(&loc("nope")).await, Err(Error::NotFound(_))));
        assert!(matches!(store.delete(&loc("nope")).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_read_stream_chunks() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path()).unwrap();
        let data: Vec<u8> = (0..(READ_CHUNK_SIZE * 2 + 17)).map(|i| i as u8).collect();

        store.write(&loc("big.bin"), data.clone()).await.unwrap();

        let mut stream = store.read_stream(&loc("big.bin")).await.unwrap();
        let mut chunks = 0;
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend(chunk.unwrap());
            chunks += 1;
        }

        assert!(chunks >= 3);
        assert_eq!(collected, data);
    }

    #[tokio::test]
    async fn test_local_directory_is_not_content() {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path()).unwrap();
        std::fs::create_dir(temp.path().join("dir")).unwrap();

        assert!(!store.exists(&loc("dir")).await.unwrap());
    }
}
