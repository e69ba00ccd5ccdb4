//! Transient plaintext artifacts.
//!
//! Decrypted content is staged in a uniquely named file for exactly one
//! response. The file is owned by a [`TempPath`]: it is removed when the
//! artifact is dropped, when its stream is fully consumed, or when the stream
//! is dropped part way through (client disconnect, mid-stream error).

use futures::stream;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::AsyncReadExt;
use tracing::debug;

use docseal_common::{Error, Result, SensitiveBytes};
use docseal_storage::ByteStream;

/// Prefix of every staged file name.
pub const ARTIFACT_PREFIX: &str = "docseal-";

const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Decrypted bytes staged for one response.
#[derive(Debug)]
pub struct StagedArtifact {
    path: TempPath,
    size: u64,
}

impl StagedArtifact {
    /// Write `content` to a new file under `dir`.
    ///
    /// The file keeps the extension of `file_name`.
    ///
    /// # Errors
    /// - I/O errors creating or writing the file; nothing is left behind
    pub async fn stage(dir: &Path, file_name: &str, content: SensitiveBytes) -> Result<Self> {
        let dir = dir.to_path_buf();
        let suffix = extension_suffix(file_name);

        let (path, size) = tokio::task::spawn_blocking(move || -> Result<(TempPath, u64)> {
            let mut file = tempfile::Builder::new()
                .prefix(ARTIFACT_PREFIX)
                .suffix(&suffix)
                .tempfile_in(&dir)?;
            file.write_all(content.as_bytes())?;
            file.flush()?;
            Ok((file.into_temp_path(), content.len() as u64))
        })
        .await
        .map_err(|e| Error::Internal(format!("Staging task failed: {}", e)))??;

        debug!(path = %path.display(), size, "Artifact staged");
        Ok(Self { path, size })
    }

    /// Location of the staged file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the staged content in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Remove the staged file now.
    pub fn discard(self) -> Result<()> {
        self.path.close()?;
        Ok(())
    }

    /// Stream the staged content, removing the file once the stream ends or
    /// is dropped.
    pub async fn into_stream(self) -> Result<ByteStream> {
        let file = tokio::fs::File::open(&self.path).await?;
        let guard = CleanupGuard(self.path);

        let stream = stream::unfold(Some((file, guard)), |state| async move {
            let (mut file, guard) = match state {
                Some(state) => state,
                None => return None,
            };
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(buf), Some((file, guard))))
                }
                Err(e) => Some((Err(Error::Io(e)), None)),
            }
        });

        Ok(Box::pin(stream))
    }
}

/// Removes the staged file on drop and records that it happened.
struct CleanupGuard(TempPath);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        debug!(path = %self.0.display(), "Artifact removed");
    }
}

fn extension_suffix(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

/// List staged artifacts left under `dir`.
pub fn leftover_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(ARTIFACT_PREFIX))
        {
            found.push(entry.path());
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::TempDir;

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend(chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_stage_keeps_extension() {
        let dir = TempDir::new().unwrap();
        let artifact = StagedArtifact::stage(
            dir.path(),
            "invoice.pdf",
            SensitiveBytes::new(b"%PDF".to_vec()),
        )
        .await
        .unwrap();

        let name = artifact.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with(ARTIFACT_PREFIX));
        assert!(name.ends_with(".pdf"));
        assert_eq!(artifact.size(), 4);
    }

    #[tokio::test]
    async fn test_stream_removes_file_at_end() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..(STREAM_CHUNK_SIZE + 10)).map(|i| i as u8).collect();
        let artifact = StagedArtifact::stage(dir.path(), "big.bin", SensitiveBytes::new(data.clone()))
            .await
            .unwrap();
        let path = artifact.path().to_path_buf();

        let stream = artifact.into_stream().await.unwrap();
        assert!(path.exists());
        assert_eq!(collect(stream).await, data);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_dropped_stream_removes_file() {
        let dir = TempDir::new().unwrap();
        let data = vec![7u8; STREAM_CHUNK_SIZE * 3];
        let artifact = StagedArtifact::stage(dir.path(), "a.bin", SensitiveBytes::new(data))
            .await
            .unwrap();

        let mut stream = artifact.into_stream().await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.len(), STREAM_CHUNK_SIZE);
        drop(stream);

        assert!(leftover_artifacts(dir.path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unconsumed_artifact_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let artifact = StagedArtifact::stage(dir.path(), "a", SensitiveBytes::new(vec![1, 2]))
            .await
            .unwrap();
        assert_eq!(leftover_artifacts(dir.path()).unwrap().len(), 1);

        drop(artifact);
        assert!(leftover_artifacts(dir.path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_discard() {
        let dir = TempDir::new().unwrap();
        let artifact = StagedArtifact::stage(dir.path(), "a.txt", SensitiveBytes::new(vec![1]))
            .await
            .unwrap();
        artifact.discard().unwrap();
        assert!(leftover_artifacts(dir.path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stage_into_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent");
        let result = StagedArtifact::stage(&missing, "a.txt", SensitiveBytes::new(vec![1])).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_extension_suffix() {
        assert_eq!(extension_suffix("report.PDF"), ".PDF");
        assert_eq!(extension_suffix("archive.tar.gz"), ".gz");
        assert_eq!(extension_suffix("noext"), "");
        assert_eq!(extension_suffix("weird.p/df"), "");
    }
}
