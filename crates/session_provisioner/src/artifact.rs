use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Errors raised while persisting the pairing image
#[derive(thiserror::Error, Debug)]
pub enum ArtifactError {
    /// Writing the file (or creating its directory) failed
    #[error("Failed to write pairing artifact {}: {source}", .path.display())]
    Io {
        /// Target path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Metadata about a pairing image that was just written
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRecord {
    /// Where the PNG lives
    pub path: PathBuf,
    /// Size of the decoded image
    pub bytes: usize,
    /// When it was written
    pub written_at: DateTime<Utc>,
}

/// Destination for decoded pairing images
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write (or overwrite) the pairing image
    async fn persist(&self, png: &[u8]) -> Result<ArtifactRecord, ArtifactError>;

    /// When the artifact currently in place was written, if there is one
    async fn last_written(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Stores the pairing image at a fixed path on the local filesystem
pub struct FileArtifactStore {
    path: PathBuf,
}

impl FileArtifactStore {
    /// Create a store writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ArtifactError {
        ArtifactError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn persist(&self, png: &[u8]) -> Result<ArtifactRecord, ArtifactError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        tokio::fs::write(&self.path, png)
            .await
            .map_err(|e| self.io_error(e))?;

        log::debug!("Wrote {} bytes to {}", png.len(), self.path.display());

        Ok(ArtifactRecord {
            path: self.path.clone(),
            bytes: png.len(),
            written_at: Utc::now(),
        })
    }

    async fn last_written(&self) -> Option<DateTime<Utc>> {
        let metadata = tokio::fs::metadata(&self.path).await.ok()?;
        metadata.modified().ok().map(DateTime::<Utc>::from)
    }
}
