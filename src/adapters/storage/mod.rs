//! Encrypted artifact store
//!
//! Artifacts are keyed by job ID under a year/month partition:
//! `<root>/<yyyy>/<mm>/<job-id>.enc`. Writes refuse to overwrite an
//! existing blob, so a duplicate store attempt for the same job surfaces
//! as an error instead of silently replacing the artifact. Purge removes
//! the blob; the job's event history records the purge separately.

use crate::domain::errors::StorageError;
use crate::domain::ids::ExportJobId;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Write/read/purge access to the encrypted artifact store
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores an encrypted blob; returns its location relative to the root.
    async fn store(
        &self,
        job_id: ExportJobId,
        stored_at: DateTime<Utc>,
        blob: &[u8],
    ) -> Result<String, StorageError>;

    async fn load(&self, location: &str) -> Result<Vec<u8>, StorageError>;

    /// Removes the underlying blob. The job history is untouched.
    async fn purge(&self, location: &str) -> Result<(), StorageError>;

    async fn exists(&self, location: &str) -> bool;
}

/// Filesystem-backed artifact store
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        self.root.join(location)
    }
}

/// Relative storage location for a job stored at the given instant
pub fn artifact_location(job_id: ExportJobId, stored_at: DateTime<Utc>) -> String {
    format!(
        "{:04}/{:02}/{job_id}.enc",
        stored_at.year(),
        stored_at.month()
    )
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn store(
        &self,
        job_id: ExportJobId,
        stored_at: DateTime<Utc>,
        blob: &[u8],
    ) -> Result<String, StorageError> {
        let location = artifact_location(job_id, stored_at);
        let path = self.resolve(&location);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::WriteFailed(format!("create_dir_all: {e}")))?;
        }

        // create_new refuses to clobber an already-stored artifact
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                StorageError::WriteFailed(format!("open {}: {e}", path.display()))
            })?;
        file.write_all(blob)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("write {}: {e}", path.display())))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::WriteFailed(format!("sync {}: {e}", path.display())))?;

        tracing::info!(
            job_id = %job_id,
            location = %location,
            bytes = blob.len(),
            "Encrypted artifact stored"
        );
        Ok(location)
    }

    async fn load(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(location);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => Err(StorageError::ReadFailed(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn purge(&self, location: &str) -> Result<(), StorageError> {
        let path = self.resolve(location);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(location = %location, "Encrypted artifact purged");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => Err(StorageError::PurgeFailed(format!(
                "remove {}: {e}",
                path.display()
            ))),
        }
    }

    async fn exists(&self, location: &str) -> bool {
        self.resolve(location).exists()
    }
}
