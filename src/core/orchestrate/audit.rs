//! Durable compliance record written when a job completes

use crate::domain::ids::ExportJobId;
use crate::domain::result::Result;
use crate::domain::HavenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Compliance record for one completed export
///
/// Created once the job reaches COMPLETE and never mutated afterwards.
/// Deleted only by retention-driven purge of the state directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportAuditMetadata {
    pub job_id: ExportJobId,
    pub user_id: Uuid,
    pub user_name: String,
    pub ip_address: String,
    pub session_id: String,
    pub period_start: String,
    pub period_end: String,
    pub artifact_sha256: String,
    pub storage_location: String,
    pub record_count: u64,
    pub validation_warnings: u64,
    pub retention_expires_at: DateTime<Utc>,
    pub ledger_entry_id: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl ExportAuditMetadata {
    /// Writes the record as `<state_dir>/<job-id>.audit.json`.
    pub async fn persist(&self, state_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(state_dir)
            .await
            .map_err(|e| HavenError::Io(format!("create state dir: {e}")))?;
        let path = state_dir.join(format!("{}.audit.json", self.job_id));
        let body = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| HavenError::Io(format!("write {}: {e}", path.display())))?;
        Ok(path)
    }

    pub async fn load(state_dir: &Path, job_id: ExportJobId) -> Result<Self> {
        let path = state_dir.join(format!("{job_id}.audit.json"));
        let body = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| HavenError::Io(format!("read {}: {e}", path.display())))?;
        Ok(serde_json::from_str(&body)?)
    }
}
