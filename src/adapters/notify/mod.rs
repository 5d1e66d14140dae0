//! Administrator notifications for finished export jobs
//!
//! The production deployment delivers these through the organization's
//! messaging system; this crate ships a file-backed outbox that downstream
//! tooling drains. Delivery failure after the artifact is stored is
//! job-non-fatal, mirroring the ledger contract.

use crate::domain::ids::ExportJobId;
use crate::domain::result::Result;
use crate::domain::HavenError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Completion/failure notice sent to administrators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportNotification {
    pub job_id: ExportJobId,
    pub organization_name: String,
    pub recipients: Vec<String>,
    /// COMPLETE or FAILED
    pub outcome: String,
    pub period_start: String,
    pub period_end: String,
    pub validation_errors: u64,
    pub validation_warnings: u64,
    pub subject_count: u64,
    pub retention_expires_at: Option<DateTime<Utc>>,
    pub ledger_entry_id: Option<String>,
    pub failure_reason: Option<String>,
    pub sent_at: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(&self, notification: &ExportNotification) -> Result<()>;
}

/// File-backed notification outbox
pub struct OutboxNotificationService {
    outbox_dir: PathBuf,
    enabled: bool,
}

impl OutboxNotificationService {
    pub fn new(outbox_dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            outbox_dir: outbox_dir.into(),
            enabled,
        }
    }
}

#[async_trait]
impl NotificationService for OutboxNotificationService {
    async fn send(&self, notification: &ExportNotification) -> Result<()> {
        if !self.enabled {
            tracing::debug!(job_id = %notification.job_id, "Notifications disabled");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.outbox_dir)
            .await
            .map_err(|e| HavenError::Notification(format!("create outbox dir: {e}")))?;

        let path = self.outbox_dir.join(format!(
            "{}-{}.json",
            notification.sent_at.format("%Y%m%dT%H%M%S"),
            notification.job_id
        ));
        let body = serde_json::to_vec_pretty(notification)
            .map_err(|e| HavenError::Notification(format!("serialize notification: {e}")))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| HavenError::Notification(format!("write {}: {e}", path.display())))?;

        tracing::info!(
            job_id = %notification.job_id,
            outcome = %notification.outcome,
            recipients = notification.recipients.len(),
            "Export notification queued"
        );
        Ok(())
    }
}

/// In-memory service for tests
#[derive(Default)]
pub struct InMemoryNotificationService {
    sent: tokio::sync::Mutex<Vec<ExportNotification>>,
}

impl InMemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<ExportNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn send(&self, notification: &ExportNotification) -> Result<()> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}
