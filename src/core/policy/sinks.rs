//! Audit and security-monitoring sinks for policy evaluations
//!
//! Every evaluation is forwarded to the audit sink, and every evaluation is
//! also recorded through the monitoring sink with the same log shape for
//! hashed and unhashed paths, before the decision is returned. A sink
//! failure surfaces as an error rather than silently swallowing the record.

use crate::domain::ids::{ClearanceId, TenantId};
use crate::domain::policy::{ConsentScope, PolicyDecision};
use crate::domain::result::Result;
use crate::domain::HavenError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// One policy evaluation as forwarded to the sinks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAuditRecord {
    pub tenant_id: TenantId,
    pub user_id: Uuid,
    pub user_name: String,
    pub ip_address: String,
    pub session_id: String,
    pub requested_hashed: bool,
    pub provided_scopes: BTreeSet<ConsentScope>,
    pub clearance_id: Option<ClearanceId>,
    pub clearance_expires_at: Option<DateTime<Utc>>,
    pub decision: PolicyDecision,
    pub recorded_at: DateTime<Utc>,
}

/// Durable record of every policy evaluation
#[async_trait]
pub trait PolicyAuditSink: Send + Sync {
    async fn record(&self, record: &PolicyAuditRecord) -> Result<()>;
}

/// Security-monitoring feed; one shape for hashed and unhashed requests
#[async_trait]
pub trait SecurityMonitoringSink: Send + Sync {
    async fn record_attempt(&self, record: &PolicyAuditRecord) -> Result<()>;
}

/// JSONL-file sink used for both audit and monitoring roles
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn append(&self, record: &PolicyAuditRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HavenError::Io(format!("Failed to create audit dir: {e}")))?;
        }
        let line = serde_json::to_string(record)?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                HavenError::Io(format!("Failed to open {}: {e}", self.path.display()))
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| HavenError::Io(format!("Failed to write audit record: {e}")))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| HavenError::Io(format!("Failed to write audit record: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl PolicyAuditSink for JsonFileSink {
    async fn record(&self, record: &PolicyAuditRecord) -> Result<()> {
        self.append(record).await
    }
}

#[async_trait]
impl SecurityMonitoringSink for JsonFileSink {
    async fn record_attempt(&self, record: &PolicyAuditRecord) -> Result<()> {
        self.append(record).await
    }
}

/// In-memory sink for tests
#[derive(Default)]
pub struct InMemorySink {
    records: tokio::sync::Mutex<Vec<PolicyAuditRecord>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<PolicyAuditRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl PolicyAuditSink for InMemorySink {
    async fn record(&self, record: &PolicyAuditRecord) -> Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl SecurityMonitoringSink for InMemorySink {
    async fn record_attempt(&self, record: &PolicyAuditRecord) -> Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}
