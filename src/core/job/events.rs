//! Export job lifecycle events and states
//!
//! The event log is the single source of truth for a job. Observable state
//! is always the fold of the append-only event sequence; no in-place field
//! mutation is recorded anywhere else.

use crate::domain::ids::{ExportJobId, TenantId};
use crate::domain::request::{AccessContext, ExportRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of an export job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportJobState {
    Queued,
    Materializing,
    Validating,
    Complete,
    Failed,
}

impl ExportJobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportJobState::Complete | ExportJobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportJobState::Queued => "QUEUED",
            ExportJobState::Materializing => "MATERIALIZING",
            ExportJobState::Validating => "VALIDATING",
            ExportJobState::Complete => "COMPLETE",
            ExportJobState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ExportJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One event in a job's append-only log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportJobEvent {
    /// Job accepted and queued; always the first event
    Queued {
        job_id: ExportJobId,
        tenant_id: TenantId,
        request: ExportRequest,
        requested_by: AccessContext,
        occurred_at: DateTime<Utc>,
    },

    /// Non-terminal stage transition
    StateChanged {
        job_id: ExportJobId,
        from: ExportJobState,
        to: ExportJobState,
        occurred_at: DateTime<Utc>,
    },

    /// Terminal success, after the artifact is stored
    Completed {
        job_id: ExportJobId,
        storage_location: String,
        artifact_sha256: String,
        record_count: u64,
        occurred_at: DateTime<Utc>,
    },

    /// Terminal failure with the recorded reason
    Failed {
        job_id: ExportJobId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },

    /// Retention purge marker; the blob is gone, the history is not
    Purged {
        job_id: ExportJobId,
        occurred_at: DateTime<Utc>,
    },
}

impl ExportJobEvent {
    pub fn job_id(&self) -> ExportJobId {
        match self {
            ExportJobEvent::Queued { job_id, .. }
            | ExportJobEvent::StateChanged { job_id, .. }
            | ExportJobEvent::Completed { job_id, .. }
            | ExportJobEvent::Failed { job_id, .. }
            | ExportJobEvent::Purged { job_id, .. } => *job_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExportJobEvent::Queued { occurred_at, .. }
            | ExportJobEvent::StateChanged { occurred_at, .. }
            | ExportJobEvent::Completed { occurred_at, .. }
            | ExportJobEvent::Failed { occurred_at, .. }
            | ExportJobEvent::Purged { occurred_at, .. } => *occurred_at,
        }
    }

    /// Short tag used in structured log lines
    pub fn kind(&self) -> &'static str {
        match self {
            ExportJobEvent::Queued { .. } => "QUEUED",
            ExportJobEvent::StateChanged { .. } => "STATE_CHANGED",
            ExportJobEvent::Completed { .. } => "COMPLETED",
            ExportJobEvent::Failed { .. } => "FAILED",
            ExportJobEvent::Purged { .. } => "PURGED",
        }
    }
}
