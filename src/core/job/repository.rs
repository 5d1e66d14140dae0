//! Durable event log for export jobs
//!
//! One JSONL file per job under the state directory. An event is appended
//! and fsynced before the in-memory fold advances, so a crash can lose at
//! most an un-acknowledged transition, never invent one. Workers take an
//! exclusive claim on a job before driving it, which prevents duplicate
//! side effects (double storage, double ledger entries) when more than one
//! orchestrator worker is running.

use crate::core::job::aggregate::ExportJobAggregate;
use crate::core::job::events::{ExportJobEvent, ExportJobState};
use crate::domain::ids::ExportJobId;
use crate::domain::result::Result;
use crate::domain::HavenError;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

struct RepositoryState {
    jobs: BTreeMap<ExportJobId, ExportJobAggregate>,
    claimed: BTreeSet<ExportJobId>,
}

/// Event-sourced job repository backed by per-job JSONL logs
pub struct EventSourcedExportJobRepository {
    state_dir: PathBuf,
    inner: Mutex<RepositoryState>,
}

impl EventSourcedExportJobRepository {
    /// Opens the repository, replaying every existing job log.
    pub async fn open(state_dir: impl Into<PathBuf>) -> Result<Self> {
        let state_dir = state_dir.into();
        tokio::fs::create_dir_all(&state_dir)
            .await
            .map_err(|e| HavenError::EventStore(format!("Failed to create state dir: {e}")))?;

        let mut jobs = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(&state_dir)
            .await
            .map_err(|e| HavenError::EventStore(format!("Failed to read state dir: {e}")))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HavenError::EventStore(format!("Failed to read state dir: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let aggregate = replay_log(&path).await?;
            jobs.insert(aggregate.job_id, aggregate);
        }

        tracing::info!(
            state_dir = %state_dir.display(),
            jobs = jobs.len(),
            "Job event log opened"
        );

        Ok(Self {
            state_dir,
            inner: Mutex::new(RepositoryState {
                jobs,
                claimed: BTreeSet::new(),
            }),
        })
    }

    /// Appends one event durably, then folds it into the in-memory state.
    ///
    /// The event is validated against the current fold first, so an illegal
    /// transition never reaches the log.
    pub async fn append(&self, event: &ExportJobEvent) -> Result<ExportJobAggregate> {
        let mut state = self.inner.lock().await;
        let job_id = event.job_id();

        // Validate by folding a copy before anything touches disk
        let next = match (&event, state.jobs.get(&job_id)) {
            (ExportJobEvent::Queued { .. }, Some(_)) => {
                return Err(HavenError::EventStore(format!(
                    "Job {job_id} already exists"
                )));
            }
            (ExportJobEvent::Queued { .. }, None) => {
                ExportJobAggregate::from_events(std::slice::from_ref(event))?
            }
            (_, None) => {
                return Err(HavenError::EventStore(format!("Unknown job {job_id}")));
            }
            (_, Some(current)) => {
                let mut next = current.clone();
                next.apply(event)?;
                next
            }
        };

        let line = serde_json::to_string(event)
            .map_err(|e| HavenError::EventStore(format!("Event serialization failed: {e}")))?;
        let path = self.log_path(job_id);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| HavenError::EventStore(format!("Failed to open {}: {e}", path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| HavenError::EventStore(format!("Failed to append event: {e}")))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| HavenError::EventStore(format!("Failed to append event: {e}")))?;
        // The write must be durable before the fold is advanced
        file.sync_all()
            .await
            .map_err(|e| HavenError::EventStore(format!("Failed to sync event log: {e}")))?;

        tracing::debug!(
            job_id = %job_id,
            event = event.kind(),
            state = %next.state,
            version = next.version,
            "Job event appended"
        );

        state.jobs.insert(job_id, next.clone());
        Ok(next)
    }

    /// Snapshot of one job's folded state
    pub async fn get(&self, job_id: ExportJobId) -> Option<ExportJobAggregate> {
        self.inner.lock().await.jobs.get(&job_id).cloned()
    }

    /// Takes an exclusive claim on a queued job. Returns false when the job
    /// is unknown, not queued, or already claimed by another worker.
    pub async fn claim(&self, job_id: ExportJobId) -> bool {
        let mut state = self.inner.lock().await;
        let queued = state
            .jobs
            .get(&job_id)
            .map(|j| j.state == ExportJobState::Queued)
            .unwrap_or(false);
        if !queued || state.claimed.contains(&job_id) {
            return false;
        }
        state.claimed.insert(job_id);
        true
    }

    /// Releases a claim once the job has reached a terminal state.
    pub async fn release(&self, job_id: ExportJobId) {
        self.inner.lock().await.claimed.remove(&job_id);
    }

    /// Snapshot of every known job, ordered by job ID
    pub async fn jobs(&self) -> Vec<ExportJobAggregate> {
        self.inner.lock().await.jobs.values().cloned().collect()
    }

    /// Queued, unclaimed jobs in insertion order
    pub async fn queued(&self) -> Vec<ExportJobId> {
        let state = self.inner.lock().await;
        state
            .jobs
            .values()
            .filter(|j| j.state == ExportJobState::Queued && !state.claimed.contains(&j.job_id))
            .map(|j| j.job_id)
            .collect()
    }

    /// Completed, not-yet-purged jobs whose last update is older than the
    /// cutoff; candidates for retention purge.
    pub async fn purge_candidates(&self, cutoff: DateTime<Utc>) -> Vec<ExportJobAggregate> {
        let state = self.inner.lock().await;
        state
            .jobs
            .values()
            .filter(|j| j.state == ExportJobState::Complete && !j.purged && j.updated_at < cutoff)
            .cloned()
            .collect()
    }

    fn log_path(&self, job_id: ExportJobId) -> PathBuf {
        self.state_dir.join(format!("{job_id}.jsonl"))
    }
}

async fn replay_log(path: &Path) -> Result<ExportJobAggregate> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| HavenError::EventStore(format!("Failed to read {}: {e}", path.display())))?;

    let mut events = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: ExportJobEvent = serde_json::from_str(line).map_err(|e| {
            HavenError::EventStore(format!(
                "Corrupt event at {}:{}: {e}",
                path.display(),
                number + 1
            ))
        })?;
        events.push(event);
    }
    ExportJobAggregate::from_events(&events)
}
