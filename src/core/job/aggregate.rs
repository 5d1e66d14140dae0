//! The export job aggregate
//!
//! A pure fold over the event sequence. Command methods validate the
//! transition against the current state and return the event to append;
//! they never mutate the aggregate themselves. The repository appends the
//! event durably and only then applies it.

use crate::core::job::events::{ExportJobEvent, ExportJobState};
use crate::domain::ids::{ExportJobId, TenantId};
use crate::domain::request::{AccessContext, ExportRequest};
use crate::domain::result::Result;
use crate::domain::HavenError;
use chrono::{DateTime, Utc};

/// Folded view of one export job's event log
#[derive(Debug, Clone)]
pub struct ExportJobAggregate {
    pub job_id: ExportJobId,
    pub tenant_id: TenantId,
    pub state: ExportJobState,
    pub request: ExportRequest,
    pub requested_by: AccessContext,
    pub queued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
    pub storage_location: Option<String>,
    pub artifact_sha256: Option<String>,
    pub record_count: Option<u64>,
    /// Retention purge marker; the state stays terminal
    pub purged: bool,
    /// Number of events folded so far
    pub version: u64,
}

impl ExportJobAggregate {
    /// Builds the first event of a new job. The aggregate itself only comes
    /// into existence when the event is folded.
    pub fn queue(
        tenant_id: TenantId,
        request: ExportRequest,
        requested_by: AccessContext,
        now: DateTime<Utc>,
    ) -> ExportJobEvent {
        ExportJobEvent::Queued {
            job_id: ExportJobId::generate(),
            tenant_id,
            request,
            requested_by,
            occurred_at: now,
        }
    }

    /// Folds a full event sequence. The first event must be `Queued`.
    pub fn from_events(events: &[ExportJobEvent]) -> Result<Self> {
        let mut iter = events.iter();
        let first = iter
            .next()
            .ok_or_else(|| HavenError::JobState("Empty event sequence".to_string()))?;

        let mut aggregate = match first {
            ExportJobEvent::Queued {
                job_id,
                tenant_id,
                request,
                requested_by,
                occurred_at,
            } => Self {
                job_id: *job_id,
                tenant_id: *tenant_id,
                state: ExportJobState::Queued,
                request: request.clone(),
                requested_by: requested_by.clone(),
                queued_at: *occurred_at,
                updated_at: *occurred_at,
                failure_reason: None,
                storage_location: None,
                artifact_sha256: None,
                record_count: None,
                purged: false,
                version: 1,
            },
            other => {
                return Err(HavenError::JobState(format!(
                    "Event sequence must start with QUEUED, found {}",
                    other.kind()
                )))
            }
        };

        for event in iter {
            aggregate.apply(event)?;
        }
        Ok(aggregate)
    }

    /// Applies one subsequent event, enforcing the transition table.
    pub fn apply(&mut self, event: &ExportJobEvent) -> Result<()> {
        if event.job_id() != self.job_id {
            return Err(HavenError::JobState(format!(
                "Event for job {} applied to job {}",
                event.job_id(),
                self.job_id
            )));
        }

        match event {
            ExportJobEvent::Queued { .. } => {
                return Err(HavenError::JobState(
                    "QUEUED is only valid as the first event".to_string(),
                ));
            }
            ExportJobEvent::StateChanged { from, to, .. } => {
                if *from != self.state {
                    return Err(HavenError::JobState(format!(
                        "Transition from {from} recorded while job is {}",
                        self.state
                    )));
                }
                if !valid_stage_transition(*from, *to) {
                    return Err(HavenError::JobState(format!(
                        "Illegal transition {from} -> {to}"
                    )));
                }
                self.state = *to;
            }
            ExportJobEvent::Completed {
                storage_location,
                artifact_sha256,
                record_count,
                ..
            } => {
                if self.state != ExportJobState::Validating {
                    return Err(HavenError::JobState(format!(
                        "COMPLETED is only valid from VALIDATING, job is {}",
                        self.state
                    )));
                }
                self.state = ExportJobState::Complete;
                self.storage_location = Some(storage_location.clone());
                self.artifact_sha256 = Some(artifact_sha256.clone());
                self.record_count = Some(*record_count);
            }
            ExportJobEvent::Failed { reason, .. } => {
                if self.state.is_terminal() {
                    return Err(HavenError::JobState(format!(
                        "FAILED recorded after terminal state {}",
                        self.state
                    )));
                }
                self.state = ExportJobState::Failed;
                self.failure_reason = Some(reason.clone());
            }
            ExportJobEvent::Purged { .. } => {
                if self.state != ExportJobState::Complete {
                    return Err(HavenError::JobState(format!(
                        "PURGED is only valid for COMPLETE jobs, job is {}",
                        self.state
                    )));
                }
                if self.purged {
                    return Err(HavenError::JobState("Job already purged".to_string()));
                }
                self.purged = true;
            }
        }

        self.updated_at = event.occurred_at();
        self.version += 1;
        Ok(())
    }

    // Command methods: validate against current state, return the event.

    pub fn begin_materialization(&self, now: DateTime<Utc>) -> Result<ExportJobEvent> {
        self.stage_change(ExportJobState::Materializing, now)
    }

    pub fn begin_validation(&self, now: DateTime<Utc>) -> Result<ExportJobEvent> {
        self.stage_change(ExportJobState::Validating, now)
    }

    pub fn complete(
        &self,
        storage_location: String,
        artifact_sha256: String,
        record_count: u64,
        now: DateTime<Utc>,
    ) -> Result<ExportJobEvent> {
        if self.state != ExportJobState::Validating {
            return Err(HavenError::JobState(format!(
                "Cannot complete a {} job",
                self.state
            )));
        }
        Ok(ExportJobEvent::Completed {
            job_id: self.job_id,
            storage_location,
            artifact_sha256,
            record_count,
            occurred_at: now,
        })
    }

    pub fn fail(&self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<ExportJobEvent> {
        if self.state.is_terminal() {
            return Err(HavenError::JobState(format!(
                "Cannot fail a {} job",
                self.state
            )));
        }
        Ok(ExportJobEvent::Failed {
            job_id: self.job_id,
            reason: reason.into(),
            occurred_at: now,
        })
    }

    pub fn purge(&self, now: DateTime<Utc>) -> Result<ExportJobEvent> {
        if self.state != ExportJobState::Complete || self.purged {
            return Err(HavenError::JobState(format!(
                "Cannot purge job in state {} (purged: {})",
                self.state, self.purged
            )));
        }
        Ok(ExportJobEvent::Purged {
            job_id: self.job_id,
            occurred_at: now,
        })
    }

    fn stage_change(&self, to: ExportJobState, now: DateTime<Utc>) -> Result<ExportJobEvent> {
        if !valid_stage_transition(self.state, to) {
            return Err(HavenError::JobState(format!(
                "Illegal transition {} -> {to}",
                self.state
            )));
        }
        Ok(ExportJobEvent::StateChanged {
            job_id: self.job_id,
            from: self.state,
            to,
            occurred_at: now,
        })
    }
}

fn valid_stage_transition(from: ExportJobState, to: ExportJobState) -> bool {
    matches!(
        (from, to),
        (ExportJobState::Queued, ExportJobState::Materializing)
            | (ExportJobState::Materializing, ExportJobState::Validating)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::period::ExportPeriod;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn request() -> ExportRequest {
        ExportRequest {
            export_type: "HMIS_CSV".to_string(),
            period: ExportPeriod::between(
                NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
            )
            .unwrap(),
            project_ids: vec![],
            coc_code: "CA-600".to_string(),
            reason: "Annual submission".to_string(),
            hashed: true,
            consent_scopes: None,
            clearance: None,
        }
    }

    fn queued() -> (ExportJobAggregate, DateTime<Utc>) {
        let now = Utc::now();
        let event = ExportJobAggregate::queue(
            TenantId::generate(),
            request(),
            AccessContext::new(Uuid::new_v4(), "steward"),
            now,
        );
        (ExportJobAggregate::from_events(&[event]).unwrap(), now)
    }

    #[test]
    fn test_happy_path_fold() {
        let (mut job, now) = queued();
        assert_eq!(job.state, ExportJobState::Queued);

        job.apply(&job.begin_materialization(now).unwrap()).unwrap();
        assert_eq!(job.state, ExportJobState::Materializing);

        job.apply(&job.begin_validation(now).unwrap()).unwrap();
        assert_eq!(job.state, ExportJobState::Validating);

        job.apply(
            &job.complete("2024/09/loc.enc".to_string(), "ab".repeat(32), 42, now)
                .unwrap(),
        )
        .unwrap();
        assert_eq!(job.state, ExportJobState::Complete);
        assert_eq!(job.record_count, Some(42));
        assert_eq!(job.version, 4);
    }

    #[test]
    fn test_cannot_skip_materialization() {
        let (job, now) = queued();
        assert!(job.begin_validation(now).is_err());
    }

    #[test]
    fn test_failure_from_any_non_terminal_state() {
        let (mut job, now) = queued();
        job.apply(&job.begin_materialization(now).unwrap()).unwrap();
        job.apply(&job.fail("generation error", now).unwrap())
            .unwrap();
        assert_eq!(job.state, ExportJobState::Failed);
        assert_eq!(job.failure_reason.as_deref(), Some("generation error"));
    }

    #[test]
    fn test_terminal_state_is_final() {
        let (mut job, now) = queued();
        job.apply(&job.fail("denied", now).unwrap()).unwrap();
        assert!(job.fail("again", now).is_err());
        assert!(job.begin_materialization(now).is_err());
    }

    #[test]
    fn test_purge_only_after_complete() {
        let (mut job, now) = queued();
        assert!(job.purge(now).is_err());

        job.apply(&job.begin_materialization(now).unwrap()).unwrap();
        job.apply(&job.begin_validation(now).unwrap()).unwrap();
        job.apply(
            &job.complete("loc".to_string(), "hash".to_string(), 1, now)
                .unwrap(),
        )
        .unwrap();

        job.apply(&job.purge(now).unwrap()).unwrap();
        assert!(job.purged);
        assert_eq!(job.state, ExportJobState::Complete);
        // Purge is once only
        assert!(job.purge(now).is_err());
    }

    #[test]
    fn test_replay_equals_incremental_fold() {
        let (mut job, now) = queued();
        let mut events = vec![ExportJobEvent::Queued {
            job_id: job.job_id,
            tenant_id: job.tenant_id,
            request: job.request.clone(),
            requested_by: job.requested_by.clone(),
            occurred_at: job.queued_at,
        }];
        let e1 = job.begin_materialization(now).unwrap();
        job.apply(&e1).unwrap();
        events.push(e1);
        let e2 = job.fail("storage write failed", now).unwrap();
        job.apply(&e2).unwrap();
        events.push(e2);

        let replayed = ExportJobAggregate::from_events(&events).unwrap();
        assert_eq!(replayed.state, job.state);
        assert_eq!(replayed.version, job.version);
        assert_eq!(replayed.failure_reason, job.failure_reason);
    }

    #[test]
    fn test_wrong_job_event_rejected() {
        let (mut job, now) = queued();
        let foreign = ExportJobEvent::Failed {
            job_id: ExportJobId::generate(),
            reason: "other job".to_string(),
            occurred_at: now,
        };
        assert!(job.apply(&foreign).is_err());
    }
}
