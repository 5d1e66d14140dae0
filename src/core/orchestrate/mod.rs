//! Export job orchestration
//!
//! Sequences the whole pipeline for one job: policy gate before the job
//! exists, then materialize, validate, package, encrypt, store, ledger,
//! notify, audit metadata, COMPLETE. Any step failure transitions the job
//! to FAILED with a recorded reason and halts the remaining steps; no
//! compensating rollback is attempted. Ledger and notification failures
//! after the artifact is stored are the exception: the artifact is not
//! wrong, only the bookkeeping call missed, so they are logged for
//! reconciliation and the job still completes.

pub mod audit;

pub use audit::ExportAuditMetadata;

use crate::adapters::ledger::{ConsentLedgerClient, ConsentLedgerEntry};
use crate::adapters::notify::{ExportNotification, NotificationService};
use crate::adapters::storage::ArtifactStore;
use crate::core::crypto::KmsEncryptionService;
use crate::core::generate::{GeneratedViews, HudExportViewGenerator};
use crate::core::job::{EventSourcedExportJobRepository, ExportJobAggregate};
use crate::core::package::{ExportPackagingService, PackagedArtifact};
use crate::core::policy::ExportSecurityPolicyService;
use crate::core::validate::logger::{ValidationLogger, ValidationSummary};
use crate::core::validate::picklists::PicklistRegistry;
use crate::core::validate::row::RowValidator;
use crate::domain::ids::ExportJobId;
use crate::domain::request::{AccessContext, ExportRequest};
use crate::domain::result::Result;
use crate::domain::tenant::TenantExportConfig;
use crate::domain::HavenError;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Everything the orchestrator drives, bundled to keep construction sane
pub struct OrchestratorDeps {
    pub repository: Arc<EventSourcedExportJobRepository>,
    pub policy: Arc<ExportSecurityPolicyService>,
    pub generator: Arc<HudExportViewGenerator>,
    pub packaging: Arc<ExportPackagingService>,
    pub crypto: Arc<KmsEncryptionService>,
    pub store: Arc<dyn ArtifactStore>,
    pub ledger: Arc<dyn ConsentLedgerClient>,
    pub notifier: Arc<dyn NotificationService>,
}

/// Orchestrator tuning taken from configuration
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub materialization_slots: usize,
    pub validation_slots: usize,
    pub future_tolerance_days: i64,
    pub retention_days: u32,
    pub dry_run: bool,
    pub state_dir: PathBuf,
    /// Recipients in addition to the tenant's configured set
    pub extra_recipients: Vec<String>,
}

/// Drives export jobs through their full lifecycle
pub struct ExportJobOrchestrationService {
    tenant: TenantExportConfig,
    settings: OrchestratorSettings,
    deps: OrchestratorDeps,
    picklists: PicklistRegistry,
    materialization_pool: Arc<Semaphore>,
    validation_pool: Arc<Semaphore>,
}

impl ExportJobOrchestrationService {
    pub fn new(
        tenant: TenantExportConfig,
        settings: OrchestratorSettings,
        deps: OrchestratorDeps,
    ) -> Self {
        let materialization_pool = Arc::new(Semaphore::new(settings.materialization_slots));
        let validation_pool = Arc::new(Semaphore::new(settings.validation_slots));
        Self {
            tenant,
            settings,
            deps,
            picklists: PicklistRegistry::fy2024(),
            materialization_pool,
            validation_pool,
        }
    }

    /// Accepts a request: policy gate first, queue only if permitted.
    ///
    /// A denial fails fast with a [`HavenError::Policy`] carrying the
    /// stable error code; no job is created for denied requests.
    pub async fn submit(
        &self,
        request: ExportRequest,
        context: AccessContext,
    ) -> Result<ExportJobId> {
        let now = Utc::now();
        let decision = self
            .deps
            .policy
            .evaluate(&self.tenant, &request, &context, now)
            .await?;

        if !decision.permitted {
            let code = decision.error_code.ok_or_else(|| {
                HavenError::Other("Denied decision without error code".to_string())
            })?;
            return Err(crate::domain::errors::PolicyViolation::new(code, decision.reason)
                .with_metadata(decision.metadata)
                .into());
        }

        let event = ExportJobAggregate::queue(self.tenant.tenant_id, request, context, now);
        let job = self.deps.repository.append(&event).await?;
        tracing::info!(job_id = %job.job_id, "Export job queued");
        Ok(job.job_id)
    }

    /// Claims and drives the next queued job, if any.
    pub async fn run_next(&self) -> Result<Option<ExportJobId>> {
        let queued = self.deps.repository.queued().await;
        for job_id in queued {
            if !self.deps.repository.claim(job_id).await {
                continue;
            }
            let outcome = self.drive(job_id).await;
            self.deps.repository.release(job_id).await;
            outcome?;
            return Ok(Some(job_id));
        }
        Ok(None)
    }

    /// Drives one claimed job to COMPLETE or FAILED.
    ///
    /// Pipeline-step failures are recorded as the job's terminal state; an
    /// `Err` from this method means the event log itself could not be
    /// advanced.
    async fn drive(&self, job_id: ExportJobId) -> Result<()> {
        let job = self
            .deps
            .repository
            .get(job_id)
            .await
            .ok_or_else(|| HavenError::JobState(format!("Unknown job {job_id}")))?;

        // Materialize
        let job = self
            .deps
            .repository
            .append(&job.begin_materialization(Utc::now())?)
            .await?;
        let views = match self.materialize(&job).await {
            Ok(views) => views,
            Err(e) => {
                return self
                    .fail(&job, format!("Materialization failed: {e}"), None)
                    .await
            }
        };

        // Validate
        let job = self
            .deps
            .repository
            .append(&job.begin_validation(Utc::now())?)
            .await?;
        let summary = match self.validate(&job, &views).await {
            Ok(summary) => summary,
            Err(e) => {
                return self
                    .fail(&job, format!("Validation failed to run: {e}"), None)
                    .await
            }
        };
        // One ERROR fails the job, unconditionally
        if summary.has_errors() {
            let reason = HavenError::ValidationFailed {
                error_count: summary.error_count as usize,
                summary: summary.describe(),
            };
            return self.fail(&job, reason.to_string(), Some(summary)).await;
        }

        // Package
        let artifact = match self.deps.packaging.package(
            job.job_id,
            &views,
            &job.request.period,
            &job.request.coc_code,
            job.request.hashed,
        ) {
            Ok(artifact) => artifact,
            Err(e) => return self.fail(&job, e.to_string(), Some(summary)).await,
        };

        if self.settings.dry_run {
            tracing::info!(
                job_id = %job.job_id,
                bundle_bytes = artifact.bytes.len(),
                "Dry run: skipping encrypt/store/ledger"
            );
            let event = job.complete(
                "DRY-RUN".to_string(),
                artifact.sha256_hex.clone(),
                views.total_rows() as u64,
                Utc::now(),
            )?;
            self.deps.repository.append(&event).await?;
            return Ok(());
        }

        // Encrypt; key trouble is job-fatal, never a fallback to plaintext
        let bundle = match self.deps.crypto.encrypt(&artifact.bytes, job.job_id) {
            Ok(bundle) => bundle,
            Err(e) => {
                return self
                    .fail(&job, HavenError::Crypto(e).to_string(), Some(summary))
                    .await
            }
        };

        // Store
        let stored_at = Utc::now();
        let location = match self
            .deps
            .store
            .store(job.job_id, stored_at, &bundle.to_storage_format())
            .await
        {
            Ok(location) => location,
            Err(e) => {
                return self
                    .fail(&job, HavenError::Storage(e).to_string(), Some(summary))
                    .await
            }
        };

        let retention_expires_at =
            stored_at + Duration::days(i64::from(self.settings.retention_days));

        // Ledger; job-non-fatal once the artifact is safely stored
        let ledger_entry_id = match self
            .deps
            .ledger
            .record(&self.ledger_entry(
                &job,
                &views,
                &artifact,
                &location,
                retention_expires_at,
            ))
            .await
        {
            Ok(entry_id) => Some(entry_id),
            Err(e) => {
                tracing::warn!(
                    job_id = %job.job_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Consent ledger entry failed; flagged for reconciliation"
                );
                None
            }
        };

        // Notify; also job-non-fatal
        let notification = self.notification(
            &job,
            &summary,
            views.subject_count(),
            Some(retention_expires_at),
            ledger_entry_id.clone(),
            None,
        );
        if let Err(e) = self.deps.notifier.send(&notification).await {
            tracing::warn!(job_id = %job.job_id, error = %e, "Completion notification failed");
        }

        // Audit metadata must be durable before the job is marked COMPLETE
        let metadata = ExportAuditMetadata {
            job_id: job.job_id,
            user_id: job.requested_by.user_id,
            user_name: job.requested_by.user_name.clone(),
            ip_address: job.requested_by.ip_address.clone(),
            session_id: job.requested_by.session_id.clone(),
            period_start: job.request.period.start().to_string(),
            period_end: job.request.period.end().to_string(),
            artifact_sha256: artifact.sha256_hex.clone(),
            storage_location: location.clone(),
            record_count: views.total_rows() as u64,
            validation_warnings: summary.warning_count,
            retention_expires_at,
            ledger_entry_id,
            completed_at: Utc::now(),
        };
        if let Err(e) = metadata.persist(&self.settings.state_dir).await {
            return self
                .fail(&job, format!("Audit metadata write failed: {e}"), Some(summary))
                .await;
        }

        let event = job.complete(
            location,
            artifact.sha256_hex,
            views.total_rows() as u64,
            Utc::now(),
        )?;
        self.deps.repository.append(&event).await?;
        tracing::info!(job_id = %job.job_id, "Export job complete");
        Ok(())
    }

    /// Purges stored artifacts whose retention window has lapsed; each
    /// purge appends a marker event, the history itself is never erased.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<ExportJobId>> {
        let cutoff = now - Duration::days(i64::from(self.settings.retention_days));
        let candidates = self.deps.repository.purge_candidates(cutoff).await;

        let mut purged = Vec::new();
        for job in candidates {
            if let Some(location) = &job.storage_location {
                match self.deps.store.purge(location).await {
                    Ok(()) => {}
                    // Already gone is fine; the marker still needs appending
                    Err(crate::domain::errors::StorageError::NotFound(_)) => {}
                    Err(e) => {
                        tracing::warn!(job_id = %job.job_id, error = %e, "Artifact purge failed");
                        continue;
                    }
                }
            }
            self.deps.repository.append(&job.purge(now)?).await?;
            purged.push(job.job_id);
        }

        if !purged.is_empty() {
            tracing::info!(count = purged.len(), "Retention purge complete");
        }
        Ok(purged)
    }

    async fn materialize(&self, job: &ExportJobAggregate) -> Result<GeneratedViews> {
        let _slot = self
            .materialization_pool
            .acquire()
            .await
            .map_err(|e| HavenError::Other(format!("Materialization pool closed: {e}")))?;
        self.deps
            .generator
            .generate(
                &job.request.period,
                &job.request.project_ids,
                &job.request.coc_code,
                job.request.hashed,
            )
            .await
    }

    async fn validate(
        &self,
        job: &ExportJobAggregate,
        views: &GeneratedViews,
    ) -> Result<ValidationSummary> {
        let _slot = self
            .validation_pool
            .acquire()
            .await
            .map_err(|e| HavenError::Other(format!("Validation pool closed: {e}")))?;

        let validator = RowValidator::new(
            job.request.period,
            Utc::now().date_naive(),
            self.settings.future_tolerance_days,
            self.picklists.clone(),
        );
        let mut logger = ValidationLogger::new(job.job_id);
        for section in &views.sections {
            for row in &section.rows {
                logger.log_batch(validator.validate_row(row));
            }
        }
        logger.log_summary();
        Ok(logger.summary())
    }

    async fn fail(
        &self,
        job: &ExportJobAggregate,
        reason: String,
        summary: Option<ValidationSummary>,
    ) -> Result<()> {
        tracing::error!(job_id = %job.job_id, reason = %reason, "Export job failed");
        let failed = self.deps.repository.append(&job.fail(reason.clone(), Utc::now())?).await?;

        let summary = summary.unwrap_or_else(|| ValidationLogger::new(failed.job_id).summary());
        let notification = self.notification(
            &failed,
            &summary,
            0,
            None,
            None,
            Some(reason),
        );
        if let Err(e) = self.deps.notifier.send(&notification).await {
            tracing::warn!(job_id = %failed.job_id, error = %e, "Failure notification failed");
        }
        Ok(())
    }

    fn ledger_entry(
        &self,
        job: &ExportJobAggregate,
        views: &GeneratedViews,
        artifact: &PackagedArtifact,
        location: &str,
        retention_expires_at: DateTime<Utc>,
    ) -> ConsentLedgerEntry {
        ConsentLedgerEntry {
            job_id: job.job_id,
            organization_name: self.tenant.organization_name.clone(),
            coc_code: job.request.coc_code.clone(),
            hashed_subject_ids: views.hashed_subject_keys.clone(),
            subject_count: views.subject_count(),
            consent_scopes: job.request.scopes().iter().map(|s| s.to_string()).collect(),
            hashed: job.request.hashed,
            period_start: job.request.period.start().to_string(),
            period_end: job.request.period.end().to_string(),
            requested_by: job.requested_by.user_name.clone(),
            storage_location: location.to_string(),
            artifact_sha256: artifact.sha256_hex.clone(),
            vawa_suppressed_count: views.suppressed_count,
            retention_expires_at,
        }
    }

    fn notification(
        &self,
        job: &ExportJobAggregate,
        summary: &ValidationSummary,
        subject_count: u64,
        retention_expires_at: Option<DateTime<Utc>>,
        ledger_entry_id: Option<String>,
        failure_reason: Option<String>,
    ) -> ExportNotification {
        let mut recipients: Vec<String> =
            self.tenant.notification_recipients.iter().cloned().collect();
        recipients.extend(self.settings.extra_recipients.iter().cloned());

        ExportNotification {
            job_id: job.job_id,
            organization_name: self.tenant.organization_name.clone(),
            recipients,
            outcome: if failure_reason.is_some() {
                "FAILED".to_string()
            } else {
                "COMPLETE".to_string()
            },
            period_start: job.request.period.start().to_string(),
            period_end: job.request.period.end().to_string(),
            validation_errors: summary.error_count,
            validation_warnings: summary.warning_count,
            subject_count,
            retention_expires_at,
            ledger_entry_id,
            failure_reason,
            sent_at: Utc::now(),
        }
    }
}
