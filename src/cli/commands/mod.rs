//! CLI command implementations
//!
//! This module contains all CLI command implementations plus the shared
//! wiring that turns a loaded [`HavenConfig`] into a running orchestrator.

pub mod export;
pub mod init;
pub mod purge;
pub mod status;
pub mod validate;

use crate::adapters::ledger::{ConsentLedgerClient, HttpConsentLedgerClient};
use crate::adapters::notify::{NotificationService, OutboxNotificationService};
use crate::adapters::source::JsonFileDataSource;
use crate::adapters::storage::{ArtifactStore, FileArtifactStore};
use crate::config::HavenConfig;
use crate::core::crypto::KmsEncryptionService;
use crate::core::generate::entities::CsvVersion;
use crate::core::generate::HudExportViewGenerator;
use crate::core::job::EventSourcedExportJobRepository;
use crate::core::orchestrate::{
    ExportJobOrchestrationService, OrchestratorDeps, OrchestratorSettings,
};
use crate::core::package::ExportPackagingService;
use crate::core::policy::sinks::JsonFileSink;
use crate::core::policy::ExportSecurityPolicyService;
use crate::domain::ids::TenantId;
use crate::domain::policy::{ConsentScope, ExportHashBehavior};
use crate::domain::tenant::TenantExportConfig;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

/// Builds the per-tenant policy configuration from the TOML tenant section.
fn tenant_export_config(config: &HavenConfig) -> anyhow::Result<TenantExportConfig> {
    let tenant_id = uuid::Uuid::parse_str(&config.tenant.tenant_id)
        .map(TenantId::of)
        .with_context(|| format!("Invalid tenant_id '{}'", config.tenant.tenant_id))?;

    let hash_behavior = match config.tenant.default_hash_behavior.as_str() {
        "always_hash" => ExportHashBehavior::AlwaysHash,
        "never_hash" => ExportHashBehavior::NeverHash,
        "consent_based" => ExportHashBehavior::ConsentBased,
        other => anyhow::bail!("Invalid default_hash_behavior '{other}'"),
    };

    let mut tenant =
        TenantExportConfig::default_for(tenant_id, config.tenant.organization_name.clone());
    tenant.hash_behavior = hash_behavior;
    tenant.required_scopes_for_unhashed =
        [ConsentScope::PiiDisclosure, ConsentScope::HudReporting]
            .into_iter()
            .collect();
    tenant.clearance_validity_hours = config.tenant.clearance_validity_hours;
    tenant.notification_recipients = config.notification.recipients.iter().cloned().collect();
    Ok(tenant)
}

/// Wires the full pipeline from configuration.
///
/// The repository is returned alongside the orchestrator so read-only
/// commands (status) can inspect job state without driving anything.
pub(crate) async fn build_orchestrator(
    config: &HavenConfig,
    source_dir: &str,
) -> anyhow::Result<(
    ExportJobOrchestrationService,
    Arc<EventSourcedExportJobRepository>,
)> {
    let csv_version = CsvVersion::parse(&config.pipeline.csv_version).ok_or_else(|| {
        anyhow::anyhow!("Unsupported csv_version '{}'", config.pipeline.csv_version)
    })?;

    let tenant = tenant_export_config(config)?;

    let repository = Arc::new(
        EventSourcedExportJobRepository::open(&config.storage.event_dir)
            .await
            .context("Failed to open job event log")?,
    );

    let audit_dir = Path::new(&config.logging.audit_path);
    let policy = Arc::new(ExportSecurityPolicyService::new(
        Arc::new(JsonFileSink::new(audit_dir.join("policy-audit.jsonl"))),
        Arc::new(JsonFileSink::new(audit_dir.join("security-monitoring.jsonl"))),
    ));

    let source = Arc::new(JsonFileDataSource::new(source_dir));
    let generator = Arc::new(HudExportViewGenerator::new(source, csv_version));

    let packaging = Arc::new(
        ExportPackagingService::new(&config.kms.signing_key, csv_version)
            .context("Failed to initialize bundle signing")?,
    );
    let crypto = Arc::new(
        KmsEncryptionService::from_config(&config.kms)
            .context("Failed to initialize envelope encryption")?,
    );

    let store: Arc<dyn ArtifactStore> =
        Arc::new(FileArtifactStore::new(&config.storage.artifact_dir));
    let ledger: Arc<dyn ConsentLedgerClient> = Arc::new(
        HttpConsentLedgerClient::from_config(&config.ledger)
            .context("Failed to initialize consent ledger client")?,
    );
    let notifier: Arc<dyn NotificationService> = Arc::new(OutboxNotificationService::new(
        &config.notification.outbox_dir,
        config.notification.enabled,
    ));

    let settings = OrchestratorSettings {
        materialization_slots: config.pipeline.materialization_slots,
        validation_slots: config.pipeline.validation_slots,
        future_tolerance_days: config.pipeline.future_tolerance_days,
        retention_days: config.storage.retention_days,
        dry_run: config.application.dry_run,
        state_dir: config.storage.state_dir.clone().into(),
        extra_recipients: Vec::new(),
    };

    let deps = OrchestratorDeps {
        repository: Arc::clone(&repository),
        policy,
        generator,
        packaging,
        crypto,
        store,
        ledger,
        notifier,
    };

    Ok((
        ExportJobOrchestrationService::new(tenant, settings, deps),
        repository,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret::secret_string;
    use crate::config::{
        ApplicationConfig, Environment, KmsConfig, LedgerConfig, LoggingConfig,
        NotificationConfig, PipelineConfig, StorageConfig, TenantConfig,
    };

    fn config() -> HavenConfig {
        HavenConfig {
            application: ApplicationConfig::default(),
            environment: Environment::Development,
            tenant: TenantConfig {
                tenant_id: "4b4b8f9e-3fb2-4a70-9c9d-0f6a2f1f2a10".to_string(),
                organization_name: "Harbor Light CoC".to_string(),
                coc_code: "CA-600".to_string(),
                default_hash_behavior: "consent_based".to_string(),
                clearance_validity_hours: 48,
            },
            pipeline: PipelineConfig::default(),
            storage: StorageConfig {
                artifact_dir: "./artifacts".to_string(),
                event_dir: "./events".to_string(),
                state_dir: "./state".to_string(),
                retention_days: 90,
            },
            kms: KmsConfig {
                current_generation: 1,
                master_key: secret_string("ab".repeat(32)),
                previous_key: None,
                signing_key: secret_string("cd".repeat(32)),
            },
            ledger: LedgerConfig {
                enabled: false,
                ..LedgerConfig::default()
            },
            notification: NotificationConfig {
                enabled: true,
                recipients: vec!["admin@example.org".to_string()],
                outbox_dir: "./outbox".to_string(),
            },
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_tenant_export_config_maps_behavior() {
        let tenant = tenant_export_config(&config()).unwrap();
        assert_eq!(tenant.hash_behavior, ExportHashBehavior::ConsentBased);
        assert_eq!(tenant.clearance_validity_hours, 48);
        assert!(tenant
            .notification_recipients
            .contains("admin@example.org"));
    }

    #[test]
    fn test_tenant_export_config_rejects_bad_uuid() {
        let mut bad = config();
        bad.tenant.tenant_id = "nope".to_string();
        assert!(tenant_export_config(&bad).is_err());
    }
}
