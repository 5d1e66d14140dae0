//! Export command implementation
//!
//! This module implements the `export` command: submit one export request
//! through the policy gate and drive the resulting job to completion.

use crate::cli::commands::build_orchestrator;
use crate::config::load_config;
use crate::core::job::ExportJobState;
use crate::core::orchestrate::ExportAuditMetadata;
use crate::domain::ids::ProjectId;
use crate::domain::period::ExportPeriod;
use crate::domain::policy::{ConsentScope, SecurityClearance};
use crate::domain::request::{AccessContext, ExportRequest};
use crate::domain::HavenError;
use chrono::NaiveDate;
use clap::Args;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::sync::watch;
use uuid::Uuid;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Directory holding the operational source data (JSON files)
    #[arg(long)]
    pub source: String,

    /// Reporting period start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Reporting period end date (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// Project ID(s) to scope the export (comma-separated UUIDs)
    #[arg(long)]
    pub project_id: Option<String>,

    /// Request an unhashed export (policy-gated; default is hashed)
    #[arg(long)]
    pub unhashed: bool,

    /// Consent scope(s) supplied with an unhashed request (comma-separated,
    /// e.g. PII_DISCLOSURE,HUD_REPORTING)
    #[arg(long)]
    pub scope: Option<String>,

    /// Path to a JSON security clearance file for an unhashed request
    #[arg(long)]
    pub clearance_file: Option<String>,

    /// Justification recorded in the audit trail
    #[arg(long, default_value = "Scheduled HUD CSV submission")]
    pub reason: String,

    /// User name of the requester
    #[arg(long)]
    pub requested_by: String,

    /// Dry run mode - evaluate policy and validate, but write no artifacts
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt for unhashed exports
    #[arg(short, long)]
    pub yes: bool,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        // Load configuration
        let mut config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        // Apply dry-run flag from CLI
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        // Validate configuration
        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2); // Configuration error exit code
        }

        // Assemble the request
        let period = match ExportPeriod::between(self.start, self.end) {
            Ok(period) => period,
            Err(e) => {
                eprintln!("Invalid reporting period: {e}");
                return Ok(2);
            }
        };

        let project_ids = match self.parse_project_ids() {
            Ok(ids) => ids,
            Err(e) => {
                eprintln!("{e}");
                return Ok(2);
            }
        };

        let consent_scopes = match self.parse_scopes() {
            Ok(scopes) => scopes,
            Err(e) => {
                eprintln!("{e}");
                return Ok(2);
            }
        };

        let clearance = match self.load_clearance() {
            Ok(clearance) => clearance,
            Err(e) => {
                eprintln!("{e}");
                return Ok(2);
            }
        };

        if config.application.dry_run {
            println!("🔍 DRY RUN MODE - No artifact will be written");
            println!();
        }

        // Unhashed exports disclose direct identifiers; confirm first
        if self.unhashed && !self.yes && !config.application.dry_run {
            println!("Unhashed export requested:");
            println!("  Organization: {}", config.tenant.organization_name);
            println!("  CoC: {}", config.tenant.coc_code);
            println!("  Period: {} to {}", self.start, self.end);
            println!();
            print!("Direct identifiers will NOT be hashed. Proceed? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Export cancelled.");
                return Ok(0);
            }
        }

        let request = ExportRequest {
            export_type: "HMIS_CSV".to_string(),
            period,
            project_ids,
            coc_code: config.tenant.coc_code.clone(),
            reason: self.reason.clone(),
            hashed: !self.unhashed,
            consent_scopes,
            clearance,
        };
        let context = AccessContext::new(Uuid::new_v4(), self.requested_by.clone())
            .with_roles(vec!["DATA_STEWARD".to_string()])
            .with_network("127.0.0.1", Uuid::new_v4().to_string(), "haven-cli");

        // Wire the pipeline
        let state_dir = config.storage.state_dir.clone();
        let (orchestrator, repository) = match build_orchestrator(&config, &self.source).await {
            Ok(wired) => wired,
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize export pipeline");
                eprintln!("Failed to initialize export pipeline: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        // Submit through the policy gate
        println!("🚀 Submitting export request...");
        let job_id = match orchestrator.submit(request, context).await {
            Ok(job_id) => job_id,
            Err(HavenError::Policy(violation)) => {
                tracing::warn!(code = %violation.code, "Export request denied by policy");
                println!();
                println!("❌ Export denied by security policy");
                println!("   Code: {}", violation.code);
                println!("   Reason: {}", violation.reason);
                return Ok(3); // Policy denial exit code
            }
            Err(e) => {
                tracing::error!(error = %e, "Export submission failed");
                eprintln!("Export submission failed: {e}");
                return Ok(5);
            }
        };
        println!("✅ Policy check passed, job queued: {job_id}");

        if *shutdown_signal.borrow() {
            println!("⚠️  Shutdown requested before the job ran; it stays queued.");
            return Ok(0);
        }

        // Drive the job
        println!("📦 Running export job...");
        println!();
        if let Err(e) = orchestrator.run_next().await {
            tracing::error!(error = %e, "Export job could not be driven");
            eprintln!("Export failed: {e}");
            return Ok(5);
        }

        // Report the terminal state
        let job = repository
            .get(job_id)
            .await
            .ok_or_else(|| anyhow::anyhow!("Job {job_id} vanished from the event log"))?;

        match job.state {
            ExportJobState::Complete => {
                println!("📊 Export Summary:");
                println!("  Job: {job_id}");
                println!("  Records: {}", job.record_count.unwrap_or(0));
                if let Some(location) = &job.storage_location {
                    println!("  Artifact: {location}");
                }
                if let Some(sha256) = &job.artifact_sha256 {
                    println!("  Bundle SHA-256: {sha256}");
                }
                if let Ok(metadata) =
                    ExportAuditMetadata::load(Path::new(&state_dir), job_id).await
                {
                    println!(
                        "  Retention expires: {}",
                        metadata.retention_expires_at.format("%Y-%m-%d")
                    );
                    if let Some(entry_id) = &metadata.ledger_entry_id {
                        println!("  Ledger entry: {entry_id}");
                    }
                }
                println!();
                println!("✅ Export completed successfully!");
                Ok(0)
            }
            ExportJobState::Failed => {
                println!("❌ Export job failed");
                if let Some(reason) = &job.failure_reason {
                    println!("   Reason: {reason}");
                }
                Ok(1) // Job failure exit code
            }
            other => {
                // run_next returned without an error, so this is a bug
                eprintln!("Job ended in unexpected state {other}");
                Ok(5)
            }
        }
    }

    fn parse_project_ids(&self) -> Result<Vec<ProjectId>, String> {
        let Some(raw) = &self.project_id else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(|s| s.trim().parse::<ProjectId>())
            .collect()
    }

    fn parse_scopes(&self) -> Result<Option<BTreeSet<ConsentScope>>, String> {
        let Some(raw) = &self.scope else {
            return Ok(None);
        };
        let mut scopes = BTreeSet::new();
        for name in raw.split(',') {
            let scope = match name.trim().to_uppercase().as_str() {
                "PII_DISCLOSURE" => ConsentScope::PiiDisclosure,
                "HUD_REPORTING" => ConsentScope::HudReporting,
                "COORDINATED_ENTRY" => ConsentScope::CoordinatedEntry,
                "AGGREGATE_REPORTING" => ConsentScope::AggregateReporting,
                other => {
                    return Err(format!(
                        "Unknown consent scope '{other}'. Valid scopes: PII_DISCLOSURE, \
                         HUD_REPORTING, COORDINATED_ENTRY, AGGREGATE_REPORTING"
                    ))
                }
            };
            scopes.insert(scope);
        }
        Ok(Some(scopes))
    }

    fn load_clearance(&self) -> Result<Option<SecurityClearance>, String> {
        let Some(path) = &self.clearance_file else {
            return Ok(None);
        };
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read clearance file {path}: {e}"))?;
        let clearance: SecurityClearance = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse clearance file {path}: {e}"))?;
        Ok(Some(clearance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ExportArgs {
        ExportArgs {
            source: "./fixtures".to_string(),
            start: NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
            project_id: None,
            unhashed: false,
            scope: None,
            clearance_file: None,
            reason: "Annual submission".to_string(),
            requested_by: "steward".to_string(),
            dry_run: false,
            yes: false,
        }
    }

    #[test]
    fn test_parse_project_ids_empty() {
        assert!(args().parse_project_ids().unwrap().is_empty());
    }

    #[test]
    fn test_parse_project_ids_comma_separated() {
        let mut a = args();
        a.project_id = Some(format!(
            "{}, {}",
            Uuid::new_v4(),
            Uuid::new_v4()
        ));
        assert_eq!(a.parse_project_ids().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_project_ids_rejects_garbage() {
        let mut a = args();
        a.project_id = Some("not-a-uuid".to_string());
        assert!(a.parse_project_ids().is_err());
    }

    #[test]
    fn test_parse_scopes() {
        let mut a = args();
        a.scope = Some("pii_disclosure,HUD_REPORTING".to_string());
        let scopes = a.parse_scopes().unwrap().unwrap();
        assert!(scopes.contains(&ConsentScope::PiiDisclosure));
        assert!(scopes.contains(&ConsentScope::HudReporting));
    }

    #[test]
    fn test_parse_scopes_unknown_rejected() {
        let mut a = args();
        a.scope = Some("EVERYTHING".to_string());
        assert!(a.parse_scopes().is_err());
    }
}
