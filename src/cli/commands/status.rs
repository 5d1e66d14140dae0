//! Status command implementation
//!
//! This module implements the `status` command for displaying export job
//! states from the event log.

use crate::config::load_config;
use crate::core::job::{EventSourcedExportJobRepository, ExportJobState};
use crate::core::orchestrate::ExportAuditMetadata;
use crate::domain::ids::ExportJobId;
use clap::Args;
use std::path::Path;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show only this job (UUID)
    #[arg(long)]
    pub job_id: Option<ExportJobId>,

    /// Filter by job state (QUEUED, MATERIALIZING, VALIDATING, COMPLETE, FAILED)
    #[arg(long)]
    pub state: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking export job status");

        println!("📊 Export Job Status");
        println!();

        // Load configuration
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        // Open the event log read-only (replay only, no claims taken)
        let repository =
            match EventSourcedExportJobRepository::open(&config.storage.event_dir).await {
                Ok(r) => r,
                Err(e) => {
                    println!("❌ Failed to open job event log");
                    println!("   Error: {e}");
                    return Ok(5); // Fatal error exit code
                }
            };

        let jobs = repository.jobs().await;
        if jobs.is_empty() {
            println!("No export history found.");
            println!("Run 'haven export' to start an export.");
            return Ok(0);
        }

        // Apply filters
        let filtered: Vec<_> = jobs
            .iter()
            .filter(|j| {
                if let Some(id) = self.job_id {
                    if j.job_id != id {
                        return false;
                    }
                }
                if let Some(ref state) = self.state {
                    if !j.state.as_str().eq_ignore_ascii_case(state) {
                        return false;
                    }
                }
                true
            })
            .collect();

        if filtered.is_empty() {
            println!("No jobs match the specified filters.");
            return Ok(0);
        }

        println!("Found {} job(s):", filtered.len());
        println!();
        println!(
            "{:<38} {:<16} {:<10} {:<8} {:<20}",
            "Job ID", "State", "Records", "Purged", "Last Update"
        );
        println!("{}", "-".repeat(96));

        for job in &filtered {
            let state = match job.state {
                ExportJobState::Complete => "✅ Complete",
                ExportJobState::Failed => "❌ Failed",
                ExportJobState::Queued => "⏸️  Queued",
                ExportJobState::Materializing => "🔄 Materializing",
                ExportJobState::Validating => "🔄 Validating",
            };

            println!(
                "{:<38} {:<16} {:<10} {:<8} {:<20}",
                job.job_id.to_string(),
                state,
                job.record_count.map_or("-".to_string(), |c| c.to_string()),
                if job.purged { "yes" } else { "no" },
                job.updated_at.format("%Y-%m-%d %H:%M:%S").to_string()
            );

            if let Some(reason) = &job.failure_reason {
                println!("    Failure: {reason}");
            }
        }

        // Detailed audit metadata for a single-job query
        if let Some(job_id) = self.job_id {
            let state_dir = Path::new(&config.storage.state_dir);
            if let Ok(metadata) = ExportAuditMetadata::load(state_dir, job_id).await {
                println!();
                println!("Audit Metadata:");
                println!("  Requested By: {}", metadata.user_name);
                println!(
                    "  Period: {} to {}",
                    metadata.period_start, metadata.period_end
                );
                println!("  Artifact: {}", metadata.storage_location);
                println!("  Bundle SHA-256: {}", metadata.artifact_sha256);
                println!(
                    "  Validation Warnings: {}",
                    metadata.validation_warnings
                );
                println!(
                    "  Retention Expires: {}",
                    metadata.retention_expires_at.format("%Y-%m-%d")
                );
                println!(
                    "  Ledger Entry: {}",
                    metadata.ledger_entry_id.as_deref().unwrap_or("none")
                );
            }
        }

        println!();
        Ok(0)
    }
}
