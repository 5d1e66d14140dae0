//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Haven configuration file.

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Load configuration
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        // Validate configuration
        match config.validate() {
            Ok(_) => {
                println!("✅ Configuration is valid");
                println!();
                println!("Configuration Summary:");
                println!("  Organization: {}", config.tenant.organization_name);
                println!("  CoC Code: {}", config.tenant.coc_code);
                println!(
                    "  Hash Behavior: {}",
                    config.tenant.default_hash_behavior
                );
                println!(
                    "  Clearance Validity: {}h",
                    config.tenant.clearance_validity_hours
                );
                println!("  CSV Version: {}", config.pipeline.csv_version);
                println!(
                    "  Materialization Slots: {}",
                    config.pipeline.materialization_slots
                );
                println!("  Validation Slots: {}", config.pipeline.validation_slots);
                println!("  Artifact Dir: {}", config.storage.artifact_dir);
                println!("  Event Dir: {}", config.storage.event_dir);
                println!("  Retention: {} days", config.storage.retention_days);
                println!("  Key Generation: {}", config.kms.current_generation);
                println!(
                    "  Previous Key Present: {}",
                    config.kms.previous_key.is_some()
                );
                if config.ledger.enabled {
                    println!("  Consent Ledger: {}", config.ledger.base_url);
                } else {
                    println!("  Consent Ledger: disabled");
                }
                println!(
                    "  Notifications: {}",
                    if config.notification.enabled {
                        "enabled"
                    } else {
                        "disabled"
                    }
                );
                println!("  Log Level: {}", config.application.log_level);
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(2) // Configuration error exit code
            }
        }
    }
}
