//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "haven.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Haven configuration");
        println!();

        // Check if file already exists
        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        // Generate configuration content
        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        // Write to file
        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your tenant settings", self.output);
                println!("  2. Create a .env file with your key material:");
                println!("     - Set HAVEN_KMS_MASTER_KEY (64 hex chars)");
                println!("     - Set HAVEN_KMS_SIGNING_KEY (64 hex chars)");
                println!("     - Set HAVEN_LEDGER_API_KEY (if the ledger is enabled)");
                println!("  3. Validate configuration: haven validate-config");
                println!("  4. Run an export: haven export --source ./data \\");
                println!("       --start 2023-10-01 --end 2024-09-30 --requested-by you");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Haven Configuration File
# HUD HMIS CSV Export Pipeline

# Runtime environment: development | staging | production
environment = "development"

[application]
log_level = "info"
dry_run = false

[tenant]
tenant_id = "00000000-0000-0000-0000-000000000000"
organization_name = "Example CoC"
coc_code = "XX-500"

# always_hash | never_hash | consent_based
default_hash_behavior = "always_hash"
clearance_validity_hours = 24

[pipeline]
materialization_slots = 4
validation_slots = 4
future_tolerance_days = 30
csv_version = "FY2024"

[storage]
artifact_dir = "/var/lib/haven/artifacts"
event_dir = "/var/lib/haven/events"
state_dir = "/var/lib/haven/state"
retention_days = 90

[kms]
current_generation = 1
master_key = "${HAVEN_KMS_MASTER_KEY}"
signing_key = "${HAVEN_KMS_SIGNING_KEY}"

[ledger]
enabled = true
base_url = "https://consent-ledger.example.org"
api_key = "${HAVEN_LEDGER_API_KEY}"

[notification]
enabled = true
recipients = ["hmis-admin@example.org"]
outbox_dir = "/var/lib/haven/outbox"

[logging]
local_enabled = true
local_path = "/var/log/haven"
audit_path = "/var/lib/haven/audit"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Haven Configuration File
# HUD HMIS CSV Export Pipeline
#
# This file contains all configuration options with examples and explanations.
#
# Secrets (key material, ledger API key) should come from environment
# variables via ${VAR} substitution, never be written into this file.

# Runtime environment: development | staging | production
# Production enforces stricter key-rotation checks.
environment = "development"

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Dry run mode (evaluate policy and validate, but write no artifacts)
dry_run = false

# ============================================================================
# Tenant Identity and Policy Defaults
# ============================================================================
[tenant]
# Tenant UUID issued by the platform
tenant_id = "00000000-0000-0000-0000-000000000000"

# Continuum of Care organization name
organization_name = "Example CoC"

# Continuum of Care code
coc_code = "XX-500"

# Hash behavior for exports:
# - always_hash:   direct identifiers are always hashed; unhashed prohibited
# - never_hash:    unhashed exports permitted without consent or clearance
# - consent_based: unhashed requires consent scopes plus a valid clearance
default_hash_behavior = "always_hash"

# Hours a newly issued security clearance remains valid (1-168)
clearance_validity_hours = 24

# ============================================================================
# Pipeline Settings
# ============================================================================
[pipeline]
# Concurrent materialization slots (1-64)
materialization_slots = 4

# Concurrent validation slots (1-64)
validation_slots = 4

# Days past today an entry date may fall before it is rejected (0-365)
future_tolerance_days = 30

# HUD CSV specification version: FY2022 | FY2024
csv_version = "FY2024"

# ============================================================================
# Storage
# ============================================================================
[storage]
# Directory for encrypted export archives (<yyyy>/<mm>/<job-id>.enc)
artifact_dir = "/var/lib/haven/artifacts"

# Directory for the append-only job event log
event_dir = "/var/lib/haven/events"

# Directory for audit metadata snapshots
state_dir = "/var/lib/haven/state"

# Days an encrypted artifact is retained before purge (1-3650)
retention_days = 90

# ============================================================================
# Envelope Encryption
# ============================================================================
[kms]
# Current master key generation number
current_generation = 1

# Hex-encoded 256-bit master key (64 hex characters)
master_key = "${HAVEN_KMS_MASTER_KEY}"

# Previous-generation master key, required after rotation so archived
# bundles remain decryptable
# previous_key = "${HAVEN_KMS_PREVIOUS_KEY}"

# Hex-encoded 256-bit HMAC key for manifest signatures
signing_key = "${HAVEN_KMS_SIGNING_KEY}"

# ============================================================================
# Consent Ledger
# ============================================================================
[ledger]
# Whether ledger recording is enabled
enabled = true

# Base URL of the consent ledger service
base_url = "https://consent-ledger.example.org"

# Bearer token for the ledger API
api_key = "${HAVEN_LEDGER_API_KEY}"

# HTTP timeout in seconds (1-300)
timeout_seconds = 30

[ledger.retry]
# Retries apply only to transient failures (HTTP 5xx, connection errors)
max_retries = 3
initial_delay_ms = 500
max_delay_ms = 15000
backoff_multiplier = 2.0

# ============================================================================
# Notifications
# ============================================================================
[notification]
# Whether completion/failure notifications are written
enabled = true

# Recipient addresses
recipients = ["hmis-admin@example.org"]

# Directory for the file-backed notification outbox
outbox_dir = "/var/lib/haven/outbox"

# ============================================================================
# Logging
# ============================================================================
[logging]
# Enable local file logging
local_enabled = true

# Local log directory
local_path = "/var/log/haven"

# Emit JSON-formatted log lines instead of plain text
json_format = false

# Directory for policy audit records (separate from diagnostic logs)
audit_path = "/var/lib/haven/audit"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_args_defaults() {
        let args = InitArgs {
            output: "haven.toml".to_string(),
            with_examples: false,
            force: false,
        };

        assert_eq!(args.output, "haven.toml");
        assert!(!args.with_examples);
        assert!(!args.force);
    }

    #[test]
    fn test_generate_minimal_config() {
        let config = InitArgs::generate_minimal_config();
        assert!(config.contains("[tenant]"));
        assert!(config.contains("[kms]"));
        assert!(config.contains("[ledger]"));
    }

    #[test]
    fn test_generate_config_with_examples() {
        let config = InitArgs::generate_config_with_examples();
        assert!(config.contains("# Haven Configuration File"));
        assert!(config.contains("default_hash_behavior"));
        assert!(config.contains("retention_days"));
    }

    #[test]
    fn test_minimal_config_parses() {
        let config = InitArgs::generate_minimal_config();
        let parsed: Result<toml::Value, _> = toml::from_str(&config);
        assert!(parsed.is_ok());
    }
}
