//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables should be run with --test-threads=1
//! to avoid interference between tests.

use haven_export::config::load_config;
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("HAVEN_APPLICATION_LOG_LEVEL");
    std::env::remove_var("HAVEN_APPLICATION_DRY_RUN");
    std::env::remove_var("HAVEN_PIPELINE_VALIDATION_SLOTS");
    std::env::remove_var("HAVEN_TENANT_COC_CODE");
    std::env::remove_var("HAVEN_KMS_MASTER_KEY");
    std::env::remove_var("TEST_HAVEN_MASTER_KEY");
    std::env::remove_var("TEST_HAVEN_LEDGER_KEY");
}

const MASTER_KEY: &str = "abababababababababababababababababababababababababababababababab";
const SIGNING_KEY: &str = "cdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcd";

fn write_config(contents: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(contents.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    let toml_content = format!(
        r#"
environment = "staging"

[application]
log_level = "debug"
dry_run = true

[tenant]
tenant_id = "4b4b8f9e-3fb2-4a70-9c9d-0f6a2f1f2a10"
organization_name = "Harbor Light CoC"
coc_code = "CA-600"
default_hash_behavior = "consent_based"
clearance_validity_hours = 48

[pipeline]
materialization_slots = 8
validation_slots = 2
future_tolerance_days = 14
csv_version = "FY2024"

[storage]
artifact_dir = "/var/lib/haven/artifacts"
event_dir = "/var/lib/haven/events"
state_dir = "/var/lib/haven/state"
retention_days = 120

[kms]
current_generation = 2
master_key = "{MASTER_KEY}"
previous_key = "{SIGNING_KEY}"
signing_key = "{SIGNING_KEY}"

[ledger]
enabled = true
base_url = "https://consent-ledger.example.org"
timeout_seconds = 10

[ledger.retry]
max_retries = 5
initial_delay_ms = 100
max_delay_ms = 2000
backoff_multiplier = 1.5

[notification]
enabled = true
recipients = ["admin@example.org", "audit@example.org"]
outbox_dir = "/var/lib/haven/outbox"

[logging]
local_enabled = false
local_path = "/tmp/haven"
json_format = true
audit_path = "/var/lib/haven/audit"
"#
    );

    let temp_file = write_config(&toml_content);
    let config = load_config(temp_file.path()).expect("Failed to load config");

    // Verify application config
    assert_eq!(config.application.log_level, "debug");
    assert!(config.application.dry_run);

    // Verify tenant config
    assert_eq!(config.tenant.organization_name, "Harbor Light CoC");
    assert_eq!(config.tenant.coc_code, "CA-600");
    assert_eq!(config.tenant.default_hash_behavior, "consent_based");
    assert_eq!(config.tenant.clearance_validity_hours, 48);

    // Verify pipeline config
    assert_eq!(config.pipeline.materialization_slots, 8);
    assert_eq!(config.pipeline.validation_slots, 2);
    assert_eq!(config.pipeline.future_tolerance_days, 14);

    // Verify storage config
    assert_eq!(config.storage.artifact_dir, "/var/lib/haven/artifacts");
    assert_eq!(config.storage.retention_days, 120);

    // Verify KMS config
    assert_eq!(config.kms.current_generation, 2);
    assert!(config.kms.previous_key.is_some());

    // Verify ledger config
    assert_eq!(config.ledger.base_url, "https://consent-ledger.example.org");
    assert_eq!(config.ledger.timeout_seconds, 10);
    assert_eq!(config.ledger.retry.max_retries, 5);
    assert_eq!(config.ledger.retry.backoff_multiplier, 1.5);

    // Verify notification config
    assert_eq!(config.notification.recipients.len(), 2);

    // Verify logging config
    assert!(!config.logging.local_enabled);
    assert!(config.logging.json_format);
    assert_eq!(config.logging.audit_path, "/var/lib/haven/audit");
}

#[test]
fn test_load_minimal_config_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let toml_content = format!(
        r#"
[application]

[tenant]
tenant_id = "4b4b8f9e-3fb2-4a70-9c9d-0f6a2f1f2a10"
organization_name = "Harbor Light CoC"
coc_code = "CA-600"

[storage]
artifact_dir = "./artifacts"
event_dir = "./events"

[kms]
master_key = "{MASTER_KEY}"
signing_key = "{SIGNING_KEY}"

[ledger]
base_url = "https://consent-ledger.example.org"
"#
    );

    let temp_file = write_config(&toml_content);
    let config = load_config(temp_file.path()).expect("Failed to load config");

    // Verify defaults are applied
    assert_eq!(config.application.log_level, "info");
    assert!(!config.application.dry_run);
    assert_eq!(config.tenant.default_hash_behavior, "always_hash");
    assert_eq!(config.tenant.clearance_validity_hours, 24);
    assert_eq!(config.pipeline.materialization_slots, 4);
    assert_eq!(config.pipeline.validation_slots, 4);
    assert_eq!(config.pipeline.csv_version, "FY2024");
    assert_eq!(config.storage.state_dir, "./state");
    assert_eq!(config.storage.retention_days, 90);
    assert_eq!(config.kms.current_generation, 1);
    assert!(config.ledger.enabled);
    assert_eq!(config.ledger.retry.max_retries, 3);
    assert!(config.notification.enabled);
    assert_eq!(config.notification.outbox_dir, "./outbox");
    assert_eq!(config.logging.audit_path, "./audit");
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_HAVEN_MASTER_KEY", MASTER_KEY);
    std::env::set_var("TEST_HAVEN_LEDGER_KEY", "ledger-bearer-token");

    let toml_content = format!(
        r#"
[application]

[tenant]
tenant_id = "4b4b8f9e-3fb2-4a70-9c9d-0f6a2f1f2a10"
organization_name = "Harbor Light CoC"
coc_code = "CA-600"

[storage]
artifact_dir = "./artifacts"
event_dir = "./events"

[kms]
master_key = "${{TEST_HAVEN_MASTER_KEY}}"
signing_key = "{SIGNING_KEY}"

[ledger]
base_url = "https://consent-ledger.example.org"
api_key = "${{TEST_HAVEN_LEDGER_KEY}}"
"#
    );

    let temp_file = write_config(&toml_content);
    let config = load_config(temp_file.path()).expect("Failed to load config");

    assert_eq!(config.kms.master_key.expose_secret().as_ref(), MASTER_KEY);
    let api_key = config.ledger.api_key.as_ref().unwrap();
    assert_eq!(api_key.expose_secret().as_ref(), "ledger-bearer-token");

    cleanup_env_vars();
}

#[test]
fn test_missing_substitution_var_is_an_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let toml_content = format!(
        r#"
[application]

[tenant]
tenant_id = "4b4b8f9e-3fb2-4a70-9c9d-0f6a2f1f2a10"
organization_name = "Harbor Light CoC"
coc_code = "CA-600"

[storage]
artifact_dir = "./artifacts"
event_dir = "./events"

[kms]
master_key = "${{TEST_HAVEN_MASTER_KEY}}"
signing_key = "{SIGNING_KEY}"

[ledger]
base_url = "https://consent-ledger.example.org"
"#
    );

    let temp_file = write_config(&toml_content);
    let result = load_config(temp_file.path());
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("TEST_HAVEN_MASTER_KEY"));
}

#[test]
fn test_env_var_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("HAVEN_APPLICATION_LOG_LEVEL", "trace");
    std::env::set_var("HAVEN_TENANT_COC_CODE", "WA-501");
    std::env::set_var("HAVEN_PIPELINE_VALIDATION_SLOTS", "16");

    let toml_content = format!(
        r#"
[application]
log_level = "info"

[tenant]
tenant_id = "4b4b8f9e-3fb2-4a70-9c9d-0f6a2f1f2a10"
organization_name = "Harbor Light CoC"
coc_code = "CA-600"

[pipeline]
validation_slots = 2

[storage]
artifact_dir = "./artifacts"
event_dir = "./events"

[kms]
master_key = "{MASTER_KEY}"
signing_key = "{SIGNING_KEY}"

[ledger]
base_url = "https://consent-ledger.example.org"
"#
    );

    let temp_file = write_config(&toml_content);
    let config = load_config(temp_file.path()).expect("Failed to load config");

    // Verify env var overrides took effect
    assert_eq!(config.application.log_level, "trace");
    assert_eq!(config.tenant.coc_code, "WA-501");
    assert_eq!(config.pipeline.validation_slots, 16);

    cleanup_env_vars();
}

#[test]
fn test_invalid_config_validation() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let toml_content = format!(
        r#"
[application]
log_level = "invalid_level"

[tenant]
tenant_id = "4b4b8f9e-3fb2-4a70-9c9d-0f6a2f1f2a10"
organization_name = "Harbor Light CoC"
coc_code = "CA-600"

[storage]
artifact_dir = "./artifacts"
event_dir = "./events"

[kms]
master_key = "{MASTER_KEY}"
signing_key = "{SIGNING_KEY}"

[ledger]
base_url = "https://consent-ledger.example.org"
"#
    );

    let temp_file = write_config(&toml_content);
    let result = load_config(temp_file.path());
    assert!(result.is_err());
}

#[test]
fn test_short_master_key_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let toml_content = format!(
        r#"
[application]

[tenant]
tenant_id = "4b4b8f9e-3fb2-4a70-9c9d-0f6a2f1f2a10"
organization_name = "Harbor Light CoC"
coc_code = "CA-600"

[storage]
artifact_dir = "./artifacts"
event_dir = "./events"

[kms]
master_key = "abcd"
signing_key = "{SIGNING_KEY}"

[ledger]
base_url = "https://consent-ledger.example.org"
"#
    );

    let temp_file = write_config(&toml_content);
    let result = load_config(temp_file.path());
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("64 hex characters"));
}
