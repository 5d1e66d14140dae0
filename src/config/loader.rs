//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::HavenConfig;
use crate::config::secret::secret_string;
use crate::domain::errors::HavenError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into HavenConfig
/// 4. Applies environment variable overrides (HAVEN_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - Environment variable substitution fails
/// - Configuration validation fails
pub fn load_config(path: impl AsRef<Path>) -> Result<HavenConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(HavenError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        HavenError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    // Perform environment variable substitution
    let contents = substitute_env_vars(&contents)?;

    // Parse TOML
    let mut config: HavenConfig = toml::from_str(&contents)
        .map_err(|e| HavenError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    // Apply environment variable overrides
    apply_env_overrides(&mut config);

    // Validate configuration
    config.validate().map_err(|e| {
        HavenError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    // Process line by line to skip comments
    for line in input.lines() {
        let trimmed = line.trim_start();

        // Skip comment lines - don't process env vars in comments
        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(HavenError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using HAVEN_* prefix
///
/// Environment variables follow the pattern: HAVEN_<SECTION>_<KEY>
/// For example: HAVEN_LEDGER_BASE_URL, HAVEN_PIPELINE_VALIDATION_SLOTS
fn apply_env_overrides(config: &mut HavenConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("HAVEN_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("HAVEN_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // Tenant overrides
    if let Ok(val) = std::env::var("HAVEN_TENANT_TENANT_ID") {
        config.tenant.tenant_id = val;
    }
    if let Ok(val) = std::env::var("HAVEN_TENANT_COC_CODE") {
        config.tenant.coc_code = val;
    }
    if let Ok(val) = std::env::var("HAVEN_TENANT_DEFAULT_HASH_BEHAVIOR") {
        config.tenant.default_hash_behavior = val;
    }

    // Pipeline overrides
    if let Ok(val) = std::env::var("HAVEN_PIPELINE_MATERIALIZATION_SLOTS") {
        if let Ok(slots) = val.parse() {
            config.pipeline.materialization_slots = slots;
        }
    }
    if let Ok(val) = std::env::var("HAVEN_PIPELINE_VALIDATION_SLOTS") {
        if let Ok(slots) = val.parse() {
            config.pipeline.validation_slots = slots;
        }
    }
    // Storage overrides
    if let Ok(val) = std::env::var("HAVEN_STORAGE_ARTIFACT_DIR") {
        config.storage.artifact_dir = val;
    }
    if let Ok(val) = std::env::var("HAVEN_STORAGE_EVENT_DIR") {
        config.storage.event_dir = val;
    }
    if let Ok(val) = std::env::var("HAVEN_STORAGE_STATE_DIR") {
        config.storage.state_dir = val;
    }

    // KMS overrides
    if let Ok(val) = std::env::var("HAVEN_KMS_MASTER_KEY") {
        config.kms.master_key = secret_string(val);
    }
    if let Ok(val) = std::env::var("HAVEN_KMS_PREVIOUS_KEY") {
        config.kms.previous_key = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("HAVEN_KMS_SIGNING_KEY") {
        config.kms.signing_key = secret_string(val);
    }
    if let Ok(val) = std::env::var("HAVEN_KMS_CURRENT_GENERATION") {
        if let Ok(generation) = val.parse() {
            config.kms.current_generation = generation;
        }
    }

    // Ledger overrides
    if let Ok(val) = std::env::var("HAVEN_LEDGER_ENABLED") {
        config.ledger.enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("HAVEN_LEDGER_BASE_URL") {
        config.ledger.base_url = val;
    }
    if let Ok(val) = std::env::var("HAVEN_LEDGER_API_KEY") {
        config.ledger.api_key = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("HAVEN_LEDGER_TIMEOUT_SECONDS") {
        if let Ok(timeout) = val.parse() {
            config.ledger.timeout_seconds = timeout;
        }
    }

    // Notification overrides
    if let Ok(val) = std::env::var("HAVEN_NOTIFICATION_ENABLED") {
        config.notification.enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("HAVEN_NOTIFICATION_OUTBOX_DIR") {
        config.notification.outbox_dir = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("HAVEN_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("HAVEN_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("HAVEN_LOGGING_JSON_FORMAT") {
        config.logging.json_format = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("HAVEN_LOGGING_AUDIT_PATH") {
        config.logging.audit_path = val;
    }
}
