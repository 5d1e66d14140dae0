//! Configuration schema types
//!
//! Defines the TOML configuration structure for the export pipeline. Every
//! section carries serde defaults for optional keys and a `validate()` that
//! rejects values the pipeline cannot run with.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// Main Haven export configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HavenConfig {
    /// Application-level settings
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// Tenant identity and policy defaults
    pub tenant: TenantConfig,

    /// Pipeline concurrency and validation settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Artifact and event storage locations
    pub storage: StorageConfig,

    /// Envelope encryption key material
    pub kms: KmsConfig,

    /// Consent ledger endpoint
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Completion notification settings
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HavenConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.tenant.validate()?;
        self.pipeline.validate()?;
        self.storage.validate()?;
        self.kms.validate(&self.environment)?;
        self.ledger.validate()?;
        self.notification.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (evaluate policy and validate, but write no artifacts)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Tenant identity and policy defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Tenant UUID
    pub tenant_id: String,

    /// Continuum of Care organization name
    pub organization_name: String,

    /// Continuum of Care code (e.g. "CA-600")
    pub coc_code: String,

    /// Hash behavior when no tenant record overrides it
    /// (always_hash, never_hash, consent_based)
    #[serde(default = "default_hash_behavior")]
    pub default_hash_behavior: String,

    /// Hours a newly issued security clearance remains valid
    #[serde(default = "default_clearance_validity_hours")]
    pub clearance_validity_hours: u32,
}

impl TenantConfig {
    fn validate(&self) -> Result<(), String> {
        if self.tenant_id.is_empty() {
            return Err("tenant.tenant_id cannot be empty".to_string());
        }
        if uuid::Uuid::parse_str(&self.tenant_id).is_err() {
            return Err(format!(
                "tenant.tenant_id '{}' is not a valid UUID",
                self.tenant_id
            ));
        }
        if self.organization_name.is_empty() {
            return Err("tenant.organization_name cannot be empty".to_string());
        }
        if self.coc_code.is_empty() {
            return Err("tenant.coc_code cannot be empty".to_string());
        }

        let valid_behaviors = ["always_hash", "never_hash", "consent_based"];
        if !valid_behaviors.contains(&self.default_hash_behavior.as_str()) {
            return Err(format!(
                "Invalid default_hash_behavior '{}'. Must be one of: {}",
                self.default_hash_behavior,
                valid_behaviors.join(", ")
            ));
        }

        if self.clearance_validity_hours == 0 || self.clearance_validity_hours > 168 {
            return Err(format!(
                "tenant.clearance_validity_hours must be between 1 and 168, got {}",
                self.clearance_validity_hours
            ));
        }

        Ok(())
    }
}

/// Pipeline concurrency and validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent materialization slots (CSV generation)
    #[serde(default = "default_materialization_slots")]
    pub materialization_slots: usize,

    /// Concurrent validation slots
    #[serde(default = "default_validation_slots")]
    pub validation_slots: usize,

    /// Days past today an entry date may fall before it is rejected
    #[serde(default = "default_future_tolerance_days")]
    pub future_tolerance_days: i64,

    /// HUD CSV specification version stamped into Export.csv
    #[serde(default = "default_csv_version")]
    pub csv_version: String,
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), String> {
        if self.materialization_slots == 0 || self.materialization_slots > 64 {
            return Err(format!(
                "pipeline.materialization_slots must be between 1 and 64, got {}",
                self.materialization_slots
            ));
        }
        if self.validation_slots == 0 || self.validation_slots > 64 {
            return Err(format!(
                "pipeline.validation_slots must be between 1 and 64, got {}",
                self.validation_slots
            ));
        }
        if self.future_tolerance_days < 0 || self.future_tolerance_days > 365 {
            return Err(format!(
                "pipeline.future_tolerance_days must be between 0 and 365, got {}",
                self.future_tolerance_days
            ));
        }
        if self.csv_version.is_empty() {
            return Err("pipeline.csv_version cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            materialization_slots: default_materialization_slots(),
            validation_slots: default_validation_slots(),
            future_tolerance_days: default_future_tolerance_days(),
            csv_version: default_csv_version(),
        }
    }
}

/// Artifact and event storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for encrypted export archives
    pub artifact_dir: String,

    /// Directory for the append-only job event log
    pub event_dir: String,

    /// Directory for operational snapshots (job status, audit metadata)
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Days an encrypted artifact is retained before purge
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl StorageConfig {
    fn validate(&self) -> Result<(), String> {
        if self.artifact_dir.is_empty() {
            return Err("storage.artifact_dir cannot be empty".to_string());
        }
        if self.event_dir.is_empty() {
            return Err("storage.event_dir cannot be empty".to_string());
        }
        if self.state_dir.is_empty() {
            return Err("storage.state_dir cannot be empty".to_string());
        }
        if self.retention_days == 0 || self.retention_days > 3650 {
            return Err(format!(
                "storage.retention_days must be between 1 and 3650, got {}",
                self.retention_days
            ));
        }
        Ok(())
    }
}

/// Envelope encryption key material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmsConfig {
    /// Current master key generation number
    #[serde(default = "default_key_generation")]
    pub current_generation: u32,

    /// Hex-encoded 256-bit master key for the current generation
    /// Stored securely in memory and automatically zeroized on drop
    pub master_key: SecretString,

    /// Hex-encoded master key for the previous generation, kept so older
    /// bundles remain decryptable after rotation
    #[serde(default)]
    pub previous_key: Option<SecretString>,

    /// Hex-encoded 256-bit HMAC key for manifest signatures
    pub signing_key: SecretString,
}

impl KmsConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.current_generation == 0 {
            return Err("kms.current_generation must be at least 1".to_string());
        }

        validate_hex_key("kms.master_key", self.master_key.expose_secret().as_ref())?;
        if let Some(ref previous) = self.previous_key {
            validate_hex_key("kms.previous_key", previous.expose_secret().as_ref())?;
        }
        validate_hex_key("kms.signing_key", self.signing_key.expose_secret().as_ref())?;

        // A rotated production deployment must keep the previous generation
        // available or archived bundles become unreadable
        if *environment == Environment::Production
            && self.current_generation > 1
            && self.previous_key.is_none()
        {
            return Err(
                "kms.previous_key is required in production when current_generation > 1"
                    .to_string(),
            );
        }

        Ok(())
    }
}

fn validate_hex_key(field: &str, value: &str) -> Result<(), String> {
    if value.len() != 64 {
        return Err(format!(
            "{} must be 64 hex characters (256 bits), got {} characters",
            field,
            value.len()
        ));
    }
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("{field} must contain only hex characters"));
    }
    Ok(())
}

/// Consent ledger endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Whether ledger recording is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the consent ledger service
    #[serde(default)]
    pub base_url: String,

    /// Bearer token for the ledger API
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Retry configuration for transient ledger failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl LedgerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled {
            if self.base_url.is_empty() {
                return Err("ledger.base_url cannot be empty when ledger.enabled = true"
                    .to_string());
            }
            if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
                return Err("ledger.base_url must start with http:// or https://".to_string());
            }
        }
        if self.timeout_seconds == 0 || self.timeout_seconds > 300 {
            return Err(format!(
                "ledger.timeout_seconds must be between 1 and 300, got {}",
                self.timeout_seconds
            ));
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: String::new(),
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Completion notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Whether completion notifications are sent
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Recipient addresses in addition to the tenant's configured recipients
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Directory for the file-backed notification outbox
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: String,
}

impl NotificationConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.outbox_dir.is_empty() {
            return Err(
                "notification.outbox_dir cannot be empty when notification.enabled = true"
                    .to_string(),
            );
        }
        Ok(())
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recipients: Vec::new(),
            outbox_dir: default_outbox_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Local file logging enabled
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_log_path")]
    pub local_path: String,

    /// Emit JSON-formatted log lines instead of plain text
    #[serde(default)]
    pub json_format: bool,

    /// Directory for policy audit records (separate from diagnostic logs)
    #[serde(default = "default_audit_path")]
    pub audit_path: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled = true".to_string());
        }
        if self.audit_path.is_empty() {
            return Err("logging.audit_path cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_log_path(),
            json_format: false,
            audit_path: default_audit_path(),
        }
    }
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

fn default_hash_behavior() -> String {
    "always_hash".to_string()
}

fn default_clearance_validity_hours() -> u32 {
    24
}

fn default_materialization_slots() -> usize {
    4
}

fn default_validation_slots() -> usize {
    4
}

fn default_future_tolerance_days() -> i64 {
    30
}

fn default_csv_version() -> String {
    "FY2024".to_string()
}

fn default_state_dir() -> String {
    "./state".to_string()
}

fn default_retention_days() -> u32 {
    90
}

fn default_key_generation() -> u32 {
    1
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    15_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_outbox_dir() -> String {
    "./outbox".to_string()
}

fn default_log_path() -> String {
    "./logs".to_string()
}

fn default_audit_path() -> String {
    "./audit".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret::secret_string;

    fn valid_config() -> HavenConfig {
        HavenConfig {
            application: ApplicationConfig::default(),
            environment: Environment::Development,
            tenant: TenantConfig {
                tenant_id: "4b4b8f9e-3fb2-4a70-9c9d-0f6a2f1f2a10".to_string(),
                organization_name: "Harbor Light CoC".to_string(),
                coc_code: "CA-600".to_string(),
                default_hash_behavior: default_hash_behavior(),
                clearance_validity_hours: 24,
            },
            pipeline: PipelineConfig::default(),
            storage: StorageConfig {
                artifact_dir: "./artifacts".to_string(),
                event_dir: "./events".to_string(),
                state_dir: default_state_dir(),
                retention_days: default_retention_days(),
            },
            kms: KmsConfig {
                current_generation: 1,
                master_key: secret_string("ab".repeat(32)),
                previous_key: None,
                signing_key: secret_string("cd".repeat(32)),
            },
            ledger: LedgerConfig {
                base_url: "https://ledger.example.org".to_string(),
                ..LedgerConfig::default()
            },
            notification: NotificationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = valid_config();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tenant_id_must_be_uuid() {
        let mut config = valid_config();
        config.tenant.tenant_id = "not-a-uuid".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("tenant_id"));
    }

    #[test]
    fn test_master_key_length_enforced() {
        let mut config = valid_config();
        config.kms.master_key = secret_string("abcd".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.contains("64 hex characters"));
    }

    #[test]
    fn test_master_key_rejects_non_hex() {
        let mut config = valid_config();
        config.kms.master_key = secret_string("zz".repeat(32));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rotated_production_requires_previous_key() {
        let mut config = valid_config();
        config.environment = Environment::Production;
        config.kms.current_generation = 2;
        assert!(config.validate().is_err());

        config.kms.previous_key = Some(secret_string("ef".repeat(32)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ledger_url_required_when_enabled() {
        let mut config = valid_config();
        config.ledger.base_url = String::new();
        assert!(config.validate().is_err());

        config.ledger.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_slot_bounds() {
        let mut config = valid_config();
        config.pipeline.materialization_slots = 0;
        assert!(config.validate().is_err());

        config.pipeline.materialization_slots = 65;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hash_behavior_values() {
        let mut config = valid_config();
        for behavior in ["always_hash", "never_hash", "consent_based"] {
            config.tenant.default_hash_behavior = behavior.to_string();
            assert!(config.validate().is_ok());
        }
        config.tenant.default_hash_behavior = "sometimes".to_string();
        assert!(config.validate().is_err());
    }
}
