//! Configuration management for the export pipeline.
//!
//! TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Configuration files support:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `HAVEN_*` prefix environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [tenant]
//! tenant_id = "4b4b8f9e-3fb2-4a70-9c9d-0f6a2f1f2a10"
//! organization_name = "Harbor Light CoC"
//! coc_code = "CA-600"
//! default_hash_behavior = "always_hash"
//!
//! [pipeline]
//! materialization_slots = 4
//! validation_slots = 4
//!
//! [storage]
//! artifact_dir = "/var/lib/haven/artifacts"
//! event_dir = "/var/lib/haven/events"
//!
//! [kms]
//! master_key = "${HAVEN_KMS_MASTER_KEY}"
//! signing_key = "${HAVEN_KMS_SIGNING_KEY}"
//!
//! [ledger]
//! base_url = "https://consent-ledger.example.org"
//! api_key = "${HAVEN_LEDGER_API_KEY}"
//! ```
//!
//! Secrets (master key, signing key, ledger API key) are held as
//! [`SecretString`] values that never appear in Debug output.

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, Environment, HavenConfig, KmsConfig, LedgerConfig, LoggingConfig,
    NotificationConfig, PipelineConfig, RetryConfig, StorageConfig, TenantConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
