//! Domain error types
//!
//! Error hierarchy for the export pipeline. All errors are domain-specific
//! and don't expose third-party types; infrastructure crates are mapped to
//! string payloads at the boundary.

use crate::domain::policy::PolicyErrorCode;
use std::collections::BTreeMap;
use thiserror::Error;

/// Main error type for the export pipeline
///
/// This is the primary error type used throughout the crate. It wraps
/// subsystem-specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum HavenError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Policy denial - the request was rejected before any job was created
    #[error("Policy violation: {0}")]
    Policy(#[from] PolicyViolation),

    /// View materialization errors
    #[error("Generation error: {0}")]
    Generation(String),

    /// Row validation produced at least one ERROR diagnostic
    #[error("Validation failed: {error_count} error(s) - {summary}")]
    ValidationFailed { error_count: usize, summary: String },

    /// ZIP bundling / manifest errors
    #[error("Packaging error: {0}")]
    Packaging(String),

    /// Envelope encryption / key management errors
    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    /// Artifact storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Consent ledger errors
    #[error("Consent ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// Invalid aggregate state transition
    #[error("Job state error: {0}")]
    JobState(String),

    /// Event log append/replay errors
    #[error("Event store error: {0}")]
    EventStore(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// A policy denial with its stable machine error code
///
/// Carried back to the caller so a legitimate requester can self-correct
/// (which scopes are missing, when a clearance expired, and so on).
#[derive(Debug, Clone, Error)]
#[error("{code}: {reason}")]
pub struct PolicyViolation {
    /// Stable machine error code
    pub code: PolicyErrorCode,
    /// Human-readable, actionable reason
    pub reason: String,
    /// Decision metadata forwarded from the policy evaluation
    pub metadata: BTreeMap<String, String>,
}

impl PolicyViolation {
    pub fn new(code: PolicyErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Envelope encryption errors
///
/// Any master-key unavailability or wrap/unwrap failure is fatal to the
/// job. There is no fallback to unencrypted storage.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Master key material could not be loaded or is malformed
    #[error("Master key unavailable: {0}")]
    MasterKeyUnavailable(String),

    /// Payload or data-key encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Payload or data-key decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Decrypted payload hash does not match the recorded hash
    #[error("Integrity check failed - hash mismatch")]
    IntegrityCheckFailed,

    /// Artifact was wrapped under a key generation this provider no longer holds
    #[error("Unknown master key generation: {0}")]
    UnknownKeyGeneration(u32),

    /// Stored blob is truncated or malformed
    #[error("Invalid encrypted bundle format: {0}")]
    InvalidBundleFormat(String),
}

/// Artifact storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write artifact: {0}")]
    WriteFailed(String),

    #[error("Failed to read artifact: {0}")]
    ReadFailed(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Failed to purge artifact: {0}")]
    PurgeFailed(String),
}

/// Consent ledger errors
///
/// Ledger failures after the artifact is safely stored are retryable and
/// job-non-fatal; the artifact itself is not wrong, only the downstream
/// bookkeeping call needs retry.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Ledger API could not be reached (timeout, connection refused)
    #[error("Consent ledger unavailable: {0}")]
    Unavailable(String),

    /// Ledger API rejected the entry
    #[error("Consent ledger rejected entry: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// Ledger API returned a response we could not interpret
    #[error("Invalid consent ledger response: {0}")]
    InvalidResponse(String),
}

impl LedgerError {
    /// Whether the failure is worth retrying without changing the entry
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Unavailable(_) => true,
            LedgerError::Rejected { status, .. } => *status >= 500,
            LedgerError::InvalidResponse(_) => false,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for HavenError {
    fn from(err: std::io::Error) -> Self {
        HavenError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for HavenError {
    fn from(err: serde_json::Error) -> Self {
        HavenError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for HavenError {
    fn from(err: toml::de::Error) -> Self {
        HavenError::Configuration(format!("TOML parse error: {err}"))
    }
}
