//! Logging and observability
//!
//! Structured diagnostic logging for the export pipeline:
//! - JSON-formatted logs
//! - Configurable log levels
//! - Local file logging with daily rotation
//!
//! Diagnostic logs carry job identifiers, phase names, counts and durations.
//! Client PII never appears here; policy decisions go to the separate audit
//! sink in `core::policy`.
//!
//! # Example
//!
//! ```no_run
//! use haven_export::logging::init_logging;
//! use haven_export::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};
