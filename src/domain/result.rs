//! Result type alias for the export pipeline

use crate::domain::errors::HavenError;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, HavenError>;
