//! PII-safe validation diagnostic result
//!
//! Captures validation outcomes with sanitized context suitable for
//! structured logging, monitoring dashboards, and remediation workflows.
//! Diagnostic messages exclude PII (SSN, DOB, names) while providing enough
//! detail for data quality remediation. Row context is an anonymized
//! positional label ("Enrollment row 42"), never a raw business key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validation outcome severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Field passes validation
    Success,
    /// Field has a data quality concern but is not blocking
    Warning,
    /// Field fails validation - the job must not complete
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        write!(f, "{name}")
    }
}

/// One validation finding for one field check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDiagnostic {
    /// Anonymized identifier (e.g. "Enrollment row 42")
    pub row_context: String,
    /// CSV field name
    pub field_name: String,
    pub severity: Severity,
    /// Machine-readable code (e.g. "DATE_NULL"); None for SUCCESS
    pub error_code: Option<String>,
    /// Human-readable message, already PII-sanitized
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ValidationDiagnostic {
    pub fn error(
        row_context: impl Into<String>,
        field_name: impl Into<String>,
        error_code: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            row_context: row_context.into(),
            field_name: field_name.into(),
            severity: Severity::Error,
            error_code: Some(error_code.to_string()),
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn warning(
        row_context: impl Into<String>,
        field_name: impl Into<String>,
        error_code: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            row_context: row_context.into(),
            field_name: field_name.into(),
            severity: Severity::Warning,
            error_code: Some(error_code.to_string()),
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn success(row_context: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            row_context: row_context.into(),
            field_name: field_name.into(),
            severity: Severity::Success,
            error_code: None,
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    pub fn is_success(&self) -> bool {
        self.severity == Severity::Success
    }

    /// Formats the diagnostic for structured log output.
    /// Format: [SEVERITY] rowContext | fieldName | errorCode | message
    pub fn to_log_format(&self) -> String {
        match self.severity {
            Severity::Success => format!("[SUCCESS] {} | {}", self.row_context, self.field_name),
            _ => format!(
                "[{}] {} | {} | {} | {}",
                self.severity,
                self.row_context,
                self.field_name,
                self.error_code.as_deref().unwrap_or(""),
                self.message.as_deref().unwrap_or(""),
            ),
        }
    }
}

impl fmt::Display for ValidationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_log_format())
    }
}
