//! Per-job aggregation of validation diagnostics
//!
//! Collects diagnostics across all entity tables of one export job and
//! rolls them into counts plus an error-code frequency table. The job-level
//! decision rule is: fail if any ERROR exists, regardless of warning count.
//! Each logger is job-local; jobs never share a validation log.

use crate::core::validate::diagnostic::{Severity, ValidationDiagnostic};
use crate::domain::ids::ExportJobId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Diagnostics retained verbatim in the summary; the rest count only
const SUMMARY_DIAGNOSTIC_LIMIT: usize = 10;

/// Aggregates validation diagnostics for one export job
#[derive(Debug)]
pub struct ValidationLogger {
    job_id: ExportJobId,
    error_code_counts: BTreeMap<String, u64>,
    error_diagnostics: Vec<ValidationDiagnostic>,
    warning_diagnostics: Vec<ValidationDiagnostic>,
    total_validations: u64,
    success_count: u64,
    warning_count: u64,
    error_count: u64,
}

impl ValidationLogger {
    pub fn new(job_id: ExportJobId) -> Self {
        tracing::debug!(job_id = %job_id, "Initialized validation logger");
        Self {
            job_id,
            error_code_counts: BTreeMap::new(),
            error_diagnostics: Vec::new(),
            warning_diagnostics: Vec::new(),
            total_validations: 0,
            success_count: 0,
            warning_count: 0,
            error_count: 0,
        }
    }

    /// Records one validation diagnostic.
    pub fn log(&mut self, diagnostic: ValidationDiagnostic) {
        self.total_validations += 1;

        match diagnostic.severity {
            Severity::Success => {
                self.success_count += 1;
                tracing::trace!(job_id = %self.job_id, "{}", diagnostic.to_log_format());
            }
            Severity::Warning => {
                self.warning_count += 1;
                tracing::warn!(job_id = %self.job_id, "{}", diagnostic.to_log_format());
                self.warning_diagnostics.push(diagnostic);
            }
            Severity::Error => {
                self.error_count += 1;
                if let Some(code) = &diagnostic.error_code {
                    *self.error_code_counts.entry(code.clone()).or_insert(0) += 1;
                }
                tracing::error!(job_id = %self.job_id, "{}", diagnostic.to_log_format());
                self.error_diagnostics.push(diagnostic);
            }
        }
    }

    /// Records diagnostics in batch.
    pub fn log_batch(&mut self, diagnostics: impl IntoIterator<Item = ValidationDiagnostic>) {
        for diagnostic in diagnostics {
            self.log(diagnostic);
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warning_count > 0
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn warning_count(&self) -> u64 {
        self.warning_count
    }

    /// PII-safe validation summary for job completion records
    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary {
            job_id: self.job_id,
            total_validations: self.total_validations,
            success_count: self.success_count,
            warning_count: self.warning_count,
            error_count: self.error_count,
            error_code_frequency: self.error_code_counts.clone(),
            top_errors: self
                .error_diagnostics
                .iter()
                .take(SUMMARY_DIAGNOSTIC_LIMIT)
                .cloned()
                .collect(),
            top_warnings: self
                .warning_diagnostics
                .iter()
                .take(SUMMARY_DIAGNOSTIC_LIMIT)
                .cloned()
                .collect(),
        }
    }

    /// Logs the final validation summary for this job.
    pub fn log_summary(&self) {
        let summary = self.summary();

        tracing::info!(
            job_id = %self.job_id,
            total = summary.total_validations,
            success = summary.success_count,
            warnings = summary.warning_count,
            errors = summary.error_count,
            "Validation summary"
        );

        for (code, count) in summary.error_code_frequency.iter().take(5) {
            tracing::info!(job_id = %self.job_id, error_code = %code, occurrences = count, "Error code frequency");
        }

        if summary.has_errors() {
            tracing::error!(
                job_id = %self.job_id,
                errors = summary.error_count,
                "Validation FAILED"
            );
        } else if summary.has_warnings() {
            tracing::warn!(
                job_id = %self.job_id,
                warnings = summary.warning_count,
                "Validation PASSED with warnings"
            );
        } else {
            tracing::info!(job_id = %self.job_id, "Validation PASSED");
        }
    }
}

/// Per-job validation summary, safe to serialize into completion records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub job_id: ExportJobId,
    pub total_validations: u64,
    pub success_count: u64,
    pub warning_count: u64,
    pub error_count: u64,
    pub error_code_frequency: BTreeMap<String, u64>,
    pub top_errors: Vec<ValidationDiagnostic>,
    pub top_warnings: Vec<ValidationDiagnostic>,
}

impl ValidationSummary {
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warning_count > 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_validations > 0 {
            self.success_count as f64 / self.total_validations as f64
        } else {
            0.0
        }
    }

    /// Short human-readable rollup used in failure reasons and notifications
    pub fn describe(&self) -> String {
        format!(
            "{} checks: {} passed, {} warnings, {} errors",
            self.total_validations, self.success_count, self.warning_count, self.error_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> ValidationLogger {
        ValidationLogger::new(ExportJobId::generate())
    }

    #[test]
    fn test_counts_by_severity() {
        let mut log = logger();
        log.log(ValidationDiagnostic::success("row 1", "PersonalID"));
        log.log(ValidationDiagnostic::warning(
            "row 2",
            "MoveInDate",
            "CONDITIONAL_FIELD_NULL",
            "MoveInDate is conditionally required",
        ));
        log.log(ValidationDiagnostic::error(
            "row 3",
            "EntryDate",
            "DATE_NULL",
            "EntryDate is null but required",
        ));

        let summary = log.summary();
        assert_eq!(summary.total_validations, 3);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.warning_count, 1);
        assert_eq!(summary.error_count, 1);
    }

    #[test]
    fn test_has_errors_iff_error_logged() {
        let mut log = logger();
        log.log(ValidationDiagnostic::success("row 1", "PersonalID"));
        log.log(ValidationDiagnostic::warning(
            "row 2",
            "MoveInDate",
            "CONDITIONAL_FIELD_NULL",
            "msg",
        ));
        assert!(!log.has_errors());
        assert!(log.has_warnings());

        log.log(ValidationDiagnostic::error(
            "row 3",
            "EntryDate",
            "DATE_NULL",
            "msg",
        ));
        assert!(log.has_errors());
    }

    #[test]
    fn test_error_code_frequency() {
        let mut log = logger();
        for row in 0..3 {
            log.log(ValidationDiagnostic::error(
                format!("row {row}"),
                "EntryDate",
                "DATE_NULL",
                "msg",
            ));
        }
        log.log(ValidationDiagnostic::error(
            "row 9",
            "ExitDate",
            "DATE_SEQUENCE_VIOLATION",
            "msg",
        ));

        let summary = log.summary();
        assert_eq!(summary.error_code_frequency.get("DATE_NULL"), Some(&3));
        assert_eq!(
            summary.error_code_frequency.get("DATE_SEQUENCE_VIOLATION"),
            Some(&1)
        );
    }

    #[test]
    fn test_summary_retains_limited_diagnostics() {
        let mut log = logger();
        for row in 0..25 {
            log.log(ValidationDiagnostic::error(
                format!("row {row}"),
                "EntryDate",
                "DATE_NULL",
                "msg",
            ));
        }
        let summary = log.summary();
        assert_eq!(summary.error_count, 25);
        assert_eq!(summary.top_errors.len(), 10);
    }

    #[test]
    fn test_describe_rollup() {
        let mut log = logger();
        log.log(ValidationDiagnostic::success("row 1", "PersonalID"));
        let description = log.summary().describe();
        assert!(description.contains("1 checks"));
        assert!(description.contains("1 passed"));
    }
}
