//! Row-level CSV validation primitives for HUD HMIS exports
//!
//! Four checks compose into per-row validation:
//! - Date range enforcement with export period boundaries
//! - Nullable field handling per HUD requirement flags
//! - Picklist code validation against HUD data standards
//! - Date sequencing between paired date fields
//!
//! Every check is a pure function of its inputs plus an explicit `today`,
//! and returns a single [`ValidationDiagnostic`] with a PII-safe message.

use crate::core::validate::diagnostic::ValidationDiagnostic;
use crate::core::validate::sanitize::sanitize_value;
use crate::domain::period::ExportPeriod;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;

/// HUD HMIS inception date; no HMIS record predates it
pub fn hmis_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1998, 10, 1).expect("valid constant date")
}

/// HUD field requirement flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementFlag {
    /// R - must be present
    Required,
    /// C - conditionally required, absence is a warning
    Conditional,
    /// O - optional
    Optional,
}

impl RequirementFlag {
    pub fn parse(flag: &str) -> Option<Self> {
        match flag {
            "R" => Some(RequirementFlag::Required),
            "C" => Some(RequirementFlag::Conditional),
            "O" => Some(RequirementFlag::Optional),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementFlag::Required => "R",
            RequirementFlag::Conditional => "C",
            RequirementFlag::Optional => "O",
        }
    }
}

/// Validates a date field against the export period and HUD business rules.
///
/// Dates outside [HMIS epoch, today + tolerance] are errors; dates inside
/// those bounds but outside the export period are warnings only, because
/// enrollments legitimately span period boundaries.
pub fn validate_date_in_range(
    field_name: &str,
    value: Option<&str>,
    period: &ExportPeriod,
    today: NaiveDate,
    future_tolerance_days: i64,
    row_context: &str,
) -> ValidationDiagnostic {
    let raw = match value {
        None => {
            return ValidationDiagnostic::error(
                row_context,
                field_name,
                "DATE_NULL",
                format!("{field_name} is null but required"),
            );
        }
        Some(raw) => raw,
    };

    let date_value = match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => {
            return ValidationDiagnostic::error(
                row_context,
                field_name,
                "DATE_PARSE_FAILURE",
                format!(
                    "{field_name} has invalid date format: {}",
                    sanitize_value(raw)
                ),
            );
        }
    };

    if date_value < hmis_epoch() {
        return ValidationDiagnostic::error(
            row_context,
            field_name,
            "DATE_BEFORE_HMIS_EPOCH",
            format!(
                "{field_name} precedes HUD HMIS inception date ({})",
                hmis_epoch()
            ),
        );
    }

    let max_future_date = today + Duration::days(future_tolerance_days);
    if date_value > max_future_date {
        return ValidationDiagnostic::error(
            row_context,
            field_name,
            "DATE_TOO_FAR_FUTURE",
            format!("{field_name} exceeds allowed future tolerance ({max_future_date})"),
        );
    }

    // The epoch admits dates back to 1998, so in-bounds values can still
    // be pre-2005 and must be masked before they reach a message
    if date_value < period.start() {
        return ValidationDiagnostic::warning(
            row_context,
            field_name,
            "DATE_BEFORE_EXPORT_PERIOD",
            format!(
                "{field_name} ({}) precedes export start date ({})",
                sanitize_value(&date_value.to_string()),
                period.start()
            ),
        );
    }

    if date_value > period.end() {
        return ValidationDiagnostic::warning(
            row_context,
            field_name,
            "DATE_AFTER_EXPORT_PERIOD",
            format!(
                "{field_name} ({}) exceeds export end date ({})",
                sanitize_value(&date_value.to_string()),
                period.end()
            ),
        );
    }

    ValidationDiagnostic::success(row_context, field_name)
}

/// Validates nullable field handling per the HUD requirement flag.
pub fn validate_nullable_field(
    field_name: &str,
    value: Option<&str>,
    flag: RequirementFlag,
    row_context: &str,
) -> ValidationDiagnostic {
    let is_null = value.map(|v| v.trim().is_empty()).unwrap_or(true);

    match flag {
        RequirementFlag::Required if is_null => ValidationDiagnostic::error(
            row_context,
            field_name,
            "REQUIRED_FIELD_NULL",
            format!("{field_name} is required (flag=R) but null or empty"),
        ),
        RequirementFlag::Conditional if is_null => ValidationDiagnostic::warning(
            row_context,
            field_name,
            "CONDITIONAL_FIELD_NULL",
            format!("{field_name} is conditionally required (flag=C) but null - verify business rules"),
        ),
        _ => ValidationDiagnostic::success(row_context, field_name),
    }
}

/// Validates a HUD picklist code against its valid code set.
///
/// Null is always SUCCESS here; nullability is validated separately by
/// [`validate_nullable_field`] to avoid double-counting.
pub fn validate_picklist_code(
    field_name: &str,
    value: Option<&str>,
    valid_codes: &BTreeSet<i32>,
    picklist_name: &str,
    row_context: &str,
) -> ValidationDiagnostic {
    let raw = match value {
        None => return ValidationDiagnostic::success(row_context, field_name),
        Some(raw) if raw.trim().is_empty() => {
            return ValidationDiagnostic::success(row_context, field_name)
        }
        Some(raw) => raw,
    };

    let code: i32 = match raw.trim().parse() {
        Ok(code) => code,
        Err(_) => {
            return ValidationDiagnostic::error(
                row_context,
                field_name,
                "PICKLIST_PARSE_FAILURE",
                format!(
                    "{field_name} has non-integer value for picklist {picklist_name}: {}",
                    sanitize_value(raw)
                ),
            );
        }
    };

    if !valid_codes.contains(&code) {
        return ValidationDiagnostic::error(
            row_context,
            field_name,
            "PICKLIST_INVALID_CODE",
            format!(
                "{field_name} has invalid code {code} for picklist {picklist_name} (valid: {})",
                format_valid_codes(valid_codes)
            ),
        );
    }

    ValidationDiagnostic::success(row_context, field_name)
}

/// Validates date sequencing between two date fields.
///
/// Null dates pass; their presence is validated separately.
pub fn validate_date_sequence(
    earlier_field_name: &str,
    earlier_date: Option<NaiveDate>,
    later_field_name: &str,
    later_date: Option<NaiveDate>,
    allow_equal: bool,
    row_context: &str,
) -> ValidationDiagnostic {
    let pair_name = format!("{earlier_field_name}→{later_field_name}");

    let (earlier, later) = match (earlier_date, later_date) {
        (Some(earlier), Some(later)) => (earlier, later),
        _ => return ValidationDiagnostic::success(row_context, pair_name),
    };

    if later < earlier {
        return ValidationDiagnostic::error(
            row_context,
            pair_name,
            "DATE_SEQUENCE_VIOLATION",
            format!(
                "{earlier_field_name} ({}) must precede {later_field_name} ({})",
                sanitize_value(&earlier.to_string()),
                sanitize_value(&later.to_string())
            ),
        );
    }

    if !allow_equal && later == earlier {
        return ValidationDiagnostic::warning(
            row_context,
            pair_name,
            "DATE_SEQUENCE_EQUAL",
            format!(
                "{earlier_field_name} ({}) equals {later_field_name} ({}) - verify if same-day allowed",
                sanitize_value(&earlier.to_string()),
                sanitize_value(&later.to_string())
            ),
        );
    }

    ValidationDiagnostic::success(row_context, pair_name)
}

/// Small sets are enumerated in full; large sets show a count instead
fn format_valid_codes(codes: &BTreeSet<i32>) -> String {
    if codes.len() > 10 {
        return format!("{} valid codes", codes.len());
    }
    let listed: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
    format!("[{}]", listed.join(", "))
}
