//! Row-level CSV validation for HUD HMIS exports
//!
//! Validation runs after materialization and before packaging. Diagnostics
//! are accumulated, never thrown individually; the job fails only after the
//! full pass completes and the "any ERROR ⇒ fail" rule is applied, so one
//! run reports every problem at once.
//!
//! All diagnostic messages are PII-sanitized by construction - see
//! [`sanitize::sanitize_value`].

pub mod diagnostic;
pub mod logger;
pub mod picklists;
pub mod row;
pub mod rules;
pub mod sanitize;

pub use diagnostic::{Severity, ValidationDiagnostic};
pub use logger::{ValidationLogger, ValidationSummary};
pub use picklists::PicklistRegistry;
pub use row::RowValidator;
pub use rules::{
    hmis_epoch, validate_date_in_range, validate_date_sequence, validate_nullable_field,
    validate_picklist_code, RequirementFlag,
};
pub use sanitize::{sanitize_value, DOB_REDACTION_MARKER, SSN_REDACTION_MARKER};
