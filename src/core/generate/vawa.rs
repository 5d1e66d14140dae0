//! VAWA confidentiality suppression
//!
//! Records for data subjects covered by a VAWA protection decision are
//! checked per-row at generation time, before the row ever enters a CSV
//! buffer. Unredacted sensitive values are never materialized into an
//! intermediate buffer that downstream code could leak.

use crate::core::generate::entities::EntityRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed marker written in place of a redacted field value
pub const REDACTION_MARKER: &str = "***REDACTED***";

/// Suppression behavior for a protected data subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VawaProtection {
    /// Omit the entire record from the export
    Suppress,
    /// Emit the record with sensitive field values replaced by the marker
    Redact,
    /// The record may contribute to aggregate counts but never appears
    /// as a row-level export
    AggregateOnly,
}

/// What happened to one row after the VAWA check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDisposition {
    /// Row emitted (possibly with redacted fields)
    Emit,
    /// Row withheld entirely
    Suppressed,
    /// Row withheld from row-level output, counted for aggregates
    AggregateCounted,
}

/// Protection decisions indexed by data-subject key
///
/// Built from the consent/policy-decision log before generation starts;
/// read-only during row emission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VawaProtectionIndex {
    protections: BTreeMap<String, VawaProtection>,
}

impl VawaProtectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protect(&mut self, subject_key: impl Into<String>, protection: VawaProtection) {
        self.protections.insert(subject_key.into(), protection);
    }

    pub fn protection_for(&self, subject_key: &str) -> Option<VawaProtection> {
        self.protections.get(subject_key).copied()
    }

    pub fn len(&self) -> usize {
        self.protections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protections.is_empty()
    }

    /// Applies the subject's protection to one row.
    ///
    /// For `Redact`, the entity's VAWA-sensitive columns are overwritten in
    /// place with the redaction marker. Null fields stay null - redaction
    /// replaces values, it does not invent them.
    pub fn apply(&self, row: &mut EntityRow, subject_key: &str) -> RowDisposition {
        match self.protection_for(subject_key) {
            None => RowDisposition::Emit,
            Some(VawaProtection::Suppress) => RowDisposition::Suppressed,
            Some(VawaProtection::AggregateOnly) => RowDisposition::AggregateCounted,
            Some(VawaProtection::Redact) => {
                for column in row.kind.vawa_sensitive_columns() {
                    if row.field(column).is_some() {
                        row.set_field(column, Some(REDACTION_MARKER.to_string()));
                    }
                }
                RowDisposition::Emit
            }
        }
    }
}
