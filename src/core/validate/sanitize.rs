//! PII sanitization for diagnostic messages
//!
//! Every value echoed into a validation message passes through
//! [`sanitize_value`] first. This is a hard contract, not a best-effort
//! scrub: diagnostics may be forwarded to external monitoring.

use regex::Regex;
use std::sync::OnceLock;

/// Marker substituted for any 9-digit run (potential SSN)
pub const SSN_REDACTION_MARKER: &str = "[SSN-REDACTED]";

/// Marker substituted for any pre-2005 ISO date (potential DOB)
pub const DOB_REDACTION_MARKER: &str = "[DOB-REDACTED]";

/// Values longer than this are truncated
const MAX_VALUE_LENGTH: usize = 50;

fn ssn_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{9}").expect("static regex"))
}

fn dob_pattern_1900s() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"19\d{2}-\d{2}-\d{2}").expect("static regex"))
}

fn dob_pattern_2000s() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"200[0-4]-\d{2}-\d{2}").expect("static regex"))
}

/// Sanitizes a value for PII-safe logging.
///
/// Masks 9-digit runs (potential SSNs) and ISO dates before 2005
/// (potential DOBs), then truncates long values.
pub fn sanitize_value(value: &str) -> String {
    let masked = ssn_pattern().replace_all(value, SSN_REDACTION_MARKER);
    let masked = dob_pattern_1900s().replace_all(&masked, DOB_REDACTION_MARKER);
    let masked = dob_pattern_2000s().replace_all(&masked, DOB_REDACTION_MARKER);

    let masked = masked.into_owned();
    if masked.chars().count() > MAX_VALUE_LENGTH {
        let truncated: String = masked.chars().take(MAX_VALUE_LENGTH - 3).collect();
        format!("{truncated}...")
    } else {
        masked
    }
}
