//! Policy value objects for export security enforcement
//!
//! These types carry the consent and clearance facts that the policy
//! service evaluates. Clearances and decisions are immutable once created;
//! a revoked clearance is a new fact, not a mutation.

use crate::domain::ids::ClearanceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Tenant-level hash behavior for exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportHashBehavior {
    /// Direct identifiers are always one-way hashed; unhashed exports are prohibited
    AlwaysHash,
    /// Unhashed exports are permitted without consent or clearance
    NeverHash,
    /// Unhashed exports require consent scopes and a valid clearance
    ConsentBased,
}

impl ExportHashBehavior {
    pub fn prohibits_unhashed(&self) -> bool {
        matches!(self, ExportHashBehavior::AlwaysHash)
    }

    pub fn allows_unhashed_by_default(&self) -> bool {
        matches!(self, ExportHashBehavior::NeverHash)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExportHashBehavior::AlwaysHash => "All direct identifiers hashed",
            ExportHashBehavior::NeverHash => "Identifiers exported unhashed",
            ExportHashBehavior::ConsentBased => "Hashing determined by consent and clearance",
        }
    }
}

impl fmt::Display for ExportHashBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportHashBehavior::AlwaysHash => "ALWAYS_HASH",
            ExportHashBehavior::NeverHash => "NEVER_HASH",
            ExportHashBehavior::ConsentBased => "CONSENT_BASED",
        };
        write!(f, "{name}")
    }
}

/// Consent scope tags attached to export requests and clearances
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentScope {
    /// Disclosure of direct identifiers (SSN, DOB, names)
    PiiDisclosure,
    /// HUD-mandated reporting submissions
    HudReporting,
    /// Coordinated entry referrals
    CoordinatedEntry,
    /// Aggregate-only statistical reporting
    AggregateReporting,
}

impl ConsentScope {
    pub fn description(&self) -> &'static str {
        match self {
            ConsentScope::PiiDisclosure => "Disclosure of personally identifiable information",
            ConsentScope::HudReporting => "HUD regulatory reporting",
            ConsentScope::CoordinatedEntry => "Coordinated entry referral",
            ConsentScope::AggregateReporting => "Aggregate statistical reporting",
        }
    }
}

impl fmt::Display for ConsentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsentScope::PiiDisclosure => "PII_DISCLOSURE",
            ConsentScope::HudReporting => "HUD_REPORTING",
            ConsentScope::CoordinatedEntry => "COORDINATED_ENTRY",
            ConsentScope::AggregateReporting => "AGGREGATE_REPORTING",
        };
        write!(f, "{name}")
    }
}

/// Time-boxed grant authorizing an actor to request unhashed exports
///
/// Immutable once granted; expires naturally. Validity requires strictly
/// `now < expires_at` - a clearance expiring exactly now is already expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityClearance {
    pub clearance_id: ClearanceId,
    pub holder_user_id: Uuid,
    pub holder_roles: BTreeSet<String>,
    pub authorized_scopes: BTreeSet<ConsentScope>,
    pub granted_by: String,
    pub justification: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SecurityClearance {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now)
    }

    /// Whether this clearance authorizes every scope in `required`
    pub fn authorizes(&self, required: &BTreeSet<ConsentScope>) -> bool {
        required.iter().all(|s| self.authorized_scopes.contains(s))
    }
}

/// Stable machine error codes for policy denials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyErrorCode {
    PolicyProhibitsUnhashed,
    MissingConsentScopes,
    InsufficientConsentScopes,
    MissingClearance,
    ClearanceExpired,
    ClearanceInsufficient,
}

impl PolicyErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyErrorCode::PolicyProhibitsUnhashed => "POLICY_PROHIBITS_UNHASHED",
            PolicyErrorCode::MissingConsentScopes => "MISSING_CONSENT_SCOPES",
            PolicyErrorCode::InsufficientConsentScopes => "INSUFFICIENT_CONSENT_SCOPES",
            PolicyErrorCode::MissingClearance => "MISSING_CLEARANCE",
            PolicyErrorCode::ClearanceExpired => "CLEARANCE_EXPIRED",
            PolicyErrorCode::ClearanceInsufficient => "CLEARANCE_INSUFFICIENT",
        }
    }
}

impl fmt::Display for PolicyErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one policy evaluation
///
/// Immutable, one per evaluation call; logged to the audit sink before the
/// decision is returned, never persisted as mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub decision_id: Uuid,
    pub permitted: bool,
    pub policy_name: String,
    pub policy_version: String,
    pub reason: String,
    pub error_code: Option<PolicyErrorCode>,
    pub metadata: BTreeMap<String, String>,
    pub decided_at: DateTime<Utc>,
}

impl PolicyDecision {
    pub fn permit(
        policy_name: &str,
        policy_version: &str,
        reason: impl Into<String>,
        metadata: BTreeMap<String, String>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            decision_id: Uuid::new_v4(),
            permitted: true,
            policy_name: policy_name.to_string(),
            policy_version: policy_version.to_string(),
            reason: reason.into(),
            error_code: None,
            metadata,
            decided_at,
        }
    }

    pub fn deny(
        policy_name: &str,
        policy_version: &str,
        code: PolicyErrorCode,
        reason: impl Into<String>,
        mut metadata: BTreeMap<String, String>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        metadata.insert("error_code".to_string(), code.as_str().to_string());
        Self {
            decision_id: Uuid::new_v4(),
            permitted: false,
            policy_name: policy_name.to_string(),
            policy_version: policy_version.to_string(),
            reason: reason.into(),
            error_code: Some(code),
            metadata,
            decided_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn clearance(expires_at: DateTime<Utc>, scopes: &[ConsentScope]) -> SecurityClearance {
        SecurityClearance {
            clearance_id: ClearanceId::generate(),
            holder_user_id: Uuid::new_v4(),
            holder_roles: BTreeSet::from(["DATA_STEWARD".to_string()]),
            authorized_scopes: scopes.iter().copied().collect(),
            granted_by: "supervisor".to_string(),
            justification: "Annual HUD submission".to_string(),
            issued_at: expires_at - Duration::hours(24),
            expires_at,
        }
    }

    #[test]
    fn test_clearance_expiry_is_strict() {
        let now = Utc::now();
        let c = clearance(now, &[ConsentScope::PiiDisclosure]);
        // expires_at == now is already expired
        assert!(c.is_expired(now));
        assert!(c.is_valid(now - Duration::seconds(1)));
        assert!(c.is_expired(now + Duration::seconds(1)));
    }

    #[test]
    fn test_clearance_scope_coverage() {
        let now = Utc::now();
        let c = clearance(
            now + Duration::hours(1),
            &[ConsentScope::PiiDisclosure, ConsentScope::HudReporting],
        );
        let required: BTreeSet<_> = [ConsentScope::PiiDisclosure].into_iter().collect();
        assert!(c.authorizes(&required));

        let broader: BTreeSet<_> = [ConsentScope::PiiDisclosure, ConsentScope::CoordinatedEntry]
            .into_iter()
            .collect();
        assert!(!c.authorizes(&broader));
    }

    #[test]
    fn test_hash_behavior_predicates() {
        assert!(ExportHashBehavior::AlwaysHash.prohibits_unhashed());
        assert!(ExportHashBehavior::NeverHash.allows_unhashed_by_default());
        assert!(!ExportHashBehavior::ConsentBased.prohibits_unhashed());
        assert!(!ExportHashBehavior::ConsentBased.allows_unhashed_by_default());
    }

    #[test]
    fn test_deny_decision_records_error_code() {
        let decision = PolicyDecision::deny(
            "EXPORT_HASH_POLICY",
            "v1.0",
            PolicyErrorCode::MissingClearance,
            "No security clearance provided",
            BTreeMap::new(),
            Utc::now(),
        );
        assert!(!decision.permitted);
        assert_eq!(decision.error_code, Some(PolicyErrorCode::MissingClearance));
        assert_eq!(
            decision.metadata.get("error_code").map(String::as_str),
            Some("MISSING_CLEARANCE")
        );
    }
}
