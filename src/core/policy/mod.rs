//! Export hash policy evaluation
//!
//! The gate in front of every export request. Evaluation is a pure function
//! of its inputs plus the supplied clock; a denial is final for that
//! request and must be resubmitted with corrected inputs. There are no
//! retries at this layer.

pub mod sinks;

pub use sinks::{InMemorySink, JsonFileSink, PolicyAuditRecord, PolicyAuditSink, SecurityMonitoringSink};

use crate::domain::policy::{ConsentScope, ExportHashBehavior, PolicyDecision, PolicyErrorCode};
use crate::domain::request::{AccessContext, ExportRequest};
use crate::domain::result::Result;
use crate::domain::tenant::TenantExportConfig;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const POLICY_NAME: &str = "EXPORT_HASH_POLICY";
pub const POLICY_VERSION: &str = "v1.0";

/// Evaluates whether a requested export mode is permitted
///
/// Both sinks receive the evaluation before the decision is returned to
/// the caller, so audit durability cannot be bypassed by a downstream
/// failure.
pub struct ExportSecurityPolicyService {
    audit: Arc<dyn PolicyAuditSink>,
    monitoring: Arc<dyn SecurityMonitoringSink>,
}

impl ExportSecurityPolicyService {
    pub fn new(audit: Arc<dyn PolicyAuditSink>, monitoring: Arc<dyn SecurityMonitoringSink>) -> Self {
        Self { audit, monitoring }
    }

    /// Runs the decision algorithm and forwards the outcome to the sinks.
    pub async fn evaluate(
        &self,
        tenant: &TenantExportConfig,
        request: &ExportRequest,
        context: &AccessContext,
        now: DateTime<Utc>,
    ) -> Result<PolicyDecision> {
        let decision = decide(tenant, request, now);

        let record = PolicyAuditRecord {
            tenant_id: tenant.tenant_id,
            user_id: context.user_id,
            user_name: context.user_name.clone(),
            ip_address: context.ip_address.clone(),
            session_id: context.session_id.clone(),
            requested_hashed: request.hashed,
            provided_scopes: request.scopes(),
            clearance_id: request.clearance.as_ref().map(|c| c.clearance_id),
            clearance_expires_at: request.clearance.as_ref().map(|c| c.expires_at),
            decision: decision.clone(),
            recorded_at: now,
        };

        // Audit gets every evaluation; the monitoring sink tracks unhashed
        // attempts specifically. Both writes land before the caller can
        // observe the decision.
        self.audit.record(&record).await?;
        if !request.hashed {
            self.monitoring.record_attempt(&record).await?;
        }

        if decision.permitted {
            tracing::info!(
                tenant_id = %tenant.tenant_id,
                user = %context.user_name,
                hashed = request.hashed,
                "Export permitted by policy"
            );
        } else {
            tracing::warn!(
                tenant_id = %tenant.tenant_id,
                user = %context.user_name,
                error_code = decision.error_code.map(|c| c.as_str()).unwrap_or(""),
                reason = %decision.reason,
                "Export denied by policy"
            );
        }

        Ok(decision)
    }
}

/// The pure decision algorithm; first matching rule wins.
fn decide(tenant: &TenantExportConfig, request: &ExportRequest, now: DateTime<Utc>) -> PolicyDecision {
    let mut metadata = BTreeMap::new();
    metadata.insert("tenant_id".to_string(), tenant.tenant_id.to_string());
    metadata.insert(
        "hash_behavior".to_string(),
        tenant.hash_behavior.to_string(),
    );
    metadata.insert("requested_hashed".to_string(), request.hashed.to_string());

    // Hashed exports carry no disclosure risk requiring clearance
    if request.hashed {
        return PolicyDecision::permit(
            POLICY_NAME,
            POLICY_VERSION,
            "Hashed export requested - complies with all security policies",
            metadata,
            now,
        );
    }

    match tenant.hash_behavior {
        ExportHashBehavior::AlwaysHash => PolicyDecision::deny(
            POLICY_NAME,
            POLICY_VERSION,
            PolicyErrorCode::PolicyProhibitsUnhashed,
            format!(
                "Tenant policy for {} requires all exports to be hashed",
                tenant.organization_name
            ),
            metadata,
            now,
        ),
        ExportHashBehavior::NeverHash => PolicyDecision::permit(
            POLICY_NAME,
            POLICY_VERSION,
            "Tenant policy permits unhashed exports unconditionally",
            metadata,
            now,
        ),
        ExportHashBehavior::ConsentBased => {
            decide_consent_based(tenant, request, now, metadata)
        }
    }
}

fn decide_consent_based(
    tenant: &TenantExportConfig,
    request: &ExportRequest,
    now: DateTime<Utc>,
    metadata: BTreeMap<String, String>,
) -> PolicyDecision {
    let provided = request.scopes();
    if provided.is_empty() {
        return PolicyDecision::deny(
            POLICY_NAME,
            POLICY_VERSION,
            PolicyErrorCode::MissingConsentScopes,
            "Unhashed export requires consent scopes and none were provided",
            metadata,
            now,
        );
    }

    let missing: BTreeSet<ConsentScope> = tenant
        .required_scopes_for_unhashed
        .difference(&provided)
        .copied()
        .collect();
    if !missing.is_empty() {
        return PolicyDecision::deny(
            POLICY_NAME,
            POLICY_VERSION,
            PolicyErrorCode::InsufficientConsentScopes,
            format!(
                "Provided consent scopes do not cover the required set; missing: {}",
                scope_list(&missing)
            ),
            metadata,
            now,
        );
    }

    let clearance = match &request.clearance {
        Some(clearance) => clearance,
        None => {
            return PolicyDecision::deny(
                POLICY_NAME,
                POLICY_VERSION,
                PolicyErrorCode::MissingClearance,
                "Unhashed export requires a security clearance and none was provided",
                metadata,
                now,
            );
        }
    };

    if clearance.is_expired(now) {
        return PolicyDecision::deny(
            POLICY_NAME,
            POLICY_VERSION,
            PolicyErrorCode::ClearanceExpired,
            format!(
                "Security clearance {} expired at {}",
                clearance.clearance_id, clearance.expires_at
            ),
            metadata,
            now,
        );
    }

    // Conservative reading: the clearance must authorize every provided
    // scope, not just the PII-disclosure subset
    let unauthorized: BTreeSet<ConsentScope> = provided
        .difference(&clearance.authorized_scopes)
        .copied()
        .collect();
    if !unauthorized.is_empty() {
        return PolicyDecision::deny(
            POLICY_NAME,
            POLICY_VERSION,
            PolicyErrorCode::ClearanceInsufficient,
            format!(
                "Security clearance {} does not authorize: {}",
                clearance.clearance_id,
                scope_list(&unauthorized)
            ),
            metadata,
            now,
        );
    }

    PolicyDecision::permit(
        POLICY_NAME,
        POLICY_VERSION,
        "Unhashed export authorized by consent scopes and valid clearance",
        metadata,
        now,
    )
}

fn scope_list(scopes: &BTreeSet<ConsentScope>) -> String {
    scopes
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{ClearanceId, TenantId};
    use crate::domain::period::ExportPeriod;
    use crate::domain::policy::SecurityClearance;
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    fn tenant(behavior: ExportHashBehavior) -> TenantExportConfig {
        TenantExportConfig {
            tenant_id: TenantId::generate(),
            organization_name: "Harbor CoC".to_string(),
            hash_behavior: behavior,
            required_scopes_for_unhashed: [ConsentScope::PiiDisclosure, ConsentScope::HudReporting]
                .into_iter()
                .collect(),
            clearance_required: true,
            clearance_validity_hours: 24,
            notification_recipients: BTreeSet::new(),
        }
    }

    fn request(hashed: bool) -> ExportRequest {
        ExportRequest {
            export_type: "HMIS_CSV".to_string(),
            period: ExportPeriod::between(
                NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
            )
            .unwrap(),
            project_ids: vec![],
            coc_code: "CA-600".to_string(),
            reason: "Annual submission".to_string(),
            hashed,
            consent_scopes: None,
            clearance: None,
        }
    }

    fn clearance(
        now: DateTime<Utc>,
        valid_for: Duration,
        scopes: &[ConsentScope],
    ) -> SecurityClearance {
        SecurityClearance {
            clearance_id: ClearanceId::generate(),
            holder_user_id: Uuid::new_v4(),
            holder_roles: BTreeSet::from(["DATA_STEWARD".to_string()]),
            authorized_scopes: scopes.iter().copied().collect(),
            granted_by: "supervisor".to_string(),
            justification: "Annual HUD submission".to_string(),
            issued_at: now,
            expires_at: now + valid_for,
        }
    }

    fn full_scopes() -> BTreeSet<ConsentScope> {
        [ConsentScope::PiiDisclosure, ConsentScope::HudReporting]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_hashed_always_permitted() {
        let now = Utc::now();
        for behavior in [
            ExportHashBehavior::AlwaysHash,
            ExportHashBehavior::NeverHash,
            ExportHashBehavior::ConsentBased,
        ] {
            let decision = decide(&tenant(behavior), &request(true), now);
            assert!(decision.permitted, "{behavior}");
            assert!(decision.reason.contains("complies with all security policies"));
        }
    }

    #[test]
    fn test_always_hash_prohibits_unhashed() {
        let decision = decide(
            &tenant(ExportHashBehavior::AlwaysHash),
            &request(false),
            Utc::now(),
        );
        assert!(!decision.permitted);
        assert_eq!(
            decision.error_code,
            Some(PolicyErrorCode::PolicyProhibitsUnhashed)
        );
    }

    #[test]
    fn test_never_hash_permits_without_consent() {
        let decision = decide(
            &tenant(ExportHashBehavior::NeverHash),
            &request(false),
            Utc::now(),
        );
        assert!(decision.permitted);
    }

    #[test]
    fn test_consent_based_requires_scopes() {
        let decision = decide(
            &tenant(ExportHashBehavior::ConsentBased),
            &request(false),
            Utc::now(),
        );
        assert_eq!(
            decision.error_code,
            Some(PolicyErrorCode::MissingConsentScopes)
        );
    }

    #[test]
    fn test_insufficient_scopes_names_missing() {
        let mut req = request(false);
        req.consent_scopes = Some([ConsentScope::PiiDisclosure].into_iter().collect());
        let decision = decide(&tenant(ExportHashBehavior::ConsentBased), &req, Utc::now());
        assert_eq!(
            decision.error_code,
            Some(PolicyErrorCode::InsufficientConsentScopes)
        );
        assert!(decision.reason.contains("HUD_REPORTING"));
    }

    #[test]
    fn test_missing_clearance() {
        let mut req = request(false);
        req.consent_scopes = Some(full_scopes());
        let decision = decide(&tenant(ExportHashBehavior::ConsentBased), &req, Utc::now());
        assert_eq!(decision.error_code, Some(PolicyErrorCode::MissingClearance));
    }

    #[test]
    fn test_expired_clearance_boundary() {
        let now = Utc::now();
        let mut req = request(false);
        req.consent_scopes = Some(full_scopes());

        // Expires exactly now: already expired
        req.clearance = Some(clearance(
            now - Duration::hours(24),
            Duration::hours(24),
            &[ConsentScope::PiiDisclosure, ConsentScope::HudReporting],
        ));
        let decision = decide(&tenant(ExportHashBehavior::ConsentBased), &req, now);
        assert_eq!(decision.error_code, Some(PolicyErrorCode::ClearanceExpired));

        // One second of validity left: permitted
        req.clearance = Some(clearance(
            now,
            Duration::seconds(1),
            &[ConsentScope::PiiDisclosure, ConsentScope::HudReporting],
        ));
        let decision = decide(&tenant(ExportHashBehavior::ConsentBased), &req, now);
        assert!(decision.permitted);
    }

    #[test]
    fn test_clearance_must_cover_provided_scopes() {
        let now = Utc::now();
        let mut req = request(false);
        req.consent_scopes = Some(full_scopes());
        req.clearance = Some(clearance(
            now,
            Duration::hours(1),
            &[ConsentScope::PiiDisclosure],
        ));
        let decision = decide(&tenant(ExportHashBehavior::ConsentBased), &req, now);
        assert_eq!(
            decision.error_code,
            Some(PolicyErrorCode::ClearanceInsufficient)
        );
        assert!(decision.reason.contains("HUD_REPORTING"));
    }

    #[tokio::test]
    async fn test_sinks_receive_unhashed_evaluation() {
        let audit = Arc::new(InMemorySink::new());
        let monitoring = Arc::new(InMemorySink::new());
        let service = ExportSecurityPolicyService::new(audit.clone(), monitoring.clone());

        let context = AccessContext::new(Uuid::new_v4(), "steward");
        let decision = service
            .evaluate(
                &tenant(ExportHashBehavior::AlwaysHash),
                &request(false),
                &context,
                Utc::now(),
            )
            .await
            .unwrap();

        assert!(!decision.permitted);
        assert_eq!(audit.records().await.len(), 1);
        assert_eq!(monitoring.records().await.len(), 1);
        assert!(!audit.records().await[0].decision.permitted);
    }

    #[tokio::test]
    async fn test_hashed_evaluation_audited_but_not_monitored() {
        let audit = Arc::new(InMemorySink::new());
        let monitoring = Arc::new(InMemorySink::new());
        let service = ExportSecurityPolicyService::new(audit.clone(), monitoring.clone());

        let context = AccessContext::new(Uuid::new_v4(), "steward");
        let decision = service
            .evaluate(
                &tenant(ExportHashBehavior::AlwaysHash),
                &request(true),
                &context,
                Utc::now(),
            )
            .await
            .unwrap();

        assert!(decision.permitted);
        assert_eq!(audit.records().await.len(), 1);
        assert!(monitoring.records().await.is_empty());
    }

    #[test]
    fn test_decision_is_idempotent_for_fixed_clock() {
        let now = Utc::now();
        let mut req = request(false);
        req.consent_scopes = Some(full_scopes());
        let config = tenant(ExportHashBehavior::ConsentBased);

        let first = decide(&config, &req, now);
        let second = decide(&config, &req, now);
        assert_eq!(first.permitted, second.permitted);
        assert_eq!(first.error_code, second.error_code);
        assert_eq!(first.reason, second.reason);
    }
}
