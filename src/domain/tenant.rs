//! Per-tenant export policy configuration
//!
//! Created and updated by administrative action outside this crate's scope;
//! read-only to the export core.

use crate::domain::ids::TenantId;
use crate::domain::policy::{ConsentScope, ExportHashBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tenant-level policy settings consumed by the policy gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantExportConfig {
    pub tenant_id: TenantId,
    pub organization_name: String,
    pub hash_behavior: ExportHashBehavior,
    pub required_scopes_for_unhashed: BTreeSet<ConsentScope>,
    pub clearance_required: bool,
    pub clearance_validity_hours: u32,
    pub notification_recipients: BTreeSet<String>,
}

impl TenantExportConfig {
    /// Default secure configuration used when no tenant record exists
    pub fn default_for(tenant_id: TenantId, organization_name: impl Into<String>) -> Self {
        Self {
            tenant_id,
            organization_name: organization_name.into(),
            hash_behavior: ExportHashBehavior::AlwaysHash,
            required_scopes_for_unhashed: [ConsentScope::PiiDisclosure, ConsentScope::HudReporting]
                .into_iter()
                .collect(),
            clearance_required: true,
            clearance_validity_hours: 24,
            notification_recipients: BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_is_locked_down() {
        let config = TenantExportConfig::default_for(TenantId::generate(), "Test CoC");
        assert_eq!(config.hash_behavior, ExportHashBehavior::AlwaysHash);
        assert!(config.clearance_required);
        assert_eq!(config.clearance_validity_hours, 24);
        assert!(config
            .required_scopes_for_unhashed
            .contains(&ConsentScope::PiiDisclosure));
        assert!(config
            .required_scopes_for_unhashed
            .contains(&ConsentScope::HudReporting));
    }
}
