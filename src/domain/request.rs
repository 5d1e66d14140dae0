//! Inbound export request and access context
//!
//! These structs are the interface the export core consumes from the
//! (out-of-scope) REST layer. Access context is passed explicitly through
//! every call rather than read from ambient security state.

use crate::domain::ids::ProjectId;
use crate::domain::period::ExportPeriod;
use crate::domain::policy::{ConsentScope, SecurityClearance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Who is asking, from where
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessContext {
    pub user_id: Uuid,
    pub user_name: String,
    pub roles: Vec<String>,
    pub ip_address: String,
    pub session_id: String,
    pub user_agent: String,
}

impl AccessContext {
    pub fn new(user_id: Uuid, user_name: impl Into<String>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            roles: Vec::new(),
            ip_address: String::new(),
            session_id: String::new(),
            user_agent: String::new(),
        }
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_network(
        mut self,
        ip_address: impl Into<String>,
        session_id: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        self.ip_address = ip_address.into();
        self.session_id = session_id.into();
        self.user_agent = user_agent.into();
        self
    }
}

/// One export request as accepted from the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Export type tag (HMIS_CSV, CoC_APR, ESG_CAPER, ...)
    pub export_type: String,
    pub period: ExportPeriod,
    pub project_ids: Vec<ProjectId>,
    pub coc_code: String,
    /// Free-text justification recorded in the audit trail
    pub reason: String,
    /// true = hashed identifiers, false = unhashed (policy-gated)
    pub hashed: bool,
    /// Consent scopes supplied with the request, if any
    pub consent_scopes: Option<BTreeSet<ConsentScope>>,
    /// Security clearance supplied with the request, if any
    pub clearance: Option<SecurityClearance>,
}

impl ExportRequest {
    /// Scopes as a set, empty when none were supplied
    pub fn scopes(&self) -> BTreeSet<ConsentScope> {
        self.consent_scopes.clone().unwrap_or_default()
    }
}
