//! Domain models and types for the export pipeline
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`ExportJobId`], [`TenantId`], [`ProjectId`])
//! - **Policy value objects** ([`SecurityClearance`], [`PolicyDecision`], [`ConsentScope`])
//! - **Reporting periods** with CoC operating-year windowing ([`ExportPeriod`])
//! - **Error types** ([`HavenError`] and subsystem errors)
//! - **Result type alias** ([`Result`])
//!
//! Identifiers use the newtype pattern so an [`ExportJobId`] can never be
//! passed where a [`TenantId`] is expected. All fallible operations return
//! [`Result<T>`] and errors convert with `?`.

pub mod errors;
pub mod ids;
pub mod period;
pub mod policy;
pub mod request;
pub mod result;
pub mod tenant;

// Re-export commonly used types for convenience
pub use errors::{CryptoError, HavenError, LedgerError, PolicyViolation, StorageError};
pub use ids::{ClearanceId, ExportJobId, ProjectId, TenantId};
pub use period::ExportPeriod;
pub use policy::{
    ConsentScope, ExportHashBehavior, PolicyDecision, PolicyErrorCode, SecurityClearance,
};
pub use request::{AccessContext, ExportRequest};
pub use result::Result;
pub use tenant::TenantExportConfig;
