//! Export job state machine and durable event log

pub mod aggregate;
pub mod events;
pub mod repository;

pub use aggregate::ExportJobAggregate;
pub use events::{ExportJobEvent, ExportJobState};
pub use repository::EventSourcedExportJobRepository;
