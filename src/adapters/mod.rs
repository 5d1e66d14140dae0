//! Infrastructure adapters behind the core's trait seams

pub mod ledger;
pub mod notify;
pub mod source;
pub mod storage;
