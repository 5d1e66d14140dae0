//! Core export pipeline logic

pub mod crypto;
pub mod generate;
pub mod job;
pub mod orchestrate;
pub mod package;
pub mod policy;
pub mod validate;
