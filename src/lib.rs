// Haven Export - HUD HMIS CSV Export Pipeline
// Copyright (c) 2025 Haven Contributors
// Licensed under the MIT License

//! # Haven Export - HUD HMIS CSV Export Pipeline
//!
//! Haven Export materializes HMIS client, enrollment, and service data into
//! HUD-specified CSV bundles, applies VAWA confidentiality suppression,
//! enforces a consent/hash security policy, encrypts and stores the
//! resulting artifact, and writes an immutable compliance audit trail.
//!
//! ## Overview
//!
//! The pipeline for one export job:
//! - **Policy gate** - hashed vs. unhashed mode is evaluated against tenant
//!   configuration, consent scopes, and a time-boxed security clearance;
//!   denied requests never become jobs
//! - **Materialize** - per-entity CSV row sets with operating-year
//!   windowing and per-row VAWA suppression
//! - **Validate** - date-range, picklist, required-field, and
//!   date-sequence checks producing PII-safe diagnostics
//! - **Package / encrypt / store** - signed ZIP bundle, envelope
//!   encryption under a rotating master key, year/month artifact layout
//! - **Finalize** - consent-ledger entry, administrator notification,
//!   durable audit metadata
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (policy, generate, validate, package,
//!   crypto, job state machine, orchestration)
//! - [`adapters`] - External integrations (data source, artifact store,
//!   consent ledger, notifications)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use haven_export::config::load_config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("haven.toml")?;
//!     println!("Exporting for {}", config.tenant.organization_name);
//!     Ok(())
//! }
//! ```
//!
//! The job's observable state is always the fold of its append-only event
//! log; see [`core::job`] for the state machine and durability contract.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
