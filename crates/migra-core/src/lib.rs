//! # migra-core: Pure Data Contracts for Migra
//!
//! This crate is the **heart** of Migra. It holds the data contracts that flow
//! between the CRM source, the document store, and the sync controller, plus
//! the validator that reconciles the two stores. Zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Migra Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                External Scheduler (cron, timer)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ run_cycle                              │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  migra-sync (SyncController)                    │   │
//! │  │    fetch ──► incremental load ──► validate ──► count compare   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ migra-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌─────────────┐  ┌────────────┐  ┌──────────┐ │   │
//! │  │   │  Record   │  │ Discrepancy │  │  RunState  │  │validation│ │   │
//! │  │   │  (fields) │  │  (report)   │  │  LogEntry  │  │  diffing │ │   │
//! │  │   └───────────┘  └─────────────┘  └────────────┘  └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    migra-db (Database Layer)                    │   │
//! │  │          lead documents, run-state, reports, sync log           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Record, SyncRunState, Discrepancy, CountComparison, SyncLogEntry
//! - [`validation`] - Source-driven validator and incremental key diffing
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use std::collections::HashMap;
//! use migra_core::{validation::validate, Record};
//! use serde_json::json;
//!
//! let source = vec![Record::from_value(json!({"Email": "p@x", "Lead_Status": "New"})).unwrap()];
//! let mut destination = HashMap::new();
//! destination.insert(
//!     "p@x".to_string(),
//!     Record::from_value(json!({"Email": "p@x", "Lead_Status": "Closed"})).unwrap(),
//! );
//!
//! let report = validate(&source, &destination, &["Lead_Status".to_string()], "Email");
//! assert_eq!(report.len(), 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Field that identifies a lead in both stores.
pub const DEFAULT_KEY_FIELD: &str = "Email";

/// Fields requested from the CRM for every lead.
pub const DEFAULT_LEAD_FIELDS: &[&str] = &[
    "First_Name",
    "Last_Name",
    "Email",
    "Phone",
    "Company",
    "Industry",
    "Lead_Status",
];

/// Fields compared by the validator when nothing else is configured.
///
/// ## Why only three?
/// These are the fields the migration owners sign off on. Other fields are
/// copied verbatim but mismatches there are not reported.
pub const DEFAULT_REQUIRED_FIELDS: &[&str] = &["Email", "Lead_Status", "Phone"];
