//! # migra-sync: Sync Engine for Migra
//!
//! Moves CRM leads into the local document store, one cycle per invocation,
//! and stops itself once both stores hold the same number of records.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Migra Cycle Architecture                         │
//! │                                                                         │
//! │  external scheduler (cron, systemd timer, ...)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  run_cycle binary ── MigraConfig::load ── Database::new                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      SyncController                              │  │
//! │  │  gate → extract → incremental load → validate → count → state   │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │   CrmClient    │  │    Database    │  │  CompletionNotifier    │    │
//! │  │  (reqwest)     │  │  (migra-db)    │  │  log / webhook         │    │
//! │  │                │  │                │  │                        │    │
//! │  │ RecordSource   │  │ RecordStore    │  │ fired when counts      │    │
//! │  │                │  │ RunStateStore  │  │ match                  │    │
//! │  │                │  │ DiscrepancySink│  │                        │    │
//! │  │                │  │ LogSink        │  │                        │    │
//! │  │                │  │ ExtractArchive │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`controller`] - `SyncController` and the cycle outcome types
//! - [`collaborators`] - traits the controller drives
//! - [`source`] - CRM HTTP client and capped extraction
//! - [`store`] - collaborator impls on `migra_db::Database`
//! - [`notify`] - completion notifiers
//! - [`config`] - TOML + environment configuration
//! - [`error`] - sync and source error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use migra_sync::{Collaborators, CrmClient, CycleSettings, MigraConfig, SyncController};
//!
//! let config = MigraConfig::load(None)?;
//! let db = Database::new(DbConfig::new(config.destination.database_path())).await?;
//! let source = Arc::new(CrmClient::new(&config.source)?);
//! let notifier = migra_sync::notify::from_settings(&config.notify, config.source.timeout())?;
//!
//! let controller = SyncController::new(
//!     CycleSettings::from(&config),
//!     Collaborators::with_database(source, db, notifier),
//! );
//! controller.run_cycle().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod notify;
pub mod source;
pub mod store;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use collaborators::{
    CompletionNotifier, DiscrepancySink, ExtractArchive, LogSink, RecordSource, RecordStore,
    RunStateStore, SourcePage,
};
pub use config::{MigraConfig, ValidationSource};
pub use controller::{Collaborators, CycleOutcome, CycleReport, CycleSettings, SyncController};
pub use error::{SourceError, SyncError, SyncResult};
pub use notify::{LogNotifier, WebhookNotifier};
pub use source::{fetch_capped, CrmClient};
