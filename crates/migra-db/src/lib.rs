//! # migra-db: Database Layer for Migra
//!
//! This crate provides the destination document store and the small pieces of
//! persistent state the sync controller needs between invocations. It uses
//! SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Migra Data Flow                                │
//! │                                                                         │
//! │  SyncController (migra-sync)                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     migra-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌─────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories   │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                 │   │  (embedded)  │  │   │
//! │  │   │               │    │ LeadRepo        │   │              │  │   │
//! │  │   │ SqlitePool    │◄───│ RunStateRepo    │   │ 001_initial  │  │   │
//! │  │   │ Connection    │    │ DiscrepancyRepo │   │  _schema.sql │  │   │
//! │  │   │ Management    │    │ SyncLogRepo     │   │              │  │   │
//! │  │   └───────────────┘    └─────────────────┘   └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Lead, run-state, discrepancy and sync-log repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use migra_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("migra.db")).await?;
//!
//! let keys = db.leads().all_keys().await?;
//! let state = db.run_state().load().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::discrepancy::DiscrepancyRepository;
pub use repository::extract_snapshot::ExtractSnapshotRepository;
pub use repository::lead::LeadRepository;
pub use repository::run_state::RunStateRepository;
pub use repository::sync_log::SyncLogRepository;
