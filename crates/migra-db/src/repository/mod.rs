//! # Repository Module
//!
//! Database repository implementations for Migra.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  SyncController (via collaborator traits)                              │
//! │       │                                                                 │
//! │       │  db.leads().insert_many(&new_records, "Email")                 │
//! │       ▼                                                                 │
//! │  LeadRepository                                                        │
//! │  ├── all_keys(&self)                                                   │
//! │  ├── all_documents(&self, exclude)                                     │
//! │  ├── insert_many(&self, records, key_field)                            │
//! │  └── count(&self)                                                      │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`LeadRepository`] - Mirrored lead documents
//! - [`RunStateRepository`] - The run/skip flag
//! - [`DiscrepancyRepository`] - Latest discrepancy and count-mismatch reports
//! - [`SyncLogRepository`] - Append-only cycle audit log
//! - [`ExtractSnapshotRepository`] - Archived extractions, one per cycle

pub mod discrepancy;
pub mod extract_snapshot;
pub mod lead;
pub mod run_state;
pub mod sync_log;

pub use discrepancy::DiscrepancyRepository;
pub use extract_snapshot::ExtractSnapshotRepository;
pub use lead::LeadRepository;
pub use run_state::RunStateRepository;
pub use sync_log::SyncLogRepository;
