//! # Collaborator Traits
//!
//! The narrow interfaces the [`SyncController`](crate::controller::SyncController)
//! drives. Production wiring uses [`CrmClient`](crate::source::CrmClient) for
//! the source and [`migra_db::Database`] for everything else (see
//! [`store`](crate::store)); tests substitute in-memory fakes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SyncController                                 │
//! │                                                                         │
//! │   RecordSource ─── fetch_page / fetch_count         (CRM over HTTP)    │
//! │   RecordStore ──── get_all_keys / get_all /         (leads table)      │
//! │                    insert_many / count                                 │
//! │   ExtractArchive ─ archive                          (extract_snapshots)│
//! │   RunStateStore ── load / save                      (run_state)        │
//! │   DiscrepancySink  persist / persist_count          (discrepancies)    │
//! │   LogSink ──────── append        (fire-and-forget)  (sync_log)         │
//! │   CompletionNotifier notify      (never fatal)      (log / webhook)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::{SourceError, SyncResult};
use migra_core::{
    CountComparison, DestinationSnapshot, Discrepancy, ExtractSnapshot, Record, SyncLogEntry,
    SyncRunState,
};

/// One page of source records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePage {
    pub records: Vec<Record>,

    /// False once the source has nothing after this page.
    pub has_more: bool,
}

impl SourcePage {
    /// A terminal page with no records.
    pub fn empty() -> Self {
        SourcePage::default()
    }
}

/// Paginated read access to the CRM.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetches page `page` (1-based) of `page_size` records.
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<SourcePage, SourceError>;

    /// Total number of records the source holds.
    async fn fetch_count(&self) -> Result<u64, SourceError>;
}

/// The destination document collection.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every key present in the destination.
    async fn get_all_keys(&self) -> SyncResult<HashSet<String>>;

    /// Every stored document, keyed, minus `exclude_fields`.
    async fn get_all(&self, exclude_fields: &[String]) -> SyncResult<DestinationSnapshot>;

    /// Inserts all records in one transaction. Returns rows written.
    async fn insert_many(&self, records: &[Record], key_field: &str) -> SyncResult<u64>;

    /// Number of stored documents.
    async fn count(&self) -> SyncResult<u64>;
}

/// Keeps a copy of every extraction.
#[async_trait]
pub trait ExtractArchive: Send + Sync {
    async fn archive(&self, snapshot: &ExtractSnapshot) -> SyncResult<()>;
}

/// Persistence of the run/skip flag.
#[async_trait]
pub trait RunStateStore: Send + Sync {
    /// Current state; `run_enabled = true` if never saved.
    async fn load(&self) -> SyncResult<SyncRunState>;

    async fn save(&self, state: &SyncRunState) -> SyncResult<()>;
}

/// Where discrepancy findings are kept.
#[async_trait]
pub trait DiscrepancySink: Send + Sync {
    /// Replaces the previous report. An empty report clears it.
    async fn persist(&self, cycle_id: &str, report: &[Discrepancy]) -> SyncResult<()>;

    /// Records a mismatch, or clears the stored one when counts match.
    async fn persist_count(&self, cycle_id: &str, comparison: &CountComparison) -> SyncResult<()>;
}

/// Append-only audit trail.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn append(&self, entry: &SyncLogEntry) -> SyncResult<()>;
}

/// Announces that the migration has converged.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, message: &str) -> SyncResult<()>;
}
