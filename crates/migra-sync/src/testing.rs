//! In-memory collaborator fakes for controller and extraction tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::collaborators::{
    CompletionNotifier, DiscrepancySink, ExtractArchive, LogSink, RecordSource, RecordStore,
    RunStateStore, SourcePage,
};
use crate::controller::{Collaborators, CycleSettings, SyncController};
use crate::error::{SourceError, SyncError, SyncResult};
use migra_core::{
    CountComparison, DestinationSnapshot, Discrepancy, ExtractSnapshot, LogStage, Record,
    SyncLogEntry, SyncRunState,
};

pub fn lead(email: &str, status: &str) -> Record {
    Record::new()
        .with("Email", email)
        .with("Lead_Status", status)
        .with("Phone", serde_json::Value::Null)
}

// =============================================================================
// Source
// =============================================================================

#[derive(Default)]
pub struct FakeSource {
    records: Mutex<Vec<Record>>,
    pages: Mutex<Vec<u32>>,
    page_failure: Mutex<Option<(u32, SourceError)>>,
    count_override: Mutex<Option<u64>>,
    count_failure: Mutex<Option<SourceError>>,
}

impl FakeSource {
    pub fn new(records: Vec<Record>) -> Self {
        FakeSource {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    pub fn with_emails(emails: &[&str]) -> Self {
        Self::new(emails.iter().map(|e| lead(e, "New")).collect())
    }

    pub fn set_records(&self, records: Vec<Record>) {
        *self.records.lock().unwrap() = records;
    }

    /// Pages `from` and later fail with `err`.
    pub fn fail_pages_from(&self, from: u32, err: SourceError) {
        *self.page_failure.lock().unwrap() = Some((from, err));
    }

    pub fn fail_count(&self, err: SourceError) {
        *self.count_failure.lock().unwrap() = Some(err);
    }

    /// Makes `fetch_count` report `count` regardless of the records held.
    pub fn report_count(&self, count: u64) {
        *self.count_override.lock().unwrap() = Some(count);
    }

    pub fn pages_requested(&self) -> Vec<u32> {
        self.pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<SourcePage, SourceError> {
        self.pages.lock().unwrap().push(page);

        if let Some((from, err)) = self.page_failure.lock().unwrap().as_ref() {
            if page >= *from {
                return Err(err.clone());
            }
        }

        let records = self.records.lock().unwrap();
        let start = ((page - 1) * page_size) as usize;
        let end = (start + page_size as usize).min(records.len());
        if start >= records.len() {
            return Ok(SourcePage::empty());
        }

        Ok(SourcePage {
            records: records[start..end].to_vec(),
            has_more: end < records.len(),
        })
    }

    async fn fetch_count(&self) -> Result<u64, SourceError> {
        if let Some(err) = self.count_failure.lock().unwrap().clone() {
            return Err(err);
        }
        let count = *self.count_override.lock().unwrap();
        Ok(count.unwrap_or(self.records.lock().unwrap().len() as u64))
    }
}

// =============================================================================
// Destination
// =============================================================================

#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<String, Record>>,
    insert_batches: Mutex<Vec<usize>>,
    fail_inserts: Mutex<bool>,
}

impl MemoryStore {
    pub fn preload(&self, records: Vec<Record>) {
        let mut docs = self.documents.lock().unwrap();
        for record in records {
            let key = record.key("Email").unwrap().to_string();
            docs.insert(key, record);
        }
    }

    pub fn fail_inserts(&self) {
        *self.fail_inserts.lock().unwrap() = true;
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    pub fn get(&self, key: &str) -> Option<Record> {
        self.documents.lock().unwrap().get(key).cloned()
    }

    /// Sizes of every batch passed to `insert_many`.
    pub fn insert_batches(&self) -> Vec<usize> {
        self.insert_batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_all_keys(&self) -> SyncResult<HashSet<String>> {
        Ok(self.documents.lock().unwrap().keys().cloned().collect())
    }

    async fn get_all(&self, exclude_fields: &[String]) -> SyncResult<DestinationSnapshot> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.without_fields(exclude_fields)))
            .collect())
    }

    async fn insert_many(&self, records: &[Record], key_field: &str) -> SyncResult<u64> {
        self.insert_batches.lock().unwrap().push(records.len());
        if *self.fail_inserts.lock().unwrap() {
            return Err(SyncError::Store("disk full".into()));
        }

        let mut docs = self.documents.lock().unwrap();
        let mut inserted = 0;
        for record in records {
            let key = record
                .key(key_field)
                .ok_or_else(|| SyncError::Store("record without key".into()))?;
            if !docs.contains_key(key) {
                docs.insert(key.to_string(), record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn count(&self) -> SyncResult<u64> {
        Ok(self.documents.lock().unwrap().len() as u64)
    }
}

#[derive(Default)]
pub struct MemoryArchive {
    snapshots: Mutex<Vec<ExtractSnapshot>>,
    broken: Mutex<bool>,
}

impl MemoryArchive {
    pub fn break_archive(&self) {
        *self.broken.lock().unwrap() = true;
    }

    pub fn snapshots(&self) -> Vec<ExtractSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractArchive for MemoryArchive {
    async fn archive(&self, snapshot: &ExtractSnapshot) -> SyncResult<()> {
        if *self.broken.lock().unwrap() {
            return Err(SyncError::Store("archive unavailable".into()));
        }
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRunState {
    state: Mutex<Option<SyncRunState>>,
    saves: Mutex<usize>,
}

impl MemoryRunState {
    pub fn disabled() -> Self {
        MemoryRunState {
            state: Mutex::new(Some(SyncRunState::new(false))),
            ..Default::default()
        }
    }

    pub fn current(&self) -> Option<SyncRunState> {
        *self.state.lock().unwrap()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl RunStateStore for MemoryRunState {
    async fn load(&self) -> SyncResult<SyncRunState> {
        Ok(self.state.lock().unwrap().unwrap_or_default())
    }

    async fn save(&self, state: &SyncRunState) -> SyncResult<()> {
        *self.state.lock().unwrap() = Some(*state);
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDiscrepancies {
    report: Mutex<Option<Vec<Discrepancy>>>,
    count_mismatch: Mutex<Option<CountComparison>>,
}

impl MemoryDiscrepancies {
    /// Last persisted report; `None` if nothing was ever persisted.
    pub fn report(&self) -> Option<Vec<Discrepancy>> {
        self.report.lock().unwrap().clone()
    }

    pub fn count_mismatch(&self) -> Option<CountComparison> {
        *self.count_mismatch.lock().unwrap()
    }
}

#[async_trait]
impl DiscrepancySink for MemoryDiscrepancies {
    async fn persist(&self, _cycle_id: &str, report: &[Discrepancy]) -> SyncResult<()> {
        *self.report.lock().unwrap() = Some(report.to_vec());
        Ok(())
    }

    async fn persist_count(&self, _cycle_id: &str, comparison: &CountComparison) -> SyncResult<()> {
        *self.count_mismatch.lock().unwrap() = if comparison.matches() {
            None
        } else {
            Some(*comparison)
        };
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<SyncLogEntry>>,
    broken: Mutex<bool>,
}

impl MemoryLog {
    pub fn break_sink(&self) {
        *self.broken.lock().unwrap() = true;
    }

    pub fn entries(&self) -> Vec<SyncLogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn stages(&self) -> Vec<LogStage> {
        self.entries().into_iter().map(|e| e.stage).collect()
    }
}

#[async_trait]
impl LogSink for MemoryLog {
    async fn append(&self, entry: &SyncLogEntry) -> SyncResult<()> {
        if *self.broken.lock().unwrap() {
            return Err(SyncError::Store("log bucket unavailable".into()));
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    broken: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn break_notifier(&self) {
        *self.broken.lock().unwrap() = true;
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionNotifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> SyncResult<()> {
        self.messages.lock().unwrap().push(message.to_string());
        if *self.broken.lock().unwrap() {
            return Err(SyncError::NotificationFailed("topic not found".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Every fake, shared with the controller under test.
pub struct Harness {
    pub source: Arc<FakeSource>,
    pub store: Arc<MemoryStore>,
    pub archive: Arc<MemoryArchive>,
    pub run_state: Arc<MemoryRunState>,
    pub discrepancies: Arc<MemoryDiscrepancies>,
    pub log: Arc<MemoryLog>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(source: FakeSource) -> Self {
        Harness {
            source: Arc::new(source),
            store: Arc::new(MemoryStore::default()),
            archive: Arc::new(MemoryArchive::default()),
            run_state: Arc::new(MemoryRunState::default()),
            discrepancies: Arc::new(MemoryDiscrepancies::default()),
            log: Arc::new(MemoryLog::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn controller(&self, settings: CycleSettings) -> SyncController {
        SyncController::new(
            settings,
            Collaborators {
                source: self.source.clone(),
                store: self.store.clone(),
                archive: self.archive.clone(),
                run_state: self.run_state.clone(),
                discrepancies: self.discrepancies.clone(),
                log: self.log.clone(),
                notifier: self.notifier.clone(),
            },
        )
    }
}
