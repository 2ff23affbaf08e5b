//! # Sync Controller
//!
//! Runs one migration cycle per invocation.
//!
//! ## Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          run_cycle()                                    │
//! │                                                                         │
//! │  1. RunStateStore::load ── run_enabled == false ──► skipped ──┐        │
//! │       │                                                       │        │
//! │  2. fetch_capped(source) → archive          extraction        │        │
//! │       │                                                       │        │
//! │  3. diff against get_all_keys() snapshot                      │        │
//! │  4. insert_many(new) or no-op               incremental_load  │        │
//! │       │                                                       │        │
//! │  5. validate(records, get_all()) → persist  validation        │        │
//! │       │                                                       │        │
//! │  6. count() vs fetch_count() → persist      count_comparison  │        │
//! │       │                                                       │        │
//! │  7. save(run_enabled = !match)              run_state         │        │
//! │       │        └── match? notify()                            │        │
//! │       ▼                                                       ▼        │
//! │  8. completion  ◄──────────────────────────────────────────────        │
//! │                                                                         │
//! │  Any error in 1-7: failure entry, completion entry, return Err.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The controller never updates or deletes destination records, and never
//! retries. A repeated cycle is safe because step 3 diffs against the
//! destination's current keys.

use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::collaborators::{
    CompletionNotifier, DiscrepancySink, ExtractArchive, LogSink, RecordSource, RecordStore,
    RunStateStore,
};
use crate::config::{MigraConfig, ValidationSource};
use crate::error::{SyncError, SyncResult};
use crate::source::fetch_capped;
use migra_core::validation::{count_unkeyed, diff_new_records, validate};
use migra_core::{
    CountComparison, Discrepancy, ExtractSnapshot, LogStage, LogStatus, Record, SyncLogEntry,
    SyncRunState,
};

// =============================================================================
// Settings & Outcome
// =============================================================================

/// The slice of configuration a cycle needs.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub page_size: u32,
    pub record_cap: usize,
    pub key_field: String,
    pub required_fields: Vec<String>,
    pub exclude_fields: Vec<String>,
    pub validation_source: ValidationSource,
}

impl From<&MigraConfig> for CycleSettings {
    fn from(config: &MigraConfig) -> Self {
        CycleSettings {
            page_size: config.source.page_size,
            record_cap: config.sync.record_cap,
            key_field: config.sync.key_field.clone(),
            required_fields: config.sync.required_fields.clone(),
            exclude_fields: config.destination.exclude_fields.clone(),
            validation_source: config.sync.validation_source,
        }
    }
}

impl Default for CycleSettings {
    fn default() -> Self {
        CycleSettings::from(&MigraConfig::default())
    }
}

/// Summary of a cycle that ran to the end.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle_id: String,

    /// Records returned by the extraction (after the cap).
    pub fetched: usize,

    /// Extracted records with no usable key.
    pub unkeyed: usize,

    /// Rows actually written to the destination.
    pub inserted: u64,

    /// Length of the persisted discrepancy report.
    pub discrepancies: usize,

    pub counts: CountComparison,

    /// The run flag saved at the end of the cycle.
    pub run_enabled: bool,
}

/// What a call to [`SyncController::run_cycle`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The run flag was off; nothing was fetched or written.
    Skipped,
    Completed(CycleReport),
}

// =============================================================================
// Collaborators
// =============================================================================

/// Everything the controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn RecordSource>,
    pub store: Arc<dyn RecordStore>,
    pub archive: Arc<dyn ExtractArchive>,
    pub run_state: Arc<dyn RunStateStore>,
    pub discrepancies: Arc<dyn DiscrepancySink>,
    pub log: Arc<dyn LogSink>,
    pub notifier: Arc<dyn CompletionNotifier>,
}

impl Collaborators {
    /// Wires a source and notifier to a database that serves every other role.
    pub fn with_database(
        source: Arc<dyn RecordSource>,
        db: migra_db::Database,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Self {
        let db = Arc::new(db);
        Collaborators {
            source,
            store: db.clone(),
            archive: db.clone(),
            run_state: db.clone(),
            discrepancies: db.clone(),
            log: db,
            notifier,
        }
    }
}

// =============================================================================
// Stage Tracking
// =============================================================================

/// An error tagged with the stage it interrupted.
struct StageFailure {
    stage: LogStage,
    error: SyncError,
}

trait AtStage<T> {
    fn at(self, stage: LogStage) -> Result<T, StageFailure>;
}

impl<T, E: Into<SyncError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: LogStage) -> Result<T, StageFailure> {
        self.map_err(|e| StageFailure {
            stage,
            error: e.into(),
        })
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Drives one fetch → load → validate → count → state cycle.
pub struct SyncController {
    settings: CycleSettings,
    deps: Collaborators,
}

impl SyncController {
    pub fn new(settings: CycleSettings, deps: Collaborators) -> Self {
        SyncController { settings, deps }
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Runs exactly one cycle.
    ///
    /// ## Returns
    /// * `Ok(Skipped)` - the run flag was off
    /// * `Ok(Completed(report))` - every stage ran
    /// * `Err(e)` - a stage failed; the failure has been logged
    ///
    /// A `completion` entry is appended in all three cases.
    pub async fn run_cycle(&self) -> SyncResult<CycleOutcome> {
        let cycle_id = Uuid::new_v4().to_string();
        let span = info_span!("sync_cycle", cycle_id = %cycle_id);

        async {
            match self.execute(&cycle_id).await {
                Ok(outcome) => {
                    let (status, payload) = match &outcome {
                        CycleOutcome::Skipped => (LogStatus::Skipped, json!({ "skipped": true })),
                        CycleOutcome::Completed(report) => (
                            LogStatus::Completed,
                            json!({
                                "fetched": report.fetched,
                                "inserted": report.inserted,
                                "discrepancies": report.discrepancies,
                                "run_enabled": report.run_enabled,
                            }),
                        ),
                    };
                    self.emit(&cycle_id, LogStage::Completion, status, payload)
                        .await;
                    Ok(outcome)
                }
                Err(StageFailure { stage, error }) => {
                    error!(stage = %stage, error = %error, "Sync cycle failed");
                    self.emit(
                        &cycle_id,
                        LogStage::Failure,
                        LogStatus::Failed,
                        json!({
                            "stage": stage.as_str(),
                            "error": error.to_string(),
                            "retryable": error.is_retryable(),
                        }),
                    )
                    .await;
                    self.emit(
                        &cycle_id,
                        LogStage::Completion,
                        LogStatus::Failed,
                        json!({ "failed_stage": stage.as_str() }),
                    )
                    .await;
                    Err(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, cycle_id: &str) -> Result<CycleOutcome, StageFailure> {
        let s = &self.settings;
        let deps = &self.deps;

        // 1. Gate
        let state = deps.run_state.load().await.at(LogStage::RunState)?;
        if !state.run_enabled {
            info!("Run flag is off, skipping cycle");
            self.emit(
                cycle_id,
                LogStage::Skipped,
                LogStatus::Skipped,
                json!({ "reason": "run_enabled is false" }),
            )
            .await;
            return Ok(CycleOutcome::Skipped);
        }

        // 2. Extraction
        let fetched = fetch_capped(deps.source.as_ref(), s.page_size, s.record_cap)
            .await
            .at(LogStage::Extraction)?;
        let fetched_count = fetched.len();
        let unkeyed = count_unkeyed(&fetched, &s.key_field);
        if unkeyed > 0 {
            warn!(
                unkeyed = unkeyed,
                key_field = %s.key_field,
                "Source records without a key are not loaded or validated"
            );
        }

        let snapshot = ExtractSnapshot::new(cycle_id, fetched.clone());
        deps.archive.archive(&snapshot).await.at(LogStage::Extraction)?;
        self.emit(
            cycle_id,
            LogStage::Extraction,
            LogStatus::Completed,
            json!({
                "record_count": fetched_count,
                "unkeyed": unkeyed,
                "archive": snapshot.name,
            }),
        )
        .await;

        // 3-4. Incremental load
        let existing = deps.store.get_all_keys().await.at(LogStage::IncrementalLoad)?;
        let (diff, retained) = match s.validation_source {
            ValidationSource::ReuseExtract => (
                diff_new_records(fetched.clone(), &existing, &s.key_field),
                Some(fetched),
            ),
            ValidationSource::Refetch => (diff_new_records(fetched, &existing, &s.key_field), None),
        };

        let inserted = if diff.new_records.is_empty() {
            self.emit(
                cycle_id,
                LogStage::IncrementalLoad,
                LogStatus::Completed,
                json!({
                    "inserted": 0,
                    "already_present": diff.already_present,
                    "message": "No new records to insert",
                }),
            )
            .await;
            0
        } else {
            let inserted = deps
                .store
                .insert_many(&diff.new_records, &s.key_field)
                .await
                .at(LogStage::IncrementalLoad)?;
            self.emit(
                cycle_id,
                LogStage::IncrementalLoad,
                LogStatus::Completed,
                json!({
                    "candidates": diff.new_records.len(),
                    "inserted": inserted,
                    "already_present": diff.already_present,
                    "duplicates": diff.duplicates,
                }),
            )
            .await;
            inserted
        };

        // 5. Validation
        let source_records: Vec<Record> = match retained {
            Some(records) => records,
            None => fetch_capped(deps.source.as_ref(), s.page_size, s.record_cap)
                .await
                .at(LogStage::Validation)?,
        };
        let snapshot = deps
            .store
            .get_all(&s.exclude_fields)
            .await
            .at(LogStage::Validation)?;
        let report = validate(&source_records, &snapshot, &s.required_fields, &s.key_field);
        deps.discrepancies
            .persist(cycle_id, &report)
            .await
            .at(LogStage::Validation)?;

        let missing = report
            .iter()
            .filter(|d| matches!(d, Discrepancy::MissingInDestination { .. }))
            .count();
        self.emit(
            cycle_id,
            LogStage::Validation,
            LogStatus::Completed,
            json!({
                "validation_source": s.validation_source.to_string(),
                "compared": source_records.len(),
                "discrepancies": report.len(),
                "missing_in_destination": missing,
                "field_mismatches": report.len() - missing,
            }),
        )
        .await;

        // 6. Count comparison
        let destination_count = deps.store.count().await.at(LogStage::CountComparison)?;
        let source_count = deps
            .source
            .fetch_count()
            .await
            .at(LogStage::CountComparison)?;
        let counts = CountComparison::new(source_count, destination_count);
        deps.discrepancies
            .persist_count(cycle_id, &counts)
            .await
            .at(LogStage::CountComparison)?;
        self.emit(
            cycle_id,
            LogStage::CountComparison,
            LogStatus::Completed,
            json!({
                "source_count": source_count,
                "destination_count": destination_count,
                "status": if counts.matches() { "match" } else { "mismatch" },
            }),
        )
        .await;

        // 7. Run state
        let run_enabled = !counts.matches();
        deps.run_state
            .save(&SyncRunState::new(run_enabled))
            .await
            .at(LogStage::RunState)?;
        self.emit(
            cycle_id,
            LogStage::RunState,
            LogStatus::Completed,
            json!({ "run_enabled": run_enabled }),
        )
        .await;

        if counts.matches() {
            let message = format!(
                "Lead migration complete: {} records present in both source and destination.",
                source_count
            );
            if let Err(e) = deps.notifier.notify(&message).await {
                warn!(error = %e, "Completion notification failed");
            }
        }

        Ok(CycleOutcome::Completed(CycleReport {
            cycle_id: cycle_id.to_string(),
            fetched: fetched_count,
            unkeyed,
            inserted,
            discrepancies: report.len(),
            counts,
            run_enabled,
        }))
    }

    /// Appends a log entry. Sink failures are downgraded to a warning.
    async fn emit(
        &self,
        cycle_id: &str,
        stage: LogStage,
        status: LogStatus,
        payload: serde_json::Value,
    ) {
        info!(stage = %stage, status = %status, payload = %payload, "Cycle stage");

        let entry = SyncLogEntry::new(cycle_id, stage, status, payload);
        if let Err(e) = self.deps.log.append(&entry).await {
            warn!(stage = %stage, error = %e, "Failed to append sync log entry");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
