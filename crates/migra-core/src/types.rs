//! # Domain Types
//!
//! Data contracts exchanged between the CRM source, the document store and
//! the sync controller.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Record      │   │  SyncRunState   │   │  SyncLogEntry   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  field → value  │   │  run_enabled    │   │  cycle_id       │       │
//! │  │  keyed by Email │   │  updated_at     │   │  stage, status  │       │
//! │  └─────────────────┘   └─────────────────┘   │  payload        │       │
//! │                                              └─────────────────┘       │
//! │  ┌─────────────────────────────┐   ┌─────────────────────────┐         │
//! │  │        Discrepancy          │   │    CountComparison      │         │
//! │  │  ─────────────────────────  │   │  ─────────────────────  │         │
//! │  │  MissingInDestination{key}  │   │  source_count           │         │
//! │  │  FieldMismatch{key, field,  │   │  destination_count      │         │
//! │  │    source, destination}     │   │  matches() → stop sync  │         │
//! │  └─────────────────────────────┘   └─────────────────────────┘         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Null Semantics
//! A field holding JSON `null` and a field that is absent are the same
//! observation: [`Record::get`] returns `None` for both.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Destination snapshot: key → stored record.
pub type DestinationSnapshot = HashMap<String, Record>;

// =============================================================================
// Record
// =============================================================================

/// One lead: a mapping of named fields to optional scalar values.
///
/// Records are created at the source and mirrored verbatim into the
/// destination. Migra never edits a field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Record(Map::new())
    }

    /// Builds a record from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        match value {
            Value::Object(map) => Ok(Record(map)),
            other => Err(CoreError::InvalidDocument(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Builds a record from `(field, value)` pairs.
    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns the value of a field, treating `null` as absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    /// Sets a field, returning the builder for chaining.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Returns the record's identity under `key_field`.
    ///
    /// ## Returns
    /// * `Some(key)` - the trimmed, non-empty string value of the field
    /// * `None` - field missing, `null`, blank, or not a string
    pub fn key(&self, key_field: &str) -> Option<&str> {
        self.get(key_field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Returns a copy of this record without the listed fields.
    pub fn without_fields(&self, exclude: &[String]) -> Record {
        let mut map = self.0.clone();
        for field in exclude {
            map.remove(field);
        }
        Record(map)
    }

    /// Number of fields (including `null` ones).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts the record into a JSON object value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Borrows the underlying field map.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Sync Run State
// =============================================================================

/// Persisted flag gating whether future cycles execute.
///
/// ## Lifecycle
/// ```text
///   (absent) ──load()──► run_enabled = true
///                              │
///          counts match ───────┼──────► run_enabled = false  (cycles skip)
///                              │
///          counts diverge ─────┴──────► run_enabled = true   (re-armed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRunState {
    /// Whether the next cycle should do any work.
    pub run_enabled: bool,

    /// When the flag was last written. `None` for the implicit default.
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncRunState {
    /// Creates a state stamped with the current time.
    pub fn new(run_enabled: bool) -> Self {
        SyncRunState {
            run_enabled,
            updated_at: Some(Utc::now()),
        }
    }
}

impl Default for SyncRunState {
    fn default() -> Self {
        SyncRunState {
            run_enabled: true,
            updated_at: None,
        }
    }
}

// =============================================================================
// Discrepancy
// =============================================================================

/// A detected difference between source and destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    /// The source has a record whose key is not in the destination.
    MissingInDestination { key: String },

    /// Both stores hold the key but a compared field differs.
    FieldMismatch {
        key: String,
        field: String,
        source_value: Option<Value>,
        destination_value: Option<Value>,
    },
}

impl Discrepancy {
    /// Key of the record this discrepancy is about.
    pub fn key(&self) -> &str {
        match self {
            Discrepancy::MissingInDestination { key } => key,
            Discrepancy::FieldMismatch { key, .. } => key,
        }
    }

    /// The discrepancy tag.
    pub fn kind(&self) -> DiscrepancyKind {
        match self {
            Discrepancy::MissingInDestination { .. } => DiscrepancyKind::MissingInDestination,
            Discrepancy::FieldMismatch { .. } => DiscrepancyKind::FieldMismatch,
        }
    }

    /// The mismatching field, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Discrepancy::MissingInDestination { .. } => None,
            Discrepancy::FieldMismatch { field, .. } => Some(field),
        }
    }
}

/// Tag of a [`Discrepancy`], as stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    MissingInDestination,
    FieldMismatch,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyKind::MissingInDestination => "missing_in_destination",
            DiscrepancyKind::FieldMismatch => "field_mismatch",
        }
    }
}

impl FromStr for DiscrepancyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missing_in_destination" => Ok(DiscrepancyKind::MissingInDestination),
            "field_mismatch" => Ok(DiscrepancyKind::FieldMismatch),
            other => Err(CoreError::UnknownVariant {
                kind: "discrepancy kind",
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Count Comparison
// =============================================================================

/// Result of comparing total record counts in both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountComparison {
    pub source_count: u64,
    pub destination_count: u64,
}

impl CountComparison {
    pub fn new(source_count: u64, destination_count: u64) -> Self {
        CountComparison {
            source_count,
            destination_count,
        }
    }

    /// Exact equality. Any other relation (including destination > source)
    /// keeps the migration running.
    pub fn matches(&self) -> bool {
        self.source_count == self.destination_count
    }
}

// =============================================================================
// Sync Log Entry
// =============================================================================

/// Stage of a cycle that a log entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStage {
    Skipped,
    Extraction,
    IncrementalLoad,
    Validation,
    CountComparison,
    RunState,
    Completion,
    Failure,
}

impl LogStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStage::Skipped => "skipped",
            LogStage::Extraction => "extraction",
            LogStage::IncrementalLoad => "incremental_load",
            LogStage::Validation => "validation",
            LogStage::CountComparison => "count_comparison",
            LogStage::RunState => "run_state",
            LogStage::Completion => "completion",
            LogStage::Failure => "failure",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skipped" => Ok(LogStage::Skipped),
            "extraction" => Ok(LogStage::Extraction),
            "incremental_load" => Ok(LogStage::IncrementalLoad),
            "validation" => Ok(LogStage::Validation),
            "count_comparison" => Ok(LogStage::CountComparison),
            "run_state" => Ok(LogStage::RunState),
            "completion" => Ok(LogStage::Completion),
            "failure" => Ok(LogStage::Failure),
            other => Err(CoreError::UnknownVariant {
                kind: "log stage",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome recorded with a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    InProgress,
    Skipped,
    Completed,
    Failed,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::InProgress => "in_progress",
            LogStatus::Skipped => "skipped",
            LogStatus::Completed => "completed",
            LogStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(LogStatus::InProgress),
            "skipped" => Ok(LogStatus::Skipped),
            "completed" => Ok(LogStatus::Completed),
            "failed" => Ok(LogStatus::Failed),
            other => Err(CoreError::UnknownVariant {
                kind: "log status",
                value: other.to_string(),
            }),
        }
    }
}

/// Immutable audit record of one stage of one cycle.
///
/// Write-only: the controller appends these and never reads them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Unique entry ID (UUID v4).
    pub id: String,

    /// ID shared by every entry of the same cycle.
    pub cycle_id: String,

    pub stage: LogStage,

    pub status: LogStatus,

    /// Stage-specific details (counts, error text, discrepancy summary).
    pub payload: Value,

    pub timestamp: DateTime<Utc>,
}

impl SyncLogEntry {
    /// Creates a new entry stamped with a fresh ID and the current time.
    pub fn new(
        cycle_id: impl Into<String>,
        stage: LogStage,
        status: LogStatus,
        payload: Value,
    ) -> Self {
        SyncLogEntry {
            id: Uuid::new_v4().to_string(),
            cycle_id: cycle_id.into(),
            stage,
            status,
            payload,
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Extract Snapshot
// =============================================================================

/// Archived copy of the records one cycle extracted.
///
/// Snapshots are named `leads_YYYY-MM-DD` after the day they were taken.
/// Several cycles on one day share a name; `cycle_id` tells them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractSnapshot {
    pub cycle_id: String,

    pub name: String,

    pub records: Vec<Record>,

    pub created_at: DateTime<Utc>,
}

impl ExtractSnapshot {
    /// Creates a snapshot stamped with the current time.
    pub fn new(cycle_id: impl Into<String>, records: Vec<Record>) -> Self {
        Self::at(cycle_id, records, Utc::now())
    }

    /// Creates a snapshot taken at `created_at`.
    pub fn at(
        cycle_id: impl Into<String>,
        records: Vec<Record>,
        created_at: DateTime<Utc>,
    ) -> Self {
        ExtractSnapshot {
            cycle_id: cycle_id.into(),
            name: format!("leads_{}", created_at.format("%Y-%m-%d")),
            records,
            created_at,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
