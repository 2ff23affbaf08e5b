//! # Extract Snapshot Repository
//!
//! Archives the records each cycle extracted from the CRM, one row per
//! cycle. Snapshots are written once and never modified.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use migra_core::{ExtractSnapshot, Record};

type SnapshotRow = (String, String, String, DateTime<Utc>);

/// Repository for archived extractions.
#[derive(Debug, Clone)]
pub struct ExtractSnapshotRepository {
    pool: SqlitePool,
}

impl ExtractSnapshotRepository {
    /// Creates a new ExtractSnapshotRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExtractSnapshotRepository { pool }
    }

    /// Stores a snapshot.
    ///
    /// ## Errors
    /// `UniqueViolation` if the cycle already archived its extraction.
    pub async fn save(&self, snapshot: &ExtractSnapshot) -> DbResult<()> {
        let records = serde_json::to_string(&snapshot.records)?;

        debug!(
            cycle_id = %snapshot.cycle_id,
            name = %snapshot.name,
            records = snapshot.records.len(),
            "Archiving extraction"
        );

        sqlx::query(
            r#"
            INSERT INTO extract_snapshots (cycle_id, name, record_count, records, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&snapshot.cycle_id)
        .bind(&snapshot.name)
        .bind(snapshot.records.len() as i64)
        .bind(records)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns the snapshot taken by one cycle.
    pub async fn for_cycle(&self, cycle_id: &str) -> DbResult<Option<ExtractSnapshot>> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT cycle_id, name, records, created_at
            FROM extract_snapshots
            WHERE cycle_id = ?1
            "#,
        )
        .bind(cycle_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_row).transpose()
    }

    /// Returns the most recent snapshot, if any cycle has archived one.
    pub async fn latest(&self) -> DbResult<Option<ExtractSnapshot>> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT cycle_id, name, records, created_at
            FROM extract_snapshots
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_row).transpose()
    }
}

fn decode_row(row: SnapshotRow) -> DbResult<ExtractSnapshot> {
    let (cycle_id, name, records, created_at) = row;
    let records: Vec<Record> = serde_json::from_str(&records)?;

    Ok(ExtractSnapshot {
        cycle_id,
        name,
        records,
        created_at,
    })
}
