//! # Sync Log Repository
//!
//! Append-only audit trail of cycle stages. Entries are never updated or
//! deleted; insertion order is preserved by the `seq` column.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;
use migra_core::SyncLogEntry;

type SyncLogRow = (String, String, String, String, String, DateTime<Utc>);

/// Repository for the sync log.
#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    pool: SqlitePool,
}

impl SyncLogRepository {
    /// Creates a new SyncLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncLogRepository { pool }
    }

    /// Appends one entry.
    pub async fn append(&self, entry: &SyncLogEntry) -> DbResult<()> {
        let payload = serde_json::to_string(&entry.payload)?;

        sqlx::query(
            r#"
            INSERT INTO sync_log (entry_id, cycle_id, stage, status, payload, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.cycle_id)
        .bind(entry.stage.as_str())
        .bind(entry.status.as_str())
        .bind(payload)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns the newest `limit` entries, newest first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<SyncLogEntry>> {
        let rows: Vec<SyncLogRow> = sqlx::query_as(
            r#"
            SELECT entry_id, cycle_id, stage, status, payload, created_at
            FROM sync_log
            ORDER BY seq DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_row).collect()
    }

    /// Returns every entry of one cycle in the order they were written.
    pub async fn for_cycle(&self, cycle_id: &str) -> DbResult<Vec<SyncLogEntry>> {
        let rows: Vec<SyncLogRow> = sqlx::query_as(
            r#"
            SELECT entry_id, cycle_id, stage, status, payload, created_at
            FROM sync_log
            WHERE cycle_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_row).collect()
    }
}

fn decode_row(row: SyncLogRow) -> DbResult<SyncLogEntry> {
    let (id, cycle_id, stage, status, payload, timestamp) = row;

    Ok(SyncLogEntry {
        id,
        cycle_id,
        stage: stage.parse()?,
        status: status.parse()?,
        payload: serde_json::from_str(&payload)?,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use migra_core::{LogStage, LogStatus, SyncLogEntry};
    use serde_json::json;

    #[tokio::test]
    async fn test_entries_kept_in_write_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let log = db.sync_log();

        let stages = [
            LogStage::Extraction,
            LogStage::IncrementalLoad,
            LogStage::Validation,
        ];
        for stage in stages {
            log.append(&SyncLogEntry::new(
                "cycle-1",
                stage,
                LogStatus::Completed,
                json!({"records": 3}),
            ))
            .await
            .unwrap();
        }
        log.append(&SyncLogEntry::new(
            "cycle-2",
            LogStage::Skipped,
            LogStatus::Skipped,
            json!({}),
        ))
        .await
        .unwrap();

        let cycle: Vec<_> = log
            .for_cycle("cycle-1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.stage)
            .collect();
        assert_eq!(cycle, stages.to_vec());

        let recent = log.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].stage, LogStage::Skipped);
        assert_eq!(recent[1].stage, LogStage::Validation);
        assert_eq!(recent[1].payload, json!({"records": 3}));
    }
}
