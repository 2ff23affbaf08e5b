//! # Discrepancy Repository
//!
//! Holds the latest discrepancy report and the latest count mismatch.
//!
//! Both are "latest wins": each cycle replaces what the previous cycle wrote,
//! so an empty report clears the table.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  discrepancies        (one row per Discrepancy, ordered by position)   │
//! │  count_discrepancy    (zero or one row)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use migra_core::{CountComparison, Discrepancy, DiscrepancyKind};

type DiscrepancyRow = (String, String, Option<String>, Option<String>, Option<String>);

/// Repository for discrepancy reports.
#[derive(Debug, Clone)]
pub struct DiscrepancyRepository {
    pool: SqlitePool,
}

impl DiscrepancyRepository {
    /// Creates a new DiscrepancyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DiscrepancyRepository { pool }
    }

    /// Replaces the stored report with `report`, preserving its order.
    pub async fn replace(&self, cycle_id: &str, report: &[Discrepancy]) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query("DELETE FROM discrepancies")
            .execute(&mut *tx)
            .await?;

        for (position, discrepancy) in report.iter().enumerate() {
            let (source_value, destination_value) = match discrepancy {
                Discrepancy::MissingInDestination { .. } => (None, None),
                Discrepancy::FieldMismatch {
                    source_value,
                    destination_value,
                    ..
                } => (
                    encode_value(source_value.as_ref())?,
                    encode_value(destination_value.as_ref())?,
                ),
            };

            sqlx::query(
                r#"
                INSERT INTO discrepancies (
                    position, cycle_id, kind, lead_key, field,
                    source_value, destination_value, recorded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(position as i64)
            .bind(cycle_id)
            .bind(discrepancy.kind().as_str())
            .bind(discrepancy.key())
            .bind(discrepancy.field())
            .bind(source_value)
            .bind(destination_value)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(cycle_id = %cycle_id, entries = report.len(), "Stored discrepancy report");
        Ok(())
    }

    /// Returns the stored report in its original order.
    pub async fn latest(&self) -> DbResult<Vec<Discrepancy>> {
        let rows: Vec<DiscrepancyRow> = sqlx::query_as(
            r#"
            SELECT kind, lead_key, field, source_value, destination_value
            FROM discrepancies
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_row).collect()
    }

    /// Records a count mismatch, replacing any previous one.
    pub async fn record_count_mismatch(
        &self,
        cycle_id: &str,
        comparison: &CountComparison,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO count_discrepancy (id, cycle_id, source_count, destination_count, recorded_at)
            VALUES (1, ?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                cycle_id = excluded.cycle_id,
                source_count = excluded.source_count,
                destination_count = excluded.destination_count,
                recorded_at = excluded.recorded_at
            "#,
        )
        .bind(cycle_id)
        .bind(comparison.source_count as i64)
        .bind(comparison.destination_count as i64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Removes the stored count mismatch, if any.
    pub async fn clear_count_mismatch(&self) -> DbResult<()> {
        sqlx::query("DELETE FROM count_discrepancy")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns the stored count mismatch, if any.
    pub async fn count_mismatch(&self) -> DbResult<Option<CountComparison>> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT source_count, destination_count FROM count_discrepancy WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(source, destination)| {
            CountComparison::new(source as u64, destination as u64)
        }))
    }
}

fn encode_value(value: Option<&Value>) -> DbResult<Option<String>> {
    value.map(serde_json::to_string).transpose().map_err(Into::into)
}

fn decode_value(text: Option<String>) -> DbResult<Option<Value>> {
    text.as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(Into::into)
}

fn decode_row(row: DiscrepancyRow) -> DbResult<Discrepancy> {
    let (kind, key, field, source_value, destination_value) = row;

    match kind.parse::<DiscrepancyKind>()? {
        DiscrepancyKind::MissingInDestination => Ok(Discrepancy::MissingInDestination { key }),
        DiscrepancyKind::FieldMismatch => {
            let field = field.ok_or_else(|| {
                DbError::InvalidRecord(format!("field mismatch for '{key}' has no field name"))
            })?;
            Ok(Discrepancy::FieldMismatch {
                key,
                field,
                source_value: decode_value(source_value)?,
                destination_value: decode_value(destination_value)?,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use migra_core::{CountComparison, Discrepancy};
    use serde_json::json;

    fn report() -> Vec<Discrepancy> {
        vec![
            Discrepancy::FieldMismatch {
                key: "p@x".into(),
                field: "Lead_Status".into(),
                source_value: Some(json!("New")),
                destination_value: Some(json!("Closed")),
            },
            Discrepancy::FieldMismatch {
                key: "p@x".into(),
                field: "Phone".into(),
                source_value: Some(json!("555")),
                destination_value: None,
            },
            Discrepancy::MissingInDestination { key: "q@x".into() },
        ]
    }

    #[tokio::test]
    async fn test_report_round_trips_in_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.discrepancies();

        repo.replace("cycle-1", &report()).await.unwrap();

        assert_eq!(repo.latest().await.unwrap(), report());
    }

    #[tokio::test]
    async fn test_empty_report_clears_previous() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.discrepancies();

        repo.replace("cycle-1", &report()).await.unwrap();
        repo.replace("cycle-2", &[]).await.unwrap();

        assert!(repo.latest().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_mismatch_latest_wins() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.discrepancies();

        assert!(repo.count_mismatch().await.unwrap().is_none());

        repo.record_count_mismatch("cycle-1", &CountComparison::new(10, 7))
            .await
            .unwrap();
        repo.record_count_mismatch("cycle-2", &CountComparison::new(10, 9))
            .await
            .unwrap();
        assert_eq!(
            repo.count_mismatch().await.unwrap(),
            Some(CountComparison::new(10, 9))
        );

        repo.clear_count_mismatch().await.unwrap();
        assert!(repo.count_mismatch().await.unwrap().is_none());
    }
}
