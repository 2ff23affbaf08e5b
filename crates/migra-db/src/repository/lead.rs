//! # Lead Repository
//!
//! The destination document collection. Each lead is stored as its full JSON
//! document under the value of its key field.
//!
//! ## Insert Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    insert_many(records, key_field)                      │
//! │                                                                         │
//! │  1. Every record must carry a usable key, else InvalidRecord and       │
//! │     nothing is written                                                  │
//! │                                                                         │
//! │  2. ┌─────────────────── SINGLE TRANSACTION ───────────────────────┐   │
//! │     │  INSERT INTO leads ... ON CONFLICT(lead_key) DO NOTHING      │   │
//! │     │  (one statement per record, rows_affected summed)            │   │
//! │     └──────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  3. COMMIT ← all or nothing                                            │
//! │                                                                         │
//! │  A key inserted by a concurrent cycle is skipped, never duplicated.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use migra_core::{DestinationSnapshot, Record};

/// Repository for mirrored lead documents.
#[derive(Debug, Clone)]
pub struct LeadRepository {
    pool: SqlitePool,
}

impl LeadRepository {
    /// Creates a new LeadRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LeadRepository { pool }
    }

    /// Returns every key currently stored.
    pub async fn all_keys(&self) -> DbResult<HashSet<String>> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT lead_key FROM leads")
            .fetch_all(&self.pool)
            .await?;

        Ok(keys.into_iter().collect())
    }

    /// Returns every stored document keyed by its lead key, with the listed
    /// fields stripped from each document.
    pub async fn all_documents(&self, exclude_fields: &[String]) -> DbResult<DestinationSnapshot> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT lead_key, document FROM leads")
                .fetch_all(&self.pool)
                .await?;

        let mut snapshot = HashMap::with_capacity(rows.len());
        for (key, document) in rows {
            let record = decode_document(&document)?;
            snapshot.insert(key, record.without_fields(exclude_fields));
        }

        Ok(snapshot)
    }

    /// Fetches one document by key.
    pub async fn get(&self, key: &str) -> DbResult<Option<Record>> {
        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM leads WHERE lead_key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        document.as_deref().map(decode_document).transpose()
    }

    /// Inserts a batch of records in one transaction.
    ///
    /// ## Returns
    /// Number of rows actually written. Keys that already exist are skipped
    /// and not counted.
    ///
    /// ## Errors
    /// `DbError::InvalidRecord` if any record lacks a key under `key_field`.
    /// Nothing is written in that case.
    pub async fn insert_many(&self, records: &[Record], key_field: &str) -> DbResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let key = record.key(key_field).ok_or_else(|| {
                DbError::InvalidRecord(format!(
                    "record #{index} has no usable '{key_field}' value"
                ))
            })?;
            rows.push((key.to_string(), serde_json::to_string(record)?));
        }

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let mut inserted = 0u64;
        for (key, document) in &rows {
            let result = sqlx::query(
                r#"
                INSERT INTO leads (lead_key, document, loaded_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(lead_key) DO NOTHING
                "#,
            )
            .bind(key)
            .bind(document)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(
            attempted = rows.len(),
            inserted = inserted,
            "Inserted lead batch"
        );

        Ok(inserted)
    }

    /// Total number of stored documents.
    pub async fn count(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}

fn decode_document(document: &str) -> DbResult<Record> {
    let value: serde_json::Value = serde_json::from_str(document)?;
    Ok(Record::from_value(value)?)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError};
    use migra_core::Record;
    use serde_json::json;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn lead(email: &str, status: &str) -> Record {
        Record::new()
            .with("Email", email)
            .with("Lead_Status", status)
            .with("Phone", json!(null))
    }

    #[tokio::test]
    async fn test_empty_store() {
        let db = db().await;
        let leads = db.leads();

        assert_eq!(leads.count().await.unwrap(), 0);
        assert!(leads.all_keys().await.unwrap().is_empty());
        assert!(leads.all_documents(&[]).await.unwrap().is_empty());
        assert_eq!(leads.insert_many(&[], "Email").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = db().await;
        let leads = db.leads();

        let inserted = leads
            .insert_many(&[lead("a@x", "New"), lead("b@x", "Closed")], "Email")
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(leads.count().await.unwrap(), 2);

        let keys = leads.all_keys().await.unwrap();
        assert!(keys.contains("a@x") && keys.contains("b@x"));

        let stored = leads.get("b@x").await.unwrap().unwrap();
        assert_eq!(stored, lead("b@x", "Closed"));
        assert!(leads.get("zzz@x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_existing_keys_are_not_duplicated() {
        let db = db().await;
        let leads = db.leads();

        leads.insert_many(&[lead("a@x", "New")], "Email").await.unwrap();
        let inserted = leads
            .insert_many(&[lead("a@x", "Closed"), lead("c@x", "New")], "Email")
            .await
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(leads.count().await.unwrap(), 2);
        // First write wins; records are never updated.
        let stored = leads.get("a@x").await.unwrap().unwrap();
        assert_eq!(stored.get("Lead_Status"), Some(&json!("New")));
    }

    #[tokio::test]
    async fn test_keyless_record_rejects_whole_batch() {
        let db = db().await;
        let leads = db.leads();

        let err = leads
            .insert_many(&[lead("a@x", "New"), Record::new().with("Phone", "1")], "Email")
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::InvalidRecord(_)));
        assert_eq!(leads.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_all_documents_excludes_fields() {
        let db = db().await;
        let leads = db.leads();

        leads
            .insert_many(&[lead("a@x", "New").with("_id", "internal")], "Email")
            .await
            .unwrap();

        let snapshot = leads.all_documents(&["_id".to_string()]).await.unwrap();
        let doc = &snapshot["a@x"];
        assert!(doc.get("_id").is_none());
        assert_eq!(doc.get("Lead_Status"), Some(&json!("New")));
    }
}
