//! # Database-Backed Collaborators
//!
//! Implements the store, archive, run-state, discrepancy and log traits on
//! [`migra_db::Database`] by delegating to its repositories.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::collaborators::{
    DiscrepancySink, ExtractArchive, LogSink, RecordStore, RunStateStore,
};
use crate::error::SyncResult;
use migra_core::{
    CountComparison, DestinationSnapshot, Discrepancy, ExtractSnapshot, Record, SyncLogEntry,
    SyncRunState,
};
use migra_db::Database;

#[async_trait]
impl RecordStore for Database {
    async fn get_all_keys(&self) -> SyncResult<HashSet<String>> {
        Ok(self.leads().all_keys().await?)
    }

    async fn get_all(&self, exclude_fields: &[String]) -> SyncResult<DestinationSnapshot> {
        Ok(self.leads().all_documents(exclude_fields).await?)
    }

    async fn insert_many(&self, records: &[Record], key_field: &str) -> SyncResult<u64> {
        Ok(self.leads().insert_many(records, key_field).await?)
    }

    async fn count(&self) -> SyncResult<u64> {
        Ok(self.leads().count().await?)
    }
}

#[async_trait]
impl ExtractArchive for Database {
    async fn archive(&self, snapshot: &ExtractSnapshot) -> SyncResult<()> {
        Ok(self.extract_snapshots().save(snapshot).await?)
    }
}

#[async_trait]
impl RunStateStore for Database {
    async fn load(&self) -> SyncResult<SyncRunState> {
        Ok(self.run_state().load().await?)
    }

    async fn save(&self, state: &SyncRunState) -> SyncResult<()> {
        Ok(self.run_state().save(state).await?)
    }
}

#[async_trait]
impl DiscrepancySink for Database {
    async fn persist(&self, cycle_id: &str, report: &[Discrepancy]) -> SyncResult<()> {
        Ok(self.discrepancies().replace(cycle_id, report).await?)
    }

    async fn persist_count(&self, cycle_id: &str, comparison: &CountComparison) -> SyncResult<()> {
        let repo = self.discrepancies();
        if comparison.matches() {
            repo.clear_count_mismatch().await?;
        } else {
            repo.record_count_mismatch(cycle_id, comparison).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl LogSink for Database {
    async fn append(&self, entry: &SyncLogEntry) -> SyncResult<()> {
        Ok(self.sync_log().append(entry).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migra_db::DbConfig;

    #[tokio::test]
    async fn test_persist_count_records_then_clears() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.persist_count("c1", &CountComparison::new(5, 3)).await.unwrap();
        assert_eq!(
            db.discrepancies().count_mismatch().await.unwrap(),
            Some(CountComparison::new(5, 3))
        );

        db.persist_count("c2", &CountComparison::new(5, 5)).await.unwrap();
        assert!(db.discrepancies().count_mismatch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_trait_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let records = vec![Record::new().with("Email", "a@x")];

        assert_eq!(RecordStore::insert_many(&db, &records, "Email").await.unwrap(), 1);
        assert_eq!(RecordStore::count(&db).await.unwrap(), 1);
        assert!(db.get_all_keys().await.unwrap().contains("a@x"));
        assert!(RunStateStore::load(&db).await.unwrap().run_enabled);
    }
}
