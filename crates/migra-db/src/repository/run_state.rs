//! # Run State Repository
//!
//! Persists the single run/skip flag. Absence of a stored row means the
//! migration has never been stopped, so `load()` returns `run_enabled = true`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use migra_core::SyncRunState;

/// Repository for the run/skip flag.
#[derive(Debug, Clone)]
pub struct RunStateRepository {
    pool: SqlitePool,
}

impl RunStateRepository {
    /// Creates a new RunStateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RunStateRepository { pool }
    }

    /// Reads the current state, defaulting to enabled.
    pub async fn load(&self) -> DbResult<SyncRunState> {
        let row: Option<(bool, DateTime<Utc>)> =
            sqlx::query_as("SELECT run_enabled, updated_at FROM run_state WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(match row {
            Some((run_enabled, updated_at)) => SyncRunState {
                run_enabled,
                updated_at: Some(updated_at),
            },
            None => SyncRunState::default(),
        })
    }

    /// Writes the state, replacing any previous value.
    pub async fn save(&self, state: &SyncRunState) -> DbResult<()> {
        let updated_at = state.updated_at.unwrap_or_else(Utc::now);

        debug!(run_enabled = state.run_enabled, "Saving run state");

        sqlx::query(
            r#"
            INSERT INTO run_state (id, run_enabled, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                run_enabled = excluded.run_enabled,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(state.run_enabled)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
