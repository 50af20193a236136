//! `PostgreSQL` implementation of the `SnapshotStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;

use forecast_core::error::DomainError;
use forecast_core::game::{CURRENT_VERSION, GameState, Outcome};
use forecast_core::snapshot::{GameEnding, Snapshot, SnapshotId, SnapshotStatus};
use forecast_core::store::SnapshotStore;

/// PostgreSQL-backed snapshot store.
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    /// Creates a new `PgSnapshotStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn infrastructure(err: &sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

fn map_insert_error(id: &SnapshotId, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DomainError::Conflict {
            snapshot_id: id.clone(),
            reason: "snapshot id already exists".to_owned(),
        },
        other => infrastructure(&other),
    }
}

fn decode_row(id: &SnapshotId, row: &sqlx::postgres::PgRow) -> Result<Snapshot, DomainError> {
    let version: i32 = row.try_get("version").map_err(|e| infrastructure(&e))?;
    let preset_id: String = row.try_get("preset_id").map_err(|e| infrastructure(&e))?;
    let status_label: String = row.try_get("status").map_err(|e| infrastructure(&e))?;
    let raw_state: Option<serde_json::Value> =
        row.try_get("state").map_err(|e| infrastructure(&e))?;
    let ended_at: Option<DateTime<Utc>> = row.try_get("ended_at").map_err(|e| infrastructure(&e))?;
    let outcome_label: Option<String> = row.try_get("outcome").map_err(|e| infrastructure(&e))?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(|e| infrastructure(&e))?;

    let status = SnapshotStatus::parse(&status_label).ok_or_else(|| {
        DomainError::Infrastructure(format!("unknown snapshot status: {status_label}"))
    })?;

    // Rows from another schema version are surfaced without decoding; callers
    // check `version` before touching `state`.
    let state = match raw_state {
        Some(value) if version == CURRENT_VERSION => {
            Some(serde_json::from_value::<GameState>(value).map_err(|e| {
                DomainError::Infrastructure(format!("snapshot state deserialization failed: {e}"))
            })?)
        }
        _ => None,
    };

    let outcome = match outcome_label {
        Some(label) => Some(Outcome::parse(&label).ok_or_else(|| {
            DomainError::Infrastructure(format!("unknown outcome: {label}"))
        })?),
        None => None,
    };

    Ok(Snapshot {
        id: id.clone(),
        version,
        preset_id,
        status,
        state,
        ended_at,
        outcome,
        created_at,
    })
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn create_reserved(&self, id: &SnapshotId, preset_id: &str) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO snapshots (id, version, preset_id, status) VALUES ($1, $2, $3, 'reserved')",
        )
        .bind(id.as_str())
        .bind(CURRENT_VERSION)
        .bind(preset_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(id, e))?;

        debug!(snapshot_id = %id, "reserved snapshot");
        Ok(())
    }

    async fn create_ready(&self, id: &SnapshotId, state: &GameState) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO snapshots (id, version, preset_id, status, state) \
             VALUES ($1, $2, $3, 'exists', $4)",
        )
        .bind(id.as_str())
        .bind(CURRENT_VERSION)
        .bind(&state.preset_id)
        .bind(Json(state))
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(id, e))?;

        debug!(snapshot_id = %id, "created ready snapshot");
        Ok(())
    }

    async fn load(&self, id: &SnapshotId) -> Result<Snapshot, DomainError> {
        let row = sqlx::query(
            "SELECT version, preset_id, status, state, ended_at, outcome, created_at \
             FROM snapshots WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?
        .ok_or_else(|| DomainError::NotFound(id.clone()))?;

        decode_row(id, &row)
    }

    async fn finalize(
        &self,
        id: &SnapshotId,
        state: &GameState,
        ending: Option<GameEnding>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE snapshots SET status = 'exists', state = $2, ended_at = $3, outcome = $4 \
             WHERE id = $1 AND status = 'reserved'",
        )
        .bind(id.as_str())
        .bind(Json(state))
        .bind(ending.map(|e| e.ended_at))
        .bind(ending.map(|e| e.outcome.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?;

        if result.rows_affected() == 1 {
            debug!(snapshot_id = %id, "finalized snapshot");
            return Ok(());
        }

        let current = self.load(id).await?;
        match current.status {
            SnapshotStatus::Exists if current.state.as_ref() == Some(state) => Ok(()),
            SnapshotStatus::Exists => Err(DomainError::Conflict {
                snapshot_id: id.clone(),
                reason: "snapshot already finalized with a different state".to_owned(),
            }),
            SnapshotStatus::Failed => Err(DomainError::Conflict {
                snapshot_id: id.clone(),
                reason: "snapshot already failed".to_owned(),
            }),
            SnapshotStatus::Reserved => Err(DomainError::Infrastructure(format!(
                "finalize of reserved snapshot {id} matched no rows"
            ))),
        }
    }

    async fn mark_failed(&self, id: &SnapshotId) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE snapshots SET status = 'failed' WHERE id = $1 AND status = 'reserved'",
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| infrastructure(&e))?;

        if result.rows_affected() == 1 {
            debug!(snapshot_id = %id, "marked snapshot failed");
            return Ok(());
        }

        let current = self.load(id).await?;
        match current.status {
            SnapshotStatus::Failed => Ok(()),
            SnapshotStatus::Exists => Err(DomainError::Conflict {
                snapshot_id: id.clone(),
                reason: "snapshot already finalized".to_owned(),
            }),
            SnapshotStatus::Reserved => Err(DomainError::Infrastructure(format!(
                "mark_failed of reserved snapshot {id} matched no rows"
            ))),
        }
    }
}
