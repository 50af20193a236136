//! Test stores — in-memory `SnapshotStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use forecast_core::error::DomainError;
use forecast_core::game::{CURRENT_VERSION, GameState};
use forecast_core::snapshot::{GameEnding, Snapshot, SnapshotId, SnapshotStatus};
use forecast_core::store::SnapshotStore;

/// A snapshot store backed by a `HashMap`. Enforces the same transition rules
/// as the PostgreSQL store and records every status each id passed through.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    rows: Mutex<HashMap<SnapshotId, Snapshot>>,
    history: Mutex<HashMap<SnapshotId, Vec<SnapshotStatus>>>,
}

impl InMemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row as-is, bypassing transition checks.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert(&self, snapshot: Snapshot) {
        self.record(&snapshot.id, snapshot.status);
        self.rows
            .lock()
            .unwrap()
            .insert(snapshot.id.clone(), snapshot);
    }

    /// Returns a copy of the stored row, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn get(&self, id: &SnapshotId) -> Option<Snapshot> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    /// Returns the number of stored rows.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Returns `true` if no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every status the row for `id` has held, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn status_history(&self, id: &SnapshotId) -> Vec<SnapshotStatus> {
        self.history
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, id: &SnapshotId, status: SnapshotStatus) {
        self.history
            .lock()
            .unwrap()
            .entry(id.clone())
            .or_default()
            .push(status);
    }

    fn insert_new(&self, snapshot: Snapshot) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&snapshot.id) {
            return Err(DomainError::Conflict {
                snapshot_id: snapshot.id.clone(),
                reason: "snapshot id already exists".to_owned(),
            });
        }
        self.record(&snapshot.id, snapshot.status);
        rows.insert(snapshot.id.clone(), snapshot);
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn create_reserved(&self, id: &SnapshotId, preset_id: &str) -> Result<(), DomainError> {
        self.insert_new(Snapshot {
            id: id.clone(),
            version: CURRENT_VERSION,
            preset_id: preset_id.to_owned(),
            status: SnapshotStatus::Reserved,
            state: None,
            ended_at: None,
            outcome: None,
            created_at: Utc::now(),
        })
    }

    async fn create_ready(&self, id: &SnapshotId, state: &GameState) -> Result<(), DomainError> {
        self.insert_new(Snapshot {
            id: id.clone(),
            version: CURRENT_VERSION,
            preset_id: state.preset_id.clone(),
            status: SnapshotStatus::Exists,
            state: Some(state.clone()),
            ended_at: None,
            outcome: None,
            created_at: Utc::now(),
        })
    }

    async fn load(&self, id: &SnapshotId) -> Result<Snapshot, DomainError> {
        self.get(id).ok_or_else(|| DomainError::NotFound(id.clone()))
    }

    async fn finalize(
        &self,
        id: &SnapshotId,
        state: &GameState,
        ending: Option<GameEnding>,
    ) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(id.clone()))?;
        match row.status {
            SnapshotStatus::Reserved => {
                row.status = SnapshotStatus::Exists;
                row.state = Some(state.clone());
                row.ended_at = ending.map(|e| e.ended_at);
                row.outcome = ending.map(|e| e.outcome);
                self.record(id, SnapshotStatus::Exists);
                Ok(())
            }
            SnapshotStatus::Exists if row.state.as_ref() == Some(state) => Ok(()),
            SnapshotStatus::Exists => Err(DomainError::Conflict {
                snapshot_id: id.clone(),
                reason: "snapshot already finalized with a different state".to_owned(),
            }),
            SnapshotStatus::Failed => Err(DomainError::Conflict {
                snapshot_id: id.clone(),
                reason: "snapshot already failed".to_owned(),
            }),
        }
    }

    async fn mark_failed(&self, id: &SnapshotId) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(id.clone()))?;
        match row.status {
            SnapshotStatus::Reserved => {
                row.status = SnapshotStatus::Failed;
                self.record(id, SnapshotStatus::Failed);
                Ok(())
            }
            SnapshotStatus::Failed => Ok(()),
            SnapshotStatus::Exists => Err(DomainError::Conflict {
                snapshot_id: id.clone(),
                reason: "snapshot already finalized".to_owned(),
            }),
        }
    }
}

/// A snapshot store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingSnapshotStore;

#[async_trait]
impl SnapshotStore for FailingSnapshotStore {
    async fn create_reserved(
        &self,
        _id: &SnapshotId,
        _preset_id: &str,
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn create_ready(&self, _id: &SnapshotId, _state: &GameState) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn load(&self, _id: &SnapshotId) -> Result<Snapshot, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn finalize(
        &self,
        _id: &SnapshotId,
        _state: &GameState,
        _ending: Option<GameEnding>,
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn mark_failed(&self, _id: &SnapshotId) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
