//! Snapshot store abstraction.
//!
//! The only storage seam the engine depends on. Every operation touches a
//! single row; implementations must give read-your-writes consistency per id.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::game::GameState;
use crate::snapshot::{GameEnding, Snapshot, SnapshotId};

/// Persistence for immutable game snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Inserts a `reserved` placeholder with no state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` if `id` already exists.
    async fn create_reserved(&self, id: &SnapshotId, preset_id: &str) -> Result<(), DomainError>;

    /// Inserts a row that is `exists` from the start.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` if `id` already exists.
    async fn create_ready(&self, id: &SnapshotId, state: &GameState) -> Result<(), DomainError>;

    /// Loads a snapshot row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no row exists for `id`.
    async fn load(&self, id: &SnapshotId) -> Result<Snapshot, DomainError>;

    /// Moves a `reserved` row to `exists` with its final state.
    ///
    /// Finalizing a row that already `exists` with an identical state is a
    /// no-op so the call is safe to retry.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown id and
    /// `DomainError::Conflict` if the row is `failed` or already holds a
    /// different state.
    async fn finalize(
        &self,
        id: &SnapshotId,
        state: &GameState,
        ending: Option<GameEnding>,
    ) -> Result<(), DomainError>;

    /// Moves a `reserved` row to `failed`. Repeating the call on a `failed`
    /// row is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown id and
    /// `DomainError::Conflict` if the row already `exists`.
    async fn mark_failed(&self, id: &SnapshotId) -> Result<(), DomainError>;
}
