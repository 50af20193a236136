//! Query handlers for the turn ownership context.

use chrono::{DateTime, Utc};
use forecast_core::error::DomainError;
use forecast_core::game::{CURRENT_VERSION, GameState, Outcome, VoteEvent};
use forecast_core::snapshot::{SnapshotId, SnapshotStatus};
use forecast_core::store::SnapshotStore;
use serde::Serialize;

use crate::domain::turn::{TurnOwner, turn_owner};

/// Client-facing readiness of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotReadiness {
    /// State is available.
    Ready,
    /// A generation task is still producing the state.
    Generating,
    /// Generation failed; the snapshot will never become ready.
    Failed,
}

impl From<SnapshotStatus> for SnapshotReadiness {
    fn from(status: SnapshotStatus) -> Self {
        match status {
            SnapshotStatus::Exists => Self::Ready,
            SnapshotStatus::Reserved => Self::Generating,
            SnapshotStatus::Failed => Self::Failed,
        }
    }
}

/// Read-only view of a snapshot.
#[derive(Debug, Serialize)]
pub struct SnapshotView {
    /// The snapshot identifier.
    pub snapshot_id: SnapshotId,
    /// Readiness of the snapshot.
    pub status: SnapshotReadiness,
    /// Preset the game was started with.
    pub preset_id: String,
    /// Game state, once ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<GameState>,
    /// Who acts next, once ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_owner: Option<TurnOwner>,
    /// The vote awaiting the player's answer, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_vote: Option<VoteEvent>,
    /// When the game ended, if this snapshot ended it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// How the game ended, if this snapshot ended it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

/// Retrieves a snapshot by id.
///
/// Reserved and failed snapshots are returned as views without state.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown id,
/// `DomainError::VersionMismatch` for a row from another schema version, and
/// `DomainError::Infrastructure` if the store fails.
pub async fn get_snapshot_by_id(
    snapshot_id: &SnapshotId,
    store: &dyn SnapshotStore,
) -> Result<SnapshotView, DomainError> {
    let snapshot = store.load(snapshot_id).await?;
    if snapshot.version != CURRENT_VERSION {
        return Err(DomainError::VersionMismatch {
            snapshot_id: snapshot_id.clone(),
            expected: CURRENT_VERSION,
            found: snapshot.version,
        });
    }

    let owner = snapshot.state.as_ref().map(turn_owner);
    let pending_vote = match (owner, snapshot.state.as_ref()) {
        (Some(TurnOwner::Player), Some(state)) => state.pending_vote().cloned(),
        _ => None,
    };

    Ok(SnapshotView {
        snapshot_id: snapshot.id,
        status: snapshot.status.into(),
        preset_id: snapshot.preset_id,
        state: snapshot.state,
        turn_owner: owner,
        pending_vote,
        ended_at: snapshot.ended_at,
        outcome: snapshot.outcome,
    })
}
