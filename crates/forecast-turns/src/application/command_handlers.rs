//! Command handlers for the turn ownership context.
//!
//! Player-authored transitions are computed synchronously and written
//! straight to `exists`; they never go through a reservation.

use std::sync::Mutex;

use forecast_core::command::Command;
use forecast_core::error::DomainError;
use forecast_core::game::{CURRENT_VERSION, GameEvent, GameState, VoteChoices, VoteChoicesEvent};
use forecast_core::rng::DeterministicRng;
use forecast_core::snapshot::{SnapshotId, SnapshotStatus};
use forecast_core::store::SnapshotStore;
use tracing::{info, instrument};

use crate::domain::commands::{CreateGame, SubmitPlayerChoices};
use crate::domain::presets::{find_preset, random_preset};
use crate::domain::turn::{TurnOwner, turn_owner};

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct TurnCommandResult {
    /// The snapshot written by the command.
    pub snapshot_id: SnapshotId,
    /// The state stored under `snapshot_id`.
    pub state: GameState,
}

/// Loads the state of a snapshot that is ready to be built upon.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown id,
/// `DomainError::VersionMismatch` for a row from another schema version,
/// `DomainError::PreconditionFailed` while the snapshot is still reserved, and
/// `DomainError::GenerationFailed` if its generation failed.
pub async fn load_ready_state(
    snapshot_id: &SnapshotId,
    store: &dyn SnapshotStore,
) -> Result<GameState, DomainError> {
    let snapshot = store.load(snapshot_id).await?;
    if snapshot.version != CURRENT_VERSION {
        return Err(DomainError::VersionMismatch {
            snapshot_id: snapshot_id.clone(),
            expected: CURRENT_VERSION,
            found: snapshot.version,
        });
    }
    match snapshot.status {
        SnapshotStatus::Exists => snapshot.state.ok_or_else(|| {
            DomainError::Infrastructure(format!("snapshot {snapshot_id} exists without state"))
        }),
        SnapshotStatus::Reserved => Err(DomainError::PreconditionFailed(format!(
            "snapshot {snapshot_id} is still generating"
        ))),
        SnapshotStatus::Failed => Err(DomainError::GenerationFailed {
            snapshot_id: snapshot_id.clone(),
            reason: "generation for this snapshot failed".to_owned(),
        }),
    }
}

fn validate_choices(choices: &VoteChoices) -> Result<(), DomainError> {
    for (topic_id, option_id) in choices {
        if topic_id.trim().is_empty() {
            return Err(DomainError::Validation("topic id must not be blank".to_owned()));
        }
        if option_id.trim().is_empty() {
            return Err(DomainError::Validation(format!(
                "option id for topic {topic_id} must not be blank"
            )));
        }
    }
    Ok(())
}

/// Handles the `CreateGame` command: picks the preset, writes the initial
/// state as a ready snapshot, and returns its id.
///
/// This is a creation command: the handler draws the `snapshot_id`.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an unknown preset and `DomainError`
/// if the RNG lock or the store write fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_create_game(
    command: &CreateGame,
    rng: &Mutex<dyn DeterministicRng + Send>,
    store: &dyn SnapshotStore,
) -> Result<TurnCommandResult, DomainError> {
    let preset = match command.preset_id.as_deref() {
        Some(id) => find_preset(id)
            .ok_or_else(|| DomainError::Validation(format!("unknown preset: {id}")))?,
        None => {
            let mut rng_guard = rng
                .lock()
                .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
            random_preset(&mut *rng_guard)
        }
    };

    let snapshot_id = SnapshotId::draw(rng)?;
    let state = GameState::new(preset.id);

    store.create_ready(&snapshot_id, &state).await?;

    info!(
        command = command.command_type(),
        snapshot_id = %snapshot_id,
        preset_id = preset.id,
        "created game"
    );

    Ok(TurnCommandResult { snapshot_id, state })
}

/// Handles the `SubmitPlayerChoices` command: checks that the player owns the
/// turn, appends a `voteChoices` event to a copy of the log, and writes the
/// result as a new ready snapshot. Phase and date are left for the next
/// generation to update.
///
/// # Errors
///
/// Returns `DomainError::PreconditionFailed` if the player does not own the
/// turn or the game is over, `DomainError::Validation` for blank ids, and
/// any error from [`load_ready_state`] or the store write.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, source_id = %command.snapshot_id))]
pub async fn handle_submit_player_choices(
    command: &SubmitPlayerChoices,
    rng: &Mutex<dyn DeterministicRng + Send>,
    store: &dyn SnapshotStore,
) -> Result<TurnCommandResult, DomainError> {
    let source = load_ready_state(&command.snapshot_id, store).await?;

    let owner = turn_owner(&source);
    if owner != TurnOwner::Player || source.is_game_over {
        return Err(DomainError::PreconditionFailed(format!(
            "snapshot {} is not awaiting player choices (turn owner: {owner:?})",
            command.snapshot_id
        )));
    }
    validate_choices(&command.choices)?;

    let mut state = source;
    state.events.push(GameEvent::VoteChoices(VoteChoicesEvent {
        choices: command.choices.clone(),
    }));

    let snapshot_id = SnapshotId::draw(rng)?;
    store.create_ready(&snapshot_id, &state).await?;

    info!(
        command = command.command_type(),
        snapshot_id = %snapshot_id,
        "recorded player choices"
    );

    Ok(TurnCommandResult { snapshot_id, state })
}
