//! Commands for the turn ownership context.

use forecast_core::command::Command;
use forecast_core::game::VoteChoices;
use forecast_core::snapshot::SnapshotId;
use uuid::Uuid;

/// Command to start a new game.
#[derive(Debug, Clone)]
pub struct CreateGame {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Preset to play; a random one is picked when `None`.
    pub preset_id: Option<String>,
}

impl Command for CreateGame {
    fn command_type(&self) -> &'static str {
        "turns.create_game"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to record the player's answers to the pending vote.
#[derive(Debug, Clone)]
pub struct SubmitPlayerChoices {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Snapshot whose pending vote is being answered.
    pub snapshot_id: SnapshotId,
    /// Topic id to option id.
    pub choices: VoteChoices,
}

impl Command for SubmitPlayerChoices {
    fn command_type(&self) -> &'static str {
        "turns.submit_player_choices"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
