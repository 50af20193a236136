//! Turn ownership state machine.
//!
//! The turn owner is never stored. It is recomputed from the shape of the
//! event log every time, so a stored state and its owner cannot disagree.

use forecast_core::game::{GameEvent, GameState};
use serde::Serialize;

/// The party expected to act next on a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOwner {
    /// The narrative generator must produce the next turn.
    Generator,
    /// The player must answer the pending vote.
    Player,
    /// The game is over and needs its summary.
    Summarizer,
    /// Nothing left to do.
    Done,
}

/// Derives the turn owner from a game state.
///
/// A log that ends in `gameOver` counts as finished even if the
/// `is_game_over` flag was not set alongside it.
#[must_use]
pub fn turn_owner(state: &GameState) -> TurnOwner {
    let Some(last) = state.last_event() else {
        return TurnOwner::Generator;
    };
    if state.summary.is_some() {
        return TurnOwner::Done;
    }
    if state.is_game_over || matches!(last, GameEvent::GameOver(_)) {
        return TurnOwner::Summarizer;
    }
    match last {
        GameEvent::Vote(_) => TurnOwner::Player,
        // A log ending in news is never written by a generation on its own;
        // hand it back to the generator.
        GameEvent::VoteChoices(_) | GameEvent::News(_) | GameEvent::GameOver(_) => {
            TurnOwner::Generator
        }
    }
}
