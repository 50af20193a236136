//! Folding validated generator output into a new game state.
//!
//! Both functions start from the *source* snapshot's state. A reservation has
//! no log of its own, so there is nothing else to build on.

use forecast_core::game::{GameEvent, GameState, Outcome, SummaryPayload};

use crate::domain::schema::TurnResponse;

/// Appends a generated turn to a copy of `source`.
///
/// News events are appended in order, followed by the vote and then the
/// game over marker when present. The phase always comes from the response;
/// the date moves to the last generated headline and stays put if there is
/// none. Returns the new state and the outcome if the game just ended.
#[must_use]
pub fn fold_turn(source: &GameState, response: TurnResponse) -> (GameState, Option<Outcome>) {
    let mut state = source.clone();

    if let Some(last) = response.events.last() {
        state.date = last.date;
    }
    state
        .events
        .extend(response.events.into_iter().map(GameEvent::News));
    if let Some(vote) = response.vote {
        state.events.push(GameEvent::Vote(vote));
    }
    let outcome = response.game_over.map(|game_over| game_over.outcome);
    if let Some(game_over) = response.game_over {
        state.events.push(GameEvent::GameOver(game_over));
    }
    state.phase = response.phase;
    state.is_game_over = outcome.is_some();

    (state, outcome)
}

/// Attaches a post-game summary to a copy of `source`. The log is untouched.
#[must_use]
pub fn attach_summary(source: &GameState, summary: SummaryPayload) -> GameState {
    let mut state = source.clone();
    state.summary = Some(summary);
    state
}
