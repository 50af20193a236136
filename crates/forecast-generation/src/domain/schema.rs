//! Target schemas for generated output.
//!
//! A line validates against a schema when it deserializes into the type and
//! then passes [`Schema::validate`]. Lines that fail either step are still
//! forwarded as fragments; they just never become the final result.

use forecast_core::game::{GameOverEvent, NewsEvent, SummaryPayload, VoteEvent};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A fully-formed generated object.
pub trait Schema: DeserializeOwned + Send + 'static {
    /// Checks constraints the type system does not express.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    fn validate(&self) -> Result<(), String>;
}

/// Continuation of a game: new headlines, then a vote or an ending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    /// News since the previous turn, oldest first.
    pub events: Vec<NewsEvent>,
    /// The next vote, if the game goes on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<VoteEvent>,
    /// Set when this turn ends the game.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_over: Option<GameOverEvent>,
    /// Phase label after this turn.
    pub phase: String,
}

impl Schema for TurnResponse {
    fn validate(&self) -> Result<(), String> {
        for event in &self.events {
            event.date.validate()?;
        }
        if let Some(vote) = &self.vote {
            vote.validate()?;
        }
        Ok(())
    }
}

/// End-of-game summary.
pub type SummaryResponse = SummaryPayload;

impl Schema for SummaryPayload {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}
