//! Narrative generator collaborator.
//!
//! The engine never produces narrative content itself. It hands the current
//! state to a generator and consumes the newline-delimited JSON byte stream
//! that comes back.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::Serialize;

use crate::error::DomainError;
use crate::game::{GameState, VoteChoices};

/// Chunked NDJSON body produced by a generator. An `Err` item ends the
/// stream with an upstream failure.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>;

/// Which schema the generator is asked to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    /// Continue the game: news, then a vote or a game over.
    Turn,
    /// Post-game summary.
    Summary,
}

/// Input handed to the generator.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// Requested schema.
    pub kind: GenerationKind,
    /// State of the source snapshot.
    pub state: GameState,
    /// The player's latest choices, when the log ends with them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<VoteChoices>,
}

/// Produces generated content as a live byte stream.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Starts a generation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the generation cannot be
    /// started at all. Failures after the stream has started are reported as
    /// `Err` items on the stream.
    async fn generate(&self, request: GenerationRequest) -> Result<ByteStream, DomainError>;
}
