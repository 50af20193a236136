//! Snapshot records.
//!
//! A snapshot is an immutable point-in-time record of a game. It is written
//! once, either already `Exists` or as a `Reserved` placeholder, and a
//! reserved row receives exactly one more write: to `Exists` or `Failed`.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::game::{GameState, Outcome};
use crate::rng::DeterministicRng;

/// Length of generated snapshot ids.
pub const SNAPSHOT_ID_LEN: usize = 6;

const SNAPSHOT_ID_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Opaque snapshot identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Draws a fresh URL-safe identifier from `rng`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn generate(rng: &mut dyn DeterministicRng) -> Self {
        let max = (SNAPSHOT_ID_ALPHABET.len() - 1) as u32;
        let id = (0..SNAPSHOT_ID_LEN)
            .map(|_| {
                let index = rng.next_u32_range(0, max) as usize;
                char::from(SNAPSHOT_ID_ALPHABET[index.min(SNAPSHOT_ID_ALPHABET.len() - 1)])
            })
            .collect();
        Self(id)
    }

    /// Draws a fresh identifier from a shared RNG. The lock is held only for
    /// the draw itself.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the RNG mutex is poisoned.
    pub fn draw(rng: &Mutex<dyn DeterministicRng + Send>) -> Result<Self, DomainError> {
        let mut guard = rng
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
        Ok(Self::generate(&mut *guard))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SnapshotId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Lifecycle status of a snapshot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// Placeholder created before generation; no state yet.
    Reserved,
    /// State is present and final.
    Exists,
    /// Generation failed; terminal.
    Failed,
}

impl SnapshotStatus {
    /// Storage label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Exists => "exists",
            Self::Failed => "failed",
        }
    }

    /// Parses the storage label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "reserved" => Some(Self::Reserved),
            "exists" => Some(Self::Exists),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// How and when a game ended, recorded alongside the finalizing write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameEnding {
    /// When the ending was persisted.
    pub ended_at: DateTime<Utc>,
    /// The outcome.
    pub outcome: Outcome,
}

/// A stored snapshot row.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Snapshot identifier.
    pub id: SnapshotId,
    /// Schema version the row was written with.
    pub version: i32,
    /// Preset of the game.
    pub preset_id: String,
    /// Lifecycle status.
    pub status: SnapshotStatus,
    /// Game state; `None` unless `status` is `Exists`.
    pub state: Option<GameState>,
    /// When the game ended, if this snapshot ended it.
    pub ended_at: Option<DateTime<Utc>>,
    /// Outcome, if this snapshot ended the game.
    pub outcome: Option<Outcome>,
    /// When the row was inserted.
    pub created_at: DateTime<Utc>,
}
