//! Domain error types.

use thiserror::Error;

use crate::snapshot::SnapshotId;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No snapshot exists under the given id.
    #[error("snapshot not found: {0}")]
    NotFound(SnapshotId),

    /// A write collided with an existing row or a terminal status.
    #[error("conflict on snapshot {snapshot_id}: {reason}")]
    Conflict {
        /// The snapshot the write targeted.
        snapshot_id: SnapshotId,
        /// What the write collided with.
        reason: String,
    },

    /// The operation is not allowed in the snapshot's current turn.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Submitted input, or a generated final object, failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Generation ended without a usable result. Persisted as `failed`.
    #[error("generation failed for snapshot {snapshot_id}: {reason}")]
    GenerationFailed {
        /// The reserved snapshot that was marked failed.
        snapshot_id: SnapshotId,
        /// Why the generation failed.
        reason: String,
    },

    /// The stored row was written under a different schema version.
    #[error("snapshot {snapshot_id} has version {found}, expected {expected}")]
    VersionMismatch {
        /// The snapshot that was loaded.
        snapshot_id: SnapshotId,
        /// The version this build understands.
        expected: i32,
        /// The version found on the row.
        found: i32,
    },

    /// A generation task is already running against this source snapshot.
    #[error("generation already in progress for snapshot {0}")]
    GenerationInProgress(SnapshotId),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
