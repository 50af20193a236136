//! Recovery poller.
//!
//! A caller that lost its stream learns how a reservation ended by polling
//! the store. Running out of attempts is reported as `TimedOut`, which is not
//! the same thing as a persisted failure.

use std::time::Duration;

use forecast_core::error::DomainError;
use forecast_core::game::{CURRENT_VERSION, GameState};
use forecast_core::snapshot::{SnapshotId, SnapshotStatus};
use forecast_core::store::SnapshotStore;
use tracing::debug;

/// Bounded polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Number of loads before giving up. Zero never loads.
    pub attempts: u32,
    /// Wait between loads.
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval: Duration::from_secs(2),
        }
    }
}

/// Result of polling a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The snapshot exists with this state.
    Ready(GameState),
    /// Generation failed.
    Failed,
    /// The snapshot was still reserved after the last attempt.
    TimedOut,
}

/// Loads `snapshot_id` until it leaves `reserved` or the policy runs out.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown id,
/// `DomainError::VersionMismatch` for a row from another schema version, and
/// any store error.
pub async fn poll_until_terminal(
    store: &dyn SnapshotStore,
    snapshot_id: &SnapshotId,
    policy: PollPolicy,
) -> Result<PollOutcome, DomainError> {
    for attempt in 1..=policy.attempts {
        let snapshot = store.load(snapshot_id).await?;
        if snapshot.version != CURRENT_VERSION {
            return Err(DomainError::VersionMismatch {
                snapshot_id: snapshot_id.clone(),
                expected: CURRENT_VERSION,
                found: snapshot.version,
            });
        }
        match snapshot.status {
            SnapshotStatus::Exists => {
                let state = snapshot.state.ok_or_else(|| {
                    DomainError::Infrastructure(format!(
                        "snapshot {snapshot_id} exists without state"
                    ))
                })?;
                return Ok(PollOutcome::Ready(state));
            }
            SnapshotStatus::Failed => return Ok(PollOutcome::Failed),
            SnapshotStatus::Reserved => {
                debug!(snapshot_id = %snapshot_id, attempt, "snapshot still reserved");
            }
        }
        if attempt < policy.attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    Ok(PollOutcome::TimedOut)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use forecast_core::error::DomainError;
    use forecast_core::game::GameState;
    use forecast_core::snapshot::SnapshotId;
    use forecast_core::store::SnapshotStore;

    use super::{PollOutcome, PollPolicy, poll_until_terminal};
    use forecast_test_support::InMemorySnapshotStore;

    fn fast(attempts: u32) -> PollPolicy {
        PollPolicy {
            attempts,
            interval: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();

        assert_eq!(policy.attempts, 30);
        assert_eq!(policy.interval, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_poll_returns_ready_state() {
        // Arrange
        let store = InMemorySnapshotStore::new();
        let id = SnapshotId::new("ready1");
        let state = GameState::new("slowTakeoff");
        store.create_ready(&id, &state).await.unwrap();

        // Act
        let outcome = poll_until_terminal(&store, &id, fast(3)).await.unwrap();

        // Assert
        assert_eq!(outcome, PollOutcome::Ready(state));
    }

    #[tokio::test]
    async fn test_poll_times_out_while_reserved() {
        // Arrange
        let store = InMemorySnapshotStore::new();
        let id = SnapshotId::new("pend01");
        store.create_reserved(&id, "slowTakeoff").await.unwrap();

        // Act
        let outcome = poll_until_terminal(&store, &id, fast(3)).await.unwrap();

        // Assert
        assert_eq!(outcome, PollOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_poll_observes_failure_written_later() {
        // Arrange
        let store = Arc::new(InMemorySnapshotStore::new());
        let id = SnapshotId::new("fail01");
        store.create_reserved(&id, "slowTakeoff").await.unwrap();
        let writer = {
            let store = Arc::clone(&store);
            let id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                store.mark_failed(&id).await.unwrap();
            })
        };

        // Act
        let outcome = poll_until_terminal(store.as_ref(), &id, fast(200))
            .await
            .unwrap();

        // Assert
        writer.await.unwrap();
        assert_eq!(outcome, PollOutcome::Failed);
    }

    #[tokio::test]
    async fn test_poll_propagates_not_found() {
        // Arrange
        let store = InMemorySnapshotStore::new();

        // Act
        let result = poll_until_terminal(&store, &SnapshotId::new("ghost1"), fast(3)).await;

        // Assert
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }
}
