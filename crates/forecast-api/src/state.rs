//! Shared application state.

use std::sync::{Arc, Mutex};

use forecast_core::clock::Clock;
use forecast_core::generator::NarrativeGenerator;
use forecast_core::rng::DeterministicRng;
use forecast_core::store::SnapshotStore;
use forecast_generation::application::coordinator::GenerationCoordinator;
use forecast_generation::application::poller::PollPolicy;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// RNG for snapshot ids and preset selection.
    pub rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    /// Snapshot persistence.
    pub snapshot_store: Arc<dyn SnapshotStore>,
    /// Starts and tracks generation tasks.
    pub coordinator: Arc<GenerationCoordinator>,
    /// Schedule for `?wait=true` lookups.
    pub poll_policy: PollPolicy,
}

impl AppState {
    /// Create new application state. The clock goes to the coordinator, which
    /// also shares the RNG and store handed in here.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        rng: Arc<Mutex<dyn DeterministicRng + Send>>,
        snapshot_store: Arc<dyn SnapshotStore>,
        generator: Arc<dyn NarrativeGenerator>,
        fragment_buffer: usize,
        poll_policy: PollPolicy,
    ) -> Self {
        let coordinator = GenerationCoordinator::new(
            Arc::clone(&snapshot_store),
            generator,
            clock,
            Arc::clone(&rng),
        )
        .with_fragment_buffer(fragment_buffer);

        Self {
            rng,
            snapshot_store,
            coordinator: Arc::new(coordinator),
            poll_policy,
        }
    }
}
