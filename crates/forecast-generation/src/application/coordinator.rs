//! Generation coordinator.
//!
//! Every generation gets its child snapshot reserved before any work starts,
//! then runs in a spawned task that owns the reservation until it reaches
//! `exists` or `failed`. Callers only hold the receiving ends of two channels;
//! dropping them never stops the task.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use forecast_core::clock::Clock;
use forecast_core::error::DomainError;
use forecast_core::game::GameState;
use forecast_core::generator::{ByteStream, GenerationKind, GenerationRequest, NarrativeGenerator};
use forecast_core::rng::DeterministicRng;
use forecast_core::snapshot::{GameEnding, SnapshotId};
use forecast_core::store::SnapshotStore;
use forecast_turns::application::command_handlers::load_ready_state;
use forecast_turns::domain::turn::{TurnOwner, turn_owner};
use serde_json::{Value, json};
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::codec::{Decoded, decode_stream};
use crate::domain::fold::{attach_summary, fold_turn};
use crate::domain::schema::{Schema, SummaryResponse, TurnResponse};

/// Default capacity of the listener channel.
pub const DEFAULT_FRAGMENT_BUFFER: usize = 32;

/// Default wait for room in a full listener channel before the terminal
/// message is dropped.
pub const DEFAULT_TERMINAL_TIMEOUT: Duration = Duration::from_secs(30);

/// A message delivered to the listener of a generation.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// A parsed fragment, valid or not.
    Fragment(Value),
    /// The validated final object. Always the last message on success.
    Complete(Value),
    /// Terminal failure. Always the last message on failure.
    Error(String),
}

impl StreamMessage {
    /// Encodes the message as one NDJSON line.
    #[must_use]
    pub fn to_ndjson_line(&self) -> Bytes {
        let value = match self {
            Self::Fragment(value) | Self::Complete(value) => value.to_string(),
            Self::Error(message) => json!({ "error": message }).to_string(),
        };
        Bytes::from(format!("{value}\n"))
    }
}

/// How a generation task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The reservation was finalized with the generated state.
    Finalized,
    /// The reservation was marked failed.
    Failed {
        /// Why the generation failed.
        reason: String,
    },
}

/// Returned by [`GenerationCoordinator::start_generation`].
#[derive(Debug)]
pub struct GenerationHandle {
    /// The reserved child snapshot.
    pub snapshot_id: SnapshotId,
    /// Which schema is being generated.
    pub kind: GenerationKind,
    /// Fragments as they arrive, then one terminal message.
    pub messages: mpsc::Receiver<StreamMessage>,
    /// Resolves once the reservation has reached its terminal status.
    pub completion: oneshot::Receiver<GenerationOutcome>,
}

/// Starts generations and owns the set of sources with a task in flight.
pub struct GenerationCoordinator {
    store: Arc<dyn SnapshotStore>,
    generator: Arc<dyn NarrativeGenerator>,
    clock: Arc<dyn Clock>,
    rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    in_flight: Arc<Mutex<HashSet<SnapshotId>>>,
    fragment_buffer: usize,
    terminal_timeout: Duration,
}

impl GenerationCoordinator {
    /// Creates a coordinator with the default listener buffer.
    #[must_use]
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        generator: Arc<dyn NarrativeGenerator>,
        clock: Arc<dyn Clock>,
        rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    ) -> Self {
        Self {
            store,
            generator,
            clock,
            rng,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            fragment_buffer: DEFAULT_FRAGMENT_BUFFER,
            terminal_timeout: DEFAULT_TERMINAL_TIMEOUT,
        }
    }

    /// Sets the listener channel capacity. Fragments that do not fit are
    /// dropped for the listener only.
    #[must_use]
    pub fn with_fragment_buffer(mut self, capacity: usize) -> Self {
        self.fragment_buffer = capacity.max(1);
        self
    }

    /// Sets how long a finished task waits for a stalled listener to make
    /// room for the terminal message.
    #[must_use]
    pub fn with_terminal_timeout(mut self, timeout: Duration) -> Self {
        self.terminal_timeout = timeout;
        self
    }

    /// Whether a task is currently running against `source_id`.
    #[must_use]
    pub fn is_in_flight(&self, source_id: &SnapshotId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(source_id)
    }

    /// Reserves a child of `source_id` and spawns the task that fills it.
    ///
    /// Returns as soon as the reservation exists; the child id is pollable
    /// from that point on.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::GenerationInProgress` if a task is already
    /// running against this source, `DomainError::PreconditionFailed` if the
    /// source is not awaiting a generation, and any error from loading the
    /// source or creating the reservation. No reservation exists after an
    /// error.
    #[instrument(skip_all, fields(source_id = %source_id, correlation_id = %correlation_id))]
    pub async fn start_generation(
        &self,
        source_id: &SnapshotId,
        correlation_id: Uuid,
    ) -> Result<GenerationHandle, DomainError> {
        let guard = InFlightGuard::acquire(&self.in_flight, source_id)?;

        let source = load_ready_state(source_id, self.store.as_ref()).await?;
        let kind = match turn_owner(&source) {
            TurnOwner::Generator => GenerationKind::Turn,
            TurnOwner::Summarizer => GenerationKind::Summary,
            owner @ (TurnOwner::Player | TurnOwner::Done) => {
                return Err(DomainError::PreconditionFailed(format!(
                    "snapshot {source_id} is not awaiting generation (turn owner: {owner:?})"
                )));
            }
        };

        let snapshot_id = SnapshotId::draw(self.rng.as_ref())?;
        self.store
            .create_reserved(&snapshot_id, &source.preset_id)
            .await?;
        info!(snapshot_id = %snapshot_id, ?kind, "reserved snapshot for generation");

        let (sender, messages) = mpsc::channel(self.fragment_buffer);
        let (completion_tx, completion) = oneshot::channel();
        let task = GenerationTask {
            store: Arc::clone(&self.store),
            generator: Arc::clone(&self.generator),
            clock: Arc::clone(&self.clock),
            snapshot_id: snapshot_id.clone(),
            kind,
            source,
            listener: Listener {
                sender: Some(sender),
                dropped: 0,
                terminal_timeout: self.terminal_timeout,
            },
            guard: Some(guard),
        };
        let span = info_span!(
            "generation_task",
            snapshot_id = %snapshot_id,
            source_id = %source_id,
            correlation_id = %correlation_id
        );
        tokio::spawn(task.run(completion_tx).instrument(span));

        Ok(GenerationHandle {
            snapshot_id,
            kind,
            messages,
            completion,
        })
    }
}

/// Marks a source as generating until dropped.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<SnapshotId>>>,
    source_id: SnapshotId,
}

impl InFlightGuard {
    fn acquire(
        in_flight: &Arc<Mutex<HashSet<SnapshotId>>>,
        source_id: &SnapshotId,
    ) -> Result<Self, DomainError> {
        let mut sources = in_flight
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("in-flight mutex poisoned: {e}")))?;
        if !sources.insert(source_id.clone()) {
            return Err(DomainError::GenerationInProgress(source_id.clone()));
        }
        Ok(Self {
            in_flight: Arc::clone(in_flight),
            source_id: source_id.clone(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.source_id);
    }
}

/// The sending side of a listener. Never blocks while fragments flow, and
/// waits at most `terminal_timeout` for the terminal message.
struct Listener {
    sender: Option<mpsc::Sender<StreamMessage>>,
    dropped: usize,
    terminal_timeout: Duration,
}

impl Listener {
    fn forward(&mut self, message: StreamMessage) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.dropped += 1,
            Err(TrySendError::Closed(_)) => {
                debug!("listener detached");
                self.sender = None;
            }
        }
    }

    async fn close(mut self, message: StreamMessage) {
        let Some(sender) = self.sender.take() else {
            return;
        };
        match sender.send_timeout(message, self.terminal_timeout).await {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                warn!(
                    timeout_ms = self.terminal_timeout.as_millis(),
                    "listener stalled; terminal message dropped"
                );
            }
            Err(SendTimeoutError::Closed(_)) => {
                debug!("listener detached before terminal message");
            }
        }
    }
}

struct Produced {
    state: GameState,
    ending: Option<GameEnding>,
    final_fragment: Value,
}

struct GenerationTask {
    store: Arc<dyn SnapshotStore>,
    generator: Arc<dyn NarrativeGenerator>,
    clock: Arc<dyn Clock>,
    snapshot_id: SnapshotId,
    kind: GenerationKind,
    source: GameState,
    listener: Listener,
    guard: Option<InFlightGuard>,
}

impl GenerationTask {
    async fn run(mut self, completion: oneshot::Sender<GenerationOutcome>) {
        let (outcome, terminal) = match self.produce().await {
            Ok(produced) => match self
                .store
                .finalize(&self.snapshot_id, &produced.state, produced.ending)
                .await
            {
                Ok(()) => {
                    info!(
                        events = produced.state.events.len(),
                        game_over = produced.state.is_game_over,
                        "generation finalized"
                    );
                    (
                        GenerationOutcome::Finalized,
                        StreamMessage::Complete(produced.final_fragment),
                    )
                }
                Err(e) => {
                    self.fail(DomainError::GenerationFailed {
                        snapshot_id: self.snapshot_id.clone(),
                        reason: format!("failed to persist generated state: {e}"),
                    })
                    .await
                }
            },
            Err(e) => self.fail(e).await,
        };

        self.guard.take();
        // The caller may have stopped waiting.
        let _ = completion.send(outcome);
        self.listener.close(terminal).await;
    }

    async fn produce(&mut self) -> Result<Produced, DomainError> {
        let request = GenerationRequest {
            kind: self.kind,
            state: self.source.clone(),
            choices: self.source.trailing_choices().cloned(),
        };
        let stream = self.generator.generate(request).await?;

        match self.kind {
            GenerationKind::Turn => {
                let decoded = self.decode::<TurnResponse>(stream).await?;
                let (state, outcome) = fold_turn(&self.source, decoded.value);
                let ending = outcome.map(|outcome| GameEnding {
                    ended_at: self.clock.now(),
                    outcome,
                });
                Ok(Produced {
                    state,
                    ending,
                    final_fragment: decoded.raw,
                })
            }
            GenerationKind::Summary => {
                let decoded = self.decode::<SummaryResponse>(stream).await?;
                Ok(Produced {
                    state: attach_summary(&self.source, decoded.value),
                    ending: None,
                    final_fragment: decoded.raw,
                })
            }
        }
    }

    async fn decode<S: Schema>(&mut self, stream: ByteStream) -> Result<Decoded<S>, DomainError> {
        let listener = &mut self.listener;
        let decoded = decode_stream::<S>(stream, |fragment| {
            listener.forward(StreamMessage::Fragment(fragment.clone()));
        })
        .await
        .map_err(|e| e.into_domain(&self.snapshot_id))?;

        debug!(
            fragments = decoded.stats.fragments_forwarded,
            rejected = decoded.stats.schema_rejections,
            dropped_lines = decoded.stats.lines_dropped,
            listener_drops = self.listener.dropped,
            "stream decoded"
        );
        Ok(decoded)
    }

    async fn fail(&self, error: DomainError) -> (GenerationOutcome, StreamMessage) {
        warn!(error = %error, "generation failed");
        let reason = failure_reason(error);
        if let Err(e) = self.store.mark_failed(&self.snapshot_id).await {
            error!(error = %e, "failed to mark snapshot failed");
        }
        (
            GenerationOutcome::Failed {
                reason: reason.clone(),
            },
            StreamMessage::Error(reason),
        )
    }
}

/// The listener-facing reason. A `GenerationFailed` already names this
/// snapshot, so only its reason is kept.
fn failure_reason(error: DomainError) -> String {
    match error {
        DomainError::GenerationFailed { reason, .. } => reason,
        other => other.to_string(),
    }
}
