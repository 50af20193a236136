//! Test generators — scripted `NarrativeGenerator` implementations for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use forecast_core::error::DomainError;
use forecast_core::generator::{ByteStream, GenerationRequest, NarrativeGenerator};
use futures::StreamExt;
use tokio::sync::Semaphore;

/// A generator that replays a fixed list of chunks on every call and records
/// the requests it received.
#[derive(Debug)]
pub struct ScriptedGenerator {
    chunks: Vec<Result<Bytes, String>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    /// Replays `chunks` verbatim.
    #[must_use]
    pub fn new(chunks: Vec<Result<Bytes, String>>) -> Self {
        Self {
            chunks,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replays each line followed by a newline, one chunk per line.
    #[must_use]
    pub fn from_lines(lines: &[&str]) -> Self {
        Self::new(
            lines
                .iter()
                .map(|line| Ok(Bytes::from(format!("{line}\n"))))
                .collect(),
        )
    }

    /// Returns the requests received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl NarrativeGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<ByteStream, DomainError> {
        self.requests.lock().unwrap().push(request);
        Ok(Box::pin(futures::stream::iter(self.chunks.clone())))
    }
}

/// A generator that cannot be reached.
#[derive(Debug)]
pub struct FailingGenerator;

#[async_trait]
impl NarrativeGenerator for FailingGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<ByteStream, DomainError> {
        Err(DomainError::Infrastructure("generator unavailable".into()))
    }
}

/// A generator whose stream holds back every chunk until [`GatedGenerator::open`]
/// is called. Used to act while a generation is still in flight.
#[derive(Debug)]
pub struct GatedGenerator {
    chunks: Vec<Result<Bytes, String>>,
    gate: Arc<Semaphore>,
}

impl GatedGenerator {
    /// Replays each line followed by a newline once the gate opens.
    #[must_use]
    pub fn from_lines(lines: &[&str]) -> Self {
        Self {
            chunks: lines
                .iter()
                .map(|line| Ok(Bytes::from(format!("{line}\n"))))
                .collect(),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Releases one waiting generation.
    pub fn open(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl NarrativeGenerator for GatedGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<ByteStream, DomainError> {
        let gate = Arc::clone(&self.gate);
        let chunks = self.chunks.clone();
        let stream = futures::stream::once(async move {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
            futures::stream::iter(chunks)
        })
        .flatten();
        Ok(Box::pin(stream))
    }
}
