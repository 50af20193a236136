//! Shared test mocks and utilities for the forecast game engine.

mod clock;
mod generator;
mod rng;
mod store;

pub use clock::FixedClock;
pub use generator::{FailingGenerator, GatedGenerator, ScriptedGenerator};
pub use rng::{MockRng, SequenceRng};
pub use store::{FailingSnapshotStore, InMemorySnapshotStore};
