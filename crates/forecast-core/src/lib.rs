//! Forecast Core — shared domain model and abstractions.
//!
//! This crate defines the game state model, the snapshot record, the store
//! trait every other crate depends on, and the determinism seams (clock and
//! RNG). It contains no infrastructure code.

pub mod clock;
pub mod command;
pub mod error;
pub mod game;
pub mod generator;
pub mod rng;
pub mod snapshot;
pub mod store;
