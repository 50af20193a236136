//! Forecast game — HTTP API.
//!
//! Library half of the API server so integration tests can build the same
//! router the binary serves.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
