//! Forecast game — generation of new snapshots.
//!
//! Reserves child snapshots, drives the narrative generator in detached tasks,
//! and turns its newline-delimited JSON output into one validated result.

pub mod application;
pub mod codec;
pub mod domain;
pub mod http_generator;
