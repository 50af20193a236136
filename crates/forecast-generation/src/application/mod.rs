//! Application layer for the generation context.

pub mod coordinator;
pub mod poller;
