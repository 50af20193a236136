//! Application layer for the turn ownership context.

pub mod command_handlers;
pub mod query_handlers;
