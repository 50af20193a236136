//! Domain layer for the turn ownership context.

pub mod commands;
pub mod presets;
pub mod turn;
