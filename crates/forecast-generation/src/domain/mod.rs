//! Domain layer for the generation context.

pub mod fold;
pub mod schema;
