//! Forecast game — turn ownership bounded context.
//!
//! Derives whose turn it is from a snapshot's event log and handles the
//! transitions the player authors directly: starting a game and answering a
//! vote. Generated transitions live in `forecast-generation`.

pub mod application;
pub mod domain;
