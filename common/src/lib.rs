//! Shared types for the minesweeper line-protocol client.
//!
//! `protocol` holds the wire grammar (requests, responses and their parsers),
//! `models` the typed board the controller and the solver work on.

pub mod models;
pub mod protocol;
