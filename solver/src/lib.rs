//! Deterministic solver for the revealed part of a minesweeper board.
//!
//! The engine only reads a [`Board`](minesweeper_common::models::Board) and
//! returns what to do next; applying the moves is the caller's business.
//!
//! - [`look_at_field`] runs single-constraint deduction over the whole board
//!   until nothing new can be classified.
//! - [`recheck_predictions`] re-validates only the cells a previous pass left
//!   ambiguous.
//! - [`plan_step`] combines both with the guess and random-move policies.

mod deduce;
mod guess;
mod plan;
mod settings;

pub use deduce::{Predictions, SolveState, look_around, look_at_field, recheck_predictions};
pub use guess::{RANDOM_ATTEMPTS, best_guess, random_blank};
pub use plan::{MoveKind, Plan, plan_step};
pub use settings::SolverSettings;
