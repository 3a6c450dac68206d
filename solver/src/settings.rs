use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Pause between two autoplay steps.
    pub step_delay_ms: u64,
    /// Highest mine probability still accepted for a guess.
    pub predict_bound: f64,
    /// Open a random blank cell when neither deduction nor guess gives a move.
    pub random_when_stuck: bool,
}

impl SolverSettings {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            step_delay_ms: 10,
            predict_bound: 0.7,
            random_when_stuck: true,
        }
    }
}
