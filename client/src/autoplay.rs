use std::sync::Arc;
use std::time::Duration;

use minesweeper_common::{
    models::Pos,
    protocol::{NewStatus, OpenOutcome},
};
use minesweeper_solver::{MoveKind, Predictions, SolverSettings, plan_step};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::game::{GameController, GameState};
use crate::{Error, Result};

/// How an autoplay run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoplayOutcome {
    Won { token: String },
    Stopped,
    /// The solver found nothing to open and random moves are disabled
    Stuck,
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AutoplayStats {
    pub games: usize,
    pub losses: usize,
    pub steps: usize,
    pub opened: usize,
    pub marked: usize,
    pub guesses: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoplayReport {
    pub outcome: AutoplayOutcome,
    pub stats: AutoplayStats,
}

/// Stops a running [`AutoPlayer`] before its next step
#[derive(Clone)]
pub struct StopHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Plays games with the solver until one is won, it is stopped, or it gets
/// stuck. A lost game is restarted at the same level.
pub struct AutoPlayer {
    settings: SolverSettings,
    rng: StdRng,
    stop: Arc<watch::Sender<bool>>,
    stopped: watch::Receiver<bool>,
    last_predict: Option<Predictions>,
}

impl AutoPlayer {
    pub fn new(settings: SolverSettings) -> Self {
        Self::with_rng(settings, StdRng::from_os_rng())
    }

    /// Deterministic random moves for a given seed
    pub fn with_seed(settings: SolverSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: SolverSettings, rng: StdRng) -> Self {
        let (sender, stopped) = watch::channel(false);
        Self {
            settings,
            rng,
            stop: Arc::new(sender),
            stopped,
            last_predict: None,
        }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            sender: self.stop.clone(),
        }
    }

    /// Play at `level` until the run ends.
    ///
    /// Starts a game unless `game` is already active. Transport and protocol
    /// errors end the run; the controller is back in [`GameState::Init`] by
    /// then.
    pub async fn run(&mut self, game: &mut GameController, level: u8) -> Result<AutoplayReport> {
        let mut stats = AutoplayStats::default();
        info!("Autoplay started at level {}", level);

        let outcome = loop {
            if self.is_stopped() {
                break AutoplayOutcome::Stopped;
            }
            if game.state() != GameState::Active {
                self.restart(game, level, &mut stats).await?;
                continue;
            }

            let plan = plan_step(
                game.board(),
                self.last_predict.as_ref(),
                &self.settings,
                &mut self.rng,
            );
            stats.steps += 1;
            if matches!(plan.kind, MoveKind::Guess | MoveKind::Random) {
                stats.guesses += 1;
            }
            debug!(
                "Step {}: {:?}, open {}, mark {}, predicted {}",
                stats.steps,
                plan.kind,
                plan.state.open.len(),
                plan.state.mark.len(),
                plan.state.predict.len()
            );

            let state = plan.state;
            self.last_predict = Some(state.predict);

            let marks: Vec<Pos> = state.mark.into_iter().collect();
            stats.marked += marks.len();
            game.mark_cells(&marks);

            if state.open.is_empty() {
                info!("No move left to make");
                break AutoplayOutcome::Stuck;
            }

            let open: Vec<Pos> = state.open.into_iter().collect();
            stats.opened += open.len();
            match game.open_cells(&open).await? {
                Some(OpenOutcome::Win { token }) => {
                    self.last_predict = None;
                    break AutoplayOutcome::Won { token };
                }
                Some(OpenOutcome::Lose) => {
                    stats.losses += 1;
                    info!("Lost game {}, restarting", stats.games);
                    self.restart(game, level, &mut stats).await?;
                }
                Some(OpenOutcome::Ok) | None => {
                    if self.pause(self.settings.step_delay()).await {
                        break AutoplayOutcome::Stopped;
                    }
                }
            }
        };

        info!("Autoplay finished: {:?} after {:?}", outcome, stats);
        Ok(AutoplayReport { outcome, stats })
    }

    async fn restart(
        &mut self,
        game: &mut GameController,
        level: u8,
        stats: &mut AutoplayStats,
    ) -> Result<()> {
        self.last_predict = None;
        stats.games += 1;
        match game.new_game(level).await? {
            NewStatus::Ok => Ok(()),
            NewStatus::Err => Err(Error::NewGameRefused(level)),
        }
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Sleep for `delay`; returns `true` if stopped meanwhile
    async fn pause(&mut self, delay: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = self.stopped.wait_for(|stopped| *stopped) => true,
        }
    }
}
