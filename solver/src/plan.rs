use minesweeper_common::models::Board;
use rand::Rng;
use tracing::debug;

use crate::{
    Predictions, SolveState, SolverSettings, best_guess, look_at_field, random_blank,
    recheck_predictions,
};

/// How the cells in [`Plan::state`]`.open` were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// Proven safe by deduction.
    Deduced,
    /// Lowest predicted risk within the configured bound.
    Guess,
    /// Random blank cell because nothing better was available.
    Random,
    /// Random first move on a board without any opened cell.
    Bootstrap,
    /// No move found.
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub state: SolveState,
    pub kind: MoveKind,
}

/// Decides the next move for `board`.
///
/// Cells left ambiguous by the previous step are re-checked first; the whole
/// board is only swept when that yields no safe cell. Without a safe cell the
/// least risky prediction is taken if it is within
/// [`SolverSettings::predict_bound`], otherwise a random blank cell when
/// [`SolverSettings::random_when_stuck`] allows it.
pub fn plan_step<R: Rng + ?Sized>(
    board: &Board,
    previous: Option<&Predictions>,
    settings: &SolverSettings,
    rng: &mut R,
) -> Plan {
    let seed = previous
        .filter(|predict| !predict.is_empty())
        .map(|predict| recheck_predictions(board, predict));

    let mut state = match seed {
        Some(state) if !state.open.is_empty() => {
            return Plan {
                state,
                kind: MoveKind::Deduced,
            };
        }
        seed => look_at_field(board, seed),
    };

    if !state.open.is_empty() {
        return Plan {
            state,
            kind: MoveKind::Deduced,
        };
    }

    if !board.has_opened() {
        let kind = match random_blank(board, &state.mark, rng) {
            Some(pos) => {
                state.open.insert(pos);
                MoveKind::Bootstrap
            }
            None => MoveKind::Nothing,
        };
        return Plan { state, kind };
    }

    if let Some(pos) = best_guess(&state.predict, settings.predict_bound) {
        debug!(
            "Guessing ({}) with risk {:.3}",
            pos,
            state.predict.get(&pos).copied().unwrap_or_default()
        );
        state.predict.remove(&pos);
        state.open.insert(pos);
        return Plan {
            state,
            kind: MoveKind::Guess,
        };
    }

    if settings.random_when_stuck
        && let Some(pos) = random_blank(board, &state.mark, rng)
    {
        debug!("No safe move, opening random cell ({})", pos);
        state.predict.remove(&pos);
        state.open.insert(pos);
        return Plan {
            state,
            kind: MoveKind::Random,
        };
    }

    Plan {
        state,
        kind: MoveKind::Nothing,
    }
}

#[cfg(test)]
mod tests {
    use minesweeper_common::models::Pos;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::test_support::board;

    fn settings(predict_bound: f64, random_when_stuck: bool) -> SolverSettings {
        SolverSettings {
            predict_bound,
            random_when_stuck,
            ..SolverSettings::default()
        }
    }

    #[test]
    fn fresh_board_bootstraps_with_a_random_cell() {
        let mut rng = StdRng::seed_from_u64(11);
        let plan = plan_step(&Board::with_size(9, 9), None, &SolverSettings::default(), &mut rng);
        assert_eq!(plan.kind, MoveKind::Bootstrap);
        assert_eq!(plan.state.open.len(), 1);
        assert!(plan.state.mark.is_empty());
    }

    #[test]
    fn deduction_beats_guessing() {
        let mut rng = StdRng::seed_from_u64(0);
        let plan = plan_step(&board(&["1F", ".."]), None, &settings(1.0, true), &mut rng);
        assert_eq!(plan.kind, MoveKind::Deduced);
        assert_eq!(plan.state.open.len(), 2);
    }

    #[test]
    fn guesses_the_least_risky_cell_within_bound() {
        let mut rng = StdRng::seed_from_u64(0);
        let board = board(&["1.2", "..."]);

        let plan = plan_step(&board, None, &settings(0.5, false), &mut rng);
        assert_eq!(plan.kind, MoveKind::Guess);
        assert_eq!(plan.state.open.iter().copied().collect::<Vec<_>>(), vec![Pos::new(0, 1)]);
        assert!(!plan.state.predict.contains_key(&Pos::new(0, 1)));

        let plan = plan_step(&board, None, &settings(0.2, false), &mut rng);
        assert_eq!(plan.kind, MoveKind::Nothing);
        assert!(plan.state.open.is_empty());

        let plan = plan_step(&board, None, &settings(0.2, true), &mut rng);
        assert_eq!(plan.kind, MoveKind::Random);
        assert_eq!(plan.state.open.len(), 1);
    }

    #[test]
    fn random_move_never_opens_a_proven_mine() {
        // (1 0) is a mine, (2 0) is unconstrained
        let board = board(&["1.."]);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = plan_step(&board, None, &SolverSettings::default(), &mut rng);
            assert_eq!(plan.kind, MoveKind::Random);
            assert!(plan.state.open.is_disjoint(&plan.state.mark));
            assert_eq!(plan.state.open.iter().copied().collect::<Vec<_>>(), vec![Pos::new(2, 0)]);
        }
    }

    #[test]
    fn previous_predictions_are_rechecked_first() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut previous = Predictions::new();
        previous.insert(Pos::new(1, 2), 0.3);

        let plan = plan_step(
            &board(&["1.", "1.", "0.", "0."]),
            Some(&previous),
            &settings(0.5, false),
            &mut rng,
        );
        assert_eq!(plan.kind, MoveKind::Deduced);
        assert!(plan.state.open.contains(&Pos::new(1, 2)));
    }
}
