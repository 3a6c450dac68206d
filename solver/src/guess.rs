use std::collections::BTreeSet;

use minesweeper_common::models::{Board, Cell, Pos};
use rand::Rng;

use crate::Predictions;

/// Random probes before [`random_blank`] falls back to a scan.
pub const RANDOM_ATTEMPTS: usize = 50;

/// The least risky ambiguous cell, if its risk does not exceed `bound`.
/// Ties go to the first cell in position order.
pub fn best_guess(predict: &Predictions, bound: f64) -> Option<Pos> {
    predict
        .iter()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .filter(|(_, risk)| **risk <= bound)
        .map(|(pos, _)| *pos)
}

/// A uniformly random blank cell outside `skip`. After [`RANDOM_ATTEMPTS`]
/// misses the board is scanned row by row, so this terminates even when few
/// blank cells are left. `None` only when no such cell exists.
pub fn random_blank<R: Rng + ?Sized>(
    board: &Board,
    skip: &BTreeSet<Pos>,
    rng: &mut R,
) -> Option<Pos> {
    let candidate = |cell: &Cell| cell.is_blank() && !skip.contains(&cell.pos);

    let (width, height) = (board.width(), board.height());
    if width == 0 || height == 0 {
        return None;
    }

    for _ in 0..RANDOM_ATTEMPTS {
        let pos = Pos::new(rng.random_range(0..width), rng.random_range(0..height));
        if board.get(pos).is_some_and(candidate) {
            return Some(pos);
        }
    }

    board.cells().find(|cell| candidate(cell)).map(|cell| cell.pos)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::test_support::board;

    #[test]
    fn guess_respects_bound() {
        let mut predict = Predictions::new();
        predict.insert(Pos::new(0, 0), 0.6);
        predict.insert(Pos::new(1, 0), 0.4);
        predict.insert(Pos::new(2, 0), 0.4);

        assert_eq!(best_guess(&predict, 0.5), Some(Pos::new(1, 0)));
        assert_eq!(best_guess(&predict, 0.3), None);
        assert_eq!(best_guess(&Predictions::new(), 1.0), None);
    }

    #[test]
    fn random_blank_finds_the_last_blank_cell() {
        let board = board(&["1111", "11.1", "1111"]);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10 {
            assert_eq!(random_blank(&board, &BTreeSet::new(), &mut rng), Some(Pos::new(2, 1)));
        }
    }

    #[test]
    fn random_blank_skips_marked_and_opened() {
        let mut rng = StdRng::seed_from_u64(3);
        let none = BTreeSet::new();
        assert_eq!(random_blank(&board(&["1F", "F2"]), &none, &mut rng), None);
        assert_eq!(random_blank(&Board::new(), &none, &mut rng), None);
    }

    #[test]
    fn random_blank_skips_excluded_cells() {
        let board = board(&["1..", "..."]);
        let skip: BTreeSet<Pos> = [(1, 0), (2, 0), (0, 1), (1, 1)]
            .into_iter()
            .map(|(x, y)| Pos::new(x, y))
            .collect();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..10 {
            assert_eq!(random_blank(&board, &skip, &mut rng), Some(Pos::new(2, 1)));
        }
        let everything: BTreeSet<Pos> = board.cells().map(|cell| cell.pos).collect();
        assert_eq!(random_blank(&board, &everything, &mut rng), None);
    }
}
