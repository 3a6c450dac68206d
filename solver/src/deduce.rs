use std::collections::{BTreeMap, BTreeSet, HashSet};

use minesweeper_common::models::{Board, Cell, Pos};
use tracing::trace;

/// Mine probability per ambiguous cell. When several numbered cells
/// constrain the same blank cell the highest estimate wins.
pub type Predictions = BTreeMap<Pos, f64>;

/// Result of one solving pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveState {
    /// Cells proven to be mines.
    pub mark: BTreeSet<Pos>,
    /// Cells proven to be safe.
    pub open: BTreeSet<Pos>,
    pub predict: Predictions,
}

impl SolveState {
    pub fn is_classified(&self, pos: &Pos) -> bool {
        self.mark.contains(pos) || self.open.contains(pos)
    }

    /// Number of cells classified so far.
    pub fn deduced(&self) -> usize {
        self.mark.len() + self.open.len()
    }

    fn classify_open(&mut self, cells: Vec<Pos>) {
        for pos in cells {
            self.predict.remove(&pos);
            self.open.insert(pos);
        }
    }

    fn classify_mark(&mut self, cells: Vec<Pos>) {
        for pos in cells {
            self.predict.remove(&pos);
            self.mark.insert(pos);
        }
    }

    fn record_risk(&mut self, cells: Vec<Pos>, risk: f64) {
        for pos in cells {
            self.predict
                .entry(pos)
                .and_modify(|current| *current = current.max(risk))
                .or_insert(risk);
        }
    }

    /// Re-derives every risk from the final classification, dropping values
    /// recorded against an earlier state.
    fn rebuild_predictions(&mut self, board: &Board) {
        self.predict.clear();
        for cell in board.cells() {
            if let Some(Deduction::Risk(cells, risk)) = evaluate(board, cell, self) {
                self.record_risk(cells, risk);
            }
        }
    }
}

enum Deduction {
    Safe(Vec<Pos>),
    Mines(Vec<Pos>),
    Risk(Vec<Pos>, f64),
}

/// What a single opened cell says about its still-unclassified blank
/// neighbours, given what `state` already knows.
fn evaluate(board: &Board, cell: &Cell, state: &SolveState) -> Option<Deduction> {
    let bombs = cell.bombs()?;
    let group = board.neighbors(cell.pos, false);

    let unknown: Vec<Pos> = group
        .blank
        .iter()
        .map(|c| c.pos)
        .filter(|pos| !state.is_classified(pos))
        .collect();
    if unknown.is_empty() {
        return None;
    }

    let marked = group.marked.len()
        + group
            .blank
            .iter()
            .filter(|c| state.mark.contains(&c.pos))
            .count();
    let remaining = isize::from(bombs) - marked as isize;
    let count = unknown.len() as isize;

    match remaining {
        0 => Some(Deduction::Safe(unknown)),
        r if r == count => Some(Deduction::Mines(unknown)),
        r if r > 0 && r < count => Some(Deduction::Risk(unknown, r as f64 / count as f64)),
        _ => {
            trace!(
                "Skipping unsatisfiable constraint at ({}): {} bombs, {} marked, {} unknown",
                cell.pos, bombs, marked, count
            );
            None
        }
    }
}

/// Runs the constraints of every opened cell in the 3x3 window around
/// `center`. Whenever a constraint classifies cells the window is scanned
/// again from the start, since neighbouring constraints changed with it.
///
/// Returns whether anything new was classified.
pub fn look_around(board: &Board, center: Pos, state: &mut SolveState) -> bool {
    let group = board.neighbors(center, true);
    let mut settled = HashSet::new();
    let mut progressed = false;
    let mut i = 0;

    while let Some(cell) = group.opened.get(i) {
        i += 1;
        if settled.contains(&cell.pos) {
            continue;
        }

        match evaluate(board, cell, state) {
            Some(Deduction::Safe(cells)) => state.classify_open(cells),
            Some(Deduction::Mines(cells)) => state.classify_mark(cells),
            Some(Deduction::Risk(cells, risk)) => {
                state.record_risk(cells, risk);
                continue;
            }
            None => continue,
        }

        settled.insert(cell.pos);
        progressed = true;
        i = 0;
    }

    progressed
}

/// Window centres along one axis: every second index starting at 1, so the
/// 3x3 windows cover the whole axis.
fn centers(len: usize) -> Vec<usize> {
    match len {
        0 => Vec::new(),
        1 => vec![0],
        _ => (1..len).step_by(2).collect(),
    }
}

fn sweep(board: &Board, state: &mut SolveState) {
    let rows = centers(board.height());
    let cols = centers(board.width());
    let mut r = 0;

    while let Some(&y) = rows.get(r) {
        let progressed = cols
            .iter()
            .any(|&x| look_around(board, Pos::new(x, y), state));

        // Step back a row so the constraints that just changed are revisited
        // before moving on.
        if progressed {
            r = r.saturating_sub(1);
        } else {
            r += 1;
        }
    }
}

/// Whole-board deduction, repeated until a sweep classifies nothing new.
/// `seed` carries classifications from an earlier, local pass.
pub fn look_at_field(board: &Board, seed: Option<SolveState>) -> SolveState {
    let mut state = seed.unwrap_or_default();

    loop {
        let before = state.deduced();
        sweep(board, &mut state);
        if state.deduced() == before {
            state.rebuild_predictions(board);
            return state;
        }
    }
}

/// Re-examines only the cells left ambiguous by an earlier pass.
pub fn recheck_predictions(board: &Board, previous: &Predictions) -> SolveState {
    let mut state = SolveState::default();

    for &pos in previous.keys() {
        if state.is_classified(&pos) || !board.get(pos).is_some_and(Cell::is_blank) {
            continue;
        }
        look_around(board, pos, &mut state);
    }

    state
}
