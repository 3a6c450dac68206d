use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::protocol::{RawCell, RawMap};

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// The up to 8 surrounding positions that do not underflow. Upper bounds
    /// are left to the board.
    pub fn around(self) -> impl Iterator<Item = Pos> {
        (-1isize..=1)
            .flat_map(|dy| (-1isize..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .filter_map(move |(dx, dy)| {
                Some(Pos {
                    x: self.x.checked_add_signed(dx)?,
                    y: self.y.checked_add_signed(dy)?,
                })
            })
    }
}

/// Cell id as the server expects it: `<x> <y>`.
impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.x, self.y)
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(tag = "state")]
pub enum CellMode {
    #[serde(rename = "blank")]
    Blank,
    #[serde(rename = "marked")]
    Marked,
    #[serde(rename = "opened")]
    Opened { bombs: u8 },
    /// An open request for this cell is in flight.
    #[serde(rename = "opening")]
    Opening,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    pub pos: Pos,
    pub mode: CellMode,
}

impl Cell {
    pub fn new(pos: Pos, mode: CellMode) -> Self {
        Self { pos, mode }
    }

    pub fn blank(pos: Pos) -> Self {
        Self::new(pos, CellMode::Blank)
    }

    pub fn bombs(&self) -> Option<u8> {
        match self.mode {
            CellMode::Opened { bombs } => Some(bombs),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.mode == CellMode::Blank
    }

    pub fn is_opened(&self) -> bool {
        matches!(self.mode, CellMode::Opened { .. })
    }
}

/// Neighbours of a cell partitioned by mode. Cells in `Opening` belong to
/// none of the groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborGroup {
    pub blank: Vec<Cell>,
    pub marked: Vec<Cell>,
    pub opened: Vec<Cell>,
}

impl NeighborGroup {
    fn push(&mut self, cell: Cell) {
        match cell.mode {
            CellMode::Blank => self.blank.push(cell),
            CellMode::Marked => self.marked.push(cell),
            CellMode::Opened { .. } => self.opened.push(cell),
            CellMode::Opening => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardStats {
    pub blank: usize,
    pub marked: usize,
    pub opened: usize,
    pub opening: usize,
}

/// Revealed/blank/flagged grid, rows outer.
///
/// Rows are shared behind `Arc`, so cloning a board is cheap and a clone is a
/// snapshot: a row that is modified while a snapshot holds it gets copied
/// first, every untouched row stays pointer-equal between the two.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Board {
    rows: Vec<Arc<Vec<Cell>>>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(width: usize, height: usize) -> Self {
        let rows = (0..height)
            .map(|y| Arc::new((0..width).map(|x| Cell::blank(Pos::new(x, y))).collect::<Vec<_>>()))
            .collect();
        Self { rows }
    }

    pub fn from_snapshot(snapshot: &RawMap) -> Self {
        let mut board = Self::new();
        board.merge(snapshot);
        board
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, |row| row.len())
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Arc<Vec<Cell>>] {
        &self.rows
    }

    pub fn row(&self, y: usize) -> Option<&Arc<Vec<Cell>>> {
        self.rows.get(y)
    }

    pub fn get(&self, pos: Pos) -> Option<&Cell> {
        self.rows.get(pos.y)?.get(pos.x)
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.rows.iter().flat_map(|row| row.iter())
    }

    pub fn has_opened(&self) -> bool {
        self.cells().any(Cell::is_opened)
    }

    pub fn stats(&self) -> BoardStats {
        self.cells().fold(BoardStats::default(), |mut stats, cell| {
            match cell.mode {
                CellMode::Blank => stats.blank += 1,
                CellMode::Marked => stats.marked += 1,
                CellMode::Opened { .. } => stats.opened += 1,
                CellMode::Opening => stats.opening += 1,
            }
            stats
        })
    }

    /// Cells around `pos` grouped by mode, bounds-checked. An unknown `pos`
    /// yields an empty group.
    pub fn neighbors(&self, pos: Pos, include_origin: bool) -> NeighborGroup {
        let mut group = NeighborGroup::default();
        let Some(origin) = self.get(pos) else {
            return group;
        };

        if include_origin {
            group.push(*origin);
        }
        for around in pos.around() {
            if let Some(cell) = self.get(around) {
                group.push(*cell);
            }
        }
        group
    }

    /// Merges a server snapshot and reports whether anything changed.
    ///
    /// The board takes the snapshot's shape. A digit always opens the cell. A
    /// hidden cell keeps a local mark, drops an `Opening` marker, and never
    /// downgrades a cell that is already opened.
    pub fn merge(&mut self, snapshot: &RawMap) -> bool {
        let mut changed = false;

        if self.rows.len() > snapshot.height() {
            self.rows.truncate(snapshot.height());
            changed = true;
        }

        for (y, raw_row) in snapshot.rows().iter().enumerate() {
            match self.rows.get_mut(y) {
                Some(row) => changed |= merge_row(row, y, raw_row),
                None => {
                    let row: Vec<Cell> = raw_row
                        .iter()
                        .enumerate()
                        .map(|(x, raw)| Cell::new(Pos::new(x, y), merged_mode(CellMode::Blank, *raw)))
                        .collect();
                    self.rows.push(Arc::new(row));
                    changed = true;
                }
            }
        }

        changed
    }

    /// Applies `f` to each listed cell; `None` leaves the cell alone.
    /// Out-of-range positions are ignored.
    pub fn update<F>(&mut self, positions: &[Pos], mut f: F) -> bool
    where
        F: FnMut(CellMode) -> Option<CellMode>,
    {
        let mut changed = false;

        for &pos in positions {
            let Some(row) = self.rows.get_mut(pos.y) else {
                continue;
            };
            let Some(cell) = row.get(pos.x) else {
                continue;
            };
            let Some(mode) = f(cell.mode).filter(|mode| *mode != cell.mode) else {
                continue;
            };

            Arc::make_mut(row)[pos.x].mode = mode;
            changed = true;
        }

        changed
    }

    /// Flips Blank and Marked; every other mode is left as is.
    pub fn toggle_marks(&mut self, positions: &[Pos]) -> bool {
        self.update(positions, |mode| match mode {
            CellMode::Blank => Some(CellMode::Marked),
            CellMode::Marked => Some(CellMode::Blank),
            _ => None,
        })
    }

    /// Returns every cell to Blank while keeping the shape.
    pub fn reset(&mut self) -> bool {
        let mut changed = false;
        for row in &mut self.rows {
            if row.iter().any(|cell| !cell.is_blank()) {
                for cell in Arc::make_mut(row).iter_mut() {
                    cell.mode = CellMode::Blank;
                }
                changed = true;
            }
        }
        changed
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.rows.is_empty();
        self.rows.clear();
        changed
    }
}

fn merge_row(row: &mut Arc<Vec<Cell>>, y: usize, raw_row: &[RawCell]) -> bool {
    if row.len() != raw_row.len() {
        let next: Vec<Cell> = raw_row
            .iter()
            .enumerate()
            .map(|(x, raw)| {
                let current = row.get(x).map_or(CellMode::Blank, |cell| cell.mode);
                Cell::new(Pos::new(x, y), merged_mode(current, *raw))
            })
            .collect();
        *row = Arc::new(next);
        return true;
    }

    let dirty = row
        .iter()
        .zip(raw_row)
        .any(|(cell, raw)| merged_mode(cell.mode, *raw) != cell.mode);
    if !dirty {
        return false;
    }

    for (cell, raw) in Arc::make_mut(row).iter_mut().zip(raw_row) {
        cell.mode = merged_mode(cell.mode, *raw);
    }
    true
}

fn merged_mode(current: CellMode, raw: RawCell) -> CellMode {
    match (current, raw) {
        (_, Some(bombs)) => CellMode::Opened { bombs },
        (CellMode::Opened { .. }, None) => current,
        (CellMode::Marked, None) => CellMode::Marked,
        (_, None) => CellMode::Blank,
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            for cell in row.iter() {
                let symbol = match cell.mode {
                    CellMode::Blank => '·',
                    CellMode::Marked => 'F',
                    CellMode::Opening => '*',
                    CellMode::Opened { bombs: 0 } => ' ',
                    CellMode::Opened { bombs } => char::from(b'0' + bombs.min(9)),
                };
                write!(f, "{symbol}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
