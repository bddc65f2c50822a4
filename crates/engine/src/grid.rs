//! Sparse cell storage with a tracked printable extent.
//!
//! Absent positions are logically empty and never allocated. `bounds` is the
//! smallest `[0, rows) x [0, cols)` rectangle containing every printable
//! cell: it grows incrementally when a cell becomes printable and is
//! recomputed by a full scan when a cell on its last row or column stops
//! being printable.

use rustc_hash::FxHashMap;

use crate::cell::Cell;
use crate::position::{Position, Size};

#[derive(Debug, Default)]
pub struct Grid {
    cells: FxHashMap<Position, Cell>,
    bounds: Size,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pos: Position) -> Option<&Cell> {
        self.cells.get(&pos)
    }

    pub fn get_mut(&mut self, pos: Position) -> Option<&mut Cell> {
        self.cells.get_mut(&pos)
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.cells.contains_key(&pos)
    }

    /// Get the cell at `pos`, allocating an empty one if absent.
    /// Does not touch `bounds`.
    pub fn materialize(&mut self, pos: Position) -> &mut Cell {
        debug_assert!(pos.is_valid(), "materialize at invalid position");
        self.cells.entry(pos).or_default()
    }

    pub fn remove(&mut self, pos: Position) -> Option<Cell> {
        self.cells.remove(&pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, &Cell)> + '_ {
        self.cells.iter().map(|(pos, cell)| (*pos, cell))
    }

    /// Number of allocated cells, printable or not.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn bounds(&self) -> Size {
        self.bounds
    }

    /// Mark the cell at `pos` as written and grow `bounds` to include it.
    pub fn mark_printable(&mut self, pos: Position) {
        self.materialize(pos).set_printable(true);
        self.bounds.rows = self.bounds.rows.max(pos.row + 1);
        self.bounds.cols = self.bounds.cols.max(pos.col + 1);
    }

    /// Mark the cell at `pos` as no longer written. Rescans `bounds` if the
    /// cell sat on its last row or column.
    pub fn unmark_printable(&mut self, pos: Position) {
        let Some(cell) = self.cells.get_mut(&pos) else {
            return;
        };
        if !cell.is_printable() {
            return;
        }
        cell.set_printable(false);

        if pos.row + 1 == self.bounds.rows || pos.col + 1 == self.bounds.cols {
            self.rescan_bounds();
        }
    }

    fn rescan_bounds(&mut self) {
        let mut bounds = Size::default();
        for (pos, cell) in &self.cells {
            if cell.is_printable() {
                bounds.rows = bounds.rows.max(pos.row + 1);
                bounds.cols = bounds.cols.max(pos.col + 1);
            }
        }
        log::trace!("bounds rescanned: {} -> {}", self.bounds, bounds);
        self.bounds = bounds;
    }
}
