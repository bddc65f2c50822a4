use std::io;

use rustc_hash::FxHashMap;

use crate::cell::{Cell, CellContent, CellValue};
use crate::config::SheetConfig;
use crate::dep_graph;
use crate::error::SheetError;
use crate::formula::eval::parse_numeric_text;
use crate::formula::{CellLookup, FormulaError};
use crate::grid::Grid;
use crate::position::{Position, Size};

/// Field separator used by `print_values` and `print_texts`.
pub const FIELD_DELIMITER: char = '\t';

/// A single spreadsheet: the grid of cells plus the operations that keep
/// their dependency graph and caches consistent.
///
/// Every mutating call either commits completely or returns an error having
/// changed nothing in the graph or the caches.
#[derive(Debug, Default)]
pub struct Sheet {
    grid: Grid,
    config: SheetConfig,
}

/// A cell value as a formula operand.
fn as_operand(value: CellValue) -> Result<f64, FormulaError> {
    match value {
        CellValue::Number(n) => Ok(n),
        CellValue::Text(s) => parse_numeric_text(&s).ok_or(FormulaError::Value),
        CellValue::Error(e) => Err(e),
    }
}

impl CellLookup for Sheet {
    fn value_at(&self, pos: Position) -> Result<f64, FormulaError> {
        if !self.config.contains(pos) {
            return Err(FormulaError::Ref);
        }
        let Some(cell) = self.grid.get(pos) else {
            return Ok(0.0);
        };
        as_operand(self.evaluate(cell))
    }
}

/// Operands computed during one read, served ahead of the sheet.
struct Resolved<'a> {
    sheet: &'a Sheet,
    values: FxHashMap<Position, Result<f64, FormulaError>>,
}

impl CellLookup for Resolved<'_> {
    fn value_at(&self, pos: Position) -> Result<f64, FormulaError> {
        match self.values.get(&pos) {
            Some(value) => *value,
            None => self.sheet.value_at(pos),
        }
    }
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SheetConfig) -> Self {
        Self {
            grid: Grid::new(),
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    fn check_position(&self, pos: Position) -> Result<(), SheetError> {
        if self.config.contains(pos) {
            Ok(())
        } else {
            Err(SheetError::InvalidPosition(pos))
        }
    }

    /// Set the source text of a cell.
    ///
    /// Empty text makes the cell empty, text starting with `=` (and longer
    /// than it) is parsed as a formula, anything else is text. Setting the
    /// text the cell already renders is a no-op apart from counting the cell
    /// toward the printable size.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), SheetError> {
        self.check_position(pos)?;

        let unchanged = self.grid.get(pos).is_some_and(|cell| cell.text() == text);
        if !unchanged {
            self.replace_content(pos, text)?;
        }
        self.grid.mark_printable(pos);
        Ok(())
    }

    pub fn get_cell(&self, pos: Position) -> Result<Option<CellView<'_>>, SheetError> {
        self.check_position(pos)?;
        Ok(self.grid.get(pos).map(|cell| CellView { sheet: self, pos, cell }))
    }

    /// Value of the cell at `pos`, `None` if no cell is allocated there.
    pub fn value(&self, pos: Position) -> Result<Option<CellValue>, SheetError> {
        Ok(self.get_cell(pos)?.map(|view| view.value()))
    }

    /// Remove the content of a cell.
    ///
    /// The cell's outgoing edges go with it and downstream caches are
    /// invalidated. A cell other formulas still read stays allocated as an
    /// empty placeholder; otherwise it is dropped from the grid.
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), SheetError> {
        self.check_position(pos)?;
        if !self.grid.contains(pos) {
            return Ok(());
        }

        self.commit(pos, CellContent::Empty, &[]);
        self.grid.unmark_printable(pos);

        let retained = self.grid.get(pos).is_some_and(Cell::is_referenced);
        if !retained {
            self.grid.remove(pos);
        }
        log::debug!("cleared {} (retained: {})", pos, retained);
        Ok(())
    }

    pub fn printable_size(&self) -> Size {
        self.grid.bounds()
    }

    /// Number of allocated cells, including empty placeholders.
    pub fn cell_count(&self) -> usize {
        self.grid.len()
    }

    /// Positions of all allocated cells, in no particular order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.grid.iter().map(|(pos, _)| pos)
    }

    /// Write every value in the printable area, one row per line.
    pub fn print_values<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        self.print_with(out, |view| view.value().to_string())
    }

    /// Write every source text in the printable area, one row per line.
    pub fn print_texts<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        self.print_with(out, |view| view.text())
    }

    fn print_with<W, F>(&self, out: &mut W, field: F) -> io::Result<()>
    where
        W: io::Write,
        F: Fn(&CellView<'_>) -> String,
    {
        let size = self.printable_size();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    write!(out, "{}", FIELD_DELIMITER)?;
                }
                let pos = Position::new(row, col);
                if let Some(cell) = self.grid.get(pos) {
                    write!(out, "{}", field(&CellView { sheet: self, pos, cell }))?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Evaluate `cell` without recursing along its inputs.
    ///
    /// Formula inputs that cannot be served from the cache are evaluated
    /// first, in post-order off an explicit stack, and handed to each
    /// dependent through a scratch map. Numeric results land in the caches
    /// as usual.
    fn evaluate(&self, cell: &Cell) -> CellValue {
        let memoize = self.config.memoize;
        if !self.needs_inputs(cell) {
            return cell.value(self, memoize);
        }

        let mut resolved = Resolved { sheet: self, values: FxHashMap::default() };
        // (position, inputs already pushed)
        let mut stack: Vec<(Position, bool)> = cell.depends_on().map(|pos| (pos, false)).collect();
        while let Some((current, inputs_ready)) = stack.pop() {
            if resolved.values.contains_key(&current) {
                continue;
            }
            let Some(node) = self.grid.get(current) else {
                continue;
            };
            if inputs_ready {
                let value = as_operand(node.value(&resolved, memoize));
                resolved.values.insert(current, value);
            } else if self.needs_inputs(node) {
                stack.push((current, true));
                stack.extend(
                    node.depends_on()
                        .filter(|input| !resolved.values.contains_key(input))
                        .map(|input| (input, false)),
                );
            }
        }
        log::trace!("evaluated {} formula inputs", resolved.values.len());

        cell.value(&resolved, memoize)
    }

    /// True for a formula whose value will not come from the cache.
    fn needs_inputs(&self, cell: &Cell) -> bool {
        cell.content().is_formula() && !(self.config.memoize && cell.cached_value().is_some())
    }

    // =========================================================================
    // Mutation protocol
    // =========================================================================

    /// Parse `text`, wire its references and commit, or fail having
    /// committed nothing.
    fn replace_content(&mut self, pos: Position, text: &str) -> Result<(), SheetError> {
        let content = CellContent::from_input(text).map_err(|err| {
            log::warn!("rejected {} = {:?}: {}", pos, text, err);
            SheetError::from(err)
        })?;

        // References outside the sheet are never wired; they evaluate to #REF!
        let refs: Vec<Position> = content
            .referenced_cells()
            .iter()
            .copied()
            .filter(|r| self.config.contains(*r))
            .collect();

        // Referenced cells are materialized before the cycle check and stay
        // allocated even if the check rejects the formula.
        for &r in &refs {
            self.materialize_empty(r);
        }

        if let Some(report) = dep_graph::would_create_cycle(&self.grid, pos, &refs) {
            log::warn!("rejected {} = {:?}: {}", pos, text, report);
            return Err(report.into());
        }

        self.commit(pos, content, &refs);
        Ok(())
    }

    /// Install content and edges, then invalidate downstream caches.
    fn commit(&mut self, pos: Position, content: CellContent, refs: &[Position]) {
        self.grid.materialize(pos).set_content(content);
        dep_graph::replace_edges(&mut self.grid, pos, refs);
        let cleared = dep_graph::invalidate(&self.grid, pos);
        log::debug!("committed {} ({} refs, {} dependent caches cleared)", pos, refs.len(), cleared);
    }

    /// Allocate an empty cell at `pos` if none exists. Does not affect the
    /// printable size.
    fn materialize_empty(&mut self, pos: Position) {
        if !self.grid.contains(pos) {
            log::trace!("materialized empty cell at {}", pos);
            self.grid.materialize(pos);
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        dep_graph::assert_consistent(&self.grid);
    }

    #[cfg(test)]
    pub(crate) fn cached_value(&self, pos: Position) -> Option<f64> {
        self.grid.get(pos).and_then(Cell::cached_value)
    }
}

/// Read-only view of one allocated cell.
#[derive(Clone, Copy)]
pub struct CellView<'a> {
    sheet: &'a Sheet,
    pos: Position,
    cell: &'a Cell,
}

impl<'a> CellView<'a> {
    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn content(&self) -> &'a CellContent {
        self.cell.content()
    }

    pub fn text(&self) -> String {
        self.cell.text()
    }

    /// Evaluate the cell. May fill value caches along the way.
    pub fn value(&self) -> CellValue {
        self.sheet.evaluate(self.cell)
    }

    /// Positions the formula reads, in order of first occurrence.
    pub fn referenced_cells(&self) -> &'a [Position] {
        self.cell.referenced_cells()
    }

    /// Cells this cell has dependency edges to.
    pub fn depends_on(&self) -> impl Iterator<Item = Position> + 'a {
        self.cell.depends_on()
    }

    /// Cells whose formulas read this cell.
    pub fn dependents(&self) -> impl Iterator<Item = Position> + 'a {
        self.cell.dependents()
    }

    pub fn is_referenced(&self) -> bool {
        self.cell.is_referenced()
    }
}

impl std::fmt::Debug for CellView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellView")
            .field("pos", &self.pos)
            .field("content", self.cell.content())
            .finish()
    }
}
