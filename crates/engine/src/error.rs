//! Structural failures of sheet operations.
//!
//! None of these leave partial graph state behind: the operation that
//! reports them has not committed anything.

use std::fmt;

use crate::formula::FormulaParseError;
use crate::position::Position;

/// Report when a mutation would introduce a circular reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Cycle path starting and ending at the cell being set.
    pub cells: Vec<Position>,

    /// Human-readable description of the cycle.
    pub message: String,
}

impl CycleReport {
    /// Create a cycle report for a self-referencing cell.
    pub fn self_reference(cell: Position) -> Self {
        Self {
            cells: vec![cell, cell],
            message: format!("Cell {} references itself", cell),
        }
    }

    /// Create a cycle report for a multi-cell cycle.
    pub fn cycle(cells: Vec<Position>) -> Self {
        let cell_list: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
        let message = if cells.len() <= 6 {
            format!("Circular reference: {}", cell_list.join(" → "))
        } else {
            format!(
                "Circular reference involving {} cells: {} → {} → ... → {}",
                cells.len() - 1,
                cell_list[0],
                cell_list[1],
                cell_list[cell_list.len() - 1]
            )
        };
        Self { cells, message }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CycleReport {}

#[derive(Debug, Clone, PartialEq)]
pub enum SheetError {
    /// Position fails the validity predicate or lies outside the sheet limits.
    InvalidPosition(Position),
    /// The new formula would make the reference graph cyclic.
    CircularDependency(CycleReport),
    /// The formula text could not be parsed.
    FormulaParse(FormulaParseError),
}

impl SheetError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPosition(_) => "invalid_position",
            Self::CircularDependency(_) => "circular_dependency",
            Self::FormulaParse(_) => "formula_parse_error",
        }
    }
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPosition(pos) if pos.is_valid() => {
                write!(f, "position {pos} is outside the sheet")
            }
            Self::InvalidPosition(pos) => {
                write!(f, "invalid position (row {}, col {})", pos.row, pos.col)
            }
            Self::CircularDependency(report) => write!(f, "{report}"),
            Self::FormulaParse(err) => write!(f, "formula parse error: {err}"),
        }
    }
}

impl std::error::Error for SheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidPosition(_) => None,
            Self::CircularDependency(report) => Some(report),
            Self::FormulaParse(err) => Some(err),
        }
    }
}

impl From<CycleReport> for SheetError {
    fn from(report: CycleReport) -> Self {
        Self::CircularDependency(report)
    }
}

impl From<FormulaParseError> for SheetError {
    fn from(err: FormulaParseError) -> Self {
        Self::FormulaParse(err)
    }
}
