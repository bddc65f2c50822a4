// Formula parsing and evaluation

pub mod eval;
pub mod parser;
pub mod refs;

pub use eval::{CellLookup, FormulaError};
pub use parser::{Expr, FormulaParseError};

use crate::position::Position;

/// A parsed, immutable formula.
///
/// Referenced positions are computed once at parse time.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expr: Expr,
    refs: Vec<Position>,
}

impl Formula {
    /// Parse expression text (without the leading `=`).
    pub fn parse(expression: &str) -> Result<Self, FormulaParseError> {
        let expr = parser::parse(expression)?;
        let refs = refs::extract_positions(&expr);
        Ok(Self { expr, refs })
    }

    /// Canonical expression text (without the leading `=`).
    pub fn expression(&self) -> String {
        parser::render(&self.expr)
    }

    pub fn evaluate<L: CellLookup + ?Sized>(&self, lookup: &L) -> Result<f64, FormulaError> {
        eval::evaluate(&self.expr, lookup)
    }

    /// Valid positions this formula reads, deduplicated, in order of first
    /// occurrence.
    pub fn referenced_cells(&self) -> &[Position] {
        &self.refs
    }
}
