use std::cell::Cell as CacheSlot;
use std::fmt;

use rustc_hash::FxHashSet;

use crate::formula::{CellLookup, Formula, FormulaError, FormulaParseError};
use crate::position::Position;

/// Leading character that marks cell input as a formula.
pub const FORMULA_SIGN: char = '=';

/// Leading character that forces cell input to be read as text.
/// It is kept in the source text and stripped from the value.
pub const ESCAPE_SIGN: char = '\'';

/// What a cell holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellContent {
    #[default]
    Empty,
    Text(String),
    Formula(Formula),
}

impl CellContent {
    /// Classify raw input. Only formula input can fail.
    pub fn from_input(input: &str) -> Result<Self, FormulaParseError> {
        if input.is_empty() {
            return Ok(CellContent::Empty);
        }

        if let Some(expression) = input.strip_prefix(FORMULA_SIGN) {
            // A lone "=" is plain text
            if !expression.is_empty() {
                return Formula::parse(expression).map(CellContent::Formula);
            }
        }

        Ok(CellContent::Text(input.to_string()))
    }

    /// Source form. Formulas are re-rendered canonically with the leading sign.
    pub fn text(&self) -> String {
        match self {
            CellContent::Empty => String::new(),
            CellContent::Text(s) => s.clone(),
            CellContent::Formula(f) => format!("{}{}", FORMULA_SIGN, f.expression()),
        }
    }

    pub fn evaluate<L: CellLookup + ?Sized>(&self, lookup: &L) -> CellValue {
        match self {
            CellContent::Empty => CellValue::Text(String::new()),
            CellContent::Text(s) => {
                let value = s.strip_prefix(ESCAPE_SIGN).unwrap_or(s);
                CellValue::Text(value.to_string())
            }
            CellContent::Formula(f) => match f.evaluate(lookup) {
                Ok(n) => CellValue::Number(n),
                Err(e) => CellValue::Error(e),
            },
        }
    }

    pub fn referenced_cells(&self) -> &[Position] {
        match self {
            CellContent::Formula(f) => f.referenced_cells(),
            CellContent::Empty | CellContent::Text(_) => &[],
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellContent::Formula(_))
    }
}

/// Result of evaluating a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Error(FormulaError),
}

impl CellValue {
    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

/// A cell in the grid: content, graph edges and value cache.
///
/// Edges are stored as positions (stable handles into the grid), never as
/// references to other cells. `depends_on` and `dependents` are kept as
/// exact transposes of each other across the whole grid by `dep_graph`.
#[derive(Debug, Default)]
pub struct Cell {
    content: CellContent,
    /// Cells this cell's formula reads.
    depends_on: FxHashSet<Position>,
    /// Cells whose formulas read this cell.
    dependents: FxHashSet<Position>,
    /// Last numeric result. Written during evaluation, which otherwise only
    /// needs shared access, hence the interior mutability.
    cache: CacheSlot<Option<f64>>,
    /// Written through `Sheet::set_cell` (as opposed to materialized as a
    /// formula target or retained after a clear). Only these count toward
    /// the printable size.
    printable: bool,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn referenced_cells(&self) -> &[Position] {
        self.content.referenced_cells()
    }

    pub fn depends_on(&self) -> impl Iterator<Item = Position> + '_ {
        self.depends_on.iter().copied()
    }

    pub fn dependents(&self) -> impl Iterator<Item = Position> + '_ {
        self.dependents.iter().copied()
    }

    /// True if some formula in the sheet reads this cell.
    pub fn is_referenced(&self) -> bool {
        !self.dependents.is_empty()
    }

    pub fn is_printable(&self) -> bool {
        self.printable
    }

    pub fn cached_value(&self) -> Option<f64> {
        self.cache.get()
    }

    /// Evaluate the cell.
    ///
    /// Side effect: a numeric result is stored in the cache. With `memoize`
    /// a populated cache is returned without re-evaluating.
    pub fn value<L: CellLookup + ?Sized>(&self, lookup: &L, memoize: bool) -> CellValue {
        if memoize {
            if let Some(n) = self.cache.get() {
                return CellValue::Number(n);
            }
        }
        let value = self.content.evaluate(lookup);
        if let CellValue::Number(n) = value {
            self.cache.set(Some(n));
        }
        value
    }

    // =========================================================================
    // Crate-internal mutation, driven by dep_graph and grid
    // =========================================================================

    /// Clears the cache. Returns whether a value was present.
    pub(crate) fn take_cache(&self) -> bool {
        self.cache.take().is_some()
    }

    pub(crate) fn set_content(&mut self, content: CellContent) {
        self.content = content;
    }

    pub(crate) fn set_printable(&mut self, printable: bool) {
        self.printable = printable;
    }

    pub(crate) fn depends_on_set(&self) -> &FxHashSet<Position> {
        &self.depends_on
    }

    pub(crate) fn replace_depends_on(&mut self, edges: FxHashSet<Position>) -> FxHashSet<Position> {
        std::mem::replace(&mut self.depends_on, edges)
    }

    pub(crate) fn add_dependent(&mut self, pos: Position) {
        self.dependents.insert(pos);
    }

    pub(crate) fn remove_dependent(&mut self, pos: Position) {
        self.dependents.remove(&pos);
    }

    pub(crate) fn has_dependent(&self, pos: Position) -> bool {
        self.dependents.contains(&pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoCells;

    impl CellLookup for NoCells {
        fn value_at(&self, _pos: Position) -> Result<f64, FormulaError> {
            Ok(0.0)
        }
    }

    #[test]
    fn test_from_input_classifies() {
        assert_eq!(CellContent::from_input("").unwrap(), CellContent::Empty);
        assert_eq!(CellContent::from_input("hello").unwrap(), CellContent::Text("hello".to_string()));
        assert_eq!(CellContent::from_input("=").unwrap(), CellContent::Text("=".to_string()));
        assert!(CellContent::from_input("=1+2").unwrap().is_formula());
        assert!(CellContent::from_input("=1+").is_err());
    }

    #[test]
    fn test_numeric_looking_text_stays_text() {
        assert_eq!(CellContent::from_input("42").unwrap(), CellContent::Text("42".to_string()));
    }

    #[test]
    fn test_empty_value_is_empty_text() {
        assert_eq!(CellContent::Empty.evaluate(&NoCells), CellValue::Text(String::new()));
        assert_eq!(CellContent::Empty.text(), "");
    }

    #[test]
    fn test_escaped_text() {
        let content = CellContent::from_input("'=1+2").unwrap();
        assert_eq!(content.text(), "'=1+2");
        assert_eq!(content.evaluate(&NoCells), CellValue::Text("=1+2".to_string()));
    }

    #[test]
    fn test_formula_text_is_canonical() {
        let content = CellContent::from_input("=(1 + 2)").unwrap();
        assert_eq!(content.text(), "=1+2");
        assert_eq!(content.evaluate(&NoCells), CellValue::Number(3.0));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(CellValue::Number(3.0).to_string(), "3");
        assert_eq!(CellValue::Number(0.25).to_string(), "0.25");
        assert_eq!(CellValue::Text("x".to_string()).to_string(), "x");
        assert_eq!(CellValue::Error(FormulaError::Div0).to_string(), "#DIV/0!");
    }

    #[test]
    fn test_value_populates_cache_for_numbers_only() {
        let mut cell = Cell::new();
        cell.set_content(CellContent::from_input("=2*3").unwrap());
        assert_eq!(cell.cached_value(), None);
        assert_eq!(cell.value(&NoCells, false), CellValue::Number(6.0));
        assert_eq!(cell.cached_value(), Some(6.0));

        let mut text = Cell::new();
        text.set_content(CellContent::from_input("abc").unwrap());
        text.value(&NoCells, true);
        assert_eq!(text.cached_value(), None);

        let mut err = Cell::new();
        err.set_content(CellContent::from_input("=1/0").unwrap());
        assert!(err.value(&NoCells, true).is_error());
        assert_eq!(err.cached_value(), None);
    }

    #[test]
    fn test_take_cache() {
        let mut cell = Cell::new();
        cell.set_content(CellContent::from_input("=1").unwrap());
        cell.value(&NoCells, true);
        assert!(cell.take_cache());
        assert!(!cell.take_cache());
    }
}
