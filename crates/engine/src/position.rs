//! Cell coordinates.
//!
//! A `Position` is a zero-based (row, col) pair. It doubles as the identity
//! handle of a cell in the grid and as a node in the dependency graph: cells
//! never move, so the coordinate is stable for the lifetime of the sheet.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Zero-based cell coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

impl Position {
    pub const MAX_ROWS: usize = 16384;
    pub const MAX_COLS: usize = 16384;

    /// Invalid sentinel. Never stored in the grid.
    pub const NONE: Position = Position { row: usize::MAX, col: usize::MAX };

    #[inline]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.row < Self::MAX_ROWS && self.col < Self::MAX_COLS
    }

    /// Parse A1 notation (`A1`, `BC42`). Returns `Position::NONE` when the
    /// text is malformed or addresses a cell outside the maximum bounds.
    pub fn from_a1(s: &str) -> Position {
        let letters = s.bytes().take_while(|b| b.is_ascii_uppercase()).count();
        let (col_str, row_str) = s.split_at(letters);

        // XFD is the last column; anything longer cannot be in range.
        if col_str.is_empty() || col_str.len() > 3 {
            return Position::NONE;
        }
        if row_str.is_empty() || row_str.len() > 5 || !row_str.bytes().all(|b| b.is_ascii_digit()) {
            return Position::NONE;
        }

        let row: usize = match row_str.parse() {
            Ok(r) if r > 0 => r,
            _ => return Position::NONE,
        };

        // A=0, B=1, ..., Z=25, AA=26, AB=27, ...
        let col = col_str
            .bytes()
            .fold(0usize, |acc, c| acc * 26 + (c - b'A') as usize + 1)
            - 1;

        let pos = Position::new(row - 1, col);
        if pos.is_valid() {
            pos
        } else {
            Position::NONE
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("#REF!");
        }
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

/// Error returned when text is not a valid A1 coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionParseError {
    pub input: String,
}

impl fmt::Display for PositionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid cell position '{}'", self.input)
    }
}

impl std::error::Error for PositionParseError {}

impl FromStr for Position {
    type Err = PositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pos = Position::from_a1(s);
        if pos.is_valid() {
            Ok(pos)
        } else {
            Err(PositionParseError { input: s.to_string() })
        }
    }
}

/// Printable extent of a sheet: the rectangle `[0, rows) x [0, cols)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub rows: usize,
    pub cols: usize,
}

impl Size {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Convert 0-based column index to Excel-style letter(s).
fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_to_letters() {
        assert_eq!(col_to_letters(0), "A");
        assert_eq!(col_to_letters(25), "Z");
        assert_eq!(col_to_letters(26), "AA");
        assert_eq!(col_to_letters(701), "ZZ");
        assert_eq!(col_to_letters(702), "AAA");
        assert_eq!(col_to_letters(16383), "XFD");
    }

    #[test]
    fn test_from_a1() {
        assert_eq!(Position::from_a1("A1"), Position::new(0, 0));
        assert_eq!(Position::from_a1("B3"), Position::new(2, 1));
        assert_eq!(Position::from_a1("AA10"), Position::new(9, 26));
        assert_eq!(Position::from_a1("XFD16384"), Position::new(16383, 16383));
    }

    #[test]
    fn test_from_a1_rejects_malformed() {
        for bad in ["", "A", "1", "A0", "a1", "A-1", " A1", "A1 ", "1A", "A1B", "XFE1", "A16385", "ABCD1"] {
            assert_eq!(Position::from_a1(bad), Position::NONE, "{bad:?} should be invalid");
        }
    }

    #[test]
    fn test_display_round_trip() {
        for (row, col) in [(0, 0), (9, 26), (99, 701), (16383, 16383)] {
            let pos = Position::new(row, col);
            assert_eq!(Position::from_a1(&pos.to_string()), pos);
        }
        assert_eq!(Position::NONE.to_string(), "#REF!");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("C7".parse::<Position>(), Ok(Position::new(6, 2)));
        assert!("C0".parse::<Position>().is_err());
    }

    #[test]
    fn test_validity() {
        assert!(Position::new(0, 0).is_valid());
        assert!(!Position::new(Position::MAX_ROWS, 0).is_valid());
        assert!(!Position::new(0, Position::MAX_COLS).is_valid());
        assert!(!Position::NONE.is_valid());
    }
}
