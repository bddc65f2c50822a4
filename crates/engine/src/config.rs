// Sheet configuration
// Deserialized from TOML by callers; every field has a default.

use serde::{Deserialize, Serialize};

use crate::position::Position;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Number of addressable rows (clamped to `Position::MAX_ROWS`)
    pub max_rows: usize,

    /// Number of addressable columns (clamped to `Position::MAX_COLS`)
    pub max_cols: usize,

    /// Serve numeric results from the cache until invalidated.
    /// When false every read re-evaluates and the cache only marks how far
    /// invalidation has to travel.
    pub memoize: bool,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            max_rows: Position::MAX_ROWS,
            max_cols: Position::MAX_COLS,
            memoize: true,
        }
    }
}

impl SheetConfig {
    /// Copy of this config with limits clamped to the coordinate maximums.
    pub fn normalized(&self) -> Self {
        Self {
            max_rows: self.max_rows.min(Position::MAX_ROWS),
            max_cols: self.max_cols.min(Position::MAX_COLS),
            memoize: self.memoize,
        }
    }

    /// True if `pos` is addressable under these limits.
    pub fn contains(&self, pos: Position) -> bool {
        pos.is_valid() && pos.row < self.max_rows && pos.col < self.max_cols
    }
}
