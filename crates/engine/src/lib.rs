pub mod cell;
pub mod config;
pub mod dep_graph;
pub mod error;
pub mod formula;
pub mod grid;
pub mod position;
pub mod sheet;

pub use cell::{CellContent, CellValue};
pub use config::SheetConfig;
pub use error::{CycleReport, SheetError};
pub use formula::{FormulaError, FormulaParseError};
pub use position::{Position, PositionParseError, Size};
pub use sheet::{CellView, Sheet};
