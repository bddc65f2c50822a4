//! CLI Exit Code Registry
//!
//! Single source of truth for `cellgraph` exit codes. Scripts driving the
//! binary rely on them.
//!
//! | Code | Meaning                                            |
//! |------|----------------------------------------------------|
//! | 0    | Success                                            |
//! | 1    | I/O error (script or output unreadable/unwritable) |
//! | 2    | Usage error (bad args, bad config, bad command)    |
//! | 3    | Invalid position                                   |
//! | 4    | Circular dependency rejected                       |
//! | 5    | Formula parse error                                |
//!
//! With `--keep-going` the exit code is that of the first failing line.

/// Success - every script line ran without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// I/O error - reading the script or writing output failed.
pub const EXIT_IO: u8 = 1;

/// Usage error - bad arguments, unreadable config, unknown script command.
pub const EXIT_USAGE: u8 = 2;

/// Cell name does not parse or lies outside the configured sheet.
pub const EXIT_INVALID_POSITION: u8 = 3;

/// A `set` was rejected because it would create a circular reference.
pub const EXIT_CIRCULAR: u8 = 4;

/// A `set` was rejected because its formula does not parse.
pub const EXIT_FORMULA_PARSE: u8 = 5;
