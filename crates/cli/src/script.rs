//! Line-oriented sheet scripts.
//!
//! ```text
//! # comment
//! set A1 12
//! set B1 =A1*2
//! get B1
//! clear A1
//! size
//! values
//! texts
//! ```

use std::fmt;
use std::io::{self, Write};

use cellgraph_engine::{Position, PositionParseError, Sheet, SheetError};

use crate::exit_codes::*;

/// One parsed script line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `set <A1> <text...>`. The text is everything after the single space
    /// following the cell name and may be empty.
    Set { pos: Position, text: String },
    Clear { pos: Position },
    Get { pos: Position },
    Size,
    Values,
    Texts,
}

#[derive(Debug)]
pub enum ScriptErrorKind {
    /// Unknown command or wrong arguments
    Usage(String),
    /// Cell name is not A1 notation
    BadCellName(PositionParseError),
    Sheet(SheetError),
    Io(io::Error),
}

/// A failure on one script line.
#[derive(Debug)]
pub struct ScriptError {
    /// 1-based line number
    pub line: usize,
    pub kind: ScriptErrorKind,
}

impl ScriptError {
    pub fn exit_code(&self) -> u8 {
        match &self.kind {
            ScriptErrorKind::Usage(_) => EXIT_USAGE,
            ScriptErrorKind::BadCellName(_) => EXIT_INVALID_POSITION,
            ScriptErrorKind::Sheet(SheetError::InvalidPosition(_)) => EXIT_INVALID_POSITION,
            ScriptErrorKind::Sheet(SheetError::CircularDependency(_)) => EXIT_CIRCULAR,
            ScriptErrorKind::Sheet(SheetError::FormulaParse(_)) => EXIT_FORMULA_PARSE,
            ScriptErrorKind::Io(_) => EXIT_IO,
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            ScriptErrorKind::Usage(msg) => f.write_str(msg),
            ScriptErrorKind::BadCellName(err) => write!(f, "{}", err),
            ScriptErrorKind::Sheet(err) => write!(f, "{}", err),
            ScriptErrorKind::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ScriptErrorKind::Usage(_) => None,
            ScriptErrorKind::BadCellName(err) => Some(err),
            ScriptErrorKind::Sheet(err) => Some(err),
            ScriptErrorKind::Io(err) => Some(err),
        }
    }
}

impl From<PositionParseError> for ScriptErrorKind {
    fn from(err: PositionParseError) -> Self {
        ScriptErrorKind::BadCellName(err)
    }
}

impl From<SheetError> for ScriptErrorKind {
    fn from(err: SheetError) -> Self {
        ScriptErrorKind::Sheet(err)
    }
}

impl From<io::Error> for ScriptErrorKind {
    fn from(err: io::Error) -> Self {
        ScriptErrorKind::Io(err)
    }
}

/// Parse one line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, ScriptErrorKind> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let trimmed = line.trim_start();
    if trimmed.trim_end().is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
    let command = match word {
        "set" => {
            let (cell, text) = rest.split_once(' ').unwrap_or((rest, ""));
            Command::Set { pos: parse_cell(cell)?, text: text.to_string() }
        }
        "clear" => Command::Clear { pos: parse_cell(single_arg(word, rest)?)? },
        "get" => Command::Get { pos: parse_cell(single_arg(word, rest)?)? },
        "size" => no_args(word, rest, Command::Size)?,
        "values" => no_args(word, rest, Command::Values)?,
        "texts" => no_args(word, rest, Command::Texts)?,
        other => return Err(ScriptErrorKind::Usage(format!("unknown command '{}'", other))),
    };
    Ok(Some(command))
}

fn parse_cell(name: &str) -> Result<Position, ScriptErrorKind> {
    if name.is_empty() {
        return Err(ScriptErrorKind::Usage("missing cell name".to_string()));
    }
    Ok(name.parse::<Position>()?)
}

fn single_arg<'a>(command: &str, rest: &'a str) -> Result<&'a str, ScriptErrorKind> {
    let arg = rest.trim();
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        return Err(ScriptErrorKind::Usage(format!("'{}' takes exactly one cell name", command)));
    }
    Ok(arg)
}

fn no_args(command: &str, rest: &str, parsed: Command) -> Result<Command, ScriptErrorKind> {
    if rest.trim().is_empty() {
        Ok(parsed)
    } else {
        Err(ScriptErrorKind::Usage(format!("'{}' takes no arguments", command)))
    }
}

/// Executes script commands against a sheet.
pub struct Runner {
    sheet: Sheet,
    keep_going: bool,
}

impl Runner {
    pub fn new(sheet: Sheet, keep_going: bool) -> Self {
        Self { sheet, keep_going }
    }

    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    /// Run every line of `source`, writing command output to `out` and
    /// error lines to `err`.
    ///
    /// Returns the first error. Without `keep_going` that error also ends
    /// the run.
    pub fn run<W: Write, E: Write>(&mut self, source: &str, out: &mut W, err: &mut E) -> Result<(), ScriptError> {
        let mut first_error = None;

        for (index, line) in source.lines().enumerate() {
            let line_no = index + 1;
            let result = parse_line(line).and_then(|command| match command {
                Some(command) => self.execute(&command, out),
                None => Ok(()),
            });

            if let Err(kind) = result {
                let error = ScriptError { line: line_no, kind };
                // Best effort: a broken stderr must not mask the script error
                let _ = writeln!(err, "{}", error);
                log::debug!("script error, exit code {}", error.exit_code());

                if !self.keep_going {
                    return Err(error);
                }
                first_error.get_or_insert(error);
            }
        }

        out.flush().map_err(|e| ScriptError { line: 0, kind: e.into() })?;
        first_error.map_or(Ok(()), Err)
    }

    pub fn execute<W: Write>(&mut self, command: &Command, out: &mut W) -> Result<(), ScriptErrorKind> {
        log::trace!("{:?}", command);
        match command {
            Command::Set { pos, text } => self.sheet.set_cell(*pos, text)?,
            Command::Clear { pos } => self.sheet.clear_cell(*pos)?,
            Command::Get { pos } => {
                let (text, value) = match self.sheet.get_cell(*pos)? {
                    Some(view) => (view.text(), view.value().to_string()),
                    None => (String::new(), String::new()),
                };
                writeln!(out, "{}\t{}\t{}", pos, text, value)?;
            }
            Command::Size => writeln!(out, "{}", self.sheet.printable_size())?,
            Command::Values => self.sheet.print_values(out)?,
            Command::Texts => self.sheet.print_texts(out)?,
        }
        Ok(())
    }
}
