// Formula evaluator - arithmetic over f64 with typed error values

use std::fmt;

use crate::position::Position;

use super::parser::{Expr, Op, UnaryOp};

/// Error outcome of evaluating a formula.
///
/// These are values, not failures: they flow through arithmetic and are
/// displayed as their category token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormulaError {
    /// Reference to a cell outside the sheet
    Ref,
    /// Referenced text that is not a number
    Value,
    /// Division by zero or a non-finite result
    Div0,
}

impl FormulaError {
    pub fn token(&self) -> &'static str {
        match self {
            FormulaError::Ref => "#REF!",
            FormulaError::Value => "#VALUE!",
            FormulaError::Div0 => "#DIV/0!",
        }
    }
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Source of referenced cell values during evaluation.
///
/// Implemented by the sheet; a lookup may recursively evaluate the
/// referenced cell.
pub trait CellLookup {
    fn value_at(&self, pos: Position) -> Result<f64, FormulaError>;
}

pub fn evaluate<L: CellLookup + ?Sized>(expr: &Expr, lookup: &L) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::CellRef(pos) => {
            let value = lookup.value_at(*pos)?;
            if !value.is_finite() {
                return Err(FormulaError::Div0);
            }
            Ok(value)
        }
        Expr::InvalidRef(_) => Err(FormulaError::Ref),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, lookup)?;
            Ok(match op {
                UnaryOp::Plus => value,
                UnaryOp::Minus => -value,
            })
        }
        Expr::BinaryOp { op, left, right } => {
            let left_val = evaluate(left, lookup)?;
            let right_val = evaluate(right, lookup)?;

            let result = match op {
                Op::Add => left_val + right_val,
                Op::Sub => left_val - right_val,
                Op::Mul => left_val * right_val,
                Op::Div => {
                    if right_val == 0.0 {
                        return Err(FormulaError::Div0);
                    }
                    left_val / right_val
                }
            };
            if !result.is_finite() {
                return Err(FormulaError::Div0);
            }
            Ok(result)
        }
    }
}

/// Interpret cell text as a number for arithmetic.
///
/// Empty text is 0. Otherwise accepts an optional sign, digits and at most
/// one decimal point, with at least one digit.
pub fn parse_numeric_text(text: &str) -> Option<f64> {
    if text.is_empty() {
        return Some(0.0);
    }
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    let mut digits = 0;
    let mut dots = 0;
    for b in body.bytes() {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' => dots += 1,
            _ => return None,
        }
    }
    if digits == 0 || dots > 1 {
        return None;
    }
    text.parse().ok()
}
