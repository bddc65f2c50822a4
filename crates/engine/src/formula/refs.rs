//! Reference extraction from formula AST.
//!
//! Extracts the cell positions an expression reads, for wiring the
//! dependency graph.

use rustc_hash::FxHashSet;

use crate::position::Position;

use super::parser::Expr;

/// Extract all valid cell references from an expression.
///
/// Returns a deduplicated list in order of first occurrence (left to right
/// in the formula text). Invalid references are skipped; they evaluate to
/// #REF! and never become graph edges.
pub fn extract_positions(expr: &Expr) -> Vec<Position> {
    let mut seen = FxHashSet::default();
    let mut refs = Vec::new();
    collect_refs(expr, &mut seen, &mut refs);
    refs
}

fn collect_refs(expr: &Expr, seen: &mut FxHashSet<Position>, refs: &mut Vec<Position>) {
    match expr {
        Expr::Number(_) | Expr::InvalidRef(_) => {}
        Expr::CellRef(pos) => {
            if seen.insert(*pos) {
                refs.push(*pos);
            }
        }
        Expr::Unary { operand, .. } => collect_refs(operand, seen, refs),
        Expr::BinaryOp { left, right, .. } => {
            collect_refs(left, seen, refs);
            collect_refs(right, seen, refs);
        }
    }
}
