//! Dependency graph operations over the cells of a grid.
//!
//! The edges live on the cells themselves (`Cell::depends_on` and
//! `Cell::dependents`), keyed by `Position`. This module owns every
//! mutation of those sets and every walk over them.
//!
//! # Edge Direction
//!
//! ```text
//! B ∈ A.depends_on   means  "A's formula reads B"
//! A ∈ B.dependents   is the transpose of the same edge
//! ```
//!
//! # Invariants
//!
//! 1. **Transpose consistency:** `B ∈ A.depends_on ⇔ A ∈ B.dependents`.
//! 2. **Acyclic:** no path of `depends_on` edges returns to its origin.
//!    Enforced by checking `would_create_cycle` before `replace_edges`.
//! 3. **Targets exist:** every edge endpoint is allocated in the grid.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::CycleReport;
use crate::grid::Grid;
use crate::position::Position;

/// Check if pointing `cell` at `new_refs` would create a cycle.
///
/// Does not modify the grid. Walks the committed graph as it stands, so the
/// check runs before anything about `cell` is changed.
///
/// # Algorithm
///
/// A cycle is created iff `cell` is reachable from one of `new_refs` by
/// following `depends_on` edges (or `cell` is in `new_refs` itself). DFS from
/// every new reference with a shared visited set, so the walk is O(V + E).
pub fn would_create_cycle(grid: &Grid, cell: Position, new_refs: &[Position]) -> Option<CycleReport> {
    if new_refs.contains(&cell) {
        return Some(CycleReport::self_reference(cell));
    }

    let mut visited: FxHashSet<Position> = FxHashSet::default();
    // Node -> node it was first reached from, for reporting the path
    let mut reached_from: FxHashMap<Position, Position> = FxHashMap::default();
    let mut stack: Vec<Position> = Vec::new();

    for &start in new_refs {
        if visited.insert(start) {
            stack.push(start);
        }
    }

    while let Some(current) = stack.pop() {
        let Some(node) = grid.get(current) else {
            continue;
        };
        for next in node.depends_on() {
            if next == cell {
                return Some(CycleReport::cycle(cycle_path(cell, current, &reached_from)));
            }
            if visited.insert(next) {
                reached_from.insert(next, current);
                stack.push(next);
            }
        }
    }

    None
}

/// Build `cell → r → ... → last → cell` by walking back from `last`.
fn cycle_path(cell: Position, last: Position, reached_from: &FxHashMap<Position, Position>) -> Vec<Position> {
    let mut chain = vec![last];
    let mut cursor = last;
    while let Some(&prev) = reached_from.get(&cursor) {
        chain.push(prev);
        cursor = prev;
    }
    chain.reverse();

    let mut path = Vec::with_capacity(chain.len() + 2);
    path.push(cell);
    path.extend(chain);
    path.push(cell);
    path
}

/// Replace all outgoing edges of `cell` and patch the back-edges.
///
/// 1. Removes `cell` from the dependents of every old target
/// 2. Installs the new `depends_on` set
/// 3. Adds `cell` to the dependents of every new target
///
/// Targets are materialized if missing. Pass an empty slice to unwire.
pub fn replace_edges(grid: &mut Grid, cell: Position, new_refs: &[Position]) {
    let new_set: FxHashSet<Position> = new_refs.iter().copied().collect();

    let old_set = grid.materialize(cell).replace_depends_on(new_set);
    for old in old_set {
        if let Some(target) = grid.get_mut(old) {
            target.remove_dependent(cell);
        }
    }

    for &target in new_refs {
        grid.materialize(target).add_dependent(cell);
    }
}

/// Clear cached values from `cell` outward along dependents.
///
/// `cell` itself always forwards to its direct dependents: its content just
/// changed, and text or empty cells never hold a cache, so their own empty
/// cache says nothing about downstream. Every other cell stops the walk when
/// its cache is already empty, since nothing downstream of it can be cached.
/// Uses an explicit worklist rather than recursion.
///
/// Returns the number of downstream caches cleared.
pub fn invalidate(grid: &Grid, cell: Position) -> usize {
    let Some(origin) = grid.get(cell) else {
        return 0;
    };
    origin.take_cache();

    let mut cleared = 0;
    let mut stack: Vec<Position> = origin.dependents().collect();
    while let Some(current) = stack.pop() {
        let Some(node) = grid.get(current) else {
            continue;
        };
        if node.take_cache() {
            cleared += 1;
            stack.extend(node.dependents());
        }
    }
    cleared
}

/// Check all invariants. Panics if any are violated.
///
/// Only available in test builds.
#[cfg(test)]
pub fn assert_consistent(grid: &Grid) {
    // Invariant 1 + 3: depends_on → dependents
    for (pos, cell) in grid.iter() {
        for target in cell.depends_on() {
            let target_cell = grid
                .get(target)
                .unwrap_or_else(|| panic!("Edge {} -> {} points at an unallocated cell", pos, target));
            assert!(
                target_cell.has_dependent(pos),
                "Missing back-edge: {} should list {} as a dependent",
                target,
                pos
            );
        }
    }

    // Invariant 1 + 3: dependents → depends_on
    for (pos, cell) in grid.iter() {
        for dependent in cell.dependents() {
            let dependent_cell = grid
                .get(dependent)
                .unwrap_or_else(|| panic!("Back-edge {} <- {} from an unallocated cell", pos, dependent));
            assert!(
                dependent_cell.depends_on_set().contains(&pos),
                "Missing edge: {} should depend on {}",
                dependent,
                pos
            );
        }
    }

    // Invariant 2: no cell reaches itself
    for (pos, cell) in grid.iter() {
        let refs: Vec<Position> = cell.depends_on().collect();
        let mut visited = FxHashSet::default();
        let mut stack = refs;
        while let Some(current) = stack.pop() {
            assert_ne!(current, pos, "Cycle through {}", pos);
            if visited.insert(current) {
                if let Some(node) = grid.get(current) {
                    stack.extend(node.depends_on());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellContent;

    fn p(a1: &str) -> Position {
        Position::from_a1(a1)
    }

    fn wire(grid: &mut Grid, cell: &str, refs: &[&str]) {
        let refs: Vec<Position> = refs.iter().map(|r| p(r)).collect();
        assert!(would_create_cycle(grid, p(cell), &refs).is_none());
        replace_edges(grid, p(cell), &refs);
    }

    fn dependents_of(grid: &Grid, cell: &str) -> Vec<Position> {
        let mut deps: Vec<Position> = grid.get(p(cell)).map(|c| c.dependents().collect()).unwrap_or_default();
        deps.sort();
        deps
    }

    #[test]
    fn test_empty_grid() {
        let grid = Grid::new();
        assert!(would_create_cycle(&grid, p("A1"), &[p("B1")]).is_none());
        assert_eq!(invalidate(&grid, p("A1")), 0);
        assert_consistent(&grid);
    }

    #[test]
    fn test_single_edge() {
        let mut grid = Grid::new();
        wire(&mut grid, "B1", &["A1"]);
        assert_consistent(&grid);

        assert_eq!(dependents_of(&grid, "A1"), vec![p("B1")]);
        assert!(grid.get(p("A1")).is_some(), "target is materialized");
    }

    #[test]
    fn test_rewiring() {
        let mut grid = Grid::new();
        wire(&mut grid, "C1", &["A1", "B1"]);
        wire(&mut grid, "C1", &["B1", "D1"]);
        assert_consistent(&grid);

        assert!(dependents_of(&grid, "A1").is_empty());
        assert_eq!(dependents_of(&grid, "B1"), vec![p("C1")]);
        assert_eq!(dependents_of(&grid, "D1"), vec![p("C1")]);
    }

    #[test]
    fn test_unwiring() {
        let mut grid = Grid::new();
        wire(&mut grid, "B1", &["A1"]);
        replace_edges(&mut grid, p("B1"), &[]);
        assert_consistent(&grid);

        assert!(dependents_of(&grid, "A1").is_empty());
        assert_eq!(grid.get(p("B1")).unwrap().depends_on().count(), 0);
    }

    #[test]
    fn test_multiple_dependents() {
        let mut grid = Grid::new();
        wire(&mut grid, "B1", &["A1"]);
        wire(&mut grid, "C1", &["A1"]);
        wire(&mut grid, "D1", &["A1"]);
        assert_consistent(&grid);

        assert_eq!(dependents_of(&grid, "A1"), vec![p("B1"), p("C1"), p("D1")]);
    }

    #[test]
    fn test_cycle_self_reference() {
        let grid = Grid::new();
        let report = would_create_cycle(&grid, p("A1"), &[p("A1")]).unwrap();
        assert_eq!(report.cells, vec![p("A1"), p("A1")]);
    }

    #[test]
    fn test_cycle_two_cell() {
        let mut grid = Grid::new();
        wire(&mut grid, "B1", &["A1"]);

        let report = would_create_cycle(&grid, p("A1"), &[p("B1")]).unwrap();
        assert_eq!(report.cells, vec![p("A1"), p("B1"), p("A1")]);
    }

    #[test]
    fn test_cycle_indirect() {
        // C1 -> B1 -> A1, then A1 -> C1 closes the loop
        let mut grid = Grid::new();
        wire(&mut grid, "B1", &["A1"]);
        wire(&mut grid, "C1", &["B1"]);

        let report = would_create_cycle(&grid, p("A1"), &[p("D1"), p("C1")]).unwrap();
        assert_eq!(report.cells, vec![p("A1"), p("C1"), p("B1"), p("A1")]);
    }

    #[test]
    fn test_no_cycle_diamond() {
        // D1 -> B1, C1 -> A1: adding A1 -> E1 is fine
        let mut grid = Grid::new();
        wire(&mut grid, "B1", &["A1"]);
        wire(&mut grid, "C1", &["A1"]);
        wire(&mut grid, "D1", &["B1", "C1"]);

        assert!(would_create_cycle(&grid, p("A1"), &[p("E1")]).is_none());
        assert!(would_create_cycle(&grid, p("E1"), &[p("D1")]).is_none());
        assert!(would_create_cycle(&grid, p("A1"), &[p("D1")]).is_some());
    }

    #[test]
    fn test_cycle_check_ignores_current_edges_of_cell() {
        // B1 currently reads A1; re-pointing B1 at A1 again is not a cycle
        let mut grid = Grid::new();
        wire(&mut grid, "B1", &["A1"]);
        assert!(would_create_cycle(&grid, p("B1"), &[p("A1")]).is_none());
    }

    #[test]
    fn test_invalidate_transitive() {
        let mut grid = Grid::new();
        for (cell, refs) in [("B1", &["A1"][..]), ("C1", &["B1"][..]), ("D1", &["C1"][..])] {
            wire(&mut grid, cell, refs);
            grid.get_mut(p(cell))
                .unwrap()
                .set_content(CellContent::from_input("=1").unwrap());
        }
        struct Zero;
        impl crate::formula::CellLookup for Zero {
            fn value_at(&self, _: Position) -> Result<f64, crate::formula::FormulaError> {
                Ok(0.0)
            }
        }
        for cell in ["B1", "C1", "D1"] {
            grid.get(p(cell)).unwrap().value(&Zero, true);
        }

        // A1 holds no cache of its own but still forwards the invalidation
        assert_eq!(invalidate(&grid, p("A1")), 3);
        for cell in ["B1", "C1", "D1"] {
            assert_eq!(grid.get(p(cell)).unwrap().cached_value(), None);
        }

        // Already invalid: nothing left to clear
        assert_eq!(invalidate(&grid, p("A1")), 0);
    }
}
