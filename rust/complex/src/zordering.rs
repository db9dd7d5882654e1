// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Global depth order of cells.
//!
//! Index 0 is the bottom of the stack (drawn first, picked last). The order
//! is independent of ids and of topology, except that new cells are
//! inserted just below their lowest boundary cell.
//!
//! Operations needing topology (closure, star, bounding-box overlap) take
//! it as arguments so that this module stays a plain list.

use crate::keys::{CellId, CellSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZOrdering {
    list: Vec<CellId>,
}

impl ZOrdering {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Bottom to top.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = CellId> + '_ {
        self.list.iter().copied()
    }

    pub fn as_slice(&self) -> &[CellId] {
        &self.list
    }

    pub fn position(&self, cell: CellId) -> Option<usize> {
        self.list.iter().position(|c| *c == cell)
    }

    pub fn insert_last(&mut self, cell: CellId) {
        self.list.push(cell);
    }

    /// Inserts `cell` just below the lowest of `boundary`, or on top if
    /// none of them is in the list.
    pub fn insert_cell(&mut self, cell: CellId, boundary: &CellSet) {
        match self.list.iter().position(|c| boundary.contains(c)) {
            Some(i) => self.list.insert(i, cell),
            None => self.list.push(cell),
        }
    }

    pub fn remove(&mut self, cell: CellId) {
        self.list.retain(|c| *c != cell);
    }

    /// Moves `c1` just below `c2`.
    pub fn move_below(&mut self, c1: CellId, c2: CellId) {
        if c1 == c2 || self.position(c2).is_none() {
            return;
        }
        self.remove(c1);
        if let Some(i) = self.position(c2) {
            self.list.insert(i, c1);
        }
    }

    /// Moves `cell` just below the lowest of `boundary`.
    pub fn move_below_boundary(&mut self, cell: CellId, boundary: &CellSet) {
        if boundary.is_empty() {
            return;
        }
        let Some(i) = self.position(cell) else {
            return;
        };
        self.list.remove(i);
        match self.list.iter().position(|c| boundary.contains(c)) {
            Some(j) => self.list.insert(j, cell),
            None => self.list.insert(i.min(self.list.len()), cell),
        }
    }

    /// Raises `cells` (and the `closure` cells between them) just above the
    /// first overlapping cell, together with the part of that cell's
    /// boundary needed to keep boundaries below stars.
    pub fn raise(
        &mut self,
        cells: &CellSet,
        closure: &CellSet,
        overlaps: impl Fn(CellId) -> bool,
        boundary_of: impl Fn(CellId) -> CellSet,
    ) {
        raise_list(&mut self.list, cells, closure, &overlaps, &boundary_of, true);
    }

    /// Mirror of [`ZOrdering::raise`]: `fullstar` plays the role of the
    /// closure and `star_of` the role of the boundary.
    pub fn lower(
        &mut self,
        cells: &CellSet,
        fullstar: &CellSet,
        overlaps: impl Fn(CellId) -> bool,
        star_of: impl Fn(CellId) -> CellSet,
    ) {
        self.list.reverse();
        raise_list(&mut self.list, cells, fullstar, &overlaps, &star_of, true);
        self.list.reverse();
    }

    pub fn raise_to_top(&mut self, closure: &CellSet) {
        let (mut moved, kept): (Vec<CellId>, Vec<CellId>) =
            self.list.iter().partition(|c| closure.contains(c));
        self.list = kept;
        self.list.append(&mut moved);
    }

    pub fn lower_to_bottom(&mut self, fullstar: &CellSet) {
        let (mut moved, mut kept): (Vec<CellId>, Vec<CellId>) =
            self.list.iter().partition(|c| fullstar.contains(c));
        moved.append(&mut kept);
        self.list = moved;
    }

    /// Raises exactly `cells` above the first overlapping cell, ignoring
    /// boundaries.
    pub fn alt_raise(&mut self, cells: &CellSet, overlaps: impl Fn(CellId) -> bool) {
        raise_list(&mut self.list, cells, &CellSet::new(), &overlaps, &|_| CellSet::new(), false);
    }

    pub fn alt_lower(&mut self, cells: &CellSet, overlaps: impl Fn(CellId) -> bool) {
        self.list.reverse();
        raise_list(&mut self.list, cells, &CellSet::new(), &overlaps, &|_| CellSet::new(), false);
        self.list.reverse();
    }

    pub fn alt_raise_to_top(&mut self, cells: &CellSet) {
        self.raise_to_top(cells);
    }

    pub fn alt_lower_to_bottom(&mut self, cells: &CellSet) {
        self.lower_to_bottom(cells);
    }
}

/// Shared body of raise/lower. `lower` runs it on the reversed list.
fn raise_list(
    list: &mut Vec<CellId>,
    cells: &CellSet,
    extra: &CellSet,
    overlaps: &dyn Fn(CellId) -> bool,
    neighbours_of: &dyn Fn(CellId) -> CellSet,
    keep_neighbours_below: bool,
) {
    let n = cells.len();
    if n == 0 {
        return;
    }
    let Some(mut i) = list.iter().position(|c| cells.contains(c)) else {
        tracing::debug!("z-ordering: no cell to move found");
        return;
    };
    let mut moved = vec![list.remove(i)];
    let mut found = 1;

    let mut c1 = None;
    while i < list.len() {
        let c = list[i];
        if cells.contains(&c) {
            moved.push(list.remove(i));
            found += 1;
        } else if extra.contains(&c) {
            moved.push(list.remove(i));
        } else if found == n && overlaps(c) {
            c1 = Some(c);
            break;
        } else {
            i += 1;
        }
    }
    let Some(c1) = c1 else {
        list.extend(moved);
        return;
    };
    if !keep_neighbours_below {
        let at = (i + 1).min(list.len());
        list.splice(at..at, moved);
        return;
    }

    // Highest cell above c1 that c1 depends on and that is not moved
    let c1_neighbours = neighbours_of(c1);
    let mut i2 = list.len() - 1;
    while i2 != i {
        if c1_neighbours.contains(&list[i2]) && !extra.contains(&list[i2]) {
            break;
        }
        i2 -= 1;
    }
    while i != i2 {
        if extra.contains(&list[i]) {
            moved.push(list.remove(i));
            i2 -= 1;
        } else {
            i += 1;
        }
    }
    let at = (i2 + 1).min(list.len());
    list.splice(at..at, moved);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[u32]) -> Vec<CellId> {
        v.iter().map(|i| CellId(*i)).collect()
    }

    fn set(v: &[u32]) -> CellSet {
        v.iter().map(|i| CellId(*i)).collect()
    }

    fn order(z: &ZOrdering) -> Vec<u32> {
        z.iter().map(|c| c.0).collect()
    }

    #[test]
    fn insert_below_boundary() {
        let mut z = ZOrdering::new();
        z.insert_last(CellId(1));
        z.insert_last(CellId(2));
        z.insert_cell(CellId(3), &set(&[2]));
        assert_eq!(order(&z), vec![1, 3, 2]);
        z.insert_cell(CellId(4), &CellSet::new());
        assert_eq!(order(&z), vec![1, 3, 2, 4]);
        z.move_below_boundary(CellId(4), &set(&[1]));
        assert_eq!(order(&z), vec![4, 1, 3, 2]);
    }

    #[test]
    fn raise_above_first_overlap() {
        let mut z = ZOrdering::new();
        for c in ids(&[1, 2, 3, 4]) {
            z.insert_last(c);
        }
        z.alt_raise(&set(&[1]), |c| c == CellId(3));
        assert_eq!(order(&z), vec![2, 3, 1, 4]);
        z.alt_lower(&set(&[4]), |c| c == CellId(2));
        assert_eq!(order(&z), vec![4, 2, 3, 1]);
    }

    #[test]
    fn raise_without_overlap_goes_to_top() {
        let mut z = ZOrdering::new();
        for c in ids(&[1, 2, 3]) {
            z.insert_last(c);
        }
        z.raise(&set(&[1]), &set(&[1]), |_| false, |_| CellSet::new());
        assert_eq!(order(&z), vec![2, 3, 1]);
    }

    #[test]
    fn raise_keeps_boundary_below() {
        // face 10 bounded by edge 2; face 11 overlaps face 10
        let mut z = ZOrdering::new();
        for c in ids(&[10, 2, 11, 3]) {
            z.insert_last(c);
        }
        z.raise(
            &set(&[10]),
            &set(&[10, 2]),
            |c| c == CellId(11),
            |c| if c == CellId(11) { set(&[3]) } else { CellSet::new() },
        );
        assert_eq!(order(&z), vec![11, 3, 10, 2]);
    }

    #[test]
    fn to_top_and_bottom() {
        let mut z = ZOrdering::new();
        for c in ids(&[1, 2, 3, 4]) {
            z.insert_last(c);
        }
        z.raise_to_top(&set(&[1, 3]));
        assert_eq!(order(&z), vec![2, 4, 1, 3]);
        z.lower_to_bottom(&set(&[3]));
        assert_eq!(order(&z), vec![3, 2, 4, 1]);
    }
}
