// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validity predicates.
//!
//! Checks never fail loudly: they return `false` and log the reason at
//! `debug` level, leaving the decision to the caller.

use crate::cell::{CellData, InbetweenEdgeData};
use crate::cycle::{Cycle, CycleType};
use crate::keys::{CellId, CellType, SpatialKind};
use crate::vac::Vac;

impl Vac {
    /// Whether every cell is valid and the aggregate sets (z-ordering,
    /// selection, hover) only refer to existing cells.
    pub fn check(&self) -> bool {
        let mut ok = true;
        for id in self.cells.keys() {
            if !self.check_cell(*id) {
                ok = false;
            }
        }
        if self.zordering.len() != self.cells.len()
            || self.zordering.iter().any(|c| !self.cells.contains_key(&c))
        {
            tracing::debug!(
                zordering = self.zordering.len(),
                cells = self.cells.len(),
                "z-ordering out of sync with cells"
            );
            ok = false;
        }
        if let Some(c) = self.selection.iter().find(|c| !self.cells.contains_key(c)) {
            tracing::debug!(cell = %c, "selection refers to a deleted cell");
            ok = false;
        }
        if let Some(h) = self.hovered {
            if !self.cells.contains_key(&h) {
                tracing::debug!(cell = %h, "hovered cell was deleted");
                ok = false;
            }
        }
        ok
    }

    /// Whether `id` belongs to this complex.
    pub fn check_contains(&self, id: CellId) -> bool {
        self.cells.get(&id).map_or(false, |c| c.id == id)
    }

    /// Whether `id` is a valid cell whose boundary and star agree.
    pub fn check_cell(&self, id: CellId) -> bool {
        let Some(cell) = self.cell(id) else {
            tracing::debug!(cell = %id, "checked cell does not exist");
            return false;
        };
        let fail = |reason: &str| {
            tracing::debug!(cell = %id, kind = ?cell.cell_type(), reason, "invalid cell");
            false
        };
        if cell.id != id {
            return fail("stored id differs from key");
        }

        // Boundary / star duality
        for b in self.spatial_boundary(id) {
            match self.cell(b) {
                None => return fail("spatial boundary cell missing"),
                Some(bc) if !bc.spatial_star.contains(&id) => {
                    return fail("not in spatial star of its boundary")
                }
                _ => {}
            }
        }
        for b in self.before_cells(id) {
            match self.cell(b) {
                None => return fail("before cell missing"),
                Some(bc) if !bc.temporal_star_after.contains(&id) => {
                    return fail("not in temporal star of its before cell")
                }
                _ => {}
            }
        }
        for b in self.after_cells(id) {
            match self.cell(b) {
                None => return fail("after cell missing"),
                Some(bc) if !bc.temporal_star_before.contains(&id) => {
                    return fail("not in temporal star of its after cell")
                }
                _ => {}
            }
        }
        for s in &cell.spatial_star {
            if !self.spatial_boundary(*s).contains(&id) {
                return fail("spatial star cell does not use it");
            }
        }
        for s in &cell.temporal_star_after {
            if !self.before_cells(*s).contains(&id) {
                return fail("temporal star cell does not start at it");
            }
        }
        for s in &cell.temporal_star_before {
            if !self.after_cells(*s).contains(&id) {
                return fail("temporal star cell does not end at it");
            }
        }

        match &cell.data {
            CellData::KeyVertex(v) => {
                if !v.pos.x.is_finite() || !v.pos.y.is_finite() {
                    return fail("non-finite position");
                }
            }
            CellData::KeyEdge(e) => {
                match (e.start, e.end) {
                    (Some(s), Some(t)) => {
                        let ts = self.key_vertex(s).map(|v| v.time);
                        let te = self.key_vertex(t).map(|v| v.time);
                        if ts != Some(e.time) || te != Some(e.time) {
                            return fail("end vertices are not key vertices at the edge time");
                        }
                    }
                    (None, None) => {}
                    _ => return fail("edge with a single end vertex"),
                }
                if e.geometry.is_empty() {
                    return fail("empty edge geometry");
                }
            }
            CellData::KeyFace(f) => {
                for c in &f.cycles {
                    if !self.check_key_cycle(c) {
                        return fail("invalid face cycle");
                    }
                    if c.time(self) != f.time {
                        return fail("face cycle at another time");
                    }
                }
            }
            CellData::InbetweenVertex(iv) => {
                let t1 = self.key_vertex(iv.before).map(|v| v.time);
                let t2 = self.key_vertex(iv.after).map(|v| v.time);
                match (t1, t2) {
                    (Some(t1), Some(t2)) if t1 < t2 => {}
                    _ => return fail("inbetween vertex without increasing key vertices"),
                }
            }
            CellData::InbetweenEdge(InbetweenEdgeData::Open {
                before_path,
                after_path,
                start,
                end,
            }) => {
                if !before_path.is_valid() || !after_path.is_valid() {
                    return fail("invalid path");
                }
                if !(before_path.time(self) < after_path.time(self)) {
                    return fail("paths not in increasing time");
                }
                if !start.is_valid() || !end.is_valid() || !start.is_chained(self) || !end.is_chained(self) {
                    return fail("invalid animated vertex");
                }
                if start.before_vertex(self) != before_path.start_vertex(self)
                    || start.after_vertex(self) != after_path.start_vertex(self)
                    || end.before_vertex(self) != before_path.end_vertex(self)
                    || end.after_vertex(self) != after_path.end_vertex(self)
                {
                    return fail("animated vertices do not match paths");
                }
            }
            CellData::InbetweenEdge(InbetweenEdgeData::Closed {
                before_cycle,
                after_cycle,
            }) => {
                if !self.check_key_cycle(before_cycle) || !self.check_key_cycle(after_cycle) {
                    return fail("invalid cycle");
                }
                if !(before_cycle.time(self) < after_cycle.time(self)) {
                    return fail("cycles not in increasing time");
                }
            }
            CellData::InbetweenFace(f) => {
                for c in &f.cycles {
                    if c.is_empty() {
                        return fail("empty animated cycle");
                    }
                    if c.cells().iter().any(|x| !self.contains(*x)) {
                        return fail("animated cycle refers to a missing cell");
                    }
                }
                for x in f.before_faces.iter().chain(f.after_faces.iter()) {
                    if self.cell_type(*x) != Some(CellType::KeyFace) {
                        return fail("before/after face is not a key face");
                    }
                }
            }
        }
        true
    }

    /// A key cycle is valid when its halfedges chain up, or when it is a
    /// single key vertex.
    pub(crate) fn check_key_cycle(&self, cycle: &Cycle) -> bool {
        match cycle.cycle_type(self) {
            CycleType::Invalid => false,
            CycleType::SingleVertex => cycle
                .single_vertex()
                .map_or(false, |v| self.cell_type(v) == Some(CellType::KeyVertex)),
            CycleType::ClosedHalfedge => {
                let e = cycle.halfedges()[0].edge;
                cycle.halfedges().iter().all(|h| h.edge == e)
            }
            CycleType::OpenHalfedgeList => {
                let hs = cycle.halfedges();
                let n = hs.len();
                hs.iter().all(|h| {
                    self.cell(h.edge)
                        .map_or(false, |c| c.spatial_kind() == SpatialKind::Edge && c.is_key())
                }) && (0..n).all(|i| hs[i].end_vertex(self) == hs[(i + 1) % n].start_vertex(self))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector2;

    use super::*;
    use crate::halfedge::KeyHalfedge;
    use crate::time::Time;

    #[test]
    fn valid_complex_checks() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(10.0, 0.0));
        let e = vac.new_key_edge(a, b).unwrap();
        assert!(vac.check());
        assert!(vac.check_cell(e));
        assert!(vac.check_contains(e));
        assert!(!vac.check_contains(CellId(42)));
    }

    #[test]
    fn broken_star_is_detected() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(10.0, 0.0));
        let e = vac.new_key_edge(a, b).unwrap();
        vac.cell_mut(a).unwrap().spatial_star.remove(&e);
        assert!(!vac.check_cell(e));
        assert!(!vac.check());
    }

    #[test]
    fn open_cycle_must_close() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(10.0, 0.0));
        let e = vac.new_key_edge(a, b).unwrap();
        let open = Cycle::from_parts(None, vec![KeyHalfedge::new(e, true)], 0.0);
        assert!(!vac.check_key_cycle(&open));
        let back = Cycle::from_parts(
            None,
            vec![KeyHalfedge::new(e, true), KeyHalfedge::new(e, false)],
            0.0,
        );
        assert!(vac.check_key_cycle(&back));
    }
}
