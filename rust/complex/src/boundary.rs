// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary and star navigation, temporal domains, boundary retargeting.
//!
//! Boundaries are derived from the cell payloads. Stars are the inverse
//! relation and are stored on the cells; every payload change goes through
//! [`Vac::modify_boundary`] which removes the cell from the stars of its
//! old boundary and adds it to the stars of the new one.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::cell::{CellData, InbetweenEdgeData};
use crate::halfedge::KeyHalfedge;
use crate::keys::{CellId, CellSet};
use crate::time::Time;
use crate::vac::Vac;

impl Vac {
    // --------------------------------------------------------------------
    // Boundary
    // --------------------------------------------------------------------

    pub fn spatial_boundary(&self, id: CellId) -> CellSet {
        let mut res = CellSet::new();
        let Some(cell) = self.cell(id) else {
            return res;
        };
        match &cell.data {
            CellData::KeyVertex(_) | CellData::InbetweenVertex(_) => {}
            CellData::KeyEdge(e) => {
                res.extend(e.start);
                res.extend(e.end);
            }
            CellData::KeyFace(f) => {
                for c in &f.cycles {
                    res.extend(c.cells(self));
                }
            }
            CellData::InbetweenEdge(InbetweenEdgeData::Open { start, end, .. }) => {
                res.extend(start.vertices(self));
                res.extend(end.vertices(self));
            }
            CellData::InbetweenEdge(InbetweenEdgeData::Closed { .. }) => {}
            CellData::InbetweenFace(f) => {
                for c in &f.cycles {
                    res.extend(c.cells());
                }
            }
        }
        res
    }

    /// Key cells bounding `id` in the past. Empty for key cells.
    pub fn before_cells(&self, id: CellId) -> CellSet {
        let mut res = CellSet::new();
        let Some(cell) = self.cell(id) else {
            return res;
        };
        match &cell.data {
            CellData::InbetweenVertex(v) => {
                res.insert(v.before);
            }
            CellData::InbetweenEdge(InbetweenEdgeData::Open { before_path, .. }) => {
                res.extend(before_path.cells(self));
            }
            CellData::InbetweenEdge(InbetweenEdgeData::Closed { before_cycle, .. }) => {
                res.extend(before_cycle.cells(self));
            }
            CellData::InbetweenFace(f) => {
                res.extend(f.before_faces.iter().copied());
                for c in &f.cycles {
                    res.extend(c.before_cells(self));
                }
            }
            _ => {}
        }
        res
    }

    /// Key cells bounding `id` in the future. Empty for key cells.
    pub fn after_cells(&self, id: CellId) -> CellSet {
        let mut res = CellSet::new();
        let Some(cell) = self.cell(id) else {
            return res;
        };
        match &cell.data {
            CellData::InbetweenVertex(v) => {
                res.insert(v.after);
            }
            CellData::InbetweenEdge(InbetweenEdgeData::Open { after_path, .. }) => {
                res.extend(after_path.cells(self));
            }
            CellData::InbetweenEdge(InbetweenEdgeData::Closed { after_cycle, .. }) => {
                res.extend(after_cycle.cells(self));
            }
            CellData::InbetweenFace(f) => {
                res.extend(f.after_faces.iter().copied());
                for c in &f.cycles {
                    res.extend(c.after_cells(self));
                }
            }
            _ => {}
        }
        res
    }

    pub fn temporal_boundary(&self, id: CellId) -> CellSet {
        let mut res = self.before_cells(id);
        res.extend(self.after_cells(id));
        res
    }

    pub fn boundary(&self, id: CellId) -> CellSet {
        let mut res = self.spatial_boundary(id);
        res.extend(self.before_cells(id));
        res.extend(self.after_cells(id));
        res
    }

    // --------------------------------------------------------------------
    // Star
    // --------------------------------------------------------------------

    pub fn spatial_star(&self, id: CellId) -> CellSet {
        self.cell(id).map(|c| c.spatial_star.clone()).unwrap_or_default()
    }

    /// Inbetween cells ending at `id`.
    pub fn temporal_star_before(&self, id: CellId) -> CellSet {
        self.cell(id)
            .map(|c| c.temporal_star_before.clone())
            .unwrap_or_default()
    }

    /// Inbetween cells starting at `id`.
    pub fn temporal_star_after(&self, id: CellId) -> CellSet {
        self.cell(id)
            .map(|c| c.temporal_star_after.clone())
            .unwrap_or_default()
    }

    pub fn temporal_star(&self, id: CellId) -> CellSet {
        self.cell(id).map(|c| c.temporal_star()).unwrap_or_default()
    }

    pub fn star(&self, id: CellId) -> CellSet {
        self.cell(id).map(|c| c.star()).unwrap_or_default()
    }

    /// `cells` and everything they depend on, transitively.
    pub fn closure(&self, cells: &CellSet) -> CellSet {
        self.saturate(cells, |id| self.boundary(id))
    }

    /// `cells` and everything depending on them, transitively.
    pub fn fullstar(&self, cells: &CellSet) -> CellSet {
        self.saturate(cells, |id| self.star(id))
    }

    fn saturate(&self, cells: &CellSet, next: impl Fn(CellId) -> CellSet) -> CellSet {
        let mut res: CellSet = cells.iter().copied().filter(|c| self.contains(*c)).collect();
        let mut queue: VecDeque<CellId> = res.iter().copied().collect();
        while let Some(c) = queue.pop_front() {
            for n in next(c) {
                if res.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        res
    }

    /// Cells reachable from `cells` through boundary or star relations.
    pub fn connected(&self, cells: &CellSet) -> CellSet {
        self.saturate(cells, |id| {
            let mut n = self.boundary(id);
            n.extend(self.star(id));
            n
        })
    }

    /// Splits `cells` into groups connected through boundary or star
    /// relations restricted to `cells`.
    pub fn connected_components(&self, cells: &CellSet) -> Vec<CellSet> {
        let mut remaining = cells.clone();
        let mut res = Vec::new();
        while let Some(seed) = remaining.iter().next().copied() {
            remaining.remove(&seed);
            let mut component = CellSet::new();
            component.insert(seed);
            let mut queue = VecDeque::from([seed]);
            while let Some(c) = queue.pop_front() {
                let mut n = self.boundary(c);
                n.extend(self.star(c));
                for x in n {
                    if remaining.remove(&x) {
                        component.insert(x);
                        queue.push_back(x);
                    }
                }
            }
            res.push(component);
        }
        res
    }

    // --------------------------------------------------------------------
    // Temporal domain
    // --------------------------------------------------------------------

    /// Time of the earliest key cell bounding an inbetween cell, or the
    /// time of a key cell.
    pub fn before_time(&self, id: CellId) -> Time {
        if let Some(t) = self.cell(id).and_then(|c| c.key_time()) {
            return t;
        }
        self.before_cells(id)
            .into_iter()
            .find_map(|c| self.cell(c).and_then(|c| c.key_time()))
            .unwrap_or_default()
    }

    pub fn after_time(&self, id: CellId) -> Time {
        if let Some(t) = self.cell(id).and_then(|c| c.key_time()) {
            return t;
        }
        self.after_cells(id)
            .into_iter()
            .find_map(|c| self.cell(c).and_then(|c| c.key_time()))
            .unwrap_or_default()
    }

    pub fn exists(&self, id: CellId, t: Time) -> bool {
        match self.cell(id) {
            None => false,
            Some(c) => match c.key_time() {
                Some(kt) => kt == t,
                None => self.before_time(id) < t && t < self.after_time(id),
            },
        }
    }

    /// Whether the cell lies entirely before `t`.
    pub fn is_before(&self, id: CellId, t: Time) -> bool {
        match self.cell(id) {
            None => false,
            Some(c) => match c.key_time() {
                Some(kt) => kt < t,
                None => self.after_time(id) <= t,
            },
        }
    }

    /// Whether the cell lies entirely after `t`.
    pub fn is_after(&self, id: CellId, t: Time) -> bool {
        match self.cell(id) {
            None => false,
            Some(c) => match c.key_time() {
                Some(kt) => kt > t,
                None => self.before_time(id) >= t,
            },
        }
    }

    /// True only for key cells at exactly `t`.
    pub fn is_at(&self, id: CellId, t: Time) -> bool {
        self.cell(id)
            .and_then(|c| c.key_time())
            .map_or(false, |kt| kt == t)
    }

    // --------------------------------------------------------------------
    // Star maintenance
    // --------------------------------------------------------------------

    pub(crate) fn add_to_star_of_boundary(&mut self, id: CellId) {
        let spatial = self.spatial_boundary(id);
        let before = self.before_cells(id);
        let after = self.after_cells(id);
        for b in spatial {
            if let Some(c) = self.cells.get_mut(&b) {
                c.spatial_star.insert(id);
            }
        }
        for b in before {
            if let Some(c) = self.cells.get_mut(&b) {
                c.temporal_star_after.insert(id);
            }
        }
        for b in after {
            if let Some(c) = self.cells.get_mut(&b) {
                c.temporal_star_before.insert(id);
            }
        }
    }

    pub(crate) fn remove_from_star_of_boundary(&mut self, id: CellId) {
        for b in self.boundary(id) {
            if let Some(c) = self.cells.get_mut(&b) {
                c.spatial_star.remove(&id);
                c.temporal_star_before.remove(&id);
                c.temporal_star_after.remove(&id);
            }
        }
    }

    /// Recomputes every star from the boundaries. Used after loading.
    pub(crate) fn rebuild_stars(&mut self) {
        for c in self.cells.values_mut() {
            c.spatial_star.clear();
            c.temporal_star_before.clear();
            c.temporal_star_after.clear();
        }
        let ids: Vec<CellId> = self.cells.keys().copied().collect();
        for id in ids {
            self.add_to_star_of_boundary(id);
        }
    }

    // --------------------------------------------------------------------
    // Boundary updates
    // --------------------------------------------------------------------

    /// Applies `f` to the payload of `id`, keeping stars in sync and
    /// dropping cached geometry.
    pub(crate) fn modify_boundary(&mut self, id: CellId, f: impl FnOnce(&Vac, &mut CellData)) {
        let Some(mut data) = self.cell(id).map(|c| c.data.clone()) else {
            return;
        };
        self.remove_from_star_of_boundary(id);
        f(self, &mut data);
        if let Some(c) = self.cells.get_mut(&id) {
            c.data = data;
            c.clear_cache();
        }
        self.add_to_star_of_boundary(id);
    }

    /// In the boundary of `id`, replaces halfedge `old` by `new`.
    pub(crate) fn update_boundary_halfedge(&mut self, id: CellId, old: KeyHalfedge, new: KeyHalfedge) {
        self.modify_boundary(id, |_, data| match data {
            CellData::KeyFace(f) => {
                for c in &mut f.cycles {
                    c.replace_halfedge(old, new);
                }
            }
            CellData::InbetweenEdge(InbetweenEdgeData::Open {
                before_path,
                after_path,
                ..
            }) => {
                before_path.replace_halfedge(old, new);
                after_path.replace_halfedge(old, new);
            }
            CellData::InbetweenEdge(InbetweenEdgeData::Closed {
                before_cycle,
                after_cycle,
            }) => {
                before_cycle.replace_halfedge(old, new);
                after_cycle.replace_halfedge(old, new);
            }
            CellData::InbetweenFace(f) => {
                for c in &mut f.cycles {
                    c.replace_halfedge(old.edge, old.side, new.edge, new.side);
                }
            }
            _ => {}
        });
    }

    /// In the boundary of `id`, replaces key edge `old` by the chain
    /// `new_edges`, which goes from the start to the end vertex of `old`.
    pub(crate) fn update_boundary_edges(&mut self, id: CellId, old: CellId, new_edges: &[CellId]) {
        self.modify_boundary(id, |vac, data| match data {
            CellData::KeyFace(f) => {
                for c in &mut f.cycles {
                    c.replace_edges(old, new_edges);
                }
            }
            CellData::InbetweenEdge(InbetweenEdgeData::Open {
                before_path,
                after_path,
                ..
            }) => {
                before_path.replace_edges(old, new_edges);
                after_path.replace_edges(old, new_edges);
            }
            CellData::InbetweenEdge(InbetweenEdgeData::Closed {
                before_cycle,
                after_cycle,
            }) => {
                before_cycle.replace_edges(old, new_edges);
                after_cycle.replace_edges(old, new_edges);
            }
            CellData::InbetweenFace(f) => {
                for c in &mut f.cycles {
                    c.replace_edges(vac, old, new_edges);
                }
            }
            _ => {}
        });
    }
}

/// Rewrites every id stored in `data` through `map`.
pub(crate) fn remap_data(data: &mut CellData, map: &FxHashMap<CellId, CellId>) {
    let m = |c: &mut CellId| {
        if let Some(n) = map.get(c) {
            *c = *n;
        }
    };
    match data {
        CellData::KeyVertex(_) => {}
        CellData::KeyEdge(e) => {
            if let Some(s) = e.start.as_mut() {
                m(s);
            }
            if let Some(s) = e.end.as_mut() {
                m(s);
            }
        }
        CellData::KeyFace(f) => {
            for c in &mut f.cycles {
                c.remap(map);
            }
        }
        CellData::InbetweenVertex(v) => {
            m(&mut v.before);
            m(&mut v.after);
        }
        CellData::InbetweenEdge(InbetweenEdgeData::Open {
            before_path,
            after_path,
            start,
            end,
        }) => {
            before_path.remap(map);
            after_path.remap(map);
            start.remap(map);
            end.remap(map);
        }
        CellData::InbetweenEdge(InbetweenEdgeData::Closed {
            before_cycle,
            after_cycle,
        }) => {
            before_cycle.remap(map);
            after_cycle.remap(map);
        }
        CellData::InbetweenFace(f) => {
            for c in &mut f.cycles {
                c.remap(map);
            }
            f.before_faces = f.before_faces.iter().map(|c| *map.get(c).unwrap_or(c)).collect();
            f.after_faces = f.after_faces.iter().map(|c| *map.get(c).unwrap_or(c)).collect();
        }
    }
}

/// Every id stored in `data`, whether or not it resolves.
pub(crate) fn referenced_ids(data: &CellData) -> CellSet {
    let mut res = CellSet::new();
    match data {
        CellData::KeyVertex(_) => {}
        CellData::KeyEdge(e) => {
            res.extend(e.start);
            res.extend(e.end);
        }
        CellData::KeyFace(f) => {
            for c in &f.cycles {
                res.extend(c.referenced_ids());
            }
        }
        CellData::InbetweenVertex(v) => {
            res.insert(v.before);
            res.insert(v.after);
        }
        CellData::InbetweenEdge(InbetweenEdgeData::Open {
            before_path,
            after_path,
            start,
            end,
        }) => {
            res.extend(before_path.referenced_ids());
            res.extend(after_path.referenced_ids());
            res.extend(start.inbetween_vertices().iter().copied());
            res.extend(end.inbetween_vertices().iter().copied());
        }
        CellData::InbetweenEdge(InbetweenEdgeData::Closed {
            before_cycle,
            after_cycle,
        }) => {
            res.extend(before_cycle.referenced_ids());
            res.extend(after_cycle.referenced_ids());
        }
        CellData::InbetweenFace(f) => {
            for c in &f.cycles {
                res.extend(c.cells());
            }
            res.extend(f.before_faces.iter().copied());
            res.extend(f.after_faces.iter().copied());
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector2;

    use super::*;
    use crate::cycle::Cycle;

    fn triangle(vac: &mut Vac) -> (Vec<CellId>, Vec<CellId>, CellId) {
        let t = Time::frame(0);
        let v = vec![
            vac.new_key_vertex(t, Vector2::new(0.0, 0.0)),
            vac.new_key_vertex(t, Vector2::new(100.0, 0.0)),
            vac.new_key_vertex(t, Vector2::new(0.0, 100.0)),
        ];
        let e = vec![
            vac.new_key_edge(v[0], v[1]).unwrap(),
            vac.new_key_edge(v[1], v[2]).unwrap(),
            vac.new_key_edge(v[2], v[0]).unwrap(),
        ];
        let cycle = Cycle::from_halfedges(
            vac,
            e.iter().map(|e| KeyHalfedge::new(*e, true)).collect(),
        );
        let f = vac.new_key_face_with_cycle(cycle).unwrap();
        (v, e, f)
    }

    #[test]
    fn stars_mirror_boundaries() {
        let mut vac = Vac::new();
        let (v, e, f) = triangle(&mut vac);
        assert_eq!(vac.spatial_boundary(e[0]), [v[0], v[1]].into_iter().collect());
        assert!(vac.spatial_star(v[0]).contains(&f));
        assert_eq!(vac.spatial_boundary(f).len(), 6);
        for id in vac.cell_ids() {
            for b in vac.spatial_boundary(id) {
                assert!(vac.spatial_star(b).contains(&id));
            }
        }
    }

    #[test]
    fn closure_and_fullstar() {
        let mut vac = Vac::new();
        let (v, e, f) = triangle(&mut vac);
        let closure = vac.closure(&[e[0]].into_iter().collect());
        assert_eq!(closure, [e[0], v[0], v[1]].into_iter().collect());
        let star = vac.fullstar(&[v[2]].into_iter().collect());
        assert_eq!(star, [v[2], e[1], e[2], f].into_iter().collect());
        assert_eq!(vac.connected(&[v[0]].into_iter().collect()).len(), 7);
    }

    #[test]
    fn inbetween_domain_is_open() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(4), Vector2::new(4.0, 0.0));
        let ab = vac.new_inbetween_vertex(a, b).unwrap();
        assert!(!vac.exists(ab, Time::frame(0)));
        assert!(vac.exists(ab, Time::frame(2)));
        assert!(vac.exists(ab, Time::from_float(3.5)));
        assert!(!vac.exists(ab, Time::frame(4)));
        assert!(vac.is_after(ab, Time::frame(0)));
        assert!(vac.is_before(ab, Time::frame(4)));
        assert!(vac.is_at(a, Time::frame(0)));
        assert!(!vac.is_at(ab, Time::frame(2)));
        assert!(vac.temporal_star_after(a).contains(&ab));
        assert!(vac.temporal_star_before(b).contains(&ab));
    }

    #[test]
    fn retarget_keeps_stars_in_sync() {
        let mut vac = Vac::new();
        let (v, e, _) = triangle(&mut vac);
        let w = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        vac.modify_boundary(e[0], |_, data| {
            if let CellData::KeyEdge(d) = data {
                d.start = Some(w);
            }
        });
        assert!(!vac.spatial_star(v[0]).contains(&e[0]));
        assert!(vac.spatial_star(w).contains(&e[0]));
        assert_eq!(vac.key_edge(e[0]).and_then(|d| d.start_vertex()), Some(w));
    }
}
