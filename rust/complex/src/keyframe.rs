// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keyframing: an inbetween cell alive at `t` becomes a key cell at `t`
//! between two shorter inbetween cells.
//!
//! The boundary of the cell is keyframed first, so that every cell alive at
//! `t` in the boundary of a keyframed cell is a key cell. Cells in the star
//! are rewired to the three new cells before the old one is deleted.

use vac_lite_geometry::{Curve, LinearSpline};

use crate::animated_vertex::AnimatedVertex;
use crate::cell::{CellData, InbetweenEdgeData, KeyFaceData};
use crate::cycle::Cycle;
use crate::halfedge::KeyHalfedge;
use crate::keys::{CellId, CellSet, CellType};
use crate::path::Path;
use crate::time::Time;
use crate::vac::Vac;

/// Hover and selection state of a cell about to be replaced by a keyframe.
struct KeyframeState {
    hovered: bool,
    selected: bool,
}

impl KeyframeState {
    fn of(vac: &Vac, id: CellId) -> Self {
        Self {
            hovered: vac.hovered_cell() == Some(id),
            selected: vac.is_selected(id),
        }
    }

    fn transfer(self, vac: &mut Vac, keyframe: CellId) {
        if self.hovered {
            vac.set_hovered_cell(keyframe);
        }
        if self.selected {
            vac.add_to_selection(keyframe, false);
        }
    }
}

impl Vac {
    /// Keyframes every inbetween cell of `cells` alive at `t`: vertices,
    /// then edges, then faces. Returns the new key cells.
    pub fn keyframe_cells(&mut self, cells: &CellSet, t: Time) -> CellSet {
        let alive: CellSet = cells
            .iter()
            .copied()
            .filter(|c| self.cell(*c).map_or(false, |c| !c.is_key()) && self.exists(*c, t))
            .collect();
        let mut res = CellSet::new();
        for kind in [CellType::InbetweenVertex, CellType::InbetweenEdge, CellType::InbetweenFace] {
            let ids: Vec<CellId> = alive
                .iter()
                .copied()
                .filter(|c| self.cell_type(*c) == Some(kind))
                .collect();
            for id in ids {
                let keyframe = match kind {
                    CellType::InbetweenVertex => self.keyframe_vertex(id, t),
                    CellType::InbetweenEdge => self.keyframe_edge(id, t),
                    _ => self.keyframe_face(id, t),
                };
                res.extend(keyframe);
            }
        }
        res
    }

    /// Keyframes the selected inbetween cells at `t`.
    pub fn keyframe_selection(&mut self, t: Time) -> CellSet {
        let cells = self.selection.clone();
        let res = self.operate("keyframe", |vac| vac.keyframe_cells(&cells, t));
        self.deselect_all();
        self.emit_edit_done();
        res
    }

    /// Splits inbetween vertex `sv` at `t`. The inbetween edges and faces
    /// using it now go through the new key vertex.
    pub fn keyframe_vertex(&mut self, sv: CellId, t: Time) -> Option<CellId> {
        let data = *self.inbetween_vertex(sv)?;
        if !self.exists(sv, t) {
            return None;
        }
        let state = KeyframeState::of(self, sv);
        let color = self.cell(sv)?.color;

        let pos = self.vertex_pos(sv, t);
        let kv = self.new_key_vertex(t, pos);
        let sv1 = self.new_inbetween_vertex(data.before, kv).ok()?;
        let sv2 = self.new_inbetween_vertex(kv, data.after).ok()?;
        for c in [kv, sv1, sv2] {
            self.set_color(c, color);
        }

        for s in self.spatial_star(sv) {
            self.modify_boundary(s, |_, data| match data {
                CellData::InbetweenEdge(InbetweenEdgeData::Open { start, end, .. }) => {
                    start.replace_cells(sv, sv1, sv2);
                    end.replace_cells(sv, sv1, sv2);
                }
                CellData::InbetweenFace(fd) => {
                    for cycle in &mut fd.cycles {
                        cycle.replace_inbetween_vertex(sv, sv1, kv, sv2);
                    }
                }
                _ => {}
            });
        }

        self.delete_cell(sv);
        state.transfer(self, kv);
        tracing::debug!(inbetween = %sv, keyframe = %kv, time = %t, "vertex keyframed");
        Some(kv)
    }

    /// Key vertex at `t` of an animated vertex, keyframing its inbetween
    /// vertex alive at `t` if needed.
    fn keyframe_animated_vertex(&mut self, av: &AnimatedVertex, t: Time) -> Option<CellId> {
        let v = self.animated_vertex_cells(av).into_iter().find(|v| self.exists(*v, t))?;
        match self.cell_type(v)? {
            CellType::KeyVertex => Some(v),
            _ => self.keyframe_vertex(v, t),
        }
    }

    /// Every vertex cell an animated vertex goes through, extremities
    /// included.
    fn animated_vertex_cells(&self, av: &AnimatedVertex) -> CellSet {
        let mut res = av.vertices(self);
        res.extend(av.before_vertex(self));
        res.extend(av.after_vertex(self));
        res
    }

    /// Splits inbetween edge `se` at `t`, keyframing its end vertices
    /// first.
    pub fn keyframe_edge(&mut self, se: CellId, t: Time) -> Option<CellId> {
        if !self.exists(se, t) {
            return None;
        }
        let state = KeyframeState::of(self, se);
        let color = self.cell(se)?.color;

        if let InbetweenEdgeData::Open { start, end, .. } = self.inbetween_edge(se)?.clone() {
            self.keyframe_animated_vertex(&start, t)?;
            self.keyframe_animated_vertex(&end, t)?;
        }

        let data = self.inbetween_edge(se)?.clone();
        let samples = self.inbetween_edge_sampling(se, t);
        let closed = data.is_closed();
        let geometry = LinearSpline::from_curve(Curve::from_vertices(samples, self.settings.ds), closed);

        let (ke, se1, se2) = match data {
            InbetweenEdgeData::Closed {
                before_cycle,
                after_cycle,
            } => {
                let ke = self.new_closed_key_edge(t, geometry);
                let cycle = Cycle::from_halfedges(self, vec![KeyHalfedge::new(ke, true)]);
                let se1 = self.new_closed_inbetween_edge(before_cycle, cycle.clone()).ok()?;
                let se2 = self.new_closed_inbetween_edge(cycle, after_cycle).ok()?;
                (ke, se1, se2)
            }
            InbetweenEdgeData::Open {
                before_path,
                after_path,
                start,
                end,
            } => {
                let (Some(kv_start), Some(kv_end)) = (
                    self.key_vertex_at(&start, t),
                    self.key_vertex_at(&end, t),
                ) else {
                    tracing::warn!(edge = %se, time = %t, "keyframe aborted: end vertices not keyframed");
                    return None;
                };
                let ke = self.new_key_edge_with_geometry(kv_start, kv_end, geometry).ok()?;
                let (start1, start2) = self.split_animated_vertex(&start, t);
                let (end1, end2) = self.split_animated_vertex(&end, t);
                let path = Path::from_halfedges(self, vec![KeyHalfedge::new(ke, true)]);
                let se1 = self.new_inbetween_edge(before_path, path.clone(), start1, end1).ok()?;
                let se2 = self.new_inbetween_edge(path, after_path, start2, end2).ok()?;
                (ke, se1, se2)
            }
        };
        for c in [ke, se1, se2] {
            self.set_color(c, color);
        }

        for f in self.spatial_star(se) {
            self.modify_boundary(f, |vac, data| {
                if let CellData::InbetweenFace(fd) = data {
                    for cycle in &mut fd.cycles {
                        cycle.replace_inbetween_edge(vac, se, se1, ke, se2, t);
                    }
                }
            });
        }

        self.delete_cell(se);
        state.transfer(self, ke);
        tracing::debug!(inbetween = %se, keyframe = %ke, time = %t, "edge keyframed");
        Some(ke)
    }

    /// The key vertex at `t` in an animated vertex.
    fn key_vertex_at(&self, av: &AnimatedVertex, t: Time) -> Option<CellId> {
        self.animated_vertex_cells(av)
            .into_iter()
            .find(|v| self.cell_type(*v) == Some(CellType::KeyVertex) && self.exists(*v, t))
    }

    /// Inbetween vertices of `av` starting before `t`, and the others.
    fn split_animated_vertex(&self, av: &AnimatedVertex, t: Time) -> (AnimatedVertex, AnimatedVertex) {
        let (before, after): (Vec<CellId>, Vec<CellId>) =
            av.inbetween_vertices().iter().partition(|sv| {
                self.inbetween_vertex(**sv)
                    .and_then(|d| self.key_vertex(d.before_vertex()))
                    .map_or(false, |kv| kv.time() < t)
            });
        (AnimatedVertex::new(before), AnimatedVertex::new(after))
    }

    /// Splits inbetween face `sf` at `t`, keyframing the inbetween vertices
    /// and edges of its cycles first.
    pub fn keyframe_face(&mut self, sf: CellId, t: Time) -> Option<CellId> {
        if self.inbetween_face(sf).is_none() || !self.exists(sf, t) {
            return None;
        }
        let state = KeyframeState::of(self, sf);
        let color = self.cell(sf)?.color;

        let n = self.inbetween_face(sf)?.cycles.len();
        for i in 0..n {
            for kind in [CellType::InbetweenVertex, CellType::InbetweenEdge] {
                let cells: Vec<CellId> = self
                    .inbetween_face(sf)
                    .and_then(|d| d.cycles.get(i))
                    .map(|c| c.cells())
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|c| self.cell_type(*c) == Some(kind) && self.exists(*c, t))
                    .collect();
                for c in cells {
                    if kind == CellType::InbetweenVertex {
                        self.keyframe_vertex(c, t);
                    } else {
                        self.keyframe_edge(c, t);
                    }
                }
            }
        }

        let data = self.inbetween_face(sf)?.clone();
        let mut key_cycles = Vec::with_capacity(n);
        let mut before_cycles = Vec::with_capacity(n);
        let mut after_cycles = Vec::with_capacity(n);
        for cycle in &data.cycles {
            let (before, after) = cycle.split_at(self, t);
            before_cycles.push(before);
            after_cycles.push(after);
            match cycle.key_cycle_at(self, t) {
                Some(c) if c.is_valid() => key_cycles.push(c),
                _ => {
                    tracing::warn!(face = %sf, time = %t, "keyframe aborted: no key cycle at time");
                    return None;
                }
            }
        }

        let kf = self.insert_cell(
            CellData::KeyFace(KeyFaceData {
                time: t,
                cycles: key_cycles,
            }),
            color,
        );
        let kf_set: CellSet = [kf].into_iter().collect();
        let sf1 = self
            .new_inbetween_face(before_cycles, data.before_faces.clone(), kf_set.clone())
            .ok()?;
        let sf2 = self
            .new_inbetween_face(after_cycles, kf_set, data.after_faces.clone())
            .ok()?;
        self.set_color(sf1, color);
        self.set_color(sf2, color);

        self.delete_cell(sf);
        state.transfer(self, kf);
        tracing::debug!(inbetween = %sf, keyframe = %kf, time = %t, "face keyframed");
        Some(kf)
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector2;

    use super::*;

    #[test]
    fn vertex_keyframe_splits_in_three() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(10), Vector2::new(100.0, 0.0));
        let sv = vac.new_inbetween_vertex(a, b).unwrap();
        vac.select(sv);

        let kv = vac.keyframe_vertex(sv, Time::frame(5)).unwrap();
        assert!(!vac.contains(sv));
        assert_eq!(vac.len(), 5);
        approx::assert_relative_eq!(vac.key_vertex(kv).unwrap().pos().x, 50.0, epsilon = 1e-9);
        assert!(vac.is_selected(kv));
        assert_eq!(vac.temporal_star_after(a).len(), 1);
        assert_eq!(vac.temporal_star_before(b).len(), 1);
        assert!(vac.check());
    }

    #[test]
    fn keyframing_outside_lifetime_does_nothing() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(10), Vector2::new(0.0, 0.0));
        let sv = vac.new_inbetween_vertex(a, b).unwrap();
        assert!(vac.keyframe_vertex(sv, Time::frame(10)).is_none());
        assert!(vac.keyframe_cells(&[a, sv].into_iter().collect(), Time::frame(12)).is_empty());
        assert_eq!(vac.len(), 3);
    }

    #[test]
    fn edge_keyframe_keyframes_its_vertices() {
        let mut vac = Vac::new();
        let (t0, t1) = (Time::frame(0), Time::frame(10));
        let a0 = vac.new_key_vertex(t0, Vector2::new(0.0, 0.0));
        let b0 = vac.new_key_vertex(t0, Vector2::new(100.0, 0.0));
        let a1 = vac.new_key_vertex(t1, Vector2::new(0.0, 20.0));
        let b1 = vac.new_key_vertex(t1, Vector2::new(100.0, 20.0));
        let e0 = vac.new_key_edge(a0, b0).unwrap();
        let e1 = vac.new_key_edge(a1, b1).unwrap();
        let se = vac.inbetween_edges(e0, e1).unwrap();

        let t = Time::frame(5);
        let ke = vac.keyframe_edge(se, t).unwrap();
        let d = vac.key_edge(ke).unwrap();
        assert_eq!(d.time(), t);
        let start = vac.key_vertex(d.start_vertex().unwrap()).unwrap();
        approx::assert_relative_eq!(start.pos().y, 10.0, epsilon = 1e-9);
        // 4 key vertices + 2 keyframed, 3 key edges, 4 inbetween vertices,
        // 2 inbetween edges
        assert_eq!(vac.len(), 15);
        assert!(vac.check());
    }
}
