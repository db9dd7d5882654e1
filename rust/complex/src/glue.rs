// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gluing identifies two key vertices or two key edges; ungluing splits a
//! cell used several times into one copy per use.

use nalgebra::Vector2;
use rustc_hash::FxHashMap;
use vac_lite_geometry::{Curve, LinearSpline};

use crate::boundary::remap_data;
use crate::cell::CellData;
use crate::halfedge::KeyHalfedge;
use crate::keys::{CellId, CellType};
use crate::vac::Vac;

impl Vac {
    /// Number of times `v` is used: once per Steiner cycle and per halfedge
    /// starting at it in incident key faces, plus once per end of incident
    /// key edges that no face uses.
    pub fn n_uses_vertex(&self, v: CellId) -> usize {
        let mut res = 0;
        for f in self.incident_key_faces(v) {
            let Some(fd) = self.key_face(f) else {
                continue;
            };
            for cycle in &fd.cycles {
                if cycle.single_vertex() == Some(v) {
                    res += 1;
                }
                res += cycle
                    .halfedges()
                    .iter()
                    .filter(|h| h.start_vertex(self) == Some(v))
                    .count();
            }
        }
        for e in self.incident_key_edges(v) {
            if !self.incident_key_faces(e).is_empty() {
                continue;
            }
            let Some(ed) = self.key_edge(e) else {
                continue;
            };
            if ed.start == Some(v) {
                res += 1;
            }
            if ed.end == Some(v) {
                res += 1;
            }
        }
        res
    }

    /// Number of halfedges of incident key faces going along `e`.
    pub fn n_uses_edge(&self, e: CellId) -> usize {
        self.incident_key_faces(e)
            .into_iter()
            .filter_map(|f| self.key_face(f))
            .flat_map(|fd| fd.cycles.iter())
            .map(|c| c.halfedges().iter().filter(|h| h.edge == e).count())
            .sum()
    }

    /// Replaces the key vertices `v1` and `v2` by a new vertex at their
    /// midpoint. Both must live at the same time.
    pub fn glue_vertices(&mut self, v1: CellId, v2: CellId) -> Option<CellId> {
        let (d1, d2) = (self.key_vertex(v1)?, self.key_vertex(v2)?);
        if v1 == v2 {
            return None;
        }
        if d1.time != d2.time {
            tracing::info!(v1 = %v1, v2 = %v2, "glue aborted: vertices do not share the same time");
            return None;
        }
        let (time, pos) = (d1.time, (d1.pos + d2.pos) * 0.5);
        let v3 = self.new_key_vertex(time, pos);

        // Faces reach the vertices through their edges, so the whole star
        // is unregistered before any payload changes.
        let mut star = self.star(v1);
        star.extend(self.star(v2));
        let cells: Vec<CellId> = star.iter().copied().collect();
        let map: FxHashMap<CellId, CellId> = [(v1, v3), (v2, v3)].into_iter().collect();
        self.detach(&cells);
        for c in &cells {
            if let Some(cell) = self.cells.get_mut(c) {
                remap_data(&mut cell.data, &map);
            }
        }
        self.attach(&cells);
        for c in &star {
            if self.cell_type(*c) == Some(CellType::KeyEdge) {
                self.correct_geometry(*c);
            }
        }
        self.invalidate_geometry(&star);

        self.delete_cell(v1);
        self.delete_cell(v2);
        tracing::debug!(v1 = %v1, v2 = %v2, glued = %v3, "vertices glued");
        Some(v3)
    }

    /// Glues two key edges, choosing their relative orientation from the
    /// direction of their midpoints.
    pub fn glue_edges(&mut self, e1: CellId, e2: CellId) -> Option<CellId> {
        let (d1, d2) = (self.key_edge(e1)?, self.key_edge(e2)?);
        if e1 == e2 {
            return None;
        }
        if d1.time != d2.time {
            tracing::info!(e1 = %e1, e2 = %e2, "glue aborted: edges do not share the same time");
            return None;
        }
        if d1.is_closed() != d2.is_closed() {
            tracing::info!(e1 = %e1, e2 = %e2, "glue aborted: cannot glue a closed edge with an open edge");
            return None;
        }
        let side = self.have_same_orientation(e1, e2);
        self.glue_halfedges(KeyHalfedge::new(e1, true), KeyHalfedge::new(e2, side))
    }

    /// Whether the tangents at mid-arclength of two edges point the same
    /// way. Inverted by the `inverse_direction` setting.
    pub(crate) fn have_same_orientation(&self, e1: CellId, e2: CellId) -> bool {
        let der = |e: CellId| {
            self.key_edge(e)
                .map(|d| d.geometry.der(0.5 * d.geometry.length()))
                .unwrap_or_else(Vector2::zeros)
        };
        (der(e1).dot(&der(e2)) > 0.0) != self.settings.inverse_direction
    }

    /// Glues two halfedges of the same kind (both open or both closed) so
    /// that they become the same halfedge. End vertices are glued first.
    pub fn glue_halfedges(&mut self, h1: KeyHalfedge, h2: KeyHalfedge) -> Option<CellId> {
        let (e1, e2) = (h1.edge, h2.edge);
        let closed = self.key_edge(e1)?.is_closed();
        if closed != self.key_edge(e2)?.is_closed() || e1 == e2 {
            return None;
        }
        if !closed {
            let (s1, s2) = (h1.start_vertex(self)?, h2.start_vertex(self)?);
            if s1 != s2 {
                self.glue_vertices(s1, s2)?;
            }
            let (t1, t2) = (h1.end_vertex(self)?, h2.end_vertex(self)?);
            if t1 != t2 {
                self.glue_vertices(t1, t2)?;
            }
        }

        let d1 = self.key_edge(e1)?;
        let d2 = self.key_edge(e2)?;
        let (g1, g2) = (&d1.geometry, &d2.geometry);
        let (l1, l2) = (g1.length(), g2.length());
        let n = (g1.len() + g2.len()) / 2 + 1;
        let samples = (0..=n)
            .map(|i| {
                let u = i as f64 / n as f64;
                let s1 = if h1.side { u * l1 } else { l1 - u * l1 };
                let s2 = if h2.side { u * l2 } else { l2 - u * l2 };
                g1.pos(s1).lerp(0.5, &g2.pos(s2))
            })
            .collect();
        let geometry = LinearSpline::from_curve(Curve::from_vertices(samples, g1.ds()), closed);
        let time = d1.time;
        let color = self
            .cell(e1)
            .map(|c| c.color)
            .unwrap_or_default()
            .lerp(0.5, &self.cell(e2).map(|c| c.color).unwrap_or_default());

        let e3 = if closed {
            self.new_closed_key_edge(time, geometry)
        } else {
            let (s, t) = (h1.start_vertex(self)?, h1.end_vertex(self)?);
            self.new_key_edge_with_geometry(s, t, geometry).ok()?
        };
        self.set_color(e3, color);
        let h3 = KeyHalfedge::new(e3, true);

        let mut star = self.star(e1);
        star.extend(self.star(e2));
        for c in &star {
            self.update_boundary_halfedge(*c, h1, h3);
            self.update_boundary_halfedge(*c, h2, h3);
        }
        self.invalidate_geometry(&star);

        self.delete_cell(e1);
        self.delete_cell(e2);
        tracing::debug!(e1 = %e1, e2 = %e2, glued = %e3, "edges glued");
        Some(e3)
    }

    /// Gives each use of key vertex `v` its own copy, after ungluing its
    /// incident edges. Inbetween cells in its temporal star are deleted.
    /// Returns the copies, or nothing when `v` is used at most once.
    pub fn unglue_vertex(&mut self, v: CellId) -> Vec<CellId> {
        let Some(vd) = self.key_vertex(v) else {
            return Vec::new();
        };
        let (time, pos) = (vd.time, vd.pos);
        if self.n_uses_vertex(v) <= 1 {
            return Vec::new();
        }

        let inbetween = self.temporal_star(v);
        self.delete_cells(&inbetween);
        for e in self.incident_key_edges(v) {
            self.unglue_edge(e);
        }

        let mut copies = Vec::new();
        for f in self.incident_key_faces(v) {
            let Some(mut cycles) = self.key_face(f).map(|d| d.cycles.clone()) else {
                continue;
            };
            self.remove_from_star_of_boundary(f);
            for cycle in &mut cycles {
                if cycle.single_vertex() == Some(v) {
                    let nv = self.new_key_vertex(time, pos);
                    cycle.replace_vertex(v, nv);
                    copies.push(nv);
                }
                let hs = cycle.halfedges().to_vec();
                let n = hs.len();
                for j in 0..n {
                    if hs[j].start_vertex(self) != Some(v) {
                        continue;
                    }
                    let nv = self.new_key_vertex(time, pos);
                    copies.push(nv);
                    let before = hs[(j + n - 1) % n];
                    self.set_edge_vertex(hs[j].edge, hs[j].side, nv);
                    self.set_edge_vertex(before.edge, !before.side, nv);
                }
            }
            if let Some(fd) = self.key_face_mut(f) {
                fd.cycles = cycles;
            }
            self.attach(&[f]);
        }

        for e in self.incident_key_edges(v) {
            if !self.incident_key_faces(e).is_empty() {
                continue;
            }
            let Some(ed) = self.key_edge(e) else {
                continue;
            };
            let (at_start, at_end) = (ed.start == Some(v), ed.end == Some(v));
            if at_start {
                let nv = self.new_key_vertex(time, pos);
                copies.push(nv);
                self.set_edge_vertex(e, true, nv);
            }
            if at_end {
                let nv = self.new_key_vertex(time, pos);
                copies.push(nv);
                self.set_edge_vertex(e, false, nv);
            }
        }

        self.delete_cell(v);
        tracing::debug!(vertex = %v, copies = copies.len(), "vertex unglued");
        copies
    }

    /// Sets the start (or end) vertex of key edge `e`.
    fn set_edge_vertex(&mut self, e: CellId, start: bool, v: CellId) {
        self.modify_boundary(e, |_, data| {
            if let CellData::KeyEdge(d) = data {
                if start {
                    d.start = Some(v);
                } else {
                    d.end = Some(v);
                }
            }
        });
    }

    /// Gives each face use of key edge `e` its own copy of the edge.
    /// Inbetween cells in its temporal star are deleted. Returns the
    /// copies, or nothing when `e` is used at most once.
    pub fn unglue_edge(&mut self, e: CellId) -> Vec<CellId> {
        if self.n_uses_edge(e) <= 1 {
            return Vec::new();
        }
        let Some(ed) = self.key_edge(e).cloned() else {
            return Vec::new();
        };
        let color = self.cell(e).map(|c| c.color).unwrap_or_default();

        let inbetween = self.temporal_star(e);
        self.delete_cells(&inbetween);

        let mut copies = Vec::new();
        for f in self.incident_key_faces(e) {
            let uses = self
                .key_face(f)
                .map(|d| {
                    d.cycles
                        .iter()
                        .map(|c| c.halfedges().iter().filter(|h| h.edge == e).count())
                        .sum::<usize>()
                })
                .unwrap_or(0);
            let mut fresh = Vec::with_capacity(uses);
            for _ in 0..uses {
                let copy = match (ed.start, ed.end) {
                    (Some(s), Some(t)) => self.new_key_edge_with_geometry(s, t, ed.geometry.clone()).ok(),
                    _ => Some(self.new_closed_key_edge(ed.time, ed.geometry.clone())),
                };
                let Some(copy) = copy else {
                    continue;
                };
                self.set_color(copy, color);
                fresh.push(copy);
            }
            copies.extend(fresh.iter().copied());
            let mut fresh = fresh.into_iter();
            self.modify_boundary(f, |_, data| {
                if let CellData::KeyFace(fd) = data {
                    for cycle in &mut fd.cycles {
                        let hs: Vec<KeyHalfedge> = cycle
                            .halfedges()
                            .iter()
                            .map(|h| match (h.edge == e).then(|| fresh.next()).flatten() {
                                Some(copy) => KeyHalfedge::new(copy, h.side),
                                None => *h,
                            })
                            .collect();
                        *cycle = crate::cycle::Cycle::from_parts(cycle.single_vertex(), hs, cycle.s0());
                    }
                }
            });
        }

        self.delete_cell(e);
        tracing::debug!(edge = %e, copies = copies.len(), "edge unglued");
        copies
    }

    /// Glues the two selected key edges, or else the two selected key
    /// vertices.
    pub fn glue(&mut self) -> Option<CellId> {
        let edges = self.selected_of_type(CellType::KeyEdge);
        let vertices = self.selected_of_type(CellType::KeyVertex);
        let res = match (edges.as_slice(), vertices.as_slice()) {
            ([e1, e2], _) => {
                let (e1, e2) = (*e1, *e2);
                self.operate("glue", |vac| vac.glue_edges(e1, e2))
            }
            (_, [v1, v2]) => {
                let (v1, v2) = (*v1, *v2);
                self.operate("glue", |vac| vac.glue_vertices(v1, v2))
            }
            _ => {
                tracing::info!("glue aborted: select either two vertices or two edges");
                return None;
            }
        };
        self.emit_edit_done();
        res
    }

    /// Unglues the selected key edges, then the selected key vertices.
    pub fn unglue(&mut self) {
        let edges = self.selected_of_type(CellType::KeyEdge);
        let vertices = self.selected_of_type(CellType::KeyVertex);
        self.operate("unglue", |vac| {
            for e in edges {
                vac.unglue_edge(e);
            }
            for v in vertices {
                vac.unglue_vertex(v);
            }
        });
        self.emit_edit_done();
    }

    pub(crate) fn selected_of_type(&self, t: CellType) -> Vec<CellId> {
        self.selection
            .iter()
            .copied()
            .filter(|c| self.cell_type(*c) == Some(t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::Cycle;
    use crate::keys::CellSet;
    use crate::time::Time;

    #[test]
    fn glued_vertex_takes_over_star() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(10.0, 0.0));
        let c = vac.new_key_vertex(t, Vector2::new(12.0, 0.0));
        let d = vac.new_key_vertex(t, Vector2::new(20.0, 0.0));
        let e1 = vac.new_key_edge(a, b).unwrap();
        let e2 = vac.new_key_edge(c, d).unwrap();
        let v = vac.glue_vertices(b, c).unwrap();
        assert!(!vac.contains(b) && !vac.contains(c));
        assert_eq!(vac.key_vertex(v).unwrap().pos(), Vector2::new(11.0, 0.0));
        assert_eq!(vac.key_edge(e1).unwrap().end_vertex(), Some(v));
        assert_eq!(vac.key_edge(e2).unwrap().start_vertex(), Some(v));
        let right = vac.key_edge(e1).unwrap().geometry().right_pos2d();
        approx::assert_relative_eq!(right.x, 11.0, epsilon = 1e-9);
        assert!(vac.check());
    }

    fn triangle_face(vac: &mut Vac, points: [(f64, f64); 3]) -> (Vec<CellId>, Vec<CellId>, CellId) {
        let t = Time::frame(0);
        let v: Vec<CellId> = points
            .iter()
            .map(|(x, y)| vac.new_key_vertex(t, Vector2::new(*x, *y)))
            .collect();
        let e: Vec<CellId> = (0..3).map(|i| vac.new_key_edge(v[i], v[(i + 1) % 3]).unwrap()).collect();
        let hs = e.iter().map(|e| KeyHalfedge::new(*e, true)).collect();
        let cycle = Cycle::from_halfedges(vac, hs);
        let f = vac.new_key_face_with_cycle(cycle).unwrap();
        (v, e, f)
    }

    #[test]
    fn glued_corner_keeps_both_faces() {
        let mut vac = Vac::new();
        let (v1, _, f1) = triangle_face(&mut vac, [(0.0, 0.0), (100.0, 0.0), (50.0, 80.0)]);
        let (v2, _, f2) = triangle_face(&mut vac, [(100.0, 0.0), (200.0, 0.0), (150.0, 80.0)]);
        let v = vac.glue_vertices(v1[1], v2[0]).unwrap();

        assert!(vac.contains(f1) && vac.contains(f2));
        assert!(vac.star(v).contains(&f1) && vac.star(v).contains(&f2));
        assert_eq!(vac.n_uses_vertex(v), 2);
        assert!(vac.check());
    }

    #[test]
    fn glued_edges_keep_their_faces() {
        let mut vac = Vac::new();
        let (_, e1, f1) = triangle_face(&mut vac, [(0.0, 0.0), (100.0, 0.0), (50.0, 80.0)]);
        let (_, e2, f2) = triangle_face(&mut vac, [(0.0, 0.0), (100.0, 0.0), (50.0, -80.0)]);
        let e = vac.glue_edges(e1[0], e2[0]).unwrap();

        assert!(vac.contains(f1) && vac.contains(f2));
        assert_eq!(vac.n_uses_edge(e), 2);
        assert_eq!(vac.key_vertices(Time::frame(0)).len(), 4);
        assert!(vac.check());
    }

    #[test]
    fn vertices_at_different_times_are_not_glued() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(1), Vector2::new(0.0, 0.0));
        assert!(vac.glue_vertices(a, b).is_none());
        assert_eq!(vac.len(), 2);
    }

    #[test]
    fn glue_then_unglue_vertex() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(10.0, 0.0));
        let c = vac.new_key_vertex(t, Vector2::new(10.0, 0.0));
        let d = vac.new_key_vertex(t, Vector2::new(20.0, 0.0));
        let e1 = vac.new_key_edge(a, b).unwrap();
        let e2 = vac.new_key_edge(c, d).unwrap();
        let v = vac.glue_vertices(b, c).unwrap();
        assert_eq!(vac.n_uses_vertex(v), 2);

        let copies = vac.unglue_vertex(v);
        assert_eq!(copies.len(), 2);
        assert!(!vac.contains(v));
        let ends: CellSet = [
            vac.key_edge(e1).unwrap().end_vertex().unwrap(),
            vac.key_edge(e2).unwrap().start_vertex().unwrap(),
        ]
        .into_iter()
        .collect();
        assert_eq!(ends, copies.into_iter().collect());
        assert!(vac.check());
    }

    #[test]
    fn glue_edges_follows_orientation() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(100.0, 0.0));
        let c = vac.new_key_vertex(t, Vector2::new(100.0, 2.0));
        let d = vac.new_key_vertex(t, Vector2::new(0.0, 2.0));
        let e1 = vac.new_key_edge(a, b).unwrap();
        // Runs the other way
        let e2 = vac.new_key_edge(c, d).unwrap();
        let e3 = vac.glue_edges(e1, e2).unwrap();
        assert!(!vac.contains(e1) && !vac.contains(e2));
        assert_eq!(vac.key_vertices(t).len(), 2);
        let g = vac.key_edge(e3).unwrap().geometry();
        approx::assert_relative_eq!(g.left_pos2d().x, 0.0, epsilon = 1e-9);
        approx::assert_relative_eq!(g.left_pos2d().y, 1.0, epsilon = 1e-9);
        approx::assert_relative_eq!(g.right_pos2d().x, 100.0, epsilon = 1e-9);
        assert!(vac.check());
    }

    #[test]
    fn unglue_edge_shared_by_two_faces() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let p = [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)];
        let v: Vec<CellId> = p.iter().map(|(x, y)| vac.new_key_vertex(t, Vector2::new(*x, *y))).collect();
        let e: Vec<CellId> = (0..4).map(|i| vac.new_key_edge(v[i], v[(i + 1) % 4]).unwrap()).collect();
        let f = vac
            .new_key_face_with_cycle(Cycle::from_halfedges(
                &vac,
                e.iter().map(|e| KeyHalfedge::new(*e, true)).collect(),
            ))
            .unwrap();
        let diag = vac.new_key_edge(v[0], v[2]).unwrap();
        vac.cut_face(f, diag);
        assert_eq!(vac.n_uses_edge(diag), 2);

        let copies = vac.unglue_edge(diag);
        assert_eq!(copies.len(), 2);
        assert!(!vac.contains(diag));
        for c in copies {
            assert_eq!(vac.n_uses_edge(c), 1);
        }
        assert!(vac.check());
    }
}
