// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Uncutting: removing a vertex or an edge while merging what it separates.
//!
//! Both operators first decide whether the merge is admissible, without
//! touching the complex, and refuse anything ambiguous.

use vac_lite_geometry::{Curve, LinearSpline};

use crate::cell::CellData;
use crate::cycle::Cycle;
use crate::halfedge::KeyHalfedge;
use crate::keys::{CellId, CellType};
use crate::vac::Vac;

impl Vac {
    /// Key faces in the spatial star of `id`.
    pub(crate) fn incident_key_faces(&self, id: CellId) -> Vec<CellId> {
        self.spatial_star(id)
            .into_iter()
            .filter(|c| self.cell_type(*c) == Some(CellType::KeyFace))
            .collect()
    }

    /// Removes the key vertex `v`, merging its two incident edges into one,
    /// turning its split loop into a closed edge, or dropping it from the
    /// face it is a Steiner vertex of. Returns `false` when none applies.
    pub fn uncut_vertex(&mut self, v: CellId) -> bool {
        if self.key_vertex(v).is_none() {
            return false;
        }
        let edges = self.incident_key_edges(v);
        let faces = self.incident_key_faces(v);

        if edges.is_empty() {
            return self.remove_steiner_vertex(v, &faces);
        }

        let split_loop = match edges.as_slice() {
            [e] => {
                if self.key_edge(*e).map_or(true, |d| !d.is_split_loop()) {
                    tracing::debug!(vertex = %v, "uncut: single incident edge is not a split loop");
                    return false;
                }
                true
            }
            [e1, e2] => {
                if self.key_edge(*e1).map_or(true, |d| d.is_split_loop())
                    || self.key_edge(*e2).map_or(true, |d| d.is_split_loop())
                {
                    tracing::debug!(vertex = %v, "uncut: split loop among two incident edges");
                    return false;
                }
                false
            }
            _ => {
                tracing::debug!(vertex = %v, edges = edges.len(), "uncut: more than two incident edges");
                return false;
            }
        };

        for f in &faces {
            let Some(fd) = self.key_face(*f) else {
                continue;
            };
            for cycle in &fd.cycles {
                if cycle.single_vertex() == Some(v) {
                    tracing::debug!(vertex = %v, face = %f, "uncut: vertex is also a Steiner vertex");
                    return false;
                }
                let hs = cycle.halfedges();
                let n = hs.len();
                for j in 0..n {
                    if hs[j].start_vertex(self) != Some(v) {
                        continue;
                    }
                    if split_loop {
                        if n != 1 {
                            tracing::debug!(vertex = %v, face = %f, "uncut: split loop shares its cycle");
                            return false;
                        }
                    } else if hs[(j + n - 1) % n].edge == hs[j].edge {
                        tracing::debug!(vertex = %v, face = %f, "uncut: cycle switches back at vertex");
                        return false;
                    }
                }
            }
        }

        if split_loop {
            let e = edges[0];
            self.detach(&faces);
            self.modify_boundary(e, |_, data| {
                if let CellData::KeyEdge(d) = data {
                    d.start = None;
                    d.end = None;
                    d.geometry.make_loop();
                }
            });
            self.attach(&faces);
            self.delete_cell(v);
            tracing::debug!(vertex = %v, edge = %e, "split loop uncut into closed edge");
            return true;
        }

        let (e1, e2) = (edges[0], edges[1]);
        let (Some(d1), Some(d2)) = (self.key_edge(e1), self.key_edge(e2)) else {
            return false;
        };
        // h1 -> v -> h2
        let h1 = KeyHalfedge::new(e1, d1.end == Some(v));
        let h2 = KeyHalfedge::new(e2, d2.start == Some(v));
        let mut samples = h1.samples(self);
        samples.extend(h2.samples(self).into_iter().skip(1));
        let ds = d1.geometry.ds();
        let color = self
            .cell(e1)
            .map(|c| c.color)
            .unwrap_or_default()
            .lerp(0.5, &self.cell(e2).map(|c| c.color).unwrap_or_default());
        let (Some(start), Some(end)) = (h1.start_vertex(self), h2.end_vertex(self)) else {
            return false;
        };

        let geometry = LinearSpline::from_curve(Curve::from_vertices(samples, ds), false);
        let Ok(e) = self.new_key_edge_with_geometry(start, end, geometry) else {
            return false;
        };
        self.set_color(e, color);

        for f in &faces {
            self.modify_boundary(*f, |_, data| {
                let CellData::KeyFace(fd) = data else {
                    return;
                };
                for cycle in &mut fd.cycles {
                    if !cycle.halfedges().iter().any(|h| h.edge == e1 || h.edge == e2) {
                        continue;
                    }
                    let merged = cycle
                        .halfedges()
                        .iter()
                        .filter(|h| h.edge != e1)
                        .map(|h| {
                            if h.edge == e2 {
                                KeyHalfedge::new(e, h.side == h2.side)
                            } else {
                                *h
                            }
                        })
                        .collect();
                    *cycle = Cycle::from_parts(None, merged, cycle.s0());
                }
            });
        }
        self.delete_cell(v);
        tracing::debug!(vertex = %v, edge = %e, "vertex uncut, edges merged");
        true
    }

    fn remove_steiner_vertex(&mut self, v: CellId, faces: &[CellId]) -> bool {
        let mut found = None;
        for f in faces {
            let Some(fd) = self.key_face(*f) else {
                continue;
            };
            for (i, cycle) in fd.cycles.iter().enumerate() {
                if cycle.single_vertex() == Some(v) {
                    if found.is_some() {
                        tracing::debug!(vertex = %v, "uncut: Steiner vertex used more than once");
                        return false;
                    }
                    found = Some((*f, i));
                }
            }
        }
        let Some((f, i)) = found else {
            tracing::debug!(vertex = %v, "uncut: isolated vertex");
            return false;
        };
        self.modify_boundary(f, |_, data| {
            if let CellData::KeyFace(fd) = data {
                fd.cycles.remove(i);
            }
        });
        self.delete_cell(v);
        true
    }

    /// Removes the key edge `e` when it is used exactly twice by key faces,
    /// merging the two faces (or the two cycles of one face) it separates.
    pub fn uncut_edge(&mut self, e: CellId) -> bool {
        let Some(ed) = self.key_edge(e) else {
            return false;
        };
        let closed = ed.is_closed();
        let e_start = ed.start;
        let uses = self.n_uses_edge(e);
        if uses != 2 {
            tracing::debug!(edge = %e, uses, "uncut: edge is not used exactly twice");
            return false;
        }
        let faces = self.incident_key_faces(e);
        let cycles_of = |vac: &Vac, f: CellId| -> Vec<Cycle> {
            vac.key_face(f).map(|d| d.cycles.clone()).unwrap_or_default()
        };
        let uses_e = |c: &Cycle| c.single_vertex().is_none() && c.halfedges().iter().any(|h| h.edge == e);

        if closed {
            let mut new_cycles: Vec<Cycle> = Vec::new();
            for f in &faces {
                new_cycles.extend(cycles_of(self, *f).into_iter().filter(|c| !uses_e(c)));
            }
            let f1 = faces[0];
            if let Some(&f2) = faces.get(1) {
                self.merge_face_colors(f1, f2);
                self.delete_cell(f2);
            }
            self.modify_boundary(f1, |_, data| {
                if let CellData::KeyFace(fd) = data {
                    fd.cycles = new_cycles;
                }
            });
            self.delete_cell(e);
            tracing::debug!(edge = %e, face = %f1, "closed edge uncut");
            return true;
        }

        // Collect the halfedge runs left when removing `e`
        let mut new_cycles: Vec<Cycle> = Vec::new();
        let mut runs: Vec<Cycle> = Vec::new();
        for f in &faces {
            for cycle in cycles_of(self, *f) {
                let hs = cycle.halfedges();
                let n = hs.len();
                let at: Vec<usize> = (0..n).filter(|j| hs[*j].edge == e).collect();
                let run = |from: usize, to: usize| -> Option<Cycle> {
                    let mut res = Vec::new();
                    let mut j = (from + 1) % n;
                    while j != to {
                        res.push(hs[j]);
                        j = (j + 1) % n;
                    }
                    if res.is_empty() {
                        // Nothing but `e` between the two ends
                        hs[from].end_vertex(self).or(e_start).map(Cycle::from_vertex)
                    } else {
                        Some(Cycle::from_parts(None, res, 0.0))
                    }
                };
                let pieces = match at.as_slice() {
                    [] => {
                        new_cycles.push(cycle.clone());
                        continue;
                    }
                    [j] => vec![run(*j, *j)],
                    [j1, j2] => vec![run(*j1, *j2), run(*j2, *j1)],
                    _ => return false,
                };
                for piece in pieces {
                    let Some(piece) = piece else {
                        return false;
                    };
                    runs.push(piece);
                }
            }
        }
        let [cycle1, cycle2] = match <[Cycle; 2]>::try_from(runs) {
            Ok(r) => r,
            Err(_) => {
                tracing::debug!(edge = %e, "uncut: could not isolate two boundary runs");
                return false;
            }
        };

        if let Some(s) = cycle1.single_vertex() {
            if cycle2.cells(self).contains(&s) {
                new_cycles.push(cycle2);
            } else {
                new_cycles.push(cycle1);
                new_cycles.push(cycle2);
            }
        } else if let Some(s) = cycle2.single_vertex() {
            if cycle1.cells(self).contains(&s) {
                new_cycles.push(cycle1);
            } else {
                new_cycles.push(cycle2);
                new_cycles.push(cycle1);
            }
        } else {
            let (h1, h2) = (cycle1.halfedges(), cycle2.halfedges());
            let start1 = h1[0].start_vertex(self);
            let end1 = h1[h1.len() - 1].end_vertex(self);
            let start2 = h2[0].start_vertex(self);
            let end2 = h2[h2.len() - 1].end_vertex(self);
            if start1 == end1 && start2 == end2 {
                new_cycles.push(cycle1);
                new_cycles.push(cycle2);
            } else if end1 == start2 && end2 == start1 {
                let mut hs = h1.to_vec();
                hs.extend_from_slice(h2);
                new_cycles.push(Cycle::from_parts(None, hs, 0.0));
            } else if end1 == end2 && start1 == start2 {
                let mut hs = h1.to_vec();
                hs.extend(h2.iter().rev().map(|h| h.opposite()));
                new_cycles.push(Cycle::from_parts(None, hs, 0.0));
            } else {
                tracing::debug!(edge = %e, "uncut: boundary runs cannot be combined");
                return false;
            }
        }

        let f = faces[0];
        if let Some(&f2) = faces.get(1) {
            self.merge_face_colors(f, f2);
            self.delete_cell(f2);
        }
        self.modify_boundary(f, |_, data| {
            if let CellData::KeyFace(fd) = data {
                fd.cycles = new_cycles;
            }
        });
        let boundary = self.boundary(f);
        self.zordering.remove(f);
        self.zordering.insert_cell(f, &boundary);
        self.delete_cell(e);
        tracing::debug!(edge = %e, face = %f, "edge uncut, faces merged");
        true
    }

    fn merge_face_colors(&mut self, f1: CellId, f2: CellId) {
        let c1 = self.cell(f1).map(|c| c.color).unwrap_or_default();
        let c2 = self.cell(f2).map(|c| c.color).unwrap_or_default();
        self.set_color(f1, c1.lerp(0.5, &c2));
    }

    /// Unregisters `cells` from the stars of their current boundary, before
    /// that boundary changes indirectly.
    pub(crate) fn detach(&mut self, cells: &[CellId]) {
        for c in cells {
            self.remove_from_star_of_boundary(*c);
        }
    }

    /// Registers `cells` again after [`Vac::detach`].
    pub(crate) fn attach(&mut self, cells: &[CellId]) {
        for c in cells {
            self.add_to_star_of_boundary(*c);
            if let Some(cell) = self.cell(*c) {
                cell.clear_cache();
            }
        }
    }

    /// Uncuts the selected key edges, then the selected key vertices.
    pub fn uncut(&mut self) -> bool {
        let edges = self.selected_of_type(CellType::KeyEdge);
        let vertices = self.selected_of_type(CellType::KeyVertex);
        let done = self.operate("uncut", |vac| {
            let mut done = false;
            for e in edges {
                done |= vac.uncut_edge(e);
            }
            for v in vertices {
                done |= vac.uncut_vertex(v);
            }
            done
        });
        if done {
            self.deselect_all();
            self.emit_edit_done();
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector2;

    use super::*;
    use crate::cycle::CycleType;
    use crate::time::Time;

    fn polygon(vac: &mut Vac, pts: &[(f64, f64)]) -> (Vec<CellId>, Vec<CellId>, CellId) {
        let t = Time::frame(0);
        let vs: Vec<CellId> = pts
            .iter()
            .map(|(x, y)| vac.new_key_vertex(t, Vector2::new(*x, *y)))
            .collect();
        let n = vs.len();
        let es: Vec<CellId> = (0..n)
            .map(|i| vac.new_key_edge(vs[i], vs[(i + 1) % n]).unwrap())
            .collect();
        let hs = es.iter().map(|e| KeyHalfedge::new(*e, true)).collect();
        let cycle = Cycle::from_halfedges(vac, hs);
        let f = vac.new_key_face_with_cycle(cycle).unwrap();
        (vs, es, f)
    }

    #[test]
    fn cut_then_uncut_restores_face() {
        let mut vac = Vac::new();
        let (vs, es, f) = polygon(&mut vac, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
        let diag = vac.new_key_edge(vs[0], vs[2]).unwrap();
        assert!(vac.cut_face(f, diag));
        assert_eq!(vac.key_faces(Time::frame(0)).len(), 2);

        assert!(vac.uncut_edge(diag));
        assert!(!vac.contains(diag));
        let faces = vac.key_faces(Time::frame(0));
        assert_eq!(faces.len(), 1);
        let face = *faces.iter().next().unwrap();
        let cycles = vac.key_face(face).unwrap().cycles();
        assert_eq!(cycles.len(), 1);
        let used: std::collections::BTreeSet<CellId> = cycles[0].halfedges().iter().map(|h| h.edge).collect();
        assert_eq!(used, es.iter().copied().collect());
        assert!(vac.check());
    }

    #[test]
    fn edge_used_once_is_not_uncut() {
        let mut vac = Vac::new();
        let (_, es, f) = polygon(&mut vac, &[(0.0, 0.0), (100.0, 0.0), (50.0, 80.0)]);
        assert_eq!(vac.n_uses_edge(es[0]), 1);
        assert!(!vac.uncut_edge(es[0]));
        assert!(vac.contains(es[0]) && vac.contains(f));
    }

    #[test]
    fn middle_vertex_merges_edges_in_face() {
        let mut vac = Vac::new();
        let (vs, es, f) = polygon(
            &mut vac,
            &[(0.0, 0.0), (50.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)],
        );
        assert!(vac.uncut_vertex(vs[1]));
        assert!(!vac.contains(vs[1]) && !vac.contains(es[0]) && !vac.contains(es[1]));
        let cycle = &vac.key_face(f).unwrap().cycles()[0];
        assert_eq!(cycle.len(), 4);
        assert!(vac.check_key_cycle(cycle));
        let merged = cycle
            .halfedges()
            .iter()
            .map(|h| h.edge)
            .find(|e| !es.contains(e))
            .unwrap();
        let geometry = vac.key_edge(merged).unwrap().geometry();
        approx::assert_relative_eq!(geometry.length(), 100.0, epsilon = 1e-6);
        assert!(vac.check());
    }

    #[test]
    fn corner_of_three_edges_is_kept() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let c = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        for (x, y) in [(10.0, 0.0), (0.0, 10.0), (-10.0, 0.0)] {
            let o = vac.new_key_vertex(t, Vector2::new(x, y));
            vac.new_key_edge(c, o).unwrap();
        }
        assert!(!vac.uncut_vertex(c));
        assert_eq!(vac.incident_key_edges(c).len(), 3);
    }

    #[test]
    fn steiner_vertex_is_removed() {
        let mut vac = Vac::new();
        let (_, _, f) = polygon(&mut vac, &[(0.0, 0.0), (100.0, 0.0), (50.0, 80.0)]);
        let s = vac.cut_face_at_vertex(f, 50.0, 20.0).unwrap();
        assert!(vac.uncut_vertex(s));
        assert!(!vac.contains(s));
        assert_eq!(vac.key_face(f).unwrap().cycles().len(), 1);
        assert!(vac.check());
    }

    #[test]
    fn split_loop_becomes_closed_edge() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let v = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let pts = [
            Vector2::new(0.0, 0.0),
            Vector2::new(50.0, 0.0),
            Vector2::new(50.0, 50.0),
            Vector2::new(0.0, 0.0),
        ];
        let e = vac
            .new_key_edge_with_geometry(v, v, LinearSpline::from_points(&pts, 2.0))
            .unwrap();
        let f = vac
            .new_key_face_with_cycle(Cycle::from_halfedges(&vac, vec![KeyHalfedge::new(e, true)]))
            .unwrap();
        assert!(vac.uncut_vertex(v));
        assert!(vac.key_edge(e).unwrap().is_closed());
        assert_eq!(
            vac.key_face(f).unwrap().cycles()[0].cycle_type(&vac),
            CycleType::ClosedHalfedge
        );
        assert!(vac.check());
    }
}
