// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cutting operators: splitting a face along an edge, inserting Steiner
//! vertices, and splitting edges at vertices.
//!
//! Choosing where to cut a face is heuristic. When an end vertex of the
//! cutting edge is used several times by the face boundary, the last use
//! wins. When the edge joins two different cycles, the second cycle is
//! traversed backwards unless the turning numbers of both cycles have
//! opposite signs. Neither rule looks at geometry, so some inputs produce
//! a valid but unexpected boundary.

use nalgebra::Vector2;
use vac_lite_geometry::LinearSpline;

use crate::cell::{CellData, KeyFaceData};
use crate::cycle::{Cycle, CycleType};
use crate::halfedge::KeyHalfedge;
use crate::keys::{CellId, CellSet, CellType};
use crate::vac::Vac;

/// Arclength margin under which an open edge is not split near its ends.
const SPLIT_EPSILON: f64 = 1e-2;

/// Cells created and deleted by [`Vac::cut_face_with_feedback`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CutFaceFeedback {
    pub new_faces: CellSet,
    pub deleted_faces: CellSet,
}

/// Result of [`Vac::cut_edge_at_vertices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitInfo {
    /// The split edge, deleted on return.
    pub old_edge: CellId,
    pub new_vertices: Vec<CellId>,
    /// New edges in the order of the original edge.
    pub new_edges: Vec<CellId>,
}

/// Where an end vertex of the cutting edge is used: cycle index, then
/// index of the halfedge starting at it (0 for a Steiner vertex).
type Use = (usize, usize);

impl Vac {
    /// Cuts `face` along `edge`, whose end vertices must both lie on the
    /// boundary of the face. Returns `false`, leaving the complex untouched,
    /// when they do not.
    pub fn cut_face(&mut self, face: CellId, edge: CellId) -> bool {
        self.cut_face_with_feedback(face, edge).is_some()
    }

    /// Same as [`Vac::cut_face`], reporting the faces created and deleted.
    pub fn cut_face_with_feedback(&mut self, face: CellId, edge: CellId) -> Option<CutFaceFeedback> {
        let f = self.key_face(face)?;
        let e = self.key_edge(edge)?;
        let (Some(v_start), Some(v_end)) = (e.start, e.end) else {
            tracing::debug!(face = %face, edge = %edge, "cut face: closed edges cannot cut");
            return None;
        };
        if e.time != f.time {
            tracing::debug!(face = %face, edge = %edge, "cut face: edge and face times differ");
            return None;
        }
        let cycles = f.cycles.clone();

        let mut start_use: Option<Use> = None;
        let mut end_use: Option<Use> = None;
        for (i, cycle) in cycles.iter().enumerate() {
            match cycle.cycle_type(self) {
                CycleType::SingleVertex => {
                    if cycle.single_vertex() == Some(v_start) {
                        start_use = Some((i, 0));
                    }
                    if cycle.single_vertex() == Some(v_end) {
                        end_use = Some((i, 0));
                    }
                }
                CycleType::OpenHalfedgeList => {
                    for (j, h) in cycle.halfedges().iter().enumerate() {
                        let v = h.start_vertex(self);
                        if v == Some(v_start) {
                            start_use = Some((i, j));
                        }
                        if v == Some(v_end) {
                            end_use = Some((i, j));
                        }
                    }
                }
                CycleType::ClosedHalfedge | CycleType::Invalid => {}
            }
        }
        let (Some((i_start, j_start)), Some((i_end, j_end))) = (start_use, end_use) else {
            tracing::debug!(face = %face, edge = %edge, "cut face: end vertices not on face boundary");
            return None;
        };

        let mut feedback = CutFaceFeedback::default();
        if i_start == i_end {
            let old = &cycles[i_start];
            let (mut run1, mut run2) = split_runs(old, j_start, j_end);

            if self.settings.mobius_cut {
                let mut halfedges = run1;
                halfedges.push(KeyHalfedge::new(edge, true));
                halfedges.extend(run2.iter().rev().map(|h| h.opposite()));
                halfedges.push(KeyHalfedge::new(edge, true));
                let i = i_start;
                self.modify_boundary(face, |_, data| {
                    if let CellData::KeyFace(f) = data {
                        f.cycles[i] = Cycle::from_parts(None, halfedges, 0.0);
                    }
                });
                return Some(feedback);
            }

            run1.push(KeyHalfedge::new(edge, true));
            run2.push(KeyHalfedge::new(edge, false));
            let cycle1 = Cycle::from_parts(None, run1, 0.0);
            let cycle2 = Cycle::from_parts(None, run2, 0.0);

            let mut cycles1 = vec![cycle1.clone()];
            let mut cycles2 = vec![cycle2];
            for (k, c) in cycles.iter().enumerate() {
                if k == i_start {
                    continue;
                }
                if self.is_cycle_contained_in_cycles(c, std::slice::from_ref(&cycle1)) {
                    cycles1.push(c.clone());
                } else {
                    cycles2.push(c.clone());
                }
            }

            let time = self.key_face(face).map(|f| f.time).unwrap_or_default();
            let color = self.cell(face).map(|c| c.color).unwrap_or_default();
            let f1 = self.insert_cell(CellData::KeyFace(KeyFaceData { time, cycles: cycles1 }), color);
            let f2 = self.insert_cell(CellData::KeyFace(KeyFaceData { time, cycles: cycles2 }), color);
            self.zordering.move_below(f1, face);
            self.zordering.move_below(f2, face);

            for s in self.temporal_star_before(face) {
                self.modify_boundary(s, |_, data| {
                    if let CellData::InbetweenFace(sf) = data {
                        sf.after_faces.remove(&face);
                        sf.after_faces.insert(f1);
                        sf.after_faces.insert(f2);
                    }
                });
            }
            for s in self.temporal_star_after(face) {
                self.modify_boundary(s, |_, data| {
                    if let CellData::InbetweenFace(sf) = data {
                        sf.before_faces.remove(&face);
                        sf.before_faces.insert(f1);
                        sf.before_faces.insert(f2);
                    }
                });
            }

            self.delete_cell(face);
            feedback.new_faces.extend([f1, f2]);
            feedback.deleted_faces.insert(face);
        } else {
            let start = &cycles[i_start];
            let end = &cycles[i_end];
            let hs = end.halfedges();
            let n_end = hs.len();

            let reverse_end = start.turning_number(self) * end.turning_number(self) >= 0;
            let mut joined = vec![KeyHalfedge::new(edge, true)];
            if reverse_end {
                joined.extend(hs[..j_end].iter().rev().map(|h| h.opposite()));
                joined.extend(hs[j_end..n_end].iter().rev().map(|h| h.opposite()));
            } else {
                joined.extend_from_slice(&hs[j_end..]);
                joined.extend_from_slice(&hs[..j_end]);
            }
            joined.push(KeyHalfedge::new(edge, false));
            let hs = start.halfedges();
            joined.extend_from_slice(&hs[j_start..]);
            joined.extend_from_slice(&hs[..j_start]);

            let mut new_cycles = vec![Cycle::from_parts(None, joined, 0.0)];
            new_cycles.extend(
                cycles
                    .iter()
                    .enumerate()
                    .filter(|(k, _)| *k != i_start && *k != i_end)
                    .map(|(_, c)| c.clone()),
            );
            self.modify_boundary(face, |_, data| {
                if let CellData::KeyFace(f) = data {
                    f.cycles = new_cycles;
                }
            });
        }
        tracing::debug!(face = %face, edge = %edge, new_faces = feedback.new_faces.len(), "face cut");
        Some(feedback)
    }

    /// Adds a Steiner vertex at `(x, y)` to `face`.
    pub fn cut_face_at_vertex(&mut self, face: CellId, x: f64, y: f64) -> Option<CellId> {
        let time = self.key_face(face)?.time;
        let v = self.new_key_vertex(time, Vector2::new(x, y));
        self.modify_boundary(face, |_, data| {
            if let CellData::KeyFace(f) = data {
                f.cycles.push(Cycle::from_vertex(v));
            }
        });
        Some(v)
    }

    /// Splits `edge` at arclength `s` and returns the new vertex. Open edges
    /// are not split within a small margin of their ends.
    pub fn cut_edge_at_vertex(&mut self, edge: CellId, s: f64) -> Option<CellId> {
        let e = self.key_edge(edge)?;
        let l = e.geometry.length();
        let values = if e.is_closed() {
            vec![s, s + l]
        } else if SPLIT_EPSILON < s && s < l - SPLIT_EPSILON {
            vec![0.0, s, l]
        } else {
            return None;
        };
        self.cut_edge_at_vertices(edge, &values)?
            .new_vertices
            .first()
            .copied()
    }

    /// Splits `edge` at the increasing arclengths `values`. For an open
    /// edge the first and last values are expected to be `0` and its
    /// length; for a closed edge the last value is the first one plus the
    /// length. Every cell using the edge is retargeted to the new chain of
    /// edges, then the edge is deleted.
    pub fn cut_edge_at_vertices(&mut self, edge: CellId, values: &[f64]) -> Option<SplitInfo> {
        let e = self.key_edge(edge)?.clone();
        let pieces = e.geometry.curve().split(values);
        if pieces.is_empty() {
            tracing::debug!(edge = %edge, values = values.len(), "cut edge: nothing to split");
            return None;
        }
        let color = self.cell(edge).map(|c| c.color).unwrap_or_default();

        let mut info = SplitInfo {
            old_edge: edge,
            new_vertices: Vec::new(),
            new_edges: Vec::new(),
        };

        let mut start = match e.start {
            Some(v) => v,
            None => {
                let v = self.new_key_vertex(e.time, pieces[0].start().pos());
                info.new_vertices.push(v);
                v
            }
        };
        let first = start;
        let last = pieces.len() - 1;
        for (j, piece) in pieces.into_iter().enumerate() {
            let end = if j < last {
                let v = self.new_key_vertex(e.time, piece.end().pos());
                info.new_vertices.push(v);
                v
            } else {
                e.end.unwrap_or(first)
            };
            let geometry = LinearSpline::from_curve(piece, false);
            let new_edge = self.new_key_edge_with_geometry(start, end, geometry).ok()?;
            self.set_color(new_edge, color);
            info.new_edges.push(new_edge);
            start = end;
        }

        let star = self.star(edge);
        for &c in &star {
            if matches!(
                self.cell_type(c),
                Some(CellType::KeyFace | CellType::InbetweenEdge | CellType::InbetweenFace)
            ) {
                self.update_boundary_edges(c, edge, &info.new_edges);
            }
        }
        self.invalidate_geometry(&star);
        self.delete_cell(edge);
        tracing::debug!(
            edge = %edge,
            new_edges = info.new_edges.len(),
            new_vertices = info.new_vertices.len(),
            "edge split"
        );
        Some(info)
    }
}

/// Splits the halfedges of `cycle` into the run from the `j_end` use to the
/// `j_start` use and the run from `j_start` to `j_end`. With equal indices
/// the first run is the whole cycle, rotated, and the second is empty.
fn split_runs(cycle: &Cycle, j_start: usize, j_end: usize) -> (Vec<KeyHalfedge>, Vec<KeyHalfedge>) {
    let hs = cycle.halfedges();
    let n = hs.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }
    let run = |from: usize, to: usize| {
        let mut res = vec![hs[from]];
        let mut j = (from + 1) % n;
        while j != to {
            res.push(hs[j]);
            j = (j + 1) % n;
        }
        res
    };
    if j_start == j_end {
        (run(j_end, j_start), Vec::new())
    } else {
        (run(j_end, j_start), run(j_start, j_end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Time;

    /// Square a-b-c-d with its face, at frame 0.
    fn square(vac: &mut Vac) -> ([CellId; 4], [CellId; 4], CellId) {
        let t = Time::frame(0);
        let v = [
            vac.new_key_vertex(t, Vector2::new(0.0, 0.0)),
            vac.new_key_vertex(t, Vector2::new(100.0, 0.0)),
            vac.new_key_vertex(t, Vector2::new(100.0, 100.0)),
            vac.new_key_vertex(t, Vector2::new(0.0, 100.0)),
        ];
        let e = [
            vac.new_key_edge(v[0], v[1]).unwrap(),
            vac.new_key_edge(v[1], v[2]).unwrap(),
            vac.new_key_edge(v[2], v[3]).unwrap(),
            vac.new_key_edge(v[3], v[0]).unwrap(),
        ];
        let hs = e.iter().map(|e| KeyHalfedge::new(*e, true)).collect();
        let cycle = Cycle::from_halfedges(vac, hs);
        let f = vac.new_key_face_with_cycle(cycle).unwrap();
        (v, e, f)
    }

    #[test]
    fn diagonal_splits_square_in_two() {
        let mut vac = Vac::new();
        let (v, _, f) = square(&mut vac);
        let diag = vac.new_key_edge(v[0], v[2]).unwrap();
        let fb = vac.cut_face_with_feedback(f, diag).unwrap();
        assert!(!vac.contains(f));
        assert_eq!(fb.new_faces.len(), 2);
        for nf in &fb.new_faces {
            let cycles = vac.key_face(*nf).unwrap().cycles();
            assert_eq!(cycles.len(), 1);
            assert_eq!(cycles[0].len(), 3);
            assert!(vac.check_key_cycle(&cycles[0]));
            assert!(vac.spatial_star(diag).contains(nf));
        }
        assert!(vac.check());
    }

    #[test]
    fn unrelated_edge_does_not_cut() {
        let mut vac = Vac::new();
        let (_, _, f) = square(&mut vac);
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(300.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(300.0, 50.0));
        let e = vac.new_key_edge(a, b).unwrap();
        let before = vac.len();
        assert!(!vac.cut_face(f, e));
        assert!(vac.contains(f));
        assert_eq!(vac.len(), before);
    }

    #[test]
    fn steiner_vertex_joins_outer_cycle() {
        let mut vac = Vac::new();
        let (v, _, f) = square(&mut vac);
        let s = vac.cut_face_at_vertex(f, 50.0, 50.0).unwrap();
        assert_eq!(vac.key_face(f).unwrap().cycles().len(), 2);
        let e = vac.new_key_edge(v[0], s).unwrap();
        assert!(vac.cut_face(f, e));
        // Cycles are joined, the face survives
        let cycles = vac.key_face(f).unwrap().cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 6);
        assert!(vac.check());
    }

    #[test]
    fn mobius_cut_keeps_one_face() {
        let mut vac = Vac::new();
        let (v, _, f) = square(&mut vac);
        let mut settings = vac.settings().clone();
        settings.mobius_cut = true;
        vac.set_settings(settings);
        let diag = vac.new_key_edge(v[1], v[3]).unwrap();
        assert!(vac.cut_face(f, diag));
        let cycles = vac.key_face(f).unwrap().cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 6);
        assert!(vac.spatial_star(diag).contains(&f));
    }

    #[test]
    fn splitting_an_edge_retargets_the_face() {
        let mut vac = Vac::new();
        let (_, e, f) = square(&mut vac);
        let v = vac.cut_edge_at_vertex(e[0], 50.0).unwrap();
        assert!(!vac.contains(e[0]));
        assert_eq!(vac.incident_key_edges(v).len(), 2);
        let cycles = vac.key_face(f).unwrap().cycles();
        assert_eq!(cycles[0].len(), 5);
        assert!(vac.check());

        let before = vac.len();
        assert!(vac.cut_edge_at_vertex(e[1], 0.0).is_none());
        assert_eq!(vac.len(), before);
    }

    #[test]
    fn splitting_a_closed_edge_makes_a_split_loop() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let pts: Vec<Vector2<f64>> = (0..40)
            .map(|i| {
                let a = i as f64 / 40.0 * std::f64::consts::TAU;
                Vector2::new(50.0 * a.cos(), 50.0 * a.sin())
            })
            .collect();
        let e = vac.new_closed_key_edge(t, LinearSpline::from_points(&pts, 2.0));
        let v = vac.cut_edge_at_vertex(e, 10.0).unwrap();
        let edges = vac.incident_key_edges(v);
        assert_eq!(edges.len(), 1);
        assert!(vac.key_edge(edges[0]).unwrap().is_split_loop());
        assert!(vac.check());
    }
}
