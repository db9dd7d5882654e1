// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inserting a freehand stroke into the complex.
//!
//! In planar map mode the stroke is split where it crosses itself and the
//! existing key edges, the crossed edges are split too, and the resulting
//! pieces cut the faces they run through. Split points closer than the
//! tolerance are merged twice: first along each curve by a mean-clustering
//! sweep over arclengths, then in the plane by grouping nodes whose
//! distance graph is connected. Changing the tolerance changes topology.

use std::collections::VecDeque;

use nalgebra::Vector2;
use vac_lite_geometry::{Curve, EdgeSample, LinearSpline};

use crate::cell::CellData;
use crate::cycle::Cycle;
use crate::halfedge::KeyHalfedge;
use crate::keys::{CellId, CellSet, CellType};
use crate::time::Time;
use crate::vac::Vac;

/// Smallest intersection tolerance used for sketches.
pub const MIN_SKETCH_TOLERANCE: f64 = 1e-2;

/// Faces hovered while a stroke was drawn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SketchFaces {
    pub on_press: Option<CellId>,
    pub on_release: Option<CellId>,
    /// When set, only these faces are cut. Faces created by cutting are
    /// added as they appear.
    pub to_cut: Option<CellSet>,
}

/// Cells created by [`Vac::insert_sketched_edge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SketchResult {
    pub vertices: Vec<CellId>,
    pub edges: Vec<CellId>,
    pub faces: Vec<CellId>,
}

impl SketchResult {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty() && self.faces.is_empty()
    }
}

/// An existing key edge crossed by the stroke.
struct Crossing {
    edge: CellId,
    closed: bool,
    length: f64,
    values: Vec<f64>,
}

/// Split point of the stroke or existing vertex it may merge with.
#[derive(Clone, Copy)]
struct Node {
    pos: Vector2<f64>,
    vertex: Option<CellId>,
}

/// Sorts `dirty` and merges values closer than `tolerance`. The result
/// starts and ends with the curve bounds: `0` and `length` for open curves,
/// the first value and the first value plus `length` for loops.
fn clean_split_values(dirty: &mut [f64], length: f64, closed: bool, tolerance: f64) -> Vec<f64> {
    dirty.sort_by(f64::total_cmp);
    let first = if closed { dirty.first().copied().unwrap_or(0.0) } else { 0.0 };
    let last = if closed { first + length } else { length };

    let mut res = vec![first];
    let mut cluster: Option<(f64, usize)> = None;
    for &s in dirty.iter() {
        if s < first + tolerance {
            continue;
        }
        if s > last - tolerance {
            break;
        }
        cluster = match cluster {
            Some((sum, n)) if s <= sum / n as f64 + tolerance => Some((sum + s, n + 1)),
            Some((sum, n)) => {
                res.push(sum / n as f64);
                Some((s, 1))
            }
            None => Some((s, 1)),
        };
    }
    if let Some((sum, n)) = cluster {
        res.push(sum / n as f64);
    }
    res.push(last);
    res
}

fn push_existing(nodes: &mut Vec<Node>, pos: Vector2<f64>, v: CellId) {
    if !nodes.iter().any(|n| n.vertex == Some(v)) {
        nodes.push(Node { pos, vertex: Some(v) });
    }
}

/// Connected components of the graph linking nodes closer than
/// `tolerance`, each listed in increasing index order.
fn cluster_nodes(nodes: &[Node], tolerance: f64) -> Vec<Vec<usize>> {
    let n = nodes.len();
    let mut component = vec![usize::MAX; n];
    let mut res: Vec<Vec<usize>> = Vec::new();
    for seed in 0..n {
        if component[seed] != usize::MAX {
            continue;
        }
        let k = res.len();
        component[seed] = k;
        let mut members = Vec::new();
        let mut queue = VecDeque::from([seed]);
        while let Some(i) = queue.pop_front() {
            members.push(i);
            for j in 0..n {
                if component[j] == usize::MAX && (nodes[i].pos - nodes[j].pos).norm() < tolerance {
                    component[j] = k;
                    queue.push_back(j);
                }
            }
        }
        members.sort_unstable();
        res.push(members);
    }
    res
}

impl Vac {
    /// Intersection tolerance of sketches under the current settings.
    pub fn sketch_tolerance(&self) -> f64 {
        if self.settings.snap_mode && self.settings.snap_threshold >= MIN_SKETCH_TOLERANCE {
            self.settings.snap_threshold
        } else {
            MIN_SKETCH_TOLERANCE
        }
    }

    /// Inserts `sketch` at time `time` with the tolerance of the current
    /// settings, then emits the edit notifications.
    pub fn sketch_edge(&mut self, sketch: &LinearSpline, time: Time) -> SketchResult {
        let tolerance = self.sketch_tolerance();
        let res = self.operate("sketch edge", |vac| {
            vac.insert_sketched_edge(sketch, time, tolerance, &SketchFaces::default())
        });
        if !res.is_empty() {
            self.emit_edit_done();
        }
        res
    }

    /// Inserts a sketched stroke as key vertices and key edges at `time`.
    ///
    /// Outside planar map mode the stroke only snaps its ends to nearby key
    /// vertices. A stroke whose ends meet and that crosses nothing becomes
    /// a closed edge; if a face was hovered on press, the loop also
    /// becomes a hole in that face, filled by a new face.
    pub fn insert_sketched_edge(
        &mut self,
        sketch: &LinearSpline,
        time: Time,
        tolerance: f64,
        faces: &SketchFaces,
    ) -> SketchResult {
        let mut res = SketchResult::default();
        let curve = sketch.curve().clone();
        if curve.len() < 2 || curve.length() <= tolerance {
            tracing::debug!(samples = curve.len(), "sketch too short, ignored");
            return res;
        }
        let planar = self.settings.planar_map_mode;
        let length = curve.length();

        if planar {
            self.keyframe_crossed_inbetween_edges(&curve, time, tolerance);
        }

        // Split values of the stroke and of every crossed key edge
        let mut dirty_self = vec![0.0, length];
        let mut crossings = Vec::new();
        if planar {
            for i in curve.self_intersections(tolerance) {
                dirty_self.push(i.s);
                dirty_self.push(i.t);
            }
            for e in self.key_edges(time) {
                let Some(d) = self.key_edge(e) else {
                    continue;
                };
                let other = d.geometry.curve();
                let found = curve.intersections(other, tolerance);
                if found.is_empty() {
                    continue;
                }
                dirty_self.extend(found.iter().map(|i| i.s));
                crossings.push(Crossing {
                    edge: e,
                    closed: d.is_closed(),
                    length: other.length(),
                    values: found.iter().map(|i| i.t).collect(),
                });
            }
        }
        let self_values = clean_split_values(&mut dirty_self, length, false, tolerance);
        for c in &mut crossings {
            c.values = clean_split_values(&mut c.values, c.length, c.closed, tolerance);
        }

        // Nodes: split points of the stroke first, then existing vertices
        let mut nodes: Vec<Node> = self_values
            .iter()
            .map(|s| Node {
                pos: curve.pos(*s),
                vertex: None,
            })
            .collect();
        let n_self = nodes.len();
        for c in &crossings {
            let Some(d) = self.key_edge(c.edge) else {
                continue;
            };
            if let (Some(a), Some(b)) = (d.start, d.end) {
                let (pa, pb) = (d.geometry.left_pos2d(), d.geometry.right_pos2d());
                push_existing(&mut nodes, pa, a);
                push_existing(&mut nodes, pb, b);
            }
        }
        let (start, end) = (curve.start().pos(), curve.end().pos());
        for v in self.key_vertices(time) {
            let Some(p) = self.key_vertex(v).map(|d| d.pos()) else {
                continue;
            };
            if (p - start).norm() < tolerance || (p - end).norm() < tolerance {
                push_existing(&mut nodes, p, v);
            }
        }
        for c in &crossings {
            let needs_cut = if c.closed { c.values.len() > 1 } else { c.values.len() > 2 };
            if !needs_cut {
                continue;
            }
            if let Some(info) = self.cut_edge_at_vertices(c.edge, &c.values) {
                for v in info.new_vertices {
                    if let Some(p) = self.key_vertex(v).map(|d| d.pos()) {
                        push_existing(&mut nodes, p, v);
                    }
                }
            }
        }

        let clusters = cluster_nodes(&nodes, tolerance);
        let closed = n_self == 2 && clusters.len() == 1 && clusters[0].len() == 2;
        if closed {
            self.insert_sketched_loop(curve, time, planar, faces, &mut res);
        } else {
            self.insert_sketched_pieces(&curve, &self_values, &nodes, &clusters, time, tolerance, planar, faces, &mut res);
        }
        tracing::debug!(
            vertices = res.vertices.len(),
            edges = res.edges.len(),
            faces = res.faces.len(),
            "sketch inserted"
        );
        res
    }

    /// Keyframes the inbetween edges alive at `time` that the stroke
    /// crosses, so that they can be split.
    fn keyframe_crossed_inbetween_edges(&mut self, curve: &Curve, time: Time, tolerance: f64) {
        let crossed: Vec<CellId> = self
            .edges_at(time)
            .into_iter()
            .filter(|e| self.cell_type(*e) == Some(CellType::InbetweenEdge))
            .filter(|e| {
                let other = Curve::from_vertices(self.inbetween_edge_sampling(*e, time), curve.ds());
                !curve.intersections(&other, tolerance).is_empty()
            })
            .collect();
        for e in crossed {
            if self.contains(e) {
                self.keyframe_edge(e, time);
            }
        }
    }

    fn insert_sketched_loop(
        &mut self,
        mut curve: Curve,
        time: Time,
        planar: bool,
        faces: &SketchFaces,
        res: &mut SketchResult,
    ) {
        let mid = curve.start().lerp(0.5, &curve.end());
        curve.set_end_points(mid, mid);
        let edge = self.new_closed_key_edge(time, LinearSpline::from_curve(curve, true));
        res.edges.push(edge);

        let Some(f) = faces.on_press.filter(|f| self.key_face(*f).is_some_and(|d| d.time == time)) else {
            return;
        };
        if !planar {
            return;
        }
        let hole = Cycle::from_halfedges(self, vec![KeyHalfedge::new(edge, true)]);
        self.modify_boundary(f, |_, data| {
            if let CellData::KeyFace(d) = data {
                d.cycles.push(hole.clone());
            }
        });
        let Ok(inner) = self.new_key_face_with_cycle(hole) else {
            return;
        };
        let color = self.cell(f).map(|c| c.color).unwrap_or_default();
        self.set_color(inner, color);
        res.faces.push(inner);

        for sf in self.temporal_star_before(f) {
            self.modify_boundary(sf, |_, data| {
                if let CellData::InbetweenFace(d) = data {
                    d.after_faces.insert(inner);
                }
            });
        }
        for sf in self.temporal_star_after(f) {
            self.modify_boundary(sf, |_, data| {
                if let CellData::InbetweenFace(d) = data {
                    d.before_faces.insert(inner);
                }
            });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_sketched_pieces(
        &mut self,
        curve: &Curve,
        self_values: &[f64],
        nodes: &[Node],
        clusters: &[Vec<usize>],
        time: Time,
        tolerance: f64,
        planar: bool,
        faces: &SketchFaces,
        res: &mut SketchResult,
    ) {
        let n_self = self_values.len();
        let mut node_vertex: Vec<Option<CellId>> = vec![None; n_self];
        for cluster in clusters {
            let selves: Vec<usize> = cluster.iter().copied().filter(|i| *i < n_self).collect();
            if selves.is_empty() {
                continue;
            }
            let existing = cluster.iter().find_map(|i| nodes[*i].vertex);
            let v = match existing {
                Some(v) => v,
                None => {
                    let mean = selves.iter().map(|i| nodes[*i].pos).sum::<Vector2<f64>>() / selves.len() as f64;
                    let v = self.new_key_vertex(time, mean);
                    res.vertices.push(v);
                    v
                }
            };
            for i in selves {
                node_vertex[i] = Some(v);
            }
        }
        let Some(vertices) = node_vertex.into_iter().collect::<Option<Vec<CellId>>>() else {
            return;
        };

        if planar {
            if let (Some(first), Some(last)) = (vertices.first().copied(), vertices.last().copied()) {
                self.add_steiner_vertex(faces.on_press, first, time);
                if first != last {
                    self.add_steiner_vertex(faces.on_release, last, time);
                }
            }
        }

        let mut to_cut = faces.to_cut.clone();
        let pieces = curve.split(self_values);
        for (i, mut piece) in pieces.into_iter().enumerate() {
            let (Some(&v1), Some(&v2)) = (vertices.get(i), vertices.get(i + 1)) else {
                break;
            };
            let (Some(p1), Some(p2)) = (self.key_vertex(v1).map(|d| d.pos()), self.key_vertex(v2).map(|d| d.pos()))
            else {
                continue;
            };
            let w1 = piece.start().width;
            let w2 = piece.end().width;
            piece.set_end_points(EdgeSample::from_pos(p1, w1), EdgeSample::from_pos(p2, w2));
            if piece.length() <= tolerance {
                continue;
            }
            let Ok(edge) = self.new_key_edge_with_geometry(v1, v2, LinearSpline::from_curve(piece, false)) else {
                continue;
            };
            res.edges.push(edge);

            if !planar {
                continue;
            }
            let common: Vec<CellId> = self
                .spatial_star(v1)
                .intersection(&self.spatial_star(v2))
                .copied()
                .filter(|f| self.cell_type(*f) == Some(CellType::KeyFace))
                .filter(|f| to_cut.as_ref().map_or(true, |set| set.contains(f)))
                .collect();
            if let Some(&face) = common.first() {
                if let Some(feedback) = self.cut_face_with_feedback(face, edge) {
                    if let Some(set) = to_cut.as_mut() {
                        set.retain(|f| !feedback.deleted_faces.contains(f));
                        set.extend(feedback.new_faces.iter().copied());
                    }
                    res.faces.extend(feedback.new_faces.iter().copied());
                }
            }
        }
    }

    /// Adds `v` as a Steiner vertex of `face` unless it already bounds it.
    fn add_steiner_vertex(&mut self, face: Option<CellId>, v: CellId, time: Time) {
        let Some(face) = face.filter(|f| self.key_face(*f).is_some_and(|d| d.time == time)) else {
            return;
        };
        if self.spatial_boundary(face).contains(&v) {
            return;
        }
        self.modify_boundary(face, |_, data| {
            if let CellData::KeyFace(d) = data {
                d.cycles.push(Cycle::from_vertex(v));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(points: &[(f64, f64)]) -> LinearSpline {
        let points: Vec<Vector2<f64>> = points.iter().map(|(x, y)| Vector2::new(*x, *y)).collect();
        let mut s = LinearSpline::from_points(&points, 3.0);
        s.resample_with(2.0);
        s
    }

    fn square_face(vac: &mut Vac, size: f64) -> CellId {
        let t = Time::frame(0);
        let p = [(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)];
        let v: Vec<CellId> = p.iter().map(|(x, y)| vac.new_key_vertex(t, Vector2::new(*x, *y))).collect();
        let edges: CellSet = (0..4).map(|i| vac.new_key_edge(v[i], v[(i + 1) % 4]).unwrap()).collect();
        let cycle = Cycle::from_edge_set(vac, &edges);
        vac.new_key_face_with_cycle(cycle).unwrap()
    }

    #[test]
    fn split_values_merge_within_tolerance() {
        let mut dirty = vec![0.0, 100.0, 40.0, 40.004, 39.998, 70.0, 99.999];
        let clean = clean_split_values(&mut dirty, 100.0, false, 1e-2);
        assert_eq!(clean.len(), 4);
        approx::assert_relative_eq!(clean[1], 40.000666, epsilon = 1e-5);
        approx::assert_relative_eq!(clean[2], 70.0);
        approx::assert_relative_eq!(clean[3], 100.0);

        let mut dirty = vec![30.0, 80.0];
        let clean = clean_split_values(&mut dirty, 100.0, true, 1e-2);
        assert_eq!(clean, vec![30.0, 80.0, 130.0]);
    }

    #[test]
    fn figure_eight_stroke_meets_itself() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let sketch = stroke(&[
            (20.0, 0.0),
            (10.0, 10.0),
            (-10.0, -10.0),
            (-20.0, 0.0),
            (-10.0, 10.0),
            (10.0, -10.0),
            (20.0, 0.0),
        ]);
        let res = vac.insert_sketched_edge(&sketch, t, 1e-2, &SketchFaces::default());
        assert_eq!(res.vertices.len(), 2);
        assert_eq!(res.edges.len(), 3);

        let crossing = res
            .vertices
            .iter()
            .copied()
            .find(|v| vac.key_vertex(*v).unwrap().pos().norm() < 0.1)
            .expect("vertex at the crossing");
        let other = res.vertices.iter().copied().find(|v| *v != crossing).unwrap();

        // One sub-loop is a single edge, the other goes through both vertices
        let ends: Vec<(CellId, CellId)> = res
            .edges
            .iter()
            .map(|e| {
                let d = vac.key_edge(*e).unwrap();
                (d.start.unwrap(), d.end.unwrap())
            })
            .collect();
        assert!(ends.contains(&(crossing, crossing)));
        assert!(ends.contains(&(other, crossing)));
        assert!(ends.contains(&(crossing, other)));
        assert_eq!(vac.incident_key_edges(crossing).len(), 3);
        assert!(vac.check());
    }

    #[test]
    fn crossing_stroke_splits_existing_edge() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(100.0, 0.0));
        let e = vac.new_key_edge(a, b).unwrap();

        let res = vac.insert_sketched_edge(&stroke(&[(50.0, -50.0), (50.0, 50.0)]), t, 1e-2, &SketchFaces::default());
        assert!(!vac.contains(e));
        assert_eq!(res.edges.len(), 2);
        assert_eq!(vac.key_edges(t).len(), 4);
        assert_eq!(vac.key_vertices(t).len(), 5);

        let middle = vac
            .key_vertices(t)
            .into_iter()
            .find(|v| (vac.key_vertex(*v).unwrap().pos() - Vector2::new(50.0, 0.0)).norm() < 0.1)
            .unwrap();
        assert_eq!(vac.incident_key_edges(middle).len(), 4);
        assert!(vac.check());
    }

    #[test]
    fn closed_stroke_inside_face_makes_hole() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let f = square_face(&mut vac, 100.0);
        let circle: Vec<(f64, f64)> = (0..=64)
            .map(|i| {
                let a = std::f64::consts::TAU * (i % 64) as f64 / 64.0;
                (50.0 + 20.0 * a.cos(), 50.0 + 20.0 * a.sin())
            })
            .collect();
        let faces = SketchFaces {
            on_press: Some(f),
            ..Default::default()
        };
        let res = vac.insert_sketched_edge(&stroke(&circle), t, 1e-2, &faces);
        assert!(res.vertices.is_empty());
        assert_eq!(res.edges.len(), 1);
        assert!(vac.is_closed_edge(res.edges[0]));
        assert_eq!(vac.key_face(f).unwrap().cycles().len(), 2);
        assert_eq!(res.faces.len(), 1);
        assert_eq!(vac.key_face(res.faces[0]).unwrap().cycles().len(), 1);
        assert!(vac.check());
    }

    #[test]
    fn stroke_across_face_cuts_it() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        square_face(&mut vac, 100.0);
        let res = vac.insert_sketched_edge(&stroke(&[(-20.0, 50.0), (120.0, 50.0)]), t, 1e-2, &SketchFaces::default());
        assert_eq!(res.edges.len(), 3);
        assert_eq!(vac.key_faces(t).len(), 2);
        assert!(vac.check());
    }

    #[test]
    fn stroke_end_snaps_to_vertex() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let res = vac.insert_sketched_edge(&stroke(&[(50.0, 50.0), (2.0, 2.0)]), t, 5.0, &SketchFaces::default());
        assert_eq!(res.vertices.len(), 1);
        let d = vac.key_edge(res.edges[0]).unwrap();
        assert_eq!(d.end, Some(a));
        approx::assert_relative_eq!(d.geometry.right_pos2d().norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn short_strokes_are_ignored() {
        let mut vac = Vac::new();
        let res = vac.insert_sketched_edge(&stroke(&[(0.0, 0.0), (0.001, 0.0)]), Time::frame(0), 1e-2, &SketchFaces::default());
        assert!(res.is_empty());
        assert!(vac.is_empty());
    }
}
