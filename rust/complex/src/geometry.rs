// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry of cells at a given time.
//!
//! Key cells carry their geometry. Inbetween cells interpolate the geometry
//! of their temporal boundary: Hermite interpolation for vertices, linear
//! blending of arclength samplings for edges, per-time animated cycle
//! sampling for faces. Triangulations and outline bounding boxes are cached
//! per cell and per time.

use std::f64::consts::PI;

use nalgebra::Vector2;
use vac_lite_geometry::spline::triangulate_stroke;
use vac_lite_geometry::{point_in_contours, triangulate_contours, BoundingBox, EdgeSample, Triangles};

use crate::cell::{CellData, InbetweenEdgeData};
use crate::cycle::{Cycle, CycleType};
use crate::keys::{CellId, CellSet, SpatialKind};
use crate::path::PathType;
use crate::time::Time;
use crate::vac::Vac;

/// Number of samples used to decide whether a cycle lies inside a face.
const CONTAINMENT_SAMPLES: usize = 100;

/// Segments of the disk drawn for a vertex.
const VERTEX_DISK_SEGMENTS: usize = 12;

impl Vac {
    // --------------------------------------------------------------------
    // Vertices
    // --------------------------------------------------------------------

    /// Position of a vertex cell at `t`. Zero for non-vertex cells.
    pub fn vertex_pos(&self, id: CellId, t: Time) -> Vector2<f64> {
        match self.cell(id).map(|c| &c.data) {
            Some(CellData::KeyVertex(v)) => v.pos,
            Some(CellData::InbetweenVertex(_)) => self.pos_cubic(id, t),
            _ => Vector2::zeros(),
        }
    }

    /// Display size of a vertex cell at `t`.
    pub fn vertex_size(&self, id: CellId, t: Time) -> f64 {
        match self.cell(id).map(|c| &c.data) {
            Some(CellData::KeyVertex(v)) => v.size,
            Some(CellData::InbetweenVertex(iv)) => {
                let s1 = self.key_vertex(iv.before).map_or(0.0, |v| v.size);
                let s2 = self.key_vertex(iv.after).map_or(0.0, |v| v.size);
                let u = self.interval_param(iv.before, iv.after, t);
                s1 + u * (s2 - s1)
            }
            _ => 0.0,
        }
    }

    /// Normalized position of `t` in the interval between two key vertices,
    /// clamped to `[0, 1]`.
    fn interval_param(&self, before: CellId, after: CellId, t: Time) -> f64 {
        let t1 = self.before_time(before).float_time();
        let t2 = self.after_time(after).float_time();
        let dt = t2 - t1;
        if dt > 0.0 {
            ((t.float_time() - t1) / dt).clamp(0.0, 1.0)
        } else if t.float_time() < t1 {
            0.0
        } else {
            1.0
        }
    }

    /// Linear interpolation of an inbetween vertex.
    pub fn pos_linear(&self, id: CellId, t: Time) -> Vector2<f64> {
        let Some(iv) = self.inbetween_vertex(id) else {
            return Vector2::zeros();
        };
        let p1 = self.key_vertex(iv.before).map_or_else(Vector2::zeros, |v| v.pos);
        let p2 = self.key_vertex(iv.after).map_or_else(Vector2::zeros, |v| v.pos);
        let u = self.interval_param(iv.before, iv.after, t);
        p1 + (p2 - p1) * u
    }

    /// Hermite interpolation of an inbetween vertex, with tangents estimated
    /// at its key vertices and scaled by the interval length.
    pub fn pos_cubic(&self, id: CellId, t: Time) -> Vector2<f64> {
        let Some(iv) = self.inbetween_vertex(id) else {
            return Vector2::zeros();
        };
        let p1 = self.key_vertex(iv.before).map_or_else(Vector2::zeros, |v| v.pos);
        let p2 = self.key_vertex(iv.after).map_or_else(Vector2::zeros, |v| v.pos);
        let dt = self.before_time(iv.after).float_time() - self.before_time(iv.before).float_time();
        let m1 = self.key_vertex_tangent(iv.before) * dt;
        let m2 = self.key_vertex_tangent(iv.after) * dt;
        let u = self.interval_param(iv.before, iv.after, t);

        let u2 = u * u;
        let u3 = u2 * u;
        let h00 = 2.0 * u3 - 3.0 * u2 + 1.0;
        let h10 = u3 - 2.0 * u2 + u;
        let h01 = -2.0 * u3 + 3.0 * u2;
        let h11 = u3 - u2;
        p1 * h00 + m1 * h10 + p2 * h01 + m2 * h11
    }

    /// Velocity estimate of a key vertex: mean of the divided differences
    /// towards the key vertices it is linked to by inbetween vertices.
    pub fn key_vertex_tangent(&self, id: CellId) -> Vector2<f64> {
        let Some(cell) = self.cell(id) else {
            return Vector2::zeros();
        };
        let Some(v) = cell.as_key_vertex() else {
            return Vector2::zeros();
        };
        let t = v.time.float_time();
        let mut sum = Vector2::zeros();
        let mut count = 0;
        let neighbours = cell
            .temporal_star_before
            .iter()
            .filter_map(|c| self.inbetween_vertex(*c).map(|iv| iv.before))
            .chain(
                cell.temporal_star_after
                    .iter()
                    .filter_map(|c| self.inbetween_vertex(*c).map(|iv| iv.after)),
            );
        for n in neighbours {
            let Some(other) = self.key_vertex(n) else {
                continue;
            };
            let dt = other.time.float_time() - t;
            if dt.abs() > 0.0 {
                sum += (other.pos - v.pos) / dt;
                count += 1;
            }
        }
        if count == 0 {
            Vector2::zeros()
        } else {
            sum / count as f64
        }
    }

    // --------------------------------------------------------------------
    // Edges
    // --------------------------------------------------------------------

    /// Samples of an edge cell at `t`, start to end.
    pub fn edge_sampling_at(&self, id: CellId, t: Time) -> Vec<EdgeSample> {
        match self.cell(id).map(|c| &c.data) {
            Some(CellData::KeyEdge(e)) => e.geometry.edge_sampling(),
            Some(CellData::InbetweenEdge(_)) => self.inbetween_edge_sampling(id, t),
            _ => Vec::new(),
        }
    }

    /// Whether an edge cell is a loop without end vertices.
    pub fn is_closed_edge(&self, id: CellId) -> bool {
        match self.cell(id).map(|c| &c.data) {
            Some(CellData::KeyEdge(e)) => e.is_closed(),
            Some(CellData::InbetweenEdge(e)) => e.is_closed(),
            _ => false,
        }
    }

    /// Interpolated samples of an inbetween edge at `t`.
    pub fn inbetween_edge_sampling(&self, id: CellId, t: Time) -> Vec<EdgeSample> {
        let Some(data) = self.inbetween_edge(id) else {
            return Vec::new();
        };
        let t1 = self.before_time(id).float_time();
        let t2 = self.after_time(id).float_time();
        let u = if t2 > t1 {
            ((t.float_time() - t1) / (t2 - t1)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let ds = self.settings.ds.max(1e-3);

        match data {
            InbetweenEdgeData::Open {
                before_path,
                after_path,
                start,
                end,
            } => {
                let l = before_path.length(self).max(after_path.length(self));
                let n = (l / ds) as usize + 2;
                let mut s1 = before_path.sample_edge_samples(self, n);
                let mut s2 = after_path.sample_edge_samples(self, n);
                if before_path.path_type() == PathType::SingleVertex {
                    copy_widths(&s2, &mut s1);
                }
                if after_path.path_type() == PathType::SingleVertex {
                    copy_widths(&s1, &mut s2);
                }
                let mut res = blend(&s1, &s2, u);
                if res.len() < 2 {
                    return res;
                }

                // Warp so that the ends follow the animated vertices
                let m = res.len() - 1;
                let d_start = start.pos(self, t) - res[0].pos();
                let d_end = end.pos(self, t) - res[m].pos();
                for (i, s) in res.iter_mut().enumerate() {
                    let w = i as f64 / m as f64;
                    let p = s.pos() + d_start * (1.0 - w) + d_end * w;
                    s.set_pos(p);
                }
                res
            }
            InbetweenEdgeData::Closed {
                before_cycle,
                after_cycle,
            } => {
                let l = before_cycle.length(self).max(after_cycle.length(self));
                let n = (l / ds) as usize + 2;
                let mut s1 = before_cycle.sample_edge_samples(self, n);
                let mut s2 = after_cycle.sample_edge_samples(self, n);
                if before_cycle.cycle_type(self) == CycleType::SingleVertex {
                    copy_widths(&s2, &mut s1);
                }
                if after_cycle.cycle_type(self) == CycleType::SingleVertex {
                    copy_widths(&s1, &mut s2);
                }
                blend(&s1, &s2, u)
            }
        }
    }

    // --------------------------------------------------------------------
    // Faces
    // --------------------------------------------------------------------

    /// Closed polygon of a key cycle, as drawn: edge samplings
    /// concatenated in traversal order without duplicated joints.
    pub fn cycle_contour(&self, cycle: &Cycle) -> Vec<Vector2<f64>> {
        let mut res = Vec::new();
        match cycle.cycle_type(self) {
            CycleType::SingleVertex => {
                if let Some(v) = cycle.single_vertex() {
                    res.push(self.vertex_pos(v, cycle.time(self)));
                }
            }
            CycleType::ClosedHalfedge | CycleType::OpenHalfedgeList => {
                for h in cycle.halfedges() {
                    let samples = h.samples(self);
                    if let Some((_, body)) = samples.split_last() {
                        res.extend(body.iter().map(|s| s.pos()));
                    }
                }
            }
            CycleType::Invalid => {}
        }
        res
    }

    /// Boundary polygons of a face cell at `t`.
    pub fn face_contours(&self, id: CellId, t: Time) -> Vec<Vec<Vector2<f64>>> {
        match self.cell(id).map(|c| &c.data) {
            Some(CellData::KeyFace(f)) => f.cycles.iter().map(|c| self.cycle_contour(c)).collect(),
            Some(CellData::InbetweenFace(f)) => f.cycles.iter().map(|c| c.sample(self, t)).collect(),
            _ => Vec::new(),
        }
    }

    /// Triangulation of a cell at `t`, empty if the cell does not exist
    /// then.
    pub fn triangles(&self, id: CellId, t: Time) -> Triangles {
        let Some(cell) = self.cell(id) else {
            return Triangles::new();
        };
        if !self.exists(id, t) {
            return Triangles::new();
        }
        let key = t.cache_key();
        if let Some(tri) = cell.cache.borrow().triangles.get(&key) {
            return tri.clone();
        }
        let tri = self.compute_triangles(id, t);
        cell.cache.borrow_mut().triangles.insert(key, tri.clone());
        tri
    }

    fn compute_triangles(&self, id: CellId, t: Time) -> Triangles {
        let num_sub = self.settings.num_sub;
        match self.cell(id).map(|c| &c.data) {
            Some(CellData::KeyVertex(_)) | Some(CellData::InbetweenVertex(_)) => {
                disk(self.vertex_pos(id, t), 0.5 * self.vertex_size(id, t))
            }
            Some(CellData::KeyEdge(e)) => e.geometry.triangulate(num_sub),
            Some(CellData::InbetweenEdge(e)) => {
                let samples = self.inbetween_edge_sampling(id, t);
                triangulate_stroke(&samples, e.is_closed(), num_sub)
            }
            Some(CellData::KeyFace(_)) | Some(CellData::InbetweenFace(_)) => {
                match triangulate_contours(&self.face_contours(id, t)) {
                    Ok(tri) => tri,
                    Err(e) => {
                        tracing::warn!(face = %id, error = %e, "face triangulation failed");
                        Triangles::new()
                    }
                }
            }
            None => Triangles::new(),
        }
    }

    /// Bounding box of the cell outline at `t` (samples and positions, no
    /// stroke width).
    pub fn outline_bounding_box(&self, id: CellId, t: Time) -> BoundingBox {
        let Some(cell) = self.cell(id) else {
            return BoundingBox::empty();
        };
        if !self.exists(id, t) {
            return BoundingBox::empty();
        }
        let key = t.cache_key();
        if let Some(b) = cell.cache.borrow().outline_bboxes.get(&key) {
            return *b;
        }
        let b = match cell.spatial_kind() {
            SpatialKind::Vertex => BoundingBox::from_point(self.vertex_pos(id, t)),
            SpatialKind::Edge => {
                let pts: Vec<Vector2<f64>> =
                    self.edge_sampling_at(id, t).iter().map(|s| s.pos()).collect();
                BoundingBox::from_points(&pts)
            }
            SpatialKind::Face => {
                let mut b = BoundingBox::empty();
                for c in self.face_contours(id, t) {
                    b.unite(&BoundingBox::from_points(&c));
                }
                b
            }
        };
        cell.cache.borrow_mut().outline_bboxes.insert(key, b);
        b
    }

    /// Bounding box of the triangulation at `t`.
    pub fn bounding_box(&self, id: CellId, t: Time) -> BoundingBox {
        self.triangles(id, t).bounding_box()
    }

    /// Bounding box over the whole lifetime of the cell. Inbetween cells are
    /// sampled at a few times of their interval.
    pub fn lifetime_bounding_box(&self, id: CellId) -> BoundingBox {
        let Some(cell) = self.cell(id) else {
            return BoundingBox::empty();
        };
        if let Some(t) = cell.key_time() {
            return self.bounding_box(id, t);
        }
        let t1 = self.before_time(id).float_time();
        let t2 = self.after_time(id).float_time();
        let mut res = BoundingBox::empty();
        for u in [0.01, 0.25, 0.5, 0.75, 0.99] {
            res.unite(&self.bounding_box(id, Time::from_float(t1 + u * (t2 - t1))));
        }
        res
    }

    /// Whether the drawn cell covers `p` at `t`.
    pub fn intersects_point(&self, id: CellId, t: Time, p: Vector2<f64>) -> bool {
        self.triangles(id, t).contains(p)
    }

    /// Whether the drawn cell touches `rect` at `t`.
    pub fn intersects_rect(&self, id: CellId, t: Time, rect: &BoundingBox) -> bool {
        if !self.bounding_box(id, t).intersects(rect) {
            return false;
        }
        self.triangles(id, t).intersects_rect(rect)
    }

    /// Whether two cells may overlap visually at some time.
    pub fn overlaps(&self, c1: CellId, c2: CellId) -> bool {
        self.lifetime_bounding_box(c1)
            .intersects(&self.lifetime_bounding_box(c2))
    }

    /// Majority vote over samples of `cycle`: inside the region bounded by
    /// `cycles` (even-odd rule) or not.
    pub fn is_cycle_contained_in_cycles(&self, cycle: &Cycle, cycles: &[Cycle]) -> bool {
        let contours: Vec<Vec<Vector2<f64>>> = cycles.iter().map(|c| self.cycle_contour(c)).collect();
        let samples = match cycle.cycle_type(self) {
            CycleType::SingleVertex => self.cycle_contour(cycle),
            _ => cycle.sample_points(self, CONTAINMENT_SAMPLES),
        };
        let inside = samples
            .iter()
            .filter(|p| point_in_contours(&contours, **p))
            .count();
        2 * inside > samples.len()
    }

    pub fn is_cycle_contained_in_face(&self, cycle: &Cycle, face: CellId) -> bool {
        match self.key_face(face) {
            Some(f) => self.is_cycle_contained_in_cycles(cycle, &f.cycles),
            None => false,
        }
    }

    // --------------------------------------------------------------------
    // Geometry maintenance
    // --------------------------------------------------------------------

    /// Drops cached geometry of `cells` and of everything depending on them.
    pub(crate) fn invalidate_geometry(&self, cells: &CellSet) {
        for c in self.fullstar(cells) {
            if let Some(cell) = self.cell(c) {
                cell.clear_cache();
            }
        }
    }

    /// Snaps the end points of a key edge onto its end vertices.
    pub fn correct_geometry(&mut self, edge: CellId) {
        let Some(e) = self.key_edge(edge) else {
            return;
        };
        if let (Some(s), Some(t)) = (e.start, e.end) {
            let p1 = self.key_vertex(s).map(|v| v.pos);
            let p2 = self.key_vertex(t).map(|v| v.pos);
            if let (Some(p1), Some(p2)) = (p1, p2) {
                if let Some(e) = self.key_edge_mut(edge) {
                    e.geometry.set_left_right_pos(p1, p2);
                }
            }
        }
        self.invalidate_geometry(&[edge].into_iter().collect());
    }

    /// Moves a key vertex to the mean of the matching end points of its
    /// incident edges.
    pub fn compute_pos_from_edges(&mut self, vertex: CellId) {
        let mut sum = Vector2::zeros();
        let mut count = 0;
        for e in self.incident_key_edges(vertex) {
            let Some(d) = self.key_edge(e) else {
                continue;
            };
            if d.start == Some(vertex) {
                sum += d.geometry.left_pos2d();
                count += 1;
            }
            if d.end == Some(vertex) {
                sum += d.geometry.right_pos2d();
                count += 1;
            }
        }
        if count > 0 {
            if let Some(v) = self.key_vertex_mut(vertex) {
                v.pos = sum / count as f64;
            }
            self.invalidate_geometry(&[vertex].into_iter().collect());
        }
    }

    /// Moves a key vertex and drags the end points of its incident edges.
    pub fn set_key_vertex_pos(&mut self, vertex: CellId, pos: Vector2<f64>) {
        let Some(v) = self.key_vertex_mut(vertex) else {
            return;
        };
        v.pos = pos;
        for e in self.incident_key_edges(vertex) {
            self.correct_geometry(e);
        }
        self.invalidate_geometry(&[vertex].into_iter().collect());
    }
}

fn blend(s1: &[EdgeSample], s2: &[EdgeSample], u: f64) -> Vec<EdgeSample> {
    s1.iter().zip(s2.iter()).map(|(a, b)| a.lerp(u, b)).collect()
}

fn copy_widths(from: &[EdgeSample], to: &mut [EdgeSample]) {
    for (t, f) in to.iter_mut().zip(from.iter()) {
        t.width = f.width;
    }
}

pub(crate) fn disk(center: Vector2<f64>, radius: f64) -> Triangles {
    let mut res = Triangles::new();
    if radius <= 0.0 {
        return res;
    }
    let point = |i: usize| {
        let a = 2.0 * PI * i as f64 / VERTEX_DISK_SEGMENTS as f64;
        center + Vector2::new(a.cos(), a.sin()) * radius
    };
    for i in 0..VERTEX_DISK_SEGMENTS {
        let p = point(i);
        let q = point(i + 1);
        res.append(center.x, center.y, p.x, p.y, q.x, q.y);
    }
    res
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::halfedge::KeyHalfedge;
    use crate::path::Path;
    use crate::animated_vertex::AnimatedVertex;

    #[test]
    fn hermite_with_single_neighbour_is_linear() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(5), Vector2::new(50.0, 10.0));
        let ab = vac.new_inbetween_vertex(a, b).unwrap();
        let p = vac.vertex_pos(ab, Time::from_float(2.5));
        assert_relative_eq!(p.x, 25.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 5.0, epsilon = 1e-9);
        let q = vac.pos_linear(ab, Time::frame(1));
        assert_relative_eq!(q.x, 10.0, epsilon = 1e-9);
        // clamped outside the interval
        assert_relative_eq!(vac.vertex_pos(ab, Time::frame(9)).x, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn tangent_averages_neighbours() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(2), Vector2::new(2.0, 0.0));
        let c = vac.new_key_vertex(Time::frame(4), Vector2::new(2.0, 4.0));
        vac.new_inbetween_vertex(a, b).unwrap();
        vac.new_inbetween_vertex(b, c).unwrap();
        let m = vac.key_vertex_tangent(b);
        assert_relative_eq!(m.x, 0.5, epsilon = 1e-9);
        assert_relative_eq!(m.y, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn inbetween_edge_follows_its_ends() {
        let mut vac = Vac::new();
        let a0 = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b0 = vac.new_key_vertex(Time::frame(0), Vector2::new(100.0, 0.0));
        let e0 = vac.new_key_edge(a0, b0).unwrap();
        let a1 = vac.new_key_vertex(Time::frame(10), Vector2::new(0.0, 50.0));
        let b1 = vac.new_key_vertex(Time::frame(10), Vector2::new(100.0, 50.0));
        let e1 = vac.new_key_edge(a1, b1).unwrap();
        let ia = vac.new_inbetween_vertex(a0, a1).unwrap();
        let ib = vac.new_inbetween_vertex(b0, b1).unwrap();
        let before = Path::from_halfedges(&vac, vec![KeyHalfedge::new(e0, true)]);
        let after = Path::from_halfedges(&vac, vec![KeyHalfedge::new(e1, true)]);
        let ie = vac
            .new_inbetween_edge(
                before,
                after,
                AnimatedVertex::new(vec![ia]),
                AnimatedVertex::new(vec![ib]),
            )
            .unwrap();
        let s = vac.inbetween_edge_sampling(ie, Time::frame(5));
        assert!(s.len() >= 2);
        assert_relative_eq!(s[0].y, 25.0, epsilon = 1e-6);
        assert_relative_eq!(s[s.len() - 1].x, 100.0, epsilon = 1e-6);
        assert!(!vac.triangles(ie, Time::frame(5)).is_empty());
        assert!(vac.triangles(ie, Time::frame(10)).is_empty());
    }

    #[test]
    fn face_triangles_and_containment() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let v: Vec<CellId> = [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]
            .iter()
            .map(|(x, y)| vac.new_key_vertex(t, Vector2::new(*x, *y)))
            .collect();
        let e: Vec<CellId> = (0..4)
            .map(|i| vac.new_key_edge(v[i], v[(i + 1) % 4]).unwrap())
            .collect();
        let cycle = Cycle::from_halfedges(&vac, e.iter().map(|e| KeyHalfedge::new(*e, true)).collect());
        let f = vac.new_key_face_with_cycle(cycle).unwrap();
        assert!(vac.intersects_point(f, t, Vector2::new(50.0, 50.0)));
        assert!(!vac.intersects_point(f, t, Vector2::new(150.0, 50.0)));
        let inner = vac.new_key_vertex(t, Vector2::new(40.0, 40.0));
        let outer = vac.new_key_vertex(t, Vector2::new(140.0, 40.0));
        assert!(vac.is_cycle_contained_in_face(&Cycle::from_vertex(inner), f));
        assert!(!vac.is_cycle_contained_in_face(&Cycle::from_vertex(outer), f));
        let b = vac.outline_bounding_box(f, t);
        assert_relative_eq!(b.width(), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn moving_a_vertex_drags_its_edges() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(100.0, 0.0));
        let e = vac.new_key_edge(a, b).unwrap();
        vac.set_key_vertex_pos(b, Vector2::new(100.0, 30.0));
        let g = vac.key_edge(e).unwrap().geometry();
        assert_relative_eq!(g.right_pos2d().y, 30.0, epsilon = 1e-6);
        vac.compute_pos_from_edges(a);
        assert_relative_eq!(vac.key_vertex(a).unwrap().pos().x, 0.0, epsilon = 1e-6);
    }
}
