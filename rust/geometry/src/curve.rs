// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Densely sampled polyline curves
//!
//! A [`Curve`] is an ordered list of [`EdgeSample`]s together with their
//! cumulative arclengths. It supports interactive sketching, uniform
//! resampling, evaluation by arclength, splitting, local sculpting and
//! segment-segment intersection queries.
//!
//! A closed curve stores its first sample again as its last sample.

use crate::error::{Error, Result};
use crate::sample::EdgeSample;
use nalgebra::{Matrix3, Vector2, Vector3};

/// Default sampling step used by sketched and resampled curves.
pub const DEFAULT_DS: f64 = 5.0;

/// Determinant threshold below which two segments are treated as parallel.
const PARALLEL_EPSILON: f64 = 1e-10;

/// Step used by central-difference derivatives.
const DERIVATIVE_STEP: f64 = 1e-3;

/// A pair of arclength parameters where two curves meet.
///
/// `s` is the arclength on the first curve (or the earlier occurrence for a
/// self-intersection) and `t` the arclength on the second curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub s: f64,
    pub t: f64,
}

impl Intersection {
    pub fn new(s: f64, t: f64) -> Self {
        Self { s, t }
    }
}

/// Closest sample of a curve to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestVertex {
    pub index: usize,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy)]
struct SculptTemp {
    index: usize,
    weight: f64,
    x: f64,
    y: f64,
}

/// Polyline with per-sample width and cached arclengths.
#[derive(Debug, Clone)]
pub struct Curve {
    vertices: Vec<EdgeSample>,
    arclengths: Vec<f64>,
    ds: f64,
    closed: bool,
    sketching: bool,

    // Sculpt state
    sculpt_index: Option<usize>,
    sculpt_radius: f64,
    sculpt_start: Vector2<f64>,
    sculpt_temp: Vec<SculptTemp>,
}

impl Default for Curve {
    fn default() -> Self {
        Self::new(DEFAULT_DS)
    }
}

impl PartialEq for Curve {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices && self.closed == other.closed && self.ds == other.ds
    }
}

impl Curve {
    /// Empty curve with the given sampling step.
    pub fn new(ds: f64) -> Self {
        Self {
            vertices: Vec::new(),
            arclengths: Vec::new(),
            ds,
            closed: false,
            sketching: false,
            sculpt_index: None,
            sculpt_radius: 0.0,
            sculpt_start: Vector2::zeros(),
            sculpt_temp: Vec::new(),
        }
    }

    /// Curve from explicit samples, without resampling.
    pub fn from_vertices(vertices: Vec<EdgeSample>, ds: f64) -> Self {
        let mut res = Self::new(ds);
        res.set_vertices(vertices);
        res
    }

    /// Straight curve between two samples, resampled at `ds`.
    pub fn straight(start: EdgeSample, end: EdgeSample, ds: f64) -> Self {
        let mut res = Self::from_vertices(vec![start, end], ds);
        res.resample();
        res
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.arclengths.clear();
        self.closed = false;
        self.sketching = false;
        self.sculpt_index = None;
        self.sculpt_temp.clear();
    }

    // --- Accessors ---

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[EdgeSample] {
        &self.vertices
    }

    pub fn vertex(&self, i: usize) -> Option<EdgeSample> {
        self.vertices.get(i).copied()
    }

    pub fn arclengths(&self) -> &[f64] {
        &self.arclengths
    }

    pub fn arclength(&self, i: usize) -> f64 {
        self.arclengths.get(i).copied().unwrap_or(0.0)
    }

    pub fn ds(&self) -> f64 {
        self.ds
    }

    pub fn set_ds(&mut self, ds: f64) {
        self.ds = ds;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_sketching(&self) -> bool {
        self.sketching
    }

    /// Total arclength.
    pub fn length(&self) -> f64 {
        self.arclengths.last().copied().unwrap_or(0.0)
    }

    pub fn start(&self) -> EdgeSample {
        self.vertices.first().copied().unwrap_or_default()
    }

    pub fn end(&self) -> EdgeSample {
        self.vertices.last().copied().unwrap_or_default()
    }

    /// Replaces the samples, keeping closedness.
    pub fn set_vertices(&mut self, vertices: Vec<EdgeSample>) {
        self.vertices = vertices;
        self.sculpt_temp.clear();
        self.update_arclengths();
    }

    /// Marks the curve as a loop. If the last sample does not already
    /// duplicate the first one, a copy of the first sample is appended.
    pub fn make_loop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let (Some(first), Some(last)) = (self.vertices.first(), self.vertices.last()) {
            if first.distance_to(last) > 1e-10 || self.vertices.len() == 1 {
                let first = *first;
                self.vertices.push(first);
                self.update_arclengths();
            }
        }
    }

    fn update_arclengths(&mut self) {
        self.arclengths.clear();
        self.arclengths.reserve(self.vertices.len());
        let mut acc = 0.0;
        for (i, v) in self.vertices.iter().enumerate() {
            if i > 0 {
                acc += self.vertices[i - 1].distance_to(v);
            }
            self.arclengths.push(acc);
        }
    }

    // --- Sketching ---

    pub fn begin_sketch(&mut self, sample: EdgeSample) {
        self.clear();
        self.sketching = true;
        self.vertices.push(sample);
        self.arclengths.push(0.0);
    }

    /// Appends a raw input sample. Samples at the same position as the
    /// previous one are ignored.
    pub fn continue_sketch(&mut self, sample: EdgeSample) {
        if !self.sketching {
            self.begin_sketch(sample);
            return;
        }
        let last = self.end();
        let d = last.distance_to(&sample);
        if d > 0.0 {
            let s = self.length() + d;
            self.vertices.push(sample);
            self.arclengths.push(s);
        }
    }

    pub fn end_sketch(&mut self) {
        self.sketching = false;
        self.resample();
    }

    // --- Sampling ---

    /// Resamples uniformly by arclength so that consecutive samples are at
    /// most `ds` apart. Endpoints are preserved.
    pub fn resample(&mut self) {
        let n = self.vertices.len();
        if n < 2 {
            return;
        }
        let l = self.length();
        let first = self.vertices[0];
        let last = self.vertices[n - 1];
        if l <= 0.0 || !l.is_finite() {
            self.vertices = vec![first, last];
            self.update_arclengths();
            return;
        }
        let ds = if self.ds > 0.0 { self.ds } else { DEFAULT_DS };
        let segments = ((l / ds).ceil() as usize).max(1);
        let mut out = Vec::with_capacity(segments + 1);
        out.push(first);
        for k in 1..segments {
            out.push(self.interpolate(l * k as f64 / segments as f64));
        }
        out.push(last);
        self.vertices = out;
        self.update_arclengths();
    }

    pub fn resample_with(&mut self, ds: f64) {
        self.ds = ds;
        self.resample();
    }

    /// Sample at arclength `s`. Loops wrap `s` into `[0, length]`, open
    /// curves clamp it.
    pub fn eval(&self, s: f64) -> EdgeSample {
        match self.vertices.len() {
            0 => EdgeSample::default(),
            1 => self.vertices[0],
            _ => {
                let l = self.length();
                let s = if self.closed && l > 0.0 && (s < 0.0 || s > l) {
                    s.rem_euclid(l)
                } else {
                    s
                };
                self.interpolate(s)
            }
        }
    }

    pub fn pos(&self, s: f64) -> Vector2<f64> {
        self.eval(s).pos()
    }

    fn interpolate(&self, s: f64) -> EdgeSample {
        let n = self.vertices.len();
        if n == 0 {
            return EdgeSample::default();
        }
        if n == 1 || s <= 0.0 {
            return self.vertices[0];
        }
        if s >= self.length() {
            return self.vertices[n - 1];
        }
        let i = self
            .arclengths
            .partition_point(|&a| a <= s)
            .clamp(1, n - 1);
        let a0 = self.arclengths[i - 1];
        let a1 = self.arclengths[i];
        let u = if a1 > a0 { (s - a0) / (a1 - a0) } else { 0.0 };
        self.vertices[i - 1].lerp(u, &self.vertices[i])
    }

    /// Unit tangent at `s` by central difference. Returns `(1, 0)` where the
    /// curve is degenerate.
    pub fn derivative(&self, s: f64) -> Vector2<f64> {
        let dp = self.pos(s + DERIVATIVE_STEP) - self.pos(s - DERIVATIVE_STEP);
        let norm = dp.norm();
        if norm < 1e-10 {
            Vector2::new(1.0, 0.0)
        } else {
            dp / norm
        }
    }

    /// Same curve traversed in the opposite direction.
    pub fn reversed(&self) -> Curve {
        let mut vertices = self.vertices.clone();
        vertices.reverse();
        let mut res = Curve::from_vertices(vertices, self.ds);
        res.closed = self.closed;
        res
    }

    // --- Transforms ---

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for v in &mut self.vertices {
            v.x += dx;
            v.y += dy;
        }
    }

    /// Applies a homogeneous 2D transform to every sample position.
    pub fn transform(&mut self, m: &Matrix3<f64>) {
        for v in &mut self.vertices {
            let p = m * Vector3::new(v.x, v.y, 1.0);
            let w = if p.z.abs() > 1e-12 { p.z } else { 1.0 };
            v.x = p.x / w;
            v.y = p.y / w;
        }
        self.update_arclengths();
    }

    /// Moves the endpoints, spreading the displacement linearly along the
    /// curve, then resamples. Curves with fewer than three samples become a
    /// straight segment.
    pub fn set_end_points(&mut self, new_start: EdgeSample, new_end: EdgeSample) {
        let n = self.vertices.len();
        let l = self.length();
        if n < 3 || l <= 0.0 {
            self.vertices = vec![new_start, new_end];
        } else {
            let d_start = new_start - self.vertices[0];
            let d_end = new_end - self.vertices[n - 1];
            for i in 0..n {
                let a = self.arclengths[i] / l;
                self.vertices[i] = self.vertices[i] + d_start.lerp(a, &d_end);
            }
        }
        self.update_arclengths();
        self.resample();
    }

    /// Sets every sample to the same width.
    pub fn set_width(&mut self, width: f64) {
        for v in &mut self.vertices {
            v.width = width;
        }
    }

    /// Rotates samples around the end so the tangent there matches `der`.
    /// The rotation fades out along the whole curve.
    pub fn set_end_derivative(&mut self, der: Vector2<f64>) {
        let l = self.length();
        if l <= 0.0 {
            return;
        }
        let old = self.derivative(l);
        let pivot = self.end().pos();
        self.rotate_weighted(pivot, angle_between(old, der), l, |s| l - s);
    }

    /// Rotates samples around the start so the tangent there matches `der`.
    pub fn set_start_derivative(&mut self, der: Vector2<f64>) {
        let l = self.length();
        if l <= 0.0 {
            return;
        }
        let old = self.derivative(0.0);
        let pivot = self.start().pos();
        self.rotate_weighted(pivot, angle_between(old, der), l, |s| s);
    }

    fn rotate_weighted<F: Fn(f64) -> f64>(
        &mut self,
        pivot: Vector2<f64>,
        dtheta: f64,
        radius: f64,
        distance: F,
    ) {
        for i in 0..self.vertices.len() {
            let w = sculpt_weight(distance(self.arclengths[i]), radius);
            let (sin, cos) = (dtheta * w).sin_cos();
            let v = &mut self.vertices[i];
            let (ox, oy) = (v.x - pivot.x, v.y - pivot.y);
            v.x = pivot.x + ox * cos - oy * sin;
            v.y = pivot.y + ox * sin + oy * cos;
        }
        self.update_arclengths();
    }

    // --- Queries ---

    pub fn find_closest_vertex(&self, x: f64, y: f64) -> Option<ClosestVertex> {
        let mut best: Option<ClosestVertex> = None;
        for (i, v) in self.vertices.iter().enumerate() {
            let dx = x - v.x;
            let dy = y - v.y;
            let d2 = dx * dx + dy * dy;
            if best.map_or(true, |b| d2 < b.distance) {
                best = Some(ClosestVertex {
                    index: i,
                    distance: d2,
                });
            }
        }
        best.map(|b| ClosestVertex {
            index: b.index,
            distance: b.distance.sqrt(),
        })
    }

    /// Splits the curve at increasing arclengths. For `k` values this
    /// returns `k - 1` curves, `[v0 -> v1, v1 -> v2, ...]`.
    ///
    /// On a loop the values are expected in `[0, length]` except the last
    /// one, which may exceed the length to wrap past the seam, e.g.
    /// `[s1, s2, s1 + length]`.
    pub fn split(&self, values: &[f64]) -> Vec<Curve> {
        let count = values.len();
        if count < 2 {
            return Vec::new();
        }
        let n = self.vertices.len();
        if n == 0 {
            return (0..count - 1).map(|_| Curve::new(self.ds)).collect();
        }

        let l = self.length();
        let mut i = 0;
        while i < n && self.arclengths[i] < values[0] {
            i += 1;
        }
        let mut last_vertex;
        if i == 0 {
            last_vertex = self.start();
            i = 1;
        } else if i < n {
            let u = (values[0] - self.arclengths[i - 1])
                / (self.arclengths[i] - self.arclengths[i - 1]);
            last_vertex = self.vertices[i - 1].lerp(u, &self.vertices[i]);
            if u > 0.99 {
                i += 1;
            }
        } else {
            last_vertex = self.end();
        }

        let mut looped = false;
        let mut res = Vec::with_capacity(count - 1);
        for k in 1..count {
            let mut value = values[k];
            if looped {
                value -= l;
            }
            let mut piece = vec![last_vertex];
            loop {
                if i < n {
                    if self.arclengths[i] >= value {
                        break;
                    }
                    piece.push(self.vertices[i]);
                    i += 1;
                } else if self.closed && !looped {
                    // Skip index 0: it duplicates the last sample.
                    looped = true;
                    i = 1;
                    value -= l;
                } else {
                    break;
                }
            }
            if i > 1 && i < n {
                let a0 = self.arclengths[i - 1];
                let a1 = self.arclengths[i];
                let u = if a1 > a0 { (value - a0) / (a1 - a0) } else { 0.0 };
                if u > 0.01 {
                    piece.push(self.vertices[i - 1].lerp(u, &self.vertices[i]));
                    if u > 0.99 {
                        i += 1;
                    }
                }
            }
            let curve = Curve::from_vertices(piece, self.ds);
            last_vertex = curve.end();
            res.push(curve);
        }
        res
    }

    /// Sub-curve between two arclengths.
    pub fn trimmed(&self, from: f64, to: f64) -> Result<Curve> {
        self.split(&[from, to])
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidSplit(format!("cannot trim [{from}, {to}]")))
    }

    // --- Intersections ---

    /// Unclean intersections with `other`. May contain duplicates and miss
    /// nearly parallel crossings. Open ends are virtually extended by
    /// `tolerance` so that near misses at the extremities are reported.
    /// The result is not sorted.
    pub fn intersections(&self, other: &Curve, tolerance: f64) -> Vec<Intersection> {
        let mut res = Vec::new();
        let n = self.len();
        let m = other.len();
        if n < 2 || m < 2 {
            return res;
        }
        let l = self.length();
        let l_other = other.length();
        let mut range = ParamRange::new(l, l_other);

        for i in 0..n - 1 {
            let (a, b) = (self.vertices[i], self.vertices[i + 1]);
            for j in 0..m - 1 {
                let (c, d) = (other.vertices[j], other.vertices[j + 1]);
                if let Some((u, v)) = segments_intersect(&a, &b, &c, &d) {
                    range.push(&mut res, self.param(i, u), other.param(j, v));
                }
            }
        }

        if range.min_s > tolerance && !self.closed {
            let (a, b) = self.virtual_extension(true, tolerance);
            for j in 0..m - 1 {
                let (c, d) = (other.vertices[j], other.vertices[j + 1]);
                if let Some((_, v)) = segments_intersect(&a, &b, &c, &d) {
                    range.push(&mut res, 0.0, other.param(j, v));
                }
            }
        }
        if range.max_s < l - tolerance && !self.closed {
            let (a, b) = self.virtual_extension(false, tolerance);
            for j in 0..m - 1 {
                let (c, d) = (other.vertices[j], other.vertices[j + 1]);
                if let Some((_, v)) = segments_intersect(&a, &b, &c, &d) {
                    range.push(&mut res, l, other.param(j, v));
                }
            }
        }
        if range.min_t > tolerance && !other.closed {
            let (a, b) = other.virtual_extension(true, tolerance);
            for i in 0..n - 1 {
                let (c, d) = (self.vertices[i], self.vertices[i + 1]);
                if let Some((_, v)) = segments_intersect(&a, &b, &c, &d) {
                    range.push(&mut res, self.param(i, v), 0.0);
                }
            }
        }
        if range.max_t < l_other - tolerance && !other.closed {
            let (a, b) = other.virtual_extension(false, tolerance);
            for i in 0..n - 1 {
                let (c, d) = (self.vertices[i], self.vertices[i + 1]);
                if let Some((_, v)) = segments_intersect(&a, &b, &c, &d) {
                    range.push(&mut res, self.param(i, v), l_other);
                }
            }
        }
        res
    }

    /// Unclean self-intersections, with `s < t`. Same caveats as
    /// [`Curve::intersections`].
    pub fn self_intersections(&self, tolerance: f64) -> Vec<Intersection> {
        let mut res = Vec::new();
        let n = self.len();
        if n < 4 {
            return res;
        }
        let l = self.length();
        let mut min_s = l;
        let mut max_s: f64 = 0.0;

        for i in 0..n - 3 {
            let (a, b) = (self.vertices[i], self.vertices[i + 1]);
            for j in i + 2..n - 1 {
                let (c, d) = (self.vertices[j], self.vertices[j + 1]);
                if let Some((u, v)) = segments_intersect(&a, &b, &c, &d) {
                    let s = self.param(i, u);
                    let t = self.param(j, v);
                    res.push(Intersection::new(s, t));
                    min_s = min_s.min(s);
                    max_s = max_s.max(t);
                }
            }
        }

        if min_s > tolerance && !self.closed {
            let (a, b) = self.virtual_extension(true, tolerance);
            for j in 1..n - 1 {
                let (c, d) = (self.vertices[j], self.vertices[j + 1]);
                if let Some((_, v)) = segments_intersect(&a, &b, &c, &d) {
                    let t = self.param(j, v);
                    res.push(Intersection::new(0.0, t));
                    max_s = max_s.max(t);
                }
            }
        }
        if max_s < l - tolerance && !self.closed {
            let (a, b) = self.virtual_extension(false, tolerance);
            for j in 0..n - 3 {
                let (c, d) = (self.vertices[j], self.vertices[j + 1]);
                if let Some((_, v)) = segments_intersect(&a, &b, &c, &d) {
                    res.push(Intersection::new(self.param(j, v), l));
                }
            }
        }
        res
    }

    fn param(&self, i: usize, u: f64) -> f64 {
        (1.0 - u) * self.arclengths[i] + u * self.arclengths[i + 1]
    }

    /// Segment from an endpoint extending outwards by `tolerance`.
    fn virtual_extension(&self, at_start: bool, tolerance: f64) -> (EdgeSample, EdgeSample) {
        let (a, e) = if at_start {
            (self.start(), self.eval(tolerance))
        } else {
            (self.end(), self.eval(self.length() - tolerance))
        };
        (a, e.lerp(2.0, &a))
    }

    // --- Sculpting ---

    /// Selects the sample closest to `(x, y)` as the sculpt handle and
    /// returns its distance to the query point.
    pub fn prepare_sculpt(&mut self, x: f64, y: f64, radius: f64) -> f64 {
        self.sculpt_radius = radius;
        match self.find_closest_vertex(x, y) {
            Some(c) => {
                self.sculpt_index = Some(c.index);
                c.distance
            }
            None => {
                self.sculpt_index = None;
                f64::INFINITY
            }
        }
    }

    pub fn sculpt_index(&self) -> Option<usize> {
        self.sculpt_index.filter(|&i| i < self.vertices.len())
    }

    pub fn sculpt_radius(&self) -> f64 {
        self.sculpt_radius
    }

    pub fn sculpt_vertex(&self) -> Option<EdgeSample> {
        self.sculpt_index().map(|i| self.vertices[i])
    }

    pub fn arclength_of_sculpt_vertex(&self) -> f64 {
        self.sculpt_index().map_or(0.0, |i| self.arclengths[i])
    }

    /// Signed arclength distance from sample `i` to the sculpt handle,
    /// folded to `[0, length / 2]` on loops.
    fn loop_distance(&self, from: usize, to: usize) -> f64 {
        let l = self.length();
        let half = 0.5 * l;
        let mut d = self.arclengths[from] - self.arclengths[to];
        if d > half {
            d -= l;
        }
        if d < -half {
            d += l;
        }
        d.abs()
    }

    /// Weights of the samples affected by the sculpt handle.
    fn sculpt_weights(&self, index: usize, renormalize_ends: bool) -> Vec<(usize, f64)> {
        let n = self.vertices.len();
        let r = self.sculpt_radius;
        let mut res = Vec::new();
        if self.closed {
            let half = 0.5 * self.length();
            let large = r > half;
            let w0 = sculpt_weight(half, r);
            for i in 0..n {
                let d = self.loop_distance(index, i);
                if d > r {
                    continue;
                }
                let w = if large {
                    sculpt_weight_clamped(d, half, w0)
                } else {
                    sculpt_weight(d, r)
                };
                res.push((i, w));
            }
            return res;
        }

        res.push((index, 1.0));
        let mut i = index;
        while i > 0 {
            i -= 1;
            let d = self.arclengths[index] - self.arclengths[i];
            if d > r {
                break;
            }
            res.push((i, sculpt_weight(d, r)));
        }
        if renormalize_ends && res.last().map(|&(i, _)| i) == Some(0) {
            if !renormalize(&mut res[1..]) {
                return Vec::new();
            }
        }
        let right_start = res.len();
        for i in index + 1..n {
            let d = self.arclengths[i] - self.arclengths[index];
            if d > r {
                break;
            }
            res.push((i, sculpt_weight(d, r)));
        }
        if renormalize_ends && res.last().map(|&(i, _)| i) == Some(n - 1) {
            if !renormalize(&mut res[right_start..]) {
                return Vec::new();
            }
        }
        res
    }

    /// Starts a grab-and-drag deformation at `(x, y)` around the handle
    /// selected by [`Curve::prepare_sculpt`]. Endpoints of open curves
    /// never move.
    pub fn begin_sculpt_deform(&mut self, x: f64, y: f64) {
        self.sculpt_start = Vector2::new(x, y);
        self.sculpt_temp.clear();
        let n = self.vertices.len();
        let index = match self.sculpt_index() {
            Some(i) if i > 0 && i + 1 < n => i,
            _ => return,
        };
        self.sculpt_temp = self
            .sculpt_weights(index, true)
            .into_iter()
            .map(|(i, w)| SculptTemp {
                index: i,
                weight: w,
                x: self.vertices[i].x,
                y: self.vertices[i].y,
            })
            .collect();
    }

    pub fn continue_sculpt_deform(&mut self, x: f64, y: f64) {
        let dx = x - self.sculpt_start.x;
        let dy = y - self.sculpt_start.y;
        for t in &self.sculpt_temp {
            let v = &mut self.vertices[t.index];
            v.x = t.x + t.weight * dx;
            v.y = t.y + t.weight * dy;
        }
        // Keep the loop seam welded.
        if self.closed {
            if let Some(&first) = self.vertices.first() {
                if let Some(last) = self.vertices.last_mut() {
                    last.x = first.x;
                    last.y = first.y;
                }
            }
        }
        self.update_arclengths();
    }

    pub fn end_sculpt_deform(&mut self) {
        self.sculpt_temp.clear();
        self.resample();
    }

    /// Starts a width sculpt: dragging horizontally scales the width of
    /// the handle, and its neighbours proportionally to their weight.
    pub fn begin_sculpt_width(&mut self, x: f64, y: f64) {
        self.sculpt_start = Vector2::new(x, y);
        self.sculpt_temp.clear();
        let index = match self.sculpt_index() {
            Some(i) => i,
            None => return,
        };
        // Width is stored in the `x` slot of the temp record.
        self.sculpt_temp = self
            .sculpt_weights(index, false)
            .into_iter()
            .map(|(i, w)| SculptTemp {
                index: i,
                weight: w,
                x: self.vertices[i].width,
                y: 0.0,
            })
            .collect();
    }

    pub fn continue_sculpt_width(&mut self, x: f64, _y: f64) {
        let reference = match self.sculpt_temp.first() {
            Some(t) if t.x != 0.0 => t.x,
            _ => return,
        };
        let new_width = (reference + (x - self.sculpt_start.x)).abs();
        let ratio = new_width / reference;
        for t in &self.sculpt_temp {
            self.vertices[t.index].width = t.x * (1.0 + (ratio - 1.0) * t.weight);
        }
    }

    pub fn end_sculpt_width(&mut self) {
        self.sculpt_temp.clear();
    }

    /// One smoothing step around the sculpt handle: each affected sample
    /// moves toward a Gaussian-weighted average of its neighbours. Open
    /// curve endpoints stay fixed.
    pub fn sculpt_smooth(&mut self, intensity: f64) {
        let n = self.vertices.len();
        let index = match self.sculpt_index() {
            Some(i) if n > 0 => i,
            _ => return,
        };
        let copy = self.vertices.clone();
        let l = self.length();
        let half = 0.5 * l;
        let r = self.sculpt_radius;
        if r <= 0.0 {
            return;
        }
        let large = r > half;
        let w0 = sculpt_weight(half, r);
        let s_sculpt = self.arclengths[index];

        for i in 0..n {
            if !self.closed && (i == 0 || i == n - 1) {
                continue;
            }
            let d = if self.closed {
                self.loop_distance(index, i)
            } else {
                self.arclengths[index] - self.arclengths[i]
            };
            if d.abs() >= r {
                continue;
            }
            let local = if large {
                intensity * sculpt_weight_clamped(d, half, w0)
            } else {
                intensity * sculpt_weight(d, r)
            };

            let mut acc = EdgeSample::default();
            let mut sum = 0.0;
            for j in 0..n {
                let d2 = if self.closed {
                    self.loop_distance(i, j)
                } else {
                    self.arclengths[i] - self.arclengths[j]
                };
                if d2.abs() < r {
                    let w = (-5.0 * d2 * d2 / (r * r)).exp();
                    acc = acc + copy[j] * w;
                    sum += w;
                }
            }
            if sum <= 0.0 {
                continue;
            }
            let avg = acc * (1.0 / sum);
            let mut amount = local;
            if !self.closed {
                amount *= if d > 0.0 {
                    (s_sculpt - d) / s_sculpt
                } else {
                    ((l - s_sculpt) + d) / (l - s_sculpt)
                };
            }
            self.vertices[i] = copy[i].lerp(amount, &avg);
        }
        self.update_arclengths();
        self.resample();
    }
}

/// Extent of the intersection parameters found so far.
struct ParamRange {
    min_s: f64,
    max_s: f64,
    min_t: f64,
    max_t: f64,
}

impl ParamRange {
    fn new(l: f64, l_other: f64) -> Self {
        Self {
            min_s: l,
            max_s: 0.0,
            min_t: l_other,
            max_t: 0.0,
        }
    }

    fn push(&mut self, res: &mut Vec<Intersection>, s: f64, t: f64) {
        res.push(Intersection::new(s, t));
        self.min_s = self.min_s.min(s);
        self.max_s = self.max_s.max(s);
        self.min_t = self.min_t.min(t);
        self.max_t = self.max_t.max(t);
    }
}

/// Sculpt falloff `(s - r)^2 (s + r)^2 / r^4` on `[-r, r]`, zero outside.
pub fn sculpt_weight(s: f64, radius: f64) -> f64 {
    if radius <= 0.0 || s > radius || s < -radius {
        return 0.0;
    }
    let a = s - radius;
    let b = s + radius;
    let r2 = radius * radius;
    a * a * b * b / (r2 * r2)
}

/// Falloff used on loops shorter than twice the sculpt radius: the curve
/// never reaches zero weight, bottoming out at `w0`.
fn sculpt_weight_clamped(d: f64, r0: f64, w0: f64) -> f64 {
    if d > r0 || d < -r0 {
        return w0;
    }
    let a = d - r0;
    let b = d + r0;
    let r2 = r0 * r0;
    a * a * b * b / (r2 * r2) * (1.0 - w0) + w0
}

/// Rescales weights so that the farthest one becomes zero. Returns false
/// if the farthest weight is already one.
fn renormalize(weights: &mut [(usize, f64)]) -> bool {
    let dw = match weights.last() {
        Some(&(_, w)) => w,
        None => return true,
    };
    let one_minus = 1.0 - dw;
    if one_minus <= 0.0 {
        return false;
    }
    for (_, w) in weights.iter_mut() {
        *w = (*w - dw) / one_minus;
    }
    true
}

fn angle_between(from: Vector2<f64>, to: Vector2<f64>) -> f64 {
    let pi = std::f64::consts::PI;
    let mut dtheta = to.y.atan2(to.x) - from.y.atan2(from.x);
    if dtheta <= -pi {
        dtheta += 2.0 * pi;
    }
    if dtheta > pi {
        dtheta -= 2.0 * pi;
    }
    dtheta
}

/// Tests whether segments `[ab]` and `[cd]` cross. On success returns
/// `(u, v)` with `P = a + u (b - a) = c + v (d - c)`.
///
/// Nearly parallel segments never intersect.
pub fn segments_intersect(
    a: &EdgeSample,
    b: &EdgeSample,
    c: &EdgeSample,
    d: &EdgeSample,
) -> Option<(f64, f64)> {
    // Bounding box pruning
    if a.x.min(b.x) > c.x.max(d.x) || c.x.min(d.x) > a.x.max(b.x) {
        return None;
    }
    if a.y.min(b.y) > c.y.max(d.y) || c.y.min(d.y) > a.y.max(b.y) {
        return None;
    }

    let det = cross(b.x - a.x, b.y - a.y, d.x - c.x, d.y - c.y);
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }
    let num_u = cross(d.x - c.x, d.y - c.y, a.x - c.x, a.y - c.y);
    let num_v = cross(b.x - a.x, b.y - a.y, a.x - c.x, a.y - c.y);
    let u = num_u / det;
    let v = num_v / det;
    let eps = PARALLEL_EPSILON;
    if u >= -eps && u < 1.0 + eps && v >= -eps && v < 1.0 + eps {
        Some((u, v))
    } else {
        None
    }
}

#[inline]
fn cross(ux: f64, uy: f64, vx: f64, vy: f64) -> f64 {
    ux * vy - uy * vx
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(x: f64, y: f64) -> EdgeSample {
        EdgeSample::new(x, y, 2.0)
    }

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Curve {
        Curve::straight(sample(x0, y0), sample(x1, y1), 1.0)
    }

    #[test]
    fn resample_is_uniform() {
        let c = line(0.0, 0.0, 10.0, 0.0);
        assert_eq!(c.len(), 11);
        assert_relative_eq!(c.length(), 10.0);
        for (i, v) in c.vertices().iter().enumerate() {
            assert_relative_eq!(v.x, i as f64, epsilon = 1e-9);
        }
    }

    #[test]
    fn sketch_skips_duplicates() {
        let mut c = Curve::new(3.0);
        c.begin_sketch(sample(0.0, 0.0));
        c.continue_sketch(sample(0.0, 0.0));
        c.continue_sketch(sample(3.0, 4.0));
        assert_eq!(c.len(), 2);
        assert_relative_eq!(c.length(), 5.0);
        c.end_sketch();
        assert!(!c.is_sketching());
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn eval_interpolates_and_clamps() {
        let c = line(0.0, 0.0, 10.0, 0.0);
        assert_relative_eq!(c.eval(2.5).x, 2.5, epsilon = 1e-9);
        assert_relative_eq!(c.eval(-4.0).x, 0.0);
        assert_relative_eq!(c.eval(40.0).x, 10.0);
    }

    #[test]
    fn split_open_curve() {
        let c = line(0.0, 0.0, 10.0, 0.0);
        let parts = c.split(&[0.0, 2.5, 10.0]);
        assert_eq!(parts.len(), 2);
        assert_relative_eq!(parts[0].end().x, 2.5, epsilon = 1e-9);
        assert_relative_eq!(parts[1].start().x, 2.5, epsilon = 1e-9);
        assert_relative_eq!(parts[1].end().x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(parts[0].length() + parts[1].length(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn split_loop_wraps() {
        let mut c = Curve::from_vertices(
            vec![
                sample(0.0, 0.0),
                sample(10.0, 0.0),
                sample(10.0, 10.0),
                sample(0.0, 10.0),
                sample(0.0, 0.0),
            ],
            1.0,
        );
        c.make_loop();
        assert_eq!(c.len(), 5);
        c.resample();
        let parts = c.split(&[5.0, 25.0, 45.0]);
        assert_eq!(parts.len(), 2);
        assert_relative_eq!(parts[0].length(), 20.0, epsilon = 1e-6);
        assert_relative_eq!(parts[1].length(), 20.0, epsilon = 1e-6);
        assert_relative_eq!(parts[1].end().x, 5.0, epsilon = 1e-6);
        assert_relative_eq!(parts[1].end().y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn crossing_lines_intersect() {
        let a = line(0.0, 0.0, 10.0, 10.0);
        let b = line(0.0, 10.0, 10.0, 0.0);
        let res = a.intersections(&b, 0.5);
        assert!(!res.is_empty());
        let half = 50f64.sqrt();
        assert!(res.iter().all(|i| (i.s - half).abs() < 1e-6 && (i.t - half).abs() < 1e-6));
    }

    #[test]
    fn virtual_extension_catches_near_miss() {
        let a = line(0.0, 0.0, 9.0, 0.0);
        let b = line(10.0, -5.0, 10.0, 5.0);
        assert!(a.intersections(&b, 0.5).is_empty());
        let res = a.intersections(&b, 2.0);
        assert!(res.iter().any(|i| i.s == a.length() && (i.t - 5.0).abs() < 1e-6));
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        let a = sample(0.0, 0.0);
        let b = sample(10.0, 0.0);
        let c = sample(0.0, 0.0);
        let d = sample(5.0, 0.0);
        assert!(segments_intersect(&a, &b, &c, &d).is_none());
    }

    #[test]
    fn self_intersection_of_loop_shape() {
        let mut c = Curve::new(1.0);
        c.begin_sketch(sample(0.0, 0.0));
        for p in [(10.0, 10.0), (20.0, 0.0), (10.0, -10.0), (0.0, 10.0)] {
            c.continue_sketch(sample(p.0, p.1));
        }
        c.end_sketch();
        let res = c.self_intersections(0.1);
        assert!(!res.is_empty());
        assert!(res.iter().all(|i| i.s < i.t));
    }

    #[test]
    fn set_end_points_moves_ends() {
        let mut c = line(0.0, 0.0, 10.0, 0.0);
        c.set_end_points(sample(0.0, 1.0), sample(10.0, 3.0));
        assert_relative_eq!(c.start().y, 1.0, epsilon = 1e-9);
        assert_relative_eq!(c.end().y, 3.0, epsilon = 1e-9);
        assert_relative_eq!(c.eval(c.length() * 0.5).y, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn sculpt_deform_keeps_ends_fixed() {
        let mut c = line(0.0, 0.0, 20.0, 0.0);
        let d = c.prepare_sculpt(10.0, 1.0, 5.0);
        assert_relative_eq!(d, 1.0, epsilon = 1e-9);
        c.begin_sculpt_deform(10.0, 0.0);
        c.continue_sculpt_deform(10.0, 4.0);
        c.end_sculpt_deform();
        assert_relative_eq!(c.start().y, 0.0);
        assert_relative_eq!(c.end().y, 0.0);
        let top = c.vertices().iter().map(|v| v.y).fold(f64::MIN, f64::max);
        assert!(top > 3.5 && top < 4.0 + 1e-9);
    }

    #[test]
    fn sculpt_width_scales_handle() {
        let mut c = line(0.0, 0.0, 20.0, 0.0);
        c.prepare_sculpt(10.0, 0.0, 3.0);
        c.begin_sculpt_width(0.0, 0.0);
        c.continue_sculpt_width(2.0, 0.0);
        c.end_sculpt_width();
        assert_relative_eq!(c.vertex(10).map(|v| v.width).unwrap_or(0.0), 4.0);
        assert_relative_eq!(c.start().width, 2.0);
    }

    #[test]
    fn weight_falloff() {
        assert_relative_eq!(sculpt_weight(0.0, 2.0), 1.0);
        assert_relative_eq!(sculpt_weight(2.0, 2.0), 0.0);
        assert_relative_eq!(sculpt_weight(3.0, 2.0), 0.0);
    }

    #[test]
    fn derivative_of_line() {
        let c = line(0.0, 0.0, 0.0, 10.0);
        let d = c.derivative(5.0);
        assert_relative_eq!(d.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(d.y, 1.0, epsilon = 1e-9);
        let single = Curve::from_vertices(vec![sample(1.0, 1.0)], 1.0);
        assert_eq!(single.derivative(0.0), Vector2::new(1.0, 0.0));
    }
}
