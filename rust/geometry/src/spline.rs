// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge geometry
//!
//! [`LinearSpline`] is the geometry carried by key edges: a dense
//! [`Curve`] plus the editing entry points used by the interactive tools
//! (end point snapping, sculpting, drag and drop) and stroke tessellation.

use crate::curve::{sculpt_weight, Curve, DEFAULT_DS};
use crate::error::{Error, Result};
use crate::sample::EdgeSample;
use crate::text::{format_number, split_numbers};
use crate::triangles::Triangles;
use nalgebra::Vector2;

/// Prefix of the dense curve attribute format.
pub const CURVE_PREFIX: &str = "xyw-dense";

const CAP_SEGMENTS: usize = 50;
const SUBDIVISION_WEIGHT: f64 = 0.0625;

/// Closest point of an edge geometry to a query position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub sample: EdgeSample,
    pub s: f64,
    pub distance: f64,
}

/// Piecewise linear stroke geometry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearSpline {
    curve: Curve,
    drag_last: Vector2<f64>,
}

impl LinearSpline {
    pub fn new(ds: f64) -> Self {
        Self {
            curve: Curve::new(ds),
            drag_last: Vector2::zeros(),
        }
    }

    pub fn from_samples(samples: Vec<EdgeSample>) -> Self {
        Self::from_curve(Curve::from_vertices(samples, DEFAULT_DS), false)
    }

    pub fn from_curve(mut curve: Curve, closed: bool) -> Self {
        if closed {
            curve.make_loop();
        }
        Self {
            curve,
            drag_last: Vector2::zeros(),
        }
    }

    /// Straight stroke of constant width, resampled at `ds`.
    pub fn straight(start: Vector2<f64>, end: Vector2<f64>, width: f64, ds: f64) -> Self {
        Self::from_curve(
            Curve::straight(
                EdgeSample::from_pos(start, width),
                EdgeSample::from_pos(end, width),
                ds,
            ),
            false,
        )
    }

    /// Polyline through `points` at constant width, without resampling.
    pub fn from_points(points: &[Vector2<f64>], width: f64) -> Self {
        Self::from_samples(
            points
                .iter()
                .map(|p| EdgeSample::from_pos(*p, width))
                .collect(),
        )
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn curve_mut(&mut self) -> &mut Curve {
        &mut self.curve
    }

    pub fn is_closed(&self) -> bool {
        self.curve.is_closed()
    }

    pub fn make_loop(&mut self) {
        self.curve.make_loop();
    }

    pub fn len(&self) -> usize {
        self.curve.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curve.is_empty()
    }

    pub fn ds(&self) -> f64 {
        self.curve.ds()
    }

    pub fn samples(&self) -> &[EdgeSample] {
        self.curve.vertices()
    }

    // --- Sketching ---

    pub fn begin_sketch(&mut self, sample: EdgeSample) {
        self.curve.begin_sketch(sample);
    }

    pub fn continue_sketch(&mut self, sample: EdgeSample) {
        self.curve.continue_sketch(sample);
    }

    pub fn end_sketch(&mut self) {
        self.curve.end_sketch();
    }

    // --- Evaluation ---

    pub fn length(&self) -> f64 {
        self.curve.length()
    }

    pub fn pos(&self, s: f64) -> EdgeSample {
        self.curve.eval(s)
    }

    pub fn pos2d(&self, s: f64) -> Vector2<f64> {
        self.curve.pos(s)
    }

    pub fn left_pos(&self) -> EdgeSample {
        self.curve.start()
    }

    pub fn right_pos(&self) -> EdgeSample {
        self.curve.end()
    }

    pub fn left_pos2d(&self) -> Vector2<f64> {
        self.curve.start().pos()
    }

    pub fn right_pos2d(&self) -> Vector2<f64> {
        self.curve.end().pos()
    }

    /// Unit tangent at `s`.
    pub fn der(&self, s: f64) -> Vector2<f64> {
        self.curve.derivative(s)
    }

    /// The stored samples, start to end.
    pub fn edge_sampling(&self) -> Vec<EdgeSample> {
        self.curve.vertices().to_vec()
    }

    /// Positions resampled at step `ds`, without changing the geometry.
    pub fn sampling(&self, ds: f64) -> Vec<Vector2<f64>> {
        let mut c = self.curve.clone();
        c.resample_with(ds);
        c.vertices().iter().map(|v| v.pos()).collect()
    }

    pub fn trimmed(&self, from: f64, to: f64) -> Result<LinearSpline> {
        Ok(LinearSpline::from_curve(self.curve.trimmed(from, to)?, false))
    }

    pub fn resample(&mut self) {
        self.curve.resample();
    }

    pub fn resample_with(&mut self, ds: f64) {
        self.curve.resample_with(ds);
    }

    // --- Editing ---

    /// Moves the endpoints, keeping their widths. Closed curves only
    /// resample.
    pub fn set_left_right_pos(&mut self, left: Vector2<f64>, right: Vector2<f64>) {
        if self.is_closed() {
            self.curve.resample();
            return;
        }
        let mut l = self.curve.start();
        l.set_pos(left);
        let mut r = self.curve.end();
        r.set_pos(right);
        self.curve.set_end_points(l, r);
    }

    pub fn set_left_der(&mut self, der: Vector2<f64>, resample: bool) {
        self.curve.set_start_derivative(der);
        if resample {
            self.curve.resample();
        }
    }

    pub fn set_right_der(&mut self, der: Vector2<f64>, resample: bool) {
        self.curve.set_end_derivative(der);
        if resample {
            self.curve.resample();
        }
    }

    pub fn set_width(&mut self, width: f64) {
        self.curve.set_width(width);
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.curve.translate(dx, dy);
    }

    /// Selects the sculpt handle nearest to `(x, y)` and returns its
    /// distance.
    pub fn update_sculpt(&mut self, x: f64, y: f64, radius: f64) -> f64 {
        self.curve.prepare_sculpt(x, y, radius)
    }

    pub fn sculpt_vertex(&self) -> Option<EdgeSample> {
        self.curve.sculpt_vertex()
    }

    pub fn arclength_of_sculpt_vertex(&self) -> f64 {
        self.curve.arclength_of_sculpt_vertex()
    }

    pub fn begin_sculpt_deform(&mut self, x: f64, y: f64) {
        self.curve.begin_sculpt_deform(x, y);
    }

    pub fn continue_sculpt_deform(&mut self, x: f64, y: f64) {
        self.curve.continue_sculpt_deform(x, y);
    }

    pub fn end_sculpt_deform(&mut self) {
        self.curve.end_sculpt_deform();
    }

    pub fn begin_sculpt_edge_width(&mut self, x: f64, y: f64) {
        self.curve.begin_sculpt_width(x, y);
    }

    pub fn continue_sculpt_edge_width(&mut self, x: f64, y: f64) {
        self.curve.continue_sculpt_width(x, y);
    }

    pub fn end_sculpt_edge_width(&mut self) {
        self.curve.end_sculpt_width();
    }

    pub fn continue_sculpt_smooth(&mut self) {
        self.curve.sculpt_smooth(0.05);
    }

    /// Weight of the sculpt falloff at arclength distance `s`.
    pub fn sculpt_weight(&self, s: f64) -> f64 {
        sculpt_weight(s, self.curve.sculpt_radius())
    }

    pub fn prepare_drag_and_drop(&mut self) {
        self.drag_last = Vector2::zeros();
    }

    /// Translates by the total offset `(dx, dy)` since the drag started.
    pub fn perform_drag_and_drop(&mut self, dx: f64, dy: f64) {
        self.curve
            .translate(dx - self.drag_last.x, dy - self.drag_last.y);
        self.drag_last = Vector2::new(dx, dy);
    }

    pub fn closest_point(&self, x: f64, y: f64) -> Option<ClosestPoint> {
        self.curve.find_closest_vertex(x, y).map(|c| ClosestPoint {
            sample: self.curve.vertices()[c.index],
            s: self.curve.arclength(c.index),
            distance: c.distance,
        })
    }

    // --- Tessellation ---

    /// Stroke triangles with round caps. `num_sub` rounds of four-point
    /// subdivision are applied first.
    pub fn triangulate(&self, num_sub: usize) -> Triangles {
        if self.length() < 0.1 {
            return Triangles::new();
        }
        triangulate_stroke(self.curve.vertices(), self.is_closed(), num_sub)
    }

    /// Same as [`LinearSpline::triangulate`] with a constant width.
    pub fn triangulate_with_width(&self, width: f64, num_sub: usize) -> Triangles {
        let samples: Vec<EdgeSample> = self
            .curve
            .vertices()
            .iter()
            .map(|v| EdgeSample::new(v.x, v.y, width))
            .collect();
        triangulate_stroke(&samples, self.is_closed(), num_sub)
    }

    // --- Text ---

    /// `"xyw-dense: ds x,y,w x,y,w ..."`
    pub fn to_curve_string(&self) -> String {
        let mut d = String::new();
        d.push_str(CURVE_PREFIX);
        d.push_str(": ");
        d.push_str(&format_number(self.curve.ds()));
        for v in self.curve.vertices() {
            d.push(' ');
            d.push_str(&format_number(v.x));
            d.push(',');
            d.push_str(&format_number(v.y));
            d.push(',');
            d.push_str(&format_number(v.width));
        }
        d
    }

    /// Parses the output of [`LinearSpline::to_curve_string`].
    pub fn from_curve_string(s: &str) -> Result<LinearSpline> {
        let body = match s.trim().split_once(':') {
            Some((kind, body)) => {
                if kind.trim() != CURVE_PREFIX {
                    return Err(Error::InvalidCurveData(format!(
                        "unsupported curve type '{}'",
                        kind.trim()
                    )));
                }
                body
            }
            None => s,
        };
        let values = split_numbers(body)
            .map(|p| {
                p.parse::<f64>()
                    .map_err(|_| Error::InvalidCurveData(format!("not a number: '{}'", p)))
            })
            .collect::<Result<Vec<f64>>>()?;
        let (ds, rest) = values
            .split_first()
            .ok_or_else(|| Error::EmptyCurve("missing sampling step".to_string()))?;
        let samples = rest
            .chunks_exact(3)
            .map(|c| EdgeSample::new(c[0], c[1], c[2]))
            .collect();
        Ok(LinearSpline::from_curve(Curve::from_vertices(samples, *ds), false))
    }
}

/// Sample list that wraps (closed) or clamps (open) its indices.
struct Sampling {
    samples: Vec<EdgeSample>,
    closed: bool,
}

impl Sampling {
    fn get(&self, i: isize) -> EdgeSample {
        let n = self.samples.len() as isize;
        let i = if self.closed {
            i.rem_euclid(n)
        } else {
            i.clamp(0, n - 1)
        };
        self.samples[i as usize]
    }

    /// One round of four-point interpolating subdivision.
    fn subdivided(&self) -> Sampling {
        let n = self.samples.len() as isize;
        let mut out = Vec::with_capacity(2 * self.samples.len());
        let w = SUBDIVISION_WEIGHT;
        for i in 0..n {
            out.push(self.get(i));
            if self.closed || i < n - 1 {
                let mid = (self.get(i) + self.get(i + 1)) * (0.5 + w)
                    - (self.get(i - 1) + self.get(i + 2)) * w;
                out.push(mid);
            }
        }
        Sampling {
            samples: out,
            closed: self.closed,
        }
    }
}

fn direction(p: &EdgeSample, q: &EdgeSample) -> Vector2<f64> {
    let d = q.pos() - p.pos();
    let n = d.norm();
    if n > 0.0 {
        d / n
    } else {
        Vector2::new(1.0, 0.0)
    }
}

fn push_disk(out: &mut Triangles, center: &EdgeSample) {
    let r = 0.5 * center.width;
    let (cx, cy) = (center.x, center.y);
    for i in 0..CAP_SEGMENTS {
        let t1 = 2.0 * std::f64::consts::PI * i as f64 / CAP_SEGMENTS as f64;
        let t2 = 2.0 * std::f64::consts::PI * (i + 1) as f64 / CAP_SEGMENTS as f64;
        out.append(
            cx + r * t1.cos(),
            cy + r * t1.sin(),
            cx + r * t2.cos(),
            cy + r * t2.sin(),
            cx,
            cy,
        );
    }
}

/// Quad strip along the samples, offset by half the width along the
/// bisector normal, plus a round cap at each end.
pub fn triangulate_stroke(input: &[EdgeSample], closed: bool, num_sub: usize) -> Triangles {
    let mut out = Triangles::new();
    if input.len() < 2 {
        return out;
    }

    let mut sampling = Sampling {
        samples: input.to_vec(),
        closed,
    };
    if closed {
        sampling.samples.pop();
        if sampling.samples.len() < 2 {
            return out;
        }
    }
    for _ in 0..num_sub {
        sampling = sampling.subdivided();
    }
    let mut samples = sampling.samples;
    if closed {
        samples.push(samples[0]);
    }
    let n = samples.len();

    // dirs[i] is the incoming direction at sample i, dirs[i + 1] the outgoing one.
    let mut dirs = Vec::with_capacity(n + 1);
    dirs.push(if closed {
        direction(&samples[n - 2], &samples[n - 1])
    } else {
        direction(&samples[0], &samples[1])
    });
    for i in 1..n {
        dirs.push(direction(&samples[i - 1], &samples[i]));
    }
    dirs.push(if closed {
        direction(&samples[0], &samples[1])
    } else {
        direction(&samples[n - 2], &samples[n - 1])
    });

    let mut sides = Vec::with_capacity(n);
    for i in 0..n {
        let h = 0.5 * samples[i].width;
        let u = dirs[i] + dirs[i + 1];
        let v = if u.norm_squared() > 0.0 {
            let u = u.normalize();
            Vector2::new(-u.y, u.x)
        } else {
            dirs[i]
        };
        let p = samples[i].pos();
        sides.push((p + v * h, p - v * h));
    }

    for i in 1..n {
        let (a, b) = sides[i - 1];
        let (c, d) = sides[i];
        out.append(a.x, a.y, b.x, b.y, d.x, d.y);
        out.append(a.x, a.y, d.x, d.y, c.x, c.y);
    }

    push_disk(&mut out, &samples[0]);
    push_disk(&mut out, &samples[n - 1]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn curve_string_round_trip() {
        let spline = LinearSpline::from_samples(vec![
            EdgeSample::new(0.0, 0.0, 3.0),
            EdgeSample::new(1.5, -2.0, 4.25),
        ]);
        let s = spline.to_curve_string();
        assert_eq!(s, "xyw-dense: 5 0,0,3 1.5,-2,4.25");
        let back = LinearSpline::from_curve_string(&s).unwrap();
        assert_eq!(back.samples(), spline.samples());
        assert_relative_eq!(back.ds(), 5.0);
    }

    #[test]
    fn rejects_unknown_prefix() {
        assert!(LinearSpline::from_curve_string("bezier: 1 0,0,1").is_err());
        assert!(LinearSpline::from_curve_string("xyw-dense: a b").is_err());
    }

    #[test]
    fn stroke_covers_centerline() {
        let spline = LinearSpline::straight(Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0), 2.0, 1.0);
        let tris = spline.triangulate(0);
        assert!(tris.contains(Vector2::new(5.0, 0.9)));
        assert!(!tris.contains(Vector2::new(5.0, 1.5)));
        // Round caps extend past the ends.
        assert!(tris.contains(Vector2::new(-0.9, 0.0)));
    }

    #[test]
    fn tiny_strokes_are_not_drawn() {
        let spline = LinearSpline::straight(Vector2::new(0.0, 0.0), Vector2::new(0.01, 0.0), 2.0, 1.0);
        assert!(spline.triangulate(0).is_empty());
    }

    #[test]
    fn subdivision_doubles_samples() {
        let samples = vec![
            EdgeSample::new(0.0, 0.0, 1.0),
            EdgeSample::new(1.0, 0.0, 1.0),
            EdgeSample::new(2.0, 0.0, 1.0),
        ];
        let s = Sampling { samples, closed: false }.subdivided();
        assert_eq!(s.samples.len(), 5);
        assert_relative_eq!(s.samples[1].x, 0.4375);
        assert_relative_eq!(s.samples[1].width, 1.0);
    }

    #[test]
    fn drag_and_drop_is_relative_to_start() {
        let mut spline = LinearSpline::straight(Vector2::new(0.0, 0.0), Vector2::new(4.0, 0.0), 1.0, 1.0);
        spline.prepare_drag_and_drop();
        spline.perform_drag_and_drop(1.0, 0.0);
        spline.perform_drag_and_drop(3.0, 2.0);
        assert_relative_eq!(spline.left_pos().x, 3.0);
        assert_relative_eq!(spline.left_pos().y, 2.0);
    }

    #[test]
    fn set_left_right_pos_keeps_widths() {
        let mut spline = LinearSpline::from_samples(vec![
            EdgeSample::new(0.0, 0.0, 2.0),
            EdgeSample::new(10.0, 0.0, 6.0),
        ]);
        spline.set_left_right_pos(Vector2::new(0.0, 5.0), Vector2::new(10.0, 5.0));
        assert_relative_eq!(spline.left_pos().y, 5.0);
        assert_relative_eq!(spline.left_pos().width, 2.0);
        assert_relative_eq!(spline.right_pos().width, 6.0);
    }

    #[test]
    fn closest_point_reports_arclength() {
        let spline = LinearSpline::straight(Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0), 1.0, 1.0);
        let c = spline.closest_point(3.0, 2.0).unwrap();
        assert_relative_eq!(c.s, 3.0, epsilon = 1e-9);
        assert_relative_eq!(c.distance, 2.0, epsilon = 1e-9);
    }
}
