// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flat triangle soups used for drawing and hit testing.

use crate::bbox::BoundingBox;
use nalgebra::Vector2;

#[inline]
fn cross(u: Vector2<f64>, v: Vector2<f64>) -> f64 {
    u.x * v.y - u.y * v.x
}

/// A single triangle, in any winding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vector2<f64>,
    pub b: Vector2<f64>,
    pub c: Vector2<f64>,
}

impl Triangle {
    pub fn new(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> Self {
        Self { a, b, c }
    }

    /// Point containment, boundary included.
    pub fn contains(&self, p: Vector2<f64>) -> bool {
        let a1 = cross(self.b - self.a, p - self.a);
        let a2 = cross(self.c - self.b, p - self.b);
        let a3 = cross(self.a - self.c, p - self.c);
        (a1 >= 0.0 && a2 >= 0.0 && a3 >= 0.0) || (a1 <= 0.0 && a2 <= 0.0 && a3 <= 0.0)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points([&self.a, &self.b, &self.c])
    }

    /// Separating-axis test against an axis-aligned rectangle.
    pub fn intersects_rect(&self, rect: &BoundingBox) -> bool {
        if !self.bounding_box().intersects(rect) {
            return false;
        }
        let corners = [
            Vector2::new(rect.min_x, rect.min_y),
            Vector2::new(rect.max_x, rect.min_y),
            Vector2::new(rect.max_x, rect.max_y),
            Vector2::new(rect.min_x, rect.max_y),
        ];
        let edges = [
            (self.a, self.b, self.c),
            (self.b, self.c, self.a),
            (self.c, self.a, self.b),
        ];
        for (p, q, opposite) in edges {
            let side = cross(q - p, opposite - p);
            if side == 0.0 {
                continue;
            }
            // All corners strictly on the other side of [pq] separates them.
            if corners.iter().all(|&r| cross(q - p, r - p) * side < 0.0) {
                return false;
            }
        }
        true
    }

    pub fn translated(&self, d: Vector2<f64>) -> Triangle {
        Triangle::new(self.a + d, self.b + d, self.c + d)
    }
}

/// A list of triangles covering a cell's drawn area at one time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triangles {
    triangles: Vec<Triangle>,
}

impl Triangles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn clear(&mut self) {
        self.triangles.clear();
    }

    pub fn push(&mut self, t: Triangle) {
        self.triangles.push(t);
    }

    /// Appends the triangle `(ax, ay) (bx, by) (cx, cy)`.
    pub fn append(&mut self, ax: f64, ay: f64, bx: f64, by: f64, cx: f64, cy: f64) {
        self.triangles.push(Triangle::new(
            Vector2::new(ax, ay),
            Vector2::new(bx, by),
            Vector2::new(cx, cy),
        ));
    }

    pub fn extend(&mut self, other: &Triangles) {
        self.triangles.extend_from_slice(&other.triangles);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Triangle> {
        self.triangles.iter()
    }

    pub fn as_slice(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Whether any triangle contains `p`.
    pub fn contains(&self, p: Vector2<f64>) -> bool {
        self.triangles.iter().any(|t| t.contains(p))
    }

    pub fn intersects_rect(&self, rect: &BoundingBox) -> bool {
        self.triangles.iter().any(|t| t.intersects_rect(rect))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut res = BoundingBox::empty();
        for t in &self.triangles {
            res.unite(&t.bounding_box());
        }
        res
    }

    /// Sum of unsigned triangle areas.
    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| 0.5 * cross(t.b - t.a, t.c - t.a).abs())
            .sum()
    }
}

impl<'a> IntoIterator for &'a Triangles {
    type Item = &'a Triangle;
    type IntoIter = std::slice::Iter<'a, Triangle>;

    fn into_iter(self) -> Self::IntoIter {
        self.triangles.iter()
    }
}
