// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned 2D bounding boxes.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box. An empty box has `min > max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn infinite() -> Self {
        Self {
            min_x: f64::NEG_INFINITY,
            max_x: f64::INFINITY,
            min_y: f64::NEG_INFINITY,
            max_y: f64::INFINITY,
        }
    }

    /// Box spanning two corners given in any order.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            max_x: x1.max(x2),
            min_y: y1.min(y2),
            max_y: y1.max(y2),
        }
    }

    pub fn from_point(p: Vector2<f64>) -> Self {
        Self::from_corners(p.x, p.y, p.x, p.y)
    }

    pub fn from_points<'a, I: IntoIterator<Item = &'a Vector2<f64>>>(points: I) -> Self {
        let mut res = Self::empty();
        for p in points {
            res.add_point(*p);
        }
        res
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn is_infinite(&self) -> bool {
        self.min_x == f64::NEG_INFINITY
            || self.max_x == f64::INFINITY
            || self.min_y == f64::NEG_INFINITY
            || self.max_y == f64::INFINITY
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    pub fn center(&self) -> Vector2<f64> {
        Vector2::new(
            0.5 * (self.min_x + self.max_x),
            0.5 * (self.min_y + self.max_y),
        )
    }

    pub fn add_point(&mut self, p: Vector2<f64>) {
        self.min_x = self.min_x.min(p.x);
        self.max_x = self.max_x.max(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_y = self.max_y.max(p.y);
    }

    /// Grows the box by `margin` on every side. No-op on an empty box.
    pub fn expand(&mut self, margin: f64) {
        if self.is_empty() {
            return;
        }
        self.min_x -= margin;
        self.max_x += margin;
        self.min_y -= margin;
        self.max_y += margin;
    }

    pub fn unite(&mut self, other: &BoundingBox) {
        if other.is_empty() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn united(&self, other: &BoundingBox) -> BoundingBox {
        let mut res = *self;
        res.unite(other);
        res
    }

    /// Closed-interval overlap test. Empty boxes never intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains_point(&self, p: Vector2<f64>) -> bool {
        !self.is_empty()
            && self.min_x <= p.x
            && p.x <= self.max_x
            && self.min_y <= p.y
            && p.y <= self.max_y
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        if other.is_empty() {
            return true;
        }
        !self.is_empty()
            && self.min_x <= other.min_x
            && other.max_x <= self.max_x
            && self.min_y <= other.min_y
            && other.max_y <= self.max_y
    }
}
