// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stroke samples: a 2D position with a stroke width.

use std::ops::{Add, Mul, Sub};

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// One sample of a stroke: position plus width.
///
/// Samples form a small vector space (add, subtract, scale) so that
/// inbetween geometry can be computed as `before + (after - before) * u`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeSample {
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

impl EdgeSample {
    pub fn new(x: f64, y: f64, width: f64) -> Self {
        Self { x, y, width }
    }

    /// A sample at `pos` with the given width.
    pub fn from_pos(pos: Vector2<f64>, width: f64) -> Self {
        Self::new(pos.x, pos.y, width)
    }

    #[inline]
    pub fn pos(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    #[inline]
    pub fn set_pos(&mut self, pos: Vector2<f64>) {
        self.x = pos.x;
        self.y = pos.y;
    }

    /// Euclidean distance between the positions, ignoring width.
    #[inline]
    pub fn distance_to(&self, other: &EdgeSample) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Linear interpolation of position and width: `u = 0` gives `self`.
    #[inline]
    pub fn lerp(&self, u: f64, other: &EdgeSample) -> EdgeSample {
        EdgeSample {
            x: self.x + u * (other.x - self.x),
            y: self.y + u * (other.y - self.y),
            width: self.width + u * (other.width - self.width),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for EdgeSample {
    type Output = EdgeSample;

    fn add(self, rhs: EdgeSample) -> EdgeSample {
        EdgeSample::new(self.x + rhs.x, self.y + rhs.y, self.width + rhs.width)
    }
}

impl Sub for EdgeSample {
    type Output = EdgeSample;

    fn sub(self, rhs: EdgeSample) -> EdgeSample {
        EdgeSample::new(self.x - rhs.x, self.y - rhs.y, self.width - rhs.width)
    }
}

impl Mul<f64> for EdgeSample {
    type Output = EdgeSample;

    fn mul(self, rhs: f64) -> EdgeSample {
        EdgeSample::new(self.x * rhs, self.y * rhs, self.width * rhs)
    }
}
