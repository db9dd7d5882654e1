// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! VAC-Lite Geometry
//!
//! Stroke geometry for vector animation complexes: width-carrying samples,
//! dense polyline curves with sketching and sculpting, stroke tessellation
//! and even-odd face triangulation using earcutr.

pub mod bbox;
pub mod curve;
pub mod error;
pub mod sample;
pub mod spline;
pub mod text;
pub mod triangles;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix3, Vector2};

pub use bbox::BoundingBox;
pub use curve::{Curve, Intersection, DEFAULT_DS};
pub use error::{Error, Result};
pub use sample::EdgeSample;
pub use spline::{ClosestPoint, LinearSpline};
pub use text::format_number;
pub use triangles::{Triangle, Triangles};
pub use triangulation::{point_in_contours, signed_area, triangulate_contours};
