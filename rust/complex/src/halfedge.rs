// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Oriented key edges.
//!
//! A [`KeyHalfedge`] is a key edge id plus a traversal side: `true` walks
//! the edge from its start vertex to its end vertex, `false` the other way.
//! All queries resolve the edge through the owning [`Vac`].

use std::fmt;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use vac_lite_geometry::EdgeSample;

use crate::error::{Error, Result};
use crate::keys::CellId;
use crate::time::Time;
use crate::vac::Vac;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyHalfedge {
    pub edge: CellId,
    pub side: bool,
}

impl KeyHalfedge {
    pub fn new(edge: CellId, side: bool) -> Self {
        Self { edge, side }
    }

    pub fn opposite(self) -> Self {
        Self {
            edge: self.edge,
            side: !self.side,
        }
    }

    pub fn start_vertex(&self, vac: &Vac) -> Option<CellId> {
        let e = vac.key_edge(self.edge)?;
        if self.side {
            e.start_vertex()
        } else {
            e.end_vertex()
        }
    }

    pub fn end_vertex(&self, vac: &Vac) -> Option<CellId> {
        let e = vac.key_edge(self.edge)?;
        if self.side {
            e.end_vertex()
        } else {
            e.start_vertex()
        }
    }

    /// True if the edge exists and is a closed loop without vertices.
    pub fn is_closed(&self, vac: &Vac) -> bool {
        vac.key_edge(self.edge).map_or(false, |e| e.is_closed())
    }

    pub fn is_split_loop(&self, vac: &Vac) -> bool {
        vac.key_edge(self.edge).map_or(false, |e| e.is_split_loop())
    }

    pub fn time(&self, vac: &Vac) -> Time {
        vac.key_edge(self.edge).map(|e| e.time()).unwrap_or_default()
    }

    pub fn length(&self, vac: &Vac) -> f64 {
        vac.key_edge(self.edge).map_or(0.0, |e| e.geometry().length())
    }

    /// Position at arclength `s`, measured along the traversal direction.
    pub fn pos(&self, vac: &Vac, s: f64) -> Vector2<f64> {
        self.sample(vac, s).pos()
    }

    pub fn sample(&self, vac: &Vac, s: f64) -> EdgeSample {
        let Some(e) = vac.key_edge(self.edge) else {
            return EdgeSample::default();
        };
        let g = e.geometry();
        if self.side {
            g.pos(s)
        } else {
            g.pos(g.length() - s)
        }
    }

    pub fn left_pos(&self, vac: &Vac) -> Vector2<f64> {
        self.pos(vac, 0.0)
    }

    pub fn right_pos(&self, vac: &Vac) -> Vector2<f64> {
        self.pos(vac, self.length(vac))
    }

    /// Unit tangent leaving the start vertex.
    pub fn left_der(&self, vac: &Vac) -> Vector2<f64> {
        let Some(e) = vac.key_edge(self.edge) else {
            return Vector2::new(1.0, 0.0);
        };
        let g = e.geometry();
        if self.side {
            g.der(0.0)
        } else {
            -g.der(g.length())
        }
    }

    /// Unit tangent arriving at the end vertex.
    pub fn right_der(&self, vac: &Vac) -> Vector2<f64> {
        let Some(e) = vac.key_edge(self.edge) else {
            return Vector2::new(1.0, 0.0);
        };
        let g = e.geometry();
        if self.side {
            g.der(g.length())
        } else {
            -g.der(0.0)
        }
    }

    /// Stored samples in traversal order.
    pub fn samples(&self, vac: &Vac) -> Vec<EdgeSample> {
        let Some(e) = vac.key_edge(self.edge) else {
            return Vec::new();
        };
        let mut res = e.geometry().edge_sampling();
        if !self.side {
            res.reverse();
        }
        res
    }

    /// Halfedges leaving the end vertex, excluding the way back.
    pub fn end_incident_halfedges(&self, vac: &Vac) -> Vec<KeyHalfedge> {
        let Some(v) = self.end_vertex(vac) else {
            return Vec::new();
        };
        let mut res = Vec::new();
        for e in vac.incident_key_edges(v) {
            let Some(data) = vac.key_edge(e) else {
                continue;
            };
            if data.start_vertex() == Some(v) {
                res.push(KeyHalfedge::new(e, true));
            }
            if data.end_vertex() == Some(v) {
                res.push(KeyHalfedge::new(e, false));
            }
        }
        let back = self.opposite();
        if let Some(i) = res.iter().position(|h| *h == back) {
            res.remove(i);
        }
        res
    }

    /// Next halfedge when turning with the smallest angle at the end vertex.
    /// Returns the opposite halfedge at a dead end.
    pub fn next(&self, vac: &Vac) -> KeyHalfedge {
        let u = -self.right_der(vac);
        let mut res = self.opposite();
        let mut min_angle = 5.0;
        for h in self.end_incident_halfedges(vac) {
            let angle = angle_like(u, h.left_der(vac));
            if angle < min_angle {
                min_angle = angle;
                res = h;
            }
        }
        res
    }

    /// Sorts halfedges leaving the end vertex by angle from the way back.
    pub fn sorted(&self, vac: &Vac, adj: &[KeyHalfedge]) -> Vec<KeyHalfedge> {
        let u = -self.right_der(vac);
        let mut list: Vec<(f64, KeyHalfedge)> = adj
            .iter()
            .map(|h| (angle_like(u, h.left_der(vac)), *h))
            .collect();
        list.sort_by(|a, b| a.0.total_cmp(&b.0));
        list.into_iter().map(|(_, h)| h).collect()
    }

    /// `"12+"` or `"12-"`.
    pub fn to_id_string(&self) -> String {
        format!("{}{}", self.edge, if self.side { '+' } else { '-' })
    }

    pub fn from_id_string(s: &str) -> Result<KeyHalfedge> {
        let s = s.trim();
        let (id, side) = if let Some(id) = s.strip_suffix('+') {
            (id, true)
        } else if let Some(id) = s.strip_suffix('-') {
            (id, false)
        } else {
            return Err(Error::Parse(format!("halfedge '{}' has no side", s)));
        };
        let id = id
            .parse::<u32>()
            .map_err(|_| Error::Parse(format!("invalid halfedge '{}'", s)))?;
        Ok(KeyHalfedge::new(CellId(id), side))
    }

    /// Legacy text form `(12,1)`.
    pub fn to_legacy_string(&self) -> String {
        format!("({},{})", self.edge, if self.side { 1 } else { 0 })
    }

    pub fn from_legacy_string(s: &str) -> Result<KeyHalfedge> {
        let parts: Vec<&str> = s
            .split(|c: char| c == '(' || c == ')' || c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() != 2 {
            return Err(Error::Parse(format!("invalid halfedge '{}'", s)));
        }
        let id = parts[0]
            .parse::<u32>()
            .map_err(|_| Error::Parse(format!("invalid halfedge '{}'", s)))?;
        let side = parts[1]
            .parse::<i32>()
            .map_err(|_| Error::Parse(format!("invalid halfedge '{}'", s)))?;
        Ok(KeyHalfedge::new(CellId(id), side != 0))
    }
}

impl fmt::Display for KeyHalfedge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_id_string())
    }
}

/// Monotonic substitute for the counter-clockwise angle from `u` to `v`,
/// in `[0, 4)`.
pub fn angle_like(u: Vector2<f64>, v: Vector2<f64>) -> f64 {
    let det = u.x * v.y - u.y * v.x;
    let dot = u.x * v.x + u.y * v.y;
    let mut a = det.atan2(dot);
    if a < 0.0 {
        a += 2.0 * std::f64::consts::PI;
    }
    a * 2.0 / std::f64::consts::PI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_strings() {
        let h = KeyHalfedge::new(CellId(12), false);
        assert_eq!(h.to_id_string(), "12-");
        assert_eq!(KeyHalfedge::from_id_string("12-").unwrap(), h);
        assert!(KeyHalfedge::from_id_string("12").is_err());
        assert_eq!(
            KeyHalfedge::from_legacy_string("( 7 , 1 )").unwrap(),
            KeyHalfedge::new(CellId(7), true)
        );
    }

    #[test]
    fn angles_are_monotonic() {
        let u = Vector2::new(1.0, 0.0);
        let a1 = angle_like(u, Vector2::new(1.0, 1.0));
        let a2 = angle_like(u, Vector2::new(-1.0, 0.0));
        let a3 = angle_like(u, Vector2::new(0.0, -1.0));
        assert!(0.0 < a1 && a1 < a2 && a2 < a3 && a3 < 4.0);
    }

    #[test]
    fn traversal_on_a_straight_edge() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(0), Vector2::new(10.0, 0.0));
        let e = vac.new_key_edge(a, b).unwrap();
        let h = KeyHalfedge::new(e, false);
        assert_eq!(h.start_vertex(&vac), Some(b));
        assert_eq!(h.end_vertex(&vac), Some(a));
        approx::assert_relative_eq!(h.left_pos(&vac).x, 10.0);
        approx::assert_relative_eq!(h.left_der(&vac).x, -1.0, epsilon = 1e-6);
        assert_eq!(h.next(&vac), h.opposite());
    }
}
