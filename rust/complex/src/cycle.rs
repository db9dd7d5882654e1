// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed boundary components of key faces.
//!
//! A [`Cycle`] is one of:
//!
//! - a single Steiner vertex,
//! - one closed edge traversed once or more,
//! - a list of open halfedges where each one ends where the next starts
//!   and the last one ends where the first starts.
//!
//! Invalid input yields an invalid (empty) cycle rather than an error, so
//! that callers can try several candidate cycles cheaply.

use std::fmt;

use nalgebra::Vector2;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use vac_lite_geometry::EdgeSample;

use crate::error::{Error, Result};
use crate::halfedge::KeyHalfedge;
use crate::keys::{CellId, CellSet};
use crate::proper::ProperCycle;
use crate::time::Time;
use crate::vac::Vac;

/// Sampling step used by [`Cycle::sampling`].
const CYCLE_SAMPLING_DS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleType {
    SingleVertex,
    ClosedHalfedge,
    OpenHalfedgeList,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cycle {
    vertex: Option<CellId>,
    halfedges: Vec<KeyHalfedge>,
    #[serde(default)]
    s0: f64,
}

impl Cycle {
    pub fn from_vertex(vertex: CellId) -> Self {
        Self {
            vertex: Some(vertex),
            halfedges: Vec::new(),
            s0: 0.0,
        }
    }

    /// Cycle from halfedges, invalid unless consecutive halfedges are
    /// connected and the last one ends where the first starts.
    pub fn from_halfedges(vac: &Vac, halfedges: Vec<KeyHalfedge>) -> Self {
        let mut res = Self {
            vertex: None,
            halfedges,
            s0: 0.0,
        };
        let n = res.halfedges.len();
        if n == 0 {
            return res;
        }
        if res.halfedges[0].start_vertex(vac) != res.halfedges[n - 1].end_vertex(vac) {
            res.halfedges.clear();
            return res;
        }
        for w in res.halfedges.windows(2) {
            if w[0].end_vertex(vac) != w[1].start_vertex(vac) {
                res.halfedges.clear();
                break;
            }
        }
        res
    }

    /// Simple loop through every edge of `edges`, or an invalid cycle.
    pub fn from_edge_set(vac: &Vac, edges: &CellSet) -> Self {
        Self::from_proper_cycle(&ProperCycle::from_edge_set(vac, edges))
    }

    pub fn from_proper_cycle(proper: &ProperCycle) -> Self {
        let mut res = Self::default();
        if proper.is_valid() {
            res.halfedges = proper.halfedges().to_vec();
        }
        res
    }

    /// Builds a cycle without validation. Used when reading documents,
    /// before referenced edges exist.
    pub(crate) fn from_parts(vertex: Option<CellId>, halfedges: Vec<KeyHalfedge>, s0: f64) -> Self {
        Self {
            vertex,
            halfedges,
            s0,
        }
    }

    pub fn cycle_type(&self, vac: &Vac) -> CycleType {
        if self.vertex.is_some() {
            CycleType::SingleVertex
        } else if self.halfedges.is_empty() {
            CycleType::Invalid
        } else if self.halfedges[0].is_closed(vac) {
            CycleType::ClosedHalfedge
        } else {
            CycleType::OpenHalfedgeList
        }
    }

    pub fn is_valid(&self) -> bool {
        self.vertex.is_some() || !self.halfedges.is_empty()
    }

    pub fn time(&self, vac: &Vac) -> Time {
        if let Some(v) = self.vertex {
            vac.key_vertex(v).map(|d| d.time()).unwrap_or_default()
        } else if let Some(h) = self.halfedges.first() {
            h.time(vac)
        } else {
            Time::default()
        }
    }

    pub fn single_vertex(&self) -> Option<CellId> {
        self.vertex
    }

    pub fn halfedges(&self) -> &[KeyHalfedge] {
        &self.halfedges
    }

    pub fn len(&self) -> usize {
        self.halfedges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.halfedges.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<KeyHalfedge> {
        self.halfedges.get(i).copied()
    }

    /// Key cells used by this cycle.
    pub fn cells(&self, vac: &Vac) -> CellSet {
        let mut res = CellSet::new();
        match self.cycle_type(vac) {
            CycleType::SingleVertex => {
                res.extend(self.vertex);
            }
            CycleType::ClosedHalfedge => {
                res.insert(self.halfedges[0].edge);
            }
            CycleType::OpenHalfedgeList => {
                for h in &self.halfedges {
                    res.extend(h.start_vertex(vac));
                    res.insert(h.edge);
                }
            }
            CycleType::Invalid => {}
        }
        res
    }

    /// Ids referenced by this cycle, without resolving them.
    pub(crate) fn referenced_ids(&self) -> CellSet {
        let mut res: CellSet = self.halfedges.iter().map(|h| h.edge).collect();
        res.extend(self.vertex);
        res
    }

    /// Replaces every use of `old` by the chain `new_edges`, which goes from
    /// the start to the end vertex of `old`.
    pub fn replace_edges(&mut self, old: CellId, new_edges: &[CellId]) {
        let mut res = Vec::with_capacity(self.halfedges.len() + new_edges.len());
        for h in &self.halfedges {
            if h.edge == old {
                if h.side {
                    res.extend(new_edges.iter().map(|e| KeyHalfedge::new(*e, true)));
                } else {
                    res.extend(new_edges.iter().rev().map(|e| KeyHalfedge::new(*e, false)));
                }
            } else {
                res.push(*h);
            }
        }
        self.halfedges = res;
    }

    pub fn replace_vertex(&mut self, old: CellId, new: CellId) {
        if self.vertex == Some(old) {
            self.vertex = Some(new);
        }
    }

    /// Replaces the edge of `old` by the edge of `new`, composing sides.
    pub fn replace_halfedge(&mut self, old: KeyHalfedge, new: KeyHalfedge) {
        for h in &mut self.halfedges {
            if h.edge == old.edge {
                h.edge = new.edge;
                h.side = (h.side == old.side) == new.side;
            }
        }
    }

    /// Rewrites ids through `map`, keeping unmapped ids.
    pub(crate) fn remap(&mut self, map: &FxHashMap<CellId, CellId>) {
        if let Some(v) = self.vertex.as_mut() {
            *v = map.get(v).copied().unwrap_or(*v);
        }
        for h in &mut self.halfedges {
            h.edge = map.get(&h.edge).copied().unwrap_or(h.edge);
        }
    }

    pub fn length(&self, vac: &Vac) -> f64 {
        self.halfedges.iter().map(|h| h.length(vac)).sum()
    }

    /// `num_samples` samples evenly spaced in arclength, rotated to start at
    /// the starting point `s0` (a fraction of the length).
    pub fn sample_edge_samples(&self, vac: &Vac, num_samples: usize) -> Vec<EdgeSample> {
        if let Some(v) = self.vertex {
            let p = vac.key_vertex(v).map(|d| d.pos()).unwrap_or_else(Vector2::zeros);
            return vec![EdgeSample::from_pos(p, 0.0); num_samples];
        }
        if self.halfedges.is_empty() || num_samples < 2 {
            return Vec::new();
        }
        let l = self.length(vac);
        let ds = l / (num_samples - 1) as f64;
        let mut raw = Vec::with_capacity(num_samples);
        let mut cumulative = 0.0;
        let mut index = 0;
        let mut he = self.halfedges[0];
        let mut he_len = he.length(vac);
        for i in 0..num_samples {
            let s = i as f64 * ds;
            while s > cumulative + he_len && index + 1 < self.halfedges.len() {
                cumulative += he_len;
                index += 1;
                he = self.halfedges[index];
                he_len = he.length(vac);
            }
            raw.push(he.sample(vac, s - cumulative));
        }
        let i0 = ((num_samples as f64 * self.s0 + 0.5).floor().max(0.0) as usize).min(num_samples - 1);
        let mut res = Vec::with_capacity(num_samples);
        res.extend_from_slice(&raw[i0..]);
        res.extend_from_slice(&raw[..i0]);
        res
    }

    pub fn sample_points(&self, vac: &Vac, num_samples: usize) -> Vec<Vector2<f64>> {
        self.sample_edge_samples(vac, num_samples)
            .iter()
            .map(|s| s.pos())
            .collect()
    }

    /// Default sampling, about one sample every 3 units.
    pub fn sampling(&self, vac: &Vac) -> Vec<Vector2<f64>> {
        let n = (self.length(vac) / CYCLE_SAMPLING_DS + 4.0) as usize;
        self.sample_points(vac, n)
    }

    /// Sum of signed turning angles along the default sampling.
    pub fn total_curvature(&self, vac: &Vac) -> f64 {
        match self.cycle_type(vac) {
            CycleType::Invalid | CycleType::SingleVertex => 0.0,
            _ => {
                let samples = self.sampling(vac);
                let n = samples.len();
                if n <= 4 {
                    return 0.0;
                }
                // Last sample ignored, it duplicates the first
                let m = n - 1;
                let mut res = 0.0;
                for i in 0..m {
                    let a = samples[(m + i - 1) % m];
                    let b = samples[i % m];
                    let c = samples[(i + 1) % m];
                    let ab = b - a;
                    let bc = c - b;
                    let dot = ab.x * bc.x + ab.y * bc.y;
                    let det = ab.x * bc.y - ab.y * bc.x;
                    res += det.atan2(dot);
                }
                res
            }
        }
    }

    pub fn turning_number(&self, vac: &Vac) -> i32 {
        (0.5 + 0.5 * self.total_curvature(vac) / std::f64::consts::PI).floor() as i32
    }

    pub fn s0(&self) -> f64 {
        self.s0
    }

    pub fn set_starting_point(&mut self, s0: f64) {
        self.s0 = s0;
    }

    pub fn reversed(&self) -> Cycle {
        Cycle {
            vertex: self.vertex,
            halfedges: self.halfedges.iter().rev().map(|h| h.opposite()).collect(),
            s0: if self.s0 != 0.0 { 1.0 - self.s0 } else { 0.0 },
        }
    }

    /// `"[3]"` for a Steiner vertex, `"[1+ 2- 5+]"` otherwise.
    pub fn to_id_string(&self) -> String {
        match self.vertex {
            Some(v) => format!("[{}]", v),
            None => {
                let parts: Vec<String> = self.halfedges.iter().map(|h| h.to_id_string()).collect();
                format!("[{}]", parts.join(" "))
            }
        }
    }

    pub fn from_id_string(s: &str) -> Result<Cycle> {
        let parts: Vec<&str> = s
            .split(|c: char| c == ',' || c == '[' || c == ']' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        let Some(first) = parts.first() else {
            return Ok(Cycle::default());
        };
        if parts.len() == 1 && !first.ends_with('+') && !first.ends_with('-') {
            let id = first
                .parse::<u32>()
                .map_err(|_| Error::Parse(format!("invalid cycle '{}'", s)))?;
            return Ok(Cycle::from_vertex(CellId(id)));
        }
        let halfedges = parts
            .iter()
            .map(|p| KeyHalfedge::from_id_string(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Cycle::from_parts(None, halfedges, 0.0))
    }

    /// Legacy text form: `vertexId [s0] [ (e,side) , ... ]`, `-1` when
    /// there is no Steiner vertex.
    pub fn to_legacy_string(&self) -> String {
        let mut res = match self.vertex {
            Some(v) => v.to_string(),
            None => "-1".to_string(),
        };
        if self.s0 != 0.0 {
            res.push(' ');
            res.push_str(&vac_lite_geometry::format_number(self.s0));
        }
        res.push_str(" [");
        for (i, h) in self.halfedges.iter().enumerate() {
            if i != 0 {
                res.push_str(" ,");
            }
            res.push(' ');
            res.push_str(&h.to_legacy_string());
        }
        res.push_str(" ]");
        res
    }

    pub fn from_legacy_string(s: &str) -> Result<Cycle> {
        let i = s
            .find('[')
            .ok_or_else(|| Error::Parse(format!("invalid cycle '{}'", s)))?;
        let head: Vec<&str> = s[..i].split_whitespace().collect();
        let vertex = match head.first() {
            Some(v) => {
                let id = v
                    .parse::<i64>()
                    .map_err(|_| Error::Parse(format!("invalid cycle vertex '{}'", v)))?;
                u32::try_from(id).ok().map(CellId)
            }
            None => None,
        };
        let s0 = match head.get(1) {
            Some(v) => v
                .parse::<f64>()
                .map_err(|_| Error::Parse(format!("invalid starting point '{}'", v)))?,
            None => 0.0,
        };
        let body = s[i..].trim().trim_start_matches('[').trim_end_matches(']');
        let halfedges = body
            .split(')')
            .map(|p| p.trim().trim_start_matches(',').trim())
            .filter(|p| !p.is_empty())
            .map(KeyHalfedge::from_legacy_string)
            .collect::<Result<Vec<_>>>()?;
        Ok(Cycle::from_parts(vertex, halfedges, s0))
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_id_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> (Vac, [CellId; 3], [CellId; 3]) {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(100.0, 0.0));
        let c = vac.new_key_vertex(t, Vector2::new(0.0, 100.0));
        let ab = vac.new_key_edge(a, b).unwrap();
        let bc = vac.new_key_edge(b, c).unwrap();
        let ca = vac.new_key_edge(c, a).unwrap();
        (vac, [a, b, c], [ab, bc, ca])
    }

    #[test]
    fn edge_set_loop() {
        let (vac, _, [ab, bc, ca]) = triangle();
        let cycle = Cycle::from_edge_set(&vac, &[ab, bc, ca].into_iter().collect());
        assert_eq!(cycle.cycle_type(&vac), CycleType::OpenHalfedgeList);
        assert_eq!(cycle.len(), 3);
        assert_eq!(cycle.cells(&vac).len(), 6);
    }

    #[test]
    fn disconnected_halfedges_are_invalid() {
        let (vac, _, [ab, bc, _]) = triangle();
        let cycle = Cycle::from_halfedges(
            &vac,
            vec![KeyHalfedge::new(ab, true), KeyHalfedge::new(bc, true)],
        );
        assert!(!cycle.is_valid());
    }

    #[test]
    fn turning_number_sign() {
        let (vac, _, [ab, bc, ca]) = triangle();
        let ccw = Cycle::from_halfedges(
            &vac,
            vec![
                KeyHalfedge::new(ab, true),
                KeyHalfedge::new(bc, true),
                KeyHalfedge::new(ca, true),
            ],
        );
        assert_eq!(ccw.turning_number(&vac), 1);
        assert_eq!(ccw.reversed().turning_number(&vac), -1);
    }

    #[test]
    fn replace_edges_respects_side() {
        let mut c = Cycle::from_parts(None, vec![KeyHalfedge::new(CellId(1), false)], 0.0);
        c.replace_edges(CellId(1), &[CellId(5), CellId(6)]);
        assert_eq!(c.to_id_string(), "[6- 5-]");
    }

    #[test]
    fn sampling_length() {
        let (vac, _, [ab, bc, ca]) = triangle();
        let c = Cycle::from_edge_set(&vac, &[ab, bc, ca].into_iter().collect());
        let l = 200.0 + 100.0 * 2f64.sqrt();
        assert_relative_eq!(c.length(&vac), l, epsilon = 1e-6);
        let pts = c.sample_points(&vac, 10);
        assert_eq!(pts.len(), 10);
        assert_relative_eq!(pts[0].x, pts[9].x, epsilon = 1e-6);
    }

    #[test]
    fn string_forms() {
        let c = Cycle::from_id_string("[1+ 2- 3+]").unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(Cycle::from_id_string("[4]").unwrap().single_vertex(), Some(CellId(4)));
        let legacy = c.to_legacy_string();
        assert_eq!(legacy, "-1 [ (1,1) , (2,0) , (3,1) ]");
        assert_eq!(Cycle::from_legacy_string(&legacy).unwrap(), c);
    }
}
