// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Open boundary components of inbetween edges.
//!
//! A [`Path`] is either a single key vertex or a chain of open key
//! halfedges. Its end vertices are the before/after vertices of the
//! animated vertices bounding an open inbetween edge.

use std::fmt;

use nalgebra::Vector2;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use vac_lite_geometry::EdgeSample;

use crate::cycle::Cycle;
use crate::error::{Error, Result};
use crate::halfedge::KeyHalfedge;
use crate::keys::{CellId, CellSet};
use crate::proper::{ProperCycle, ProperPath};
use crate::time::Time;
use crate::vac::Vac;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    SingleVertex,
    OpenHalfedgeList,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Path {
    vertex: Option<CellId>,
    halfedges: Vec<KeyHalfedge>,
}

impl Path {
    pub fn from_vertex(vertex: CellId) -> Self {
        Self {
            vertex: Some(vertex),
            halfedges: Vec::new(),
        }
    }

    /// Path from halfedges, invalid if one of them is closed or two
    /// consecutive ones are not connected.
    pub fn from_halfedges(vac: &Vac, halfedges: Vec<KeyHalfedge>) -> Self {
        let mut res = Self {
            vertex: None,
            halfedges,
        };
        if res.halfedges.iter().any(|h| h.is_closed(vac)) {
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

    /// Chains every edge of `edges`, extending at either end.
    pub fn from_edge_set(vac: &Vac, edges: &CellSet) -> Self {
        let mut res = Self::default();
        let mut it = edges.iter();
        let Some(&first) = it.next() else {
            return res;
        };
        let Some(first_data) = vac.key_edge(first) else {
            return res;
        };
        let t = first_data.time();
        if edges
            .iter()
            .any(|e| vac.key_edge(*e).map_or(true, |d| d.time() != t))
        {
            return res;
        }
        if first_data.is_closed() {
            return res;
        }

        let mut remaining: Vec<CellId> = it.copied().collect();
        res.halfedges.push(KeyHalfedge::new(first, true));

        while !remaining.is_empty() {
            let n = res.halfedges.len();
            let last_vertex = res.halfedges[n - 1].end_vertex(vac);
            let first_vertex = res.halfedges[0].start_vertex(vac);

            let mut next = None;
            for (i, e) in remaining.iter().enumerate() {
                let Some(d) = vac.key_edge(*e) else {
                    continue;
                };
                if d.start_vertex().is_some() && d.start_vertex() == last_vertex {
                    next = Some((i, KeyHalfedge::new(*e, true)));
                    break;
                } else if d.end_vertex().is_some() && d.end_vertex() == last_vertex {
                    next = Some((i, KeyHalfedge::new(*e, false)));
                    break;
                }
            }
            if let Some((i, h)) = next {
                res.halfedges.push(h);
                remaining.remove(i);
                continue;
            }

            let mut previous = None;
            for (i, e) in remaining.iter().enumerate() {
                let Some(d) = vac.key_edge(*e) else {
                    continue;
                };
                if d.end_vertex().is_some() && d.end_vertex() == first_vertex {
                    previous = Some((i, KeyHalfedge::new(*e, true)));
                    break;
                } else if d.start_vertex().is_some() && d.start_vertex() == first_vertex {
                    previous = Some((i, KeyHalfedge::new(*e, false)));
                    break;
                }
            }
            match previous {
                Some((i, h)) => {
                    res.halfedges.insert(0, h);
                    remaining.remove(i);
                }
                None => {
                    res.halfedges.clear();
                    return res;
                }
            }
        }
        res
    }

    pub fn from_proper_path(proper: &ProperPath) -> Self {
        let mut res = Self::default();
        if proper.is_valid() {
            res.halfedges = proper.halfedges().to_vec();
        }
        res
    }

    /// Opens a proper cycle of open halfedges at its first vertex.
    pub fn from_proper_cycle(vac: &Vac, proper: &ProperCycle) -> Self {
        let mut res = Self::default();
        if proper.is_valid() && !proper.halfedges()[0].is_closed(vac) {
            res.halfedges = proper.halfedges().to_vec();
        }
        res
    }

    pub(crate) fn from_parts(vertex: Option<CellId>, halfedges: Vec<KeyHalfedge>) -> Self {
        Self { vertex, halfedges }
    }

    pub fn path_type(&self) -> PathType {
        if self.vertex.is_some() {
            PathType::SingleVertex
        } else if self.halfedges.is_empty() {
            PathType::Invalid
        } else {
            PathType::OpenHalfedgeList
        }
    }

    pub fn is_valid(&self) -> bool {
        self.path_type() != PathType::Invalid
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

    pub fn start_vertex(&self, vac: &Vac) -> Option<CellId> {
        match self.vertex {
            Some(v) => Some(v),
            None => self.halfedges.first()?.start_vertex(vac),
        }
    }

    pub fn end_vertex(&self, vac: &Vac) -> Option<CellId> {
        match self.vertex {
            Some(v) => Some(v),
            None => self.halfedges.last()?.end_vertex(vac),
        }
    }

    pub fn cells(&self, vac: &Vac) -> CellSet {
        let mut res = CellSet::new();
        match self.path_type() {
            PathType::SingleVertex => res.extend(self.vertex),
            PathType::OpenHalfedgeList => {
                for h in &self.halfedges {
                    res.extend(h.start_vertex(vac));
                    res.insert(h.edge);
                }
                res.extend(self.end_vertex(vac));
            }
            PathType::Invalid => {}
        }
        res
    }

    pub(crate) fn referenced_ids(&self) -> CellSet {
        let mut res: CellSet = self.halfedges.iter().map(|h| h.edge).collect();
        res.extend(self.vertex);
        res
    }

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

    pub fn replace_halfedge(&mut self, old: KeyHalfedge, new: KeyHalfedge) {
        for h in &mut self.halfedges {
            if h.edge == old.edge {
                h.edge = new.edge;
                h.side = (h.side == old.side) == new.side;
            }
        }
    }

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

    /// `num_samples` samples evenly spaced in arclength, first and last on
    /// the end vertices.
    pub fn sample_edge_samples(&self, vac: &Vac, num_samples: usize) -> Vec<EdgeSample> {
        if let Some(v) = self.vertex {
            let p = vac.key_vertex(v).map(|d| d.pos()).unwrap_or_else(Vector2::zeros);
            return vec![EdgeSample::from_pos(p, 0.0); num_samples];
        }
        if self.halfedges.is_empty() || num_samples < 2 {
            return Vec::new();
        }
        let ds = self.length(vac) / (num_samples - 1) as f64;
        let mut res = Vec::with_capacity(num_samples);
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
            res.push(he.sample(vac, s - cumulative));
        }
        res
    }

    pub fn sample_points(&self, vac: &Vac, num_samples: usize) -> Vec<Vector2<f64>> {
        self.sample_edge_samples(vac, num_samples)
            .iter()
            .map(|s| s.pos())
            .collect()
    }

    pub fn reversed(&self) -> Path {
        Path {
            vertex: self.vertex,
            halfedges: self.halfedges.iter().rev().map(|h| h.opposite()).collect(),
        }
    }

    /// Same text form as [`Cycle::to_id_string`].
    pub fn to_id_string(&self) -> String {
        Cycle::from_parts(self.vertex, self.halfedges.clone(), 0.0).to_id_string()
    }

    pub fn from_id_string(s: &str) -> Result<Path> {
        let c = Cycle::from_id_string(s)?;
        Ok(Path::from_parts(c.single_vertex(), c.halfedges().to_vec()))
    }

    /// Legacy text form: `vertexId [ (e,side) , ... ]`.
    pub fn to_legacy_string(&self) -> String {
        Cycle::from_parts(self.vertex, self.halfedges.clone(), 0.0).to_legacy_string()
    }

    pub fn from_legacy_string(s: &str) -> Result<Path> {
        let c = Cycle::from_legacy_string(s)?;
        if c.s0() != 0.0 {
            return Err(Error::Parse(format!("path '{}' has a starting point", s)));
        }
        Ok(Path::from_parts(c.single_vertex(), c.halfedges().to_vec()))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_id_string())
    }
}
