// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chains of inbetween vertices bounding open inbetween edges.

use std::fmt;

use nalgebra::Vector2;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keys::{CellId, CellSet};
use crate::time::Time;
use crate::vac::Vac;

/// Ordered inbetween vertices where each one ends at the key vertex the
/// next one starts from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimatedVertex {
    inbetween_vertices: Vec<CellId>,
}

impl AnimatedVertex {
    pub fn new(inbetween_vertices: Vec<CellId>) -> Self {
        Self { inbetween_vertices }
    }

    /// Checks that consecutive inbetween vertices share their key vertex.
    pub fn is_chained(&self, vac: &Vac) -> bool {
        self.inbetween_vertices.windows(2).all(|w| {
            let a = vac.inbetween_vertex(w[0]).map(|d| d.after_vertex());
            let b = vac.inbetween_vertex(w[1]).map(|d| d.before_vertex());
            a.is_some() && a == b
        })
    }

    pub fn is_valid(&self) -> bool {
        !self.inbetween_vertices.is_empty()
    }

    pub fn inbetween_vertices(&self) -> &[CellId] {
        &self.inbetween_vertices
    }

    pub fn len(&self) -> usize {
        self.inbetween_vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inbetween_vertices.is_empty()
    }

    pub fn before_vertex(&self, vac: &Vac) -> Option<CellId> {
        let first = self.inbetween_vertices.first()?;
        vac.inbetween_vertex(*first).map(|d| d.before_vertex())
    }

    pub fn after_vertex(&self, vac: &Vac) -> Option<CellId> {
        let last = self.inbetween_vertices.last()?;
        vac.inbetween_vertex(*last).map(|d| d.after_vertex())
    }

    /// The inbetween vertices and the key vertices between them, without
    /// the two extremities.
    pub fn vertices(&self, vac: &Vac) -> CellSet {
        let mut res = CellSet::new();
        let n = self.inbetween_vertices.len();
        for (i, v) in self.inbetween_vertices.iter().enumerate() {
            res.insert(*v);
            if i + 1 < n {
                if let Some(d) = vac.inbetween_vertex(*v) {
                    res.insert(d.after_vertex());
                }
            }
        }
        res
    }

    /// Replaces `old` by the consecutive pair `new1`, `new2`.
    pub fn replace_cells(&mut self, old: CellId, new1: CellId, new2: CellId) {
        let mut res = Vec::with_capacity(self.inbetween_vertices.len() + 1);
        for v in &self.inbetween_vertices {
            if *v == old {
                res.push(new1);
                res.push(new2);
            } else {
                res.push(*v);
            }
        }
        self.inbetween_vertices = res;
    }

    pub(crate) fn remap(&mut self, map: &FxHashMap<CellId, CellId>) {
        for v in &mut self.inbetween_vertices {
            *v = map.get(v).copied().unwrap_or(*v);
        }
    }

    /// Position of whichever of its vertices exists at `t`.
    pub fn pos(&self, vac: &Vac, t: Time) -> Vector2<f64> {
        let mut set = self.vertices(vac);
        set.extend(self.before_vertex(vac));
        set.extend(self.after_vertex(vac));
        for v in set {
            if vac.exists(v, t) {
                return vac.vertex_pos(v, t);
            }
        }
        tracing::warn!(time = %t, "animated vertex has no vertex at requested time");
        Vector2::zeros()
    }

    /// `"[4 7]"`.
    pub fn to_id_string(&self) -> String {
        let parts: Vec<String> = self
            .inbetween_vertices
            .iter()
            .map(|v| v.to_string())
            .collect();
        format!("[{}]", parts.join(" "))
    }

    pub fn from_id_string(s: &str) -> Result<AnimatedVertex> {
        let inbetween_vertices = s
            .split(|c: char| c == ',' || c == '[' || c == ']' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<u32>()
                    .map(CellId)
                    .map_err(|_| Error::Parse(format!("invalid animated vertex '{}'", s)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(AnimatedVertex { inbetween_vertices })
    }

    /// Legacy text form `[ 4 , 7 ]`.
    pub fn to_legacy_string(&self) -> String {
        let mut res = String::from("[");
        for (i, v) in self.inbetween_vertices.iter().enumerate() {
            if i != 0 {
                res.push_str(" ,");
            }
            res.push(' ');
            res.push_str(&v.to_string());
        }
        res.push_str(" ]");
        res
    }
}

impl fmt::Display for AnimatedVertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_id_string())
    }
}
