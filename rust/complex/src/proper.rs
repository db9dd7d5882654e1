// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simple loops and simple paths built from unordered edge sets.
//!
//! A [`ProperCycle`] visits each of its vertices once and closes; a
//! [`ProperPath`] visits each vertex once and does not close. Both are
//! building blocks for [`crate::Cycle`], [`crate::Path`] and face
//! creation.

use crate::halfedge::KeyHalfedge;
use crate::keys::{CellId, CellSet};
use crate::time::Time;
use crate::vac::Vac;

/// True if every edge of `edges` exists and lives at the same time.
fn same_time(vac: &Vac, edges: &CellSet) -> Option<Time> {
    let first = edges.iter().next()?;
    let t = vac.key_edge(*first)?.time();
    edges
        .iter()
        .all(|e| vac.key_edge(*e).map_or(false, |d| d.time() == t))
        .then_some(t)
}

/// True if no two halfedges start at the same vertex.
fn is_simple(vac: &Vac, halfedges: &[KeyHalfedge]) -> bool {
    let mut seen = CellSet::new();
    halfedges
        .iter()
        .all(|h| h.start_vertex(vac).map_or(false, |v| seen.insert(v)))
}

fn replace_in(halfedges: &mut Vec<KeyHalfedge>, old: CellId, new_edges: &[CellId]) {
    let mut res = Vec::with_capacity(halfedges.len() + new_edges.len());
    for h in halfedges.iter() {
        if h.edge != old {
            res.push(*h);
        } else if h.side {
            res.extend(new_edges.iter().map(|e| KeyHalfedge::new(*e, true)));
        } else {
            res.extend(new_edges.iter().rev().map(|e| KeyHalfedge::new(*e, false)));
        }
    }
    *halfedges = res;
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProperCycle {
    halfedges: Vec<KeyHalfedge>,
}

impl ProperCycle {
    /// Simple loop through every edge of `edges`, or an invalid cycle.
    ///
    /// A closed edge is only accepted alone. Open edges are chained from
    /// the first one (lowest id, walked forward) until the chain closes.
    pub fn from_edge_set(vac: &Vac, edges: &CellSet) -> Self {
        let invalid = Self::default();
        if same_time(vac, edges).is_none() {
            return invalid;
        }
        let mut it = edges.iter();
        let Some(&first) = it.next() else {
            return invalid;
        };
        let closed = vac.key_edge(first).map_or(false, |d| d.is_closed());
        if closed {
            return if edges.len() == 1 {
                Self {
                    halfedges: vec![KeyHalfedge::new(first, true)],
                }
            } else {
                invalid
            };
        }

        let mut halfedges = vec![KeyHalfedge::new(first, true)];
        let mut remaining: Vec<CellId> = it.copied().collect();
        while !remaining.is_empty() {
            let Some(last_vertex) = halfedges[halfedges.len() - 1].end_vertex(vac) else {
                return invalid;
            };
            let found = remaining.iter().enumerate().find_map(|(i, e)| {
                let d = vac.key_edge(*e)?;
                if d.start_vertex() == Some(last_vertex) {
                    Some((i, KeyHalfedge::new(*e, true)))
                } else if d.end_vertex() == Some(last_vertex) {
                    Some((i, KeyHalfedge::new(*e, false)))
                } else {
                    None
                }
            });
            let Some((i, h)) = found else {
                return invalid;
            };
            halfedges.push(h);
            remaining.remove(i);
        }

        let closes = halfedges[halfedges.len() - 1].end_vertex(vac) == halfedges[0].start_vertex(vac);
        if !closes || !is_simple(vac, &halfedges) {
            return invalid;
        }
        Self { halfedges }
    }

    pub fn is_valid(&self) -> bool {
        !self.halfedges.is_empty()
    }

    pub fn time(&self, vac: &Vac) -> Time {
        self.halfedges
            .first()
            .map(|h| h.time(vac))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.halfedges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.halfedges.is_empty()
    }

    pub fn halfedges(&self) -> &[KeyHalfedge] {
        &self.halfedges
    }

    pub fn replace_edges(&mut self, old: CellId, new_edges: &[CellId]) {
        replace_in(&mut self.halfedges, old, new_edges);
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProperPath {
    halfedges: Vec<KeyHalfedge>,
}

impl ProperPath {
    /// Simple open chain through every edge of `edges`, or an invalid path.
    ///
    /// Edges are appended after the last vertex when possible, otherwise
    /// prepended before the first one.
    pub fn from_edge_set(vac: &Vac, edges: &CellSet) -> Self {
        let invalid = Self::default();
        if same_time(vac, edges).is_none() {
            return invalid;
        }
        if edges
            .iter()
            .any(|e| vac.key_edge(*e).map_or(true, |d| d.is_closed()))
        {
            return invalid;
        }
        let mut it = edges.iter();
        let Some(&first) = it.next() else {
            return invalid;
        };

        let mut halfedges = vec![KeyHalfedge::new(first, true)];
        let mut remaining: Vec<CellId> = it.copied().collect();
        while !remaining.is_empty() {
            let last_vertex = halfedges[halfedges.len() - 1].end_vertex(vac);
            let first_vertex = halfedges[0].start_vertex(vac);
            let mut step = None;
            for (i, e) in remaining.iter().enumerate() {
                let Some(d) = vac.key_edge(*e) else {
                    continue;
                };
                if d.start_vertex() == last_vertex {
                    step = Some((i, KeyHalfedge::new(*e, true), false));
                } else if d.end_vertex() == last_vertex {
                    step = Some((i, KeyHalfedge::new(*e, false), false));
                } else if d.end_vertex() == first_vertex {
                    step = Some((i, KeyHalfedge::new(*e, true), true));
                } else if d.start_vertex() == first_vertex {
                    step = Some((i, KeyHalfedge::new(*e, false), true));
                }
                if step.is_some() {
                    break;
                }
            }
            let Some((i, h, prepend)) = step else {
                return invalid;
            };
            if prepend {
                halfedges.insert(0, h);
            } else {
                halfedges.push(h);
            }
            remaining.remove(i);
        }

        let closes = halfedges[halfedges.len() - 1].end_vertex(vac) == halfedges[0].start_vertex(vac);
        if closes || !is_simple(vac, &halfedges) {
            return invalid;
        }
        Self { halfedges }
    }

    pub fn is_valid(&self) -> bool {
        !self.halfedges.is_empty()
    }

    pub fn time(&self, vac: &Vac) -> Time {
        self.halfedges
            .first()
            .map(|h| h.time(vac))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.halfedges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.halfedges.is_empty()
    }

    pub fn halfedges(&self) -> &[KeyHalfedge] {
        &self.halfedges
    }

    pub fn start_vertex(&self, vac: &Vac) -> Option<CellId> {
        self.halfedges.first()?.start_vertex(vac)
    }

    pub fn end_vertex(&self, vac: &Vac) -> Option<CellId> {
        self.halfedges.last()?.end_vertex(vac)
    }

    pub fn replace_edges(&mut self, old: CellId, new_edges: &[CellId]) {
        replace_in(&mut self.halfedges, old, new_edges);
    }
}
