// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbetweening: creating inbetween cells that connect key cells at two
//! different times.

use rustc_hash::FxHashMap;

use crate::animated_vertex::AnimatedVertex;
use crate::cycle::Cycle;
use crate::halfedge::KeyHalfedge;
use crate::keys::{CellId, CellSet, CellType};
use crate::path::Path;
use crate::proper::{ProperCycle, ProperPath};
use crate::time::Time;
use crate::vac::Vac;

impl Vac {
    /// Inbetween vertex from `v1` to `v2`, colored like `v1`.
    pub fn inbetween_vertices(&mut self, v1: CellId, v2: CellId) -> Option<CellId> {
        let sv = self.new_inbetween_vertex(v1, v2).ok()?;
        let color = self.cell(v1)?.color;
        self.set_color(sv, color);
        Some(sv)
    }

    /// Chain of existing inbetween vertices leading from `v1` to `v2` (in
    /// either order), or a new inbetween vertex between them.
    pub fn find_or_create_animated_vertex(&mut self, v1: CellId, v2: CellId) -> Option<AnimatedVertex> {
        let (t1, t2) = (self.key_vertex(v1)?.time(), self.key_vertex(v2)?.time());
        if t1 == t2 {
            return None;
        }
        let (v1, v2) = if t1 > t2 { (v2, v1) } else { (v1, v2) };

        let mut next = FxHashMap::default();
        self.find_animated_vertex(v1, v2, &mut next);
        let mut chain = Vec::new();
        let mut v = v1;
        while v != v2 {
            let Some(Some(sv)) = next.get(&v) else {
                break;
            };
            chain.push(*sv);
            v = self.inbetween_vertex(*sv)?.after_vertex();
        }
        if chain.is_empty() {
            chain.push(self.new_inbetween_vertex(v1, v2).ok()?);
        }
        Some(AnimatedVertex::new(chain))
    }

    /// Depth-first search of inbetween vertices leading from `from` to
    /// `target`. `next` memoizes the first step out of each visited key
    /// vertex, `None` when the target cannot be reached.
    fn find_animated_vertex(&self, from: CellId, target: CellId, next: &mut FxHashMap<CellId, Option<CellId>>) {
        if next.contains_key(&from) {
            return;
        }
        let reachable = match (self.key_vertex(from), self.key_vertex(target)) {
            (Some(a), Some(b)) => a.time() < b.time(),
            _ => false,
        };
        if !reachable {
            next.insert(from, None);
            return;
        }
        for sv in self.temporal_star_after(from) {
            let Some(after) = self.inbetween_vertex(sv).map(|d| d.after_vertex()) else {
                continue;
            };
            if after == target {
                next.insert(from, Some(sv));
                return;
            }
            self.find_animated_vertex(after, target, next);
            if matches!(next.get(&after), Some(Some(_))) {
                next.insert(from, Some(sv));
                return;
            }
        }
        next.insert(from, None);
    }

    /// Inbetween edge from key edge `e1` to key edge `e2`, both closed or
    /// both open, oriented like [`Vac::glue_edges`] would.
    pub fn inbetween_edges(&mut self, e1: CellId, e2: CellId) -> Option<CellId> {
        let closed1 = self.key_edge(e1)?.is_closed();
        let closed2 = self.key_edge(e2)?.is_closed();
        let h1 = KeyHalfedge::new(e1, true);
        let h2 = KeyHalfedge::new(e2, self.have_same_orientation(e1, e2));
        let se = match (closed1, closed2) {
            (true, true) => {
                let c1 = Cycle::from_halfedges(self, vec![h1]);
                let c2 = Cycle::from_halfedges(self, vec![h2]);
                self.new_closed_inbetween_edge(c1, c2).ok()?
            }
            (false, false) => {
                let start = self.find_or_create_animated_vertex(h1.start_vertex(self)?, h2.start_vertex(self)?)?;
                let end = self.find_or_create_animated_vertex(h1.end_vertex(self)?, h2.end_vertex(self)?)?;
                let p1 = Path::from_halfedges(self, vec![h1]);
                let p2 = Path::from_halfedges(self, vec![h2]);
                self.new_inbetween_edge(p1, p2, start, end).ok()?
            }
            _ => {
                tracing::info!(e1 = %e1, e2 = %e2, "inbetween aborted: cannot inbetween a closed edge with an open edge");
                return None;
            }
        };
        let color = self.cell(e1)?.color;
        self.set_color(se, color);
        Some(se)
    }

    /// Grows key vertex `v` into key edge `e` (or shrinks `e` into `v` when
    /// `e` comes first in time).
    fn inbetween_vertex_and_edge(&mut self, v: CellId, e: CellId) -> Option<CellId> {
        let grow = self.key_vertex(v)?.time() < self.key_edge(e)?.time();
        let h = KeyHalfedge::new(e, true);
        let se = if self.key_edge(e)?.is_closed() {
            let (vc, ec) = (Cycle::from_vertex(v), Cycle::from_halfedges(self, vec![h]));
            let (c1, c2) = if grow { (vc, ec) } else { (ec, vc) };
            self.new_closed_inbetween_edge(c1, c2).ok()?
        } else {
            let start = self.find_or_create_animated_vertex(v, h.start_vertex(self)?)?;
            let end = self.find_or_create_animated_vertex(v, h.end_vertex(self)?)?;
            let (vp, ep) = (Path::from_vertex(v), Path::from_halfedges(self, vec![h]));
            let (p1, p2) = if grow { (vp, ep) } else { (ep, vp) };
            let se = self.new_inbetween_edge(p1, p2, start, end).ok()?;
            let color = self.cell(e)?.color;
            self.set_color(se, color);
            se
        };
        Some(se)
    }

    /// Inbetween vertex following `v1` to `v2`, reusing an existing one.
    fn find_or_create_inbetween_vertex(&mut self, v1: CellId, v2: CellId) -> Option<CellId> {
        let existing = self
            .temporal_star_after(v1)
            .into_iter()
            .find(|sv| self.inbetween_vertex(*sv).map(|d| d.after_vertex()) == Some(v2));
        match existing {
            Some(sv) => Some(sv),
            None => self.new_inbetween_vertex(v1, v2).ok(),
        }
    }

    /// Cycle and path described by the vertices and edges selected at one
    /// time, or nothing when ambiguous.
    fn selection_as_cycle_and_path(&self, vertices: &[CellId], edges: &[CellId]) -> Option<(Cycle, Path)> {
        if edges.is_empty() {
            return match vertices {
                [v] => Some((Cycle::from_vertex(*v), Path::from_vertex(*v))),
                _ => None,
            };
        }
        let set: CellSet = edges.iter().copied().collect();
        let proper = ProperCycle::from_edge_set(self, &set);
        if proper.is_valid() {
            return Some((Cycle::from_proper_cycle(&proper), Path::from_proper_cycle(self, &proper)));
        }
        let path = ProperPath::from_edge_set(self, &set);
        Some((Cycle::default(), Path::from_proper_path(&path)))
    }

    /// Connects the key cells selected at two different times.
    ///
    /// One vertex to one vertex or one edge to one edge are connected
    /// directly. A vertex and an edge grow or shrink into each other.
    /// Otherwise the cells at each time must form a cycle or a path, and
    /// a closed inbetween edge is preferred over an open one.
    pub fn inbetween_selection(&mut self) -> Option<CellId> {
        let keys: Vec<(CellId, Time)> = self
            .selection
            .iter()
            .filter_map(|c| self.cell(*c).and_then(|cell| cell.key_time()).map(|t| (*c, t)))
            .collect();
        let mut times: Vec<Time> = Vec::new();
        for (_, t) in &keys {
            if !times.contains(t) {
                times.push(*t);
            }
        }
        let (t1, t2) = match times.as_slice() {
            [a, b] if a < b => (*a, *b),
            [a, b] => (*b, *a),
            [] | [_] => {
                tracing::info!("inbetween aborted: the selection spans a single frame");
                return None;
            }
            _ => {
                tracing::info!("inbetween aborted: the selection spans more than two frames");
                return None;
            }
        };
        let at = |t: Time, kind: CellType| -> Vec<CellId> {
            keys.iter()
                .filter(|(c, tc)| *tc == t && self.cell_type(*c) == Some(kind))
                .map(|(c, _)| *c)
                .collect()
        };
        let (v1, e1, f1) = (at(t1, CellType::KeyVertex), at(t1, CellType::KeyEdge), at(t1, CellType::KeyFace));
        let (v2, e2, f2) = (at(t2, CellType::KeyVertex), at(t2, CellType::KeyEdge), at(t2, CellType::KeyFace));
        let n1 = v1.len() + e1.len() + f1.len();
        let n2 = v2.len() + e2.len() + f2.len();

        let res = self.operate("inbetween", |vac| {
            if n1 == 1 && n2 == 1 {
                match (v1.as_slice(), e1.as_slice(), v2.as_slice(), e2.as_slice()) {
                    ([a], _, [b], _) => return vac.inbetween_vertices(*a, *b),
                    (_, [a], _, [b]) => return vac.inbetween_edges(*a, *b),
                    ([v], _, _, [e]) | (_, [e], [v], _) => return vac.inbetween_vertex_and_edge(*v, *e),
                    _ => {}
                }
            }
            if !f1.is_empty() || !f2.is_empty() {
                tracing::info!("inbetween aborted: faces cannot be inbetweened");
                return None;
            }
            let (mut cycle1, mut path1) = vac.selection_as_cycle_and_path(&v1, &e1)?;
            let (cycle2, path2) = vac.selection_as_cycle_and_path(&v2, &e2)?;
            if vac.settings.inverse_direction {
                cycle1 = cycle1.reversed();
                path1 = path1.reversed();
            }
            if cycle1.is_valid() && cycle2.is_valid() {
                return vac.new_closed_inbetween_edge(cycle1, cycle2).ok();
            }
            if !path1.is_valid() || !path2.is_valid() {
                tracing::info!("inbetween aborted: selection is neither a cycle nor a path");
                return None;
            }
            let (s1, s2) = (path1.start_vertex(vac)?, path2.start_vertex(vac)?);
            let (end1, end2) = (path1.end_vertex(vac)?, path2.end_vertex(vac)?);
            let start = vac.find_or_create_inbetween_vertex(s1, s2)?;
            let end = if s1 == end1 && s2 == end2 {
                start
            } else {
                vac.find_or_create_inbetween_vertex(end1, end2)?
            };
            vac.new_inbetween_edge(
                path1,
                path2,
                AnimatedVertex::new(vec![start]),
                AnimatedVertex::new(vec![end]),
            )
            .ok()
        });

        self.deselect_all();
        self.emit_edit_done();
        res
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector2;

    use super::*;

    #[test]
    fn animated_vertex_reuses_chain() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(5), Vector2::new(0.0, 0.0));
        let c = vac.new_key_vertex(Time::frame(10), Vector2::new(0.0, 0.0));
        let ab = vac.new_inbetween_vertex(a, b).unwrap();
        let bc = vac.new_inbetween_vertex(b, c).unwrap();

        let av = vac.find_or_create_animated_vertex(c, a).unwrap();
        assert_eq!(av.inbetween_vertices(), &[ab, bc]);
        assert_eq!(vac.len(), 5);

        let d = vac.new_key_vertex(Time::frame(8), Vector2::new(0.0, 0.0));
        let av = vac.find_or_create_animated_vertex(a, d).unwrap();
        assert_eq!(av.len(), 1);
        assert_eq!(vac.len(), 7);
        assert!(vac.find_or_create_animated_vertex(a, a).is_none());
    }

    #[test]
    fn selection_of_two_edges() {
        let mut vac = Vac::new();
        let (t0, t1) = (Time::frame(0), Time::frame(10));
        let a0 = vac.new_key_vertex(t0, Vector2::new(0.0, 0.0));
        let b0 = vac.new_key_vertex(t0, Vector2::new(100.0, 0.0));
        let a1 = vac.new_key_vertex(t1, Vector2::new(0.0, 20.0));
        let b1 = vac.new_key_vertex(t1, Vector2::new(100.0, 20.0));
        let e0 = vac.new_key_edge(a0, b0).unwrap();
        let e1 = vac.new_key_edge(a1, b1).unwrap();
        vac.select(e0);
        vac.select(e1);
        let se = vac.inbetween_selection().unwrap();
        let d = vac.inbetween_edge(se).unwrap();
        assert_eq!(d.start_animated_vertex().unwrap().before_vertex(&vac), Some(a0));
        assert_eq!(d.end_animated_vertex().unwrap().after_vertex(&vac), Some(b1));
        assert!(vac.selected_cells().is_empty());
        assert!(vac.check());
    }

    #[test]
    fn vertex_grows_into_closed_edge() {
        let mut vac = Vac::new();
        let v = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let pts = [
            Vector2::new(-10.0, -10.0),
            Vector2::new(10.0, -10.0),
            Vector2::new(10.0, 10.0),
            Vector2::new(-10.0, 10.0),
        ];
        let geometry = vac_lite_geometry::LinearSpline::from_points(&pts, 2.0);
        let e = vac.new_closed_key_edge(Time::frame(4), geometry);
        vac.select(v);
        vac.select(e);
        let se = vac.inbetween_selection().unwrap();
        assert!(vac.inbetween_edge(se).unwrap().is_closed());
        assert_eq!(vac.before_cells(se), [v].into_iter().collect());
        assert!(vac.check());
    }

    #[test]
    fn three_frames_are_ambiguous() {
        let mut vac = Vac::new();
        for f in [0, 1, 2] {
            let v = vac.new_key_vertex(Time::frame(f), Vector2::new(0.0, 0.0));
            vac.select(v);
        }
        assert!(vac.inbetween_selection().is_none());
        assert_eq!(vac.len(), 3);
    }
}
