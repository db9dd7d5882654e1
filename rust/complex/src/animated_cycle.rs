// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time-varying boundary cycles of inbetween faces.
//!
//! An [`AnimatedCycle`] is a graph of nodes, each referring to a vertex or
//! edge cell (key or inbetween). `previous`/`next` link nodes around the
//! cycle at a given time, `before`/`after` link a node to the node that
//! replaces it earlier or later in time. Nodes are stored in a slot map so
//! that links are plain keys and copies of a cycle keep their keys.
//!
//! At any time `t` in the lifetime of the owning face, following `next`
//! from [`AnimatedCycle::node_at`] with [`AnimatedCycle::next_at`] walks a
//! key or inbetween cycle that exists at `t`.

use std::fmt;

use nalgebra::Vector2;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::cycle::Cycle;
use crate::error::{Error, Result};
use crate::halfedge::KeyHalfedge;
use crate::keys::{CellId, CellSet, CellType, NodeKey};
use crate::time::Time;
use crate::vac::Vac;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    KeyVertex,
    InbetweenVertex,
    KeyClosedEdge,
    KeyOpenEdge,
    InbetweenClosedEdge,
    InbetweenOpenEdge,
    Invalid,
}

impl NodeType {
    pub fn is_vertex(self) -> bool {
        matches!(self, NodeType::KeyVertex | NodeType::InbetweenVertex)
    }

    pub fn is_open_edge(self) -> bool {
        matches!(self, NodeType::KeyOpenEdge | NodeType::InbetweenOpenEdge)
    }

    pub fn is_closed_edge(self) -> bool {
        matches!(self, NodeType::KeyClosedEdge | NodeType::InbetweenClosedEdge)
    }
}

/// Shape of the cycle a node belongs to at some time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCycleType {
    /// A single vertex looping onto itself.
    Steiner,
    /// Closed edges only.
    Simple,
    /// Alternating vertices and open edges.
    NonSimple,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimatedCycleNode {
    pub cell: CellId,
    pub previous: Option<NodeKey>,
    pub next: Option<NodeKey>,
    pub before: Option<NodeKey>,
    pub after: Option<NodeKey>,
    /// Traversal side for edge nodes, `None` for vertex nodes.
    pub side: Option<bool>,
}

impl AnimatedCycleNode {
    pub fn vertex(cell: CellId) -> Self {
        Self {
            cell,
            previous: None,
            next: None,
            before: None,
            after: None,
            side: None,
        }
    }

    pub fn edge(cell: CellId, side: bool) -> Self {
        Self {
            side: Some(side),
            ..Self::vertex(cell)
        }
    }

    pub fn side(&self) -> bool {
        self.side.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnimatedCycle {
    nodes: SlotMap<NodeKey, AnimatedCycleNode>,
    first: Option<NodeKey>,
}

impl AnimatedCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cycle whose nodes are linked circularly through
    /// `previous`/`next` in the given order, without temporal links.
    pub fn circular(nodes: impl IntoIterator<Item = AnimatedCycleNode>) -> Self {
        let mut res = Self::new();
        let keys: Vec<NodeKey> = nodes.into_iter().map(|n| res.nodes.insert(n)).collect();
        let n = keys.len();
        for (i, k) in keys.iter().enumerate() {
            if let Some(node) = res.nodes.get_mut(*k) {
                node.previous = Some(keys[(i + n - 1) % n]);
                node.next = Some(keys[(i + 1) % n]);
            }
        }
        res.first = keys.first().copied();
        res
    }

    pub fn add_node(&mut self, node: AnimatedCycleNode) -> NodeKey {
        self.nodes.insert(node)
    }

    pub fn node(&self, key: NodeKey) -> Option<&AnimatedCycleNode> {
        self.nodes.get(key)
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut AnimatedCycleNode> {
        self.nodes.get_mut(key)
    }

    pub fn first(&self) -> Option<NodeKey> {
        self.first
    }

    pub fn set_first(&mut self, key: Option<NodeKey>) {
        self.first = key;
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    fn cell_of(&self, key: Option<NodeKey>) -> Option<CellId> {
        key.and_then(|k| self.nodes.get(k)).map(|n| n.cell)
    }

    fn previous(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key).and_then(|n| n.previous)
    }

    fn next(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key).and_then(|n| n.next)
    }

    fn before(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key).and_then(|n| n.before)
    }

    fn after(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key).and_then(|n| n.after)
    }

    /// Every node reachable from the first one through any link, in
    /// depth-first order.
    pub fn nodes(&self) -> Vec<NodeKey> {
        let mut res = Vec::new();
        let Some(first) = self.first.filter(|k| self.nodes.contains_key(*k)) else {
            return res;
        };
        let mut seen = rustc_hash::FxHashSet::default();
        let mut stack = vec![first];
        seen.insert(first);
        while let Some(k) = stack.pop() {
            res.push(k);
            let Some(n) = self.nodes.get(k) else {
                continue;
            };
            for link in [n.previous, n.next, n.before, n.after].into_iter().flatten() {
                if self.nodes.contains_key(link) && seen.insert(link) {
                    stack.push(link);
                }
            }
        }
        res
    }

    /// Nodes referring to `cell`.
    pub fn nodes_of(&self, cell: CellId) -> Vec<NodeKey> {
        self.nodes()
            .into_iter()
            .filter(|k| self.nodes.get(*k).map_or(false, |n| n.cell == cell))
            .collect()
    }

    pub fn cells(&self) -> CellSet {
        self.nodes()
            .into_iter()
            .filter_map(|k| self.nodes.get(k).map(|n| n.cell))
            .collect()
    }

    /// Key cells bounding the cycle from below: the before-cells of every
    /// node that has no `before` link.
    pub fn before_cells(&self, vac: &Vac) -> CellSet {
        let mut res = CellSet::new();
        for k in self.nodes() {
            if let Some(n) = self.nodes.get(k) {
                if n.before.is_none() {
                    res.extend(vac.before_cells(n.cell));
                }
            }
        }
        res
    }

    pub fn after_cells(&self, vac: &Vac) -> CellSet {
        let mut res = CellSet::new();
        for k in self.nodes() {
            if let Some(n) = self.nodes.get(k) {
                if n.after.is_none() {
                    res.extend(vac.after_cells(n.cell));
                }
            }
        }
        res
    }

    pub fn node_type(&self, vac: &Vac, key: NodeKey) -> NodeType {
        let Some(n) = self.nodes.get(key) else {
            return NodeType::Invalid;
        };
        match vac.cell_type(n.cell) {
            Some(CellType::KeyVertex) => NodeType::KeyVertex,
            Some(CellType::InbetweenVertex) => NodeType::InbetweenVertex,
            Some(CellType::KeyEdge) => {
                if vac.key_edge(n.cell).map_or(false, |e| e.is_closed()) {
                    NodeType::KeyClosedEdge
                } else {
                    NodeType::KeyOpenEdge
                }
            }
            Some(CellType::InbetweenEdge) => {
                if vac.inbetween_edge(n.cell).map_or(false, |e| e.is_closed()) {
                    NodeType::InbetweenClosedEdge
                } else {
                    NodeType::InbetweenOpenEdge
                }
            }
            _ => NodeType::Invalid,
        }
    }

    /// Shape of the cycle through `key` at a time where its cell exists.
    pub fn cycle_type(&self, vac: &Vac, key: NodeKey) -> NodeCycleType {
        let node_type = self.node_type(vac, key);
        if node_type.is_vertex() {
            match self.next(key) {
                Some(next) if self.cell_of(Some(next)) == self.cell_of(Some(key)) => {
                    NodeCycleType::Steiner
                }
                Some(_) => NodeCycleType::NonSimple,
                None => NodeCycleType::Invalid,
            }
        } else if node_type.is_closed_edge() {
            NodeCycleType::Simple
        } else if node_type.is_open_edge() {
            NodeCycleType::NonSimple
        } else {
            NodeCycleType::Invalid
        }
    }

    /// Previous node at time `t`. Open inbetween edges may point to a node
    /// that is not alive at `t`; its `before` chain is followed.
    pub fn previous_at(&self, vac: &Vac, key: NodeKey, t: Time) -> Option<NodeKey> {
        let mut res = self.previous(key)?;
        if self.node_type(vac, key) == NodeType::InbetweenOpenEdge {
            while !vac.exists(self.cell_of(Some(res))?, t) {
                res = self.before(res)?;
            }
        }
        Some(res)
    }

    pub fn next_at(&self, vac: &Vac, key: NodeKey, t: Time) -> Option<NodeKey> {
        let mut res = self.next(key)?;
        if self.node_type(vac, key) == NodeType::InbetweenOpenEdge {
            while !vac.exists(self.cell_of(Some(res))?, t) {
                res = self.after(res)?;
            }
        }
        Some(res)
    }

    /// A node alive at `t`, found by walking `after` links from the first
    /// node.
    pub fn node_at(&self, vac: &Vac, t: Time) -> Option<NodeKey> {
        let mut res = self.first?;
        while !vac.exists(self.cell_of(Some(res))?, t) {
            res = self.after(res)?;
        }
        Some(res)
    }

    pub fn replace_vertex(&mut self, old: CellId, new: CellId) {
        for n in self.nodes.values_mut() {
            if n.cell == old {
                n.cell = new;
            }
        }
    }

    pub fn replace_halfedge(&mut self, old_edge: CellId, old_side: bool, new_edge: CellId, new_side: bool) {
        for n in self.nodes.values_mut() {
            if n.cell == old_edge {
                n.cell = new_edge;
                n.side = Some((n.side() == old_side) == new_side);
            }
        }
    }

    /// Nodes of the `next` loop starting at `start`.
    fn next_loop(&self, start: NodeKey) -> Vec<NodeKey> {
        let mut res = vec![start];
        let mut k = start;
        while let Some(next) = self.next(k) {
            if next == start || res.len() > self.nodes.len() {
                break;
            }
            res.push(next);
            k = next;
        }
        res
    }

    /// Redirects every link pointing at `old`: `previous`/`before` links to
    /// `last`, `next`/`after` links to `first`.
    fn redirect(&mut self, old: NodeKey, first: NodeKey, last: NodeKey) {
        for n in self.nodes.values_mut() {
            if n.next == Some(old) {
                n.next = Some(first);
            }
            if n.after == Some(old) {
                n.after = Some(first);
            }
            if n.previous == Some(old) {
                n.previous = Some(last);
            }
            if n.before == Some(old) {
                n.before = Some(last);
            }
        }
        if self.first == Some(old) {
            self.first = Some(first);
        }
    }

    /// Replaces every occurrence of key edge `old` by the chain `new_edges`
    /// going from its start to its end vertex, with new key vertex nodes
    /// in between.
    pub fn replace_edges(&mut self, vac: &Vac, old: CellId, new_edges: &[CellId]) {
        let n = new_edges.len();
        if n == 0 {
            return;
        }
        let olds = self.nodes_of(old);
        let Some(&first_old) = olds.first() else {
            return;
        };
        let end_of = |e: CellId, forward: bool| -> Option<CellId> {
            let d = vac.key_edge(e)?;
            if forward {
                d.end_vertex()
            } else {
                d.start_vertex()
            }
        };

        if vac.key_edge(old).map_or(false, |e| e.is_closed()) {
            // The closed edge may be traversed several times: rebuild the
            // whole loop of its nodes.
            let old_nodes = self.next_loop(first_old);
            let m_old = old_nodes.len();
            let side = self.nodes.get(first_old).map_or(true, |nd| nd.side());
            let ordered: Vec<CellId> = if side {
                new_edges.to_vec()
            } else {
                new_edges.iter().rev().copied().collect()
            };
            let before_nodes = self.before(first_old).map(|b| self.next_loop(b));
            let after_nodes = self.after(first_old).map(|a| self.next_loop(a));

            let mut edge_keys = Vec::with_capacity(m_old * n);
            let mut vertex_keys = Vec::with_capacity(m_old * n);
            for i in 0..m_old {
                let (before, after) = self
                    .nodes
                    .get(old_nodes[i])
                    .map_or((None, None), |nd| (nd.before, nd.after));
                for e in &ordered {
                    let Some(v) = end_of(*e, side) else {
                        return;
                    };
                    let mut en = AnimatedCycleNode::edge(*e, side);
                    en.before = before;
                    en.after = after;
                    let mut vn = AnimatedCycleNode::vertex(v);
                    vn.before = before;
                    vn.after = after;
                    edge_keys.push(self.nodes.insert(en));
                    vertex_keys.push(self.nodes.insert(vn));
                }
            }
            let m = edge_keys.len();
            for k in 0..m {
                if let Some(en) = self.nodes.get_mut(edge_keys[k]) {
                    en.previous = Some(vertex_keys[(k + m - 1) % m]);
                    en.next = Some(vertex_keys[k]);
                }
                if let Some(vn) = self.nodes.get_mut(vertex_keys[k]) {
                    vn.previous = Some(edge_keys[k]);
                    vn.next = Some(edge_keys[(k + 1) % m]);
                }
            }
            if let Some(before_nodes) = before_nodes {
                let ratio = (m / before_nodes.len().max(1)).max(1);
                for (i, b) in before_nodes.iter().enumerate() {
                    if let Some(nd) = self.nodes.get_mut(*b) {
                        nd.after = edge_keys.get(i * ratio).copied();
                    }
                }
            }
            if let Some(after_nodes) = after_nodes {
                let ratio = (m / after_nodes.len().max(1)).max(1);
                for (i, a) in after_nodes.iter().enumerate() {
                    if let Some(nd) = self.nodes.get_mut(*a) {
                        nd.before = edge_keys.get(i * ratio).copied();
                    }
                }
            }
            for o in old_nodes {
                self.redirect(o, edge_keys[0], edge_keys[0]);
                self.nodes.remove(o);
            }
            return;
        }

        for o in olds {
            let Some(old_node) = self.nodes.get(o).copied() else {
                continue;
            };
            let side = old_node.side();
            let ordered: Vec<CellId> = if side {
                new_edges.to_vec()
            } else {
                new_edges.iter().rev().copied().collect()
            };
            let mut edge_keys = Vec::with_capacity(n);
            let mut vertex_keys = Vec::with_capacity(n - 1);
            for (i, e) in ordered.iter().enumerate() {
                let mut en = AnimatedCycleNode::edge(*e, side);
                en.before = old_node.before;
                en.after = old_node.after;
                edge_keys.push(self.nodes.insert(en));
                if i + 1 < n {
                    let Some(v) = end_of(*e, side) else {
                        continue;
                    };
                    let mut vn = AnimatedCycleNode::vertex(v);
                    vn.before = old_node.before;
                    vn.after = old_node.after;
                    vertex_keys.push(self.nodes.insert(vn));
                }
            }
            for i in 0..n {
                let previous = if i == 0 {
                    old_node.previous
                } else {
                    vertex_keys.get(i - 1).copied()
                };
                let next = if i + 1 == n {
                    old_node.next
                } else {
                    vertex_keys.get(i).copied()
                };
                if let Some(en) = self.nodes.get_mut(edge_keys[i]) {
                    en.previous = previous;
                    en.next = next;
                }
            }
            for (i, vk) in vertex_keys.iter().enumerate() {
                if let Some(vn) = self.nodes.get_mut(*vk) {
                    vn.previous = Some(edge_keys[i]);
                    vn.next = edge_keys.get(i + 1).copied();
                }
            }
            self.redirect(o, edge_keys[0], edge_keys[n - 1]);
            self.nodes.remove(o);
        }
    }

    /// Replaces inbetween vertex `sv` by `sv1`, key vertex `kv` and `sv2`
    /// chained in time.
    pub fn replace_inbetween_vertex(&mut self, sv: CellId, sv1: CellId, kv: CellId, sv2: CellId) {
        for o in self.nodes_of(sv) {
            let Some(old) = self.nodes.get(o).copied() else {
                continue;
            };
            let k1 = self.nodes.insert(AnimatedCycleNode::vertex(sv1));
            let kk = self.nodes.insert(AnimatedCycleNode::vertex(kv));
            let k2 = self.nodes.insert(AnimatedCycleNode::vertex(sv2));
            let steiner = old.next == Some(o);
            for (k, before, after) in [
                (k1, old.before, Some(kk)),
                (kk, Some(k1), Some(k2)),
                (k2, Some(kk), old.after),
            ] {
                if let Some(nd) = self.nodes.get_mut(k) {
                    if steiner {
                        nd.previous = Some(k);
                        nd.next = Some(k);
                    } else {
                        nd.previous = old.previous;
                        nd.next = old.next;
                    }
                    nd.before = before;
                    nd.after = after;
                }
            }
            if !steiner {
                if let Some(p) = old.previous {
                    if self.next(p) == Some(o) {
                        if let Some(nd) = self.nodes.get_mut(p) {
                            nd.next = Some(k1);
                        }
                    }
                }
                if let Some(nx) = old.next {
                    if self.previous(nx) == Some(o) {
                        if let Some(nd) = self.nodes.get_mut(nx) {
                            nd.previous = Some(k2);
                        }
                    }
                }
            }
            if let Some(b) = old.before {
                if self.after(b) == Some(o) {
                    if let Some(nd) = self.nodes.get_mut(b) {
                        nd.after = Some(k1);
                    }
                }
            }
            if let Some(a) = old.after {
                if self.before(a) == Some(o) {
                    if let Some(nd) = self.nodes.get_mut(a) {
                        nd.before = Some(k2);
                    }
                }
            }
            if self.first == Some(o) {
                self.first = Some(k1);
            }
            self.nodes.remove(o);
        }
    }

    /// Walks `start` and the nodes reached through `step` while they still
    /// point at `old` through `points`, rewriting that link to `new`.
    fn relink_quasi(
        &mut self,
        start: Option<NodeKey>,
        old: NodeKey,
        points: fn(&AnimatedCycleNode) -> Option<NodeKey>,
        set: fn(&mut AnimatedCycleNode, NodeKey),
        step: fn(&AnimatedCycleNode) -> Option<NodeKey>,
        new: NodeKey,
    ) {
        let len = self.nodes.len();
        let mut q = start;
        let mut guard = 0;
        while let Some(k) = q {
            let Some(nd) = self.nodes.get_mut(k) else {
                break;
            };
            if points(nd) != Some(old) || guard > len {
                break;
            }
            set(nd, new);
            q = step(nd);
            guard += 1;
        }
    }

    /// Replaces inbetween edge `se` by `se1`, key edge `ke` and `se2`
    /// chained in time, `ke` living at `t`.
    pub fn replace_inbetween_edge(
        &mut self,
        vac: &Vac,
        se: CellId,
        se1: CellId,
        ke: CellId,
        se2: CellId,
        t: Time,
    ) {
        let closed = vac.inbetween_edge(se).map_or(false, |e| e.is_closed());
        if closed {
            let Some(&first_old) = self.nodes_of(se).first() else {
                return;
            };
            let old_nodes = self.next_loop(first_old);
            let n = old_nodes.len();
            let side = self.nodes.get(first_old).map_or(true, |nd| nd.side());
            let mut b = Vec::with_capacity(n);
            let mut k = Vec::with_capacity(n);
            let mut a = Vec::with_capacity(n);
            for _ in 0..n {
                b.push(self.nodes.insert(AnimatedCycleNode::edge(se1, side)));
                k.push(self.nodes.insert(AnimatedCycleNode::edge(ke, side)));
                a.push(self.nodes.insert(AnimatedCycleNode::edge(se2, side)));
            }
            for i in 0..n {
                let (old_before, old_after) = self
                    .nodes
                    .get(old_nodes[i])
                    .map_or((None, None), |nd| (nd.before, nd.after));
                let prev = (i + n - 1) % n;
                let next = (i + 1) % n;
                for (list, before, after) in [
                    (&b, old_before, Some(k[i])),
                    (&k, Some(b[i]), Some(a[i])),
                    (&a, Some(k[i]), old_after),
                ] {
                    if let Some(nd) = self.nodes.get_mut(list[i]) {
                        nd.previous = Some(list[prev]);
                        nd.next = Some(list[next]);
                        nd.before = before;
                        nd.after = after;
                    }
                }
            }
            for i in 0..n {
                let o = old_nodes[i];
                let (old_before, old_after) = self
                    .nodes
                    .get(o)
                    .map_or((None, None), |nd| (nd.before, nd.after));
                self.relink_quasi(old_before, o, |nd| nd.after, |nd, x| nd.after = Some(x), |nd| nd.previous, b[i]);
                self.relink_quasi(old_after, o, |nd| nd.before, |nd, x| nd.before = Some(x), |nd| nd.next, a[i]);
                if self.first == Some(o) {
                    self.first = Some(b[i]);
                }
            }
            for o in old_nodes {
                self.nodes.remove(o);
            }
            return;
        }

        for o in self.nodes_of(se) {
            let Some(old) = self.nodes.get(o).copied() else {
                continue;
            };
            let (Some(kv_prev), Some(kv_next)) = (self.previous_at(vac, o, t), self.next_at(vac, o, t)) else {
                tracing::warn!(edge = %se, "animated cycle has no key vertex around keyframed edge");
                continue;
            };
            let side = old.side();
            let n1 = self.nodes.insert(AnimatedCycleNode::edge(se1, side));
            let nk = self.nodes.insert(AnimatedCycleNode::edge(ke, side));
            let n2 = self.nodes.insert(AnimatedCycleNode::edge(se2, side));
            let kv_prev_before = self.before(kv_prev);
            let kv_next_after = self.after(kv_next);
            for (key, previous, next, before, after) in [
                (n1, kv_prev_before, old.next, old.before, Some(nk)),
                (nk, Some(kv_prev), Some(kv_next), Some(n1), Some(n2)),
                (n2, old.previous, kv_next_after, Some(nk), old.after),
            ] {
                if let Some(nd) = self.nodes.get_mut(key) {
                    nd.previous = previous;
                    nd.next = next;
                    nd.before = before;
                    nd.after = after;
                }
            }

            // Nodes whose next was `o`, walking back in time: those after
            // the key vertex now lead to n2, the key vertex to nk, and
            // those before it to n1.
            let mut q = old.previous;
            let mut target = n2;
            let mut guard = 0;
            while let Some(k) = q {
                if self.next(k) != Some(o) || guard > self.nodes.len() {
                    break;
                }
                let new_next = if k == kv_prev { nk } else { target };
                if let Some(nd) = self.nodes.get_mut(k) {
                    nd.next = Some(new_next);
                }
                if k == kv_prev {
                    target = n1;
                }
                q = self.before(k);
                guard += 1;
            }

            let mut q = old.next;
            let mut target = n1;
            let mut guard = 0;
            while let Some(k) = q {
                if self.previous(k) != Some(o) || guard > self.nodes.len() {
                    break;
                }
                let new_previous = if k == kv_next { nk } else { target };
                if let Some(nd) = self.nodes.get_mut(k) {
                    nd.previous = Some(new_previous);
                }
                if k == kv_next {
                    target = n2;
                }
                q = self.after(k);
                guard += 1;
            }

            self.relink_quasi(old.before, o, |nd| nd.after, |nd, x| nd.after = Some(x), |nd| nd.previous, n1);
            self.relink_quasi(old.after, o, |nd| nd.before, |nd, x| nd.before = Some(x), |nd| nd.next, n2);
            if self.first == Some(o) {
                self.first = Some(n1);
            }
            self.nodes.remove(o);
        }
    }

    /// Splits the cycle at time `t`, where every node alive at `t` refers to
    /// a key cell. Returns the part strictly before `t` and the part
    /// strictly after it.
    pub fn split_at(&self, vac: &Vac, t: Time) -> (AnimatedCycle, AnimatedCycle) {
        let mut before = self.clone();
        let mut after = self.clone();
        let after_first = self.node_at(vac, t).and_then(|k| self.after(k));

        let drop_before: Vec<NodeKey> = self
            .nodes()
            .into_iter()
            .filter(|k| self.cell_of(Some(*k)).map_or(true, |c| !vac.is_before(c, t)))
            .collect();
        let drop_after: Vec<NodeKey> = self
            .nodes()
            .into_iter()
            .filter(|k| self.cell_of(Some(*k)).map_or(true, |c| !vac.is_after(c, t)))
            .collect();
        for nd in before.nodes.values_mut() {
            if nd.after.map_or(false, |a| drop_before.contains(&a)) {
                nd.after = None;
            }
        }
        for nd in after.nodes.values_mut() {
            if nd.before.map_or(false, |b| drop_after.contains(&b)) {
                nd.before = None;
            }
        }
        for k in drop_before {
            before.nodes.remove(k);
        }
        for k in drop_after {
            after.nodes.remove(k);
        }
        after.first = after_first;
        (before, after)
    }

    /// Key cycle traversed at time `t`, where every node alive at `t`
    /// refers to a key cell.
    pub fn key_cycle_at(&self, vac: &Vac, t: Time) -> Option<Cycle> {
        let first = self.node_at(vac, t)?;
        let halfedge = |k: NodeKey| self.nodes.get(k).map(|n| KeyHalfedge::new(n.cell, n.side()));
        match self.cycle_type(vac, first) {
            NodeCycleType::Steiner => Some(Cycle::from_vertex(self.cell_of(Some(first))?)),
            NodeCycleType::Simple => {
                let h = halfedge(first)?;
                Some(Cycle::from_halfedges(vac, vec![h; self.next_loop(first).len()]))
            }
            NodeCycleType::NonSimple => {
                let start = if self.node_type(vac, first).is_vertex() {
                    self.next(first)?
                } else {
                    first
                };
                let mut hs = Vec::new();
                let mut k = start;
                loop {
                    hs.push(halfedge(k)?);
                    k = self.next(self.next(k)?)?;
                    if k == start {
                        break;
                    }
                    if hs.len() > self.nodes.len() {
                        return None;
                    }
                }
                Some(Cycle::from_halfedges(vac, hs))
            }
            NodeCycleType::Invalid => None,
        }
    }

    /// Positions of the cycle at time `t`.
    pub fn sample(&self, vac: &Vac, t: Time) -> Vec<Vector2<f64>> {
        let mut out = Vec::new();
        let Some(node) = self.node_at(vac, t) else {
            tracing::warn!(time = %t, "animated cycle sampling failed: no node at time");
            return out;
        };
        let append = |out: &mut Vec<Vector2<f64>>, k: NodeKey| -> bool {
            let Some(nd) = self.nodes.get(k) else {
                return false;
            };
            let sampling: Vec<Vector2<f64>> = match self.node_type(vac, k) {
                NodeType::KeyOpenEdge | NodeType::KeyClosedEdge => vac
                    .key_edge(nd.cell)
                    .map(|e| e.geometry().samples().iter().map(|s| s.pos()).collect())
                    .unwrap_or_default(),
                NodeType::InbetweenOpenEdge | NodeType::InbetweenClosedEdge => vac
                    .inbetween_edge_sampling(nd.cell, t)
                    .iter()
                    .map(|s| s.pos())
                    .collect(),
                _ => return false,
            };
            let m = sampling.len();
            if m == 0 {
                return true;
            }
            if nd.side() {
                out.extend_from_slice(&sampling[..m - 1]);
            } else {
                out.extend(sampling[1..].iter().rev());
            }
            true
        };

        match self.cycle_type(vac, node) {
            NodeCycleType::NonSimple => {
                let mut first_edge = node;
                if self.node_type(vac, first_edge).is_vertex() {
                    match self.next_at(vac, first_edge, t) {
                        Some(k) => first_edge = k,
                        None => return out,
                    }
                }
                let mut k = first_edge;
                let mut guard = 0;
                loop {
                    if !self.node_type(vac, k).is_open_edge() || !append(&mut out, k) {
                        tracing::warn!("animated cycle sampling failed: wrong node type");
                        return out;
                    }
                    let Some(v) = self.next_at(vac, k, t) else {
                        return out;
                    };
                    let Some(e) = self.next_at(vac, v, t) else {
                        return out;
                    };
                    k = e;
                    guard += 1;
                    if k == first_edge || guard > self.nodes.len() {
                        break;
                    }
                }
            }
            NodeCycleType::Simple => {
                let mut k = node;
                let mut guard = 0;
                loop {
                    if !self.node_type(vac, k).is_closed_edge() || !append(&mut out, k) {
                        tracing::warn!("animated cycle sampling failed: wrong node type");
                        return out;
                    }
                    let Some(next) = self.next_at(vac, k, t) else {
                        return out;
                    };
                    k = next;
                    guard += 1;
                    if k == node || guard > self.nodes.len() {
                        break;
                    }
                }
            }
            NodeCycleType::Steiner => {
                if let Some(c) = self.cell_of(Some(node)) {
                    out.push(vac.vertex_pos(c, t));
                }
            }
            NodeCycleType::Invalid => {
                tracing::warn!("animated cycle sampling failed: invalid cycle");
            }
        }
        out
    }

    pub(crate) fn remap(&mut self, map: &FxHashMap<CellId, CellId>) {
        for n in self.nodes.values_mut() {
            n.cell = map.get(&n.cell).copied().unwrap_or(n.cell);
        }
    }

    /// `[1:(3+,2,2,_,_) 2:(5,1,1,_,_)]`: per node its index, cell (with a
    /// side for edges), previous, next, before and after indices.
    pub fn to_id_string(&self) -> String {
        let order = self.nodes();
        let index: FxHashMap<NodeKey, usize> =
            order.iter().enumerate().map(|(i, k)| (*k, i + 1)).collect();
        let link = |k: Option<NodeKey>| -> String {
            k.and_then(|k| index.get(&k))
                .map_or_else(|| "_".to_string(), |i| i.to_string())
        };
        let mut parts = Vec::with_capacity(order.len());
        for k in &order {
            let Some(n) = self.nodes.get(*k) else {
                continue;
            };
            let side = match n.side {
                Some(true) => "+",
                Some(false) => "-",
                None => "",
            };
            parts.push(format!(
                "{}:({}{},{},{},{},{})",
                index[k],
                n.cell,
                side,
                link(n.previous),
                link(n.next),
                link(n.before),
                link(n.after)
            ));
        }
        format!("[{}]", parts.join(" "))
    }

    pub fn from_id_string(s: &str) -> Result<AnimatedCycle> {
        let d: Vec<&str> = s
            .split(|c: char| "[](),:".contains(c) || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        if d.len() % 6 != 0 {
            return Err(Error::Parse(format!("invalid animated cycle '{}'", s)));
        }
        let parse_err = || Error::Parse(format!("invalid animated cycle '{}'", s));
        let n = d.len() / 6;
        let mut index = FxHashMap::default();
        for i in 0..n {
            let id = d[6 * i].parse::<i64>().map_err(|_| parse_err())?;
            index.insert(id, i);
        }
        let link = |p: &str| -> Result<Option<usize>> {
            if p == "_" {
                return Ok(None);
            }
            let id = p.parse::<i64>().map_err(|_| parse_err())?;
            index.get(&id).copied().map(Some).ok_or_else(parse_err)
        };
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let cell = d[6 * i + 1];
            let (cell, side) = if let Some(c) = cell.strip_suffix('+') {
                (c, Some(true))
            } else if let Some(c) = cell.strip_suffix('-') {
                (c, Some(false))
            } else {
                (cell, None)
            };
            let cell = CellId(cell.parse::<u32>().map_err(|_| parse_err())?);
            records.push((
                cell,
                side,
                link(d[6 * i + 2])?,
                link(d[6 * i + 3])?,
                link(d[6 * i + 4])?,
                link(d[6 * i + 5])?,
            ));
        }
        Ok(Self::from_records(records))
    }

    /// Legacy text form `[ (cell,previous,next,before,after,side) , ... ]`
    /// with 0-based indices and `-1` for missing temporal links.
    pub fn to_legacy_string(&self) -> String {
        let order = self.nodes();
        let index: FxHashMap<NodeKey, i64> = order
            .iter()
            .enumerate()
            .map(|(i, k)| (*k, i as i64))
            .collect();
        let link = |k: Option<NodeKey>| k.and_then(|k| index.get(&k).copied()).unwrap_or(-1);
        let mut res = String::from("[");
        for (i, k) in order.iter().enumerate() {
            let Some(n) = self.nodes.get(*k) else {
                continue;
            };
            if i != 0 {
                res.push_str(" ,");
            }
            res.push_str(&format!(
                " ({},{},{},{},{},{})",
                n.cell,
                link(n.previous).max(0),
                link(n.next).max(0),
                link(n.before),
                link(n.after),
                if n.side() { 1 } else { 0 }
            ));
        }
        res.push_str(" ]");
        res
    }

    pub fn from_legacy_string(s: &str) -> Result<AnimatedCycle> {
        let parse_err = || Error::Parse(format!("invalid legacy animated cycle '{}'", s));
        let nums = s
            .split(|c: char| "[](),".contains(c) || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<i64>().map_err(|_| parse_err()))
            .collect::<Result<Vec<_>>>()?;
        if nums.len() % 6 != 0 {
            return Err(parse_err());
        }
        let n = nums.len() / 6;
        let link = |x: i64| -> Option<usize> { usize::try_from(x).ok().filter(|i| *i < n) };
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let r = &nums[6 * i..6 * i + 6];
            let cell = CellId(u32::try_from(r[0]).map_err(|_| parse_err())?);
            records.push((
                cell,
                Some(r[5] != 0),
                link(r[1]),
                link(r[2]),
                link(r[3]),
                link(r[4]),
            ));
        }
        Ok(Self::from_records(records))
    }

    #[allow(clippy::type_complexity)]
    fn from_records(
        records: Vec<(
            CellId,
            Option<bool>,
            Option<usize>,
            Option<usize>,
            Option<usize>,
            Option<usize>,
        )>,
    ) -> AnimatedCycle {
        let mut res = AnimatedCycle::new();
        let keys: Vec<NodeKey> = records
            .iter()
            .map(|(cell, side, ..)| {
                res.nodes.insert(AnimatedCycleNode {
                    side: *side,
                    ..AnimatedCycleNode::vertex(*cell)
                })
            })
            .collect();
        for (i, (_, _, previous, next, before, after)) in records.iter().enumerate() {
            if let Some(nd) = res.nodes.get_mut(keys[i]) {
                nd.previous = previous.map(|j| keys[j]);
                nd.next = next.map(|j| keys[j]);
                nd.before = before.map(|j| keys[j]);
                nd.after = after.map(|j| keys[j]);
            }
        }
        let mut first = keys.first().copied();
        let mut guard = 0;
        while let Some(b) = first.and_then(|k| res.before(k)) {
            first = Some(b);
            guard += 1;
            if guard > keys.len() {
                break;
            }
        }
        res.first = first;
        res
    }
}

impl PartialEq for AnimatedCycle {
    fn eq(&self, other: &Self) -> bool {
        self.to_id_string() == other.to_id_string()
    }
}

impl fmt::Display for AnimatedCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_id_string())
    }
}

impl serde::Serialize for AnimatedCycle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_id_string())
    }
}

impl<'de> serde::Deserialize<'de> for AnimatedCycle {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        AnimatedCycle::from_id_string(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_form() {
        let c = AnimatedCycle::circular([
            AnimatedCycleNode::edge(CellId(3), true),
            AnimatedCycleNode::vertex(CellId(1)),
        ]);
        let s = c.to_id_string();
        assert_eq!(s, "[1:(3+,2,2,_,_) 2:(1,1,1,_,_)]");
        assert_eq!(AnimatedCycle::from_id_string(&s).unwrap(), c);
        let legacy = c.to_legacy_string();
        assert_eq!(legacy, "[ (3,1,1,-1,-1,1) , (1,0,0,-1,-1,1) ]");
        assert_eq!(
            AnimatedCycle::from_legacy_string(&legacy).unwrap().cells(),
            c.cells()
        );
    }

    #[test]
    fn serde_uses_string_form() {
        let c = AnimatedCycle::circular([AnimatedCycleNode::vertex(CellId(7))]);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"[1:(7,1,1,_,_)]\"");
        let back: AnimatedCycle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    /// Triangle moving between frames 0 and 10, fully inbetweened.
    fn moving_triangle() -> (Vac, AnimatedCycle, Vec<CellId>) {
        let mut vac = Vac::new();
        let (t0, t1) = (Time::frame(0), Time::frame(10));
        let pts = [(0.0, 0.0), (100.0, 0.0), (0.0, 100.0)];
        let v0: Vec<CellId> = pts
            .iter()
            .map(|(x, y)| vac.new_key_vertex(t0, Vector2::new(*x, *y)))
            .collect();
        let v1: Vec<CellId> = pts
            .iter()
            .map(|(x, y)| vac.new_key_vertex(t1, Vector2::new(*x + 50.0, *y)))
            .collect();
        let mut iv = Vec::new();
        for i in 0..3 {
            iv.push(vac.new_inbetween_vertex(v0[i], v1[i]).unwrap());
        }
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for i in 0..3 {
            let j = (i + 1) % 3;
            let e0 = vac.new_key_edge(v0[i], v0[j]).unwrap();
            let e1 = vac.new_key_edge(v1[i], v1[j]).unwrap();
            let ie = vac.inbetween_edges(e0, e1).unwrap();
            edges.push(ie);
            nodes.push(AnimatedCycleNode::edge(ie, true));
            nodes.push(AnimatedCycleNode::vertex(iv[j]));
        }
        (vac, AnimatedCycle::circular(nodes), edges)
    }

    #[test]
    fn sampling_an_inbetween_cycle() {
        let (vac, cycle, _) = moving_triangle();
        assert!(cycle.before_cells(&vac).len() == 6);
        let pts = cycle.sample(&vac, Time::frame(5));
        assert!(pts.len() > 10);
        let min_x = pts.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        approx::assert_relative_eq!(min_x, 25.0, epsilon = 1e-6);
    }

    #[test]
    fn keyframing_closed_edge_relinks_neighbours_in_time() {
        let mut vac = Vac::new();
        let ring = |r: f64| {
            let pts: Vec<Vector2<f64>> = (0..16)
                .map(|i| {
                    let a = i as f64 / 16.0 * std::f64::consts::TAU;
                    Vector2::new(r * a.cos(), r * a.sin())
                })
                .collect();
            vac_lite_geometry::LinearSpline::from_points(&pts, 2.0)
        };
        let r0 = vac.new_closed_key_edge(Time::frame(0), ring(50.0));
        let r1 = vac.new_closed_key_edge(Time::frame(6), ring(70.0));
        let ir = vac.inbetween_edges(r0, r1).unwrap();
        let mut cycle = AnimatedCycle::from_id_string(&format!(
            "[1:({}+,1,1,_,2) 2:({}+,2,2,1,3) 3:({}+,3,3,2,_)]",
            r0, ir, r1
        ))
        .unwrap();

        let (se1, ke, se2) = (CellId(100), CellId(101), CellId(102));
        cycle.replace_inbetween_edge(&vac, ir, se1, ke, se2, Time::frame(3));
        assert!(cycle.nodes_of(ir).is_empty());
        let chain: Vec<NodeKey> = [r0, se1, ke, se2, r1]
            .iter()
            .map(|c| cycle.nodes_of(*c)[0])
            .collect();
        for w in chain.windows(2) {
            assert_eq!(cycle.after(w[0]), Some(w[1]));
            assert_eq!(cycle.before(w[1]), Some(w[0]));
        }
    }

    #[test]
    fn key_cycle_from_halfedges() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let e = vac.new_key_edge(a, a).unwrap();
        let cycle = Cycle::from_halfedges(&vac, vec![KeyHalfedge::new(e, true)]);
        assert!(cycle.is_valid());
        let animated = AnimatedCycle::circular([
            AnimatedCycleNode::edge(e, true),
            AnimatedCycleNode::vertex(a),
        ]);
        assert_eq!(animated.cells(), cycle.cells(&vac));
    }
}
