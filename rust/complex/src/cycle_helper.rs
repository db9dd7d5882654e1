// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Classification of selected edge sets for face creation.
//!
//! [`SmartKeyEdgeSet`] splits an edge set into connected components and
//! classifies each one. Components that are neither a single edge, a simple
//! path nor a simple loop may still decompose into loops plus dangling
//! edges, which is what [`CycleHelper`] computes.

use rustc_hash::FxHashMap;

use crate::keys::{CellId, CellSet};
use crate::proper::{ProperCycle, ProperPath};
use crate::time::Time;
use crate::vac::Vac;

/// Edges of a component as an index graph: `ends[i]` are the two vertex
/// slots of edge `i`, `incidence[v]` the edges touching vertex slot `v`.
struct EdgeGraph {
    edges: Vec<CellId>,
    ends: Vec<(usize, usize)>,
    incidence: Vec<Vec<usize>>,
}

impl EdgeGraph {
    /// `None` if an edge is closed or missing.
    fn new(vac: &Vac, edges: &CellSet) -> Option<Self> {
        let mut slots: FxHashMap<CellId, usize> = FxHashMap::default();
        let mut incidence: Vec<Vec<usize>> = Vec::new();
        let mut ends = Vec::with_capacity(edges.len());
        let mut slot = |v: CellId, incidence: &mut Vec<Vec<usize>>| {
            *slots.entry(v).or_insert_with(|| {
                incidence.push(Vec::new());
                incidence.len() - 1
            })
        };
        for (i, e) in edges.iter().enumerate() {
            let d = vac.key_edge(*e)?;
            let (Some(a), Some(b)) = (d.start_vertex(), d.end_vertex()) else {
                return None;
            };
            let a = slot(a, &mut incidence);
            let b = slot(b, &mut incidence);
            incidence[a].push(i);
            if b != a {
                incidence[b].push(i);
            }
            ends.push((a, b));
        }
        Some(Self {
            edges: edges.iter().copied().collect(),
            ends,
            incidence,
        })
    }

    fn other_end(&self, edge: usize, v: usize) -> usize {
        let (a, b) = self.ends[edge];
        if a == v {
            b
        } else {
            a
        }
    }

    /// Edge indices of each connected component.
    fn components(&self) -> Vec<Vec<usize>> {
        let mut marked = vec![false; self.edges.len()];
        let mut res = Vec::new();
        for start in 0..self.edges.len() {
            if marked[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(e) = stack.pop() {
                if marked[e] {
                    continue;
                }
                marked[e] = true;
                component.push(e);
                let (a, b) = self.ends[e];
                stack.extend(self.incidence[a].iter().copied());
                stack.extend(self.incidence[b].iter().copied());
            }
            component.sort_unstable();
            res.push(component);
        }
        res
    }

    /// Any cycle among the edges not yet `removed`, as edge indices.
    fn find_loop(&self, removed: &[bool]) -> Option<Vec<usize>> {
        let n = self.incidence.len();
        let mut visited = vec![false; n];
        let mut parent: Vec<Option<usize>> = vec![None; n];
        for root in 0..n {
            if visited[root] {
                continue;
            }
            let mut stack = vec![root];
            while let Some(v) = stack.pop() {
                if visited[v] {
                    continue;
                }
                visited[v] = true;
                for &e in &self.incidence[v] {
                    if removed[e] || parent[v] == Some(e) {
                        continue;
                    }
                    let w = self.other_end(e, v);
                    if visited[w] {
                        return Some(self.tree_path(&parent, v, w, e));
                    }
                    parent[w] = Some(e);
                    stack.push(w);
                }
            }
        }
        None
    }

    /// Closing edge `e` from `v` to `w` plus the tree paths from both ends
    /// to their lowest common ancestor.
    fn tree_path(&self, parent: &[Option<usize>], v: usize, w: usize, e: usize) -> Vec<usize> {
        let mut w_ancestors: FxHashMap<usize, usize> = FxHashMap::default();
        let mut chain_w = Vec::new();
        let mut x = w;
        w_ancestors.insert(x, 0);
        while let Some(pe) = parent[x] {
            chain_w.push(pe);
            x = self.other_end(pe, x);
            w_ancestors.insert(x, chain_w.len());
        }
        let mut res = vec![e];
        let mut x = v;
        while !w_ancestors.contains_key(&x) {
            let Some(pe) = parent[x] else {
                break;
            };
            res.push(pe);
            x = self.other_end(pe, x);
        }
        if let Some(&depth) = w_ancestors.get(&x) {
            res.extend_from_slice(&chain_w[..depth]);
        }
        res
    }
}

/// Loops and dangling edges of a connected edge set, or a single vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleHelper {
    vertex: Option<CellId>,
    loops: Vec<ProperCycle>,
    paths: Vec<ProperPath>,
}

impl CycleHelper {
    pub fn from_vertex(vertex: CellId) -> Self {
        Self {
            vertex: Some(vertex),
            ..Default::default()
        }
    }

    /// Decomposes a connected set of edges living at one time into simple
    /// loops plus single-edge paths. The result is invalid when the set is
    /// disconnected, mixes times, or the decomposition does not account for
    /// every vertex.
    pub fn from_edge_set(vac: &Vac, edges: &CellSet) -> Self {
        let mut res = Self::default();
        let Some(&first) = edges.iter().next() else {
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
            if edges.len() == 1 {
                let cycle = ProperCycle::from_edge_set(vac, edges);
                if cycle.is_valid() {
                    res.loops.push(cycle);
                }
            }
            return res;
        }

        let Some(graph) = EdgeGraph::new(vac, edges) else {
            return res;
        };
        if graph.components().len() != 1 {
            return res;
        }
        let num_vertices = graph.incidence.len();

        let mut removed = vec![false; graph.edges.len()];
        while let Some(cycle) = graph.find_loop(&removed) {
            let mut set = CellSet::new();
            for e in cycle {
                removed[e] = true;
                set.insert(graph.edges[e]);
            }
            res.loops.push(ProperCycle::from_edge_set(vac, &set));
        }
        for (i, e) in graph.edges.iter().enumerate() {
            if !removed[i] {
                res.paths
                    .push(ProperPath::from_edge_set(vac, &CellSet::from([*e])));
            }
        }

        // Each loop contributes as many vertices as edges, each single-edge
        // path two, and gluing k pieces into a connected tree of pieces
        // shares exactly k - 1 vertices.
        let mut euler = 1i64;
        euler += res.loops.iter().map(|l| l.len() as i64).sum::<i64>();
        euler += res.paths.iter().map(|p| p.len() as i64 + 1).sum::<i64>();
        euler -= num_vertices as i64;
        euler -= (res.loops.len() + res.paths.len()) as i64;
        if euler != 0 || res.loops.iter().any(|l| !l.is_valid()) {
            res.loops.clear();
            res.paths.clear();
        }
        res
    }

    pub fn is_valid(&self) -> bool {
        self.is_single_vertex() || !self.loops.is_empty() || !self.paths.is_empty()
    }

    pub fn is_single_vertex(&self) -> bool {
        self.vertex.is_some()
    }

    pub fn vertex(&self) -> Option<CellId> {
        self.vertex
    }

    pub fn time(&self, vac: &Vac) -> Time {
        if let Some(v) = self.vertex {
            vac.key_vertex(v).map(|d| d.time()).unwrap_or_default()
        } else if let Some(l) = self.loops.first() {
            l.time(vac)
        } else if let Some(p) = self.paths.first() {
            p.time(vac)
        } else {
            Time::default()
        }
    }

    pub fn loops(&self) -> &[ProperCycle] {
        &self.loops
    }

    pub fn paths(&self) -> &[ProperPath] {
        &self.paths
    }

    pub fn cells(&self, vac: &Vac) -> CellSet {
        let mut res = CellSet::new();
        res.extend(self.vertex);
        for l in &self.loops {
            for h in l.halfedges() {
                res.extend(h.start_vertex(vac));
                res.insert(h.edge);
            }
        }
        for p in &self.paths {
            res.extend(p.start_vertex(vac));
            for h in p.halfedges() {
                res.insert(h.edge);
                res.extend(h.end_vertex(vac));
            }
        }
        res
    }

    pub fn replace_edges(&mut self, old: CellId, new_edges: &[CellId]) {
        for l in &mut self.loops {
            l.replace_edges(old, new_edges);
        }
        for p in &mut self.paths {
            p.replace_edges(old, new_edges);
        }
    }
}

/// Shape of one connected component of an edge set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSetType {
    Empty,
    ClosedEdge,
    /// A single open edge whose two ends are the same vertex.
    OpenEdgeLoop,
    /// A single open edge with distinct end vertices.
    OpenEdgePath,
    SimplePath,
    SimpleLoop,
    PathLoopDecomposition,
    General,
}

#[derive(Debug, Clone)]
pub struct ConnectedKeyEdgeSet {
    edges: CellSet,
    path: ProperPath,
    cycle: ProperCycle,
    helper: CycleHelper,
    kind: EdgeSetType,
}

impl ConnectedKeyEdgeSet {
    fn new(vac: &Vac, edges: CellSet) -> Self {
        let path = ProperPath::from_edge_set(vac, &edges);
        let cycle = ProperCycle::from_edge_set(vac, &edges);
        let helper = CycleHelper::from_edge_set(vac, &edges);
        let single = if edges.len() == 1 {
            edges.iter().next().and_then(|e| vac.key_edge(*e))
        } else {
            None
        };
        let kind = if edges.is_empty() {
            EdgeSetType::Empty
        } else if let Some(e) = single {
            if e.is_closed() {
                EdgeSetType::ClosedEdge
            } else if e.is_split_loop() {
                EdgeSetType::OpenEdgeLoop
            } else {
                EdgeSetType::OpenEdgePath
            }
        } else if path.is_valid() {
            EdgeSetType::SimplePath
        } else if cycle.is_valid() {
            EdgeSetType::SimpleLoop
        } else if helper.is_valid() {
            EdgeSetType::PathLoopDecomposition
        } else {
            EdgeSetType::General
        };
        Self {
            edges,
            path,
            cycle,
            helper,
            kind,
        }
    }

    pub fn kind(&self) -> EdgeSetType {
        self.kind
    }

    pub fn edges(&self) -> &CellSet {
        &self.edges
    }

    /// The edge when the component has exactly one.
    pub fn edge(&self) -> Option<CellId> {
        if self.edges.len() == 1 {
            self.edges.iter().next().copied()
        } else {
            None
        }
    }

    pub fn path(&self) -> &ProperPath {
        &self.path
    }

    pub fn cycle(&self) -> &ProperCycle {
        &self.cycle
    }

    pub fn helper(&self) -> &CycleHelper {
        &self.helper
    }
}

/// Connected components of an edge set. Closed edges are components on
/// their own; open edges connect through shared vertices.
#[derive(Debug, Clone)]
pub struct SmartKeyEdgeSet {
    components: Vec<ConnectedKeyEdgeSet>,
}

impl SmartKeyEdgeSet {
    pub fn new(vac: &Vac, edges: &CellSet) -> Self {
        let mut components = Vec::new();
        let mut open = CellSet::new();
        for e in edges {
            match vac.key_edge(*e) {
                Some(d) if d.is_closed() => {
                    components.push(ConnectedKeyEdgeSet::new(vac, CellSet::from([*e])));
                }
                Some(_) => {
                    open.insert(*e);
                }
                None => {}
            }
        }
        if let Some(graph) = EdgeGraph::new(vac, &open) {
            for component in graph.components() {
                let set: CellSet = component.iter().map(|i| graph.edges[*i]).collect();
                components.push(ConnectedKeyEdgeSet::new(vac, set));
            }
        }
        Self { components }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[ConnectedKeyEdgeSet] {
        &self.components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    /// Two triangles sharing vertex `c`, plus a dangling edge from `c`.
    fn bowtie() -> (Vac, Vec<CellId>) {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let c = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let a = vac.new_key_vertex(t, Vector2::new(-10.0, 5.0));
        let b = vac.new_key_vertex(t, Vector2::new(-10.0, -5.0));
        let d = vac.new_key_vertex(t, Vector2::new(10.0, 5.0));
        let e = vac.new_key_vertex(t, Vector2::new(10.0, -5.0));
        let f = vac.new_key_vertex(t, Vector2::new(0.0, 20.0));
        let edges = vec![
            vac.new_key_edge(c, a).unwrap(),
            vac.new_key_edge(a, b).unwrap(),
            vac.new_key_edge(b, c).unwrap(),
            vac.new_key_edge(c, d).unwrap(),
            vac.new_key_edge(d, e).unwrap(),
            vac.new_key_edge(e, c).unwrap(),
            vac.new_key_edge(c, f).unwrap(),
        ];
        (vac, edges)
    }

    #[test]
    fn decomposes_into_loops_and_paths() {
        let (vac, edges) = bowtie();
        let helper = CycleHelper::from_edge_set(&vac, &edges.iter().copied().collect());
        assert!(helper.is_valid());
        assert_eq!(helper.loops().len(), 2);
        assert_eq!(helper.paths().len(), 1);
        assert!(helper.loops().iter().all(|l| l.len() == 3));
    }

    #[test]
    fn classifies_components() {
        let (vac, edges) = bowtie();
        let loop_set: CellSet = edges[..3].iter().copied().collect();
        let smart = SmartKeyEdgeSet::new(&vac, &loop_set);
        assert_eq!(smart.len(), 1);
        assert_eq!(smart.components()[0].kind(), EdgeSetType::SimpleLoop);

        let path_set: CellSet = [edges[0], edges[1]].into_iter().collect();
        let smart = SmartKeyEdgeSet::new(&vac, &path_set);
        assert_eq!(smart.components()[0].kind(), EdgeSetType::SimplePath);

        let all: CellSet = edges.iter().copied().collect();
        let smart = SmartKeyEdgeSet::new(&vac, &all);
        assert_eq!(smart.len(), 1);
        assert_eq!(
            smart.components()[0].kind(),
            EdgeSetType::PathLoopDecomposition
        );

        let split: CellSet = [edges[1], edges[4]].into_iter().collect();
        let smart = SmartKeyEdgeSet::new(&vac, &split);
        assert_eq!(smart.len(), 2);
        assert!(smart
            .components()
            .iter()
            .all(|c| c.kind() == EdgeSetType::OpenEdgePath));
    }
}
