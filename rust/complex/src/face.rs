// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building key faces from the selection.

use crate::cell::CellData;
use crate::cycle::Cycle;
use crate::cycle_helper::{EdgeSetType, SmartKeyEdgeSet};
use crate::keys::{CellId, CellSet, CellType};
use crate::vac::Vac;

impl Vac {
    /// Cycles described by the selected key edges and key vertices.
    ///
    /// Each connected component of the selected edges gives one cycle when
    /// it is a closed edge, a loop, or a path (closed by a new straight
    /// edge between its ends). A component decomposing into loops gives
    /// one cycle per loop; ambiguous components are skipped. Selected
    /// vertices outside the closure of the selected edges give Steiner
    /// cycles.
    pub fn create_face_compute_cycles(&mut self) -> Vec<Cycle> {
        let edges: CellSet = self.selected_of_type(CellType::KeyEdge).into_iter().collect();
        let smart = SmartKeyEdgeSet::new(self, &edges);
        let mut cycles = Vec::new();

        for component in smart.components() {
            match component.kind() {
                EdgeSetType::ClosedEdge | EdgeSetType::OpenEdgeLoop | EdgeSetType::SimpleLoop => {
                    let cycle = Cycle::from_edge_set(self, component.edges());
                    if cycle.is_valid() {
                        cycles.push(cycle);
                    }
                }
                EdgeSetType::OpenEdgePath | EdgeSetType::SimplePath => {
                    let path = component.path();
                    let (Some(start), Some(end)) = (path.start_vertex(self), path.end_vertex(self)) else {
                        continue;
                    };
                    let Ok(closing) = self.new_key_edge(start, end) else {
                        continue;
                    };
                    let mut set = component.edges().clone();
                    set.insert(closing);
                    let cycle = Cycle::from_edge_set(self, &set);
                    if cycle.is_valid() {
                        cycles.push(cycle);
                    } else {
                        self.delete_cell(closing);
                    }
                }
                EdgeSetType::PathLoopDecomposition => {
                    for proper in component.helper().loops() {
                        let set: CellSet = proper.halfedges().iter().map(|h| h.edge).collect();
                        let cycle = Cycle::from_edge_set(self, &set);
                        if cycle.is_valid() {
                            cycles.push(cycle);
                        }
                    }
                }
                EdgeSetType::General => {
                    tracing::info!(edges = component.edges().len(), "ambiguous selected edges ignored");
                }
                EdgeSetType::Empty => {}
            }
        }

        let closure = self.closure(&edges);
        for v in self.selected_of_type(CellType::KeyVertex) {
            if !closure.contains(&v) {
                cycles.push(Cycle::from_vertex(v));
            }
        }
        cycles
    }

    /// Creates a key face bounded by the cycles of the selection.
    pub fn create_face(&mut self) -> Option<CellId> {
        let face = self.operate("create face", |vac| {
            let cycles = vac.create_face_compute_cycles();
            if cycles.is_empty() {
                tracing::info!("create face aborted: no valid cycle in selection");
                return None;
            }
            match vac.new_key_face_with_cycles(cycles) {
                Ok(f) => Some(f),
                Err(e) => {
                    tracing::info!(error = %e, "create face aborted");
                    None
                }
            }
        })?;
        self.emit_edit_done();
        Some(face)
    }

    /// Adds the cycles of the selection to every selected key face living
    /// at the same time.
    pub fn add_cycles_to_face(&mut self) -> bool {
        let faces = self.selected_of_type(CellType::KeyFace);
        if faces.is_empty() {
            tracing::info!("add cycles aborted: no face selected");
            return false;
        }
        let done = self.operate("add cycles to face", |vac| {
            let cycles = vac.create_face_compute_cycles();
            if cycles.is_empty() {
                tracing::info!("add cycles aborted: no valid cycle in selection");
                return false;
            }
            let mut done = false;
            for f in faces {
                let Some(time) = vac.key_face(f).map(|d| d.time()) else {
                    continue;
                };
                let added: Vec<Cycle> = cycles.iter().filter(|c| c.time(vac) == time).cloned().collect();
                if added.is_empty() {
                    continue;
                }
                vac.modify_boundary(f, |_, data| {
                    if let CellData::KeyFace(fd) = data {
                        fd.cycles.extend(added);
                    }
                });
                done = true;
            }
            done
        });
        if done {
            self.emit_edit_done();
        }
        done
    }

    /// Removes from every selected key face the cycles going through a
    /// selected cell. A face keeps at least one cycle.
    pub fn remove_cycles_from_face(&mut self) -> bool {
        let faces = self.selected_of_type(CellType::KeyFace);
        if faces.is_empty() {
            tracing::info!("remove cycles aborted: no face selected");
            return false;
        }
        let selection = self.selection.clone();
        let done = self.operate("remove cycles from face", |vac| {
            let mut done = false;
            for f in faces {
                let Some(cycles) = vac.key_face(f).map(|d| d.cycles.clone()) else {
                    continue;
                };
                let kept: Vec<Cycle> = cycles
                    .iter()
                    .filter(|c| c.cells(vac).is_disjoint(&selection))
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    tracing::info!(face = %f, "remove cycles aborted: a face keeps at least one cycle");
                    continue;
                }
                if kept.len() == cycles.len() {
                    continue;
                }
                vac.modify_boundary(f, |_, data| {
                    if let CellData::KeyFace(fd) = data {
                        fd.cycles = kept;
                    }
                });
                done = true;
            }
            done
        });
        if done {
            self.emit_edit_done();
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector2;

    use super::*;
    use crate::time::Time;

    fn square(vac: &mut Vac, x: f64, y: f64, size: f64) -> Vec<CellId> {
        let t = Time::frame(0);
        let p = [(x, y), (x + size, y), (x + size, y + size), (x, y + size)];
        let v: Vec<CellId> = p.iter().map(|(x, y)| vac.new_key_vertex(t, Vector2::new(*x, *y))).collect();
        (0..4).map(|i| vac.new_key_edge(v[i], v[(i + 1) % 4]).unwrap()).collect()
    }

    #[test]
    fn face_from_selected_loop() {
        let mut vac = Vac::new();
        let edges = square(&mut vac, 0.0, 0.0, 100.0);
        vac.set_selected_cells(&edges.iter().copied().collect(), false);
        let f = vac.create_face().unwrap();
        let d = vac.key_face(f).unwrap();
        assert_eq!(d.cycles().len(), 1);
        assert_eq!(d.cycles()[0].len(), 4);
        // Faces go below their boundary
        assert_eq!(vac.zordering().as_slice()[0], f);
        assert!(vac.check());
    }

    #[test]
    fn open_path_is_closed_by_new_edge() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(100.0, 0.0));
        let c = vac.new_key_vertex(t, Vector2::new(50.0, 80.0));
        let e1 = vac.new_key_edge(a, b).unwrap();
        let e2 = vac.new_key_edge(b, c).unwrap();
        vac.set_selected_cells(&[e1, e2].into_iter().collect(), false);
        let f = vac.create_face().unwrap();
        assert_eq!(vac.key_face(f).unwrap().cycles()[0].len(), 3);
        assert_eq!(vac.key_edges(t).len(), 3);
        assert!(vac.check());
    }

    #[test]
    fn lone_vertex_gives_steiner_cycle() {
        let mut vac = Vac::new();
        let v = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        vac.select(v);
        let f = vac.create_face().unwrap();
        assert_eq!(vac.key_face(f).unwrap().cycles()[0].single_vertex(), Some(v));
    }

    #[test]
    fn empty_selection_creates_nothing() {
        let mut vac = Vac::new();
        assert!(vac.create_face().is_none());
        assert!(vac.is_empty());
    }

    #[test]
    fn holes_are_added_then_removed() {
        let mut vac = Vac::new();
        let outer = square(&mut vac, 0.0, 0.0, 100.0);
        let inner = square(&mut vac, 25.0, 25.0, 50.0);
        vac.set_selected_cells(&outer.iter().copied().collect(), false);
        let f = vac.create_face().unwrap();

        let mut sel: CellSet = inner.iter().copied().collect();
        sel.insert(f);
        vac.set_selected_cells(&sel, false);
        assert!(vac.add_cycles_to_face());
        assert_eq!(vac.key_face(f).unwrap().cycles().len(), 2);
        assert!(vac.spatial_star(inner[0]).contains(&f));

        assert!(vac.remove_cycles_from_face());
        assert_eq!(vac.key_face(f).unwrap().cycles().len(), 1);
        assert!(!vac.spatial_star(inner[0]).contains(&f));

        // The last cycle is never removed
        let mut sel: CellSet = outer.iter().copied().collect();
        sel.insert(f);
        vac.set_selected_cells(&sel, false);
        assert!(!vac.remove_cycles_from_face());
        assert!(vac.check());
    }
}
