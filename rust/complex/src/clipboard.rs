// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-complex copies, subcomplexes and the clipboard.

use rustc_hash::FxHashMap;

use crate::boundary::remap_data;
use crate::cell::{Cell, CellData};
use crate::keys::{CellId, CellSet};
use crate::time::Time;
use crate::vac::Vac;

/// Cells copied at a given time, pasted relative to that time.
#[derive(Debug)]
pub struct Clipboard {
    vac: Vac,
    time: Time,
}

impl Clipboard {
    pub fn vac(&self) -> &Vac {
        &self.vac
    }

    /// Time active when the cells were copied.
    pub fn time(&self) -> Time {
        self.time
    }

    pub fn is_empty(&self) -> bool {
        self.vac.is_empty()
    }
}

/// Shifts every key cell of `vac` by `delta`.
fn shift_key_times(vac: &mut Vac, delta: Time) {
    for cell in vac.cells.values_mut() {
        match &mut cell.data {
            CellData::KeyVertex(d) => d.time = d.time + delta,
            CellData::KeyEdge(d) => d.time = d.time + delta,
            CellData::KeyFace(d) => d.time = d.time + delta,
            _ => {}
        }
        cell.clear_cache();
    }
}

impl Vac {
    /// Deep copy with the same ids, depth order and settings. Selection,
    /// hover, observers and interaction state are not copied.
    pub fn clone_vac(&self) -> Vac {
        let mut res = Vac::with_settings(self.settings.clone());
        res.next_id = self.next_id;
        res.background_color = self.background_color;
        for (id, cell) in &self.cells {
            let mut c = cell.clone();
            c.selected = false;
            c.hovered = false;
            c.clear_cache();
            res.cells.insert(*id, c);
        }
        res.zordering = self.zordering.clone();
        res
    }

    /// Copy holding only the closure of `cells`, ids unchanged.
    pub fn subcomplex(&self, cells: &CellSet) -> Vac {
        let keep = self.closure(cells);
        let mut res = self.clone_vac();
        let drop: CellSet = res.cells.keys().copied().filter(|c| !keep.contains(c)).collect();
        for c in drop {
            res.delete_cell(c);
        }
        res
    }

    /// Copies every cell of `other` into this complex under fresh ids,
    /// on top of the depth order and preserving the relative order of
    /// `other`. Returns the map from old to new ids.
    pub fn import(&mut self, other: &Vac, select: bool) -> FxHashMap<CellId, CellId> {
        let order: Vec<CellId> = other.zordering.iter().collect();
        let mut map = FxHashMap::default();
        for &old in &order {
            map.insert(old, self.allocate_id());
        }
        for &old in &order {
            let (Some(src), Some(&new)) = (other.cells.get(&old), map.get(&old)) else {
                continue;
            };
            let mut data = src.data.clone();
            remap_data(&mut data, &map);
            self.cells.insert(new, Cell::new(new, src.color, data));
            self.zordering.insert_last(new);
        }
        for &old in &order {
            if let Some(&new) = map.get(&old) {
                self.add_to_star_of_boundary(new);
            }
        }
        if select {
            let imported: CellSet = map.values().copied().collect();
            self.add_cells_to_selection(&imported, false);
        }
        tracing::debug!(cells = map.len(), "complex imported");
        map
    }

    /// Copies the closure of the selection. `None` when nothing is selected.
    pub fn copy(&self, active_time: Time) -> Option<Clipboard> {
        if self.selection.is_empty() {
            return None;
        }
        Some(Clipboard {
            vac: self.subcomplex(&self.selection),
            time: active_time,
        })
    }

    /// Copies the selection, then smart-deletes it.
    pub fn cut(&mut self, active_time: Time) -> Option<Clipboard> {
        let clipboard = self.copy(active_time)?;
        let selection = self.selection.clone();
        self.operate("cut", |vac| vac.smart_delete_cells(&selection));
        self.emit_edit_done();
        Some(clipboard)
    }

    /// Imports the clipboard shifted by the time elapsed since the copy,
    /// and selects the pasted cells.
    pub fn paste(&mut self, clipboard: &Clipboard, active_time: Time) -> FxHashMap<CellId, CellId> {
        let mut pasted = clipboard.vac.clone_vac();
        shift_key_times(&mut pasted, active_time - clipboard.time);
        let selection = self.selection.clone();
        self.remove_cells_from_selection(&selection, false);
        let map = self.operate("paste", |vac| vac.import(&pasted, true));
        self.emit_edit_done();
        map
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector2;

    use super::*;

    fn segment(vac: &mut Vac, t: Time) -> (CellId, CellId, CellId) {
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(10.0, 0.0));
        let e = vac.new_key_edge(a, b).unwrap();
        (a, b, e)
    }

    #[test]
    fn clone_keeps_ids_and_stars() {
        let mut vac = Vac::new();
        let (a, _, e) = segment(&mut vac, Time::frame(0));
        vac.select(e);
        let copy = vac.clone_vac();
        assert_eq!(copy.cell_ids(), vac.cell_ids());
        assert!(copy.spatial_star(a).contains(&e));
        assert!(copy.selected_cells().is_empty());
        assert_eq!(copy.next_id(), vac.next_id());
        assert!(copy.check());
    }

    #[test]
    fn subcomplex_is_closed() {
        let mut vac = Vac::new();
        let (a, b, e) = segment(&mut vac, Time::frame(0));
        let c = vac.new_key_vertex(Time::frame(0), Vector2::new(5.0, 5.0));
        let sub = vac.subcomplex(&[e].into_iter().collect());
        assert_eq!(sub.cell_ids(), [a, b, e].into_iter().collect());
        assert!(!sub.contains(c));
        assert!(sub.check());
    }

    #[test]
    fn import_renumbers_and_keeps_order() {
        let mut src = Vac::new();
        let (a, _, e) = segment(&mut src, Time::frame(0));
        let mut dst = Vac::new();
        let x = dst.new_key_vertex(Time::frame(0), Vector2::new(50.0, 50.0));
        let map = dst.import(&src, true);
        assert_eq!(map.len(), 3);
        assert_ne!(map[&a], a);
        assert!(dst.spatial_star(map[&a]).contains(&map[&e]));
        assert_eq!(dst.zordering().as_slice()[0], x);
        assert_eq!(dst.selected_cells().len(), 3);
        assert!(dst.check());
    }

    #[test]
    fn paste_shifts_time() {
        let mut vac = Vac::new();
        let (_, _, e) = segment(&mut vac, Time::frame(2));
        vac.select(e);
        let clipboard = vac.copy(Time::frame(2)).unwrap();
        assert_eq!(clipboard.vac().len(), 3);

        let map = vac.paste(&clipboard, Time::frame(7));
        assert_eq!(vac.key_edges(Time::frame(7)).len(), 1);
        assert_eq!(vac.key_vertices(Time::frame(7)).len(), 2);
        assert_eq!(vac.selected_cells(), &map.values().copied().collect::<CellSet>());
        assert!(vac.check());
    }

    #[test]
    fn cut_removes_selection() {
        let mut vac = Vac::new();
        let (_, _, e) = segment(&mut vac, Time::frame(0));
        vac.select(e);
        let clipboard = vac.cut(Time::frame(0)).unwrap();
        assert!(!vac.contains(e));
        assert!(!clipboard.is_empty());
        assert!(vac.copy(Time::frame(0)).is_none());
    }
}
