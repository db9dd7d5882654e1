// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Selection and hover state.
//!
//! The complex is the only writer of the `selected` and `hovered` flags of
//! its cells. Set operations coalesce their notifications into a single
//! [`Notification::SelectionChanged`]. Passing `emit_changed` also emits
//! [`Notification::Changed`].

use crate::keys::{CellId, CellSet, SpatialKind};
use crate::notify::Notification;
use crate::time::Time;
use crate::vac::Vac;

/// Time span covered by the selection, as shown by a timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionSpan {
    None,
    /// Some key cells are selected, the first at `t`. `t1` and `t2` bound
    /// the interval in which the selection can be moved without crossing
    /// neighbouring key cells.
    Key { t: f64, t1: f64, t2: f64 },
    /// Only inbetween cells are selected; the interval of the first one.
    Inbetween { t1: f64, t2: f64 },
}

impl Vac {
    // --------------------------------------------------------------------
    // Hover
    // --------------------------------------------------------------------

    pub fn hovered_cell(&self) -> Option<CellId> {
        self.hovered
    }

    pub fn set_hovered_cell(&mut self, id: CellId) {
        self.set_no_hovered_cell();
        if let Some(c) = self.cells.get_mut(&id) {
            c.hovered = true;
            self.hovered = Some(id);
        }
    }

    pub fn set_no_hovered_cell(&mut self) {
        if let Some(h) = self.hovered.take() {
            if let Some(c) = self.cells.get_mut(&h) {
                c.hovered = false;
            }
        }
    }

    // --------------------------------------------------------------------
    // Single cells
    // --------------------------------------------------------------------

    pub fn selected_cells(&self) -> &CellSet {
        &self.selection
    }

    pub fn num_selected_cells(&self) -> usize {
        self.selection.len()
    }

    pub fn is_selected(&self, id: CellId) -> bool {
        self.selection.contains(&id)
    }

    pub fn add_to_selection(&mut self, id: CellId, emit_changed: bool) {
        let Some(c) = self.cells.get_mut(&id) else {
            return;
        };
        if c.selected {
            return;
        }
        c.selected = true;
        self.selection.insert(id);
        self.emit(Notification::SelectionChanged);
        if emit_changed {
            self.emit(Notification::Changed);
        }
    }

    pub fn remove_from_selection(&mut self, id: CellId, emit_changed: bool) {
        let Some(c) = self.cells.get_mut(&id) else {
            return;
        };
        if !c.selected {
            return;
        }
        c.selected = false;
        self.selection.remove(&id);
        self.emit(Notification::SelectionChanged);
        if emit_changed {
            self.emit(Notification::Changed);
        }
    }

    pub fn toggle_selection(&mut self, id: CellId, emit_changed: bool) {
        if self.is_selected(id) {
            self.remove_from_selection(id, emit_changed);
        } else {
            self.add_to_selection(id, emit_changed);
        }
    }

    /// Picking entry points.
    pub fn select(&mut self, id: CellId) {
        self.add_to_selection(id, false);
    }

    pub fn deselect(&mut self, id: CellId) {
        self.remove_from_selection(id, false);
    }

    pub fn toggle(&mut self, id: CellId) {
        self.toggle_selection(id, false);
    }

    // --------------------------------------------------------------------
    // Sets
    // --------------------------------------------------------------------

    pub fn add_cells_to_selection(&mut self, cells: &CellSet, emit_changed: bool) {
        self.begin_aggregate_signals();
        for c in cells {
            self.add_to_selection(*c, false);
        }
        self.end_aggregate_signals();
        if emit_changed {
            self.emit(Notification::Changed);
        }
    }

    pub fn remove_cells_from_selection(&mut self, cells: &CellSet, emit_changed: bool) {
        self.begin_aggregate_signals();
        for c in cells {
            self.remove_from_selection(*c, false);
        }
        self.end_aggregate_signals();
        if emit_changed {
            self.emit(Notification::Changed);
        }
    }

    pub fn toggle_cells_selection(&mut self, cells: &CellSet, emit_changed: bool) {
        self.begin_aggregate_signals();
        for c in cells {
            self.toggle_selection(*c, false);
        }
        self.end_aggregate_signals();
        if emit_changed {
            self.emit(Notification::Changed);
        }
    }

    pub fn set_selected_cell(&mut self, id: CellId, emit_changed: bool) {
        if self.contains(id) {
            self.set_selected_cells(&[id].into_iter().collect(), emit_changed);
        }
    }

    /// Replaces the selection. Ids of missing cells are ignored.
    pub fn set_selected_cells(&mut self, cells: &CellSet, emit_changed: bool) {
        for id in std::mem::take(&mut self.selection) {
            if let Some(c) = self.cells.get_mut(&id) {
                c.selected = false;
            }
        }
        for id in cells {
            if let Some(c) = self.cells.get_mut(id) {
                c.selected = true;
                self.selection.insert(*id);
            }
        }
        self.emit(Notification::SelectionChanged);
        if emit_changed {
            self.emit(Notification::Changed);
        }
    }

    pub fn select_all(&mut self, emit_changed: bool) {
        let all = self.cell_ids();
        self.add_cells_to_selection(&all, emit_changed);
    }

    pub fn deselect_all(&mut self) {
        if !self.selection.is_empty() {
            self.set_selected_cells(&CellSet::new(), false);
        }
    }

    /// Deselects the selected cells existing at `t`.
    pub fn deselect_all_at(&mut self, t: Time) {
        let cells: CellSet = self
            .selection
            .iter()
            .copied()
            .filter(|c| self.exists(*c, t))
            .collect();
        self.remove_cells_from_selection(&cells, false);
    }

    pub fn invert_selection(&mut self) {
        let cells: CellSet = self.cell_ids().difference(&self.selection).copied().collect();
        self.set_selected_cells(&cells, true);
    }

    pub fn select_connected(&mut self, emit_changed: bool) {
        let cells = self.connected(&self.selection);
        self.add_cells_to_selection(&cells, emit_changed);
    }

    pub fn select_closure(&mut self, emit_changed: bool) {
        let cells = self.closure(&self.selection);
        self.add_cells_to_selection(&cells, emit_changed);
    }

    fn keep_selected(&mut self, keep: impl Fn(SpatialKind) -> bool, emit_changed: bool) {
        let cells: CellSet = self
            .selection
            .iter()
            .copied()
            .filter(|c| self.cell(*c).map_or(false, |c| keep(c.spatial_kind())))
            .collect();
        self.set_selected_cells(&cells, emit_changed);
    }

    /// Restricts the selection to its vertices.
    pub fn select_vertices(&mut self, emit_changed: bool) {
        self.keep_selected(|k| k == SpatialKind::Vertex, emit_changed);
    }

    pub fn select_edges(&mut self, emit_changed: bool) {
        self.keep_selected(|k| k == SpatialKind::Edge, emit_changed);
    }

    pub fn select_faces(&mut self, emit_changed: bool) {
        self.keep_selected(|k| k == SpatialKind::Face, emit_changed);
    }

    pub fn deselect_vertices(&mut self, emit_changed: bool) {
        self.keep_selected(|k| k != SpatialKind::Vertex, emit_changed);
    }

    pub fn deselect_edges(&mut self, emit_changed: bool) {
        self.keep_selected(|k| k != SpatialKind::Edge, emit_changed);
    }

    pub fn deselect_faces(&mut self, emit_changed: bool) {
        self.keep_selected(|k| k != SpatialKind::Face, emit_changed);
    }

    /// Time span of the selection.
    pub fn selection_span(&self) -> SelectionSpan {
        let mut res = SelectionSpan::None;
        for id in &self.selection {
            let Some(cell) = self.cell(*id) else {
                continue;
            };
            match cell.key_time() {
                Some(kt) => {
                    let (t, mut t1, mut t2) = match res {
                        SelectionSpan::Key { t, t1, t2 } => (t, t1, t2),
                        _ => (kt.float_time(), f64::MIN, f64::MAX),
                    };
                    for s in &cell.temporal_star_before {
                        t1 = t1.max(self.before_time(*s).float_time());
                    }
                    for s in &cell.temporal_star_after {
                        t2 = t2.min(self.after_time(*s).float_time());
                    }
                    res = SelectionSpan::Key { t, t1, t2 };
                }
                None => {
                    if res == SelectionSpan::None {
                        res = SelectionSpan::Inbetween {
                            t1: self.before_time(*id).float_time(),
                            t2: self.after_time(*id).float_time(),
                        };
                    }
                }
            }
        }
        if let SelectionSpan::Key { t, t1, t2 } = res {
            res = SelectionSpan::Key {
                t,
                t1: if t1 == f64::MIN { t } else { t1 },
                t2: if t2 == f64::MAX { t } else { t2 },
            };
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use nalgebra::Vector2;

    use super::*;

    fn recording(vac: &mut Vac) -> Rc<RefCell<Vec<Notification>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        vac.add_observer(move |n: Notification| sink.borrow_mut().push(n));
        log
    }

    #[test]
    fn set_operations_emit_once() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(1.0, 0.0));
        let log = recording(&mut vac);
        vac.select_all(false);
        assert_eq!(*log.borrow(), vec![Notification::SelectionChanged]);
        assert!(vac.cell(a).unwrap().is_selected());
        assert_eq!(vac.num_selected_cells(), 2);

        log.borrow_mut().clear();
        vac.toggle(b);
        vac.invert_selection();
        assert_eq!(vac.selected_cells(), &[b].into_iter().collect());
        assert_eq!(
            *log.borrow(),
            vec![
                Notification::SelectionChanged,
                Notification::SelectionChanged,
                Notification::Changed
            ]
        );
    }

    #[test]
    fn filters_by_dimension() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(1.0, 0.0));
        let e = vac.new_key_edge(a, b).unwrap();
        vac.set_selected_cell(e, false);
        vac.select_closure(false);
        assert_eq!(vac.num_selected_cells(), 3);
        vac.deselect_vertices(false);
        assert_eq!(vac.selected_cells(), &[e].into_iter().collect());
    }

    #[test]
    fn hover_is_exclusive() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(1.0, 0.0));
        vac.set_hovered_cell(a);
        vac.set_hovered_cell(b);
        assert_eq!(vac.hovered_cell(), Some(b));
        assert!(!vac.cell(a).unwrap().is_hovered());
    }

    #[test]
    fn span_of_key_selection() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(4), Vector2::new(0.0, 0.0));
        let c = vac.new_key_vertex(Time::frame(10), Vector2::new(0.0, 0.0));
        vac.new_inbetween_vertex(a, b).unwrap();
        let bc = vac.new_inbetween_vertex(b, c).unwrap();
        vac.select(b);
        assert_eq!(vac.selection_span(), SelectionSpan::Key { t: 4.0, t1: 0.0, t2: 10.0 });
        vac.set_selected_cell(bc, false);
        assert_eq!(vac.selection_span(), SelectionSpan::Inbetween { t1: 4.0, t2: 10.0 });
    }
}
