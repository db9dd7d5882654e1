// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cell deletion and smart deletion.

use crate::keys::{CellId, CellSet, CellType};
use crate::notify::Notification;
use crate::vac::Vac;

impl Vac {
    /// Deletes `id` and, first, every cell of its star. The complex is valid
    /// on return. Missing ids are ignored.
    pub fn delete_cell(&mut self, id: CellId) {
        if !self.contains(id) {
            return;
        }
        for s in self.star(id) {
            self.delete_cell(s);
        }
        self.remove_from_star_of_boundary(id);

        let Some(cell) = self.cells.remove(&id) else {
            return;
        };
        self.zordering.remove(id);
        if self.selection.remove(&id) || cell.selected {
            self.emit(Notification::SelectionChanged);
        }
        if self.hovered == Some(id) {
            self.hovered = None;
        }
        self.interaction.forget_cell(id);
        tracing::trace!(cell = %id, kind = ?cell.cell_type(), "cell deleted");
    }

    /// Deletes every cell of `cells` still present when its turn comes.
    pub fn delete_cells(&mut self, cells: &CellSet) {
        for c in cells {
            self.delete_cell(*c);
        }
    }

    /// Deletes every cell. Ids keep growing afterwards.
    pub fn delete_all_cells(&mut self) {
        self.begin_aggregate_signals();
        while let Some(id) = self.cells.keys().next().copied() {
            self.delete_cell(id);
        }
        self.end_aggregate_signals();
    }

    pub fn delete_selected_cells(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        self.begin_aggregate_signals();
        while let Some(id) = self.selection.iter().next().copied() {
            self.delete_cell(id);
        }
        self.end_aggregate_signals();
        self.emit_edit_done();
    }

    /// Removes `id` by uncutting it, when it is a key vertex or key edge
    /// that can be uncut.
    pub fn atomic_simplify_at_cell(&mut self, id: CellId) -> bool {
        match self.cell_type(id) {
            Some(CellType::KeyVertex) => self.uncut_vertex(id),
            Some(CellType::KeyEdge) => self.uncut_edge(id),
            _ => false,
        }
    }

    /// Simplifies `id` away if possible, after trying to simplify the
    /// edges of its star. Deletes it otherwise.
    pub fn smart_delete_cell(&mut self, id: CellId) {
        if !self.contains(id) || self.atomic_simplify_at_cell(id) {
            return;
        }
        let star_edges: Vec<CellId> = self
            .star(id)
            .into_iter()
            .filter(|c| self.cell_type(*c) == Some(CellType::KeyEdge))
            .collect();
        if star_edges.is_empty() {
            self.delete_cell(id);
            return;
        }
        for e in star_edges {
            if self.contains(e) {
                self.atomic_simplify_at_cell(e);
            }
        }
        if !self.atomic_simplify_at_cell(id) {
            self.delete_cell(id);
        }
    }

    /// Smart deletion of the key faces, then key edges, then key vertices
    /// of `cells`. Simplifying a cell never touches cells of lower or equal
    /// dimension, so the three sets stay meaningful.
    pub(crate) fn smart_delete_cells(&mut self, cells: &CellSet) {
        for kind in [CellType::KeyFace, CellType::KeyEdge, CellType::KeyVertex] {
            let ids: Vec<CellId> = cells
                .iter()
                .copied()
                .filter(|c| self.cell_type(*c) == Some(kind))
                .collect();
            for id in ids {
                self.smart_delete_cell(id);
            }
        }
    }

    pub fn smart_delete(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        let cells = self.selection.clone();
        self.operate("smart delete", |vac| vac.smart_delete_cells(&cells));
        self.emit_edit_done();
    }
}
