// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Commands acting on the current selection: style and depth order.

use crate::color::Color;
use crate::keys::{CellId, CellSet, CellType};
use crate::notify::Notification;
use crate::vac::Vac;
use crate::zordering::ZOrdering;

impl Vac {
    /// Sets the color of every selected cell.
    pub fn change_color(&mut self, color: Color) {
        if self.selection.is_empty() {
            return;
        }
        for id in self.selection.clone() {
            self.set_color(id, color);
        }
        self.emit(Notification::Changed);
        self.emit(Notification::Checkpoint);
    }

    /// Sets the width of every sample of the selected key edges.
    pub fn change_edge_width(&mut self, width: f64) {
        let edges = self.selected_of_type(CellType::KeyEdge);
        if edges.is_empty() {
            return;
        }
        for e in &edges {
            if let Some(d) = self.key_edge_mut(*e) {
                d.geometry.set_width(width);
            }
        }
        let star: CellSet = edges.iter().flat_map(|e| self.star(*e)).chain(edges.iter().copied()).collect();
        self.invalidate_geometry(&star);
        self.emit_edit_done();
    }

    fn overlaps_any(&self, cells: &CellSet, c: CellId) -> bool {
        cells.iter().any(|s| self.overlaps(*s, c))
    }

    /// Runs `f` on the depth order while `f` may still read the complex.
    fn with_zordering(&mut self, f: impl FnOnce(&Vac, &mut ZOrdering)) {
        let mut z = std::mem::take(&mut self.zordering);
        f(self, &mut z);
        self.zordering = z;
    }

    fn reorder(&mut self, name: &'static str, f: impl FnOnce(&Vac, &CellSet, &mut ZOrdering)) {
        if self.selection.is_empty() {
            return;
        }
        let selection = self.selection.clone();
        self.with_zordering(|vac, z| f(vac, &selection, z));
        tracing::debug!(command = name, cells = selection.len(), "depth order changed");
        self.emit_edit_done();
    }

    /// Moves the selection and its boundary just above the first cell they
    /// overlap.
    pub fn raise(&mut self) {
        self.reorder("raise", |vac, sel, z| {
            let closure = vac.closure(sel);
            z.raise(sel, &closure, |c| vac.overlaps_any(&closure, c), |c| vac.boundary(c));
        });
    }

    pub fn lower(&mut self) {
        self.reorder("lower", |vac, sel, z| {
            let fullstar = vac.fullstar(sel);
            z.lower(sel, &fullstar, |c| vac.overlaps_any(&fullstar, c), |c| vac.star(c));
        });
    }

    pub fn raise_to_top(&mut self) {
        self.reorder("raise to top", |vac, sel, z| z.raise_to_top(&vac.closure(sel)));
    }

    pub fn lower_to_bottom(&mut self) {
        self.reorder("lower to bottom", |vac, sel, z| z.lower_to_bottom(&vac.fullstar(sel)));
    }

    /// Like [`Vac::raise`], but moves exactly the selected cells.
    pub fn alt_raise(&mut self) {
        self.reorder("alt raise", |vac, sel, z| z.alt_raise(sel, |c| vac.overlaps_any(sel, c)));
    }

    pub fn alt_lower(&mut self) {
        self.reorder("alt lower", |vac, sel, z| z.alt_lower(sel, |c| vac.overlaps_any(sel, c)));
    }

    pub fn alt_raise_to_top(&mut self) {
        self.reorder("alt raise to top", |_, sel, z| z.alt_raise_to_top(sel));
    }

    pub fn alt_lower_to_bottom(&mut self) {
        self.reorder("alt lower to bottom", |_, sel, z| z.alt_lower_to_bottom(sel));
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector2;

    use super::*;
    use crate::time::Time;

    #[test]
    fn width_applies_to_selected_edges() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(50.0, 0.0));
        let e = vac.new_key_edge(a, b).unwrap();
        vac.select(e);
        vac.select(a);
        vac.change_edge_width(7.5);
        approx::assert_relative_eq!(vac.key_edge(e).unwrap().width(), 7.5);
    }

    #[test]
    fn color_applies_to_selection() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(0), Vector2::new(5.0, 0.0));
        let red = Color::new(1.0, 0.0, 0.0, 1.0);
        vac.select(a);
        vac.change_color(red);
        assert_eq!(vac.cell(a).unwrap().color(), red);
        assert_ne!(vac.cell(b).unwrap().color(), red);
    }

    #[test]
    fn raise_to_top_moves_closure() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(50.0, 0.0));
        let e = vac.new_key_edge(a, b).unwrap();
        let c = vac.new_key_vertex(t, Vector2::new(25.0, 0.0));
        assert_eq!(vac.zordering().as_slice(), &[e, a, b, c]);
        vac.select(e);
        vac.raise_to_top();
        assert_eq!(vac.zordering().as_slice(), &[c, e, a, b]);

        vac.alt_lower_to_bottom();
        assert_eq!(vac.zordering().as_slice(), &[e, c, a, b]);
    }

    #[test]
    fn reordering_needs_a_selection() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        vac.raise();
        vac.lower_to_bottom();
        assert_eq!(vac.zordering().as_slice(), &[a, b]);
    }
}
