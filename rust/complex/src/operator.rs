// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Post-condition checks around topological operations.
//!
//! An [`Operator`] runs a mutation on a [`Vac`]. Unless it is trusted, the
//! complex is validated afterwards and every invalid cell is reported. The
//! complex is never rolled back: a failed check only produces log events
//! and an [`OperatorReport`] for the caller to act on.

use crate::keys::CellId;
use crate::vac::Vac;

/// Outcome of the validation following an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorReport {
    /// Whether validation ran at all.
    pub checked: bool,
    pub invalid_cells: Vec<CellId>,
    /// Aggregate sets (z-ordering, selection) out of sync.
    pub invalid_complex: bool,
}

impl OperatorReport {
    pub fn is_valid(&self) -> bool {
        self.invalid_cells.is_empty() && !self.invalid_complex
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Operator {
    name: &'static str,
    trusted: bool,
}

impl Operator {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            trusted: false,
        }
    }

    /// Skips validation.
    pub fn trusted(mut self) -> Self {
        self.trusted = true;
        self
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    /// Runs `f` on `vac`, then validates unless trusted.
    pub fn run<R>(&self, vac: &mut Vac, f: impl FnOnce(&mut Vac) -> R) -> (R, OperatorReport) {
        let res = f(vac);
        if self.trusted {
            return (res, OperatorReport::default());
        }
        (res, self.check(vac))
    }

    pub fn check(&self, vac: &Vac) -> OperatorReport {
        let mut report = OperatorReport {
            checked: true,
            ..Default::default()
        };
        for id in vac.cells.keys() {
            if !vac.check_cell(*id) {
                tracing::debug!(operator = self.name, cell = %id, "cell invalid after operation");
                report.invalid_cells.push(*id);
            }
        }
        report.invalid_complex = !vac.check();
        if !report.is_valid() {
            tracing::warn!(
                operator = self.name,
                invalid_cells = report.invalid_cells.len(),
                "complex invalid after operation"
            );
        }
        report
    }
}

impl Vac {
    /// Runs `f` through an untrusted [`Operator`] named `name`.
    pub(crate) fn operate<R>(&mut self, name: &'static str, f: impl FnOnce(&mut Vac) -> R) -> R {
        Operator::new(name).run(self, f).0
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector2;

    use super::*;
    use crate::time::Time;

    #[test]
    fn reports_invalid_cells_without_rollback() {
        let mut vac = Vac::new();
        let t = Time::frame(0);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(1.0, 0.0));
        let (e, report) = Operator::new("edge").run(&mut vac, |vac| vac.new_key_edge(a, b).unwrap());
        assert!(report.checked && report.is_valid());

        let (_, report) = Operator::new("break").run(&mut vac, |vac| {
            vac.cell_mut(b).unwrap().spatial_star.clear();
        });
        assert!(!report.is_valid());
        assert_eq!(report.invalid_cells, vec![e]);
        assert!(vac.contains(e));

        let (_, report) = Operator::new("noop").trusted().run(&mut vac, |_| ());
        assert!(!report.checked);
    }
}
