// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Summary of a loaded complex.

use std::fmt;

use serde::Serialize;
use vac_lite_complex::{CellType, Operator, Vac};

/// Cell counts, key frames and validation outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub cells: usize,
    pub key_vertices: usize,
    pub key_edges: usize,
    pub key_faces: usize,
    pub inbetween_vertices: usize,
    pub inbetween_edges: usize,
    pub inbetween_faces: usize,
    /// Distinct times of key cells, in increasing order.
    pub key_times: Vec<String>,
    pub next_id: u32,
    pub invalid_cells: Vec<u32>,
    pub valid: bool,
}

impl Stats {
    pub fn of(vac: &Vac) -> Self {
        let mut stats = Stats {
            cells: vac.len(),
            next_id: vac.next_id().raw(),
            ..Default::default()
        };
        let mut times = Vec::new();
        for cell in vac.cells() {
            match cell.cell_type() {
                CellType::KeyVertex => stats.key_vertices += 1,
                CellType::KeyEdge => stats.key_edges += 1,
                CellType::KeyFace => stats.key_faces += 1,
                CellType::InbetweenVertex => stats.inbetween_vertices += 1,
                CellType::InbetweenEdge => stats.inbetween_edges += 1,
                CellType::InbetweenFace => stats.inbetween_faces += 1,
            }
            if let Some(t) = cell.key_time() {
                if !times.contains(&t) {
                    times.push(t);
                }
            }
        }
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        stats.key_times = times.iter().map(|t| t.to_string()).collect();

        let report = Operator::new("inspect").check(vac);
        stats.invalid_cells = report.invalid_cells.iter().map(|c| c.raw()).collect();
        stats.valid = report.is_valid();
        stats
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cells:              {}", self.cells)?;
        writeln!(f, "  key vertices:     {}", self.key_vertices)?;
        writeln!(f, "  key edges:        {}", self.key_edges)?;
        writeln!(f, "  key faces:        {}", self.key_faces)?;
        writeln!(f, "  inbetween verts:  {}", self.inbetween_vertices)?;
        writeln!(f, "  inbetween edges:  {}", self.inbetween_edges)?;
        writeln!(f, "  inbetween faces:  {}", self.inbetween_faces)?;
        writeln!(f, "key times:          {}", self.key_times.join(", "))?;
        writeln!(f, "next id:            {}", self.next_id)?;
        if self.valid {
            write!(f, "valid:              yes")
        } else {
            write!(f, "valid:              no ({} invalid cells)", self.invalid_cells.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use vac_lite_complex::{Time, Vector2};

    use super::*;

    #[test]
    fn counts_cells_by_kind() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(4), Vector2::new(5.0, 0.0));
        let c = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 5.0));
        vac.new_inbetween_vertex(a, b).unwrap();
        vac.new_key_edge(a, c).unwrap();

        let stats = Stats::of(&vac);
        assert_eq!(stats.cells, 5);
        assert_eq!(stats.key_vertices, 3);
        assert_eq!(stats.key_edges, 1);
        assert_eq!(stats.inbetween_vertices, 1);
        assert_eq!(stats.key_times.len(), 2);
        assert!(stats.valid);
        assert!(stats.to_string().contains("valid:              yes"));

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["key_edges"], 1);
    }
}
