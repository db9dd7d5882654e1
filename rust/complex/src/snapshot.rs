// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON snapshots of a complex.
//!
//! Cells are listed bottom to top with their ids. Key cycles and paths use
//! their legacy text form, which keeps the starting point of closed cycles;
//! animated cycles and animated vertices use their id strings.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use vac_lite_geometry::{Curve, EdgeSample, LinearSpline};

use crate::animated_cycle::AnimatedCycle;
use crate::animated_vertex::AnimatedVertex;
use crate::cell::{
    Cell, CellData, InbetweenEdgeData, InbetweenFaceData, InbetweenVertexData, KeyEdgeData,
    KeyFaceData, KeyVertexData,
};
use crate::color::Color;
use crate::cycle::Cycle;
use crate::error::{Error, Result};
use crate::keys::CellId;
use crate::path::Path;
use crate::time::Time;
use crate::vac::Vac;

#[derive(Debug, Serialize, Deserialize)]
pub struct VacSnapshot {
    pub background: [f64; 4],
    pub cells: Vec<CellSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub id: u32,
    pub color: [f64; 4],
    #[serde(flatten)]
    pub data: CellSnapshotData,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellSnapshotData {
    KeyVertex {
        time: Time,
        x: f64,
        y: f64,
        size: f64,
    },
    KeyEdge {
        time: Time,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<u32>,
        ds: f64,
        /// `[x, y, width]` per sample.
        samples: Vec<[f64; 3]>,
    },
    KeyFace {
        time: Time,
        cycles: Vec<String>,
    },
    InbetweenVertex {
        before: u32,
        after: u32,
    },
    OpenInbetweenEdge {
        before_path: String,
        after_path: String,
        start: String,
        end: String,
    },
    ClosedInbetweenEdge {
        before_cycle: String,
        after_cycle: String,
    },
    InbetweenFace {
        cycles: Vec<String>,
        before_faces: Vec<u32>,
        after_faces: Vec<u32>,
    },
}

fn color_array(c: Color) -> [f64; 4] {
    [c.r, c.g, c.b, c.a]
}

fn cell_snapshot(cell: &Cell) -> CellSnapshot {
    let data = match &cell.data {
        CellData::KeyVertex(v) => CellSnapshotData::KeyVertex {
            time: v.time,
            x: v.pos.x,
            y: v.pos.y,
            size: v.size,
        },
        CellData::KeyEdge(e) => CellSnapshotData::KeyEdge {
            time: e.time,
            start: e.start.map(CellId::raw),
            end: e.end.map(CellId::raw),
            ds: e.geometry.ds(),
            samples: e
                .geometry
                .samples()
                .iter()
                .map(|s| [s.x, s.y, s.width])
                .collect(),
        },
        CellData::KeyFace(f) => CellSnapshotData::KeyFace {
            time: f.time,
            cycles: f.cycles.iter().map(|c| c.to_legacy_string()).collect(),
        },
        CellData::InbetweenVertex(v) => CellSnapshotData::InbetweenVertex {
            before: v.before.raw(),
            after: v.after.raw(),
        },
        CellData::InbetweenEdge(InbetweenEdgeData::Open {
            before_path,
            after_path,
            start,
            end,
        }) => CellSnapshotData::OpenInbetweenEdge {
            before_path: before_path.to_legacy_string(),
            after_path: after_path.to_legacy_string(),
            start: start.to_id_string(),
            end: end.to_id_string(),
        },
        CellData::InbetweenEdge(InbetweenEdgeData::Closed {
            before_cycle,
            after_cycle,
        }) => CellSnapshotData::ClosedInbetweenEdge {
            before_cycle: before_cycle.to_legacy_string(),
            after_cycle: after_cycle.to_legacy_string(),
        },
        CellData::InbetweenFace(f) => CellSnapshotData::InbetweenFace {
            cycles: f.cycles.iter().map(|c| c.to_id_string()).collect(),
            before_faces: f.before_faces.iter().map(|c| c.raw()).collect(),
            after_faces: f.after_faces.iter().map(|c| c.raw()).collect(),
        },
    };
    CellSnapshot {
        id: cell.id.raw(),
        color: color_array(cell.color),
        data,
    }
}

fn cell_from_snapshot(s: &CellSnapshot) -> Result<Cell> {
    let data = match &s.data {
        CellSnapshotData::KeyVertex { time, x, y, size } => {
            let mut d = KeyVertexData::new(*time, Vector2::new(*x, *y));
            d.size = *size;
            CellData::KeyVertex(d)
        }
        CellSnapshotData::KeyEdge {
            time,
            start,
            end,
            ds,
            samples,
        } => {
            if start.is_some() != end.is_some() {
                return Err(Error::Serialization(format!(
                    "edge {} has only one end vertex",
                    s.id
                )));
            }
            let samples = samples
                .iter()
                .map(|[x, y, w]| EdgeSample::new(*x, *y, *w))
                .collect();
            CellData::KeyEdge(KeyEdgeData {
                time: *time,
                start: start.map(CellId),
                end: end.map(CellId),
                geometry: LinearSpline::from_curve(Curve::from_vertices(samples, *ds), false),
            })
        }
        CellSnapshotData::KeyFace { time, cycles } => CellData::KeyFace(KeyFaceData {
            time: *time,
            cycles: cycles
                .iter()
                .map(|c| Cycle::from_legacy_string(c))
                .collect::<Result<Vec<_>>>()?,
        }),
        CellSnapshotData::InbetweenVertex { before, after } => {
            CellData::InbetweenVertex(InbetweenVertexData {
                before: CellId(*before),
                after: CellId(*after),
            })
        }
        CellSnapshotData::OpenInbetweenEdge {
            before_path,
            after_path,
            start,
            end,
        } => CellData::InbetweenEdge(InbetweenEdgeData::Open {
            before_path: Path::from_legacy_string(before_path)?,
            after_path: Path::from_legacy_string(after_path)?,
            start: AnimatedVertex::from_id_string(start)?,
            end: AnimatedVertex::from_id_string(end)?,
        }),
        CellSnapshotData::ClosedInbetweenEdge {
            before_cycle,
            after_cycle,
        } => CellData::InbetweenEdge(InbetweenEdgeData::Closed {
            before_cycle: Cycle::from_legacy_string(before_cycle)?,
            after_cycle: Cycle::from_legacy_string(after_cycle)?,
        }),
        CellSnapshotData::InbetweenFace {
            cycles,
            before_faces,
            after_faces,
        } => CellData::InbetweenFace(InbetweenFaceData {
            cycles: cycles
                .iter()
                .map(|c| AnimatedCycle::from_id_string(c))
                .collect::<Result<Vec<_>>>()?,
            before_faces: before_faces.iter().copied().map(CellId).collect(),
            after_faces: after_faces.iter().copied().map(CellId).collect(),
        }),
    };
    let [r, g, b, a] = s.color;
    Ok(Cell::new(CellId(s.id), Color::new(r, g, b, a), data))
}

impl Vac {
    /// Serializable copy of every cell in depth order.
    pub fn to_snapshot(&self) -> VacSnapshot {
        VacSnapshot {
            background: color_array(self.background_color),
            cells: self
                .zordering
                .iter()
                .filter_map(|id| self.cells.get(&id))
                .map(cell_snapshot)
                .collect(),
        }
    }

    /// Replaces the content of the complex with the cells of `snapshot`.
    pub fn load_snapshot(&mut self, snapshot: &VacSnapshot) -> Result<()> {
        let cells = snapshot
            .cells
            .iter()
            .map(cell_from_snapshot)
            .collect::<Result<Vec<_>>>()?;
        let [r, g, b, a] = snapshot.background;
        self.background_color = Color::new(r, g, b, a);
        self.load_cells(cells)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_snapshot())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Vac> {
        let snapshot: VacSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        let mut vac = Vac::new();
        vac.load_snapshot(&snapshot)?;
        Ok(vac)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::keys::{CellSet, CellType};

    #[test]
    fn json_round_trip_keeps_cells() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(0), Vector2::new(30.0, 0.0));
        let e1 = vac.new_key_edge(a, b).unwrap();
        let c = vac.new_key_vertex(Time::frame(8), Vector2::new(0.0, 5.0));
        let d = vac.new_key_vertex(Time::frame(8), Vector2::new(30.0, 5.0));
        let e2 = vac.new_key_edge(c, d).unwrap();
        let ie = vac.inbetween_edges(e1, e2).unwrap();
        vac.set_background_color(Color::new(0.2, 0.2, 0.2, 1.0));

        let json = vac.to_json().unwrap();
        assert!(json.contains("\"type\": \"key_vertex\""));
        assert!(json.contains("\"type\": \"open_inbetween_edge\""));

        let loaded = Vac::from_json(&json).unwrap();
        assert_eq!(loaded.cell_ids(), vac.cell_ids());
        assert_eq!(loaded.zordering().as_slice(), vac.zordering().as_slice());
        assert_eq!(loaded.cell_type(ie), Some(CellType::InbetweenEdge));
        assert_eq!(loaded.after_cells(ie), vac.after_cells(ie));
        assert_relative_eq!(loaded.background_color().r, 0.2);
        assert_relative_eq!(
            loaded.key_vertex(b).unwrap().size(),
            vac.key_vertex(b).unwrap().size()
        );
        assert!(loaded.check());
    }

    #[test]
    fn closed_cycle_offset_survives() {
        let mut vac = Vac::new();
        let ring = |r: f64| {
            let pts: Vec<Vector2<f64>> = (0..16)
                .map(|i| {
                    let t = i as f64 / 16.0 * std::f64::consts::TAU;
                    Vector2::new(r * t.cos(), r * t.sin())
                })
                .collect();
            LinearSpline::from_points(&pts, 2.0)
        };
        let r0 = vac.new_closed_key_edge(Time::frame(0), ring(10.0));
        let r1 = vac.new_closed_key_edge(Time::frame(4), ring(20.0));
        let before = Cycle::from_id_string(&format!("[{}+]", r0)).unwrap();
        let mut after = Cycle::from_id_string(&format!("[{}+]", r1)).unwrap();
        after.set_starting_point(0.5);
        let ie = vac.new_closed_inbetween_edge(before, after).unwrap();
        let face = vac
            .new_key_face_with_cycle(Cycle::from_id_string(&format!("[{}+]", r0)).unwrap())
            .unwrap();

        let loaded = Vac::from_json(&vac.to_json().unwrap()).unwrap();
        let edge = loaded.inbetween_edge(ie).unwrap();
        assert_relative_eq!(edge.after_cycle().unwrap().s0(), 0.5);
        assert!(loaded.spatial_star(r0).contains(&face));
        assert!(loaded.key_edge(r1).unwrap().geometry().is_closed());
        assert!(loaded.check());
    }

    #[test]
    fn missing_cell_is_reported() {
        let json = r#"{
            "background": [1, 1, 1, 1],
            "cells": [
                {"id": 3, "color": [0, 0, 0, 1], "type": "inbetween_vertex", "before": 1, "after": 2}
            ]
        }"#;
        assert!(matches!(Vac::from_json(json), Err(Error::CellNotFound(_))));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        assert!(matches!(
            Vac::from_json("{\"cells\": 3}"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn empty_complex_round_trips() {
        let vac = Vac::new();
        let loaded = Vac::from_json(&vac.to_json().unwrap()).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.cell_ids(), CellSet::new());
    }
}
