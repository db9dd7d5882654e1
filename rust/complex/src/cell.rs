// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cell storage.
//!
//! Every cell of a complex is a [`Cell`]: shared bookkeeping (id, color,
//! selection flags, star sets, cached geometry) plus a [`CellData`] payload
//! selected by the cell type. Boundary references are plain [`CellId`]s
//! resolved through the owning [`crate::Vac`]; stars are maintained
//! incrementally by the complex.

use std::cell::RefCell;

use nalgebra::Vector2;
use rustc_hash::FxHashMap;
use vac_lite_geometry::{BoundingBox, LinearSpline, Triangles};

use crate::animated_cycle::AnimatedCycle;
use crate::animated_vertex::AnimatedVertex;
use crate::color::Color;
use crate::cycle::Cycle;
use crate::keys::{CellId, CellSet, CellType, SpatialKind, TemporalKind};
use crate::path::Path;
use crate::time::Time;

/// Ratio between a key vertex size and the edge width it was created with.
pub const VERTEX_SIZE_RATIO: f64 = 1.7;

#[derive(Debug, Clone)]
pub struct KeyVertexData {
    pub(crate) time: Time,
    pub(crate) pos: Vector2<f64>,
    pub(crate) size: f64,
    pub(crate) pos_back: Vector2<f64>,
}

impl KeyVertexData {
    pub fn new(time: Time, pos: Vector2<f64>) -> Self {
        Self {
            time,
            pos,
            size: 0.0,
            pos_back: pos,
        }
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn pos(&self) -> Vector2<f64> {
        self.pos
    }

    pub fn size(&self) -> f64 {
        self.size
    }
}

#[derive(Debug, Clone)]
pub struct KeyEdgeData {
    pub(crate) time: Time,
    pub(crate) start: Option<CellId>,
    pub(crate) end: Option<CellId>,
    pub(crate) geometry: LinearSpline,
}

impl KeyEdgeData {
    pub fn time(&self) -> Time {
        self.time
    }

    pub fn start_vertex(&self) -> Option<CellId> {
        self.start
    }

    pub fn end_vertex(&self) -> Option<CellId> {
        self.end
    }

    /// A closed edge has no end vertices.
    pub fn is_closed(&self) -> bool {
        self.start.is_none()
    }

    /// An open edge starting and ending at the same vertex.
    pub fn is_split_loop(&self) -> bool {
        self.start.is_some() && self.start == self.end
    }

    pub fn geometry(&self) -> &LinearSpline {
        &self.geometry
    }

    pub fn width(&self) -> f64 {
        let samples = self.geometry.samples();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().map(|s| s.width).sum::<f64>() / samples.len() as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyFaceData {
    pub(crate) time: Time,
    pub(crate) cycles: Vec<Cycle>,
}

impl KeyFaceData {
    pub fn time(&self) -> Time {
        self.time
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InbetweenVertexData {
    pub(crate) before: CellId,
    pub(crate) after: CellId,
}

impl InbetweenVertexData {
    pub fn before_vertex(&self) -> CellId {
        self.before
    }

    pub fn after_vertex(&self) -> CellId {
        self.after
    }
}

/// An inbetween edge is open (bounded by two animated vertices, with key
/// paths at both ends) or closed (key cycles at both ends).
#[derive(Debug, Clone)]
pub enum InbetweenEdgeData {
    Open {
        before_path: Path,
        after_path: Path,
        start: AnimatedVertex,
        end: AnimatedVertex,
    },
    Closed {
        before_cycle: Cycle,
        after_cycle: Cycle,
    },
}

impl InbetweenEdgeData {
    pub fn is_closed(&self) -> bool {
        matches!(self, InbetweenEdgeData::Closed { .. })
    }

    pub fn before_path(&self) -> Option<&Path> {
        match self {
            InbetweenEdgeData::Open { before_path, .. } => Some(before_path),
            InbetweenEdgeData::Closed { .. } => None,
        }
    }

    pub fn after_path(&self) -> Option<&Path> {
        match self {
            InbetweenEdgeData::Open { after_path, .. } => Some(after_path),
            InbetweenEdgeData::Closed { .. } => None,
        }
    }

    pub fn start_animated_vertex(&self) -> Option<&AnimatedVertex> {
        match self {
            InbetweenEdgeData::Open { start, .. } => Some(start),
            InbetweenEdgeData::Closed { .. } => None,
        }
    }

    pub fn end_animated_vertex(&self) -> Option<&AnimatedVertex> {
        match self {
            InbetweenEdgeData::Open { end, .. } => Some(end),
            InbetweenEdgeData::Closed { .. } => None,
        }
    }

    pub fn before_cycle(&self) -> Option<&Cycle> {
        match self {
            InbetweenEdgeData::Closed { before_cycle, .. } => Some(before_cycle),
            InbetweenEdgeData::Open { .. } => None,
        }
    }

    pub fn after_cycle(&self) -> Option<&Cycle> {
        match self {
            InbetweenEdgeData::Closed { after_cycle, .. } => Some(after_cycle),
            InbetweenEdgeData::Open { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InbetweenFaceData {
    pub(crate) cycles: Vec<AnimatedCycle>,
    pub(crate) before_faces: CellSet,
    pub(crate) after_faces: CellSet,
}

impl InbetweenFaceData {
    pub fn cycles(&self) -> &[AnimatedCycle] {
        &self.cycles
    }

    pub fn before_faces(&self) -> &CellSet {
        &self.before_faces
    }

    pub fn after_faces(&self) -> &CellSet {
        &self.after_faces
    }
}

/// Type-specific payload of a cell.
#[derive(Debug, Clone)]
pub enum CellData {
    KeyVertex(KeyVertexData),
    KeyEdge(KeyEdgeData),
    KeyFace(KeyFaceData),
    InbetweenVertex(InbetweenVertexData),
    InbetweenEdge(InbetweenEdgeData),
    InbetweenFace(InbetweenFaceData),
}

impl CellData {
    pub fn cell_type(&self) -> CellType {
        match self {
            CellData::KeyVertex(_) => CellType::KeyVertex,
            CellData::KeyEdge(_) => CellType::KeyEdge,
            CellData::KeyFace(_) => CellType::KeyFace,
            CellData::InbetweenVertex(_) => CellType::InbetweenVertex,
            CellData::InbetweenEdge(_) => CellType::InbetweenEdge,
            CellData::InbetweenFace(_) => CellType::InbetweenFace,
        }
    }

    /// Time of a key cell.
    pub fn key_time(&self) -> Option<Time> {
        match self {
            CellData::KeyVertex(d) => Some(d.time),
            CellData::KeyEdge(d) => Some(d.time),
            CellData::KeyFace(d) => Some(d.time),
            _ => None,
        }
    }
}

/// Per-time caches, dropped whenever geometry or boundary changes.
#[derive(Debug, Clone, Default)]
pub struct CellCache {
    pub(crate) triangles: FxHashMap<(u8, i64), Triangles>,
    pub(crate) outline_bboxes: FxHashMap<(u8, i64), BoundingBox>,
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub(crate) id: CellId,
    pub(crate) color: Color,
    pub(crate) selected: bool,
    pub(crate) hovered: bool,
    pub(crate) spatial_star: CellSet,
    pub(crate) temporal_star_before: CellSet,
    pub(crate) temporal_star_after: CellSet,
    pub(crate) data: CellData,
    pub(crate) cache: RefCell<CellCache>,
}

impl Cell {
    pub(crate) fn new(id: CellId, color: Color, data: CellData) -> Self {
        Self {
            id,
            color,
            selected: false,
            hovered: false,
            spatial_star: CellSet::new(),
            temporal_star_before: CellSet::new(),
            temporal_star_after: CellSet::new(),
            data,
            cache: RefCell::new(CellCache::default()),
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn cell_type(&self) -> CellType {
        self.data.cell_type()
    }

    pub fn temporal_kind(&self) -> TemporalKind {
        self.cell_type().temporal()
    }

    pub fn spatial_kind(&self) -> SpatialKind {
        self.cell_type().spatial()
    }

    pub fn dimension(&self) -> u8 {
        self.cell_type().dimension()
    }

    pub fn is_key(&self) -> bool {
        self.temporal_kind() == TemporalKind::Key
    }

    pub fn data(&self) -> &CellData {
        &self.data
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    pub fn spatial_star(&self) -> &CellSet {
        &self.spatial_star
    }

    pub fn temporal_star_before(&self) -> &CellSet {
        &self.temporal_star_before
    }

    pub fn temporal_star_after(&self) -> &CellSet {
        &self.temporal_star_after
    }

    pub fn temporal_star(&self) -> CellSet {
        self.temporal_star_before
            .union(&self.temporal_star_after)
            .copied()
            .collect()
    }

    pub fn star(&self) -> CellSet {
        let mut res = self.spatial_star.clone();
        res.extend(self.temporal_star_before.iter().copied());
        res.extend(self.temporal_star_after.iter().copied());
        res
    }

    pub fn key_time(&self) -> Option<Time> {
        self.data.key_time()
    }

    pub fn as_key_vertex(&self) -> Option<&KeyVertexData> {
        match &self.data {
            CellData::KeyVertex(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_key_edge(&self) -> Option<&KeyEdgeData> {
        match &self.data {
            CellData::KeyEdge(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_key_face(&self) -> Option<&KeyFaceData> {
        match &self.data {
            CellData::KeyFace(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_inbetween_vertex(&self) -> Option<&InbetweenVertexData> {
        match &self.data {
            CellData::InbetweenVertex(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_inbetween_edge(&self) -> Option<&InbetweenEdgeData> {
        match &self.data {
            CellData::InbetweenEdge(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_inbetween_face(&self) -> Option<&InbetweenFaceData> {
        match &self.data {
            CellData::InbetweenFace(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn clear_cache(&self) {
        let mut cache = self.cache.borrow_mut();
        cache.triangles.clear();
        cache.outline_bboxes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_and_split_loop_edges() {
        let closed = KeyEdgeData {
            time: Time::frame(0),
            start: None,
            end: None,
            geometry: LinearSpline::new(1.0),
        };
        assert!(closed.is_closed());
        assert!(!closed.is_split_loop());
        let split = KeyEdgeData {
            start: Some(CellId(1)),
            end: Some(CellId(1)),
            ..closed
        };
        assert!(!split.is_closed());
        assert!(split.is_split_loop());
    }

    #[test]
    fn star_is_union() {
        let mut c = Cell::new(
            CellId(1),
            Color::BLACK,
            CellData::KeyVertex(KeyVertexData::new(Time::frame(0), Vector2::zeros())),
        );
        c.spatial_star.insert(CellId(2));
        c.temporal_star_after.insert(CellId(3));
        assert_eq!(c.star(), [CellId(2), CellId(3)].into_iter().collect());
        assert_eq!(c.cell_type(), CellType::KeyVertex);
        assert_eq!(c.key_time(), Some(Time::frame(0)));
    }
}
