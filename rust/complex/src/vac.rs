// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The vector animation complex.
//!
//! [`Vac`] owns every cell in a flat id-keyed table. Cells refer to each
//! other by [`CellId`] only; stars are kept in sync with boundaries by the
//! factories, [`Vac::delete_cell`] and the boundary update helpers.
//!
//! The implementation is split over several modules, each adding an
//! `impl Vac` block: boundary and star navigation (`boundary`), geometry
//! (`geometry`), deletion (`delete`), selection (`selection`), the
//! topological operators (`cut`, `uncut`, `glue`, `keyframe`, `inbetween`,
//! `face`, `sketch`), interaction state machines (`interaction`),
//! subcomplex copies (`clipboard`), validation (`operator`) and
//! serialization (`document`, `legacy`, `snapshot`).
//!
//! # Example
//!
//! ```
//! use vac_lite_complex::{Time, Vac};
//! use nalgebra::Vector2;
//!
//! let mut vac = Vac::new();
//! let t = Time::frame(0);
//! let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
//! let b = vac.new_key_vertex(t, Vector2::new(100.0, 0.0));
//! let e = vac.new_key_edge(a, b).unwrap();
//! assert!(vac.spatial_star(a).contains(&e));
//! assert!(vac.check());
//! ```

use std::collections::BTreeMap;

use nalgebra::Vector2;
use vac_lite_geometry::LinearSpline;

use crate::animated_cycle::AnimatedCycle;
use crate::animated_vertex::AnimatedVertex;
use crate::cell::{
    Cell, CellData, InbetweenEdgeData, InbetweenFaceData, InbetweenVertexData, KeyEdgeData,
    KeyFaceData, KeyVertexData, VERTEX_SIZE_RATIO,
};
use crate::color::Color;
use crate::cycle::Cycle;
use crate::error::{Error, Result};
use crate::interaction::InteractionState;
use crate::keys::{CellId, CellSet, CellType, SpatialKind, TemporalKind};
use crate::notify::{Notification, Observers, VacObserver};
use crate::path::Path;
use crate::settings::Settings;
use crate::time::Time;
use crate::zordering::ZOrdering;

#[derive(Debug)]
pub struct Vac {
    pub(crate) cells: BTreeMap<CellId, Cell>,
    /// Next id to assign. Only grows.
    pub(crate) next_id: u32,
    pub(crate) zordering: ZOrdering,
    pub(crate) selection: CellSet,
    pub(crate) hovered: Option<CellId>,
    pub(crate) settings: Settings,
    pub(crate) background_color: Color,
    pub(crate) observers: Observers,
    pub(crate) aggregate_depth: u32,
    pub(crate) pending_selection_changed: bool,
    pub(crate) interaction: InteractionState,
}

impl Default for Vac {
    fn default() -> Self {
        Self::new()
    }
}

impl Vac {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            cells: BTreeMap::new(),
            next_id: 0,
            zordering: ZOrdering::new(),
            selection: CellSet::new(),
            hovered: None,
            settings,
            background_color: Color::new(1.0, 1.0, 1.0, 1.0),
            observers: Observers::default(),
            aggregate_depth: 0,
            pending_selection_changed: false,
            interaction: InteractionState::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn background_color(&self) -> Color {
        self.background_color
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.background_color = color;
        self.emit(Notification::Changed);
    }

    // --------------------------------------------------------------------
    // Notifications
    // --------------------------------------------------------------------

    pub fn add_observer(&mut self, observer: impl VacObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    pub(crate) fn emit(&mut self, notification: Notification) {
        if notification == Notification::SelectionChanged && self.aggregate_depth > 0 {
            self.pending_selection_changed = true;
            return;
        }
        self.observers.emit(notification);
    }

    /// Coalesces selection notifications until the matching
    /// [`Vac::end_aggregate_signals`].
    pub(crate) fn begin_aggregate_signals(&mut self) {
        if self.aggregate_depth == 0 {
            self.pending_selection_changed = false;
        }
        self.aggregate_depth += 1;
    }

    pub(crate) fn end_aggregate_signals(&mut self) {
        self.aggregate_depth = self.aggregate_depth.saturating_sub(1);
        if self.aggregate_depth == 0 && self.pending_selection_changed {
            self.pending_selection_changed = false;
            self.observers.emit(Notification::SelectionChanged);
        }
    }

    /// Emits the notifications of a completed user-meaningful edit.
    pub(crate) fn emit_edit_done(&mut self) {
        self.emit(Notification::NeedUpdatePicking);
        self.emit(Notification::Changed);
        self.emit(Notification::Checkpoint);
    }

    // --------------------------------------------------------------------
    // Ids and insertion
    // --------------------------------------------------------------------

    /// Id the next created cell will receive.
    pub fn next_id(&self) -> CellId {
        CellId(self.next_id)
    }

    pub(crate) fn allocate_id(&mut self) -> CellId {
        let id = CellId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Inserts a new cell, registers it in the stars of its boundary and
    /// places it just below its lowest boundary cell.
    pub(crate) fn insert_cell(&mut self, data: CellData, color: Color) -> CellId {
        let id = self.allocate_id();
        self.cells.insert(id, Cell::new(id, color, data));
        self.add_to_star_of_boundary(id);
        let boundary = self.boundary(id);
        self.zordering.insert_cell(id, &boundary);
        id
    }

    // --------------------------------------------------------------------
    // Factories
    // --------------------------------------------------------------------

    pub fn new_key_vertex(&mut self, time: Time, pos: Vector2<f64>) -> CellId {
        let mut data = KeyVertexData::new(time, pos);
        data.size = self.settings.edge_width * VERTEX_SIZE_RATIO;
        let color = self.settings.vertex_color;
        self.insert_cell(CellData::KeyVertex(data), color)
    }

    /// Straight edge between two key vertices of the same time.
    pub fn new_key_edge(&mut self, start: CellId, end: CellId) -> Result<CellId> {
        let p1 = self.get_key_vertex(start)?.pos();
        let p2 = self.get_key_vertex(end)?.pos();
        let geometry = LinearSpline::straight(p1, p2, self.settings.edge_width, self.settings.ds);
        self.new_key_edge_with_geometry(start, end, geometry)
    }

    pub fn new_key_edge_with_geometry(
        &mut self,
        start: CellId,
        end: CellId,
        geometry: LinearSpline,
    ) -> Result<CellId> {
        let t1 = self.get_key_vertex(start)?.time();
        let t2 = self.get_key_vertex(end)?.time();
        if t1 != t2 {
            return Err(Error::TimeMismatch(format!(
                "edge end vertices {} and {} live at {} and {}",
                start, end, t1, t2
            )));
        }
        let data = KeyEdgeData {
            time: t1,
            start: Some(start),
            end: Some(end),
            geometry,
        };
        let color = self.settings.edge_color;
        Ok(self.insert_cell(CellData::KeyEdge(data), color))
    }

    /// Closed edge without end vertices.
    pub fn new_closed_key_edge(&mut self, time: Time, mut geometry: LinearSpline) -> CellId {
        if !geometry.is_closed() {
            geometry.make_loop();
        }
        let data = KeyEdgeData {
            time,
            start: None,
            end: None,
            geometry,
        };
        let color = self.settings.edge_color;
        self.insert_cell(CellData::KeyEdge(data), color)
    }

    /// Inbetween vertex from `before` to `after`, which must be key vertices
    /// with `before` strictly earlier.
    pub fn new_inbetween_vertex(&mut self, before: CellId, after: CellId) -> Result<CellId> {
        let t1 = self.get_key_vertex(before)?.time();
        let t2 = self.get_key_vertex(after)?.time();
        if !(t1 < t2) {
            return Err(Error::TimeMismatch(format!(
                "inbetween vertex from {} at {} to {} at {}",
                before, t1, after, t2
            )));
        }
        Ok(self.insert_cell(
            CellData::InbetweenVertex(InbetweenVertexData { before, after }),
            Color::BLACK,
        ))
    }

    /// Open inbetween edge sweeping `before_path` into `after_path`, its
    /// end points following `start` and `end`.
    pub fn new_inbetween_edge(
        &mut self,
        before_path: Path,
        after_path: Path,
        start: AnimatedVertex,
        end: AnimatedVertex,
    ) -> Result<CellId> {
        if !before_path.is_valid() || !after_path.is_valid() {
            return Err(Error::InvalidPath("inbetween edge with invalid path".into()));
        }
        let t1 = before_path.time(self);
        let t2 = after_path.time(self);
        if !(t1 < t2) {
            return Err(Error::TimeMismatch(format!(
                "inbetween edge from {} to {}",
                t1, t2
            )));
        }
        if !start.is_valid() || !end.is_valid() || !start.is_chained(self) || !end.is_chained(self) {
            return Err(Error::InvalidPath("inbetween edge with invalid animated vertex".into()));
        }
        if start.before_vertex(self) != before_path.start_vertex(self)
            || start.after_vertex(self) != after_path.start_vertex(self)
            || end.before_vertex(self) != before_path.end_vertex(self)
            || end.after_vertex(self) != after_path.end_vertex(self)
        {
            return Err(Error::InvalidPath(
                "animated vertices do not match path end vertices".into(),
            ));
        }
        let color = self.settings.edge_color;
        Ok(self.insert_cell(
            CellData::InbetweenEdge(InbetweenEdgeData::Open {
                before_path,
                after_path,
                start,
                end,
            }),
            color,
        ))
    }

    /// Closed inbetween edge sweeping `before_cycle` into `after_cycle`.
    pub fn new_closed_inbetween_edge(&mut self, before_cycle: Cycle, after_cycle: Cycle) -> Result<CellId> {
        if !before_cycle.is_valid() || !after_cycle.is_valid() {
            return Err(Error::InvalidCycle("closed inbetween edge with invalid cycle".into()));
        }
        let t1 = before_cycle.time(self);
        let t2 = after_cycle.time(self);
        if !(t1 < t2) {
            return Err(Error::TimeMismatch(format!(
                "closed inbetween edge from {} to {}",
                t1, t2
            )));
        }
        let color = self.settings.edge_color;
        Ok(self.insert_cell(
            CellData::InbetweenEdge(InbetweenEdgeData::Closed {
                before_cycle,
                after_cycle,
            }),
            color,
        ))
    }

    /// Key face without cycles. Cycles are added later with
    /// [`Vac::add_cycles_to_face`].
    pub fn new_key_face(&mut self, time: Time) -> CellId {
        let color = self.settings.face_color;
        self.insert_cell(
            CellData::KeyFace(KeyFaceData {
                time,
                cycles: Vec::new(),
            }),
            color,
        )
    }

    pub fn new_key_face_with_cycle(&mut self, cycle: Cycle) -> Result<CellId> {
        self.new_key_face_with_cycles(vec![cycle])
    }

    /// Key face bounded by `cycles`, which must be valid and share one time.
    pub fn new_key_face_with_cycles(&mut self, cycles: Vec<Cycle>) -> Result<CellId> {
        let Some(first) = cycles.first() else {
            return Err(Error::InvalidCycle("face without cycle".into()));
        };
        let time = first.time(self);
        for c in &cycles {
            if !c.is_valid() {
                return Err(Error::InvalidCycle(format!("invalid face cycle {}", c)));
            }
            if c.time(self) != time {
                return Err(Error::TimeMismatch(format!("face cycle {} not at {}", c, time)));
            }
        }
        let color = self.settings.face_color;
        Ok(self.insert_cell(CellData::KeyFace(KeyFaceData { time, cycles }), color))
    }

    pub fn new_inbetween_face(
        &mut self,
        cycles: Vec<AnimatedCycle>,
        before_faces: CellSet,
        after_faces: CellSet,
    ) -> Result<CellId> {
        for f in before_faces.iter().chain(after_faces.iter()) {
            self.get_key_face(*f)?;
        }
        let color = self.settings.face_color;
        Ok(self.insert_cell(
            CellData::InbetweenFace(InbetweenFaceData {
                cycles,
                before_faces,
                after_faces,
            }),
            color,
        ))
    }

    // --------------------------------------------------------------------
    // Lookups
    // --------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.cells.contains_key(&id)
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(&id)
    }

    pub fn get_cell(&self, id: CellId) -> Result<&Cell> {
        self.cells.get(&id).ok_or(Error::CellNotFound(id))
    }

    pub(crate) fn cell_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.cells.get_mut(&id)
    }

    pub fn cell_type(&self, id: CellId) -> Option<CellType> {
        self.cells.get(&id).map(|c| c.cell_type())
    }

    /// All cells, in id order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.values()
    }

    pub fn cell_ids(&self) -> CellSet {
        self.cells.keys().copied().collect()
    }

    pub fn key_vertex(&self, id: CellId) -> Option<&KeyVertexData> {
        self.cells.get(&id).and_then(|c| c.as_key_vertex())
    }

    pub fn key_edge(&self, id: CellId) -> Option<&KeyEdgeData> {
        self.cells.get(&id).and_then(|c| c.as_key_edge())
    }

    pub fn key_face(&self, id: CellId) -> Option<&KeyFaceData> {
        self.cells.get(&id).and_then(|c| c.as_key_face())
    }

    pub fn inbetween_vertex(&self, id: CellId) -> Option<&InbetweenVertexData> {
        self.cells.get(&id).and_then(|c| c.as_inbetween_vertex())
    }

    pub fn inbetween_edge(&self, id: CellId) -> Option<&InbetweenEdgeData> {
        self.cells.get(&id).and_then(|c| c.as_inbetween_edge())
    }

    pub fn inbetween_face(&self, id: CellId) -> Option<&InbetweenFaceData> {
        self.cells.get(&id).and_then(|c| c.as_inbetween_face())
    }

    fn typed<'a, T>(
        &'a self,
        id: CellId,
        expected: CellType,
        f: impl Fn(&'a Cell) -> Option<&'a T>,
    ) -> Result<&'a T> {
        let cell = self.get_cell(id)?;
        f(cell).ok_or(Error::WrongCellType { id, expected })
    }

    pub fn get_key_vertex(&self, id: CellId) -> Result<&KeyVertexData> {
        self.typed(id, CellType::KeyVertex, |c| c.as_key_vertex())
    }

    pub fn get_key_edge(&self, id: CellId) -> Result<&KeyEdgeData> {
        self.typed(id, CellType::KeyEdge, |c| c.as_key_edge())
    }

    pub fn get_key_face(&self, id: CellId) -> Result<&KeyFaceData> {
        self.typed(id, CellType::KeyFace, |c| c.as_key_face())
    }

    pub fn get_inbetween_vertex(&self, id: CellId) -> Result<&InbetweenVertexData> {
        self.typed(id, CellType::InbetweenVertex, |c| c.as_inbetween_vertex())
    }

    pub fn get_inbetween_edge(&self, id: CellId) -> Result<&InbetweenEdgeData> {
        self.typed(id, CellType::InbetweenEdge, |c| c.as_inbetween_edge())
    }

    pub fn get_inbetween_face(&self, id: CellId) -> Result<&InbetweenFaceData> {
        self.typed(id, CellType::InbetweenFace, |c| c.as_inbetween_face())
    }

    pub(crate) fn key_vertex_mut(&mut self, id: CellId) -> Option<&mut KeyVertexData> {
        match self.cells.get_mut(&id).map(|c| &mut c.data) {
            Some(CellData::KeyVertex(d)) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn key_edge_mut(&mut self, id: CellId) -> Option<&mut KeyEdgeData> {
        match self.cells.get_mut(&id).map(|c| &mut c.data) {
            Some(CellData::KeyEdge(d)) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn key_face_mut(&mut self, id: CellId) -> Option<&mut KeyFaceData> {
        match self.cells.get_mut(&id).map(|c| &mut c.data) {
            Some(CellData::KeyFace(d)) => Some(d),
            _ => None,
        }
    }

    // --------------------------------------------------------------------
    // Cell sets
    // --------------------------------------------------------------------

    fn ids_where(&self, f: impl Fn(&Cell) -> bool) -> CellSet {
        self.cells.values().filter(|c| f(c)).map(|c| c.id).collect()
    }

    pub fn vertices(&self) -> CellSet {
        self.ids_where(|c| c.spatial_kind() == SpatialKind::Vertex)
    }

    pub fn edges(&self) -> CellSet {
        self.ids_where(|c| c.spatial_kind() == SpatialKind::Edge)
    }

    pub fn faces(&self) -> CellSet {
        self.ids_where(|c| c.spatial_kind() == SpatialKind::Face)
    }

    pub fn key_cells(&self) -> CellSet {
        self.ids_where(|c| c.temporal_kind() == TemporalKind::Key)
    }

    pub fn inbetween_cells(&self) -> CellSet {
        self.ids_where(|c| c.temporal_kind() == TemporalKind::Inbetween)
    }

    /// Cells of any type existing at `t`.
    pub fn cells_at(&self, t: Time) -> CellSet {
        self.cells.keys().copied().filter(|c| self.exists(*c, t)).collect()
    }

    pub fn vertices_at(&self, t: Time) -> CellSet {
        self.vertices().into_iter().filter(|c| self.exists(*c, t)).collect()
    }

    pub fn edges_at(&self, t: Time) -> CellSet {
        self.edges().into_iter().filter(|c| self.exists(*c, t)).collect()
    }

    pub fn faces_at(&self, t: Time) -> CellSet {
        self.faces().into_iter().filter(|c| self.exists(*c, t)).collect()
    }

    pub fn key_vertices(&self, t: Time) -> CellSet {
        self.ids_where(|c| c.as_key_vertex().map_or(false, |d| d.time == t))
    }

    pub fn key_edges(&self, t: Time) -> CellSet {
        self.ids_where(|c| c.as_key_edge().map_or(false, |d| d.time == t))
    }

    pub fn key_faces(&self, t: Time) -> CellSet {
        self.ids_where(|c| c.as_key_face().map_or(false, |d| d.time == t))
    }

    /// Key edges having `v` as start or end vertex.
    pub fn incident_key_edges(&self, v: CellId) -> Vec<CellId> {
        self.spatial_star(v)
            .into_iter()
            .filter(|c| {
                self.key_edge(*c)
                    .map_or(false, |e| e.start == Some(v) || e.end == Some(v))
            })
            .collect()
    }

    pub fn zordering(&self) -> &ZOrdering {
        &self.zordering
    }

    pub fn set_color(&mut self, id: CellId, color: Color) {
        if let Some(c) = self.cells.get_mut(&id) {
            c.color = color;
        }
    }
}
