// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mouse-driven interaction state machines.
//!
//! Every interaction is a begin / continue / end triple. `continue_*` and
//! `end_*` do nothing unless the matching `begin_*` was called, so events
//! delivered out of order are harmless. Each `continue_*` step leaves the
//! complex valid.

use nalgebra::{Matrix3, Vector2, Vector3};
use rustc_hash::FxHashMap;
use vac_lite_geometry::{BoundingBox, EdgeSample, LinearSpline};

use crate::cell::CellData;
use crate::keys::{CellId, CellSet, CellType, SpatialKind, TemporalKind};
use crate::notify::Notification;
use crate::settings::ToolMode;
use crate::sketch::SketchFaces;
use crate::time::Time;
use crate::vac::Vac;

/// Width of the invisible stroke drawn while cutting a face.
const CUT_STROKE_WIDTH: f64 = 3.0;

/// Tolerance of the straight strokes created by [`Vac::split`].
const SPLIT_TOLERANCE: f64 = 1e-6;

/// How a rectangle of selection combines with the previous selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RectangleMode {
    #[default]
    Replace,
    Add,
    Intersect,
    Remove,
}

#[derive(Debug, Clone)]
struct RectangleState {
    start: Vector2<f64>,
    end: Vector2<f64>,
    selected_before: CellSet,
}

#[derive(Debug, Clone)]
struct SketchState {
    spline: LinearSpline,
    face_on_press: Option<CellId>,
    faces_on_move: CellSet,
}

#[derive(Debug, Clone)]
struct CutState {
    start_vertex: CellId,
    spline: LinearSpline,
}

#[derive(Debug, Clone)]
struct DragState {
    origin: Vector2<f64>,
    vertices: CellSet,
    edges: CellSet,
}

#[derive(Debug, Clone)]
struct TemporalDragState {
    t0: Time,
    delta_min: Time,
    delta_max: Time,
    times: FxHashMap<CellId, Time>,
}

#[derive(Debug, Clone)]
struct TransformState {
    vertices: FxHashMap<CellId, Vector2<f64>>,
    edges: FxHashMap<CellId, LinearSpline>,
}

/// Transient state of the interaction in progress.
#[derive(Debug, Clone, Default)]
pub struct InteractionState {
    time: Time,
    rectangle: Option<RectangleState>,
    sketch: Option<SketchState>,
    cut: Option<CutState>,
    sculpted_edge: Option<CellId>,
    drag: Option<DragState>,
    temporal_drag: Option<TemporalDragState>,
    transform: Option<TransformState>,
}

impl InteractionState {
    /// Drops every reference to a deleted cell.
    pub(crate) fn forget_cell(&mut self, id: CellId) {
        if let Some(r) = &mut self.rectangle {
            r.selected_before.remove(&id);
        }
        if let Some(s) = &mut self.sketch {
            if s.face_on_press == Some(id) {
                s.face_on_press = None;
            }
            s.faces_on_move.remove(&id);
        }
        if self.cut.as_ref().is_some_and(|c| c.start_vertex == id) {
            self.cut = None;
        }
        if self.sculpted_edge == Some(id) {
            self.sculpted_edge = None;
        }
        if let Some(d) = &mut self.drag {
            d.vertices.remove(&id);
            d.edges.remove(&id);
        }
        if let Some(d) = &mut self.temporal_drag {
            d.times.remove(&id);
        }
        if let Some(t) = &mut self.transform {
            t.vertices.remove(&id);
            t.edges.remove(&id);
        }
    }

    /// Time of the last interaction.
    pub fn time(&self) -> Time {
        self.time
    }

    pub fn is_idle(&self) -> bool {
        self.rectangle.is_none()
            && self.sketch.is_none()
            && self.cut.is_none()
            && self.drag.is_none()
            && self.temporal_drag.is_none()
            && self.transform.is_none()
    }
}

fn transform_point(m: &Matrix3<f64>, p: Vector2<f64>) -> Vector2<f64> {
    let q = m * Vector3::new(p.x, p.y, 1.0);
    let w = if q.z.abs() > 1e-12 { q.z } else { 1.0 };
    Vector2::new(q.x / w, q.y / w)
}

impl Vac {
    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    /// Stroke being sketched or drawn to cut a face, if any.
    pub fn sketched_edge(&self) -> Option<&LinearSpline> {
        self.interaction
            .sketch
            .as_ref()
            .map(|s| &s.spline)
            .or_else(|| self.interaction.cut.as_ref().map(|c| &c.spline))
    }

    /// Key edge picked by the last [`Vac::update_sculpt`].
    pub fn sculpted_edge(&self) -> Option<CellId> {
        self.interaction.sculpted_edge
    }

    /// Hovered cell, keyframed first when it is an inbetween face in planar
    /// map mode.
    fn hovered_key_face(&mut self, t: Time) -> Option<CellId> {
        let h = self.hovered?;
        if self.cell_type(h) == Some(CellType::InbetweenFace) && self.settings.planar_map_mode {
            let f = self.keyframe_face(h, t)?;
            self.set_hovered_cell(f);
            return Some(f);
        }
        (self.cell_type(h) == Some(CellType::KeyFace)).then_some(h)
    }

    // --------------------------------------------------------------------
    // Rectangle of selection
    // --------------------------------------------------------------------

    pub fn begin_rectangle_of_selection(&mut self, x: f64, y: f64, t: Time) {
        self.interaction.time = t;
        self.interaction.rectangle = Some(RectangleState {
            start: Vector2::new(x, y),
            end: Vector2::new(x, y),
            selected_before: self.selection.clone(),
        });
    }

    /// Selects the cells touching the rectangle, combined with the
    /// selection as it was when the rectangle started.
    pub fn continue_rectangle_of_selection(&mut self, x: f64, y: f64, mode: RectangleMode) {
        let Some(rect) = self.interaction.rectangle.as_mut() else {
            return;
        };
        rect.end = Vector2::new(x, y);
        let (start, before) = (rect.start, rect.selected_before.clone());
        let bbox = BoundingBox::from_corners(start.x, start.y, x, y);
        let inside = self.cells_in_rectangle(&bbox, self.interaction.time);
        let selection: CellSet = match mode {
            RectangleMode::Replace => inside,
            RectangleMode::Add => before.union(&inside).copied().collect(),
            RectangleMode::Intersect => before.intersection(&inside).copied().collect(),
            RectangleMode::Remove => before.difference(&inside).copied().collect(),
        };
        self.set_selected_cells(&selection, false);
        self.emit(Notification::Changed);
    }

    pub fn end_rectangle_of_selection(&mut self) {
        if self.interaction.rectangle.take().is_some() {
            self.emit(Notification::SelectionChanged);
        }
    }

    pub fn rectangle_of_selection(&self) -> Option<BoundingBox> {
        self.interaction
            .rectangle
            .as_ref()
            .map(|r| BoundingBox::from_corners(r.start.x, r.start.y, r.end.x, r.end.y))
    }

    /// Cells existing at `t` that touch `rect`. Vertices count when their
    /// position lies inside it.
    pub fn cells_in_rectangle(&self, rect: &BoundingBox, t: Time) -> CellSet {
        self.cells_at(t)
            .into_iter()
            .filter(|c| match self.cell_type(*c).map(|k| k.spatial()) {
                Some(SpatialKind::Vertex) => rect.contains_point(self.vertex_pos(*c, t)),
                Some(_) => self.intersects_rect(*c, t, rect),
                None => false,
            })
            .collect()
    }

    // --------------------------------------------------------------------
    // Sketch
    // --------------------------------------------------------------------

    pub fn begin_sketch_edge(&mut self, x: f64, y: f64, w: f64, t: Time) {
        self.interaction.time = t;
        let mut spline = LinearSpline::new(self.settings.ds);
        spline.begin_sketch(EdgeSample::new(x, y, w));
        let face_on_press = self.hovered_key_face(t);
        self.interaction.sketch = Some(SketchState {
            spline,
            face_on_press,
            faces_on_move: CellSet::new(),
        });
    }

    pub fn continue_sketch_edge(&mut self, x: f64, y: f64, w: f64) {
        if self.interaction.sketch.is_none() {
            return;
        }
        let hovered = self.hovered_key_face(self.interaction.time);
        if let Some(s) = self.interaction.sketch.as_mut() {
            s.spline.continue_sketch(EdgeSample::new(x, y, w));
            s.faces_on_move.extend(hovered);
        }
        self.emit(Notification::Changed);
    }

    /// Inserts the stroke into the complex. Faces hovered during the
    /// stroke are the only ones cut, unless none was hovered.
    pub fn end_sketch_edge(&mut self) {
        let Some(SketchState {
            mut spline,
            face_on_press,
            faces_on_move,
        }) = self.interaction.sketch.take()
        else {
            return;
        };
        let time = self.interaction.time;
        let face_on_release = self.hovered_key_face(time);
        spline.end_sketch();

        let mut to_cut = faces_on_move;
        to_cut.extend(face_on_press);
        to_cut.extend(face_on_release);
        let faces = SketchFaces {
            on_press: face_on_press,
            on_release: face_on_release,
            to_cut: (!to_cut.is_empty()).then_some(to_cut),
        };
        let tolerance = self.sketch_tolerance();
        self.operate("sketch edge", |vac| vac.insert_sketched_edge(&spline, time, tolerance, &faces));
        self.emit_edit_done();
    }

    // --------------------------------------------------------------------
    // Cut face
    // --------------------------------------------------------------------

    /// Starts an invisible stroke from `start_vertex` toward another vertex
    /// of one of its faces.
    pub fn begin_cut_face(&mut self, x: f64, y: f64, start_vertex: Option<CellId>) {
        let Some(v) = start_vertex else {
            return;
        };
        let Some(time) = self.key_vertex(v).map(|d| d.time()) else {
            return;
        };
        self.interaction.time = time;
        let mut spline = LinearSpline::new(self.settings.ds);
        spline.begin_sketch(EdgeSample::new(x, y, CUT_STROKE_WIDTH));
        self.interaction.cut = Some(CutState { start_vertex: v, spline });
    }

    pub fn continue_cut_face(&mut self, x: f64, y: f64) {
        if let Some(c) = self.interaction.cut.as_mut() {
            c.spline.continue_sketch(EdgeSample::new(x, y, CUT_STROKE_WIDTH));
        }
    }

    /// Cuts the first face bounded by both vertices with the drawn stroke.
    /// Returns whether a face was cut.
    pub fn end_cut_face(&mut self, end_vertex: Option<CellId>) -> bool {
        let Some(CutState { start_vertex, mut spline }) = self.interaction.cut.take() else {
            return false;
        };
        spline.end_sketch();
        let Some(end_vertex) = end_vertex.filter(|v| self.key_vertex(*v).is_some()) else {
            return false;
        };
        let faces: Vec<CellId> = self
            .spatial_star(start_vertex)
            .intersection(&self.spatial_star(end_vertex))
            .copied()
            .filter(|f| self.cell_type(*f) == Some(CellType::KeyFace))
            .collect();
        let Some(&face) = faces.first() else {
            tracing::debug!(start = %start_vertex, end = %end_vertex, "cut face: no common face");
            return false;
        };

        let cut = self.operate("cut face", |vac| {
            spline.set_width(0.0);
            let Ok(edge) = vac.new_key_edge_with_geometry(start_vertex, end_vertex, spline) else {
                return false;
            };
            vac.correct_geometry(edge);
            if vac.cut_face(face, edge) {
                true
            } else {
                vac.delete_cell(edge);
                false
            }
        });
        if cut {
            self.emit_edit_done();
        }
        cut
    }

    // --------------------------------------------------------------------
    // Sculpt
    // --------------------------------------------------------------------

    /// Picks the key edge at `t` whose nearest sample is closest to
    /// `(x, y)`, within the sculpt radius.
    pub fn update_sculpt(&mut self, x: f64, y: f64, t: Time) -> Option<CellId> {
        self.interaction.time = t;
        let radius = self.settings.sculpt_radius;
        let mut best: Option<(CellId, f64)> = None;
        for e in self.key_edges(t) {
            let Some(d) = self.key_edge_mut(e) else {
                continue;
            };
            let dist = d.geometry.update_sculpt(x, y, radius);
            if dist < radius && best.map_or(true, |(_, b)| dist < b) {
                best = Some((e, dist));
            }
        }
        self.interaction.sculpted_edge = best.map(|(e, _)| e);
        self.interaction.sculpted_edge
    }

    fn sculpt(&mut self, f: impl FnOnce(&mut LinearSpline)) -> bool {
        let Some(e) = self.interaction.sculpted_edge else {
            return false;
        };
        let Some(d) = self.key_edge_mut(e) else {
            return false;
        };
        f(&mut d.geometry);
        let mut dirty = self.star(e);
        dirty.insert(e);
        self.invalidate_geometry(&dirty);
        true
    }

    pub fn begin_sculpt_deform(&mut self, x: f64, y: f64) {
        self.sculpt(|g| g.begin_sculpt_deform(x, y));
    }

    pub fn continue_sculpt_deform(&mut self, x: f64, y: f64) {
        if self.sculpt(|g| g.continue_sculpt_deform(x, y)) {
            self.emit(Notification::Changed);
        }
    }

    pub fn end_sculpt_deform(&mut self) {
        if self.sculpt(|g| g.end_sculpt_deform()) {
            self.emit(Notification::Checkpoint);
        }
    }

    pub fn begin_sculpt_edge_width(&mut self, x: f64, y: f64) {
        self.sculpt(|g| g.begin_sculpt_edge_width(x, y));
    }

    pub fn continue_sculpt_edge_width(&mut self, x: f64, y: f64) {
        if self.sculpt(|g| g.continue_sculpt_edge_width(x, y)) {
            self.emit(Notification::Changed);
        }
    }

    pub fn end_sculpt_edge_width(&mut self) {
        if self.sculpt(|g| g.end_sculpt_edge_width()) {
            self.emit(Notification::Checkpoint);
        }
    }

    /// One smoothing step at `(x, y)`. The sculpted edge is picked again
    /// first since the cursor moves along the stroke.
    pub fn continue_sculpt_smooth(&mut self, x: f64, y: f64) {
        let t = self.interaction.time;
        self.update_sculpt(x, y, t);
        if self.sculpt(|g| g.continue_sculpt_smooth()) {
            self.emit(Notification::Changed);
        }
    }

    pub fn end_sculpt_smooth(&mut self) {
        if self.interaction.sculpted_edge.is_some() {
            self.emit(Notification::Checkpoint);
        }
    }

    // --------------------------------------------------------------------
    // Spatial drag and drop
    // --------------------------------------------------------------------

    /// Starts dragging the hovered cell, or the whole selection when the
    /// hovered cell is selected in select mode. Dragged inbetween cells
    /// alive at `t` are keyframed first.
    pub fn prepare_drag_and_drop(&mut self, x0: f64, y0: f64, t: Time) {
        self.interaction.drag = None;
        let Some(hovered) = self.hovered else {
            return;
        };
        self.interaction.time = t;
        let cells: CellSet = if self.is_selected(hovered) && self.settings.tool_mode == ToolMode::Select {
            self.selection.clone()
        } else {
            [hovered].into_iter().collect()
        };
        let (to_keyframe, mut to_drag): (CellSet, CellSet) = cells.into_iter().partition(|c| {
            self.cell_type(*c).map(|k| k.temporal()) == Some(TemporalKind::Inbetween) && self.exists(*c, t)
        });
        to_drag.extend(self.keyframe_cells(&to_keyframe, t));
        let closure = self.closure(&to_drag);

        let vertices: CellSet = closure
            .iter()
            .copied()
            .filter(|c| self.cell_type(*c) == Some(CellType::KeyVertex))
            .collect();
        let edges: CellSet = closure
            .iter()
            .copied()
            .filter(|c| self.cell_type(*c) == Some(CellType::KeyEdge))
            .collect();
        for e in &edges {
            if let Some(d) = self.key_edge_mut(*e) {
                d.geometry.prepare_drag_and_drop();
            }
        }
        for v in &vertices {
            if let Some(d) = self.key_vertex_mut(*v) {
                d.pos_back = d.pos;
            }
        }
        self.interaction.drag = Some(DragState {
            origin: Vector2::new(x0, y0),
            vertices,
            edges,
        });
    }

    pub fn perform_drag_and_drop(&mut self, x: f64, y: f64) {
        let Some(drag) = self.interaction.drag.clone() else {
            return;
        };
        let delta = Vector2::new(x, y) - drag.origin;
        for e in &drag.edges {
            if let Some(d) = self.key_edge_mut(*e) {
                d.geometry.perform_drag_and_drop(delta.x, delta.y);
            }
        }
        for v in &drag.vertices {
            if let Some(d) = self.key_vertex_mut(*v) {
                d.pos = d.pos_back + delta;
            }
        }
        let mut dirty = drag.vertices.clone();
        for v in &drag.vertices {
            for e in self.incident_key_edges(*v) {
                self.correct_geometry(e);
            }
            dirty.extend(self.star(*v));
        }
        for e in &drag.edges {
            dirty.extend(self.star(*e));
        }
        self.invalidate_geometry(&dirty);
        self.emit(Notification::Changed);
    }

    pub fn complete_drag_and_drop(&mut self) {
        if self.interaction.drag.take().is_some() {
            self.emit(Notification::Changed);
            self.emit(Notification::Checkpoint);
        }
    }

    // --------------------------------------------------------------------
    // Temporal drag and drop
    // --------------------------------------------------------------------

    /// Starts shifting the selected key cells in time. The shift is bounded
    /// so that every inbetween cell they bound keeps a positive duration.
    pub fn prepare_temporal_drag_and_drop(&mut self, t0: Time) {
        let mut state = TemporalDragState {
            t0,
            delta_min: Time::frame(-1000),
            delta_max: Time::frame(1000),
            times: FxHashMap::default(),
        };
        for &c in &self.selection {
            if self.cell_type(c).map(|k| k.temporal()) != Some(TemporalKind::Key) {
                continue;
            }
            let time = self.before_time(c);
            for sc in self.temporal_star_before(c) {
                let d = self.before_time(sc) - time;
                if state.delta_min < d {
                    state.delta_min = d;
                }
            }
            for sc in self.temporal_star_after(c) {
                let d = self.after_time(sc) - time;
                if d < state.delta_max {
                    state.delta_max = d;
                }
            }
            state.times.insert(c, time);
        }
        self.interaction.temporal_drag = Some(state);
    }

    pub fn perform_temporal_drag_and_drop(&mut self, t: Time) {
        let Some(state) = self.interaction.temporal_drag.clone() else {
            return;
        };
        let delta = t - state.t0;
        if delta <= state.delta_min || delta >= state.delta_max {
            return;
        }
        let mut dirty = CellSet::new();
        for (&c, &time) in &state.times {
            let Some(cell) = self.cell_mut(c) else {
                continue;
            };
            match &mut cell.data {
                CellData::KeyVertex(d) => d.time = time + delta,
                CellData::KeyEdge(d) => d.time = time + delta,
                CellData::KeyFace(d) => d.time = time + delta,
                _ => continue,
            }
            dirty.insert(c);
            dirty.extend(self.star(c));
        }
        self.invalidate_geometry(&dirty);
        self.emit(Notification::Changed);
    }

    pub fn complete_temporal_drag_and_drop(&mut self) {
        if self.interaction.temporal_drag.take().is_some() {
            self.emit(Notification::Checkpoint);
        }
    }

    // --------------------------------------------------------------------
    // Transform
    // --------------------------------------------------------------------

    /// Starts transforming the key vertices and key edges in the closure of
    /// the selection.
    pub fn begin_transform_selection(&mut self) {
        let closure = self.closure(&self.selection.clone());
        let mut state = TransformState {
            vertices: FxHashMap::default(),
            edges: FxHashMap::default(),
        };
        for c in closure {
            if let Some(d) = self.key_vertex(c) {
                state.vertices.insert(c, d.pos());
            } else if let Some(d) = self.key_edge(c) {
                state.edges.insert(c, d.geometry.clone());
            }
        }
        self.interaction.transform = Some(state);
    }

    /// Applies `m` to the geometry as it was when the transform started.
    pub fn continue_transform_selection(&mut self, m: &Matrix3<f64>) {
        let Some(state) = self.interaction.transform.clone() else {
            return;
        };
        let mut dirty = CellSet::new();
        for (&e, geometry) in &state.edges {
            if let Some(d) = self.key_edge_mut(e) {
                let mut g = geometry.clone();
                g.curve_mut().transform(m);
                d.geometry = g;
                dirty.insert(e);
            }
        }
        for (&v, pos) in &state.vertices {
            if let Some(d) = self.key_vertex_mut(v) {
                d.pos = transform_point(m, *pos);
                dirty.insert(v);
            }
            for e in self.incident_key_edges(v) {
                self.correct_geometry(e);
            }
        }
        let stars: Vec<CellId> = dirty.iter().flat_map(|c| self.star(*c)).collect();
        dirty.extend(stars);
        self.invalidate_geometry(&dirty);
        self.emit(Notification::Changed);
    }

    pub fn end_transform_selection(&mut self) {
        if self.interaction.transform.take().is_some() {
            self.emit(Notification::Checkpoint);
        }
    }

    // --------------------------------------------------------------------
    // Split
    // --------------------------------------------------------------------

    /// Creates or finds a key vertex at `(x, y)` on the hovered cell: the
    /// hovered vertex itself, a split of the hovered edge, or a Steiner
    /// vertex of the hovered face. Hovered inbetween cells are keyframed
    /// first. With nothing hovered, a free vertex is created.
    ///
    /// In sketch mode every selected key vertex is then joined to the
    /// result by a straight stroke, which becomes the new selection.
    pub fn split(&mut self, x: f64, y: f64, t: Time) -> CellId {
        let v = self.operate("split", |vac| vac.split_hovered(x, y, t));
        self.emit_edit_done();
        v
    }

    fn split_hovered(&mut self, x: f64, y: f64, t: Time) -> CellId {
        let mut res = None;
        if let Some(h) = self.hovered {
            let key = match self.cell_type(h) {
                Some(CellType::InbetweenVertex) => self.keyframe_vertex(h, t),
                Some(CellType::InbetweenEdge) => self.keyframe_edge(h, t),
                Some(CellType::InbetweenFace) => self.keyframe_face(h, t),
                Some(_) => Some(h),
                None => None,
            };
            res = match key.and_then(|k| self.cell_type(k).map(|kind| (k, kind))) {
                Some((k, CellType::KeyVertex)) => Some(k),
                Some((k, CellType::KeyEdge)) => {
                    let s = self.key_edge_mut(k).map(|d| {
                        d.geometry.update_sculpt(x, y, 1000.0);
                        d.geometry.arclength_of_sculpt_vertex()
                    });
                    s.and_then(|s| self.cut_edge_at_vertex(k, s))
                }
                Some((k, CellType::KeyFace)) => {
                    let sketch_only = self.settings.tool_mode == ToolMode::Sketch && !self.settings.planar_map_mode;
                    if sketch_only {
                        None
                    } else {
                        self.cut_face_at_vertex(k, x, y)
                    }
                }
                _ => None,
            };
        }
        let res = res.unwrap_or_else(|| self.new_key_vertex(t, Vector2::new(x, y)));

        if self.settings.tool_mode == ToolMode::Sketch {
            let width = self.settings.edge_width;
            let end = self.key_vertex(res).map(|d| d.pos()).unwrap_or_else(|| Vector2::new(x, y));
            let selected: Vec<CellId> = self
                .selection
                .iter()
                .copied()
                .filter(|c| self.cell_type(*c) == Some(CellType::KeyVertex) && *c != res)
                .collect();
            for v in selected {
                if !self.settings.planar_map_mode {
                    let _ = self.new_key_edge(v, res);
                    continue;
                }
                let Some(start) = self.key_vertex(v).map(|d| d.pos()) else {
                    continue;
                };
                let mut spline = LinearSpline::new(self.settings.ds);
                spline.begin_sketch(EdgeSample::from_pos(start, width));
                spline.continue_sketch(EdgeSample::from_pos(end, width));
                spline.end_sketch();
                self.insert_sketched_edge(&spline, t, SPLIT_TOLERANCE, &SketchFaces::default());
            }
            if self.contains(res) {
                self.set_selected_cell(res, true);
            }
        }
        res
    }
}
