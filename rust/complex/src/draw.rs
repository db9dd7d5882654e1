// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Draw and pick dispatch.
//!
//! The complex never touches pixels. [`Vac::draw`] and [`Vac::draw_pick`]
//! walk the depth order and hand colors and triangles to a
//! [`RenderContext`]. Pick rendering writes one flat color per pickable
//! cell, produced by [`Picking`], which the host decodes back into a
//! [`PickObject`] under the cursor.

use std::f64::consts::PI;

use nalgebra::Vector2;
use vac_lite_geometry::spline::triangulate_stroke;
use vac_lite_geometry::{BoundingBox, Triangles};

use crate::color::Color;
use crate::geometry::disk;
use crate::keys::{CellId, CellType, SpatialKind};
use crate::settings::ToolMode;
use crate::time::Time;
use crate::vac::Vac;

/// Color of the hovered cell.
pub const HOVERED_COLOR: Color = Color::new(1.0, 0.7, 0.7, 1.0);
/// Color of selected cells in select mode.
pub const SELECTED_COLOR: Color = Color::new(1.0, 0.0, 0.0, 1.0);

const CURSOR_SEGMENTS: usize = 50;

/// Which passes [`Vac::draw`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Cells with their own colors.
    #[default]
    Illustration,
    /// Topology only: thin edges, vertex disks, optionally faces.
    Outline,
    /// Illustration with the topology drawn on top.
    IllustrationOutline,
}

/// Per-view drawing parameters.
#[derive(Debug, Clone)]
pub struct ViewSettings {
    pub display_mode: DisplayMode,
    pub zoom: f64,
    /// Topology sizes are in screen pixels rather than scene units.
    pub screen_relative: bool,
    pub vertex_topology_size: f64,
    pub edge_topology_width: f64,
    pub draw_topology_faces: bool,
    pub draw_cursor: bool,
    /// Only the main drawing shows the rectangle of selection.
    pub main_drawing: bool,
    /// Cursor position in scene coordinates, when over this view.
    pub cursor: Option<Vector2<f64>>,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            display_mode: DisplayMode::Illustration,
            zoom: 1.0,
            screen_relative: true,
            vertex_topology_size: 5.0,
            edge_topology_width: 3.0,
            draw_topology_faces: false,
            draw_cursor: true,
            main_drawing: true,
            cursor: None,
        }
    }
}

impl ViewSettings {
    fn topology_scale(&self) -> f64 {
        if self.screen_relative && self.zoom > 0.0 {
            1.0 / self.zoom
        } else {
            1.0
        }
    }
}

/// Receiver of draw calls. Colors stay current until the next
/// [`RenderContext::set_color`].
pub trait RenderContext {
    fn set_color(&mut self, color: Color);

    fn fill_triangles(&mut self, triangles: &Triangles);

    /// Closed outline, for cursors and the rectangle of selection.
    fn stroke_loop(&mut self, points: &[Vector2<f64>], width: f64);
}

/// Object under a pick-buffer pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PickObject {
    /// One bit, distinguishes views drawn into one buffer.
    pub time: u32,
    /// Nine bits, the sub-feature of the object (0 for cells).
    pub index: u32,
    /// Fourteen bits.
    pub id: u32,
}

impl PickObject {
    pub fn cell(id: CellId) -> Self {
        Self {
            time: 0,
            index: 0,
            id: id.raw(),
        }
    }

    pub fn cell_id(&self) -> CellId {
        CellId(self.id)
    }
}

/// Object to RGB codec of the pick buffer.
///
/// Layout, high to low bits of `0xRRGGBB`: time (1), index (9), id (14).
/// Out of range fields are masked.
pub struct Picking;

impl Picking {
    pub const MAX_ID: u32 = 0x3FFF;

    pub fn to_rgb(object: PickObject) -> [u8; 3] {
        let rgb = ((object.time & 0x1) << 23) | ((object.index & 0x1FF) << 14) | (object.id & 0x3FFF);
        [(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8]
    }

    pub fn from_rgb(rgb: [u8; 3]) -> PickObject {
        let [r, g, b] = rgb.map(u32::from);
        PickObject {
            time: r >> 7,
            index: ((r & 0x7F) << 2) | (g >> 6),
            id: ((g & 0x3F) << 8) | b,
        }
    }

    pub fn color(object: PickObject) -> Color {
        let [r, g, b] = Self::to_rgb(object);
        Color::from_rgba8(r, g, b, 1.0)
    }
}

fn circle(center: Vector2<f64>, r: f64) -> Vec<Vector2<f64>> {
    (0..CURSOR_SEGMENTS)
        .map(|i| {
            let a = 2.0 * PI * i as f64 / CURSOR_SEGMENTS as f64;
            center + Vector2::new(a.cos(), a.sin()) * r
        })
        .collect()
}

/// Radius of a cursor disk for a stroke of `width`, at least one pixel.
fn cursor_radius(width: f64, zoom: f64) -> f64 {
    let r = 0.5 * width;
    if r == 0.0 {
        3.0 / zoom
    } else if r * zoom < 1.0 {
        1.0 / zoom
    } else {
        r
    }
}

fn topology_color(kind: CellType) -> Color {
    match kind {
        CellType::KeyVertex => Color::new(0.0, 0.165, 0.514, 1.0),
        CellType::KeyEdge => Color::new(0.18, 0.60, 0.90, 1.0),
        CellType::KeyFace => Color::new(0.75, 0.90, 1.00, 1.0),
        CellType::InbetweenVertex => Color::new(0.12, 0.34, 0.0, 1.0),
        CellType::InbetweenEdge => Color::new(0.47, 0.72, 0.40, 1.0),
        CellType::InbetweenFace => Color::new(0.94, 1.00, 0.91, 1.0),
    }
}

impl Vac {
    /// Whether the cell takes part in picking at `t` under the current tool.
    pub fn is_pickable(&self, id: CellId, t: Time) -> bool {
        if !self.exists(id, t) {
            return false;
        }
        let tool = self.settings.tool_mode;
        match self.cell_type(id).map(|k| k.spatial()) {
            Some(SpatialKind::Vertex) => matches!(tool, ToolMode::Select | ToolMode::Sculpt),
            Some(SpatialKind::Edge) => matches!(tool, ToolMode::Select | ToolMode::Paint),
            // Sketch mode picks faces to know which one a stroke starts in
            Some(SpatialKind::Face) => matches!(tool, ToolMode::Select | ToolMode::Paint | ToolMode::Sketch),
            None => false,
        }
    }

    /// Fill color of a cell in illustration passes.
    pub fn draw_color(&self, id: CellId, view: &ViewSettings) -> Color {
        let Some(cell) = self.cell(id) else {
            return Color::BLACK;
        };
        if view.display_mode == DisplayMode::IllustrationOutline && cell.spatial_kind() != SpatialKind::Face {
            cell.color
        } else if cell.hovered {
            HOVERED_COLOR
        } else if cell.selected && self.settings.tool_mode == ToolMode::Select {
            SELECTED_COLOR
        } else {
            cell.color
        }
    }

    /// Color of a cell in outline passes.
    pub fn topology_color(&self, id: CellId) -> Color {
        let Some(cell) = self.cell(id) else {
            return Color::BLACK;
        };
        if cell.hovered {
            HOVERED_COLOR
        } else if cell.selected && self.settings.tool_mode == ToolMode::Select {
            SELECTED_COLOR
        } else {
            topology_color(cell.cell_type())
        }
    }

    /// Outline triangulation: fixed-width edges, fixed-size vertex disks
    /// and faces only when the view asks for them.
    pub fn topology_triangles(&self, id: CellId, t: Time, view: &ViewSettings) -> Triangles {
        if !self.exists(id, t) {
            return Triangles::new();
        }
        let scale = view.topology_scale();
        match self.cell_type(id).map(|k| k.spatial()) {
            Some(SpatialKind::Vertex) => disk(self.vertex_pos(id, t), 0.5 * view.vertex_topology_size * scale),
            Some(SpatialKind::Edge) => {
                let width = view.edge_topology_width * scale;
                let mut samples = self.edge_sampling_at(id, t);
                for s in &mut samples {
                    s.width = width;
                }
                triangulate_stroke(&samples, self.is_closed_edge(id), self.settings.num_sub)
            }
            Some(SpatialKind::Face) if view.draw_topology_faces => self.triangles(id, t),
            _ => Triangles::new(),
        }
    }

    fn draw_cell(&self, id: CellId, t: Time, view: &ViewSettings, ctx: &mut dyn RenderContext) {
        if !self.exists(id, t) {
            return;
        }
        ctx.set_color(self.draw_color(id, view));
        ctx.fill_triangles(&self.triangles(id, t));
    }

    fn draw_cell_topology(&self, id: CellId, t: Time, view: &ViewSettings, ctx: &mut dyn RenderContext) {
        if !self.exists(id, t) {
            return;
        }
        ctx.set_color(self.topology_color(id));
        ctx.fill_triangles(&self.topology_triangles(id, t, view));
    }

    fn draw_sketched_edge(&self, t: Time, topology: bool, view: &ViewSettings, ctx: &mut dyn RenderContext) {
        let Some(spline) = self.sketched_edge() else {
            return;
        };
        if self.interaction.time() != t {
            return;
        }
        let num_sub = self.settings.num_sub;
        if topology {
            ctx.set_color(topology_color(CellType::KeyEdge));
            ctx.fill_triangles(&spline.triangulate_with_width(view.edge_topology_width * view.topology_scale(), num_sub));
        } else {
            ctx.set_color(self.settings.edge_color);
            ctx.fill_triangles(&spline.triangulate(num_sub));
        }
    }

    /// Draws every cell existing at `t` in depth order, then the stroke
    /// being sketched, the tool cursors and the rectangle of selection.
    pub fn draw(&self, t: Time, view: &ViewSettings, ctx: &mut dyn RenderContext) {
        let order = self.zordering.as_slice();
        match view.display_mode {
            DisplayMode::Illustration => {
                for &c in order {
                    self.draw_cell(c, t, view, ctx);
                }
                self.draw_sketched_edge(t, false, view, ctx);
            }
            DisplayMode::Outline => {
                for &c in order {
                    self.draw_cell_topology(c, t, view, ctx);
                }
                self.draw_sketched_edge(t, true, view, ctx);
            }
            DisplayMode::IllustrationOutline => {
                for &c in order {
                    self.draw_cell(c, t, view, ctx);
                }
                self.draw_sketched_edge(t, false, view, ctx);
                for &c in order {
                    self.draw_cell_topology(c, t, view, ctx);
                }
                self.draw_sketched_edge(t, true, view, ctx);
            }
        }
        if view.draw_cursor {
            self.draw_cursor(t, view, ctx);
        }
        if view.main_drawing {
            if let Some(rect) = self.rectangle_of_selection() {
                draw_rectangle(&rect, ctx);
            }
        }
    }

    fn draw_cursor(&self, t: Time, view: &ViewSettings, ctx: &mut dyn RenderContext) {
        let zoom = if view.zoom > 0.0 { view.zoom } else { 1.0 };
        match self.settings.tool_mode {
            ToolMode::Sculpt => {
                let Some(edge) = self.sculpted_edge() else {
                    return;
                };
                let on_vertex = self.hovered.and_then(|h| self.cell_type(h)) == Some(CellType::KeyVertex);
                let Some(p) = self.key_edge(edge).and_then(|e| e.geometry.sculpt_vertex()) else {
                    return;
                };
                if on_vertex || self.key_edge(edge).map(|e| e.time()) != Some(t) {
                    return;
                }
                let r = if view.display_mode == DisplayMode::Illustration {
                    cursor_radius(p.width, zoom)
                } else {
                    5.0 / zoom
                };
                let center = Vector2::new(p.x, p.y);
                ctx.set_color(Color::new(1.0, 0.0, 0.0, 1.0));
                ctx.fill_triangles(&disk(center, r));
                ctx.stroke_loop(&circle(center, self.settings.sculpt_radius), 1.0);
            }
            ToolMode::Sketch => {
                let Some(p) = view.cursor else {
                    return;
                };
                let c = self.settings.edge_color;
                ctx.set_color(Color::new(c.r, c.g, c.b, c.a.max(0.2)));
                ctx.fill_triangles(&disk(p, cursor_radius(self.settings.edge_width, zoom)));
                if self.settings.snap_mode {
                    ctx.stroke_loop(&circle(p, self.settings.snap_threshold), 1.0);
                }
            }
            _ => {}
        }
    }

    /// Draws every pickable cell in its pick color. In illustration-outline
    /// mode faces are picked by their fill, vertices and edges by their
    /// outline.
    pub fn draw_pick(&self, t: Time, view: &ViewSettings, ctx: &mut dyn RenderContext) {
        let order = self.zordering.as_slice();
        let is_face = |c: CellId| self.cell(c).map(|c| c.spatial_kind()) == Some(SpatialKind::Face);
        match view.display_mode {
            DisplayMode::Illustration => {
                for &c in order {
                    self.pick_cell(c, t, false, view, ctx);
                }
            }
            DisplayMode::Outline => {
                for &c in order {
                    self.pick_cell(c, t, true, view, ctx);
                }
            }
            DisplayMode::IllustrationOutline => {
                for &c in order.iter().filter(|c| is_face(**c)) {
                    self.pick_cell(c, t, false, view, ctx);
                }
                for &c in order.iter().filter(|c| !is_face(**c)) {
                    self.pick_cell(c, t, true, view, ctx);
                }
            }
        }
    }

    fn pick_cell(&self, id: CellId, t: Time, topology: bool, view: &ViewSettings, ctx: &mut dyn RenderContext) {
        if !self.is_pickable(id, t) {
            return;
        }
        if id.raw() > Picking::MAX_ID {
            tracing::warn!(cell = %id, "cell id exceeds pick range");
        }
        ctx.set_color(Picking::color(PickObject::cell(id)));
        if topology {
            ctx.fill_triangles(&self.topology_triangles(id, t, view));
        } else {
            ctx.fill_triangles(&self.triangles(id, t));
        }
    }

    /// Cell encoded by a pick-buffer pixel, if it is still in the complex.
    pub fn picked_cell(&self, rgb: [u8; 3]) -> Option<CellId> {
        let object = Picking::from_rgb(rgb);
        (object.index == 0 && self.contains(object.cell_id())).then(|| object.cell_id())
    }
}

fn draw_rectangle(rect: &BoundingBox, ctx: &mut dyn RenderContext) {
    let corners = [
        Vector2::new(rect.min_x, rect.min_y),
        Vector2::new(rect.min_x, rect.max_y),
        Vector2::new(rect.max_x, rect.max_y),
        Vector2::new(rect.max_x, rect.min_y),
    ];
    let mut fill = Triangles::new();
    fill.append(rect.min_x, rect.min_y, rect.min_x, rect.max_y, rect.max_x, rect.max_y);
    fill.append(rect.min_x, rect.min_y, rect.max_x, rect.max_y, rect.max_x, rect.min_y);
    ctx.set_color(Color::new(0.5, 0.5, 0.8, 0.2));
    ctx.fill_triangles(&fill);
    ctx.set_color(Color::BLACK);
    ctx.stroke_loop(&corners, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::Cycle;

    /// Remembers the color current at each fill.
    #[derive(Default)]
    struct Recorder {
        color: Color,
        fills: Vec<(Color, usize)>,
        loops: usize,
    }

    impl RenderContext for Recorder {
        fn set_color(&mut self, color: Color) {
            self.color = color;
        }

        fn fill_triangles(&mut self, triangles: &Triangles) {
            self.fills.push((self.color, triangles.len()));
        }

        fn stroke_loop(&mut self, _points: &[Vector2<f64>], _width: f64) {
            self.loops += 1;
        }
    }

    fn triangle_face(vac: &mut Vac) -> (Vec<CellId>, Vec<CellId>, CellId) {
        let t = Time::frame(0);
        let p = [(0.0, 0.0), (100.0, 0.0), (50.0, 80.0)];
        let v: Vec<CellId> = p.iter().map(|(x, y)| vac.new_key_vertex(t, Vector2::new(*x, *y))).collect();
        let e: Vec<CellId> = (0..3).map(|i| vac.new_key_edge(v[i], v[(i + 1) % 3]).unwrap()).collect();
        let cycle = Cycle::from_edge_set(vac, &e.iter().copied().collect());
        let f = vac.new_key_face_with_cycle(cycle).unwrap();
        (v, e, f)
    }

    #[test]
    fn picking_layout() {
        let object = PickObject {
            time: 1,
            index: 300,
            id: 12345,
        };
        assert_eq!(Picking::from_rgb(Picking::to_rgb(object)), object);
        assert_eq!(Picking::to_rgb(PickObject::cell(CellId(1))), [0, 0, 1]);
        assert_eq!(Picking::to_rgb(PickObject::cell(CellId(256))), [0, 1, 0]);
    }

    #[test]
    fn illustration_draws_in_depth_order() {
        let mut vac = Vac::new();
        let (_, e, f) = triangle_face(&mut vac);
        vac.select(e[0]);
        let mut ctx = Recorder::default();
        vac.draw(Time::frame(0), &ViewSettings::default(), &mut ctx);
        assert_eq!(ctx.fills.len(), vac.len());
        // The face sits below its boundary
        assert_eq!(vac.zordering().as_slice()[0], f);
        assert_eq!(ctx.fills[0].0, vac.cell(f).unwrap().color());
        assert!(ctx.fills.iter().any(|(c, _)| *c == SELECTED_COLOR));
        assert!(ctx.fills.iter().all(|(_, n)| *n > 0));
    }

    #[test]
    fn nothing_is_drawn_at_other_times() {
        let mut vac = Vac::new();
        triangle_face(&mut vac);
        let mut ctx = Recorder::default();
        vac.draw(Time::frame(3), &ViewSettings::default(), &mut ctx);
        vac.draw_pick(Time::frame(3), &ViewSettings::default(), &mut ctx);
        assert!(ctx.fills.is_empty());
    }

    #[test]
    fn outline_skips_faces_unless_asked() {
        let mut vac = Vac::new();
        let (_, e, _) = triangle_face(&mut vac);
        let mut view = ViewSettings {
            display_mode: DisplayMode::Outline,
            ..ViewSettings::default()
        };
        let mut ctx = Recorder::default();
        vac.draw(Time::frame(0), &view, &mut ctx);
        assert_eq!(ctx.fills.iter().filter(|(_, n)| *n > 0).count(), 6);
        assert!(ctx.fills.iter().any(|(c, _)| *c == topology_color(CellType::KeyEdge)));

        view.draw_topology_faces = true;
        let mut ctx = Recorder::default();
        vac.draw(Time::frame(0), &view, &mut ctx);
        assert_eq!(ctx.fills.iter().filter(|(_, n)| *n > 0).count(), 7);
        assert!(!vac.topology_triangles(e[0], Time::frame(0), &view).is_empty());
    }

    #[test]
    fn pick_colors_decode_to_cells() {
        let mut vac = Vac::new();
        let (v, _, f) = triangle_face(&mut vac);
        let mut ctx = Recorder::default();
        vac.draw_pick(Time::frame(0), &ViewSettings::default(), &mut ctx);
        assert_eq!(ctx.fills.len(), 7);
        let picked: Vec<CellId> = ctx
            .fills
            .iter()
            .filter_map(|(c, _)| {
                let rgb = [(c.r * 255.0).round() as u8, (c.g * 255.0).round() as u8, (c.b * 255.0).round() as u8];
                vac.picked_cell(rgb)
            })
            .collect();
        assert_eq!(picked, vac.zordering().as_slice());
        assert!(picked.contains(&f) && picked.contains(&v[0]));
    }

    #[test]
    fn sketch_tool_only_picks_faces() {
        let mut settings = crate::settings::Settings::default();
        settings.tool_mode = ToolMode::Sketch;
        let mut vac = Vac::with_settings(settings);
        let (v, e, f) = triangle_face(&mut vac);
        let t = Time::frame(0);
        assert!(vac.is_pickable(f, t));
        assert!(!vac.is_pickable(e[0], t));
        assert!(!vac.is_pickable(v[0], t));
        let mut ctx = Recorder::default();
        vac.draw_pick(t, &ViewSettings::default(), &mut ctx);
        assert_eq!(ctx.fills.len(), 1);
    }

    #[test]
    fn rectangle_and_sketch_cursor_are_drawn() {
        let mut settings = crate::settings::Settings::default();
        settings.snap_mode = true;
        settings.tool_mode = ToolMode::Sketch;
        let mut vac = Vac::with_settings(settings);
        vac.begin_rectangle_of_selection(0.0, 0.0, Time::frame(0));
        let view = ViewSettings {
            cursor: Some(Vector2::new(5.0, 5.0)),
            ..ViewSettings::default()
        };
        let mut ctx = Recorder::default();
        vac.draw(Time::frame(0), &view, &mut ctx);
        // Cursor disk plus snap circle, then rectangle fill plus outline
        assert_eq!(ctx.loops, 2);
        assert_eq!(ctx.fills.len(), 2);
    }
}
