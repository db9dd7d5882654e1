// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ambient editing settings read by the complex.
//!
//! The complex never persists these. Hosts build a [`Settings`] (usually
//! with [`Settings::from_env`]) and hand it to [`crate::Vac::with_settings`].

use std::str::FromStr;

use crate::color::Color;

/// Active editing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    #[default]
    Select,
    Sketch,
    Paint,
    Sculpt,
}

impl FromStr for ToolMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "select" => Ok(ToolMode::Select),
            "sketch" => Ok(ToolMode::Sketch),
            "paint" => Ok(ToolMode::Paint),
            "sculpt" => Ok(ToolMode::Sculpt),
            _ => Err(()),
        }
    }
}

/// Global settings provider.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Active tool.
    pub tool_mode: ToolMode,
    /// Sketched strokes intersect existing geometry and cut faces.
    pub planar_map_mode: bool,
    /// Sketch endpoints snap to nearby vertices and edges.
    pub snap_mode: bool,
    /// Snap distance, also used as the intersection tolerance of sketches.
    pub snap_threshold: f64,
    /// Width of newly sketched edges.
    pub edge_width: f64,
    pub edge_color: Color,
    pub face_color: Color,
    pub vertex_color: Color,
    /// Falloff radius of sculpt tools.
    pub sculpt_radius: f64,
    /// Sampling step of edge geometry.
    pub ds: f64,
    /// Same-cycle cuts produce a single non-orientable cycle.
    pub mobius_cut: bool,
    /// Inverts the orientation test used when gluing edges.
    pub inverse_direction: bool,
    /// Subdivision rounds applied before stroke tessellation.
    pub num_sub: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tool_mode: ToolMode::Select,
            planar_map_mode: true,
            snap_mode: true,
            snap_threshold: 15.0,
            edge_width: 10.0,
            edge_color: Color::BLACK,
            face_color: Color::new(0.5, 0.5, 0.5, 1.0),
            vertex_color: Color::BLACK,
            sculpt_radius: 50.0,
            ds: 2.0,
            mobius_cut: false,
            inverse_direction: false,
            num_sub: 2,
        }
    }
}

impl Settings {
    /// Load settings from `VAC_*` environment variables, falling back to
    /// the defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            tool_mode: std::env::var("VAC_TOOL_MODE")
                .unwrap_or_else(|_| "select".into())
                .parse()
                .unwrap_or(d.tool_mode),
            planar_map_mode: std::env::var("VAC_PLANAR_MAP_MODE")
                .unwrap_or_else(|_| "true".into())
                .parse()
                .unwrap_or(d.planar_map_mode),
            snap_mode: std::env::var("VAC_SNAP_MODE")
                .unwrap_or_else(|_| "true".into())
                .parse()
                .unwrap_or(d.snap_mode),
            snap_threshold: std::env::var("VAC_SNAP_THRESHOLD")
                .unwrap_or_else(|_| "15".into())
                .parse()
                .unwrap_or(d.snap_threshold),
            edge_width: std::env::var("VAC_EDGE_WIDTH")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .unwrap_or(d.edge_width),
            edge_color: std::env::var("VAC_EDGE_COLOR")
                .ok()
                .and_then(|s| Color::from_rgba_string(&s).ok())
                .unwrap_or(d.edge_color),
            face_color: std::env::var("VAC_FACE_COLOR")
                .ok()
                .and_then(|s| Color::from_rgba_string(&s).ok())
                .unwrap_or(d.face_color),
            vertex_color: std::env::var("VAC_VERTEX_COLOR")
                .ok()
                .and_then(|s| Color::from_rgba_string(&s).ok())
                .unwrap_or(d.vertex_color),
            sculpt_radius: std::env::var("VAC_SCULPT_RADIUS")
                .unwrap_or_else(|_| "50".into())
                .parse()
                .unwrap_or(d.sculpt_radius),
            ds: std::env::var("VAC_DS")
                .unwrap_or_else(|_| "2".into())
                .parse()
                .unwrap_or(d.ds),
            mobius_cut: std::env::var("VAC_MOBIUS_CUT")
                .unwrap_or_else(|_| "false".into())
                .parse()
                .unwrap_or(d.mobius_cut),
            inverse_direction: std::env::var("VAC_INVERSE_DIRECTION")
                .unwrap_or_else(|_| "false".into())
                .parse()
                .unwrap_or(d.inverse_direction),
            num_sub: std::env::var("VAC_NUM_SUB")
                .unwrap_or_else(|_| "2".into())
                .parse()
                .unwrap_or(d.num_sub),
        }
    }
}
