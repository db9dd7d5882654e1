// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # VAC-Lite Complex
//!
//! Vector animation complex: a cell complex over space and time used to
//! represent animated vector drawings. Key vertices, edges and faces live
//! at a single time; inbetween cells sweep key cells from one time to a
//! later one.
//!
//! The crate provides:
//!
//! - cell storage with incrementally maintained stars ([`Vac`], [`Cell`])
//! - boundary descriptions: [`Cycle`], [`Path`], [`AnimatedVertex`] and
//!   [`AnimatedCycle`]
//! - topological operators (cut, uncut, glue, unglue, keyframe, inbetween,
//!   face creation, sketch with planar-map insertion) guarded by
//!   [`Vac::check`]
//! - depth ordering, selection, picking and drawing through a
//!   [`RenderContext`]
//! - XML, legacy text and JSON serialization

pub mod animated_cycle;
pub mod animated_vertex;
pub mod boundary;
pub mod cell;
pub mod check;
pub mod clipboard;
pub mod color;
pub mod commands;
pub mod cut;
pub mod cycle;
pub mod cycle_helper;
pub mod delete;
pub mod document;
pub mod draw;
pub mod error;
pub mod face;
pub mod geometry;
pub mod glue;
pub mod halfedge;
pub mod inbetween;
pub mod interaction;
pub mod keyframe;
pub mod keys;
pub mod legacy;
pub mod notify;
pub mod operator;
pub mod path;
pub mod proper;
pub mod selection;
pub mod settings;
pub mod sketch;
pub mod snapshot;
pub mod time;
pub mod uncut;
pub mod vac;
pub mod xml;
pub mod zordering;

// Re-export nalgebra types for convenience
pub use nalgebra::Vector2;

pub use animated_cycle::{AnimatedCycle, AnimatedCycleNode, NodeCycleType, NodeType};
pub use animated_vertex::AnimatedVertex;
pub use cell::{
    Cell, CellData, InbetweenEdgeData, InbetweenFaceData, InbetweenVertexData, KeyEdgeData,
    KeyFaceData, KeyVertexData, VERTEX_SIZE_RATIO,
};
pub use clipboard::Clipboard;
pub use color::Color;
pub use cut::{CutFaceFeedback, SplitInfo};
pub use cycle::{Cycle, CycleType};
pub use draw::{DisplayMode, PickObject, Picking, RenderContext, ViewSettings};
pub use error::{Error, Result};
pub use halfedge::KeyHalfedge;
pub use interaction::{InteractionState, RectangleMode};
pub use keys::{CellId, CellSet, CellType, SpatialKind, TemporalKind};
pub use notify::{Notification, VacObserver};
pub use operator::{Operator, OperatorReport};
pub use path::{Path, PathType};
pub use selection::SelectionSpan;
pub use settings::{Settings, ToolMode};
pub use sketch::{SketchFaces, SketchResult};
pub use snapshot::VacSnapshot;
pub use time::{Time, TimeKind};
pub use vac::Vac;
pub use xml::{XmlElement, XmlReader, XmlWriter};
pub use zordering::ZOrdering;
