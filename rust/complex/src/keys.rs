// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cell identifiers and cell type discriminants.
//!
//! Cells are stored in the complex by [`CellId`]. Ids are assigned in
//! increasing order and never reused within one complex. Animated cycle
//! nodes live in a per-cycle slot map keyed by [`NodeKey`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Key for a node of an animated cycle.
    pub struct NodeKey;
}

/// Identifier of a cell, unique within its complex.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CellId(pub u32);

impl CellId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered set of cell ids. Ordering keeps every algorithm deterministic.
pub type CellSet = BTreeSet<CellId>;

/// Temporal classification: instantaneous or spanning an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemporalKind {
    Key,
    Inbetween,
}

/// Spatial classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpatialKind {
    Vertex = 0,
    Edge = 1,
    Face = 2,
}

/// The six concrete cell types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    KeyVertex,
    KeyEdge,
    KeyFace,
    InbetweenVertex,
    InbetweenEdge,
    InbetweenFace,
}

impl CellType {
    pub fn temporal(self) -> TemporalKind {
        match self {
            CellType::KeyVertex | CellType::KeyEdge | CellType::KeyFace => TemporalKind::Key,
            _ => TemporalKind::Inbetween,
        }
    }

    pub fn spatial(self) -> SpatialKind {
        match self {
            CellType::KeyVertex | CellType::InbetweenVertex => SpatialKind::Vertex,
            CellType::KeyEdge | CellType::InbetweenEdge => SpatialKind::Edge,
            CellType::KeyFace | CellType::InbetweenFace => SpatialKind::Face,
        }
    }

    /// Spatial dimension: 0, 1 or 2.
    pub fn dimension(self) -> u8 {
        self.spatial() as u8
    }

    /// Element name used by the XML format.
    pub fn xml_name(self) -> &'static str {
        match self {
            CellType::KeyVertex => "vertex",
            CellType::KeyEdge => "edge",
            CellType::KeyFace => "face",
            CellType::InbetweenVertex => "inbetweenvertex",
            CellType::InbetweenEdge => "inbetweenedge",
            CellType::InbetweenFace => "inbetweenface",
        }
    }

    pub fn from_xml_name(name: &str) -> Option<CellType> {
        match name {
            "vertex" => Some(CellType::KeyVertex),
            "edge" => Some(CellType::KeyEdge),
            "face" => Some(CellType::KeyFace),
            "inbetweenvertex" => Some(CellType::InbetweenVertex),
            "inbetweenedge" => Some(CellType::InbetweenEdge),
            "inbetweenface" => Some(CellType::InbetweenFace),
            _ => None,
        }
    }

    /// Type name used by the legacy text format.
    pub fn legacy_name(self) -> &'static str {
        match self {
            CellType::KeyVertex => "KeyVertex",
            CellType::KeyEdge => "KeyEdge",
            CellType::KeyFace => "KeyFace",
            CellType::InbetweenVertex => "InbetweenVertex",
            CellType::InbetweenEdge => "InbetweenEdge",
            CellType::InbetweenFace => "InbetweenFace",
        }
    }

    /// Accepts the current legacy names and their older aliases.
    pub fn from_legacy_name(name: &str) -> Option<CellType> {
        match name {
            "Vertex" | "KeyVertex" | "InstantVertex" => Some(CellType::KeyVertex),
            "Edge" | "KeyEdge" | "InstantEdge" => Some(CellType::KeyEdge),
            "Face" | "KeyFace" | "InstantFace" => Some(CellType::KeyFace),
            "InbetweenVertex" | "SpacetimeVertex" => Some(CellType::InbetweenVertex),
            "InbetweenEdge" | "SpacetimeEdge" => Some(CellType::InbetweenEdge),
            "InbetweenFace" | "SpacetimeFace" => Some(CellType::InbetweenFace),
            _ => None,
        }
    }
}
