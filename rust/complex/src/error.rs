// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for complex operations.
//!
//! Topological refusals (an operator whose preconditions do not hold) are
//! not errors: operators return `bool` or `Option` and log the reason.
//! Errors are reserved for lookups, factories and serialization.

use crate::keys::{CellId, CellType};

/// Result type alias for complex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, querying or loading a complex.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced cell is not in the complex.
    #[error("cell not found: {0}")]
    CellNotFound(CellId),

    /// A cell exists but has another type than required.
    #[error("cell {id} is not a {expected:?}")]
    WrongCellType { id: CellId, expected: CellType },

    /// Halfedges or vertex do not form a valid cycle.
    #[error("invalid cycle: {0}")]
    InvalidCycle(String),

    /// Halfedges do not form a valid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Cells that must live at the same time (or in order) do not.
    #[error("time mismatch: {0}")]
    TimeMismatch(String),

    /// Malformed XML text or document structure.
    #[error("xml error: {0}")]
    Xml(String),

    /// Malformed legacy text or attribute value.
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Error raised by the geometry library.
    #[error(transparent)]
    Geometry(#[from] vac_lite_geometry::Error),
}
