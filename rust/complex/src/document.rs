// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! XML document form of a complex.
//!
//! A document is `<vec version="1.0">` holding one layer, the layer
//! holding a `<background>` element and an `<objects>` element with one
//! child per cell in depth order:
//!
//! ```xml
//! <vertex id="0" position="0 0" color="rgba(0,0,0,1)"/>
//! <edge id="2" startvertex="0" endvertex="1" curve="xywdense(5 0,0,3 ...)"/>
//! <face id="3" cycles="[2+ 4-] [7]"/>
//! ```
//!
//! Key cells carry a `frame` attribute when not at frame 0 (a `time`
//! attribute for times between frames). Boundaries are written as id
//! strings of cycles, paths and animated vertices and resolved once every
//! cell has been read.

use std::collections::BTreeMap;

use nalgebra::Vector2;
use vac_lite_geometry::{format_number, LinearSpline};

use crate::animated_cycle::AnimatedCycle;
use crate::animated_vertex::AnimatedVertex;
use crate::boundary::referenced_ids;
use crate::cell::{
    Cell, CellData, InbetweenEdgeData, InbetweenFaceData, InbetweenVertexData, KeyEdgeData,
    KeyFaceData, KeyVertexData, VERTEX_SIZE_RATIO,
};
use crate::color::Color;
use crate::cycle::Cycle;
use crate::error::{Error, Result};
use crate::interaction::InteractionState;
use crate::keys::{CellId, CellSet, CellType};
use crate::notify::Notification;
use crate::path::Path;
use crate::settings::Settings;
use crate::time::Time;
use crate::vac::Vac;
use crate::xml::{XmlElement, XmlReader, XmlWriter};
use crate::zordering::ZOrdering;

pub const DOCUMENT_VERSION: &str = "1.0";
const CURVE_OPEN: &str = "xywdense(";

impl Vac {
    /// Writes one element per cell, bottom to top.
    pub fn write_xml(&self, xml: &mut XmlWriter) {
        for id in self.zordering.iter() {
            if let Some(cell) = self.cells.get(&id) {
                write_cell(xml, cell);
            }
        }
    }

    /// Replaces the content of the complex with the cell elements read
    /// from `xml`. Unknown elements are skipped.
    pub fn read_xml(&mut self, xml: &mut XmlReader<'_>) -> Result<()> {
        let vertex_size = self.settings.edge_width * VERTEX_SIZE_RATIO;
        let mut cells = Vec::new();
        while xml.read_next_start_element() {
            let Some(el) = xml.current() else {
                break;
            };
            match CellType::from_xml_name(&el.name) {
                Some(ty) => cells.push(read_cell(el, ty, vertex_size)?),
                None => {
                    tracing::warn!(element = %el.name, "skipping unknown element");
                    xml.skip_current_element();
                }
            }
        }
        self.load_cells(cells)
    }

    /// Whole document tree.
    pub fn to_xml_element(&self) -> XmlElement {
        let mut xml = XmlWriter::new();
        xml.write_start_element("vec");
        xml.write_attribute("version", DOCUMENT_VERSION);
        xml.write_start_element("layer");
        xml.write_attribute("name", "Layer 1");
        xml.write_attribute("visible", "true");
        xml.write_start_element("background");
        xml.write_attribute("color", self.background_color.to_rgba_string());
        xml.write_end_element();
        xml.write_start_element("objects");
        self.write_xml(&mut xml);
        xml.write_end_element();
        xml.write_end_element();
        xml.write_end_element();
        // Every element opened above is closed, so there is exactly one root.
        xml.finish()
            .ok()
            .and_then(|mut roots| roots.pop())
            .unwrap_or_else(|| XmlElement::new("vec"))
    }

    pub fn to_xml_string(&self) -> Result<String> {
        self.to_xml_element().to_xml_string()
    }

    pub fn from_xml_str(text: &str) -> Result<Vac> {
        Self::from_xml_str_with_settings(text, Settings::default())
    }

    pub fn from_xml_str_with_settings(text: &str, settings: Settings) -> Result<Vac> {
        let mut vac = Vac::with_settings(settings);
        vac.load_xml_str(text)?;
        Ok(vac)
    }

    /// Replaces the content of the complex with the document in `text`.
    pub fn load_xml_str(&mut self, text: &str) -> Result<()> {
        let root = XmlElement::parse(text)?;
        if root.name != "vec" {
            return Err(Error::Xml(format!("expected <vec>, found <{}>", root.name)));
        }
        match root.attribute("version") {
            Some(DOCUMENT_VERSION) | None => {}
            Some(v) => tracing::warn!(version = v, "unexpected document version"),
        }
        if let Some(color) = root
            .find("background")
            .and_then(|b| b.attribute("color"))
        {
            self.background_color = Color::from_rgba_string(color)?;
        }
        let objects = root
            .find("objects")
            .ok_or_else(|| Error::Xml("document without <objects>".to_string()))?;
        self.read_xml(&mut XmlReader::new(objects))
    }

    /// Installs freshly read cells, listed bottom to top.
    ///
    /// Ids must be unique and every boundary reference must resolve. Stars
    /// are rebuilt from the boundaries and key edge end points are snapped
    /// to their vertices. The id counter restarts after the largest id.
    pub(crate) fn load_cells(&mut self, cells: Vec<Cell>) -> Result<()> {
        let mut table = BTreeMap::new();
        let mut order = ZOrdering::new();
        for cell in cells {
            let id = cell.id;
            if table.insert(id, cell).is_some() {
                return Err(Error::Parse(format!("duplicate cell id {}", id)));
            }
            order.insert_last(id);
        }
        for cell in table.values() {
            if let Some(missing) = referenced_ids(&cell.data)
                .into_iter()
                .find(|r| !table.contains_key(r))
            {
                tracing::error!(cell = %cell.id, missing = %missing, "dangling reference");
                return Err(Error::CellNotFound(missing));
            }
        }

        self.cells = table;
        self.zordering = order;
        self.selection.clear();
        self.hovered = None;
        self.interaction = InteractionState::default();
        self.next_id = self.cells.keys().next_back().map_or(0, |c| c.0 + 1);
        self.rebuild_stars();

        let edges: Vec<CellId> = self
            .cells
            .values()
            .filter(|c| c.cell_type() == CellType::KeyEdge)
            .map(|c| c.id)
            .collect();
        for e in edges {
            if let Some(d) = self.key_edge_mut(e) {
                if d.is_closed() && !d.geometry.is_closed() {
                    d.geometry.make_loop();
                }
            }
            self.correct_geometry(e);
        }

        tracing::info!(cells = self.cells.len(), next_id = self.next_id, "complex loaded");
        self.emit(Notification::Changed);
        self.emit(Notification::NeedUpdatePicking);
        self.emit(Notification::SelectionChanged);
        Ok(())
    }
}

// ------------------------------------------------------------------------
// Writing
// ------------------------------------------------------------------------

fn ids_string(ids: &CellSet) -> String {
    ids.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
}

fn write_time(xml: &mut XmlWriter, time: Time) {
    if time.is_exact_frame() {
        if time.frame_number() != 0 {
            xml.write_attribute("frame", time.frame_number().to_string());
        }
    } else {
        xml.write_attribute("time", format_number(time.float_time()));
    }
}

fn curve_attribute(geometry: &LinearSpline) -> String {
    let mut d = String::from(CURVE_OPEN);
    d.push_str(&format_number(geometry.ds()));
    for s in geometry.samples() {
        d.push(' ');
        d.push_str(&format_number(s.x));
        d.push(',');
        d.push_str(&format_number(s.y));
        d.push(',');
        d.push_str(&format_number(s.width));
    }
    d.push(')');
    d
}

fn write_cell(xml: &mut XmlWriter, cell: &Cell) {
    xml.write_start_element(cell.cell_type().xml_name());
    xml.write_attribute("id", cell.id.to_string());
    match &cell.data {
        CellData::KeyVertex(v) => {
            write_time(xml, v.time);
            xml.write_attribute(
                "position",
                format!("{} {}", format_number(v.pos.x), format_number(v.pos.y)),
            );
        }
        CellData::KeyEdge(e) => {
            write_time(xml, e.time);
            if let (Some(s), Some(t)) = (e.start, e.end) {
                xml.write_attribute("startvertex", s.to_string());
                xml.write_attribute("endvertex", t.to_string());
            }
            xml.write_attribute("curve", curve_attribute(&e.geometry));
        }
        CellData::KeyFace(f) => {
            write_time(xml, f.time);
            let cycles: Vec<String> = f.cycles.iter().map(|c| c.to_id_string()).collect();
            xml.write_attribute("cycles", cycles.join(" "));
        }
        CellData::InbetweenVertex(v) => {
            xml.write_attribute("beforevertex", v.before.to_string());
            xml.write_attribute("aftervertex", v.after.to_string());
        }
        CellData::InbetweenEdge(InbetweenEdgeData::Open {
            before_path,
            after_path,
            start,
            end,
        }) => {
            xml.write_attribute("beforepath", before_path.to_id_string());
            xml.write_attribute("afterpath", after_path.to_id_string());
            xml.write_attribute("startanimatedvertex", start.to_id_string());
            xml.write_attribute("endanimatedvertex", end.to_id_string());
        }
        CellData::InbetweenEdge(InbetweenEdgeData::Closed {
            before_cycle,
            after_cycle,
        }) => {
            xml.write_attribute("beforecycle", before_cycle.to_id_string());
            xml.write_attribute("aftercycle", after_cycle.to_id_string());
            if after_cycle.s0() != 0.0 {
                xml.write_attribute("cycleoffset", format_number(after_cycle.s0()));
            }
        }
        CellData::InbetweenFace(f) => {
            let cycles: Vec<String> = f.cycles.iter().map(|c| c.to_id_string()).collect();
            xml.write_attribute("cycles", cycles.join(" "));
            xml.write_attribute("beforefaces", ids_string(&f.before_faces));
            xml.write_attribute("afterfaces", ids_string(&f.after_faces));
        }
    }
    xml.write_attribute("color", cell.color.to_rgba_string());
    xml.write_end_element();
}

// ------------------------------------------------------------------------
// Reading
// ------------------------------------------------------------------------

fn required<'a>(el: &'a XmlElement, name: &str) -> Result<&'a str> {
    el.attribute(name)
        .ok_or_else(|| Error::Xml(format!("<{}> without '{}' attribute", el.name, name)))
}

fn parse_id(s: &str) -> Result<CellId> {
    s.trim()
        .parse::<u32>()
        .map(CellId)
        .map_err(|_| Error::Parse(format!("invalid cell id '{}'", s)))
}

fn parse_ids(s: &str) -> Result<CellSet> {
    s.split_whitespace().map(parse_id).collect()
}

fn parse_f64(s: &str) -> Result<f64> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| Error::Parse(format!("invalid number '{}'", s)))
}

/// Splits `"[1+ 2-] [3]"` into its bracketed groups.
pub(crate) fn bracket_groups(s: &str) -> Result<Vec<&str>> {
    let mut res = Vec::new();
    let mut open = None;
    for (i, c) in s.char_indices() {
        match (c, open) {
            ('[', None) => open = Some(i),
            (']', Some(start)) => {
                res.push(&s[start..=i]);
                open = None;
            }
            ('[', Some(_)) | (']', None) => {
                return Err(Error::Parse(format!("unbalanced brackets in '{}'", s)))
            }
            _ => {}
        }
    }
    if open.is_some() {
        return Err(Error::Parse(format!("unbalanced brackets in '{}'", s)));
    }
    Ok(res)
}

fn read_time(el: &XmlElement) -> Result<Time> {
    if let Some(f) = el.attribute("frame") {
        let f = f
            .trim()
            .parse::<i32>()
            .map_err(|_| Error::Parse(format!("invalid frame '{}'", f)))?;
        return Ok(Time::frame(f));
    }
    match el.attribute("time") {
        Some(t) => Ok(Time::from_float(parse_f64(t)?)),
        None => Ok(Time::frame(0)),
    }
}

fn read_curve(s: &str) -> Result<LinearSpline> {
    let s = s.trim();
    let body = match s.strip_prefix(CURVE_OPEN) {
        Some(rest) => rest
            .strip_suffix(')')
            .ok_or_else(|| Error::Parse(format!("unterminated curve '{}'", s)))?,
        None => s,
    };
    Ok(LinearSpline::from_curve_string(body)?)
}

fn read_cell(el: &XmlElement, ty: CellType, vertex_size: f64) -> Result<Cell> {
    let id = parse_id(required(el, "id")?)?;
    let color = match el.attribute("color") {
        Some(c) => Color::from_rgba_string(c)?,
        None => Color::BLACK,
    };
    let data = match ty {
        CellType::KeyVertex => {
            let pos = required(el, "position")?;
            let xy = pos
                .split_whitespace()
                .map(parse_f64)
                .collect::<Result<Vec<f64>>>()?;
            let [x, y] = xy.as_slice() else {
                return Err(Error::Parse(format!("invalid position '{}'", pos)));
            };
            let mut d = KeyVertexData::new(read_time(el)?, Vector2::new(*x, *y));
            d.size = vertex_size;
            CellData::KeyVertex(d)
        }
        CellType::KeyEdge => {
            let (start, end) = match (el.attribute("startvertex"), el.attribute("endvertex")) {
                (Some(s), Some(e)) => (Some(parse_id(s)?), Some(parse_id(e)?)),
                (None, None) => (None, None),
                _ => {
                    return Err(Error::Xml(format!(
                        "edge {} has only one end vertex",
                        id
                    )))
                }
            };
            CellData::KeyEdge(KeyEdgeData {
                time: read_time(el)?,
                start,
                end,
                geometry: read_curve(required(el, "curve")?)?,
            })
        }
        CellType::KeyFace => {
            let cycles = bracket_groups(el.attribute("cycles").unwrap_or(""))?
                .into_iter()
                .map(Cycle::from_id_string)
                .collect::<Result<Vec<_>>>()?;
            CellData::KeyFace(KeyFaceData {
                time: read_time(el)?,
                cycles,
            })
        }
        CellType::InbetweenVertex => CellData::InbetweenVertex(InbetweenVertexData {
            before: parse_id(required(el, "beforevertex")?)?,
            after: parse_id(required(el, "aftervertex")?)?,
        }),
        CellType::InbetweenEdge => {
            if el.has_attribute("beforecycle") {
                let before_cycle = Cycle::from_id_string(required(el, "beforecycle")?)?;
                let mut after_cycle = Cycle::from_id_string(required(el, "aftercycle")?)?;
                if let Some(offset) = el.attribute("cycleoffset") {
                    after_cycle.set_starting_point(parse_f64(offset)?);
                }
                CellData::InbetweenEdge(InbetweenEdgeData::Closed {
                    before_cycle,
                    after_cycle,
                })
            } else {
                CellData::InbetweenEdge(InbetweenEdgeData::Open {
                    before_path: Path::from_id_string(required(el, "beforepath")?)?,
                    after_path: Path::from_id_string(required(el, "afterpath")?)?,
                    start: AnimatedVertex::from_id_string(required(el, "startanimatedvertex")?)?,
                    end: AnimatedVertex::from_id_string(required(el, "endanimatedvertex")?)?,
                })
            }
        }
        CellType::InbetweenFace => {
            let cycles = bracket_groups(el.attribute("cycles").unwrap_or(""))?
                .into_iter()
                .map(AnimatedCycle::from_id_string)
                .collect::<Result<Vec<_>>>()?;
            CellData::InbetweenFace(InbetweenFaceData {
                cycles,
                before_faces: parse_ids(el.attribute("beforefaces").unwrap_or(""))?,
                after_faces: parse_ids(el.attribute("afterfaces").unwrap_or(""))?,
            })
        }
    };
    Ok(Cell::new(id, color, data))
}
