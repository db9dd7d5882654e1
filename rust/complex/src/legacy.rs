// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Legacy text format.
//!
//! Older documents are a tree of `Name : value` fields with `{ ... }`
//! blocks:
//!
//! ```text
//! Version : 1.0
//! Scene :
//! {
//!     Cells :
//!     [
//!         {
//!             Type : KeyVertex
//!             ID : 0
//!             Color : 0 0 0 1
//!             Pos : (10,20)
//!             Size : 5.1
//!             TangentEdges : [ ]
//!         }
//!     ]
//! }
//! ```
//!
//! Field values other than blocks are kept as raw text and decoded by the
//! legacy parsers of the boundary types.

use nalgebra::Vector2;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::char,
    combinator::{map, not, recognize},
    multi::{many0, many1},
    sequence::{delimited, preceded, separated_pair, terminated},
    IResult,
};
use vac_lite_geometry::{format_number, Curve, EdgeSample, LinearSpline};

use crate::animated_cycle::AnimatedCycle;
use crate::animated_vertex::AnimatedVertex;
use crate::cell::{
    Cell, CellData, InbetweenEdgeData, InbetweenFaceData, InbetweenVertexData, KeyEdgeData,
    KeyFaceData, KeyVertexData, VERTEX_SIZE_RATIO,
};
use crate::color::Color;
use crate::cycle::Cycle;
use crate::error::{Error, Result};
use crate::keys::{CellId, CellSet, CellType};
use crate::path::Path;
use crate::settings::Settings;
use crate::time::Time;
use crate::vac::Vac;

const PUNCTUATION: &str = "{}[](),:";

// ------------------------------------------------------------------------
// Parser
// ------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Value<'a> {
    /// Raw text of a scalar or bracketed value.
    Text(&'a str),
    Block(Fields<'a>),
    /// `[ { ... } { ... } ]`
    Blocks(Vec<Fields<'a>>),
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Fields<'a>(Vec<(&'a str, Value<'a>)>);

impl<'a> Fields<'a> {
    fn get(&self, name: &str) -> Option<&Value<'a>> {
        self.0.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    fn text(&self, name: &str) -> Option<&'a str> {
        match self.get(name) {
            Some(Value::Text(t)) => Some(*t),
            _ => None,
        }
    }

    fn required(&self, name: &str) -> Result<&'a str> {
        self.text(name)
            .ok_or_else(|| Error::Parse(format!("missing field '{}'", name)))
    }

    fn block(&self, name: &str) -> Option<&Fields<'a>> {
        match self.get(name) {
            Some(Value::Block(b)) => Some(b),
            _ => None,
        }
    }
}

fn ws(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace)(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && !PUNCTUATION.contains(c))(input)
}

/// A word that does not open a new field.
fn plain_word(input: &str) -> IResult<&str, &str> {
    terminated(word, not(preceded(ws, char(':'))))(input)
}

fn group_content(input: &str) -> IResult<&str, Vec<&str>> {
    many0(alt((group, take_while1(|c: char| !"[]()".contains(c)))))(input)
}

/// Balanced `[...]` or `(...)`.
fn group(input: &str) -> IResult<&str, &str> {
    recognize(alt((
        delimited(char('['), group_content, char(']')),
        delimited(char('('), group_content, char(')')),
    )))(input)
}

fn raw(input: &str) -> IResult<&str, &str> {
    map(
        recognize(many1(preceded(ws, alt((group, plain_word, tag(",")))))),
        str::trim,
    )(input)
}

fn value(input: &str) -> IResult<&str, Value<'_>> {
    preceded(
        ws,
        alt((
            map(block, Value::Block),
            map(block_list, Value::Blocks),
            map(raw, Value::Text),
        )),
    )(input)
}

fn field(input: &str) -> IResult<&str, (&str, Value<'_>)> {
    separated_pair(preceded(ws, word), preceded(ws, char(':')), value)(input)
}

fn block(input: &str) -> IResult<&str, Fields<'_>> {
    map(
        delimited(char('{'), many0(field), preceded(ws, char('}'))),
        Fields,
    )(input)
}

fn block_list(input: &str) -> IResult<&str, Vec<Fields<'_>>> {
    delimited(
        char('['),
        many1(preceded(ws, block)),
        preceded(ws, char(']')),
    )(input)
}

fn document(input: &str) -> Result<Fields<'_>> {
    match terminated(many0(field), ws)(input) {
        Ok(("", fields)) => Ok(Fields(fields)),
        Ok((rest, _)) => Err(Error::Parse(format!(
            "unexpected text at byte {}",
            input.len() - rest.len()
        ))),
        Err(e) => Err(Error::Parse(format!("failed to parse legacy document: {}", e))),
    }
}

/// Top-level items of `[ a , b ]`. Commas nested in brackets or
/// parentheses do not split.
fn list_items(s: &str) -> Result<Vec<&str>> {
    let inner = s
        .trim()
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .ok_or_else(|| Error::Parse(format!("not a list: '{}'", s)))?;
    let mut res = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            ',' if depth == 0 => {
                res.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    res.push(inner[start..].trim());
    res.retain(|p| !p.is_empty());
    Ok(res)
}

fn numbers(s: &str) -> Result<Vec<f64>> {
    s.split(|c: char| "[](),".contains(c) || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<f64>()
                .map_err(|_| Error::Parse(format!("invalid number '{}'", p)))
        })
        .collect()
}

fn parse_id(s: &str) -> Result<CellId> {
    s.trim()
        .parse::<u32>()
        .map(CellId)
        .map_err(|_| Error::Parse(format!("invalid cell id '{}'", s)))
}

/// `-1` stands for no vertex.
fn parse_optional_id(s: &str) -> Result<Option<CellId>> {
    let id = s
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::Parse(format!("invalid cell id '{}'", s)))?;
    Ok(u32::try_from(id).ok().map(CellId))
}

fn parse_time(s: &str) -> Result<Time> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    match parts[..] {
        [kind, value] => Time::from_legacy_parts(kind, value),
        _ => Err(Error::Parse(format!("invalid time '{}'", s))),
    }
}

fn parse_color(s: &str) -> Result<Color> {
    match numbers(s)?[..] {
        [r, g, b, a] => Ok(Color::new(r, g, b, a)),
        _ => Err(Error::Parse(format!("invalid color '{}'", s))),
    }
}

fn parse_geometry(fields: &Fields<'_>, ds: f64) -> Result<LinearSpline> {
    let kind = fields.required("Type")?;
    if kind != "LinearSpline" {
        return Err(Error::Parse(format!("unsupported edge geometry '{}'", kind)));
    }
    let values = numbers(fields.required("Vertices")?)?;
    if values.len() % 3 != 0 {
        return Err(Error::Parse("edge vertices are not (x,y,w) triples".to_string()));
    }
    let samples: Vec<EdgeSample> = values
        .chunks_exact(3)
        .map(|c| EdgeSample::new(c[0], c[1], c[2]))
        .collect();
    if let Some(n) = fields.text("NumVertices") {
        let n = n
            .trim()
            .parse::<usize>()
            .map_err(|_| Error::Parse(format!("invalid vertex count '{}'", n)))?;
        if n != samples.len() {
            return Err(Error::Parse(format!(
                "edge announces {} vertices, found {}",
                n,
                samples.len()
            )));
        }
    }
    Ok(LinearSpline::from_curve(Curve::from_vertices(samples, ds), false))
}

fn read_cell(fields: &Fields<'_>, ds: f64, vertex_size: f64) -> Result<Cell> {
    let type_name = fields.required("Type")?;
    let ty = CellType::from_legacy_name(type_name)
        .ok_or_else(|| Error::Parse(format!("unknown cell type '{}'", type_name)))?;
    let id = parse_id(fields.required("ID")?)?;
    let color = match fields.text("Color") {
        Some(c) => parse_color(c)?,
        None => Color::BLACK,
    };
    let time = match fields.text("Time") {
        Some(t) => parse_time(t)?,
        None => Time::default(),
    };
    let data = match ty {
        CellType::KeyVertex => {
            let pos = fields.required("Pos")?;
            let xy = numbers(pos)?;
            let [x, y] = xy[..] else {
                return Err(Error::Parse(format!("invalid position '{}'", pos)));
            };
            let mut d = KeyVertexData::new(time, Vector2::new(x, y));
            d.size = match fields.text("Size") {
                Some(s) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| Error::Parse(format!("invalid vertex size '{}'", s)))?,
                None => vertex_size,
            };
            CellData::KeyVertex(d)
        }
        CellType::KeyEdge => {
            let start = parse_optional_id(fields.required("StartVertex")?)?;
            let end = parse_optional_id(fields.required("EndVertex")?)?;
            if start.is_some() != end.is_some() {
                return Err(Error::Parse(format!("edge {} has only one end vertex", id)));
            }
            let geometry = fields
                .block("Geometry")
                .ok_or_else(|| Error::Parse(format!("edge {} without geometry", id)))?;
            CellData::KeyEdge(KeyEdgeData {
                time,
                start,
                end,
                geometry: parse_geometry(geometry, ds)?,
            })
        }
        CellType::KeyFace => {
            let cycles = list_items(fields.required("Cycles")?)?
                .into_iter()
                .map(Cycle::from_legacy_string)
                .collect::<Result<Vec<_>>>()?;
            CellData::KeyFace(KeyFaceData { time, cycles })
        }
        CellType::InbetweenVertex => CellData::InbetweenVertex(InbetweenVertexData {
            before: parse_id(fields.required("BeforeVertex")?)?,
            after: parse_id(fields.required("AfterVertex")?)?,
        }),
        CellType::InbetweenEdge => match fields.text("BeforeCycle") {
            Some(before) => CellData::InbetweenEdge(InbetweenEdgeData::Closed {
                before_cycle: Cycle::from_legacy_string(before)?,
                after_cycle: Cycle::from_legacy_string(fields.required("AfterCycle")?)?,
            }),
            None => CellData::InbetweenEdge(InbetweenEdgeData::Open {
                before_path: Path::from_legacy_string(fields.required("BeforePath")?)?,
                after_path: Path::from_legacy_string(fields.required("AfterPath")?)?,
                start: AnimatedVertex::from_id_string(fields.required("StartAnimatedVertex")?)?,
                end: AnimatedVertex::from_id_string(fields.required("EndAnimatedVertex")?)?,
            }),
        },
        CellType::InbetweenFace => {
            let cycles = list_items(fields.required("Cycles")?)?
                .into_iter()
                .map(AnimatedCycle::from_legacy_string)
                .collect::<Result<Vec<_>>>()?;
            let faces = |name: &str| -> Result<CellSet> {
                match fields.text(name) {
                    Some(list) => list_items(list)?.into_iter().map(parse_id).collect(),
                    None => Ok(CellSet::new()),
                }
            };
            CellData::InbetweenFace(InbetweenFaceData {
                cycles,
                before_faces: faces("BeforeFaces")?,
                after_faces: faces("AfterFaces")?,
            })
        }
    };
    Ok(Cell::new(id, color, data))
}

// ------------------------------------------------------------------------
// Writer
// ------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LegacyWriter {
    out: String,
    indent: usize,
}

impl LegacyWriter {
    fn new_line(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    fn field(&mut self, name: &str, value: impl AsRef<str>) {
        self.new_line();
        self.out.push_str(name);
        self.out.push_str(" : ");
        self.out.push_str(value.as_ref());
    }

    fn open(&mut self, bracket: char) {
        self.new_line();
        self.out.push(bracket);
        self.indent += 1;
    }

    fn close(&mut self, bracket: char) {
        self.indent = self.indent.saturating_sub(1);
        self.new_line();
        self.out.push(bracket);
    }
}

fn legacy_list(items: impl IntoIterator<Item = String>) -> String {
    let items: Vec<String> = items.into_iter().collect();
    if items.is_empty() {
        "[ ]".to_string()
    } else {
        format!("[ {} ]", items.join(" , "))
    }
}

fn write_time(w: &mut LegacyWriter, time: Time) {
    if time != Time::default() {
        w.field("Time", time.to_legacy_string());
    }
}

fn write_cell(w: &mut LegacyWriter, cell: &Cell) {
    w.field("Type", cell.cell_type().legacy_name());
    w.field("ID", cell.id.to_string());
    w.field("Color", cell.color.to_legacy_string());
    match &cell.data {
        CellData::KeyVertex(v) => {
            write_time(w, v.time);
            w.field(
                "Pos",
                format!("({},{})", format_number(v.pos.x), format_number(v.pos.y)),
            );
            w.field("Size", format_number(v.size));
            w.field("TangentEdges", "[ ]");
        }
        CellData::KeyEdge(e) => {
            write_time(w, e.time);
            let id_or_none = |v: Option<CellId>| v.map_or_else(|| "-1".to_string(), |v| v.to_string());
            w.field("StartVertex", id_or_none(e.start));
            w.field("EndVertex", id_or_none(e.end));
            w.field("Geometry", "");
            w.open('{');
            w.field("Type", "LinearSpline");
            w.field("NumVertices", e.geometry.samples().len().to_string());
            let mut vertices = String::from("[ ");
            for s in e.geometry.samples() {
                vertices.push_str(&format!(
                    "({},{},{}) ",
                    format_number(s.x),
                    format_number(s.y),
                    format_number(s.width)
                ));
            }
            vertices.push(']');
            w.field("Vertices", vertices);
            w.close('}');
        }
        CellData::KeyFace(f) => {
            write_time(w, f.time);
            w.field("Cycles", legacy_list(f.cycles.iter().map(|c| c.to_legacy_string())));
        }
        CellData::InbetweenVertex(v) => {
            w.field("BeforeVertex", v.before.to_string());
            w.field("AfterVertex", v.after.to_string());
        }
        CellData::InbetweenEdge(InbetweenEdgeData::Open {
            before_path,
            after_path,
            start,
            end,
        }) => {
            w.field("BeforePath", before_path.to_legacy_string());
            w.field("AfterPath", after_path.to_legacy_string());
            w.field("StartAnimatedVertex", start.to_legacy_string());
            w.field("EndAnimatedVertex", end.to_legacy_string());
        }
        CellData::InbetweenEdge(InbetweenEdgeData::Closed {
            before_cycle,
            after_cycle,
        }) => {
            w.field("BeforeCycle", before_cycle.to_legacy_string());
            w.field("AfterCycle", after_cycle.to_legacy_string());
        }
        CellData::InbetweenFace(f) => {
            w.field("Cycles", legacy_list(f.cycles.iter().map(|c| c.to_legacy_string())));
            w.field("BeforeFaces", legacy_list(f.before_faces.iter().map(|c| c.to_string())));
            w.field("AfterFaces", legacy_list(f.after_faces.iter().map(|c| c.to_string())));
        }
    }
}

impl Vac {
    /// Legacy text document holding every cell in depth order.
    pub fn to_legacy_string(&self) -> String {
        let mut w = LegacyWriter::default();
        w.field("Version", "1.0");
        w.field("Scene", "");
        w.open('{');
        w.field("Cells", "");
        w.open('[');
        for id in self.zordering.iter() {
            if let Some(cell) = self.cells.get(&id) {
                w.open('{');
                write_cell(&mut w, cell);
                w.close('}');
            }
        }
        w.close(']');
        w.close('}');
        w.out.push('\n');
        w.out
    }

    pub fn from_legacy_str(text: &str) -> Result<Vac> {
        Self::from_legacy_str_with_settings(text, Settings::default())
    }

    pub fn from_legacy_str_with_settings(text: &str, settings: Settings) -> Result<Vac> {
        let mut vac = Vac::with_settings(settings);
        vac.load_legacy_str(text)?;
        Ok(vac)
    }

    /// Replaces the content of the complex with a legacy text document.
    /// The `Cells` list may sit at top level or inside a `Scene` block.
    pub fn load_legacy_str(&mut self, text: &str) -> Result<()> {
        let doc = document(text)?;
        if let Some(version) = doc.text("Version") {
            tracing::debug!(version, "reading legacy document");
        }
        let cells = match (doc.get("Cells"), doc.block("Scene").and_then(|s| s.get("Cells"))) {
            (Some(v), _) | (None, Some(v)) => v,
            (None, None) => return Err(Error::Parse("legacy document without cells".to_string())),
        };
        let blocks: &[Fields<'_>] = match cells {
            Value::Blocks(b) => b,
            Value::Text(t) => {
                if !list_items(t)?.is_empty() {
                    return Err(Error::Parse("invalid cell list".to_string()));
                }
                &[]
            }
            Value::Block(_) => return Err(Error::Parse("invalid cell list".to_string())),
        };
        let ds = self.settings.ds;
        let vertex_size = self.settings.edge_width * VERTEX_SIZE_RATIO;
        let cells = blocks
            .iter()
            .map(|b| read_cell(b, ds, vertex_size))
            .collect::<Result<Vec<_>>>()?;
        self.load_cells(cells)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn parses_nested_fields() {
        let doc = document(
            "Version : 1.0\nScene : { Cells : [ { Type : KeyVertex ID : 3 Pos : (1,2) } ] }",
        )
        .unwrap();
        assert_eq!(doc.text("Version"), Some("1.0"));
        let scene = doc.block("Scene").unwrap();
        let Some(Value::Blocks(cells)) = scene.get("Cells") else {
            panic!("cells not parsed as blocks");
        };
        assert_eq!(cells[0].text("Type"), Some("KeyVertex"));
        assert_eq!(cells[0].text("Pos"), Some("(1,2)"));
    }

    #[test]
    fn raw_values_stop_at_next_field() {
        let doc = document("Color : 0 0.5 1 1 Time : ExactFrame 4 Cycles : [ -1 [ (3,1) , (4,0) ] ]")
            .unwrap();
        assert_eq!(doc.text("Color"), Some("0 0.5 1 1"));
        assert_eq!(doc.text("Time"), Some("ExactFrame 4"));
        assert_eq!(doc.text("Cycles"), Some("[ -1 [ (3,1) , (4,0) ] ]"));
    }

    #[test]
    fn list_items_respect_nesting() {
        assert_eq!(
            list_items("[ -1 [ (3,1) , (4,0) ] , 7 [ ] ]").unwrap(),
            vec!["-1 [ (3,1) , (4,0) ]", "7 [ ]"]
        );
        assert!(list_items("[ ]").unwrap().is_empty());
        assert!(list_items("3 4").is_err());
    }

    #[test]
    fn key_cells_round_trip() {
        let mut vac = Vac::new();
        let t = Time::frame(2);
        let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, Vector2::new(40.0, 0.0));
        let c = vac.new_key_vertex(t, Vector2::new(20.0, 30.0));
        let e1 = vac.new_key_edge(a, b).unwrap();
        let e2 = vac.new_key_edge(b, c).unwrap();
        let e3 = vac.new_key_edge(c, a).unwrap();
        let set: CellSet = [e1, e2, e3].into_iter().collect();
        let cycle = Cycle::from_edge_set(&vac, &set);
        let f = vac.new_key_face_with_cycle(cycle).unwrap();

        let text = vac.to_legacy_string();
        assert!(text.contains("Type : KeyFace"));
        assert!(text.contains("Time : ExactFrame 2"));

        let loaded = Vac::from_legacy_str(&text).unwrap();
        assert_eq!(loaded.cell_ids(), vac.cell_ids());
        assert_eq!(loaded.zordering().as_slice(), vac.zordering().as_slice());
        assert!(loaded.spatial_star(e2).contains(&f));
        assert_eq!(loaded.key_face(f).unwrap().time(), t);
        assert_relative_eq!(loaded.key_vertex(c).unwrap().pos().y, 30.0);
        assert_relative_eq!(
            loaded.key_vertex(c).unwrap().size(),
            vac.key_vertex(c).unwrap().size()
        );
        assert_eq!(
            loaded.key_edge(e1).unwrap().geometry().len(),
            vac.key_edge(e1).unwrap().geometry().len()
        );
        assert!(loaded.check());
    }

    #[test]
    fn inbetween_cells_round_trip() {
        let mut vac = Vac::new();
        let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(Time::frame(0), Vector2::new(10.0, 0.0));
        let e1 = vac.new_key_edge(a, b).unwrap();
        let c = vac.new_key_vertex(Time::frame(6), Vector2::new(0.0, 20.0));
        let d = vac.new_key_vertex(Time::frame(6), Vector2::new(10.0, 20.0));
        let e2 = vac.new_key_edge(c, d).unwrap();
        let ie = vac.inbetween_edges(e1, e2).unwrap();

        let text = vac.to_legacy_string();
        assert!(text.contains("StartAnimatedVertex"));
        let loaded = Vac::from_legacy_str(&text).unwrap();
        assert_eq!(loaded.cell_ids(), vac.cell_ids());
        let edge = loaded.inbetween_edge(ie).unwrap();
        assert!(!edge.is_closed());
        assert_eq!(
            edge.start_animated_vertex().map(|v| v.to_id_string()),
            vac.inbetween_edge(ie).unwrap().start_animated_vertex().map(|v| v.to_id_string())
        );
        assert_eq!(loaded.before_cells(ie), vac.before_cells(ie));
        assert!(loaded.check());
    }

    #[test]
    fn reads_old_names_and_defaults() {
        let text = "
            Cells :
            [
                {
                    Type : InstantVertex
                    ID : 5
                    Color : 0 0 0 1
                    Pos : (1.5,-2)
                    TangentEdges : [ ]
                }
                {
                    Type : InstantEdge
                    ID : 6
                    Color : 1 0 0 1
                    StartVertex : -1
                    EndVertex : -1
                    Geometry :
                    {
                        Type : LinearSpline
                        NumVertices : 3
                        Vertices : [ (0,0,2) (10,0,2) (5,8,2) ]
                    }
                }
            ]";
        let vac = Vac::from_legacy_str(text).unwrap();
        assert_eq!(vac.len(), 2);
        let v = vac.key_vertex(CellId(5)).unwrap();
        assert_eq!(v.time(), Time::frame(0));
        assert_relative_eq!(v.pos().y, -2.0);
        assert_relative_eq!(v.size(), vac.settings().edge_width * VERTEX_SIZE_RATIO);
        let e = vac.key_edge(CellId(6)).unwrap();
        assert!(e.is_closed());
        assert!(e.geometry().is_closed());
        assert_eq!(vac.next_id(), CellId(7));
    }

    #[test]
    fn vertex_count_mismatch_is_an_error() {
        let text = "Cells : [ { Type : KeyEdge ID : 1 StartVertex : -1 EndVertex : -1
            Geometry : { Type : LinearSpline NumVertices : 4 Vertices : [ (0,0,2) (1,0,2) ] } } ]";
        assert!(Vac::from_legacy_str(text).is_err());
    }

    #[test]
    fn truncated_document_fails() {
        assert!(Vac::from_legacy_str("Cells : [ { Type : KeyVertex ID : 1").is_err());
        assert!(Vac::from_legacy_str("Version : 1.0").is_err());
    }

    #[test]
    fn empty_cell_list_loads() {
        let vac = Vac::from_legacy_str("Version : 1.0\nScene :\n{\n    Cells : [ ]\n}").unwrap();
        assert!(vac.is_empty());
    }
}
