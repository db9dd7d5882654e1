// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;
use nalgebra::Vector2;
use vac_lite_complex::{CellId, CellSet, CellType, Color, Cycle, KeyHalfedge, Time, Vac};

/// A triangle at frames 0 and 10, its edges inbetweened, and a hole
/// vertex in the first face.
fn animated_scene() -> Vac {
    let mut vac = Vac::new();
    let mut edges = Vec::new();
    for (t, dy) in [(Time::frame(0), 0.0), (Time::frame(10), 30.0)] {
        let v: Vec<CellId> = [(0.0, 0.0), (100.0, 0.0), (50.0, 80.0)]
            .iter()
            .map(|(x, y)| vac.new_key_vertex(t, Vector2::new(*x, *y + dy)))
            .collect();
        let e: Vec<CellId> = (0..3)
            .map(|i| vac.new_key_edge(v[i], v[(i + 1) % 3]).unwrap())
            .collect();
        let hs = e.iter().map(|e| KeyHalfedge::new(*e, true)).collect();
        let cycle = Cycle::from_halfedges(&vac, hs);
        let f = vac.new_key_face_with_cycle(cycle).unwrap();
        vac.set_color(f, Color::new(0.2, 0.4, 0.6, 0.8));
        edges.push(e);
    }
    for i in 0..3 {
        vac.inbetween_edges(edges[0][i], edges[1][i]).unwrap();
    }
    let face = vac.key_faces(Time::frame(0)).into_iter().next().unwrap();
    vac.cut_face_at_vertex(face, 50.0, 20.0).unwrap();
    vac.set_background_color(Color::new(1.0, 1.0, 0.9, 1.0));
    vac
}

/// Type and full boundary of every cell.
fn topology(vac: &Vac) -> Vec<(CellId, Option<CellType>, CellSet)> {
    vac.cell_ids()
        .into_iter()
        .map(|id| (id, vac.cell_type(id), vac.boundary(id)))
        .collect()
}

fn assert_same_complex(a: &Vac, b: &Vac) {
    assert_eq!(topology(a), topology(b));
    assert_eq!(a.zordering().as_slice(), b.zordering().as_slice());
    for id in a.vertices() {
        if let (Some(va), Some(vb)) = (a.key_vertex(id), b.key_vertex(id)) {
            assert_relative_eq!(va.pos().x, vb.pos().x, epsilon = 1e-9);
            assert_relative_eq!(va.pos().y, vb.pos().y, epsilon = 1e-9);
        }
    }
    for id in a.edges() {
        if let (Some(ea), Some(eb)) = (a.key_edge(id), b.key_edge(id)) {
            assert_relative_eq!(ea.geometry().length(), eb.geometry().length(), epsilon = 1e-6);
        }
    }
    assert!(b.check());
}

#[test]
fn xml_document_round_trip() {
    let vac = animated_scene();
    assert!(vac.check());
    let text = vac.to_xml_string().unwrap();
    let loaded = Vac::from_xml_str(&text).unwrap();
    assert_same_complex(&vac, &loaded);
    assert_eq!(loaded.next_id(), vac.next_id());
    assert_relative_eq!(loaded.background_color().b, 0.9, epsilon = 1e-9);
}

#[test]
fn legacy_text_round_trip() {
    let vac = animated_scene();
    let text = vac.to_legacy_string();
    let loaded = Vac::from_legacy_str(&text).unwrap();
    assert_same_complex(&vac, &loaded);
    // The text format has no background
    assert_eq!(loaded.background_color(), Vac::new().background_color());
}

#[test]
fn json_snapshot_round_trip() {
    let vac = animated_scene();
    let json = vac.to_json().unwrap();
    let loaded = Vac::from_json(&json).unwrap();
    assert_same_complex(&vac, &loaded);
    assert_relative_eq!(loaded.background_color().b, 0.9, epsilon = 1e-9);
}

#[test]
fn formats_convert_into_each_other() {
    let vac = animated_scene();
    let from_xml = Vac::from_xml_str(&vac.to_xml_string().unwrap()).unwrap();
    let from_legacy = Vac::from_legacy_str(&from_xml.to_legacy_string()).unwrap();
    let from_json = Vac::from_json(&from_legacy.to_json().unwrap()).unwrap();
    assert_same_complex(&vac, &from_json);
}

#[test]
fn loaded_complex_keeps_editing() {
    let vac = animated_scene();
    let mut loaded = Vac::from_xml_str(&vac.to_xml_string().unwrap()).unwrap();
    let fresh = loaded.new_key_vertex(Time::frame(0), Vector2::new(500.0, 500.0));
    assert!(vac.cell_ids().iter().all(|id| *id < fresh));

    // Keyframing an inbetween edge after loading works on resolved ids
    let se = loaded
        .cell_ids()
        .into_iter()
        .find(|c| loaded.cell_type(*c) == Some(CellType::InbetweenEdge))
        .unwrap();
    assert!(loaded.keyframe_edge(se, Time::frame(5)).is_some());
    assert!(loaded.check());
}
