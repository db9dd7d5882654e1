// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end editing sessions on a fresh complex.

use std::collections::BTreeSet;

use approx::assert_relative_eq;
use nalgebra::Vector2;
use vac_lite_complex::sketch::SketchFaces;
use vac_lite_complex::{CellId, CellSet, Time, Vac};
use vac_lite_geometry::LinearSpline;

fn polygon(vac: &mut Vac, t: Time, points: &[(f64, f64)]) -> (Vec<CellId>, Vec<CellId>) {
    let vertices: Vec<CellId> = points
        .iter()
        .map(|(x, y)| vac.new_key_vertex(t, Vector2::new(*x, *y)))
        .collect();
    let n = vertices.len();
    let edges = (0..n)
        .map(|i| vac.new_key_edge(vertices[i], vertices[(i + 1) % n]).unwrap())
        .collect();
    (vertices, edges)
}

fn select_only(vac: &mut Vac, cells: &[CellId]) {
    let set: CellSet = cells.iter().copied().collect();
    vac.set_selected_cells(&set, true);
}

fn edges_of_face(vac: &Vac, face: CellId) -> BTreeSet<CellId> {
    vac.key_face(face).unwrap().cycles()[0]
        .halfedges()
        .iter()
        .map(|h| h.edge)
        .collect()
}

#[test]
fn triangle_selection_becomes_face() {
    let mut vac = Vac::new();
    let t = Time::frame(0);
    let (_, edges) = polygon(&mut vac, t, &[(0.0, 0.0), (100.0, 0.0), (50.0, 80.0)]);
    select_only(&mut vac, &edges);

    let face = vac.create_face().expect("face from triangle");
    assert_eq!(vac.key_faces(t).len(), 1);
    let cycles = vac.key_face(face).unwrap().cycles();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].len(), 3);
    assert_eq!(edges_of_face(&vac, face), edges.iter().copied().collect());
    assert!(vac.check());
}

// A diagonal of a triangle joins two adjacent corners, so the cut is
// shown on a square where both halves are triangles.
#[test]
fn diagonal_cuts_face_in_two() {
    let mut vac = Vac::new();
    let t = Time::frame(0);
    let (v, edges) = polygon(&mut vac, t, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
    select_only(&mut vac, &edges);
    let face = vac.create_face().unwrap();

    let diagonal = vac.new_key_edge(v[0], v[2]).unwrap();
    assert!(vac.cut_face(face, diagonal));
    assert!(!vac.contains(face));

    let faces = vac.key_faces(t);
    assert_eq!(faces.len(), 2);
    for f in &faces {
        let cycles = vac.key_face(*f).unwrap().cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 3);
        assert!(edges_of_face(&vac, *f).contains(&diagonal));
    }
    assert!(vac.check());
}

#[test]
fn uncut_diagonal_restores_face() {
    let mut vac = Vac::new();
    let t = Time::frame(0);
    let (v, edges) = polygon(&mut vac, t, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
    select_only(&mut vac, &edges);
    let face = vac.create_face().unwrap();
    let diagonal = vac.new_key_edge(v[0], v[2]).unwrap();
    assert!(vac.cut_face(face, diagonal));

    select_only(&mut vac, &[diagonal]);
    assert!(vac.uncut());
    assert!(!vac.contains(diagonal));

    let faces = vac.key_faces(t);
    assert_eq!(faces.len(), 1);
    let merged = *faces.iter().next().unwrap();
    assert_eq!(vac.key_face(merged).unwrap().cycles().len(), 1);
    assert_eq!(edges_of_face(&vac, merged), edges.iter().copied().collect());
    assert_eq!(vac.key_edges(t).len(), 4);
    assert_eq!(vac.key_vertices(t).len(), 4);
    assert!(vac.check());
}

#[test]
fn inbetween_vertex_stays_between_its_keys() {
    let mut vac = Vac::new();
    let a = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
    let b = vac.new_key_vertex(Time::frame(5), Vector2::new(100.0, 40.0));
    let sv = vac.new_inbetween_vertex(a, b).unwrap();

    let t = Time::from_float(2.5);
    assert!(vac.exists(sv, t));
    let p = vac.vertex_pos(sv, t);
    assert!(p.x > 0.0 && p.x < 100.0);
    assert!(p.y > 0.0 && p.y < 40.0);
    // Both tangents follow the chord, so the cubic is the segment
    assert_relative_eq!(p.x, 50.0, epsilon = 1e-9);
    assert_relative_eq!(p.y, 20.0, epsilon = 1e-9);

    let linear = vac.pos_linear(sv, t);
    assert_relative_eq!(linear.x, 50.0, epsilon = 1e-9);

    // Clamped outside the interval
    let before = vac.vertex_pos(sv, Time::from_float(-3.0));
    assert_relative_eq!(before.x, 0.0, epsilon = 1e-9);
    assert!(!vac.exists(sv, Time::frame(0)));
    assert!(!vac.exists(sv, Time::frame(5)));
}

// The stroke starts and ends at (20, 0). Ends that meet are only merged
// into a closed edge when the stroke has no other split point, so here the
// ends stay a vertex of their own and the right lobe is two edges through
// it rather than a second loop at the crossing.
#[test]
fn figure_eight_stroke_splits_at_crossing() {
    let mut vac = Vac::new();
    let t = Time::frame(0);
    let points: Vec<Vector2<f64>> = [
        (20.0, 0.0),
        (10.0, 10.0),
        (-10.0, -10.0),
        (-20.0, 0.0),
        (-10.0, 10.0),
        (10.0, -10.0),
        (20.0, 0.0),
    ]
    .iter()
    .map(|(x, y)| Vector2::new(*x, *y))
    .collect();
    let mut stroke = LinearSpline::from_points(&points, 3.0);
    stroke.resample_with(2.0);

    let res = vac.insert_sketched_edge(&stroke, t, 1e-2, &SketchFaces::default());
    let crossing = res
        .vertices
        .iter()
        .copied()
        .find(|v| vac.key_vertex(*v).unwrap().pos().norm() < 0.1)
        .expect("vertex at the self-intersection");

    // Two sub-loops meet at the crossing: one closes on itself, the other
    // runs through the stroke ends and back
    let loops: Vec<CellId> = res
        .edges
        .iter()
        .copied()
        .filter(|e| {
            let d = vac.key_edge(*e).unwrap();
            d.start_vertex() == Some(crossing) && d.end_vertex() == Some(crossing)
        })
        .collect();
    assert_eq!(loops.len(), 1);
    let others: Vec<CellId> = res.edges.iter().copied().filter(|e| !loops.contains(e)).collect();
    assert_eq!(others.len(), 2);
    for e in &others {
        let d = vac.key_edge(*e).unwrap();
        assert!(d.start_vertex() == Some(crossing) || d.end_vertex() == Some(crossing));
    }
    assert!(vac.check());
}
