// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use nalgebra::Vector2;
use vac_lite_complex::{
    AnimatedCycle, CellId, CellSet, CellType, Cycle, KeyHalfedge, Notification, Operator, Time, Vac,
};
use vac_lite_geometry::LinearSpline;

fn triangle_face(vac: &mut Vac, t: Time, points: [(f64, f64); 3]) -> (Vec<CellId>, CellId) {
    let v: Vec<CellId> = points
        .iter()
        .map(|(x, y)| vac.new_key_vertex(t, Vector2::new(*x, *y)))
        .collect();
    let hs = (0..3)
        .map(|i| KeyHalfedge::new(vac.new_key_edge(v[i], v[(i + 1) % 3]).unwrap(), true))
        .collect();
    let cycle = Cycle::from_halfedges(vac, hs);
    let f = vac.new_key_face_with_cycle(cycle).unwrap();
    (v, f)
}

fn ring(r: f64) -> LinearSpline {
    let pts: Vec<Vector2<f64>> = (0..32)
        .map(|i| {
            let a = i as f64 / 32.0 * std::f64::consts::TAU;
            Vector2::new(r * a.cos(), r * a.sin())
        })
        .collect();
    LinearSpline::from_points(&pts, 2.0)
}

#[test]
fn glue_then_unglue_gives_each_face_its_corner() {
    let mut vac = Vac::new();
    let t = Time::frame(0);
    let (v1, f1) = triangle_face(&mut vac, t, [(0.0, 0.0), (100.0, 0.0), (50.0, 80.0)]);
    let (v2, f2) = triangle_face(&mut vac, t, [(100.0, 0.0), (200.0, 0.0), (150.0, 80.0)]);

    let shared = vac.glue_vertices(v1[1], v2[0]).unwrap();
    assert_eq!(vac.key_vertices(t).len(), 5);
    assert_eq!(vac.n_uses_vertex(shared), 2);
    assert!(vac.contains(f1) && vac.contains(f2));
    assert!(vac.check());

    let copies = vac.unglue_vertex(shared);
    assert_eq!(copies.len(), 2);
    assert!(!vac.contains(shared));
    assert_eq!(vac.key_vertices(t).len(), 6);
    for c in &copies {
        assert_eq!(vac.n_uses_vertex(*c), 1);
        let p = vac.key_vertex(*c).unwrap().pos();
        assert_relative_eq!(p.x, 100.0, epsilon = 1e-9);
    }
    // Each face now owns one copy
    let faces_of = |v: CellId| -> CellSet {
        vac.star(v)
            .into_iter()
            .filter(|c| vac.cell_type(*c) == Some(CellType::KeyFace))
            .collect()
    };
    let owners: CellSet = copies.iter().flat_map(|c| faces_of(*c)).collect();
    assert_eq!(owners, [f1, f2].into_iter().collect());
    assert!(vac.check());
}

#[test]
fn ids_are_never_reused() {
    let mut vac = Vac::new();
    let t = Time::frame(0);
    let a = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
    let b = vac.new_key_vertex(t, Vector2::new(10.0, 0.0));
    let e = vac.new_key_edge(a, b).unwrap();
    vac.delete_cell(a);
    // The edge depends on the vertex and goes with it
    assert!(!vac.contains(e));
    assert!(vac.contains(b));

    vac.delete_all_cells();
    assert!(vac.is_empty());
    let c = vac.new_key_vertex(t, Vector2::new(0.0, 0.0));
    assert!(c > e);
    assert_eq!(vac.next_id(), CellId(c.raw() + 1));
}

#[test]
fn keyframing_edge_splits_it_in_three() {
    let mut vac = Vac::new();
    let (t0, t1) = (Time::frame(0), Time::frame(10));
    let a0 = vac.new_key_vertex(t0, Vector2::new(0.0, 0.0));
    let b0 = vac.new_key_vertex(t0, Vector2::new(100.0, 0.0));
    let a1 = vac.new_key_vertex(t1, Vector2::new(0.0, 50.0));
    let b1 = vac.new_key_vertex(t1, Vector2::new(100.0, 50.0));
    let e0 = vac.new_key_edge(a0, b0).unwrap();
    let e1 = vac.new_key_edge(a1, b1).unwrap();
    let se = vac.inbetween_edges(e0, e1).unwrap();
    let before = vac.len();

    let t = Time::frame(4);
    let ke = vac.keyframe_edge(se, t).unwrap();
    assert!(!vac.contains(se));
    assert_eq!(vac.cell_type(ke), Some(CellType::KeyEdge));
    assert!(vac.is_at(ke, t));
    // Edge: 1 -> 3. Each end vertex: 1 -> 3
    assert_eq!(vac.len(), before + 2 + 2 * 2);
    let halves: Vec<CellId> = vac.temporal_star(ke).into_iter().collect();
    assert_eq!(halves.len(), 2);
    for h in halves {
        assert_eq!(vac.cell_type(h), Some(CellType::InbetweenEdge));
    }
    let start = vac.key_edge(ke).unwrap().start_vertex().unwrap();
    assert_relative_eq!(vac.key_vertex(start).unwrap().pos().y, 20.0, epsilon = 1e-9);
    assert!(vac.check());
}

#[test]
fn keyframing_face_keyframes_its_boundary() {
    let mut vac = Vac::new();
    let (t0, t1) = (Time::frame(0), Time::frame(6));
    let r0 = vac.new_closed_key_edge(t0, ring(50.0));
    let r1 = vac.new_closed_key_edge(t1, ring(70.0));
    let ir = vac.inbetween_edges(r0, r1).unwrap();
    let f0 = vac
        .new_key_face_with_cycle(Cycle::from_halfedges(&vac, vec![KeyHalfedge::new(r0, true)]))
        .unwrap();
    let f1 = vac
        .new_key_face_with_cycle(Cycle::from_halfedges(&vac, vec![KeyHalfedge::new(r1, true)]))
        .unwrap();
    let animated = AnimatedCycle::from_id_string(&format!(
        "[1:({}+,1,1,_,2) 2:({}+,2,2,1,3) 3:({}+,3,3,2,_)]",
        r0, ir, r1
    ))
    .unwrap();
    let sf = vac
        .new_inbetween_face(vec![animated], [f0].into_iter().collect(), [f1].into_iter().collect())
        .unwrap();
    assert!(vac.check());
    assert_eq!(vac.len(), 6);

    let t = Time::frame(3);
    let kf = vac.keyframe_face(sf, t).unwrap();
    assert!(!vac.contains(sf) && !vac.contains(ir));
    // Face and closed edge each become three cells
    assert_eq!(vac.len(), 10);
    let cycles = vac.key_face(kf).unwrap().cycles();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].len(), 1);
    let ke = cycles[0].halfedges()[0].edge;
    assert!(vac.is_at(ke, t));
    assert!(vac.is_closed_edge(ke));
    assert_eq!(vac.temporal_star(kf).len(), 2);
    assert!(vac.check());
}

#[test]
fn inbetween_selection_connects_two_edges() {
    let mut vac = Vac::new();
    let a0 = vac.new_key_vertex(Time::frame(0), Vector2::new(0.0, 0.0));
    let b0 = vac.new_key_vertex(Time::frame(0), Vector2::new(10.0, 0.0));
    let a1 = vac.new_key_vertex(Time::frame(8), Vector2::new(0.0, 10.0));
    let b1 = vac.new_key_vertex(Time::frame(8), Vector2::new(10.0, 10.0));
    let e0 = vac.new_key_edge(a0, b0).unwrap();
    let e1 = vac.new_key_edge(a1, b1).unwrap();
    vac.set_selected_cells(&[e0, e1].into_iter().collect(), true);

    let se = vac.inbetween_selection().unwrap();
    assert_eq!(vac.cell_type(se), Some(CellType::InbetweenEdge));
    assert!(vac.exists(se, Time::frame(4)));
    assert!(!vac.exists(se, Time::frame(8)));
    // The end vertices got their own inbetween vertices. The edge itself
    // also starts at them through its before path.
    for v in [a0, b0] {
        let after = vac.temporal_star_after(v);
        assert!(after.contains(&se));
        let sweeps = after
            .iter()
            .filter(|c| vac.cell_type(**c) == Some(CellType::InbetweenVertex))
            .count();
        assert_eq!(sweeps, 1);
    }
    assert!(vac.selected_cells().is_empty());
    assert!(vac.check());
}

#[test]
fn smart_delete_uncuts_shared_edge() {
    let mut vac = Vac::new();
    let t = Time::frame(0);
    let p = [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)];
    let v: Vec<CellId> = p.iter().map(|(x, y)| vac.new_key_vertex(t, Vector2::new(*x, *y))).collect();
    let hs = (0..4)
        .map(|i| KeyHalfedge::new(vac.new_key_edge(v[i], v[(i + 1) % 4]).unwrap(), true))
        .collect();
    let cycle = Cycle::from_halfedges(&vac, hs);
    let f = vac.new_key_face_with_cycle(cycle).unwrap();
    let diagonal = vac.new_key_edge(v[1], v[3]).unwrap();
    assert!(vac.cut_face(f, diagonal));

    vac.set_selected_cell(diagonal, true);
    vac.smart_delete();
    assert!(!vac.contains(diagonal));
    assert_eq!(vac.key_faces(t).len(), 1);
    assert!(vac.check());
}

#[test]
fn edits_notify_observers() {
    let mut vac = Vac::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    vac.add_observer(move |n: Notification| sink.borrow_mut().push(n));

    let t = Time::frame(0);
    let (_, f) = triangle_face(&mut vac, t, [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]);
    seen.borrow_mut().clear();

    vac.set_selected_cell(f, false);
    assert_eq!(seen.borrow().as_slice(), &[Notification::SelectionChanged]);

    seen.borrow_mut().clear();
    vac.delete_selected_cells();
    let seen = seen.borrow();
    // One aggregated selection change, then the edit notifications
    assert_eq!(
        seen.iter().filter(|n| **n == Notification::SelectionChanged).count(),
        1
    );
    assert!(seen.contains(&Notification::Checkpoint));
    assert!(seen.contains(&Notification::Changed));
}

#[test]
fn untrusted_operator_validates_after_run() {
    let mut vac = Vac::new();
    let t = Time::frame(0);
    triangle_face(&mut vac, t, [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]);

    let (created, report) = Operator::new("add vertex").run(&mut vac, |vac| {
        vac.new_key_vertex(Time::frame(0), Vector2::new(5.0, 5.0))
    });
    assert!(vac.contains(created));
    assert!(report.checked);
    assert!(report.is_valid());

    let (_, report) = Operator::new("noop").trusted().run(&mut vac, |_| ());
    assert!(!report.checked);
    assert!(vac.check());
}

#[test]
fn copy_paste_shifts_key_times() {
    let mut vac = Vac::new();
    let (v, f) = triangle_face(&mut vac, Time::frame(0), [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]);
    vac.set_selected_cell(f, true);
    let clipboard = vac.copy(Time::frame(0)).unwrap();
    let map = vac.paste(&clipboard, Time::frame(3));

    // Face, three edges, three vertices
    assert_eq!(map.len(), 7);
    let pasted = map[&f];
    assert_eq!(vac.key_face(pasted).unwrap().time(), Time::frame(3));
    assert_eq!(vac.key_vertex(map[&v[0]]).unwrap().time(), Time::frame(3));
    assert!(vac.is_selected(pasted));
    assert!(!vac.is_selected(f));
    assert_eq!(vac.len(), 14);
    assert!(vac.check());
}
