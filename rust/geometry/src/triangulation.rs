// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation utilities
//!
//! Faces are bounded by any number of closed contours and filled with the
//! even-odd rule. Contours are grouped by nesting depth: even depths are
//! outer boundaries, odd depths are holes of their innermost container.
//! Each group is handed to earcutr.

use crate::triangles::Triangles;
use crate::{Error, Result, Vector2};

/// Whether every corner of the contour turns the same way. Collinear
/// corners are ignored.
#[inline]
fn is_convex(points: &[Vector2<f64>]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut turns = (0..n).filter_map(|i| {
        let d1 = points[(i + 1) % n] - points[i];
        let d2 = points[(i + 2) % n] - points[(i + 1) % n];
        let z = d1.perp(&d2);
        (z.abs() > 1e-10).then_some(z > 0.0)
    });
    match turns.next() {
        Some(first) => turns.all(|left| left == first),
        None => true,
    }
}

/// Signed area of a closed polygon (positive when counter-clockwise).
pub fn signed_area(points: &[Vector2<f64>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let p = &points[i];
        let q = &points[(i + 1) % n];
        acc += p.x * q.y - q.x * p.y;
    }
    0.5 * acc
}

/// Even-odd containment of `p` in a single closed polygon.
pub fn point_in_polygon(points: &[Vector2<f64>], p: Vector2<f64>) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (&points[i], &points[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let x = pj.x + (p.y - pj.y) * (pi.x - pj.x) / (pi.y - pj.y);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Even-odd containment of `p` in the region bounded by all `contours`.
pub fn point_in_contours(contours: &[Vec<Vector2<f64>>], p: Vector2<f64>) -> bool {
    contours
        .iter()
        .filter(|c| point_in_polygon(c, p))
        .count()
        % 2
        == 1
}

/// Drops consecutive duplicates and the closing duplicate of a contour.
fn cleaned(contour: &[Vector2<f64>]) -> Vec<Vector2<f64>> {
    let mut res: Vec<Vector2<f64>> = Vec::with_capacity(contour.len());
    for p in contour {
        if !p.x.is_finite() || !p.y.is_finite() {
            continue;
        }
        if res.last().map_or(true, |q| (p - q).norm_squared() > 1e-20) {
            res.push(*p);
        }
    }
    while res.len() > 1 {
        let (first, last) = (res[0], res[res.len() - 1]);
        if (first - last).norm_squared() > 1e-20 {
            break;
        }
        res.pop();
    }
    res
}

/// Simple fan triangulation for convex polygons
#[inline]
fn fan_triangulate(points: &[Vector2<f64>], out: &mut Triangles) {
    for i in 1..points.len() - 1 {
        let (a, b, c) = (points[0], points[i], points[i + 1]);
        out.append(a.x, a.y, b.x, b.y, c.x, c.y);
    }
}

/// Triangulate one outer contour with its holes using earcutr.
fn triangulate_group(
    outer: &[Vector2<f64>],
    holes: &[&Vec<Vector2<f64>>],
    out: &mut Triangles,
) -> Result<()> {
    if holes.is_empty() && is_convex(outer) {
        fan_triangulate(outer, out);
        return Ok(());
    }

    let total = outer.len() + holes.iter().map(|h| h.len()).sum::<usize>();
    let mut coords = Vec::with_capacity(total * 2);
    let mut points = Vec::with_capacity(total);
    for p in outer {
        coords.push(p.x);
        coords.push(p.y);
        points.push(*p);
    }
    let mut hole_indices = Vec::with_capacity(holes.len());
    for hole in holes {
        hole_indices.push(points.len());
        for p in hole.iter() {
            coords.push(p.x);
            coords.push(p.y);
            points.push(*p);
        }
    }

    let indices = earcutr::earcut(&coords, &hole_indices, 2)
        .map_err(|e| Error::TriangulationError(format!("{:?}", e)))?;

    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (points[tri[0]], points[tri[1]], points[tri[2]]);
        out.append(a.x, a.y, b.x, b.y, c.x, c.y);
    }
    Ok(())
}

/// Triangulate the even-odd region bounded by closed contours.
///
/// Contours with fewer than three distinct points are ignored.
pub fn triangulate_contours(contours: &[Vec<Vector2<f64>>]) -> Result<Triangles> {
    let contours: Vec<Vec<Vector2<f64>>> = contours
        .iter()
        .map(|c| cleaned(c))
        .filter(|c| c.len() >= 3 && signed_area(c).abs() > 1e-12)
        .collect();

    let mut out = Triangles::new();
    let n = contours.len();
    if n == 0 {
        return Ok(out);
    }

    // Containment is decided by the first point of each contour.
    let areas: Vec<f64> = contours.iter().map(|c| signed_area(c).abs()).collect();
    let mut containers: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in 0..n {
            if i != j && areas[j] >= areas[i] && point_in_polygon(&contours[j], contours[i][0]) {
                containers[i].push(j);
            }
        }
    }

    let depth: Vec<usize> = containers.iter().map(|c| c.len()).collect();
    let mut holes: Vec<Vec<&Vec<Vector2<f64>>>> = vec![Vec::new(); n];
    for i in 0..n {
        if depth[i] % 2 == 1 {
            // Innermost container is the one with the smallest area.
            let parent = containers[i].iter().copied().min_by(|&a, &b| {
                areas[a]
                    .partial_cmp(&areas[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            if let Some(parent) = parent {
                holes[parent].push(&contours[i]);
            }
        }
    }

    for i in 0..n {
        if depth[i] % 2 == 0 {
            if let Err(e) = triangulate_group(&contours[i], &holes[i], &mut out) {
                tracing::warn!(error = %e, contour = i, "Skipping contour that failed to triangulate");
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Vector2<f64>> {
        vec![
            Vector2::new(x0, y0),
            Vector2::new(x0 + size, y0),
            Vector2::new(x0 + size, y0 + size),
            Vector2::new(x0, y0 + size),
        ]
    }

    #[test]
    fn convex_uses_fan() {
        let tris = triangulate_contours(&[square(0.0, 0.0, 10.0)]).unwrap();
        assert_eq!(tris.len(), 2);
        assert_relative_eq!(tris.area(), 100.0);
    }

    #[test]
    fn nested_square_is_hole() {
        let tris =
            triangulate_contours(&[square(0.0, 0.0, 10.0), square(3.0, 3.0, 4.0)]).unwrap();
        assert_relative_eq!(tris.area(), 84.0, epsilon = 1e-9);
        assert!(!tris.contains(Vector2::new(5.0, 5.0)));
        assert!(tris.contains(Vector2::new(1.0, 1.0)));
    }

    #[test]
    fn island_inside_hole_is_filled() {
        let contours = [
            square(0.0, 0.0, 10.0),
            square(2.0, 2.0, 6.0),
            square(4.0, 4.0, 2.0),
        ];
        let tris = triangulate_contours(&contours).unwrap();
        assert_relative_eq!(tris.area(), 100.0 - 36.0 + 4.0, epsilon = 1e-9);
        assert!(tris.contains(Vector2::new(5.0, 5.0)));
    }

    #[test]
    fn closing_duplicate_is_dropped() {
        let mut c = square(0.0, 0.0, 1.0);
        c.push(c[0]);
        let tris = triangulate_contours(&[c]).unwrap();
        assert_eq!(tris.len(), 2);
    }

    #[test]
    fn even_odd_point_test() {
        let contours = vec![square(0.0, 0.0, 10.0), square(3.0, 3.0, 4.0)];
        assert!(point_in_contours(&contours, Vector2::new(1.0, 1.0)));
        assert!(!point_in_contours(&contours, Vector2::new(5.0, 5.0)));
        assert!(!point_in_contours(&contours, Vector2::new(20.0, 5.0)));
    }

    #[test]
    fn signed_area_orientation() {
        let mut s = square(0.0, 0.0, 2.0);
        assert_relative_eq!(signed_area(&s), 4.0);
        s.reverse();
        assert_relative_eq!(signed_area(&s), -4.0);
    }
}
