//! Planar triangulation of trimmed parameter-plane polygons.
//!
//! Holes are bridged into the outer ring, the ring is ear-clipped, and
//! the result can be improved by Delaunay edge flips. Polygons refer to
//! points by index so that bridged rings may visit a point twice.

use crate::math::Point2;
use std::collections::{HashMap, HashSet};

/// Twice the signed area of triangle `abc`; positive when counter-clockwise.
#[inline]
pub fn orient(a: &Point2, b: &Point2, c: &Point2) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Signed area of a ring of point indices.
pub fn ring_area(points: &[Point2], ring: &[usize]) -> f64 {
    let n = ring.len();
    let mut area = 0.0;
    for i in 0..n {
        let a = points[ring[i]];
        let b = points[ring[(i + 1) % n]];
        area += a.x * b.y - b.x * a.y;
    }
    area * 0.5
}

/// Area tolerance scaled to the extent of `points`.
pub fn area_epsilon(points: &[Point2]) -> f64 {
    let (mut lo, mut hi) = (Point2::new(f64::MAX, f64::MAX), Point2::new(f64::MIN, f64::MIN));
    for p in points {
        lo = Point2::new(lo.x.min(p.x), lo.y.min(p.y));
        hi = Point2::new(hi.x.max(p.x), hi.y.max(p.y));
    }
    let diag = (hi - lo).norm_squared();
    if diag.is_finite() {
        diag * 1e-14
    } else {
        0.0
    }
}

/// Splice clockwise `holes` into the counter-clockwise `outer` ring.
///
/// Holes are taken right to left. Each is joined through a bridge from its
/// rightmost point to the closest ring point the bridge can reach without
/// crossing any boundary.
pub fn bridge_holes(points: &[Point2], outer: Vec<usize>, mut holes: Vec<Vec<usize>>) -> Vec<usize> {
    let rightmost = |hole: &[usize]| {
        (0..hole.len())
            .max_by(|&a, &b| {
                let (pa, pb) = (points[hole[a]], points[hole[b]]);
                pa.x.total_cmp(&pb.x).then(pb.y.total_cmp(&pa.y))
            })
            .unwrap_or(0)
    };
    holes.retain(|h| h.len() >= 3);
    holes.sort_by(|a, b| {
        let xa = points[a[rightmost(a)]].x;
        let xb = points[b[rightmost(b)]].x;
        xb.total_cmp(&xa)
    });

    let mut ring = outer;
    for h in 0..holes.len() {
        let hole = &holes[h];
        let m = rightmost(hole);
        let pm = points[hole[m]];

        let mut order: Vec<usize> = (0..ring.len()).collect();
        order.sort_by(|&a, &b| {
            let da = (points[ring[a]] - pm).norm_squared();
            let db = (points[ring[b]] - pm).norm_squared();
            da.total_cmp(&db).then(a.cmp(&b))
        });
        let visible = |k: usize| {
            let pk = points[ring[k]];
            let blocked_by = |r: &[usize]| {
                (0..r.len()).any(|i| {
                    let (a, b) = (r[i], r[(i + 1) % r.len()]);
                    a != ring[k]
                        && b != ring[k]
                        && a != hole[m]
                        && b != hole[m]
                        && segments_cross(&pm, &pk, &points[a], &points[b])
                })
            };
            !blocked_by(&ring) && holes[h..].iter().all(|other| !blocked_by(other))
        };
        let k = order.iter().copied().find(|&k| visible(k)).unwrap_or(order[0]);

        let mut spliced = Vec::with_capacity(ring.len() + hole.len() + 2);
        spliced.extend_from_slice(&ring[..=k]);
        spliced.extend(hole[m..].iter().chain(&hole[..m]).copied());
        spliced.push(hole[m]);
        spliced.extend_from_slice(&ring[k..]);
        ring = spliced;
    }
    ring
}

/// Proper crossing of segments `pq` and `ab` (touching does not count).
fn segments_cross(p: &Point2, q: &Point2, a: &Point2, b: &Point2) -> bool {
    let d1 = orient(p, q, a);
    let d2 = orient(p, q, b);
    let d3 = orient(a, b, p);
    let d4 = orient(a, b, q);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

/// Ear-clip a counter-clockwise ring into counter-clockwise triangles.
///
/// When no proper ear is left, the most convex corner is clipped anyway so
/// that the whole ring is always consumed.
pub fn ear_clip(points: &[Point2], ring: &[usize]) -> Vec<[usize; 3]> {
    let n = ring.len();
    if n < 3 {
        return vec![];
    }
    let eps = area_epsilon(points);
    let mut indices: Vec<usize> = ring.to_vec();
    let mut result = Vec::with_capacity(n - 2);

    while indices.len() > 3 {
        let len = indices.len();
        let mut ear = None;
        let mut most_convex = (f64::MIN, 0);
        for i in 0..len {
            let prev = indices[(i + len - 1) % len];
            let curr = indices[i];
            let next = indices[(i + 1) % len];
            let cross = orient(&points[prev], &points[curr], &points[next]);
            if cross > most_convex.0 {
                most_convex = (cross, i);
            }
            if is_ear(points, &indices, prev, curr, next, cross, eps) {
                ear = Some(i);
                break;
            }
        }

        let i = match ear {
            Some(i) => i,
            None if most_convex.0 > 0.0 => most_convex.1,
            None => break,
        };
        let len = indices.len();
        result.push([indices[(i + len - 1) % len], indices[i], indices[(i + 1) % len]]);
        indices.remove(i);
    }

    if indices.len() == 3 {
        let (a, b, c) = (indices[0], indices[1], indices[2]);
        if orient(&points[a], &points[b], &points[c]) > 0.0 {
            result.push([a, b, c]);
        }
    }
    result
}

fn is_ear(
    points: &[Point2],
    indices: &[usize],
    prev: usize,
    curr: usize,
    next: usize,
    cross: f64,
    eps: f64,
) -> bool {
    if cross <= eps {
        return false;
    }
    let (a, b, c) = (points[prev], points[curr], points[next]);
    indices
        .iter()
        .filter(|&&idx| idx != prev && idx != curr && idx != next)
        .all(|&idx| !point_in_triangle(&points[idx], &a, &b, &c))
}

/// Inside or on the boundary of triangle `abc`.
fn point_in_triangle(p: &Point2, a: &Point2, b: &Point2, c: &Point2) -> bool {
    let d1 = orient(b, a, p);
    let d2 = orient(c, b, p);
    let d3 = orient(a, c, p);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Positive when `d` lies inside the circumcircle of counter-clockwise `abc`.
fn in_circle(a: &Point2, b: &Point2, c: &Point2, d: &Point2) -> f64 {
    let (adx, ady) = (a.x - d.x, a.y - d.y);
    let (bdx, bdy) = (b.x - d.x, b.y - d.y);
    let (cdx, cdy) = (c.x - d.x, c.y - d.y);
    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;
    adx * (bdy * cd - bd * cdy) - ady * (bdx * cd - bd * cdx) + ad * (bdx * cdy - bdy * cdx)
}

/// Unordered key of an edge.
#[inline]
pub fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Flip non-`fixed` edges until the triangulation is locally Delaunay or
/// `max_sweeps` sweeps ran. Returns the number of flips.
pub fn delaunay_flips(
    points: &[Point2],
    triangles: &mut [[usize; 3]],
    fixed: &HashSet<(usize, usize)>,
    max_sweeps: usize,
) -> usize {
    let eps = area_epsilon(points);
    let diag2 = eps * 1e14;
    let circle_eps = diag2 * diag2 * 1e-12;
    let mut flips = 0;
    for _ in 0..max_sweeps {
        let mut owner: HashMap<(usize, usize), usize> = HashMap::with_capacity(triangles.len() * 3);
        for (t, tri) in triangles.iter().enumerate() {
            for k in 0..3 {
                owner.insert((tri[k], tri[(k + 1) % 3]), t);
            }
        }

        let mut touched = vec![false; triangles.len()];
        let mut swept = 0;
        for t in 0..triangles.len() {
            for k in 0..3 {
                if touched[t] {
                    break;
                }
                let [a, b, c] = [
                    triangles[t][k],
                    triangles[t][(k + 1) % 3],
                    triangles[t][(k + 2) % 3],
                ];
                if a > b || fixed.contains(&edge_key(a, b)) {
                    continue;
                }
                let Some(&u) = owner.get(&(b, a)) else { continue };
                if touched[u] || u == t {
                    continue;
                }
                let Some(&d) = triangles[u].iter().find(|&&v| v != a && v != b) else {
                    continue;
                };
                let (pa, pb, pc, pd) = (&points[a], &points[b], &points[c], &points[d]);
                if in_circle(pa, pb, pc, pd) <= circle_eps {
                    continue;
                }
                if orient(pa, pd, pc) <= eps || orient(pd, pb, pc) <= eps {
                    continue;
                }
                triangles[t] = [a, d, c];
                triangles[u] = [d, b, c];
                touched[t] = true;
                touched[u] = true;
                swept += 1;
            }
        }
        flips += swept;
        if swept == 0 {
            break;
        }
    }
    flips
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn total_area(points: &[Point2], tris: &[[usize; 3]]) -> f64 {
        tris.iter()
            .map(|t| orient(&points[t[0]], &points[t[1]], &points[t[2]]) * 0.5)
            .sum()
    }

    #[test]
    fn square_gives_two_triangles() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let tris = ear_clip(&points, &[0, 1, 2, 3]);
        assert_eq!(tris.len(), 2);
        assert_relative_eq!(total_area(&points, &tris), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn concave_polygon() {
        // L-shape
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        let tris = ear_clip(&points, &[0, 1, 2, 3, 4, 5]);
        assert_eq!(tris.len(), 4);
        assert_relative_eq!(total_area(&points, &tris), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn square_with_hole() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 3.0),
            Point2::new(3.0, 3.0),
            Point2::new(3.0, 1.0),
        ];
        let ring = bridge_holes(&points, vec![0, 1, 2, 3], vec![vec![4, 5, 6, 7]]);
        assert_eq!(ring.len(), 10);
        let tris = ear_clip(&points, &ring);
        assert_eq!(tris.len(), 8);
        assert_relative_eq!(total_area(&points, &tris), 12.0, epsilon = 1e-12);
    }

    #[test]
    fn flips_restore_delaunay_diagonal() {
        // Long thin rhombus triangulated along its long diagonal.
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, -0.5),
            Point2::new(4.0, 0.0),
            Point2::new(2.0, 0.5),
        ];
        let mut tris = vec![[0, 1, 2], [0, 2, 3]];
        let fixed: HashSet<_> = [(0, 1), (1, 2), (2, 3), (0, 3)].into_iter().collect();
        assert_eq!(delaunay_flips(&points, &mut tris, &fixed, 4), 1);
        assert!(tris.iter().all(|t| t.contains(&1) && t.contains(&3)));
        assert_relative_eq!(total_area(&points, &tris), 2.0, epsilon = 1e-12);
    }
}
