//! Grid tessellation.
//!
//! Subdivides the parameter rectangle bounding a face's loops into
//! triangles, refining where the chord deviation, edge length or normal
//! deviation exceed the criteria, and where a triangle straddles a trim
//! loop. Triangles whose centroid lies outside the trimmed region are
//! dropped, so trims come out as a staircase at the finest level. Faces
//! share no points, which makes this the fast, approximate back-end.

use super::mesh::{FaceMesh, ModelMesh};
use super::triangulate::orient;
use crate::config::TessellationCriteria;
use crate::math::{angle_between, Point2, Vector3, PARAM_TOL};
use crate::surface::Surface;
use crate::topo::*;
use std::collections::HashMap;

/// Samples per edge of the loop polygons that clip the grid.
const TRIM_SAMPLES: usize = 8;

/// Number of knot spans in `knots` between the clamped ends.
fn span_count(knots: &[f64], degree: usize) -> usize {
    let inner = &knots[degree..knots.len() - degree];
    inner.windows(2).filter(|w| w[1] - w[0] > PARAM_TOL).count().max(1)
}

/// Whether segments `ab` and `cd` cross at a point interior to both, by
/// more than `eps` in orientation terms.
fn segments_cross(a: &Point2, b: &Point2, c: &Point2, d: &Point2, eps: f64) -> bool {
    let (d1, d2) = (orient(a, b, c), orient(a, b, d));
    let (d3, d4) = (orient(c, d, a), orient(c, d, b));
    let apart = |x: f64, y: f64| (x > eps && y < -eps) || (x < -eps && y > eps);
    apart(d1, d2) && apart(d3, d4)
}

/// Whether some trim loop passes through the interior of triangle `abc`.
/// Loop points on a triangle side do not count.
fn straddles(polygons: &[Vec<Point2>], tri: [&Point2; 3]) -> bool {
    let [a, b, c] = tri;
    let area = orient(a, b, c);
    let eps = area.abs() * 1e-9;
    let sign = area.signum();
    let sides = [(a, b), (b, c), (c, a)];
    polygons.iter().any(|polygon| {
        let n = polygon.len();
        (0..n).any(|i| {
            let p = &polygon[i];
            let q = &polygon[(i + 1) % n];
            let inside = sides.iter().all(|(s, t)| sign * orient(s, t, p) > eps);
            inside || sides.iter().any(|(s, t)| segments_cross(s, t, p, q, eps))
        })
    })
}

struct Grid<'a> {
    surface: &'a Surface,
    polygons: Vec<Vec<Point2>>,
    front: bool,
    params: Vec<Point2>,
    point_ids: Vec<u32>,
    normals: Vec<Vector3>,
    midpoints: HashMap<(u32, u32), u32>,
}

impl Grid<'_> {
    fn add_vertex(&mut self, mesh: &mut ModelMesh, uv: Point2) -> u32 {
        let pt = self.surface.evaluate(uv.x, uv.y);
        let mut n = self.surface.normal(uv.x, uv.y);
        if !self.front {
            n = -n;
        }
        let idx = self.params.len() as u32;
        self.params.push(uv);
        self.point_ids.push(mesh.add_point(pt));
        self.normals.push(n);
        idx
    }

    /// Get or add the midpoint vertex between two existing vertices.
    fn midpoint(&mut self, mesh: &mut ModelMesh, i0: u32, i1: u32) -> u32 {
        let key = if i0 < i1 { (i0, i1) } else { (i1, i0) };
        if let Some(&m) = self.midpoints.get(&key) {
            return m;
        }
        let uv = Point2::from((self.params[i0 as usize].coords + self.params[i1 as usize].coords) * 0.5);
        let m = self.add_vertex(mesh, uv);
        self.midpoints.insert(key, m);
        m
    }

    /// Check if a triangle needs refinement based on chord deviation, edge
    /// length and normal deviation.
    fn should_refine(&self, mesh: &ModelMesh, tri: [u32; 3], criteria: &TessellationCriteria) -> bool {
        if straddles(&self.polygons, tri.map(|i| &self.params[i as usize])) {
            return true;
        }
        let edges = [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])];
        for &(ia, ib) in &edges {
            let (ia, ib) = (ia as usize, ib as usize);
            let pa = mesh.point(self.point_ids[ia]);
            let pb = mesh.point(self.point_ids[ib]);
            let edge_len = (pa - pb).norm();
            if edge_len < 2.0 * criteria.min_element_size {
                continue;
            }
            if criteria.too_long(edge_len) {
                return true;
            }
            if angle_between(&self.normals[ia], &self.normals[ib]) > criteria.normal_tolerance {
                return true;
            }

            // Compare the surface midpoint with the linear midpoint.
            let mid = (self.params[ia].coords + self.params[ib].coords) * 0.5;
            let surface_mid = self.surface.evaluate(mid.x, mid.y);
            let linear_mid = (pa.coords + pb.coords) * 0.5;
            if (surface_mid.coords - linear_mid).norm() > criteria.chord_tolerance {
                return true;
            }
        }
        false
    }
}

/// Tessellate one face on a refined parameter grid.
pub(super) fn tessellate_face(
    mesh: &mut ModelMesh,
    model: &Model,
    face: FaceId,
    orientation: Orientation,
    base_subdivisions: usize,
    max_passes: usize,
) -> Option<FaceMesh> {
    let polygons = model.face_uv_polygons(face, TRIM_SAMPLES);
    let (u_range, v_range) = polygon_bounds(&polygons)?;
    let surface = model.face_surface(face);
    let nurbs = surface.nurbs();
    let nu = base_subdivisions.max(1) * span_count(&nurbs.knots_u, nurbs.degree_u);
    let nv = base_subdivisions.max(1) * span_count(&nurbs.knots_v, nurbs.degree_v);
    let front = orientation.is_front();
    let criteria = mesh.criteria;

    let mut grid = Grid {
        surface,
        polygons,
        front,
        params: Vec::with_capacity((nu + 1) * (nv + 1)),
        point_ids: Vec::with_capacity((nu + 1) * (nv + 1)),
        normals: Vec::with_capacity((nu + 1) * (nv + 1)),
        midpoints: HashMap::new(),
    };

    // Phase 1: initial grid
    for iv in 0..=nv {
        let v = v_range.0 + (v_range.1 - v_range.0) * iv as f64 / nv as f64;
        for iu in 0..=nu {
            let u = u_range.0 + (u_range.1 - u_range.0) * iu as f64 / nu as f64;
            grid.add_vertex(mesh, Point2::new(u, v));
        }
    }

    // Phase 2: two triangles per cell
    let mut triangles: Vec<[u32; 3]> = Vec::with_capacity(nu * nv * 2);
    for iv in 0..nv {
        for iu in 0..nu {
            let i00 = (iv * (nu + 1) + iu) as u32;
            let i10 = i00 + 1;
            let i01 = i00 + (nu + 1) as u32;
            let i11 = i01 + 1;
            if front {
                triangles.push([i00, i10, i11]);
                triangles.push([i00, i11, i01]);
            } else {
                triangles.push([i00, i11, i10]);
                triangles.push([i00, i01, i11]);
            }
        }
    }

    // Phase 3: split offending triangles in four
    for _ in 0..max_passes {
        let mut refined = Vec::with_capacity(triangles.len());
        let mut any_refined = false;
        for &tri in &triangles {
            if grid.should_refine(mesh, tri, &criteria) {
                any_refined = true;
                let [i0, i1, i2] = tri;
                let m01 = grid.midpoint(mesh, i0, i1);
                let m12 = grid.midpoint(mesh, i1, i2);
                let m20 = grid.midpoint(mesh, i2, i0);
                refined.push([i0, m01, m20]);
                refined.push([m01, i1, m12]);
                refined.push([m20, m12, i2]);
                refined.push([m01, m12, m20]);
            } else {
                refined.push(tri);
            }
        }
        triangles = refined;
        if !any_refined {
            break;
        }
    }

    // Phase 4: keep the triangles inside the trimmed region
    triangles.retain(|tri| {
        let [a, b, c] = tri.map(|i| grid.params[i as usize]);
        let centroid = Point2::from((a.coords + b.coords + c.coords) / 3.0);
        point_in_polygons(&grid.polygons, &centroid)
    });
    if triangles.is_empty() {
        return None;
    }

    let mut remap = vec![u32::MAX; grid.params.len()];
    let mut face_mesh = FaceMesh {
        patch_id: model.face(face).patch_id,
        material_slot: model.face(face).material_slot,
        point_ids: Vec::new(),
        normals: Vec::new(),
        uvs: Vec::new(),
        triangles: Vec::with_capacity(triangles.len()),
    };
    for tri in &triangles {
        let local = tri.map(|i| {
            let i = i as usize;
            if remap[i] == u32::MAX {
                remap[i] = face_mesh.point_ids.len() as u32;
                face_mesh.point_ids.push(grid.point_ids[i]);
                face_mesh.normals.push(grid.normals[i]);
                face_mesh.uvs.push(grid.params[i]);
            }
            remap[i]
        });
        face_mesh.triangles.push(local);
    }
    Some(face_mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straddling_needs_a_loop_through_the_interior() {
        let tri = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)];
        let tri = [&tri[0], &tri[1], &tri[2]];
        let boundary = vec![vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]];
        assert!(!straddles(&boundary, tri));
        let hole = vec![vec![
            Point2::new(0.1, 0.1),
            Point2::new(0.1, 0.2),
            Point2::new(0.2, 0.2),
            Point2::new(0.2, 0.1),
        ]];
        assert!(straddles(&hole, tri));
        let crossing = vec![vec![Point2::new(-1.0, 0.5), Point2::new(2.0, 0.5), Point2::new(2.0, 3.0)]];
        assert!(straddles(&crossing, tri));
    }

    #[test]
    fn spans_ignore_repeated_knots() {
        assert_eq!(span_count(&[0.0, 0.0, 1.0, 1.0], 1), 1);
        assert_eq!(span_count(&[0.0, 0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 1.0], 2), 2);
    }
}
