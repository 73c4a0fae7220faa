//! Kernel tessellation of one trimmed face.
//!
//! The boundary comes from the shared edge meshes. Loops are ear-clipped
//! in a parameter plane scaled by the surface's mean speeds, then
//! triangles violating the criteria are refined: the longest interior
//! edge is bisected, or a centroid is inserted when the longest edge is on
//! the boundary. Boundary edges are never split, which keeps the patch
//! conforming to its neighbours.

use super::edge::ensure_edge_mesh;
use super::mesh::{FaceMesh, ModelMesh};
use super::triangulate::{bridge_holes, delaunay_flips, ear_clip, edge_key, ring_area};
use crate::config::TessellationCriteria;
use crate::math::{angle_between, Point2, Point3, Vector3};
use crate::surface::Surface;
use crate::topo::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

const MAX_PASSES: usize = 24;
const MAX_FACE_VERTICES: usize = 50_000;
const FLIP_SWEEPS: usize = 8;

struct LocalVertex {
    uv: Point2,
    scaled: Point2,
    point_id: u32,
    position: Point3,
    normal: Vector3,
}

struct Patch<'a> {
    surface: &'a Surface,
    speeds: (f64, f64),
    vertices: Vec<LocalVertex>,
}

impl Patch<'_> {
    fn push(&mut self, uv: Point2, point_id: u32, position: Point3) -> usize {
        self.vertices.push(LocalVertex {
            uv,
            scaled: Point2::new(uv.x * self.speeds.0, uv.y * self.speeds.1),
            point_id,
            position,
            normal: self.surface.normal(uv.x, uv.y),
        });
        self.vertices.len() - 1
    }

    /// New interior vertex on the surface at `uv`.
    fn insert(&mut self, mesh: &mut ModelMesh, uv: Point2) -> usize {
        let position = self.surface.evaluate(uv.x, uv.y);
        let id = mesh.add_point(position);
        self.push(uv, id, position)
    }

    fn scaled_points(&self) -> Vec<Point2> {
        self.vertices.iter().map(|v| v.scaled).collect()
    }

    fn needs_refinement(
        &self,
        tri: [usize; 3],
        boundary: &HashSet<(usize, usize)>,
        criteria: &TessellationCriteria,
    ) -> bool {
        let v = tri.map(|i| &self.vertices[i]);
        for k in 0..3 {
            if angle_between(&v[k].normal, &v[(k + 1) % 3].normal) > criteria.normal_tolerance {
                return true;
            }
        }

        let uv = Point2::from((v[0].uv.coords + v[1].uv.coords + v[2].uv.coords) / 3.0);
        let flat = Point3::from((v[0].position.coords + v[1].position.coords + v[2].position.coords) / 3.0);
        if (self.surface.evaluate(uv.x, uv.y) - flat).norm() > criteria.chord_tolerance {
            return true;
        }

        for k in 0..3 {
            let (a, b) = (tri[k], tri[(k + 1) % 3]);
            if boundary.contains(&edge_key(a, b)) {
                continue;
            }
            let (va, vb) = (&self.vertices[a], &self.vertices[b]);
            if criteria.too_long((va.position - vb.position).norm()) {
                return true;
            }
            let mid = Point2::from((va.uv.coords + vb.uv.coords) * 0.5);
            let flat = Point3::from((va.position.coords + vb.position.coords) * 0.5);
            if (self.surface.evaluate(mid.x, mid.y) - flat).norm() > criteria.chord_tolerance {
                return true;
            }
        }
        false
    }

    fn longest_edge(&self, tri: [usize; 3]) -> usize {
        (0..3)
            .max_by(|&i, &j| {
                let li = (self.vertices[tri[i]].scaled - self.vertices[tri[(i + 1) % 3]].scaled).norm_squared();
                let lj = (self.vertices[tri[j]].scaled - self.vertices[tri[(j + 1) % 3]].scaled).norm_squared();
                li.total_cmp(&lj)
            })
            .unwrap_or(0)
    }

    /// Split triangles until every one meets the criteria, the element
    /// size floor is reached, or the budget runs out.
    fn refine(
        &mut self,
        mesh: &mut ModelMesh,
        triangles: &mut Vec<[usize; 3]>,
        boundary: &HashSet<(usize, usize)>,
        criteria: &TessellationCriteria,
    ) {
        let floor = 2.0 * criteria.min_element_size;
        for _ in 0..MAX_PASSES {
            let mut owner: HashMap<(usize, usize), usize> = HashMap::with_capacity(triangles.len() * 3);
            for (t, tri) in triangles.iter().enumerate() {
                for k in 0..3 {
                    owner.insert((tri[k], tri[(k + 1) % 3]), t);
                }
            }

            let count = triangles.len();
            let mut touched = vec![false; count];
            let mut splits = 0;
            for t in 0..count {
                if touched[t] || !self.needs_refinement(triangles[t], boundary, criteria) {
                    continue;
                }
                let tri = triangles[t];
                let k = self.longest_edge(tri);
                let (a, b, c) = (tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]);
                let longest = (self.vertices[a].position - self.vertices[b].position).norm();
                if longest < floor {
                    continue;
                }

                if boundary.contains(&edge_key(a, b)) {
                    let uv = (self.vertices[a].uv.coords
                        + self.vertices[b].uv.coords
                        + self.vertices[c].uv.coords)
                        / 3.0;
                    let m = self.insert(mesh, Point2::from(uv));
                    triangles[t] = [a, b, m];
                    triangles.push([b, c, m]);
                    triangles.push([c, a, m]);
                    touched[t] = true;
                } else {
                    let Some(&u) = owner.get(&(b, a)) else { continue };
                    if u >= count || touched[u] {
                        continue;
                    }
                    let Some(&d) = triangles[u].iter().find(|&&x| x != a && x != b) else {
                        continue;
                    };
                    let uv = (self.vertices[a].uv.coords + self.vertices[b].uv.coords) * 0.5;
                    let m = self.insert(mesh, Point2::from(uv));
                    triangles[t] = [a, m, c];
                    triangles.push([m, b, c]);
                    triangles[u] = [b, m, d];
                    triangles.push([m, a, d]);
                    touched[t] = true;
                    touched[u] = true;
                }
                splits += 1;
                if self.vertices.len() >= MAX_FACE_VERTICES {
                    break;
                }
            }

            if splits == 0 {
                return;
            }
            let points = self.scaled_points();
            delaunay_flips(&points, triangles, boundary, FLIP_SWEEPS);
            if self.vertices.len() >= MAX_FACE_VERTICES {
                warn!(vertices = self.vertices.len(), "face refinement budget exhausted");
                return;
            }
        }
    }
}

/// Triangulate one face. Returns `None` when its boundary cannot be
/// triangulated.
pub(super) fn tessellate_face(
    mesh: &mut ModelMesh,
    model: &Model,
    face: FaceId,
    orientation: Orientation,
) -> Option<FaceMesh> {
    let criteria = mesh.criteria;
    let surface = model.face_surface(face);
    let mut patch = Patch {
        surface,
        speeds: surface.mean_speeds(),
        vertices: Vec::new(),
    };

    let mut rings: Vec<Vec<usize>> = Vec::new();
    for &lp in &model.face(face).loops {
        let mut ring: Vec<usize> = Vec::new();
        for oe in &model.loops[lp].edges {
            if !model.edge(oe.edge).is_active() {
                continue;
            }
            let edge_mesh = ensure_edge_mesh(mesh, model, oe.edge);
            let curve = &model.edge(oe.edge).curve;
            let mut entries: Vec<(f64, u32)> = edge_mesh
                .params
                .iter()
                .copied()
                .zip(edge_mesh.point_ids.iter().copied())
                .collect();
            if oe.orientation == Orientation::Back {
                entries.reverse();
            }
            for &(t, id) in &entries[..entries.len() - 1] {
                if ring.last().is_some_and(|&last| patch.vertices[last].point_id == id) {
                    continue;
                }
                ring.push(patch.push(curve.uv(t), id, mesh.point(id)));
            }
        }
        while ring.len() > 1 && patch.vertices[ring[0]].point_id == patch.vertices[ring[ring.len() - 1]].point_id {
            ring.pop();
        }
        rings.push(ring);
    }

    let patch_id = model.face(face).patch_id;
    let points = patch.scaled_points();
    let mut rings = rings.into_iter();
    let mut outer = rings.next().unwrap_or_default();
    if outer.len() < 3 {
        warn!(patch_id, "face skipped: outer boundary has fewer than 3 points");
        return None;
    }
    if ring_area(&points, &outer) < 0.0 {
        outer.reverse();
    }
    let holes: Vec<Vec<usize>> = rings
        .filter(|r| r.len() >= 3)
        .map(|mut r| {
            if ring_area(&points, &r) > 0.0 {
                r.reverse();
            }
            r
        })
        .collect();

    let mut boundary = HashSet::new();
    for ring in std::iter::once(&outer).chain(&holes) {
        for i in 0..ring.len() {
            boundary.insert(edge_key(ring[i], ring[(i + 1) % ring.len()]));
        }
    }

    let ring = bridge_holes(&points, outer, holes);
    let mut triangles = ear_clip(&points, &ring);
    if triangles.is_empty() {
        warn!(patch_id, "face skipped: boundary could not be triangulated");
        return None;
    }
    if triangles.len() + 2 < ring.len() {
        debug!(patch_id, missing = ring.len() - 2 - triangles.len(), "triangulation incomplete");
    }

    patch.refine(mesh, &mut triangles, &boundary, &criteria);

    let sign = if orientation.is_front() { 1.0 } else { -1.0 };
    let face_data = model.face(face);
    Some(FaceMesh {
        patch_id,
        material_slot: face_data.material_slot,
        point_ids: patch.vertices.iter().map(|v| v.point_id).collect(),
        normals: patch.vertices.iter().map(|v| v.normal * sign).collect(),
        uvs: patch.vertices.iter().map(|v| v.uv).collect(),
        triangles: triangles
            .into_iter()
            .map(|[a, b, c]| {
                if orientation.is_front() {
                    [a as u32, b as u32, c as u32]
                } else {
                    [a as u32, c as u32, b as u32]
                }
            })
            .collect(),
    })
}
