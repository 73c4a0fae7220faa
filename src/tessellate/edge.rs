//! Edge discretization.
//!
//! Edge ends are welded into corners first, so that every edge meeting at
//! a corner starts or ends on the same point. An edge is then discretized
//! once and its twin reuses the same points, projected onto its own curve.

use super::mesh::{EdgeMesh, ModelMesh};
use crate::config::TessellationCriteria;
use crate::curve::RestrictionCurve;
use crate::math::{angle_between, Point3, PARAM_TOL};
use crate::nurbs::NurbsCurve2;
use crate::surface::Surface;
use crate::topo::*;
use std::collections::HashMap;

/// Bisection depth limit per seed span.
const MAX_DEPTH: usize = 16;

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        // Keep the earlier node as root so corner order follows face order.
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[hi] = lo;
    }
}

/// Weld the ends of every edge of `faces` into corners.
///
/// Consecutive edges of a loop share a corner, and so do the matching
/// ends of twin edges. Corners already known to `mesh` keep their points.
pub(super) fn weld_corners(mesh: &mut ModelMesh, model: &Model, faces: &[(ShellId, OrientedFace)]) {
    let mut nodes: Vec<(EdgeId, bool)> = Vec::new();
    let mut index: HashMap<(EdgeId, bool), usize> = HashMap::new();
    let mut parent: Vec<usize> = Vec::new();
    let mut node = |end: (EdgeId, bool), nodes: &mut Vec<(EdgeId, bool)>, parent: &mut Vec<usize>| {
        *index.entry(end).or_insert_with(|| {
            nodes.push(end);
            parent.push(parent.len());
            parent.len() - 1
        })
    };

    for (_, oriented) in faces {
        for &lp in &model.face(oriented.face).loops {
            let edges: Vec<OrientedEdge> = model.loops[lp]
                .edges
                .iter()
                .copied()
                .filter(|oe| model.edge(oe.edge).is_active())
                .collect();
            for (i, oe) in edges.iter().enumerate() {
                let next = edges[(i + 1) % edges.len()];
                let end = node((oe.edge, oe.orientation.is_front()), &mut nodes, &mut parent);
                let start = node((next.edge, !next.orientation.is_front()), &mut nodes, &mut parent);
                union(&mut parent, end, start);

                let Some(twin) = model.edge(oe.edge).twin else { continue };
                let same = model.same_direction(oe.edge, twin);
                for here in [false, true] {
                    let a = node((oe.edge, here), &mut nodes, &mut parent);
                    let b = node((twin, if same { here } else { !here }), &mut nodes, &mut parent);
                    union(&mut parent, a, b);
                }
            }
        }
    }

    let mut classes: Vec<Vec<usize>> = Vec::new();
    let mut class_of: HashMap<usize, usize> = HashMap::new();
    for i in 0..nodes.len() {
        let root = find(&mut parent, i);
        let next = classes.len();
        let c = *class_of.entry(root).or_insert(next);
        if c == classes.len() {
            classes.push(Vec::new());
        }
        classes[c].push(i);
    }

    for members in classes {
        let ends: Vec<(u32, bool)> = members
            .iter()
            .map(|&i| (model.edge(nodes[i].0).serial, nodes[i].1))
            .collect();
        match ends.iter().find_map(|&end| mesh.corner(end)) {
            Some(id) => {
                for &end in &ends {
                    mesh.extend_corner(id, end);
                }
            }
            None => {
                let (edge, at_end) = nodes[members[0]];
                let (start, end) = model.edge_end_points(edge);
                let id = mesh.add_point(if at_end { end } else { start });
                mesh.add_corner(id, ends);
            }
        }
    }
}

/// Seed parameters: distinct knots, plus span midpoints above degree 1.
fn seed_parameters(curve: &NurbsCurve2) -> Vec<f64> {
    let (t0, t1) = curve.domain();
    let mut seeds: Vec<f64> = vec![t0];
    for &k in &curve.knots {
        if k > seeds[seeds.len() - 1] + PARAM_TOL && k < t1 - PARAM_TOL {
            seeds.push(k);
        }
    }
    seeds.push(t1);
    if curve.degree > 1 {
        let mut refined = Vec::with_capacity(seeds.len() * 2);
        for w in seeds.windows(2) {
            refined.push(w[0]);
            refined.push((w[0] + w[1]) * 0.5);
        }
        refined.push(t1);
        seeds = refined;
    }
    seeds
}

/// Distance from `p` to segment `ab`.
pub(super) fn distance_to_segment(p: &Point3, a: &Point3, b: &Point3) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= f64::EPSILON {
        return (p - a).norm();
    }
    let s = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * s)).norm()
}

fn needs_split(
    curve: &RestrictionCurve,
    surface: &Surface,
    criteria: &TessellationCriteria,
    t0: f64,
    t1: f64,
) -> bool {
    let at = |s: f64| curve.point(surface, t0 + (t1 - t0) * s);
    let (p0, pm, p1) = (at(0.0), at(0.5), at(1.0));
    let arc = (pm - p0).norm() + (p1 - pm).norm();
    if arc < 2.0 * criteria.min_element_size {
        return false;
    }
    if criteria.too_long((p1 - p0).norm()) {
        return true;
    }
    if [0.25, 0.5, 0.75].iter().any(|&s| {
        let q = if s == 0.5 { pm } else { at(s) };
        distance_to_segment(&q, &p0, &p1) > criteria.chord_tolerance
    }) {
        return true;
    }
    let (uv0, uv1) = (curve.uv(t0), curve.uv(t1));
    angle_between(&surface.normal(uv0.x, uv0.y), &surface.normal(uv1.x, uv1.y))
        > criteria.normal_tolerance
}

fn bisect(
    curve: &RestrictionCurve,
    surface: &Surface,
    criteria: &TessellationCriteria,
    t0: f64,
    t1: f64,
    depth: usize,
    out: &mut Vec<f64>,
) {
    if depth < MAX_DEPTH && needs_split(curve, surface, criteria, t0, t1) {
        let tm = (t0 + t1) * 0.5;
        bisect(curve, surface, criteria, t0, tm, depth + 1, out);
        bisect(curve, surface, criteria, tm, t1, depth + 1, out);
    } else {
        out.push(t1);
    }
}

/// Curve parameters of the discretization of `edge`, both ends included.
pub(super) fn discretize(model: &Model, edge: EdgeId, criteria: &TessellationCriteria) -> Vec<f64> {
    let curve = &model.edge(edge).curve;
    let surface = model.edge_surface(edge);
    let seeds = seed_parameters(&curve.curve);
    let mut params = vec![seeds[0]];
    for w in seeds.windows(2) {
        bisect(curve, surface, criteria, w[0], w[1], 0, &mut params);
    }
    params
}

/// Mesh of `to` built from the existing mesh of its twin `from`.
fn derive_from_twin(mesh: &ModelMesh, model: &Model, from: EdgeId, to: EdgeId) -> Option<EdgeMesh> {
    let source = mesh.edge_meshes.get(&model.edge(from).serial)?;
    let target = model.edge(to);
    let surface = model.edge_surface(to);
    let (t0, t1) = target.curve.domain();
    let n = source.params.len();
    let order: Vec<usize> = if model.same_direction(from, to) {
        (0..n).collect()
    } else {
        (0..n).rev().collect()
    };

    let mut params = Vec::with_capacity(n);
    let mut point_ids = Vec::with_capacity(n);
    for (k, &i) in order.iter().enumerate() {
        let id = source.point_ids[i];
        let t = if k == 0 {
            t0
        } else if k == n - 1 {
            t1
        } else {
            let t = target.curve.project(surface, &mesh.point(id));
            t.max(params[k - 1])
        };
        params.push(t);
        point_ids.push(id);
    }
    if let Some(id) = mesh.corner((target.serial, false)) {
        point_ids[0] = id;
    }
    if let Some(id) = mesh.corner((target.serial, true)) {
        point_ids[n - 1] = id;
    }
    Some(EdgeMesh {
        edge_serial: target.serial,
        params,
        point_ids,
    })
}

/// The mesh of `edge`, built on first use together with its twin's.
pub(super) fn ensure_edge_mesh(mesh: &mut ModelMesh, model: &Model, edge: EdgeId) -> EdgeMesh {
    let serial = model.edge(edge).serial;
    if let Some(existing) = mesh.edge_meshes.get(&serial) {
        return existing.clone();
    }
    let twin = model
        .edge(edge)
        .twin
        .filter(|&t| model.edges.get(t).is_some_and(Edge::is_active));
    if let Some(derived) = twin.and_then(|t| derive_from_twin(mesh, model, t, edge)) {
        mesh.edge_meshes.insert(serial, derived.clone());
        return derived;
    }

    let criteria = mesh.criteria;
    let params = discretize(model, edge, &criteria);
    let curve = &model.edge(edge).curve;
    let surface = model.edge_surface(edge);
    let (start, end) = curve.end_points(surface);
    let mut point_ids = Vec::with_capacity(params.len());
    for (i, &t) in params.iter().enumerate() {
        let id = if i == 0 {
            mesh.corner((serial, false)).unwrap_or_else(|| mesh.add_point(start))
        } else if i == params.len() - 1 {
            mesh.corner((serial, true)).unwrap_or_else(|| mesh.add_point(end))
        } else {
            mesh.add_point(curve.point(surface, t))
        };
        point_ids.push(id);
    }
    let built = EdgeMesh {
        edge_serial: serial,
        params,
        point_ids,
    };
    mesh.edge_meshes.insert(serial, built.clone());

    if let Some(twin) = twin {
        let twin_serial = model.edge(twin).serial;
        if !mesh.edge_meshes.contains_key(&twin_serial) {
            if let Some(derived) = derive_from_twin(mesh, model, edge, twin) {
                mesh.edge_meshes.insert(twin_serial, derived);
            }
        }
    }
    built
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn segment_distance() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(2.0, 0.0, 0.0);
        assert_relative_eq!(distance_to_segment(&Point3::new(1.0, 1.0, 0.0), &a, &b), 1.0);
        assert_relative_eq!(distance_to_segment(&Point3::new(3.0, 0.0, 0.0), &a, &b), 1.0);
    }

    #[test]
    fn seeds_of_linear_curve_are_its_ends() {
        let curve = NurbsCurve2::new(
            1,
            vec![0.0, 0.0, 1.0, 1.0],
            vec![crate::math::Point2::new(0.0, 0.0), crate::math::Point2::new(1.0, 0.0)],
            vec![1.0, 1.0],
        );
        assert_eq!(seed_parameters(&curve), vec![0.0, 1.0]);
    }

    #[test]
    fn quadratic_seeds_include_span_midpoints() {
        let curve = NurbsCurve2::new(
            2,
            vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0],
            vec![
                crate::math::Point2::new(0.0, 0.0),
                crate::math::Point2::new(0.5, 0.5),
                crate::math::Point2::new(1.0, 0.5),
                crate::math::Point2::new(1.0, 1.0),
            ],
            vec![1.0; 4],
        );
        assert_eq!(seed_parameters(&curve), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }
}
