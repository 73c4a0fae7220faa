//! The `Model`: arena storage for every entity of one conversion session.
//!
//! All topology entities live in the `Model`. Entities reference each other
//! via generation-checked handles (`EdgeId`, `FaceId`, ...), which avoids
//! reference cycles in the inherently cyclic topology graph.

use super::arena::Arena;
use super::types::*;
use crate::curve::RestrictionCurve;
use crate::math::{distance_squared, Point2, Point3};
use crate::surface::Surface;
use tracing::{debug, warn};

/// Parameter-plane samples per edge when measuring loop areas.
const AREA_SAMPLES: usize = 16;

/// Relative loop area (against the surface domain) below which the sign
/// of the area, and thus the loop orientation, is not trusted.
const DOUBTFUL_AREA_RATIO: f64 = 1e-10;

/// Root container of all entities of one conversion session.
#[derive(Clone, Debug, Default)]
pub struct Model {
    pub surfaces: Arena<Surface>,
    pub edges: Arena<Edge>,
    pub loops: Arena<Loop>,
    pub faces: Arena<Face>,
    pub shells: Arena<Shell>,
    pub bodies: Arena<Body>,
    body_order: Vec<BodyId>,
    next_patch_id: u32,
    next_edge_serial: u32,
    pub orientation: OrientationState,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live geometric and topological entities.
    pub fn entity_count(&self) -> usize {
        self.surfaces.len()
            + self.edges.len()
            + self.loops.len()
            + self.faces.len()
            + self.shells.len()
            + self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0
    }

    // --- Surfaces ---

    pub fn add_surface(&mut self, surface: Surface) -> SurfaceId {
        self.surfaces.insert(surface)
    }

    pub fn surface(&self, id: SurfaceId) -> &Surface {
        &self.surfaces[id]
    }

    // --- Edges ---

    /// Create an edge; it is degenerate when its 3D length is below
    /// `degenerate_length`.
    pub fn add_edge(&mut self, curve: RestrictionCurve, degenerate_length: f64) -> EdgeId {
        let length = curve.length(&self.surfaces[curve.surface]);
        let serial = self.next_edge_serial;
        self.next_edge_serial += 1;
        self.edges.insert(Edge {
            curve,
            twin: None,
            owner: None,
            serial,
            length,
            degenerate: length < degenerate_length,
            deleted: false,
        })
    }

    /// Insert an edge restored from an archive, keeping its serial.
    pub(crate) fn insert_edge(&mut self, edge: Edge) -> EdgeId {
        self.next_edge_serial = self.next_edge_serial.max(edge.serial + 1);
        self.edges.insert(edge)
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn edge_surface(&self, id: EdgeId) -> &Surface {
        &self.surfaces[self.edges[id].curve.surface]
    }

    /// 3D start and end points in the curve's own direction.
    pub fn edge_end_points(&self, id: EdgeId) -> (Point3, Point3) {
        self.edges[id].curve.end_points(self.edge_surface(id))
    }

    /// 3D start and end points in traversal direction.
    pub fn oriented_end_points(&self, oriented: OrientedEdge) -> (Point3, Point3) {
        let (start, end) = self.edge_end_points(oriented.edge);
        match oriented.orientation {
            Orientation::Front => (start, end),
            Orientation::Back => (end, start),
        }
    }

    /// 3D midpoint of an edge.
    pub fn edge_mid_point(&self, id: EdgeId) -> Point3 {
        let edge = &self.edges[id];
        let (t0, t1) = edge.curve.domain();
        edge.curve.point(self.edge_surface(id), (t0 + t1) * 0.5)
    }

    /// The face an edge bounds, through its owning loop.
    pub fn edge_face(&self, id: EdgeId) -> Option<FaceId> {
        self.edges
            .get(id)?
            .owner
            .and_then(|l| self.loops.get(l))
            .and_then(|l| l.face)
    }

    /// True when both edges run the same way along their shared boundary.
    pub fn same_direction(&self, a: EdgeId, b: EdgeId) -> bool {
        let (a0, a1) = self.edge_end_points(a);
        let (b0, b1) = self.edge_end_points(b);
        let same = distance_squared(&a0, &b0) + distance_squared(&a1, &b1);
        let opposite = distance_squared(&a0, &b1) + distance_squared(&a1, &b0);
        same <= opposite
    }

    /// Link `a` and `b` as twins when their end points coincide within
    /// `square_tolerance` (squared distance), in either direction.
    ///
    /// Edges both shorter than `edge_length_tolerance` collapse to a point
    /// and are linked without an end point test. Returns whether the pair
    /// is linked afterwards.
    pub fn link_if_coincident(
        &mut self,
        a: EdgeId,
        b: EdgeId,
        edge_length_tolerance: f64,
        square_tolerance: f64,
    ) -> bool {
        if a == b {
            return false;
        }
        let (Some(ea), Some(eb)) = (self.edges.get(a), self.edges.get(b)) else {
            return false;
        };
        if !ea.is_active() || !eb.is_active() {
            return false;
        }
        if ea.twin.is_some() || eb.twin.is_some() {
            return ea.twin == Some(b) && eb.twin == Some(a);
        }
        let short = ea.length < edge_length_tolerance && eb.length < edge_length_tolerance;

        let (a0, a1) = self.edge_end_points(a);
        let (b0, b1) = self.edge_end_points(b);
        let same = distance_squared(&a0, &b0) <= square_tolerance
            && distance_squared(&a1, &b1) <= square_tolerance;
        let opposite = distance_squared(&a0, &b1) <= square_tolerance
            && distance_squared(&a1, &b0) <= square_tolerance;
        if !(same || opposite || short) {
            debug!(edge = ?a, twin = ?b, "twin end points do not coincide");
            return false;
        }

        self.edges[a].twin = Some(b);
        self.edges[b].twin = Some(a);
        true
    }

    /// Break the twin link of an edge on both sides.
    pub fn unlink(&mut self, id: EdgeId) {
        let Some(twin) = self.edges.get_mut(id).and_then(|e| e.twin.take()) else {
            return;
        };
        if let Some(other) = self.edges.get_mut(twin) {
            if other.twin == Some(id) {
                other.twin = None;
            }
        }
    }

    pub fn delete_edge(&mut self, id: EdgeId) {
        self.unlink(id);
        if let Some(edge) = self.edges.get_mut(id) {
            edge.deleted = true;
        }
    }

    // --- Loops ---

    /// Build a loop from edges given in traversal order.
    ///
    /// Inactive edges are dropped. An edge whose end, rather than its start,
    /// meets the previous edge is flipped to `Back`. Returns `None` when no
    /// edge is left or when consecutive edges, or the last and the first,
    /// are further apart than `tolerance`.
    pub fn make_loop(
        &mut self,
        edges: &[EdgeId],
        orientations: &[Orientation],
        external: bool,
        tolerance: f64,
    ) -> Option<LoopId> {
        assert_eq!(edges.len(), orientations.len());
        let mut oriented: Vec<OrientedEdge> = edges
            .iter()
            .zip(orientations)
            .filter(|(e, _)| self.edges.get(**e).is_some_and(Edge::is_active))
            .map(|(&edge, &orientation)| OrientedEdge { edge, orientation })
            .collect();
        if oriented.is_empty() {
            return None;
        }

        let sq = tolerance * tolerance;
        if oriented.len() > 1 {
            let (s0, e0) = self.oriented_end_points(oriented[0]);
            let (n0, n1) = self.edge_end_points(oriented[1].edge);
            let end_meets = distance_squared(&e0, &n0) <= sq || distance_squared(&e0, &n1) <= sq;
            let start_meets = distance_squared(&s0, &n0) <= sq || distance_squared(&s0, &n1) <= sq;
            if !end_meets && start_meets {
                oriented[0].orientation = oriented[0].orientation.reversed();
            }

            for i in 1..oriented.len() {
                let (_, prev_end) = self.oriented_end_points(oriented[i - 1]);
                let (start, end) = self.oriented_end_points(oriented[i]);
                if distance_squared(&prev_end, &start) <= sq {
                    continue;
                }
                if distance_squared(&prev_end, &end) <= sq {
                    oriented[i].orientation = oriented[i].orientation.reversed();
                    continue;
                }
                warn!(
                    position = i,
                    gap = (prev_end - start).norm().min((prev_end - end).norm()),
                    "loop rejected: consecutive edges do not meet"
                );
                return None;
            }
        }

        let (first_start, _) = self.oriented_end_points(oriented[0]);
        let (_, last_end) = self.oriented_end_points(oriented[oriented.len() - 1]);
        if distance_squared(&first_start, &last_end) > sq {
            warn!(
                gap = (first_start - last_end).norm(),
                "loop rejected: boundary is not closed"
            );
            return None;
        }
        if let Some(position) = self.uv_gap(&oriented, tolerance) {
            warn!(position, "loop rejected: boundary is open in the parameter plane");
            return None;
        }

        let id = self.loops.insert(Loop {
            edges: oriented,
            external,
            face: None,
        });
        for i in 0..self.loops[id].edges.len() {
            let edge = self.loops[id].edges[i].edge;
            self.edges[edge].owner = Some(id);
        }
        Some(id)
    }

    /// Parameter-plane polygon of a loop, in traversal order, open (the
    /// closing point is not repeated).
    pub fn loop_uv_polygon(&self, id: LoopId, samples_per_edge: usize) -> Vec<Point2> {
        let mut polygon = Vec::new();
        for oriented in &self.loops[id].edges {
            let curve = &self.edges[oriented.edge].curve;
            let mut params = curve.sample_parameters(samples_per_edge.max(1));
            if oriented.orientation == Orientation::Back {
                params.reverse();
            }
            polygon.extend(params[..params.len() - 1].iter().map(|&t| curve.uv(t)));
        }
        polygon
    }

    /// Parameter-plane start and end of an edge in traversal direction.
    pub fn oriented_uv_end_points(&self, oriented: OrientedEdge) -> (Point2, Point2) {
        let curve = &self.edges[oriented.edge].curve;
        let (t0, t1) = curve.domain();
        let (start, end) = (curve.uv(t0), curve.uv(t1));
        match oriented.orientation {
            Orientation::Front => (start, end),
            Orientation::Back => (end, start),
        }
    }

    /// Position of the first edge whose parameter-plane start misses the
    /// previous edge's end (cyclically) by more than `tolerance`, measured
    /// in millimetres through the surface's mean speeds.
    ///
    /// A gap along which the surface collapses to a point, as where a
    /// degenerate pole edge was dropped, is not counted.
    pub fn uv_gap(&self, edges: &[OrientedEdge], tolerance: f64) -> Option<usize> {
        let first = edges.first()?;
        let surface = self.edge_surface(first.edge);
        let (su, sv) = surface.mean_speeds();
        let n = edges.len();
        (0..n).find(|&i| {
            let (_, end) = self.oriented_uv_end_points(edges[(i + n - 1) % n]);
            let (start, _) = self.oriented_uv_end_points(edges[i]);
            let d = start - end;
            (d.x * su).hypot(d.y * sv) > tolerance
                && !surface.collapses_between(&end, &start, tolerance)
        })
    }

    /// Parameter-plane polygons of every loop of a face, external first.
    pub fn face_uv_polygons(&self, id: FaceId, samples_per_edge: usize) -> Vec<Vec<Point2>> {
        self.faces[id]
            .loops
            .iter()
            .map(|&l| self.loop_uv_polygon(l, samples_per_edge))
            .collect()
    }

    /// Signed parameter-plane area of a loop; positive when counter-clockwise.
    pub fn loop_signed_area(&self, id: LoopId) -> f64 {
        signed_area(&self.loop_uv_polygon(id, AREA_SAMPLES))
    }

    /// Reverse traversal direction of a loop.
    pub fn reverse_loop(&mut self, id: LoopId) {
        let lp = &mut self.loops[id];
        lp.edges.reverse();
        for oriented in &mut lp.edges {
            oriented.orientation = oriented.orientation.reversed();
        }
    }

    // --- Faces ---

    pub fn add_face(&mut self, surface: SurfaceId, material_slot: u32) -> FaceId {
        let patch_id = self.next_patch_id;
        self.next_patch_id += 1;
        self.faces.insert(Face {
            surface,
            loops: Vec::new(),
            patch_id,
            material_slot,
            shell: None,
            degenerate: false,
            deleted: false,
        })
    }

    /// Insert a face restored from an archive, keeping its patch id.
    pub(crate) fn insert_face(&mut self, face: Face) -> FaceId {
        self.next_patch_id = self.next_patch_id.max(face.patch_id + 1);
        self.faces.insert(face)
    }

    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id]
    }

    pub fn face_surface(&self, id: FaceId) -> &Surface {
        &self.surfaces[self.faces[id].surface]
    }

    /// Attach loops to a face and settle their orientation.
    ///
    /// External loops are made counter-clockwise and holes clockwise in the
    /// parameter plane. Exactly one loop ends up external, at index 0: the
    /// flagged one when it is also the largest, otherwise the largest. The
    /// return value counts doubtful decisions: loops too small for their
    /// area sign to be trusted, and external flags that had to be moved.
    pub fn add_loops(&mut self, face: FaceId, loops: &[LoopId]) -> usize {
        let ((u0, u1), (v0, v1)) = self.face_surface(face).domain();
        let doubtful_area = ((u1 - u0) * (v1 - v0)).abs() * DOUBTFUL_AREA_RATIO;
        let has_external = !self.faces[face].loops.is_empty();

        let mut doubtful = 0;
        let mut areas = Vec::with_capacity(loops.len());
        for &id in loops {
            let area = self.loop_signed_area(id);
            if area.abs() <= doubtful_area {
                doubtful += 1;
            }
            areas.push(area.abs());
            self.loops[id].face = Some(face);
        }

        let largest = areas
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        let flagged: Vec<usize> = (0..loops.len())
            .filter(|&i| self.loops[loops[i]].external)
            .collect();
        let external = if has_external {
            None
        } else {
            match (flagged.as_slice(), largest) {
                ([i], Some(big)) if areas[*i] >= areas[big] => Some(*i),
                (_, big) => {
                    if big.is_some() {
                        doubtful += 1;
                    }
                    big
                }
            }
        };

        let mut ordered = Vec::with_capacity(loops.len());
        for (i, &id) in loops.iter().enumerate() {
            let is_external = external == Some(i);
            self.loops[id].external = is_external;
            let area = self.loop_signed_area(id);
            if (is_external && area < 0.0) || (!is_external && area > 0.0) {
                self.reverse_loop(id);
            }
            if is_external {
                ordered.insert(0, id);
            } else {
                ordered.push(id);
            }
        }
        self.faces[face].loops.extend(ordered);
        doubtful
    }

    /// All oriented edges of a face, loop by loop.
    pub fn face_edges(&self, id: FaceId) -> Vec<OrientedEdge> {
        self.faces[id]
            .loops
            .iter()
            .flat_map(|&l| self.loops[l].edges.iter().copied())
            .collect()
    }

    /// Remove a face from further processing: its edges are deleted (which
    /// breaks their twin links) and it leaves its shell.
    pub fn delete_face(&mut self, id: FaceId) {
        for oriented in self.face_edges(id) {
            self.delete_edge(oriented.edge);
        }
        let face = &mut self.faces[id];
        face.deleted = true;
        if let Some(shell) = face.shell.take() {
            if let Some(shell) = self.shells.get_mut(shell) {
                shell.faces.retain(|f| f.face != id);
            }
        }
    }

    /// Flag a face degenerate and delete it.
    pub fn mark_degenerate(&mut self, id: FaceId) {
        self.faces[id].degenerate = true;
        self.delete_face(id);
    }

    // --- Shells ---

    pub fn add_shell(&mut self) -> ShellId {
        self.shells.insert(Shell::default())
    }

    pub fn shell(&self, id: ShellId) -> &Shell {
        &self.shells[id]
    }

    pub fn shell_add_face(&mut self, shell: ShellId, face: FaceId, orientation: Orientation) {
        self.shells[shell].faces.push(OrientedFace { face, orientation });
        self.faces[face].shell = Some(shell);
    }

    /// Remove a shell; its faces are left without a shell.
    pub fn remove_shell(&mut self, id: ShellId) {
        let Some(shell) = self.shells.remove(id) else {
            return;
        };
        for oriented in shell.faces {
            if let Some(face) = self.faces.get_mut(oriented.face) {
                if face.shell == Some(id) {
                    face.shell = None;
                }
            }
        }
        if let Some(body) = shell.body.and_then(|b| self.bodies.get_mut(b)) {
            body.shells.retain(|&s| s != id);
        }
    }

    // --- Bodies ---

    pub fn add_body(&mut self, body: Body) -> BodyId {
        let shells = body.shells.clone();
        let id = self.bodies.insert(body);
        for shell in shells {
            self.shells[shell].body = Some(id);
        }
        self.body_order.push(id);
        id
    }

    pub fn body(&self, id: BodyId) -> &Body {
        &self.bodies[id]
    }

    pub fn body_add_shell(&mut self, body: BodyId, shell: ShellId) {
        self.bodies[body].shells.push(shell);
        self.shells[shell].body = Some(body);
    }

    /// Remove a body together with its shells.
    pub fn remove_body(&mut self, id: BodyId) {
        let Some(body) = self.bodies.remove(id) else {
            return;
        };
        for shell in body.shells {
            if let Some(s) = self.shells.get_mut(shell) {
                s.body = None;
            }
            self.remove_shell(shell);
        }
        self.body_order.retain(|&b| b != id);
    }

    /// Bodies in insertion order.
    pub fn body_ids(&self) -> &[BodyId] {
        &self.body_order
    }

    /// Every active face reachable from the bodies, in body, shell, face order.
    pub fn active_faces(&self) -> Vec<(ShellId, OrientedFace)> {
        let mut faces = Vec::new();
        for &body in &self.body_order {
            for &shell in &self.bodies[body].shells {
                for oriented in &self.shells[shell].faces {
                    if self.faces.get(oriented.face).is_some_and(Face::is_active) {
                        faces.push((shell, *oriented));
                    }
                }
            }
        }
        faces
    }
}

/// Even-odd containment of `p` in the region bounded by `polygons`
/// (an external ring and its holes).
pub fn point_in_polygons(polygons: &[Vec<Point2>], p: &Point2) -> bool {
    let mut inside = false;
    for polygon in polygons {
        let n = polygon.len();
        for i in 0..n {
            let a = polygon[i];
            let b = polygon[(i + 1) % n];
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
    }
    inside
}

/// Parameter rectangle `((u_min, u_max), (v_min, v_max))` of `polygons`.
pub fn polygon_bounds(polygons: &[Vec<Point2>]) -> Option<((f64, f64), (f64, f64))> {
    let mut points = polygons.iter().flatten().peekable();
    points.peek()?;
    let mut u = (f64::MAX, f64::MIN);
    let mut v = (f64::MAX, f64::MIN);
    for p in points {
        u = (u.0.min(p.x), u.1.max(p.x));
        v = (v.0.min(p.y), v.1.max(p.y));
    }
    Some((u, v))
}

/// Shoelace area of a closed polygon; positive when counter-clockwise.
pub fn signed_area(polygon: &[Point2]) -> f64 {
    let n = polygon.len();
    let mut area = 0.0;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        area += a.x * b.y - b.x * a.y;
    }
    area * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nurbs::knot::pad_clamped_knots;
    use crate::nurbs::{NurbsCurve2, NurbsSurface};

    /// Planar patch covering `[x0, x0 + 1] x [0, 1]` at z = 0.
    fn unit_plane(model: &mut Model, x0: f64) -> SurfaceId {
        model.add_surface(Surface::new(NurbsSurface::new(
            1,
            1,
            pad_clamped_knots(&[0.0, 1.0], 1),
            pad_clamped_knots(&[0.0, 1.0], 1),
            vec![
                vec![Point3::new(x0, 0.0, 0.0), Point3::new(x0, 1.0, 0.0)],
                vec![Point3::new(x0 + 1.0, 0.0, 0.0), Point3::new(x0 + 1.0, 1.0, 0.0)],
            ],
            vec![vec![1.0; 2]; 2],
        )))
    }

    fn segment(model: &mut Model, surface: SurfaceId, a: (f64, f64), b: (f64, f64)) -> EdgeId {
        let curve = NurbsCurve2::new(
            1,
            pad_clamped_knots(&[0.0, 1.0], 1),
            vec![Point2::new(a.0, a.1), Point2::new(b.0, b.1)],
            vec![1.0, 1.0],
        );
        model.add_edge(RestrictionCurve::new(surface, curve), 0.02)
    }

    /// Square boundary of the whole domain, counter-clockwise in UV.
    fn square_edges(model: &mut Model, surface: SurfaceId) -> Vec<EdgeId> {
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        (0..4)
            .map(|i| segment(model, surface, corners[i], corners[(i + 1) % 4]))
            .collect()
    }

    fn square_face(model: &mut Model, x0: f64) -> (FaceId, Vec<EdgeId>) {
        let surface = unit_plane(model, x0);
        let edges = square_edges(model, surface);
        let lp = model
            .make_loop(&edges, &[Orientation::Front; 4], true, 1e-3)
            .expect("closed square");
        let face = model.add_face(surface, 0);
        model.add_loops(face, &[lp]);
        (face, edges)
    }

    #[test]
    fn serials_and_patch_ids_increase() {
        let mut model = Model::new();
        let (a, edges) = square_face(&mut model, 0.0);
        let (b, _) = square_face(&mut model, 1.0);
        let serials: Vec<u32> = edges.iter().map(|&e| model.edge(e).serial).collect();
        assert_eq!(serials, vec![0, 1, 2, 3]);
        assert_eq!(model.face(a).patch_id, 0);
        assert_eq!(model.face(b).patch_id, 1);
    }

    #[test]
    fn make_loop_flips_reversed_edge() {
        let mut model = Model::new();
        let surface = unit_plane(&mut model, 0.0);
        let mut edges = square_edges(&mut model, surface);
        edges[2] = segment(&mut model, surface, (0.0, 1.0), (1.0, 1.0));
        let lp = model
            .make_loop(&edges, &[Orientation::Front; 4], true, 1e-3)
            .expect("closed after flip");
        assert_eq!(model.loops[lp].edges[2].orientation, Orientation::Back);
        assert!(model.loop_signed_area(lp) > 0.0);
    }

    #[test]
    fn make_loop_rejects_open_boundary() {
        let mut model = Model::new();
        let surface = unit_plane(&mut model, 0.0);
        let edges = square_edges(&mut model, surface);
        assert!(model
            .make_loop(&edges[..3], &[Orientation::Front; 3], true, 1e-3)
            .is_none());
    }

    #[test]
    fn make_loop_rejects_ring_open_in_parameter_plane() {
        let mut model = Model::new();
        // Unit square tube around z; u runs once around it, so the
        // v = 0 iso-line closes in 3D but not in the parameter plane.
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)];
        let surface = model.add_surface(Surface::new(NurbsSurface::new(
            1,
            1,
            pad_clamped_knots(&[0.0, 0.25, 0.5, 0.75, 1.0], 1),
            pad_clamped_knots(&[0.0, 1.0], 1),
            corners
                .iter()
                .map(|&(x, y)| vec![Point3::new(x, y, 0.0), Point3::new(x, y, 1.0)])
                .collect(),
            vec![vec![1.0; 2]; 5],
        )));
        let ring = segment(&mut model, surface, (0.0, 0.0), (1.0, 0.0));
        let (start, end) = model.edge_end_points(ring);
        assert!((start - end).norm() < 1e-12);
        assert!(model
            .make_loop(&[ring], &[Orientation::Front], true, 1e-3)
            .is_none());
    }

    #[test]
    fn parameter_gap_across_a_pole_is_accepted() {
        let mut model = Model::new();
        // Triangle fan: the whole v = 1 row collapses onto the apex.
        let apex = Point3::new(0.5, 1.0, 0.0);
        let surface = model.add_surface(Surface::new(NurbsSurface::new(
            1,
            1,
            pad_clamped_knots(&[0.0, 1.0], 1),
            pad_clamped_knots(&[0.0, 1.0], 1),
            vec![
                vec![Point3::new(0.0, 0.0, 0.0), apex],
                vec![Point3::new(1.0, 0.0, 0.0), apex],
            ],
            vec![vec![1.0; 2]; 2],
        )));
        let edges = [
            segment(&mut model, surface, (0.0, 0.0), (1.0, 0.0)),
            segment(&mut model, surface, (1.0, 0.0), (1.0, 1.0)),
            segment(&mut model, surface, (0.0, 1.0), (0.0, 0.0)),
        ];
        let lp = model.make_loop(&edges, &[Orientation::Front; 3], true, 1e-3);
        assert!(lp.is_some());
    }

    #[test]
    fn even_odd_containment_skips_holes() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let hole = vec![
            Point2::new(0.4, 0.4),
            Point2::new(0.4, 0.6),
            Point2::new(0.6, 0.6),
            Point2::new(0.6, 0.4),
        ];
        let polygons = vec![outer, hole];
        assert!(point_in_polygons(&polygons, &Point2::new(0.2, 0.5)));
        assert!(!point_in_polygons(&polygons, &Point2::new(0.5, 0.5)));
        assert!(!point_in_polygons(&polygons, &Point2::new(1.5, 0.5)));
        assert_eq!(polygon_bounds(&polygons), Some(((0.0, 1.0), (0.0, 1.0))));
    }

    #[test]
    fn add_loops_puts_largest_first_and_orients_holes() {
        let mut model = Model::new();
        let surface = unit_plane(&mut model, 0.0);
        let outer = square_edges(&mut model, surface);
        let corners = [(0.4, 0.4), (0.6, 0.4), (0.6, 0.6), (0.4, 0.6)];
        let inner: Vec<EdgeId> = (0..4)
            .map(|i| segment(&mut model, surface, corners[i], corners[(i + 1) % 4]))
            .collect();
        let hole = model
            .make_loop(&inner, &[Orientation::Front; 4], true, 1e-3)
            .expect("hole");
        let outer = model
            .make_loop(&outer, &[Orientation::Front; 4], false, 1e-3)
            .expect("outer");
        let face = model.add_face(surface, 0);
        let doubtful = model.add_loops(face, &[hole, outer]);

        assert_eq!(model.face(face).loops, vec![outer, hole]);
        assert!(model.loops[outer].external);
        assert!(!model.loops[hole].external);
        assert!(model.loop_signed_area(outer) > 0.0);
        assert!(model.loop_signed_area(hole) < 0.0);
        assert_eq!(doubtful, 1);
    }

    #[test]
    fn twin_link_is_symmetric_and_exclusive() {
        let mut model = Model::new();
        let (_, left) = square_face(&mut model, 0.0);
        let (_, right) = square_face(&mut model, 1.0);
        // Right side of the left square is the left side of the right one.
        assert!(model.link_if_coincident(left[1], right[3], 0.02, 1e-6));
        assert_eq!(model.edge(left[1]).twin, Some(right[3]));
        assert_eq!(model.edge(right[3]).twin, Some(left[1]));
        assert!(!model.same_direction(left[1], right[3]));
        assert!(!model.link_if_coincident(left[1], right[0], 0.02, 1e-6));
        assert!(!model.link_if_coincident(left[0], right[0], 0.02, 1e-6));
    }

    #[test]
    fn delete_face_breaks_twins_and_leaves_shell() {
        let mut model = Model::new();
        let (a, left) = square_face(&mut model, 0.0);
        let (b, right) = square_face(&mut model, 1.0);
        model.link_if_coincident(left[1], right[3], 0.02, 1e-6);
        let shell = model.add_shell();
        model.shell_add_face(shell, a, Orientation::Front);
        model.shell_add_face(shell, b, Orientation::Front);

        model.delete_face(a);
        assert_eq!(model.edge(right[3]).twin, None);
        assert!(model.edge(left[1]).deleted);
        assert_eq!(model.shell(shell).faces.len(), 1);
        assert_eq!(model.face(a).shell, None);
    }

    #[test]
    fn active_faces_follow_body_order() {
        let mut model = Model::new();
        let (a, _) = square_face(&mut model, 0.0);
        let (b, _) = square_face(&mut model, 1.0);
        let first = model.add_shell();
        let second = model.add_shell();
        model.shell_add_face(second, b, Orientation::Back);
        model.shell_add_face(first, a, Orientation::Front);
        model.add_body(Body {
            shells: vec![second],
            ..Body::default()
        });
        model.add_body(Body {
            shells: vec![first],
            ..Body::default()
        });

        let faces: Vec<FaceId> = model.active_faces().iter().map(|(_, f)| f.face).collect();
        assert_eq!(faces, vec![b, a]);

        let body = model.body_ids()[0];
        model.remove_body(body);
        assert_eq!(model.active_faces().len(), 1);
        assert_eq!(model.face(b).shell, None);
    }

    #[test]
    fn shoelace_area() {
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert!((signed_area(&square) - 4.0).abs() < 1e-12);
        let reversed: Vec<Point2> = square.iter().rev().copied().collect();
        assert!((signed_area(&reversed) + 4.0).abs() < 1e-12);
    }
}
