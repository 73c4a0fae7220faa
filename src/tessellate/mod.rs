//! Tessellation of a repaired model into triangle meshes.
//!
//! Two back-ends implement the [`Tessellator`] trait:
//! - [`KernelTessellator`]: trim-aware. Edges are discretized once and
//!   shared by both faces of a sewn edge, so sewn boundaries are
//!   crack-free.
//! - [`GridTessellator`]: refined parameter grid over each face's loop
//!   bounds, clipped to the trims at the finest level. Fast, faces share
//!   no points.
//!
//! Faces on a degenerate surface, or narrower than the geometric tolerance
//! in one parameter direction, are skipped with a warning.

mod edge;
mod face;
mod grid;
pub mod mesh;
pub mod triangulate;

pub use mesh::{EdgeMesh, FaceMesh, MeshRecord, MeshSection, ModelMesh, VertexMesh};

use crate::config::{TessellationCriteria, TessellatorKind};
use crate::topo::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// How `retessellate` treats the previous mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetessellatePolicy {
    /// Keep the sections of unchanged faces, drop those of faces no longer
    /// in the model, and build only changed or new faces.
    #[default]
    SkipDeletedSurfaces,
    /// Ignore the previous mesh.
    RegenerateAll,
}

pub trait Tessellator {
    /// Mesh every active face of `model`.
    fn tessellate(&self, model: &Model, criteria: &TessellationCriteria) -> ModelMesh;

    /// Mesh `model` again under `criteria`, reusing `previous` per
    /// `policy`. `changed` lists the patch ids of faces whose geometry
    /// changed since `previous`. When `criteria` differ from those of
    /// `previous`, every face counts as changed.
    fn retessellate(
        &self,
        model: &Model,
        previous: &ModelMesh,
        criteria: &TessellationCriteria,
        changed: &BTreeSet<u32>,
        policy: RetessellatePolicy,
    ) -> ModelMesh;
}

/// The back-end selected by `kind`.
pub fn tessellator(kind: TessellatorKind, geometric_tolerance: f64) -> Box<dyn Tessellator + Send + Sync> {
    match kind {
        TessellatorKind::Kernel => Box::new(KernelTessellator::new(geometric_tolerance)),
        TessellatorKind::Grid => Box::new(GridTessellator::new(geometric_tolerance)),
    }
}

/// False for faces that cannot yield a meaningful patch: degenerate
/// surface, no external loop, or an external loop narrower than
/// `tolerance` (3D estimate) in one parameter direction.
pub fn is_tessellable(model: &Model, face: FaceId, tolerance: f64) -> bool {
    let surface = model.face_surface(face);
    if surface.is_degenerate(tolerance) {
        return false;
    }
    let Some(&outer) = model.face(face).loops.first() else {
        return false;
    };
    let polygon = model.loop_uv_polygon(outer, 4);
    let (mut du, mut dv) = ((f64::MAX, f64::MIN), (f64::MAX, f64::MIN));
    for p in &polygon {
        du = (du.0.min(p.x), du.1.max(p.x));
        dv = (dv.0.min(p.y), dv.1.max(p.y));
    }
    let (su, sv) = surface.mean_speeds();
    (du.1 - du.0) * su >= tolerance && (dv.1 - dv.0) * sv >= tolerance
}

/// True when nothing of `previous` may be reused.
fn regenerates(previous: &ModelMesh, criteria: &TessellationCriteria, policy: RetessellatePolicy) -> bool {
    if policy == RetessellatePolicy::RegenerateAll {
        return true;
    }
    if previous.criteria != *criteria {
        debug!("tessellation criteria changed, every face is rebuilt");
        return true;
    }
    false
}

/// Face meshes of `previous` that can be kept as they are.
fn reusable_faces(
    model: &Model,
    previous: &ModelMesh,
    changed: &BTreeSet<u32>,
) -> HashMap<u32, FaceMesh> {
    let present: HashSet<u32> = model
        .active_faces()
        .iter()
        .map(|(_, of)| model.face(of.face).patch_id)
        .collect();
    previous
        .face_meshes
        .iter()
        .filter(|f| present.contains(&f.patch_id) && !changed.contains(&f.patch_id))
        .map(|f| (f.patch_id, f.clone()))
        .collect()
}

/// Build or reuse the face meshes of every active face, in model order.
fn mesh_faces<F>(
    mesh: &mut ModelMesh,
    model: &Model,
    tolerance: f64,
    kept: &HashMap<u32, FaceMesh>,
    mut build: F,
) where
    F: FnMut(&mut ModelMesh, FaceId, Orientation) -> Option<FaceMesh>,
{
    if model.orientation == OrientationState::Provisional {
        debug!("tessellating with provisional face orientation");
    }
    let faces = model.active_faces();
    let mut face_meshes = Vec::with_capacity(faces.len());
    let (mut reused, mut skipped) = (0, 0);
    for (_, oriented) in &faces {
        let patch_id = model.face(oriented.face).patch_id;
        if let Some(previous) = kept.get(&patch_id) {
            face_meshes.push(previous.clone());
            reused += 1;
            continue;
        }
        if !is_tessellable(model, oriented.face, tolerance) {
            warn!(patch_id, "degenerate face skipped");
            skipped += 1;
            continue;
        }
        match build(mesh, oriented.face, oriented.orientation) {
            Some(face_mesh) => face_meshes.push(face_mesh),
            None => skipped += 1,
        }
    }
    mesh.face_meshes = face_meshes;
    info!(
        faces = mesh.face_meshes.len(),
        reused,
        skipped,
        triangles = mesh.triangle_count(),
        vertices = mesh.vertex_count(),
        "tessellation done"
    );
}

/// Trim-aware tessellation with shared edge discretizations.
#[derive(Clone, Debug)]
pub struct KernelTessellator {
    pub geometric_tolerance: f64,
}

impl KernelTessellator {
    pub fn new(geometric_tolerance: f64) -> Self {
        Self {
            geometric_tolerance,
        }
    }

    fn run(&self, model: &Model, mesh: &mut ModelMesh, kept: &HashMap<u32, FaceMesh>) {
        let faces = model.active_faces();
        edge::weld_corners(mesh, model, &faces);
        mesh_faces(mesh, model, self.geometric_tolerance, kept, |mesh, face, orientation| {
            face::tessellate_face(mesh, model, face, orientation)
        });
    }
}

impl Tessellator for KernelTessellator {
    fn tessellate(&self, model: &Model, criteria: &TessellationCriteria) -> ModelMesh {
        let mut mesh = ModelMesh::new(*criteria);
        self.run(model, &mut mesh, &HashMap::new());
        mesh
    }

    fn retessellate(
        &self,
        model: &Model,
        previous: &ModelMesh,
        criteria: &TessellationCriteria,
        changed: &BTreeSet<u32>,
        policy: RetessellatePolicy,
    ) -> ModelMesh {
        if regenerates(previous, criteria, policy) {
            return self.tessellate(model, criteria);
        }
        let kept = reusable_faces(model, previous, changed);

        // Edge meshes survive only along kept faces; the faces rebuilt
        // next to them pick them up through their twins.
        let kept_edges: HashSet<u32> = model
            .active_faces()
            .iter()
            .filter(|(_, of)| kept.contains_key(&model.face(of.face).patch_id))
            .flat_map(|(_, of)| model.face_edges(of.face))
            .map(|oe| model.edge(oe.edge).serial)
            .collect();
        let mut mesh = previous.clone();
        mesh.retain_edges(&kept_edges);
        self.run(model, &mut mesh, &kept);
        mesh
    }
}

/// Parameter-grid tessellation clipped to the face's trim loops.
#[derive(Clone, Debug)]
pub struct GridTessellator {
    pub geometric_tolerance: f64,
    /// Grid cells per knot span before refinement.
    pub base_subdivisions: usize,
    pub max_passes: usize,
}

impl GridTessellator {
    pub fn new(geometric_tolerance: f64) -> Self {
        Self {
            geometric_tolerance,
            base_subdivisions: 1,
            max_passes: 6,
        }
    }

    fn run(&self, model: &Model, mesh: &mut ModelMesh, kept: &HashMap<u32, FaceMesh>) {
        mesh_faces(mesh, model, self.geometric_tolerance, kept, |mesh, face, orientation| {
            grid::tessellate_face(
                mesh,
                model,
                face,
                orientation,
                self.base_subdivisions,
                self.max_passes,
            )
        });
    }
}

impl Tessellator for GridTessellator {
    fn tessellate(&self, model: &Model, criteria: &TessellationCriteria) -> ModelMesh {
        let mut mesh = ModelMesh::new(*criteria);
        self.run(model, &mut mesh, &HashMap::new());
        mesh
    }

    fn retessellate(
        &self,
        model: &Model,
        previous: &ModelMesh,
        criteria: &TessellationCriteria,
        changed: &BTreeSet<u32>,
        policy: RetessellatePolicy,
    ) -> ModelMesh {
        if regenerates(previous, criteria, policy) {
            return self.tessellate(model, criteria);
        }
        let kept = reusable_faces(model, previous, changed);
        let mut mesh = previous.clone();
        self.run(model, &mut mesh, &kept);
        mesh
    }
}
