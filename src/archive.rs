//! Serializable snapshot of a [`Session`].
//!
//! Arena handles carry generations and are not stable across processes,
//! so the archive replaces every handle by the entity's position in its
//! table. Edge serials and face patch ids are stored as they are, which
//! keeps mesh sections of a restored model addressable by the same keys.

use crate::curve::RestrictionCurve;
use crate::error::{Error, Result};
use crate::layer::{Layer, LayerCache, LayerId};
use crate::nurbs::NurbsCurve2;
use crate::session::{Session, Tolerance};
use crate::surface::Surface;
use crate::topo::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bumped whenever the layout below changes incompatibly.
pub const ARCHIVE_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Archive {
    pub version: u32,
    pub geometric_tolerance: f64,
    pub stitching_tolerance: f64,
    pub orientation: OrientationState,
    pub layers: Vec<(u64, Layer)>,
    pub surfaces: Vec<Surface>,
    pub edges: Vec<EdgeEntry>,
    pub loops: Vec<LoopEntry>,
    pub faces: Vec<FaceEntry>,
    pub shells: Vec<ShellEntry>,
    /// Bodies in insertion order.
    pub bodies: Vec<BodyEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeEntry {
    pub surface: usize,
    pub curve: NurbsCurve2,
    pub twin: Option<usize>,
    pub owner: Option<usize>,
    pub serial: u32,
    pub length: f64,
    pub degenerate: bool,
    pub deleted: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoopEntry {
    pub edges: Vec<(usize, Orientation)>,
    pub external: bool,
    pub face: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FaceEntry {
    pub surface: usize,
    pub loops: Vec<usize>,
    pub patch_id: u32,
    pub material_slot: u32,
    pub degenerate: bool,
    pub deleted: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShellEntry {
    pub faces: Vec<(usize, Orientation)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BodyEntry {
    pub name: String,
    pub shells: Vec<usize>,
    pub material_slot: u32,
    pub layer: Option<LayerId>,
}

/// Position of every live handle of an arena.
fn positions<T>(arena: &Arena<T>) -> HashMap<Handle<T>, usize> {
    arena
        .iter()
        .enumerate()
        .map(|(i, (handle, _))| (handle, i))
        .collect()
}

fn resolve<T>(table: &[Handle<T>], index: usize, what: &str) -> Result<Handle<T>> {
    table
        .get(index)
        .copied()
        .ok_or_else(|| Error::Archive(format!("{what} index {index} out of range")))
}

impl Archive {
    /// Snapshot `session`. References to entities no longer in the model
    /// are dropped.
    pub fn from_session(session: &Session) -> Self {
        let model = session.model();
        let surface_ix = positions(&model.surfaces);
        let edge_ix = positions(&model.edges);
        let loop_ix = positions(&model.loops);
        let face_ix = positions(&model.faces);
        let shell_ix = positions(&model.shells);

        let edges = model
            .edges
            .iter()
            .map(|(_, e)| EdgeEntry {
                surface: surface_ix[&e.curve.surface],
                curve: e.curve.curve.clone(),
                twin: e.twin.and_then(|t| edge_ix.get(&t).copied()),
                owner: e.owner.and_then(|l| loop_ix.get(&l).copied()),
                serial: e.serial,
                length: e.length,
                degenerate: e.degenerate,
                deleted: e.deleted,
            })
            .collect();
        let loops = model
            .loops
            .iter()
            .map(|(_, l)| LoopEntry {
                edges: l
                    .edges
                    .iter()
                    .filter_map(|oe| edge_ix.get(&oe.edge).map(|&i| (i, oe.orientation)))
                    .collect(),
                external: l.external,
                face: l.face.and_then(|f| face_ix.get(&f).copied()),
            })
            .collect();
        let faces = model
            .faces
            .iter()
            .map(|(_, f)| FaceEntry {
                surface: surface_ix[&f.surface],
                loops: f.loops.iter().filter_map(|l| loop_ix.get(l).copied()).collect(),
                patch_id: f.patch_id,
                material_slot: f.material_slot,
                degenerate: f.degenerate,
                deleted: f.deleted,
            })
            .collect();
        let shells = model
            .shells
            .iter()
            .map(|(_, s)| ShellEntry {
                faces: s
                    .faces
                    .iter()
                    .filter_map(|of| face_ix.get(&of.face).map(|&i| (i, of.orientation)))
                    .collect(),
            })
            .collect();
        let bodies = model
            .body_ids()
            .iter()
            .map(|&id| {
                let b = model.body(id);
                BodyEntry {
                    name: b.name.clone(),
                    shells: b.shells.iter().filter_map(|s| shell_ix.get(s).copied()).collect(),
                    material_slot: b.material_slot,
                    layer: b.layer,
                }
            })
            .collect();

        let layers = session.layers();
        let tolerance = session.tolerance();
        Self {
            version: ARCHIVE_VERSION,
            geometric_tolerance: tolerance.geometric,
            stitching_tolerance: tolerance.stitching,
            orientation: model.orientation,
            layers: layers.keys().into_iter().zip(layers.layers().iter().cloned()).collect(),
            surfaces: model.surfaces.iter().map(|(_, s)| s.clone()).collect(),
            edges,
            loops,
            faces,
            shells,
            bodies,
        }
    }

    /// Rebuild the session. Fails on a version mismatch or on any index
    /// that does not name an entity of the archive.
    pub fn into_session(self) -> Result<Session> {
        if self.version != ARCHIVE_VERSION {
            return Err(Error::Archive(format!(
                "unsupported version {} (expected {ARCHIVE_VERSION})",
                self.version
            )));
        }
        let mut model = Model::new();
        model.orientation = self.orientation;

        let surfaces: Vec<SurfaceId> = self.surfaces.into_iter().map(|s| model.add_surface(s)).collect();

        let mut edges = Vec::with_capacity(self.edges.len());
        for e in &self.edges {
            let surface = resolve(&surfaces, e.surface, "surface")?;
            edges.push(model.insert_edge(Edge {
                curve: RestrictionCurve::new(surface, e.curve.clone()),
                twin: None,
                owner: None,
                serial: e.serial,
                length: e.length,
                degenerate: e.degenerate,
                deleted: e.deleted,
            }));
        }

        let mut loops = Vec::with_capacity(self.loops.len());
        for l in &self.loops {
            let oriented = l
                .edges
                .iter()
                .map(|&(i, orientation)| {
                    Ok(OrientedEdge {
                        edge: resolve(&edges, i, "edge")?,
                        orientation,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            loops.push(model.loops.insert(Loop {
                edges: oriented,
                external: l.external,
                face: None,
            }));
        }

        let mut faces = Vec::with_capacity(self.faces.len());
        for f in &self.faces {
            let surface = resolve(&surfaces, f.surface, "surface")?;
            let face_loops = f
                .loops
                .iter()
                .map(|&i| resolve(&loops, i, "loop"))
                .collect::<Result<Vec<_>>>()?;
            faces.push(model.insert_face(Face {
                surface,
                loops: face_loops,
                patch_id: f.patch_id,
                material_slot: f.material_slot,
                shell: None,
                degenerate: f.degenerate,
                deleted: f.deleted,
            }));
        }

        let mut shells = Vec::with_capacity(self.shells.len());
        for s in &self.shells {
            let shell = model.add_shell();
            for &(i, orientation) in &s.faces {
                model.shell_add_face(shell, resolve(&faces, i, "face")?, orientation);
            }
            shells.push(shell);
        }

        for b in &self.bodies {
            let body_shells = b
                .shells
                .iter()
                .map(|&i| resolve(&shells, i, "shell"))
                .collect::<Result<Vec<_>>>()?;
            model.add_body(Body {
                name: b.name.clone(),
                shells: body_shells,
                material_slot: b.material_slot,
                layer: b.layer,
            });
        }

        // Back references, once every table exists.
        for (e, &id) in self.edges.iter().zip(&edges) {
            let twin = e.twin.map(|i| resolve(&edges, i, "twin edge")).transpose()?;
            let owner = e.owner.map(|i| resolve(&loops, i, "loop")).transpose()?;
            let edge = &mut model.edges[id];
            edge.twin = twin;
            edge.owner = owner;
        }
        for (l, &id) in self.loops.iter().zip(&loops) {
            model.loops[id].face = l.face.map(|i| resolve(&faces, i, "face")).transpose()?;
        }

        let mut layers = LayerCache::new();
        if let Some(LayerId(bad)) = self
            .bodies
            .iter()
            .filter_map(|b| b.layer)
            .find(|l| l.0 as usize >= self.layers.len())
        {
            return Err(Error::Archive(format!("layer index {bad} out of range")));
        }
        layers.restore(self.layers);

        let tolerance = Tolerance {
            geometric: self.geometric_tolerance,
            stitching: self.stitching_tolerance,
        };
        Ok(Session::from_parts(model, tolerance, layers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_session_round_trips() {
        let session = Session::with_tolerance(0.02, 0.2);
        let restored = Archive::from_session(&session).into_session().unwrap();
        assert!(restored.model().is_empty());
        assert_eq!(restored.tolerance(), session.tolerance());
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut archive = Archive::from_session(&Session::new());
        archive.version = ARCHIVE_VERSION + 1;
        assert!(matches!(archive.into_session(), Err(Error::Archive(_))));
    }

    #[test]
    fn dangling_index_is_rejected() {
        let mut archive = Archive::from_session(&Session::new());
        archive.shells.push(ShellEntry {
            faces: vec![(3, Orientation::Front)],
        });
        assert!(matches!(archive.into_session(), Err(Error::Archive(_))));
    }
}
