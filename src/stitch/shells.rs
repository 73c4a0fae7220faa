//! Shell partitioning and orientation.

use super::components;
use crate::math::Point2;
use crate::topo::*;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// Parameter-plane cells per direction when integrating a face's flux.
const FLUX_CELLS: usize = 16;

/// Samples per edge of the loop polygons used to clip flux cells.
const FLUX_EDGE_SAMPLES: usize = 8;

/// Split every shell into its maximal sets of faces connected through
/// twin edges. The first set stays in the shell, each further set gets a
/// new shell in the same body. Returns the number of shells created.
pub fn split_into_connected_shells(model: &mut Model) -> usize {
    let shells: Vec<ShellId> = model
        .body_ids()
        .iter()
        .flat_map(|&body| model.body(body).shells.clone())
        .collect();

    let mut created = 0;
    for shell in shells {
        let faces: Vec<OrientedFace> = model.shell(shell).faces.clone();
        let ids: Vec<FaceId> = faces.iter().map(|f| f.face).collect();
        let labels = components(model, &ids);
        let count = labels.iter().max().map_or(0, |m| m + 1);
        if count <= 1 {
            continue;
        }

        let body = model.shell(shell).body;
        let mut new_shells = Vec::with_capacity(count - 1);
        for _ in 1..count {
            let id = model.add_shell();
            if let Some(body) = body {
                model.body_add_shell(body, id);
            }
            new_shells.push(id);
        }
        model.shells[shell].faces.retain(|f| {
            let i = ids.iter().position(|&id| id == f.face);
            i.map_or(true, |i| labels[i] == 0)
        });
        for (oriented, &label) in faces.iter().zip(&labels) {
            if label > 0 {
                model.shell_add_face(new_shells[label - 1], oriented.face, oriented.orientation);
            }
        }
        debug!(shell = ?shell, parts = count, "shell split");
        created += count - 1;
    }
    created
}

/// Outcome of orienting the shells of a model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrientOutcome {
    /// Faces whose orientation changed.
    pub flipped: usize,
    /// Twin pairs that disagree after propagation (non-orientable input).
    pub conflicts: usize,
}

/// Give every face of each shell an orientation consistent with its
/// neighbours across twin edges.
///
/// Two faces agree when they traverse their shared edge in opposite 3D
/// directions. Orientation is propagated breadth-first from the first
/// face of each connected set. A closed set is then flipped as a whole
/// when the volume it encloses is negative, so that it faces outward. An
/// open set is flipped when fewer than half of its faces kept the
/// orientation the assembler gave them.
pub fn orient_shells(model: &mut Model) -> OrientOutcome {
    let mut outcome = OrientOutcome::default();
    let shells: Vec<ShellId> = model
        .body_ids()
        .iter()
        .flat_map(|&body| model.body(body).shells.clone())
        .collect();

    for shell in shells {
        let faces = model.shell(shell).faces.clone();
        let mut uses: HashMap<EdgeId, (usize, Orientation)> = HashMap::new();
        for (i, oriented) in faces.iter().enumerate() {
            for oe in model.face_edges(oriented.face) {
                uses.insert(oe.edge, (i, oe.orientation));
            }
        }

        let mut assigned: Vec<Option<Orientation>> = vec![None; faces.len()];
        for seed in 0..faces.len() {
            if assigned[seed].is_some() {
                continue;
            }
            assigned[seed] = Some(faces[seed].orientation);
            let mut members = vec![seed];
            let mut queue = VecDeque::from([seed]);
            while let Some(i) = queue.pop_front() {
                let Some(fa) = assigned[i] else { continue };
                for oe in model.face_edges(faces[i].face) {
                    let Some(twin) = model.edge(oe.edge).twin else { continue };
                    let Some(&(j, tb)) = uses.get(&twin) else { continue };
                    let c: i8 = if model.same_direction(oe.edge, twin) { 1 } else { -1 };
                    let wanted = Orientation::from_sign(
                        -(fa.sign() * oe.orientation.sign() * tb.sign() * c),
                    );
                    match assigned[j] {
                        None => {
                            assigned[j] = Some(wanted);
                            members.push(j);
                            queue.push_back(j);
                        }
                        Some(current) if current != wanted => outcome.conflicts += 1,
                        Some(_) => {}
                    }
                }
            }

            let in_set: HashSet<usize> = members.iter().copied().collect();
            let closed = members.iter().all(|&m| {
                model.face_edges(faces[m].face).iter().all(|oe| {
                    model
                        .edge(oe.edge)
                        .twin
                        .and_then(|twin| uses.get(&twin))
                        .is_some_and(|(j, _)| in_set.contains(j))
                })
            });
            let inverted = if closed {
                let oriented: Vec<(FaceId, Orientation)> = members
                    .iter()
                    .filter_map(|&m| assigned[m].map(|o| (faces[m].face, o)))
                    .collect();
                let volume = enclosed_volume(model, &oriented);
                debug!(shell = ?shell, faces = members.len(), volume, "closed face set");
                volume < 0.0
            } else {
                let kept = members
                    .iter()
                    .filter(|&&m| assigned[m] == Some(faces[m].orientation))
                    .count();
                kept * 2 < members.len()
            };
            if inverted {
                for &m in &members {
                    assigned[m] = assigned[m].map(Orientation::reversed);
                }
            }
        }

        for (i, oriented) in faces.iter().enumerate() {
            let orientation = assigned[i].unwrap_or(oriented.orientation);
            if orientation != oriented.orientation {
                outcome.flipped += 1;
                model.shells[shell].faces[i].orientation = orientation;
            }
        }
    }

    // Each disagreeing pair is seen from both sides.
    outcome.conflicts /= 2;
    if outcome.conflicts > 0 {
        warn!(conflicts = outcome.conflicts, "shells are not orientable");
    }
    model.orientation = OrientationState::Resolved;
    outcome
}

/// Signed volume bounded by oriented faces, by the divergence theorem:
/// one third of the flux of the position field through each face,
/// negated for `Back` faces. Negative when the faces point inward.
pub fn enclosed_volume(model: &Model, faces: &[(FaceId, Orientation)]) -> f64 {
    let flux: f64 = faces
        .iter()
        .map(|&(face, orientation)| f64::from(orientation.sign()) * face_flux(model, face))
        .sum();
    flux / 3.0
}

/// Midpoint-rule integral of `S . (S_u x S_v)` over the trimmed parameter
/// region of a face.
fn face_flux(model: &Model, face: FaceId) -> f64 {
    let polygons = model.face_uv_polygons(face, FLUX_EDGE_SAMPLES);
    let Some(((u0, u1), (v0, v1))) = polygon_bounds(&polygons) else {
        return 0.0;
    };
    let surface = model.face_surface(face);
    let du = (u1 - u0) / FLUX_CELLS as f64;
    let dv = (v1 - v0) / FLUX_CELLS as f64;
    let mut flux = 0.0;
    for i in 0..FLUX_CELLS {
        for j in 0..FLUX_CELLS {
            let uv = Point2::new(u0 + (i as f64 + 0.5) * du, v0 + (j as f64 + 0.5) * dv);
            if !point_in_polygons(&polygons, &uv) {
                continue;
            }
            let (p, su, sv) = surface.derivatives(uv.x, uv.y);
            flux += p.coords.dot(&su.cross(&sv));
        }
    }
    flux * du * dv
}
