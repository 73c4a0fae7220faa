//! Sewing: link free boundary edges that coincide geometrically.
//!
//! Candidates are free (untwinned) active edges of active faces. They are
//! swept in order of their midpoint's x coordinate; every pair within
//! tolerance at both ends and at the midpoint is scored by its largest
//! deviation, and pairs are linked best-first.

use super::components;
use crate::math::{distance_squared, Point3};
use crate::topo::*;
use std::collections::HashMap;
use tracing::debug;

/// A free edge with its sampled geometry.
struct Candidate {
    edge: EdgeId,
    group: usize,
    start: Point3,
    end: Point3,
    mid: Point3,
}

/// Free edges of active faces, grouped by body when `per_body` is set and
/// all in one group otherwise.
fn free_edges(model: &Model, per_body: bool, edge_length: f64) -> Vec<Candidate> {
    let mut bodies: HashMap<BodyId, usize> = HashMap::new();
    let mut candidates = Vec::new();
    for (shell, oriented) in model.active_faces() {
        let group = match model.shell(shell).body {
            Some(body) if per_body => {
                let next = bodies.len();
                *bodies.entry(body).or_insert(next)
            }
            _ => 0,
        };
        for oe in model.face_edges(oriented.face) {
            let edge = model.edge(oe.edge);
            if !edge.is_active() || edge.twin.is_some() || edge.length < edge_length {
                continue;
            }
            let (start, end) = model.edge_end_points(oe.edge);
            candidates.push(Candidate {
                edge: oe.edge,
                group,
                start,
                end,
                mid: model.edge_mid_point(oe.edge),
            });
        }
    }
    candidates
}

/// Largest deviation between two edges, or `None` when beyond `tolerance`.
fn deviation(a: &Candidate, b: &Candidate, tolerance: f64) -> Option<f64> {
    let sq = tolerance * tolerance;
    let mid = distance_squared(&a.mid, &b.mid);
    if mid > sq {
        return None;
    }
    let same = distance_squared(&a.start, &b.start).max(distance_squared(&a.end, &b.end));
    let opposite = distance_squared(&a.start, &b.end).max(distance_squared(&a.end, &b.start));
    let ends = same.min(opposite);
    (ends <= sq).then(|| ends.max(mid).sqrt())
}

/// Link free edges closer than `tolerance`. Returns the number of new pairs.
///
/// Edges pair end to end only. A long edge facing several shorter ones
/// (a T-junction) matches none of them and stays free; edges are never
/// split at the projections of neighbouring vertices.
pub fn sew_pass(model: &mut Model, per_body: bool, tolerance: f64, edge_length: f64) -> usize {
    let mut candidates = free_edges(model, per_body, edge_length);
    candidates.sort_by(|a, b| a.mid.x.total_cmp(&b.mid.x));

    let mut pairs = Vec::new();
    for i in 0..candidates.len() {
        for j in i + 1..candidates.len() {
            if candidates[j].mid.x - candidates[i].mid.x > tolerance {
                break;
            }
            if candidates[i].group != candidates[j].group || candidates[i].edge == candidates[j].edge
            {
                continue;
            }
            if let Some(score) = deviation(&candidates[i], &candidates[j], tolerance) {
                pairs.push((score, i, j));
            }
        }
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut linked = 0;
    let square = tolerance * tolerance;
    for (score, i, j) in pairs {
        let (a, b) = (candidates[i].edge, candidates[j].edge);
        if model.edge(a).twin.is_some() || model.edge(b).twin.is_some() {
            continue;
        }
        if model.link_if_coincident(a, b, edge_length, square) {
            debug!(edge = ?a, twin = ?b, deviation = score, "edges sewn");
            linked += 1;
        }
    }
    linked
}

/// Active edges of active faces without a twin.
pub fn open_edge_count(model: &Model) -> usize {
    model
        .active_faces()
        .iter()
        .flat_map(|(_, oriented)| model.face_edges(oriented.face))
        .filter(|oe| {
            let edge = model.edge(oe.edge);
            edge.is_active() && edge.twin.is_none()
        })
        .count()
}

/// Gather every connected set of faces into one shell.
///
/// The shell of the first face of a set receives the others; shells left
/// empty are removed, and so are bodies left without shells. Returns the
/// number of bodies removed by merging.
pub fn merge_connected(model: &mut Model) -> usize {
    let faces = model.active_faces();
    let ids: Vec<FaceId> = faces.iter().map(|(_, of)| of.face).collect();
    let labels = components(model, &ids);

    let mut target: HashMap<usize, ShellId> = HashMap::new();
    let mut moves = Vec::new();
    for ((shell, oriented), label) in faces.iter().zip(&labels) {
        let home = *target.entry(*label).or_insert(*shell);
        if home != *shell {
            moves.push((*shell, home, *oriented));
        }
    }

    let mut touched = Vec::new();
    for (from, to, oriented) in moves {
        model.shells[from].faces.retain(|f| f.face != oriented.face);
        model.shell_add_face(to, oriented.face, oriented.orientation);
        if !touched.contains(&from) {
            touched.push(from);
        }
        let (from_body, to_body) = (model.shell(from).body, model.shell(to).body);
        if from_body != to_body {
            debug!(from = ?from_body, to = ?to_body, "bodies joined by sewing");
        }
    }

    let mut removed_bodies = 0;
    for shell in touched {
        if !model.shell(shell).faces.is_empty() {
            continue;
        }
        let body = model.shell(shell).body;
        model.remove_shell(shell);
        if let Some(body) = body {
            if model.body(body).shells.is_empty() {
                model.remove_body(body);
                removed_bodies += 1;
            }
        }
    }
    removed_bodies
}

/// Delete faces whose surface is thinner than `tolerance` in one
/// iso-direction. Returns the number of deleted faces.
#[cfg(feature = "thin-faces")]
pub fn remove_thin_faces(model: &mut Model, tolerance: f64) -> usize {
    let thin: Vec<FaceId> = model
        .active_faces()
        .into_iter()
        .map(|(_, oriented)| oriented.face)
        .filter(|&face| model.face_surface(face).is_degenerate(tolerance))
        .collect();
    for &face in &thin {
        debug!(patch_id = model.face(face).patch_id, "thin face removed");
        model.delete_face(face);
    }
    thin.len()
}

#[cfg(not(feature = "thin-faces"))]
pub fn remove_thin_faces(_model: &mut Model, _tolerance: f64) -> usize {
    0
}

/// Delete every face whose boundary edges all coincide with boundary
/// edges of one earlier face. Returns the number of deleted faces.
pub fn remove_duplicated_faces(model: &mut Model, tolerance: f64) -> usize {
    let sq = tolerance * tolerance;
    let faces: Vec<FaceId> = model
        .active_faces()
        .into_iter()
        .map(|(_, oriented)| oriented.face)
        .collect();
    let samples: Vec<Vec<[Point3; 3]>> = faces
        .iter()
        .map(|&face| {
            model
                .face_edges(face)
                .iter()
                .filter(|oe| model.edge(oe.edge).is_active())
                .map(|oe| {
                    let (s, e) = model.edge_end_points(oe.edge);
                    [s, model.edge_mid_point(oe.edge), e]
                })
                .collect()
        })
        .collect();

    let matches = |a: &[Point3; 3], b: &[Point3; 3]| {
        distance_squared(&a[1], &b[1]) <= sq
            && ((distance_squared(&a[0], &b[0]) <= sq && distance_squared(&a[2], &b[2]) <= sq)
                || (distance_squared(&a[0], &b[2]) <= sq && distance_squared(&a[2], &b[0]) <= sq))
    };

    let mut removed = vec![false; faces.len()];
    for i in 0..faces.len() {
        if samples[i].is_empty() {
            continue;
        }
        let duplicate = (0..i).any(|j| {
            !removed[j]
                && samples[j].len() == samples[i].len()
                && samples[i]
                    .iter()
                    .all(|a| samples[j].iter().any(|b| matches(a, b)))
        });
        if duplicate {
            removed[i] = true;
        }
    }

    let mut count = 0;
    for (face, _) in faces.iter().zip(&removed).filter(|(_, r)| **r) {
        debug!(patch_id = model.face(*face).patch_id, "duplicated face removed");
        model.delete_face(*face);
        count += 1;
    }
    count
}
