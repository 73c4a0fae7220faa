//! Structural validation of a `Model`.
//!
//! Checks invariants the assembler and stitcher must preserve:
//! - Twin links are symmetric and join active edges
//! - Every face keeps its external loop at index 0, holes after it
//! - Every loop is closed in 3D and in its surface's parameter plane
//! - Face and shell back-references agree

use super::store::Model;
use super::types::*;
use crate::math::distance_squared;

/// Result of model validation.
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validate every active entity of `model` against `tolerance` (mm).
pub fn validate_model(model: &Model, tolerance: f64) -> ValidationResult {
    let mut errors = Vec::new();

    // 1. Twin symmetry
    for (id, edge) in model.edges.iter() {
        let Some(twin) = edge.twin else { continue };
        match model.edges.get(twin) {
            Some(other) if other.twin == Some(id) => {
                if !edge.is_active() || !other.is_active() {
                    errors.push(format!("Edge {id:?}: twin link to inactive edge {twin:?}"));
                }
            }
            Some(other) => errors.push(format!(
                "Edge {id:?}: twin {twin:?} points back to {:?}",
                other.twin
            )),
            None => errors.push(format!("Edge {id:?}: twin {twin:?} does not exist")),
        }
    }

    // 2. Loop order and closure
    let sq = tolerance * tolerance;
    for (face_id, face) in model.faces.iter() {
        if !face.is_active() {
            continue;
        }
        for (i, &loop_id) in face.loops.iter().enumerate() {
            let Some(lp) = model.loops.get(loop_id) else {
                errors.push(format!("Face {face_id:?}: loop {loop_id:?} does not exist"));
                continue;
            };
            if lp.external != (i == 0) {
                errors.push(format!(
                    "Face {face_id:?}: loop {i} has external = {}",
                    lp.external
                ));
            }
            if lp.face != Some(face_id) {
                errors.push(format!("Loop {loop_id:?}: face is {:?}", lp.face));
            }
            if !is_loop_closed(model, lp, sq) {
                errors.push(format!("Face {face_id:?}: loop {loop_id:?} is not closed"));
            }
            if let Some(position) = model.uv_gap(&lp.edges, tolerance) {
                errors.push(format!(
                    "Face {face_id:?}: loop {loop_id:?} is open in the parameter plane before edge {position}"
                ));
            }
        }
    }

    // 3. Shell membership
    for (shell_id, shell) in model.shells.iter() {
        for oriented in &shell.faces {
            match model.faces.get(oriented.face) {
                Some(face) if face.shell == Some(shell_id) => {}
                Some(face) => errors.push(format!(
                    "Face {:?}: listed in {shell_id:?} but belongs to {:?}",
                    oriented.face, face.shell
                )),
                None => errors.push(format!(
                    "Shell {shell_id:?}: face {:?} does not exist",
                    oriented.face
                )),
            }
        }
        if let Some(body) = shell.body {
            if !model.bodies.get(body).is_some_and(|b| b.shells.contains(&shell_id)) {
                errors.push(format!("Shell {shell_id:?}: not listed by body {body:?}"));
            }
        }
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
    }
}

/// Check that consecutive edges of a loop meet and the last meets the first.
fn is_loop_closed(model: &Model, lp: &Loop, square_tolerance: f64) -> bool {
    let n = lp.edges.len();
    (0..n).all(|i| {
        let (_, end) = model.oriented_end_points(lp.edges[i]);
        let (start, _) = model.oriented_end_points(lp.edges[(i + 1) % n]);
        distance_squared(&end, &start) <= square_tolerance
    })
}
