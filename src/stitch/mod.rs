//! Topology repair: sew coincident boundaries, split shells into connected
//! parts, orient them.
//!
//! The `Stitcher` runs the three passes in that order, gated by the
//! stitching technique. With `StitchingTechnique::None` it leaves the
//! model untouched.

pub mod sew;
pub mod shells;

pub use shells::OrientOutcome;

use crate::config::{ImportParameters, StitchOptions, StitchingTechnique};
use crate::session::Tolerance;
use crate::topo::*;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

/// What a stitching run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StitchReport {
    pub sewn_edges: usize,
    /// Pairs linked only by the widened tolerance pass.
    pub forced_edges: usize,
    pub removed_thin_faces: usize,
    pub removed_duplicated_faces: usize,
    /// Bodies absorbed into another body by sewing.
    pub merged_bodies: usize,
    pub created_shells: usize,
    pub flipped_faces: usize,
    /// Free edges left after sewing.
    pub open_edges: usize,
}

impl StitchReport {
    /// True when no free boundary is left.
    pub fn closed(&self) -> bool {
        self.open_edges == 0
    }
}

#[derive(Clone, Debug)]
pub struct Stitcher {
    pub technique: StitchingTechnique,
    pub options: StitchOptions,
    /// Sewing tolerance (mm).
    pub tolerance: f64,
    /// Edges shorter than this are never sewn (mm).
    pub edge_length: f64,
    pub force_factor: f64,
}

impl Stitcher {
    pub fn new(technique: StitchingTechnique, tolerance: Tolerance) -> Self {
        Self {
            technique,
            options: StitchOptions::default(),
            tolerance: tolerance.stitching,
            edge_length: tolerance.edge_length(),
            force_factor: 5.0,
        }
    }

    pub fn from_parameters(params: &ImportParameters, tolerance: Tolerance) -> Self {
        Self {
            options: params.stitch_options,
            force_factor: params.stitching_force_factor,
            ..Self::new(params.stitching_technique, tolerance)
        }
    }

    pub fn with_options(mut self, options: StitchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_force_factor(mut self, force_factor: f64) -> Self {
        self.force_factor = force_factor;
        self
    }

    /// Sew, split into connected shells and orient, per the technique.
    pub fn run(&self, model: &mut Model) -> StitchReport {
        if self.technique == StitchingTechnique::None {
            debug!("stitching disabled, face orientation stays provisional");
            return StitchReport {
                open_edges: sew::open_edge_count(model),
                ..StitchReport::default()
            };
        }

        let mut report = self.sew(model);
        report.created_shells = self.split_into_connected_shells(model);
        let outcome = self.orient_shells(model);
        report.flipped_faces = outcome.flipped;

        info!(
            sewn = report.sewn_edges,
            forced = report.forced_edges,
            open = report.open_edges,
            merged_bodies = report.merged_bodies,
            new_shells = report.created_shells,
            flipped = report.flipped_faces,
            "stitching done"
        );
        report
    }

    /// Link coincident free edges and gather connected faces into common
    /// shells. `Heal` only sews within a body, `Sew` across the model.
    /// Pairs are matched end to end, so T-junctions stay open.
    pub fn sew(&self, model: &mut Model) -> StitchReport {
        let mut report = StitchReport::default();
        if self.technique == StitchingTechnique::None {
            report.open_edges = sew::open_edge_count(model);
            return report;
        }
        if self.options.contains(StitchOptions::REMOVE_THIN_FACES) {
            report.removed_thin_faces = sew::remove_thin_faces(model, self.tolerance);
        }
        if self.options.contains(StitchOptions::REMOVE_DUPLICATED_FACES) {
            report.removed_duplicated_faces = sew::remove_duplicated_faces(model, self.tolerance);
        }

        let per_body = self.technique == StitchingTechnique::Heal;
        report.sewn_edges = sew::sew_pass(model, per_body, self.tolerance, self.edge_length);
        if self.options.contains(StitchOptions::FORCE_SEW) && sew::open_edge_count(model) > 0 {
            report.forced_edges = sew::sew_pass(
                model,
                per_body,
                self.tolerance * self.force_factor,
                self.edge_length,
            );
            report.sewn_edges += report.forced_edges;
        }
        report.merged_bodies = sew::merge_connected(model);
        report.open_edges = sew::open_edge_count(model);
        if report.open_edges > 0 {
            warn!(open_edges = report.open_edges, "sewing left open boundaries");
        }
        report
    }

    pub fn split_into_connected_shells(&self, model: &mut Model) -> usize {
        shells::split_into_connected_shells(model)
    }

    pub fn orient_shells(&self, model: &mut Model) -> OrientOutcome {
        shells::orient_shells(model)
    }
}

/// Label `faces` by connected component through twin edges. Neighbours
/// outside `faces` are ignored. Labels start at 0 and follow first
/// appearance.
pub(crate) fn components(model: &Model, faces: &[FaceId]) -> Vec<usize> {
    let index: HashMap<FaceId, usize> = faces.iter().enumerate().map(|(i, &f)| (f, i)).collect();
    let mut labels = vec![usize::MAX; faces.len()];
    let mut next = 0;
    for start in 0..faces.len() {
        if labels[start] != usize::MAX {
            continue;
        }
        labels[start] = next;
        let mut queue = VecDeque::from([start]);
        while let Some(i) = queue.pop_front() {
            for oe in model.face_edges(faces[i]) {
                let neighbour = model
                    .edge(oe.edge)
                    .twin
                    .and_then(|twin| model.edge_face(twin))
                    .and_then(|face| index.get(&face));
                if let Some(&j) = neighbour {
                    if labels[j] == usize::MAX {
                        labels[j] = next;
                        queue.push_back(j);
                    }
                }
            }
        }
        next += 1;
    }
    labels
}
