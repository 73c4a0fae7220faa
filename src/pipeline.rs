//! End-to-end conversion: records → topology → sewn shells → mesh.
//!
//! Bodies on symmetric layers are emitted twice: as modelled and mirrored
//! across the y = 0 plane.
//!
//! Each conversion owns its `Session`, so independent scenes convert in
//! parallel with rayon without sharing any state.

use crate::assembler::{Assembler, AssemblyReport};
use crate::config::ImportParameters;
use crate::error::Result;
use crate::session::Session;
use crate::source::BodyRecord;
use crate::stitch::{StitchReport, Stitcher};
use crate::tessellate::{tessellator, MeshRecord, ModelMesh};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::info;

/// Everything one conversion produced.
#[derive(Debug)]
pub struct Conversion {
    pub session: Session,
    pub assembly: AssemblyReport,
    pub stitch: StitchReport,
    pub mesh: ModelMesh,
    /// Patch ids whose sections are also emitted mirrored.
    pub symmetric_patches: BTreeSet<u32>,
}

impl Conversion {
    pub fn record(&self) -> MeshRecord {
        let mut record = self.mesh.to_record();
        if !self.symmetric_patches.is_empty() {
            let mirror = record.mirrored(&self.symmetric_patches);
            record.append(mirror);
        }
        record
    }
}

/// Assemble, stitch and tessellate `bodies` in a fresh session.
pub fn import(bodies: &[BodyRecord], params: &ImportParameters) -> Result<Conversion> {
    params.validate()?;
    let mut session = Session::from_parameters(params);

    let assembly = {
        let mut assembler = Assembler::new(&mut session, params.unit_scale);
        for body in bodies {
            assembler.add_body(body);
        }
        assembler.report()
    };
    let symmetric_patches = session.symmetric_patches();

    let stitcher = Stitcher::from_parameters(params, session.tolerance());
    let stitch = stitcher.run(session.model_mut());

    let backend = tessellator(params.tessellator, session.tolerance().geometric);
    let mesh = backend.tessellate(session.model(), &params.kernel_criteria());
    info!(
        bodies = assembly.bodies,
        faces = assembly.faces,
        triangles = mesh.triangle_count(),
        "conversion done"
    );

    Ok(Conversion {
        session,
        assembly,
        stitch,
        mesh,
        symmetric_patches,
    })
}

/// Convert `bodies` straight to a mesh record.
pub fn convert(bodies: &[BodyRecord], params: &ImportParameters) -> Result<MeshRecord> {
    import(bodies, params).map(|c| c.record())
}

/// Convert independent scenes in parallel; results keep the input order.
pub fn convert_batch(scenes: &[Vec<BodyRecord>], params: &ImportParameters) -> Vec<Result<MeshRecord>> {
    scenes.par_iter().map(|scene| convert(scene, params)).collect()
}
