//! Conversion session: owns the `Model`, its tolerances and the layer cache.
//!
//! Tolerances are fixed once the first entity exists. A session is used
//! from one thread; independent sessions may run in parallel.

use crate::config::ImportParameters;
use crate::error::Result;
use crate::layer::LayerCache;
use crate::math::{DEFAULT_GEOMETRIC_TOLERANCE, DEFAULT_STITCHING_TOLERANCE};
use crate::topo::Model;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// Session tolerances in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerance {
    /// Distance under which two points are the same.
    pub geometric: f64,
    /// Distance under which sewing joins two boundaries.
    pub stitching: f64,
}

impl Tolerance {
    /// Edges shorter than this collapse to a point.
    pub fn edge_length(&self) -> f64 {
        2.0 * self.geometric
    }

    /// Squared geometric tolerance, for squared-distance tests.
    pub fn square(&self) -> f64 {
        self.geometric * self.geometric
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            geometric: DEFAULT_GEOMETRIC_TOLERANCE,
            stitching: DEFAULT_STITCHING_TOLERANCE,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Session {
    model: Model,
    tolerance: Tolerance,
    layers: LayerCache,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(geometric: f64, stitching: f64) -> Self {
        let mut session = Self::new();
        session.set_tolerance(geometric, stitching);
        session
    }

    /// Start a session for one import and log its parameters.
    pub fn from_parameters(params: &ImportParameters) -> Self {
        info!(
            chord_tolerance = params.chord_tolerance,
            max_edge_length = params.max_edge_length,
            normal_tolerance = params.normal_tolerance,
            technique = ?params.stitching_technique,
            geometric_tolerance = params.geometric_tolerance,
            stitching_tolerance = params.stitching_tolerance,
            "import parameters"
        );
        Self::with_tolerance(
            params.kernel_geometric_tolerance(),
            params.kernel_stitching_tolerance(),
        )
    }

    /// Change the tolerances of an empty session.
    ///
    /// Panics when the model already holds entities.
    pub fn set_tolerance(&mut self, geometric: f64, stitching: f64) {
        assert_eq!(
            self.model.entity_count(),
            0,
            "Tolerance cannot change once the model holds entities"
        );
        assert!(geometric > 0.0 && stitching > 0.0, "Tolerances must be positive");
        self.tolerance = Tolerance {
            geometric,
            stitching,
        };
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn layers(&self) -> &LayerCache {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerCache {
        &mut self.layers
    }

    /// Model and layer cache borrowed together.
    pub(crate) fn parts_mut(&mut self) -> (&mut Model, &mut LayerCache, Tolerance) {
        (&mut self.model, &mut self.layers, self.tolerance)
    }

    /// Patch ids of the faces of bodies on symmetric layers.
    pub fn symmetric_patches(&self) -> BTreeSet<u32> {
        let model = &self.model;
        model
            .body_ids()
            .iter()
            .map(|&id| model.body(id))
            .filter(|body| body.layer.and_then(|l| self.layers.get(l)).is_some_and(|l| l.symmetric))
            .flat_map(|body| body.shells.iter())
            .flat_map(|&shell| model.shell(shell).faces.iter())
            .map(|f| model.face(f.face).patch_id)
            .collect()
    }

    /// Forget every cached layer; call between independent imports.
    pub fn reset_layers(&mut self) {
        self.layers.reset();
    }

    /// Write the model, tolerances and layers as a JSON archive.
    pub fn save_archive(&self, path: impl AsRef<Path>) -> Result<()> {
        let archive = crate::archive::Archive::from_session(self);
        let file = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer(file, &archive)?;
        Ok(())
    }

    /// Restore a session written by [`Session::save_archive`].
    pub fn load_archive(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::io::BufReader::new(std::fs::File::open(path)?);
        let archive: crate::archive::Archive = serde_json::from_reader(file)?;
        archive.into_session()
    }

    pub(crate) fn from_parts(model: Model, tolerance: Tolerance, layers: LayerCache) -> Self {
        Self {
            model,
            tolerance,
            layers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nurbs::knot::pad_clamped_knots;
    use crate::nurbs::NurbsSurface;
    use crate::math::Point3;
    use crate::surface::Surface;

    #[test]
    fn derived_tolerances() {
        let session = Session::with_tolerance(0.01, 0.1);
        let tol = session.tolerance();
        assert!((tol.edge_length() - 0.02).abs() < 1e-15);
        assert!((tol.square() - 1e-4).abs() < 1e-15);
    }

    #[test]
    fn parameters_convert_to_millimetres() {
        let session = Session::from_parameters(&ImportParameters::default());
        assert!((session.tolerance().geometric - 0.01).abs() < 1e-12);
        assert!((session.tolerance().stitching - 0.1).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "Tolerance cannot change")]
    fn tolerance_is_frozen_once_entities_exist() {
        let mut session = Session::new();
        session.model_mut().add_surface(Surface::new(NurbsSurface::new(
            1,
            1,
            pad_clamped_knots(&[0.0, 1.0], 1),
            pad_clamped_knots(&[0.0, 1.0], 1),
            vec![
                vec![Point3::origin(), Point3::new(0.0, 1.0, 0.0)],
                vec![Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0)],
            ],
            vec![vec![1.0; 2]; 2],
        )));
        session.set_tolerance(0.5, 1.0);
    }
}
