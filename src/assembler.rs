//! Topology assembly from source records.
//!
//! Walks body → shell → trimmed surface → region → boundary → curve and
//! builds Edges, Loops, Faces, Shells and a Body in the session's `Model`.
//! Twin edges are resolved through a map keyed by the source curve id,
//! filled while a boundary's edges are built and consumed once its loop
//! exists. The map is cleared per body: bodies never twin-link to each
//! other at assembly time.

use crate::builder::{build_surface, build_trim_curve};
use crate::curve::RestrictionCurve;
use crate::layer::LayerCache;
use crate::session::{Session, Tolerance};
use crate::source::{
    BodyRecord, ShellRecord, SourceCurveId, TrimBoundaryRecord, TrimCurveRecord,
    TrimRegionRecord, TrimmedSurfaceRecord,
};
use crate::topo::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Counters collected while assembling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub bodies: usize,
    pub shells: usize,
    pub faces: usize,
    /// Faces dropped because none of their loops survived.
    pub degenerate_faces: usize,
    pub skipped_surfaces: usize,
    /// Loops whose orientation could not be trusted.
    pub doubtful_loops: usize,
    pub linked_twins: usize,
}

pub struct Assembler<'a> {
    model: &'a mut Model,
    layers: &'a mut LayerCache,
    tolerance: Tolerance,
    unit_scale: f64,
    twin_map: HashMap<SourceCurveId, EdgeId>,
    report: AssemblyReport,
}

impl<'a> Assembler<'a> {
    /// `unit_scale` converts source lengths to millimetres.
    pub fn new(session: &'a mut Session, unit_scale: f64) -> Self {
        let (model, layers, tolerance) = session.parts_mut();
        Self {
            model,
            layers,
            tolerance,
            unit_scale,
            twin_map: HashMap::new(),
            report: AssemblyReport::default(),
        }
    }

    pub fn report(&self) -> AssemblyReport {
        self.report
    }

    /// Add a body. Bodies on invisible layers, and bodies without a
    /// non-empty shell, yield `None`.
    pub fn add_body(&mut self, record: &BodyRecord) -> Option<BodyId> {
        if let Some(layer) = &record.layer {
            if !layer.visible {
                debug!(body = %record.name, layer = %layer.name, "body on hidden layer skipped");
                return None;
            }
        }
        let layer = record.layer.as_ref().map(|l| self.layers.find_or_add(l));

        self.twin_map.clear();
        let shells: Vec<ShellId> = record
            .shells
            .iter()
            .filter_map(|shell| self.add_shell(shell, record.material_slot))
            .collect();
        if shells.is_empty() {
            warn!(body = %record.name, "body without faces skipped");
            return None;
        }

        let body = self.model.add_body(Body {
            name: record.name.clone(),
            shells,
            material_slot: record.material_slot,
            layer,
        });
        self.report.bodies += 1;
        info!(
            body = %record.name,
            shells = self.model.body(body).shells.len(),
            "body assembled"
        );
        Some(body)
    }

    /// Add a shell; an empty result is discarded and yields `None`.
    pub fn add_shell(&mut self, record: &ShellRecord, material_slot: u32) -> Option<ShellId> {
        let shell = self.model.add_shell();
        for surface in &record.surfaces {
            self.add_trimmed_surface(shell, surface, material_slot);
        }
        if self.model.shell(shell).faces.is_empty() {
            self.model.remove_shell(shell);
            return None;
        }
        self.report.shells += 1;
        Some(shell)
    }

    /// Build one surface and a face per trim region, added to `shell`.
    ///
    /// The source orientation flag is inverted: `true` puts the face in the
    /// shell with its `Back` side.
    pub fn add_trimmed_surface(
        &mut self,
        shell: ShellId,
        record: &TrimmedSurfaceRecord,
        material_slot: u32,
    ) -> Vec<FaceId> {
        let Some(surface) = build_surface(&record.surface, self.unit_scale) else {
            self.report.skipped_surfaces += 1;
            return Vec::new();
        };
        if surface.is_degenerate(self.tolerance.geometric) {
            warn!("degenerate surface skipped");
            self.report.skipped_surfaces += 1;
            return Vec::new();
        }
        let surface = self.model.add_surface(surface);
        let orientation = if record.source_orientation {
            Orientation::Back
        } else {
            Orientation::Front
        };
        let material_slot = record.material_slot.unwrap_or(material_slot);

        let mut faces = Vec::new();
        for region in &record.regions {
            if let Some(face) = self.add_trim_region(surface, region, material_slot) {
                self.model.shell_add_face(shell, face, orientation);
                faces.push(face);
            }
        }
        faces
    }

    /// Build a face from a trim region: the first boundary is external,
    /// the others holes. A region without boundaries, or whose boundaries
    /// all fail, yields no face.
    pub fn add_trim_region(
        &mut self,
        surface: SurfaceId,
        record: &TrimRegionRecord,
        material_slot: u32,
    ) -> Option<FaceId> {
        if record.boundaries.is_empty() {
            debug!("trim region without boundaries skipped");
            return None;
        }
        let face = self.model.add_face(surface, material_slot);
        let loops: Vec<LoopId> = record
            .boundaries
            .iter()
            .enumerate()
            .filter_map(|(i, boundary)| self.add_trim_boundary(surface, boundary, i == 0))
            .collect();
        if loops.is_empty() {
            warn!(patch_id = self.model.face(face).patch_id, "face without loops deleted");
            self.model.mark_degenerate(face);
            self.report.degenerate_faces += 1;
            return None;
        }

        let doubtful = self.model.add_loops(face, &loops);
        if doubtful > 0 {
            debug!(
                patch_id = self.model.face(face).patch_id,
                doubtful, "loop orientation doubtful"
            );
        }
        self.report.doubtful_loops += doubtful;
        self.report.faces += 1;
        Some(face)
    }

    /// Build the edges of one boundary, close them into a loop, then link
    /// the twins of its curves.
    pub fn add_trim_boundary(
        &mut self,
        surface: SurfaceId,
        record: &TrimBoundaryRecord,
        external: bool,
    ) -> Option<LoopId> {
        let mut edges = Vec::with_capacity(record.curves.len());
        let mut twinned = Vec::new();
        for curve in &record.curves {
            if let Some(edge) = self.add_edge(surface, curve) {
                edges.push(edge);
                if let Some(twin) = curve.twin {
                    twinned.push((curve.id, twin));
                }
            }
        }
        if edges.is_empty() {
            return None;
        }

        let orientations = vec![Orientation::Front; edges.len()];
        let Some(lp) =
            self.model
                .make_loop(&edges, &orientations, external, self.tolerance.geometric)
        else {
            for edge in edges {
                self.model.delete_edge(edge);
            }
            return None;
        };

        self.link_twins(&twinned);
        Some(lp)
    }

    /// Build the edge of one trim curve. Curves declaring a twin are
    /// registered under their own source id.
    pub fn add_edge(&mut self, surface: SurfaceId, record: &TrimCurveRecord) -> Option<EdgeId> {
        let curve = build_trim_curve(record)?;
        let edge = self.model.add_edge(
            RestrictionCurve::new(surface, curve),
            self.tolerance.geometric,
        );
        if record.twin.is_some() {
            self.twin_map.insert(record.id, edge);
        }
        Some(edge)
    }

    /// Link each `(curve, twin)` pair whose edges both exist and are usable.
    /// Returns the number of pairs linked by this call.
    pub fn link_twins(&mut self, pairs: &[(SourceCurveId, SourceCurveId)]) -> usize {
        let mut linked = 0;
        for (curve, twin) in pairs {
            let (Some(&a), Some(&b)) = (self.twin_map.get(curve), self.twin_map.get(twin)) else {
                continue;
            };
            if self.model.edge(a).twin == Some(b) {
                continue;
            }
            if self.model.link_if_coincident(
                a,
                b,
                self.tolerance.edge_length(),
                self.tolerance.square(),
            ) {
                linked += 1;
            }
        }
        self.report.linked_twins += linked;
        linked
    }
}
