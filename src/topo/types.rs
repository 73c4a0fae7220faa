//! Topology entity types and typed handles.

use super::arena::Handle;
use crate::curve::RestrictionCurve;
use crate::layer::LayerId;
use crate::surface::Surface;
use serde::{Deserialize, Serialize};

pub type SurfaceId = Handle<Surface>;
pub type EdgeId = Handle<Edge>;
pub type LoopId = Handle<Loop>;
pub type FaceId = Handle<Face>;
pub type ShellId = Handle<Shell>;
pub type BodyId = Handle<Body>;

/// Which side of an entity is used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Front,
    Back,
}

impl Orientation {
    pub fn reversed(self) -> Self {
        match self {
            Orientation::Front => Orientation::Back,
            Orientation::Back => Orientation::Front,
        }
    }

    pub fn is_front(self) -> bool {
        self == Orientation::Front
    }

    /// +1 for `Front`, -1 for `Back`.
    pub fn sign(self) -> i8 {
        match self {
            Orientation::Front => 1,
            Orientation::Back => -1,
        }
    }

    pub fn from_sign(sign: i8) -> Self {
        if sign >= 0 {
            Orientation::Front
        } else {
            Orientation::Back
        }
    }
}

/// Whether face orientations of a model can be trusted.
///
/// The assembler only produces provisional orientations; they become
/// resolved once the stitcher has oriented the shells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrientationState {
    #[default]
    Provisional,
    Resolved,
}

/// A topological edge wrapping one trimming curve.
#[derive(Clone, Debug)]
pub struct Edge {
    pub curve: RestrictionCurve,
    /// The matching edge of the neighbouring face, linked symmetrically.
    pub twin: Option<EdgeId>,
    /// The loop this edge was put in, if any.
    pub owner: Option<LoopId>,
    /// Stable per-model key, kept across archive round trips.
    pub serial: u32,
    /// Estimated 3D length in millimetres.
    pub length: f64,
    pub degenerate: bool,
    pub deleted: bool,
}

impl Edge {
    /// Usable by loops, twin linking and tessellation.
    pub fn is_active(&self) -> bool {
        !self.degenerate && !self.deleted
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrientedEdge {
    pub edge: EdgeId,
    pub orientation: Orientation,
}

/// A closed cycle of oriented edges bounding a face.
///
/// External loops run counter-clockwise in the surface's parameter plane,
/// holes clockwise.
#[derive(Clone, Debug)]
pub struct Loop {
    pub edges: Vec<OrientedEdge>,
    pub external: bool,
    pub face: Option<FaceId>,
}

/// A bounded region of one surface. Loop 0 is the external loop.
#[derive(Clone, Debug)]
pub struct Face {
    pub surface: SurfaceId,
    pub loops: Vec<LoopId>,
    /// Creation order, also the stable key of the face's mesh section.
    pub patch_id: u32,
    /// Opaque colour/material slot handed through to the mesh.
    pub material_slot: u32,
    pub shell: Option<ShellId>,
    pub degenerate: bool,
    pub deleted: bool,
}

impl Face {
    pub fn is_active(&self) -> bool {
        !self.degenerate && !self.deleted
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrientedFace {
    pub face: FaceId,
    pub orientation: Orientation,
}

/// A set of oriented faces forming one, possibly open, boundary surface.
#[derive(Clone, Debug, Default)]
pub struct Shell {
    pub faces: Vec<OrientedFace>,
    pub body: Option<BodyId>,
}

/// Unit of tessellation output.
#[derive(Clone, Debug, Default)]
pub struct Body {
    pub name: String,
    pub shells: Vec<ShellId>,
    pub material_slot: u32,
    pub layer: Option<LayerId>,
}
