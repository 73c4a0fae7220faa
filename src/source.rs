//! Input records consumed by the kernel.
//!
//! These mirror the minimal per-entity data a CAD reader hands over: control
//! points, knots, weights and twin references. They are plain data, owned
//! by the caller, and never referenced by the kernel after ingestion.

use crate::math::Matrix4;
use serde::{Deserialize, Serialize};

/// Stable identity of a source trim curve, assigned by the reader.
///
/// Twin references point at another curve's `SourceCurveId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceCurveId(pub u64);

/// Frame in which surface control points are expressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceFrame {
    Local,
    Parent,
    #[default]
    World,
}

/// Raw NURBS surface as stored by the source modeler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRecord {
    pub degree_u: usize,
    pub degree_v: usize,
    pub poles_u: usize,
    pub poles_v: usize,
    /// Real knots in U, `poles_u - degree_u + 1` values.
    pub knots_u: Vec<f64>,
    /// Real knots in V, `poles_v - degree_v + 1` values.
    pub knots_v: Vec<f64>,
    /// Homogeneous control points `[x, y, z, w]` in source length units,
    /// U-major: the pole `(iu, iv)` is at `iu * poles_v + iv`. The
    /// cartesian part is not premultiplied by the weight.
    pub control_points: Vec<[f64; 4]>,
    #[serde(default)]
    pub frame: ReferenceFrame,
    /// Affine transform from `frame` to world. Ignored for `World`.
    #[serde(default)]
    pub transform: Option<Matrix4>,
}

/// Raw 2D trimming curve in the parameter plane of its surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrimCurveRecord {
    pub id: SourceCurveId,
    pub degree: usize,
    /// Real knots, `control_points.len() - degree + 1` values.
    pub knots: Vec<f64>,
    /// `[u, v, w]`, the third component being the weight.
    pub control_points: Vec<[f64; 3]>,
    /// The matching curve on the adjoining patch, when the reader knows it.
    #[serde(default)]
    pub twin: Option<SourceCurveId>,
    /// Set when the curve runs against the boundary's traversal direction.
    #[serde(default)]
    pub reversed: bool,
}

/// One closed boundary of a trim region: curves in traversal order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrimBoundaryRecord {
    pub curves: Vec<TrimCurveRecord>,
}

/// A trim region: the first boundary is the outer one, the others holes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrimRegionRecord {
    pub boundaries: Vec<TrimBoundaryRecord>,
}

/// A surface and the regions trimmed out of it. Each region yields a face.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrimmedSurfaceRecord {
    pub surface: SurfaceRecord,
    pub regions: Vec<TrimRegionRecord>,
    /// Orientation flag as declared by the source modeler. Its convention
    /// is inverted relative to the kernel: `true` means the face is used
    /// with its `Back` side out.
    #[serde(default)]
    pub source_orientation: bool,
    /// Overrides the body's material slot for this surface.
    #[serde(default)]
    pub material_slot: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShellRecord {
    pub surfaces: Vec<TrimmedSurfaceRecord>,
}

/// Layer a body belongs to in the source scene.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerRecord {
    /// Identity of the layer in the source scene.
    pub key: u64,
    pub name: String,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
    #[serde(default)]
    pub symmetric: bool,
}

fn visible_by_default() -> bool {
    true
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyRecord {
    #[serde(default)]
    pub name: String,
    pub shells: Vec<ShellRecord>,
    #[serde(default)]
    pub material_slot: u32,
    #[serde(default)]
    pub layer: Option<LayerRecord>,
}

/// Derive a stable material slot from a shader name.
///
/// The slot is a 24-bit packed RGB colour taken from the top three bytes
/// of a case-insensitive FNV-1a hash, so the same shader always lands in
/// the same slot across imports and re-tessellations.
pub fn material_slot_from_name(name: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in name.bytes().map(|b| b.to_ascii_lowercase()) {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    let red = (hash & 0xff00_0000) >> 24;
    let green = (hash & 0x00ff_0000) >> 16;
    let blue = (hash & 0x0000_ff00) >> 8;
    (red << 16) | (green << 8) | blue
}
