//! Import parameters and tessellation criteria.
//!
//! `ImportParameters` is expressed in the host's units (centimetres and
//! degrees). `TessellationCriteria` is the kernel's view of the same
//! values (millimetres and radians), converted once by
//! [`ImportParameters::kernel_criteria`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};
use std::path::Path;
use std::str::FromStr;

/// How much topology repair runs after assembly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StitchingTechnique {
    /// Use the assembler's output as is.
    None,
    /// Sew within each body.
    Heal,
    /// Sew across the whole model; connected bodies merge.
    #[default]
    Sew,
}

impl FromStr for StitchingTechnique {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "heal" => Ok(Self::Heal),
            "sew" => Ok(Self::Sew),
            other => Err(Error::InvalidParameter {
                name: "stitching_technique",
                reason: format!("unknown technique '{other}'"),
            }),
        }
    }
}

/// Tessellation back-end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TessellatorKind {
    /// Trim-aware, crack-free along sewn edges.
    #[default]
    Kernel,
    /// Parameter grid over each face's loop bounds, clipped to the trims.
    Grid,
}

impl FromStr for TessellatorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kernel" => Ok(Self::Kernel),
            "grid" => Ok(Self::Grid),
            other => Err(Error::InvalidParameter {
                name: "tessellator",
                reason: format!("unknown tessellator '{other}'"),
            }),
        }
    }
}

/// Bitmask of sewing options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StitchOptions(pub u8);

impl StitchOptions {
    pub const NONE: Self = Self(0);
    /// Retry unmatched boundaries with the tolerance widened by the force factor.
    pub const FORCE_SEW: Self = Self(1);
    /// Drop faces thinner than the stitching tolerance before sewing.
    /// Honoured only with the `thin-faces` feature.
    pub const REMOVE_THIN_FACES: Self = Self(1 << 1);
    /// Drop faces whose whole boundary repeats an earlier face's boundary.
    pub const REMOVE_DUPLICATED_FACES: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self::FORCE_SEW | Self::REMOVE_THIN_FACES
    }
}

impl BitOr for StitchOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for StitchOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Parameters of one import, in host units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportParameters {
    /// Maximum chord deviation (cm).
    pub chord_tolerance: f64,
    /// Maximum triangle edge length (cm); 0 leaves it unconstrained.
    pub max_edge_length: f64,
    /// Maximum angle between adjacent normals (degrees).
    pub normal_tolerance: f64,
    pub stitching_technique: StitchingTechnique,
    pub stitch_options: StitchOptions,
    /// Multiplier on the stitching tolerance for the forced sewing pass.
    pub stitching_force_factor: f64,
    /// Geometric tolerance (cm).
    pub geometric_tolerance: f64,
    /// Sewing tolerance (cm).
    pub stitching_tolerance: f64,
    /// Host length unit to millimetres.
    pub unit_scale: f64,
    pub tessellator: TessellatorKind,
}

impl Default for ImportParameters {
    fn default() -> Self {
        Self {
            chord_tolerance: 0.2,
            max_edge_length: 0.0,
            normal_tolerance: 20.0,
            stitching_technique: StitchingTechnique::Sew,
            stitch_options: StitchOptions::default(),
            stitching_force_factor: 5.0,
            geometric_tolerance: 0.001,
            stitching_tolerance: 0.01,
            unit_scale: crate::math::MM_PER_CM,
            tessellator: TessellatorKind::Kernel,
        }
    }
}

impl ImportParameters {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Load parameters from `path` (or defaults) with `BREPWELD_*`
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut params = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        override_f64("BREPWELD_CHORD_TOLERANCE", &mut params.chord_tolerance);
        override_f64("BREPWELD_MAX_EDGE_LENGTH", &mut params.max_edge_length);
        override_f64("BREPWELD_NORMAL_TOLERANCE", &mut params.normal_tolerance);
        override_f64("BREPWELD_GEOMETRIC_TOLERANCE", &mut params.geometric_tolerance);
        override_f64("BREPWELD_STITCHING_TOLERANCE", &mut params.stitching_tolerance);
        override_f64("BREPWELD_FORCE_FACTOR", &mut params.stitching_force_factor);
        if let Ok(technique) = std::env::var("BREPWELD_STITCHING_TECHNIQUE") {
            params.stitching_technique = technique.parse()?;
        }
        if let Ok(kind) = std::env::var("BREPWELD_TESSELLATOR") {
            params.tessellator = kind.parse()?;
        }

        params.validate()?;
        Ok(params)
    }

    /// Reject negative, zero or non-finite values where they make no sense.
    pub fn validate(&self) -> Result<()> {
        positive("chord_tolerance", self.chord_tolerance)?;
        positive("normal_tolerance", self.normal_tolerance)?;
        positive("geometric_tolerance", self.geometric_tolerance)?;
        positive("stitching_tolerance", self.stitching_tolerance)?;
        positive("unit_scale", self.unit_scale)?;
        if !(self.max_edge_length.is_finite() && self.max_edge_length >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "max_edge_length",
                reason: format!("must be >= 0, got {}", self.max_edge_length),
            });
        }
        if !(self.stitching_force_factor.is_finite() && self.stitching_force_factor >= 1.0) {
            return Err(Error::InvalidParameter {
                name: "stitching_force_factor",
                reason: format!("must be >= 1, got {}", self.stitching_force_factor),
            });
        }
        if self.normal_tolerance >= 180.0 {
            return Err(Error::InvalidParameter {
                name: "normal_tolerance",
                reason: format!("must be below 180 degrees, got {}", self.normal_tolerance),
            });
        }
        Ok(())
    }

    /// Geometric tolerance in millimetres.
    pub fn kernel_geometric_tolerance(&self) -> f64 {
        self.geometric_tolerance * self.unit_scale
    }

    /// Stitching tolerance in millimetres.
    pub fn kernel_stitching_tolerance(&self) -> f64 {
        self.stitching_tolerance * self.unit_scale
    }

    /// Tessellation criteria in kernel units.
    pub fn kernel_criteria(&self) -> TessellationCriteria {
        TessellationCriteria::new(
            self.chord_tolerance * self.unit_scale,
            self.max_edge_length * self.unit_scale,
            self.normal_tolerance.to_radians(),
        )
        .with_min_element_size(2.0 * self.kernel_geometric_tolerance())
    }
}

fn override_f64(var: &str, value: &mut f64) {
    if let Some(parsed) = std::env::var(var).ok().and_then(|v| v.parse().ok()) {
        *value = parsed;
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name,
            reason: format!("must be a positive number, got {value}"),
        })
    }
}

/// Mesh quality bounds in kernel units (millimetres, radians).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TessellationCriteria {
    /// Maximum distance between a triangle and the surface.
    pub chord_tolerance: f64,
    /// Maximum triangle edge length; 0 leaves it unconstrained.
    pub max_edge_length: f64,
    /// Maximum angle between normals of adjacent samples.
    pub normal_tolerance: f64,
    /// Elements are never split below this size.
    pub min_element_size: f64,
    /// Same as `max_edge_length`, 0 when unconstrained.
    pub max_element_size: f64,
    /// Same as `chord_tolerance`.
    pub max_sag: f64,
}

impl TessellationCriteria {
    pub fn new(chord_tolerance: f64, max_edge_length: f64, normal_tolerance: f64) -> Self {
        Self {
            chord_tolerance,
            max_edge_length,
            normal_tolerance,
            min_element_size: chord_tolerance * 1e-3,
            max_element_size: max_edge_length,
            max_sag: chord_tolerance,
        }
    }

    pub fn with_min_element_size(mut self, size: f64) -> Self {
        self.min_element_size = size;
        self
    }

    /// Whether a segment of `length` violates the edge length bound.
    pub fn too_long(&self, length: f64) -> bool {
        self.max_edge_length > 0.0 && length > self.max_edge_length
    }
}

impl Default for TessellationCriteria {
    fn default() -> Self {
        ImportParameters::default().kernel_criteria()
    }
}
