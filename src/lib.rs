//! brepweld: trimmed-NURBS B-Rep assembly, sewing and tessellation.
//!
//! Source records (NURBS surfaces with trimming curves) are turned into a
//! topological model, sewn into connected and consistently oriented
//! shells, and tessellated into a mesh whose shared edges are crack-free.
//!
//! # Example
//!
//! ```rust,no_run
//! use brepweld::config::ImportParameters;
//! use brepweld::source::BodyRecord;
//!
//! let json = std::fs::read_to_string("scene.json").unwrap();
//! let bodies: Vec<BodyRecord> = serde_json::from_str(&json).unwrap();
//! let mesh = brepweld::pipeline::convert(&bodies, &ImportParameters::default()).unwrap();
//! let mut out = std::fs::File::create("scene.obj").unwrap();
//! brepweld::export::write_obj(&mesh, &mut out).unwrap();
//! ```

pub mod archive;
pub mod assembler;
pub mod builder;
pub mod config;
pub mod curve;
pub mod error;
pub mod export;
pub mod layer;
pub mod math;
pub mod nurbs;
pub mod pipeline;
pub mod session;
pub mod source;
pub mod stitch;
pub mod surface;
pub mod tessellate;
pub mod topo;

pub use assembler::{Assembler, AssemblyReport};
pub use config::{ImportParameters, StitchOptions, StitchingTechnique, TessellationCriteria, TessellatorKind};
pub use error::{Error, Result};
pub use session::{Session, Tolerance};
pub use stitch::{StitchReport, Stitcher};
pub use tessellate::{
    tessellator, GridTessellator, KernelTessellator, MeshRecord, ModelMesh, RetessellatePolicy, Tessellator,
};
