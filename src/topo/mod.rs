//! Arena-based topology.
//!
//! Entities (Surface, Edge, Loop, Face, Shell, Body) are stored in a central
//! `Model` and referenced via generation-checked handles.

pub mod arena;
pub mod store;
pub mod types;
pub mod validate;

pub use arena::{Arena, Handle};
pub use store::{point_in_polygons, polygon_bounds, signed_area, Model};
pub use types::*;
pub use validate::{validate_model, ValidationResult};
