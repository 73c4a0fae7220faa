//! Crate error type.
//!
//! Only I/O-facing paths return `Result`: archives, parameter files and
//! parameter validation. Geometry and topology operations report through
//! `Option`, `bool` and report structs instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A parameter is out of range, e.g. a negative tolerance.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// An archive refers to an entity it does not contain.
    #[error("Malformed archive: {0}")]
    Archive(String),
}

pub type Result<T> = std::result::Result<T, Error>;
