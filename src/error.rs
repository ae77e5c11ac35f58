//! Error type shared by every fallible operation in the crate.

use thiserror::Error;

/// Precondition failures reported by filtering, rasterization and record
/// manipulation.
///
/// "No data" and "insufficient data" outcomes of the queries are not errors;
/// they are variants of the query result types.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("record is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("variable time step (dt = 0): {0} requires a fixed sample rate")]
    VariableTimeStep(&'static str),

    #[error("{what} index {index} is out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("notch frequency {freq} kHz is invalid for sample rate {fs} kHz")]
    InvalidFrequency { freq: f64, fs: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("record (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RasterError>;
