// ================================================================
// File: oscbridge-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OSC decode error: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Address pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Argument type error: {0}")]
    ArgType(String),

    #[error("Output shape conflict: resolved to {expected} value(s), got {actual}")]
    ShapeConflict { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
