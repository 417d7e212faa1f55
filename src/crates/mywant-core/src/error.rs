//! Error kinds for the execution engine, grounded in the teacher's
//! `GraphError` enum shape.

use thiserror::Error;

/// Convenience result type used throughout `mywant-core`.
pub type Result<T> = std::result::Result<T, WantError>;

/// The five error kinds named in spec §7, plus ambient I/O wraps.
#[derive(Error, Debug)]
pub enum WantError {
    /// Malformed config, unknown type, connectivity violation, owner cycle.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation incompatible with the want's current status.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unknown want id.
    #[error("not found: {0}")]
    NotFound(String),

    /// A step function failed; the want transitions to `Failed`.
    #[error("runtime error in want '{want_id}': {message}")]
    Runtime { want_id: String, message: String },

    /// The fabric is closed.
    #[error("fabric error: {0}")]
    Fabric(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl WantError {
    /// A short machine-readable kind tag, for the HTTP error body and CLI.
    pub fn kind(&self) -> &'static str {
        match self {
            WantError::Validation(_) => "validation",
            WantError::Conflict(_) => "conflict",
            WantError::NotFound(_) => "not_found",
            WantError::Runtime { .. } => "runtime",
            WantError::Fabric(_) => "fabric",
            WantError::Io(_) => "io",
            WantError::Json(_) => "serialization",
            WantError::Yaml(_) => "serialization",
        }
    }
}
