//! Error types for STG2Seq.

use thiserror::Error;

/// Result type alias for STG2Seq operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or evaluating the model.
#[derive(Error, Debug)]
pub enum Error {
    // Shape errors
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported output_dim {0}: expected 1 or 2")]
    InvalidOutputDim(usize),

    // Graph errors
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Eigenvalue solver failed: {0}")]
    EigenSolverFailed(String),

    #[error("Degenerate graph: {0}")]
    DegenerateGraph(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Logging errors
    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a shape mismatch error from anything printable.
    pub fn shape(
        context: impl Into<String>,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        Error::ShapeMismatch {
            context: context.into(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::ShapeMismatch {
            context: "ndarray".to_string(),
            expected: "compatible layout".to_string(),
            actual: err.to_string(),
        }
    }
}
