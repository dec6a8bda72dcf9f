use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LumpError {
    #[error("Configuration error for {molecule}: {reason}")]
    Configuration { molecule: String, reason: String },

    #[error("Filtering removed every state of {molecule} ({predicate})")]
    FilterExhaustion { molecule: String, predicate: String },

    #[error("Data integrity error for {molecule}: {reason}")]
    DataIntegrity { molecule: String, reason: String },

    #[error("Parse error in {path}, line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Output directory is not empty: {0}")]
    OutputExists(PathBuf),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type LumpResult<T> = Result<T, LumpError>;

impl LumpError {
    pub(crate) fn config(molecule: &str, reason: impl Into<String>) -> Self {
        LumpError::Configuration {
            molecule: molecule.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn integrity(molecule: &str, reason: impl Into<String>) -> Self {
        LumpError::DataIntegrity {
            molecule: molecule.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(feature = "python")]
impl From<LumpError> for pyo3::PyErr {
    fn from(err: LumpError) -> pyo3::PyErr {
        pyo3::exceptions::PyRuntimeError::new_err(err.to_string())
    }
}
