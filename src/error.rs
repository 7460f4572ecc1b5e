use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrajError {
    #[error("no such file: `{}`", .0.display())]
    NotFound(PathBuf),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{format} format: {details}")]
    Format { format: String, details: String },
    #[error("{format} format: not enough lines at step {step} (expected {expected}, got {got})")]
    UnexpectedEof {
        format: String,
        step: usize,
        expected: usize,
        got: usize,
    },
    #[error("Missing token")]
    MissingToken,
    #[error("Failed to parse float: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),
    #[error("Failed to parse integer: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
    #[error("invalid trajectory header: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not find `{marker}` in `{}`; file content was:\n{content}", .path.display())]
    Parse {
        marker: String,
        path: PathBuf,
        content: String,
    },
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("frame {frame} has no `{name}` field")]
    MissingField { frame: usize, name: String },
    #[error("Unsupported file format: `{0}`")]
    UnsupportedFormat(String),
}

impl TrajError {
    pub fn format(format: &str, details: impl Into<String>) -> Self {
        TrajError::Format {
            format: format.to_string(),
            details: details.into(),
        }
    }

    pub fn missing(frame: usize, name: &str) -> Self {
        TrajError::MissingField {
            frame,
            name: name.to_string(),
        }
    }
}
