//! Error types for session operations.

use std::path::PathBuf;

use fb_model::ModelError;
use thiserror::Error;

use crate::backend::BackendError;

/// Errors surfaced to the caller of a session.
///
/// Backend faults during stepping are not errors; they are recorded on the
/// session and reported through `halted()`.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid model: {message}")]
    InvalidModel { message: String },

    #[error(
        "Unresolvable model interface: edit the draft at {} and load again",
        .draft_path.display()
    )]
    UnresolvableModelInterface { draft_path: PathBuf },

    #[error("Unsupported model type: {message}")]
    UnsupportedModelType { message: String },

    #[error("Session not initialized: call initialize_model before '{operation}'")]
    SessionNotInitialized { operation: &'static str },

    #[error("Session closed: cannot call '{operation}'")]
    SessionClosed { operation: &'static str },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model metadata error: {message}")]
    Metadata { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<ModelError> for SimError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::InvalidModel { message } => SimError::InvalidModel { message },
            ModelError::UnresolvableModelInterface { draft_path } => {
                SimError::UnresolvableModelInterface { draft_path }
            }
            ModelError::Io(e) => SimError::Io(e),
            other => SimError::Metadata {
                message: other.to_string(),
            },
        }
    }
}
