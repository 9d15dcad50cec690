//! Error types for model metadata and role resolution.

use std::path::PathBuf;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("Invalid model: {message}")]
    InvalidModel { message: String },

    #[error(
        "Model interface could not be resolved from a cached assignment nor from variable \
         causality. A draft was written to {}; edit it, remove the '_EDIT' suffix, and load \
         the model again",
        .draft_path.display()
    )]
    UnresolvableModelInterface { draft_path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ModelError::InvalidModel {
            message: message.into(),
        }
    }
}
