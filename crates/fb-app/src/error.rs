//! Error types for the fb-app layer.

use std::path::PathBuf;

/// Application error wrapping the lower layers for CLI use.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Failed to read config file {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fb-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<fb_model::ModelError> for AppError {
    fn from(err: fb_model::ModelError) -> Self {
        AppError::Model(err.to_string())
    }
}

impl From<fb_sim::SimError> for AppError {
    fn from(err: fb_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}
