//! Backend capability contract.
//!
//! A `SimBackend` is one instantiated model engine. A `BackendProvider` knows
//! how to read a model package's static metadata, unpack it into a working
//! directory, and create the backend variant chosen at load time.

use std::path::{Path, PathBuf};

use fb_model::{ModelDescription, ScalarValue, ValueRef};

use crate::mode::BackendKind;

/// A failed backend call.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Backend call '{call}' failed: {message}")]
pub struct BackendError {
    pub call: &'static str,
    pub message: String,
}

impl BackendError {
    pub fn new(call: &'static str, message: impl Into<String>) -> Self {
        Self {
            call,
            message: message.into(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Operations an instantiated model engine exposes.
///
/// Calls are issued only in legal lifecycle order by the session.
pub trait SimBackend {
    fn instantiate(&mut self) -> BackendResult<()>;

    /// Soft reset of an existing instance, cheaper than re-instantiation.
    fn reset(&mut self) -> BackendResult<()>;

    fn setup_experiment(&mut self, start_time: f64) -> BackendResult<()>;

    fn enter_initialization_mode(&mut self) -> BackendResult<()>;

    fn exit_initialization_mode(&mut self) -> BackendResult<()>;

    fn terminate(&mut self) -> BackendResult<()>;

    fn free_instance(&mut self) -> BackendResult<()>;

    /// Bulk read, one value per reference, in order.
    fn read(&mut self, refs: &[ValueRef]) -> BackendResult<Vec<f64>>;

    /// Bulk write; `refs` and `values` have equal length.
    fn write(&mut self, refs: &[ValueRef], values: &[ScalarValue]) -> BackendResult<()>;

    /// Whether the engine can advance time. Steady-state engines return false.
    fn supports_stepping(&self) -> bool {
        true
    }

    fn do_step(&mut self, current_time: f64, step_size: f64) -> BackendResult<()>;

    /// Toggle per-call logging inside the engine.
    fn set_call_logging(&mut self, _enabled: bool) {}
}

/// Identity of the engine instance to create.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSpec {
    pub guid: String,
    pub model_identifier: String,
    pub working_dir: PathBuf,
    pub instance_name: String,
}

/// Loads model packages and creates backend instances for them.
pub trait BackendProvider {
    /// Read the static metadata of the model at `model_path`.
    fn describe(&self, model_path: &Path) -> BackendResult<ModelDescription>;

    /// Unpack the model package into `dest`.
    fn extract(&self, model_path: &Path, dest: &Path) -> std::io::Result<()>;

    /// Create the backend variant selected for this model.
    fn create(&self, kind: BackendKind, spec: &InstanceSpec) -> BackendResult<Box<dyn SimBackend>>;
}
