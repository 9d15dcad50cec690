//! Session control for an external simulation backend.
//!
//! Provides:
//! - the backend capability trait and the provider that loads models
//! - backend selection from execution mode and FMI version
//! - the session lifecycle (load, initialize, reset, terminate, close)
//! - macro/micro stepping with drift tolerance and fault containment
//! - name-based bulk variable access with kind coercion

pub mod access;
pub mod backend;
pub mod error;
pub mod experiment;
pub mod mode;
pub mod observation;
pub mod options;
pub mod session;
pub mod stepping;

use std::collections::BTreeMap;

// Re-exports for public API
pub use access::VariableAccess;
pub use backend::{BackendError, BackendProvider, BackendResult, InstanceSpec, SimBackend};
pub use error::{SimError, SimResult};
pub use experiment::ExperimentWindow;
pub use mode::{BackendKind, ExecutionMode, FmiVersion, select_backend_kind};
pub use observation::Observation;
pub use options::LoadOptions;
pub use session::{LifecycleState, LoadedModel, Session};
pub use stepping::{StepClock, StepOutcome};

/// Named values supplied by the caller (config or actions).
pub type Values = BTreeMap<String, f64>;
