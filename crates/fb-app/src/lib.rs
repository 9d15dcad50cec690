//! Application layer for the FMU bridge.
//!
//! Wraps a session the way a training platform drives it (episodes, steps,
//! observed state), and provides a local episode runner, an iteration log,
//! and an in-process demo model for running the stack end to end.

pub mod error;
pub mod iteration_log;
pub mod local_run;
pub mod policy;
pub mod simulator_session;
pub mod van_der_pol;

// Re-export key types for convenience
pub use error::{AppError, AppResult};
pub use iteration_log::{IterationLog, IterationRecord};
pub use local_run::{LocalRunOptions, LocalRunSummary, load_episode_config, run_local};
pub use policy::{ConstantPolicy, Policy, RandomPolicy};
pub use simulator_session::SimulatorSession;
pub use van_der_pol::VanDerPolProvider;
