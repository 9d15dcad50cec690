//! Reserved field names synthesized by the session rather than the backend.

/// Config and action field overriding the macro step size.
pub const STEP_SIZE: &str = "FMU_step_size";
/// Config field splitting each macro step into micro-steps of this size.
pub const SUBSTEP_SIZE: &str = "FMU_substep_size";
/// Config field enabling per-call backend logging for one episode.
pub const LOGGING: &str = "FMU_logging";
/// State field: 1 if the previous step hit a backend fault, else 0.
pub const ERROR: &str = "FMU_error";
/// State field: simulation time at the end of the last step.
pub const TIME: &str = "FMU_time";

pub const CONFIG_FIELDS: [&str; 3] = [STEP_SIZE, SUBSTEP_SIZE, LOGGING];
pub const ACTION_FIELDS: [&str; 1] = [STEP_SIZE];
pub const STATE_FIELDS: [&str; 2] = [ERROR, TIME];

/// Whether `name` is claimed by a synthesized field in any group.
pub fn is_reserved(name: &str) -> bool {
    CONFIG_FIELDS.contains(&name) || ACTION_FIELDS.contains(&name) || STATE_FIELDS.contains(&name)
}
