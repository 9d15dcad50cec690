//! Load-time options for a session.

use std::path::PathBuf;

use fb_model::StateInclusion;

/// FMI version assumed when a model does not declare a valid one.
pub const DEFAULT_FMI_VERSION: &str = "2.0";

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Fallback FMI version ("1.0", "2.0", "3.0").
    pub fmi_version: Option<String>,
    /// Skip extraction when the working directory already exists.
    pub reuse_extraction: bool,
    /// Working directory; defaults to `<model dir>/<model stem>_unzipped`.
    pub extraction_dir: Option<PathBuf>,
    /// Log every backend call for every episode.
    pub call_logging: bool,
    /// Groups appended to the outputs when reading all states.
    pub state_inclusion: StateInclusion,
    /// Where to write the interface descriptor, if anywhere.
    pub interface_path: Option<PathBuf>,
    /// Default micro-step; the macro step when unset.
    pub substep_size: Option<f64>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            fmi_version: Some(DEFAULT_FMI_VERSION.to_string()),
            reuse_extraction: false,
            extraction_dir: None,
            call_logging: false,
            state_inclusion: StateInclusion::default(),
            interface_path: None,
            substep_size: None,
        }
    }
}
