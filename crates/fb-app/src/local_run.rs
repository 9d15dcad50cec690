//! Local episode runner: drives a simulator with a policy, no platform.

use std::path::{Path, PathBuf};

use fb_sim::{Observation, Values};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::iteration_log::{IterationLog, IterationRecord};
use crate::policy::Policy;
use crate::simulator_session::SimulatorSession;

#[derive(Debug, Clone)]
pub struct LocalRunOptions {
    pub episodes: usize,
    /// Iterations per episode unless the simulator halts first.
    pub max_iterations: usize,
    /// Config passed to every `episode_start`.
    pub config: Values,
    /// Append every iteration to this CSV file.
    pub log_path: Option<PathBuf>,
}

impl Default for LocalRunOptions {
    fn default() -> Self {
        Self {
            episodes: 10,
            max_iterations: 288,
            config: Values::new(),
            log_path: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocalRunSummary {
    pub episodes: usize,
    pub iterations: usize,
    pub halted_episodes: usize,
    pub final_state: Observation,
}

/// Run `options.episodes` episodes against `sim`.
pub fn run_local(
    sim: &mut SimulatorSession,
    policy: &mut dyn Policy,
    options: &LocalRunOptions,
) -> AppResult<LocalRunSummary> {
    let mut log = options
        .log_path
        .as_ref()
        .map(IterationLog::open)
        .transpose()?;
    if let Some(log) = &log {
        info!(path = %log.path().display(), "logging iterations");
    }

    let mut summary = LocalRunSummary::default();
    for episode in 0..options.episodes {
        sim.episode_start(options.config.clone())?;
        let mut state = sim.state()?;

        for iteration in 0..options.max_iterations {
            let action = policy.act(&state);
            sim.episode_step(&action)?;
            state = sim.state()?;
            summary.iterations += 1;

            if let Some(log) = log.as_mut() {
                log.append(&IterationRecord {
                    state: &state,
                    action: &action,
                    config: sim.config(),
                    episode,
                    iteration,
                })?;
            }
            debug!(episode, iteration, ?state, "iteration");

            if sim.halted() {
                warn!(episode, iteration, "simulator halted, ending episode");
                summary.halted_episodes += 1;
                break;
            }
        }
        summary.episodes += 1;
        info!(episode, env = sim.env_name(), "episode finished");
    }
    summary.final_state = sim.state()?;
    Ok(summary)
}

/// Load an episode config (flat name → number map) from YAML.
pub fn load_episode_config(path: &Path) -> AppResult<Values> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_yaml::from_str(&content).map_err(|e| AppError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
