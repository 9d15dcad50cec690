//! Experiment time window.

use fb_model::DefaultExperiment;

use crate::error::{SimError, SimResult};

/// Start/stop time and default macro step of an experiment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExperimentWindow {
    pub start_time: f64,
    /// `f64::MAX` when the model never stops on its own.
    pub stop_time: f64,
    pub step_size: f64,
}

impl Default for ExperimentWindow {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            stop_time: f64::MAX,
            step_size: 1.0,
        }
    }
}

impl ExperimentWindow {
    /// Defaults overridden by whatever the model declares, then validated.
    pub fn from_declared(declared: Option<&DefaultExperiment>) -> SimResult<Self> {
        let mut window = Self::default();
        if let Some(d) = declared {
            if let Some(start) = d.start_time {
                window.start_time = start;
            }
            if let Some(stop) = d.stop_time {
                window.stop_time = stop;
            }
            if let Some(step) = d.step_size {
                window.step_size = step;
            }
        }
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(self.stop_time > self.start_time) {
            return Err(SimError::InvalidModel {
                message: format!(
                    "stop time ({}) must be greater than start time ({})",
                    self.stop_time, self.start_time
                ),
            });
        }
        if !(self.step_size > 0.0) {
            return Err(SimError::InvalidModel {
                message: format!("step size ({}) must be positive", self.step_size),
            });
        }
        if self.step_size > self.stop_time - self.start_time {
            return Err(SimError::InvalidModel {
                message: format!(
                    "step size ({}) is greater than the experiment span [{}, {}]",
                    self.step_size, self.start_time, self.stop_time
                ),
            });
        }
        Ok(())
    }

    pub fn is_open_ended(&self) -> bool {
        self.stop_time == f64::MAX
    }
}
