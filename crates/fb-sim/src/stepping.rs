//! Macro/micro time advance.
//!
//! One macro step of size `Δ` is issued to the backend as micro-steps of at
//! most `δ`. The loop stops once time is within `0.001·δ` of the target so
//! floating-point drift never produces a vanishing final micro-step.

use crate::backend::{BackendError, BackendResult};

/// Fraction of the micro-step tolerated as drift at the end of a macro step.
pub const STOP_TOLERANCE_FRACTION: f64 = 0.001;

/// Simulation clock with the current macro and micro step sizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepClock {
    pub time: f64,
    pub step_size: f64,
    pub substep_size: f64,
}

/// What one macro step did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// Micro-steps the backend completed.
    pub substeps: usize,
    /// The backend failure that aborted the macro step, if any.
    pub fault: Option<BackendError>,
}

impl StepOutcome {
    pub fn faulted(&self) -> bool {
        self.fault.is_some()
    }
}

impl StepClock {
    pub fn new(time: f64, step_size: f64, substep_size: f64) -> Self {
        Self {
            time,
            step_size,
            substep_size,
        }
    }

    pub fn tolerance(&self) -> f64 {
        STOP_TOLERANCE_FRACTION * self.substep_size
    }

    /// Advance by one macro step, calling `do_step(t, h)` per micro-step.
    ///
    /// Time moves only by completed micro-steps. The first failure aborts
    /// the rest of the macro step and is returned in the outcome. A micro-step
    /// too small to change `time` at its magnitude is reported as a fault
    /// without calling the backend.
    pub fn advance<F>(&mut self, mut do_step: F) -> StepOutcome
    where
        F: FnMut(f64, f64) -> BackendResult<()>,
    {
        let target = self.time + self.step_size;
        let tolerance = self.tolerance();
        let mut outcome = StepOutcome::default();

        while self.time + tolerance < target {
            let next = self.substep_size.min(target - self.time);
            if self.time + next == self.time {
                outcome.fault = Some(BackendError::new(
                    "do_step",
                    format!("micro-step {next} cannot advance time {}", self.time),
                ));
                break;
            }
            match do_step(self.time, next) {
                Ok(()) => {
                    self.time += next;
                    outcome.substeps += 1;
                }
                Err(e) => {
                    outcome.fault = Some(e);
                    break;
                }
            }
        }
        outcome
    }
}
