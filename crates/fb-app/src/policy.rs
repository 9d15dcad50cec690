//! Policies mapping an observed state to an action.

use fb_sim::{Observation, Values};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait Policy {
    fn act(&mut self, state: &Observation) -> Values;
}

impl<F> Policy for F
where
    F: FnMut(&Observation) -> Values,
{
    fn act(&mut self, state: &Observation) -> Values {
        self(state)
    }
}

/// Ignores the state; draws every action uniformly from `[low, high]`.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    actions: Vec<String>,
    low: f64,
    high: f64,
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(actions: Vec<String>, low: f64, high: f64, seed: u64) -> Self {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        Self {
            actions,
            low,
            high,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn act(&mut self, _state: &Observation) -> Values {
        self.actions
            .iter()
            .map(|name| (name.clone(), self.rng.gen_range(self.low..=self.high)))
            .collect()
    }
}

/// Always returns the same action.
#[derive(Debug, Clone, Default)]
pub struct ConstantPolicy(pub Values);

impl Policy for ConstantPolicy {
    fn act(&mut self, _state: &Observation) -> Values {
        self.0.clone()
    }
}
