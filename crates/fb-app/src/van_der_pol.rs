//! In-process demo model: a forced van der Pol oscillator.
//!
//! ```text
//! x0' = x1
//! x1' = mu * (1 - x0^2) * x1 - x0 + u
//! ```
//!
//! Exposed as an FMI 2.0 co-simulation model so the whole bridge can run
//! without an external engine. Integration is fixed-step RK4 with internal
//! steps of at most `MAX_INTERNAL_STEP`.

use std::path::Path;

use fb_model::{
    Causality, DeclaredType, DefaultExperiment, InterfaceDef, ModelDescription, ScalarValue,
    ValueRef, VariableDescriptor, save_description_yaml,
};
use fb_sim::{BackendError, BackendKind, BackendProvider, BackendResult, InstanceSpec, SimBackend};
use tracing::debug;

pub const MODEL_NAME: &str = "VanDerPol";
pub const GUID: &str = "{8c4e810f-3da3-4a00-8276-176fa3c9f000}";
pub const MODEL_IDENTIFIER: &str = "vanDerPol";

const VR_X0: ValueRef = 0;
const VR_DER_X0: ValueRef = 1;
const VR_X1: ValueRef = 2;
const VR_DER_X1: ValueRef = 3;
const VR_MU: ValueRef = 4;
const VR_U: ValueRef = 5;
const VR_LIMIT_CYCLE: ValueRef = 6;

const X_START: [f64; 2] = [2.0, 0.0];
const MU_START: f64 = 1.0;

/// Upper bound on one RK4 step inside `do_step`.
pub const MAX_INTERNAL_STEP: f64 = 0.01;

/// Static metadata of the demo model.
pub fn description() -> ModelDescription {
    let var = |name: &str, vr, declared_type, causality, start, description: &str| {
        VariableDescriptor {
            name: name.to_string(),
            value_reference: vr,
            declared_type,
            causality,
            start,
            description: Some(description.to_string()),
        }
    };
    ModelDescription {
        model_name: MODEL_NAME.to_string(),
        guid: GUID.to_string(),
        fmi_version: "2.0".to_string(),
        variables: vec![
            var("x0", VR_X0, DeclaredType::Real, Causality::Output, Some(X_START[0]), "position"),
            var("der(x0)", VR_DER_X0, DeclaredType::Real, Causality::Local, None, "velocity"),
            var("x1", VR_X1, DeclaredType::Real, Causality::Output, Some(X_START[1]), "velocity"),
            var("der(x1)", VR_DER_X1, DeclaredType::Real, Causality::Local, None, "acceleration"),
            var("mu", VR_MU, DeclaredType::Real, Causality::Parameter, Some(MU_START), "damping"),
            var("u", VR_U, DeclaredType::Real, Causality::Input, Some(0.0), "forcing"),
            var(
                "on_limit_cycle",
                VR_LIMIT_CYCLE,
                DeclaredType::Boolean,
                Causality::Local,
                None,
                "whether the trajectory reached the limit cycle",
            ),
        ],
        default_experiment: Some(DefaultExperiment {
            start_time: Some(0.0),
            stop_time: Some(20.0),
            step_size: Some(0.1),
        }),
        co_simulation: Some(InterfaceDef {
            model_identifier: MODEL_IDENTIFIER.to_string(),
        }),
        model_exchange: None,
        scheduled_execution: None,
    }
}

/// Provides the demo model for any model path.
#[derive(Debug, Clone, Copy, Default)]
pub struct VanDerPolProvider;

impl BackendProvider for VanDerPolProvider {
    fn describe(&self, _model_path: &Path) -> BackendResult<ModelDescription> {
        Ok(description())
    }

    fn extract(&self, _model_path: &Path, dest: &Path) -> std::io::Result<()> {
        save_description_yaml(&dest.join("modelDescription.yaml"), &description())
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    fn create(&self, kind: BackendKind, spec: &InstanceSpec) -> BackendResult<Box<dyn SimBackend>> {
        if kind != BackendKind::Fmi2CoSimulation {
            return Err(BackendError::new(
                "create",
                format!("demo model is FMI 2.0 co-simulation only, got {kind:?}"),
            ));
        }
        if spec.guid != GUID {
            return Err(BackendError::new("create", format!("unknown guid {}", spec.guid)));
        }
        Ok(Box::new(VanDerPolBackend::new(&spec.instance_name)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Instantiated,
    Initializing,
    Running,
    Terminated,
    Freed,
}

#[derive(Debug, Clone)]
pub struct VanDerPolBackend {
    instance_name: String,
    phase: Phase,
    x: [f64; 2],
    mu: f64,
    u: f64,
    time: f64,
    call_logging: bool,
}

impl VanDerPolBackend {
    pub fn new(instance_name: &str) -> Self {
        Self {
            instance_name: instance_name.to_string(),
            phase: Phase::Created,
            x: X_START,
            mu: MU_START,
            u: 0.0,
            time: 0.0,
            call_logging: false,
        }
    }

    /// Time reached by the last completed `do_step`.
    pub fn time(&self) -> f64 {
        self.time
    }

    fn derivative(&self, x: &[f64; 2]) -> [f64; 2] {
        [x[1], self.mu * (1.0 - x[0] * x[0]) * x[1] - x[0] + self.u]
    }

    fn trace(&self, call: &str) {
        if self.call_logging {
            debug!(target: "fmi", instance = %self.instance_name, call, "demo backend call");
        }
    }

    fn expect_phase(&self, call: &'static str, allowed: &[Phase]) -> BackendResult<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(BackendError::new(
                call,
                format!("illegal in phase {:?}", self.phase),
            ))
        }
    }

    fn restore_start_values(&mut self) {
        self.x = X_START;
        self.mu = MU_START;
        self.u = 0.0;
    }
}

/// One classical RK4 step of an autonomous 2-state system.
fn rk4_step(f: impl Fn(&[f64; 2]) -> [f64; 2], x: &[f64; 2], dt: f64) -> [f64; 2] {
    let add = |a: &[f64; 2], b: &[f64; 2], s: f64| [a[0] + s * b[0], a[1] + s * b[1]];

    let k1 = f(x);
    let k2 = f(&add(x, &k1, 0.5 * dt));
    let k3 = f(&add(x, &k2, 0.5 * dt));
    let k4 = f(&add(x, &k3, dt));

    // x_new = x + (dt/6) * (k1 + 2*k2 + 2*k3 + k4)
    let mut out = *x;
    for i in 0..2 {
        out[i] += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
    out
}

const LIVE: [Phase; 4] = [
    Phase::Instantiated,
    Phase::Initializing,
    Phase::Running,
    Phase::Terminated,
];

impl SimBackend for VanDerPolBackend {
    fn instantiate(&mut self) -> BackendResult<()> {
        self.trace("instantiate");
        self.expect_phase("instantiate", &[Phase::Created, Phase::Freed])?;
        self.restore_start_values();
        self.phase = Phase::Instantiated;
        Ok(())
    }

    fn reset(&mut self) -> BackendResult<()> {
        self.trace("reset");
        self.expect_phase("reset", &LIVE)?;
        self.restore_start_values();
        self.phase = Phase::Instantiated;
        Ok(())
    }

    fn setup_experiment(&mut self, start_time: f64) -> BackendResult<()> {
        self.trace("setup_experiment");
        self.expect_phase("setup_experiment", &[Phase::Instantiated])?;
        self.time = start_time;
        Ok(())
    }

    fn enter_initialization_mode(&mut self) -> BackendResult<()> {
        self.trace("enter_initialization_mode");
        self.expect_phase("enter_initialization_mode", &[Phase::Instantiated])?;
        self.phase = Phase::Initializing;
        Ok(())
    }

    fn exit_initialization_mode(&mut self) -> BackendResult<()> {
        self.trace("exit_initialization_mode");
        self.expect_phase("exit_initialization_mode", &[Phase::Initializing])?;
        self.phase = Phase::Running;
        Ok(())
    }

    fn terminate(&mut self) -> BackendResult<()> {
        self.trace("terminate");
        self.expect_phase("terminate", &[Phase::Running])?;
        self.phase = Phase::Terminated;
        Ok(())
    }

    fn free_instance(&mut self) -> BackendResult<()> {
        self.trace("free_instance");
        self.expect_phase("free_instance", &LIVE)?;
        self.phase = Phase::Freed;
        Ok(())
    }

    fn read(&mut self, refs: &[ValueRef]) -> BackendResult<Vec<f64>> {
        self.expect_phase("read", &LIVE)?;
        let der = self.derivative(&self.x);
        refs.iter()
            .map(|r| match *r {
                VR_X0 => Ok(self.x[0]),
                VR_DER_X0 => Ok(der[0]),
                VR_X1 => Ok(self.x[1]),
                VR_DER_X1 => Ok(der[1]),
                VR_MU => Ok(self.mu),
                VR_U => Ok(self.u),
                other => Err(BackendError::new("read", format!("unknown value reference {other}"))),
            })
            .collect()
    }

    fn write(&mut self, refs: &[ValueRef], values: &[ScalarValue]) -> BackendResult<()> {
        self.expect_phase("write", &LIVE)?;
        if refs.len() != values.len() {
            return Err(BackendError::new("write", "reference and value counts differ"));
        }
        for (r, v) in refs.iter().zip(values) {
            let v = v.as_f64();
            match *r {
                VR_X0 => self.x[0] = v,
                VR_X1 => self.x[1] = v,
                VR_U => self.u = v,
                VR_MU if self.phase == Phase::Running => {
                    return Err(BackendError::new("write", "mu is fixed after initialization"));
                }
                VR_MU => self.mu = v,
                other => {
                    return Err(BackendError::new(
                        "write",
                        format!("value reference {other} is not writable"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn do_step(&mut self, current_time: f64, step_size: f64) -> BackendResult<()> {
        self.trace("do_step");
        self.expect_phase("do_step", &[Phase::Running])?;
        if !(step_size > 0.0) {
            return Err(BackendError::new("do_step", format!("step size {step_size} must be positive")));
        }

        let n = (step_size / MAX_INTERNAL_STEP).ceil().max(1.0) as usize;
        let dt = step_size / n as f64;
        let mut x = self.x;
        for _ in 0..n {
            x = rk4_step(|s| self.derivative(s), &x, dt);
        }
        if !x.iter().all(|v| v.is_finite()) {
            return Err(BackendError::new(
                "do_step",
                format!("state diverged at t={current_time}"),
            ));
        }
        self.x = x;
        self.time = current_time + step_size;
        Ok(())
    }

    fn set_call_logging(&mut self, enabled: bool) {
        self.call_logging = enabled;
    }
}
