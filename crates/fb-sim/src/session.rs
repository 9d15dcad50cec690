//! Session lifecycle controller.
//!
//! ```text
//! Unloaded -> Instantiated -> Initialized <-> (reset) -> Terminated -> Closed
//! ```
//!
//! Every operation except `load`, `initialize_model`, `terminate`, `close`
//! and the getters requires an initialized session.

use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, Timelike};
use fb_model::{
    Approver, InterfaceDescriptor, ModelDescription, Resolution, ResolveRequest, Role,
    RoleAssignment, RoleStore, StateInclusion, VariableCatalog, reserved, resolve_roles,
};
use tracing::{debug, info, warn};

use crate::Values;
use crate::access::VariableAccess;
use crate::backend::{BackendProvider, InstanceSpec, SimBackend};
use crate::error::{SimError, SimResult};
use crate::experiment::ExperimentWindow;
use crate::mode::{
    BackendKind, ExecutionMode, FmiVersion, declared_mode, resolve_fmi_version,
    select_backend_kind,
};
use crate::observation::Observation;
use crate::options::LoadOptions;
use crate::stepping::{StepClock, StepOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unloaded,
    Instantiated,
    Initialized,
    Terminated,
    Closed,
}

/// Everything resolved about a model at load time. Read-only afterwards.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub description: ModelDescription,
    pub catalog: VariableCatalog,
    pub resolution: Resolution,
    pub mode: ExecutionMode,
    pub fmi_version: FmiVersion,
    pub backend_kind: BackendKind,
    pub experiment: ExperimentWindow,
    pub instance: InstanceSpec,
}

/// A live model instance driven through its lifecycle.
pub struct Session {
    model: LoadedModel,
    backend: Box<dyn SimBackend>,
    clock: StepClock,
    default_substep: Option<f64>,
    instantiated: bool,
    initialized: bool,
    terminated: bool,
    closed: bool,
    error_occurred: bool,
    call_logging: bool,
    episode_call_logging: bool,
    state_names: Vec<String>,
}

impl Session {
    /// Resolve roles, unpack the model, and create its backend.
    pub fn load(
        provider: &dyn BackendProvider,
        model_path: &Path,
        options: &LoadOptions,
        approver: &mut dyn Approver,
    ) -> SimResult<Self> {
        let description = provider.describe(model_path)?;
        let mut catalog = VariableCatalog::build(&description)?;

        let store = RoleStore::for_model(model_path);
        let resolution = resolve_roles(
            &ResolveRequest {
                model_name: &description.model_name,
                catalog: &catalog,
                store: &store,
                inclusion: options.state_inclusion,
            },
            approver,
        )?;
        catalog.assign_roles(&resolution.assignment);

        if let Some(path) = &options.interface_path {
            resolution.interface.save_json(path)?;
            info!(path = %path.display(), "wrote interface descriptor");
        }

        let (mode, interface) = declared_mode(&description)?;
        let fmi_version =
            resolve_fmi_version(&description.fmi_version, options.fmi_version.as_deref())?;
        let backend_kind = select_backend_kind(mode, fmi_version)?;
        let experiment = ExperimentWindow::from_declared(description.default_experiment.as_ref())?;

        if let Some(substep) = options.substep_size {
            if !is_valid_step(substep) {
                return Err(SimError::InvalidModel {
                    message: format!("substep size ({substep}) must be positive and finite"),
                });
            }
        }

        let stem = model_stem(model_path);
        let working_dir = options
            .extraction_dir
            .clone()
            .unwrap_or_else(|| default_extraction_dir(model_path));
        let extraction = if options.reuse_extraction && working_dir.exists() {
            info!(dir = %working_dir.display(), "reusing extracted model");
            ExtractionGuard::reused()
        } else {
            let guard = ExtractionGuard::fresh(&working_dir);
            std::fs::create_dir_all(&working_dir)?;
            provider.extract(model_path, &working_dir)?;
            debug!(dir = %working_dir.display(), "extracted model");
            guard
        };

        let model_identifier = if interface.model_identifier.is_empty() {
            stem
        } else {
            interface.model_identifier.clone()
        };
        let instance = InstanceSpec {
            guid: description.guid.clone(),
            model_identifier,
            working_dir,
            instance_name: unique_instance_name(),
        };

        info!(
            model = %description.model_name,
            ?mode,
            fmi_version = %fmi_version,
            instance = %instance.instance_name,
            step_size = experiment.step_size,
            start_time = experiment.start_time,
            open_ended = experiment.is_open_ended(),
            "loaded model"
        );

        let mut backend = provider.create(backend_kind, &instance)?;
        backend.set_call_logging(options.call_logging);
        extraction.keep();

        let state_names = derive_state_names(&resolution.assignment, options.state_inclusion);
        let clock = StepClock::new(
            experiment.start_time,
            experiment.step_size,
            options.substep_size.unwrap_or(experiment.step_size),
        );

        Ok(Self {
            model: LoadedModel {
                description,
                catalog,
                resolution,
                mode,
                fmi_version,
                backend_kind,
                experiment,
                instance,
            },
            backend,
            clock,
            default_substep: options.substep_size,
            instantiated: false,
            initialized: false,
            terminated: false,
            closed: false,
            error_occurred: false,
            call_logging: options.call_logging,
            episode_call_logging: options.call_logging,
            state_names,
        })
    }

    /// Instantiate (or soft-reset) and run the initialization sequence.
    pub fn initialize_model(&mut self, config: Option<&Values>) -> SimResult<()> {
        self.ensure_open("initialize_model")?;

        self.episode_call_logging = self.call_logging
            || config
                .and_then(|c| c.get(reserved::LOGGING))
                .is_some_and(|v| *v != 0.0);

        if !self.instantiated {
            self.trace_call("instantiate()");
            self.backend.instantiate()?;
            self.instantiated = true;
        } else {
            self.trace_call("reset()");
            self.backend.reset()?;
        }
        self.terminated = false;
        self.backend.set_call_logging(self.episode_call_logging);

        let start = self.model.experiment.start_time;
        self.trace_call(&format!("setup_experiment({start})"));
        self.backend.setup_experiment(start)?;

        if let Some(config) = config {
            VariableAccess::new(&self.model.catalog).apply_config(self.backend.as_mut(), config)?;
        }

        self.trace_call("enter_initialization_mode()");
        self.backend.enter_initialization_mode()?;
        self.trace_call("exit_initialization_mode()");
        self.backend.exit_initialization_mode()?;

        self.initialized = true;
        Ok(())
    }

    /// Start a new episode: re-initialize, rewind time, clear the fault flag.
    ///
    /// The macro step carries over from the previous episode (including a
    /// size chosen by an action) unless `config` sets `FMU_step_size`. The
    /// micro-step comes from `FMU_substep_size`, else the load-time default,
    /// else the macro step.
    pub fn reset(&mut self, config: Option<&Values>) -> SimResult<()> {
        self.require_initialized("reset")?;
        self.initialize_model(config)?;

        let lookup = |name: &str| -> Option<f64> {
            let value = *config?.get(name)?;
            if is_valid_step(value) {
                Some(value)
            } else {
                warn!(field = name, value, "ignoring invalid step size override");
                None
            }
        };

        let step_size = lookup(reserved::STEP_SIZE).unwrap_or(self.clock.step_size);
        let substep_size = lookup(reserved::SUBSTEP_SIZE)
            .or(self.default_substep)
            .unwrap_or(step_size);

        self.clock = StepClock::new(self.model.experiment.start_time, step_size, substep_size);
        self.error_occurred = false;
        debug!(step_size, substep_size, "session reset");
        Ok(())
    }

    /// Terminate the backend. No-op unless initialized.
    pub fn terminate(&mut self) -> SimResult<()> {
        if !self.initialized {
            debug!("model not initialized or already terminated, skipping termination");
            return Ok(());
        }
        self.trace_call("terminate()");
        self.backend.terminate()?;
        self.initialized = false;
        self.terminated = true;
        Ok(())
    }

    /// Terminate, free the instance, and remove the working directory.
    ///
    /// Idempotent. Every cleanup stage runs even if an earlier one fails; the
    /// first failure is returned.
    pub fn close(&mut self) -> SimResult<()> {
        if self.closed {
            return Ok(());
        }
        let terminated = self.terminate();

        let freed = if self.instantiated {
            self.trace_call("free_instance()");
            self.instantiated = false;
            self.backend.free_instance().map_err(SimError::from)
        } else {
            Ok(())
        };

        let dir = &self.model.instance.working_dir;
        let removed = match std::fs::remove_dir_all(dir) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(SimError::Io(e)),
            _ => Ok(()),
        };

        self.closed = true;
        info!(instance = %self.model.instance.instance_name, "session closed");
        terminated.and(freed).and(removed)
    }

    /// Advance one macro step. Backend faults halt the episode instead of
    /// returning an error.
    pub fn step(&mut self) -> SimResult<StepOutcome> {
        self.require_initialized("step")?;

        if !self.backend.supports_stepping() {
            info!("steady-state model cannot advance time, step skipped");
            return Ok(StepOutcome::default());
        }

        debug!(
            time = self.clock.time,
            step_size = self.clock.step_size,
            substep_size = self.clock.substep_size,
            "step"
        );

        let logging = self.episode_call_logging;
        let backend = self.backend.as_mut();
        let outcome = self.clock.advance(|t, h| {
            if logging {
                info!(target: "fmi", "do_step({t:.3}, {h:.3})");
            }
            backend.do_step(t, h)
        });

        if let Some(fault) = &outcome.fault {
            warn!(error = %fault, time = self.clock.time, "backend step failed, episode halted");
            self.error_occurred = true;
        }
        Ok(outcome)
    }

    /// Write actions. `FMU_step_size`, when present and valid, becomes the
    /// new macro step. Returns whether any model variable was written.
    pub fn apply_actions(&mut self, actions: &Values) -> SimResult<bool> {
        self.require_initialized("apply_actions")?;

        if actions.is_empty() {
            debug!("empty action, nothing applied");
            return Ok(false);
        }

        let mut actions = actions.clone();
        if let Some(step_size) = actions.remove(reserved::STEP_SIZE) {
            if is_valid_step(step_size) {
                self.clock.step_size = step_size;
                debug!(step_size, "step size set by action");
            } else {
                warn!(step_size, "ignoring invalid step size action");
            }
        }

        let applied =
            VariableAccess::new(&self.model.catalog).write(self.backend.as_mut(), &actions)?;
        if !applied {
            debug!("no valid action names, nothing applied");
        }
        Ok(applied)
    }

    /// Read states plus `FMU_error` and `FMU_time`.
    ///
    /// `None` or an empty list reads the model outputs.
    pub fn read_states(&mut self, names: Option<&[&str]>) -> SimResult<Observation> {
        self.require_initialized("read_states")?;

        let access = VariableAccess::new(&self.model.catalog);
        let observation = match names {
            Some(names) if !names.is_empty() => {
                access.read(self.backend.as_mut(), names.iter().copied())?
            }
            _ => {
                let outputs = self.model.resolution.assignment.outputs.iter();
                access.read(self.backend.as_mut(), outputs.map(String::as_str))?
            }
        };
        Ok(self.with_reserved(observation))
    }

    /// Read every name in the memoized state list plus the reserved fields.
    pub fn read_all(&mut self) -> SimResult<Observation> {
        self.require_initialized("read_all")?;

        let names = self.state_names.iter().map(String::as_str);
        let observation =
            VariableAccess::new(&self.model.catalog).read(self.backend.as_mut(), names)?;
        Ok(self.with_reserved(observation))
    }

    fn with_reserved(&self, mut observation: Observation) -> Observation {
        observation.insert(reserved::ERROR, if self.error_occurred { 1.0 } else { 0.0 });
        observation.insert(reserved::TIME, self.clock.time);
        observation
    }

    /// Whether the last step hit a backend fault.
    pub fn halted(&self) -> bool {
        self.error_occurred
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        if self.closed {
            LifecycleState::Closed
        } else if self.initialized {
            LifecycleState::Initialized
        } else if self.terminated {
            LifecycleState::Terminated
        } else if self.instantiated {
            LifecycleState::Instantiated
        } else {
            LifecycleState::Unloaded
        }
    }

    pub fn time(&self) -> f64 {
        self.clock.time
    }

    pub fn step_size(&self) -> f64 {
        self.clock.step_size
    }

    pub fn substep_size(&self) -> f64 {
        self.clock.substep_size
    }

    pub fn model(&self) -> &LoadedModel {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        &self.model.description.model_name
    }

    pub fn catalog(&self) -> &VariableCatalog {
        &self.model.catalog
    }

    pub fn assignment(&self) -> &RoleAssignment {
        &self.model.resolution.assignment
    }

    pub fn interface(&self) -> &InterfaceDescriptor {
        &self.model.resolution.interface
    }

    /// Names read by `read_all`, fixed at load.
    pub fn state_names(&self) -> &[String] {
        &self.state_names
    }

    pub fn working_dir(&self) -> &Path {
        &self.model.instance.working_dir
    }

    fn ensure_open(&self, operation: &'static str) -> SimResult<()> {
        if self.closed {
            return Err(SimError::SessionClosed { operation });
        }
        Ok(())
    }

    fn require_initialized(&self, operation: &'static str) -> SimResult<()> {
        self.ensure_open(operation)?;
        if !self.initialized {
            return Err(SimError::SessionNotInitialized { operation });
        }
        Ok(())
    }

    fn trace_call(&self, call: &str) {
        if self.episode_call_logging {
            info!(target: "fmi", instance = %self.model.instance.instance_name, "{call}");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close session cleanly");
        }
    }
}

/// Removes a freshly extracted working directory unless `keep` is called.
struct ExtractionGuard {
    dir: Option<PathBuf>,
}

impl ExtractionGuard {
    fn fresh(dir: &Path) -> Self {
        Self {
            dir: Some(dir.to_path_buf()),
        }
    }

    fn reused() -> Self {
        Self { dir: None }
    }

    fn keep(mut self) {
        self.dir = None;
    }
}

impl Drop for ExtractionGuard {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => debug!(dir = %dir.display(), "removed extraction after failed load"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %dir.display(), error = %e, "cannot remove extraction after failed load"),
        }
    }
}

fn is_valid_step(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn model_stem(model_path: &Path) -> String {
    model_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model")
        .to_string()
}

fn default_extraction_dir(model_path: &Path) -> PathBuf {
    let parent = model_path.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{}_unzipped", model_stem(model_path)))
}

/// Outputs, then any included groups, duplicates removed in first-seen order.
fn derive_state_names(assignment: &RoleAssignment, inclusion: StateInclusion) -> Vec<String> {
    let groups = [
        (true, Role::State),
        (inclusion.include_config, Role::Config),
        (inclusion.include_actions, Role::Action),
        (inclusion.include_other, Role::Other),
    ];
    let mut names: Vec<String> = Vec::new();
    for (included, role) in groups {
        if !included {
            continue;
        }
        for name in assignment.names(role) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// `instance<N>` where N encodes the current local time down to the second.
fn unique_instance_name() -> String {
    let now = Local::now();
    let month = i64::from(now.month()) + 366 * i64::from(now.year());
    let day = i64::from(now.day()) + 31 * month;
    let hour = i64::from(now.hour()) + 24 * day;
    let minute = i64::from(now.minute()) + 60 * hour;
    let id = i64::from(now.second()) + 60 * minute;
    format!("instance{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_dedupe_in_order() {
        let assignment = RoleAssignment {
            config_params: vec!["k".into(), "y".into()],
            inputs: vec!["u".into()],
            outputs: vec!["y".into(), "z".into()],
            other_vars: vec!["w".into()],
        };
        let all = StateInclusion {
            include_config: true,
            include_actions: true,
            include_other: true,
        };
        assert_eq!(
            derive_state_names(&assignment, all),
            vec!["y", "z", "k", "u", "w"]
        );
        assert_eq!(
            derive_state_names(&assignment, StateInclusion::default()),
            vec!["y", "z"]
        );
    }

    #[test]
    fn extraction_dir_sits_next_to_model() {
        assert_eq!(
            default_extraction_dir(Path::new("/models/plant.fmu")),
            PathBuf::from("/models/plant_unzipped")
        );
    }

    #[test]
    fn instance_names_are_prefixed() {
        let name = unique_instance_name();
        assert!(name.starts_with("instance"));
        assert!(name["instance".len()..].parse::<i64>().is_ok());
    }
}
