//! Session lifecycle and stepping against a scripted backend.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use fb_model::{
    AutoApprove, Causality, DeclaredType, DefaultExperiment, InterfaceDef, ModelDescription,
    ScalarValue, StateInclusion, ValueRef, VariableDescriptor,
};
use fb_sim::{
    BackendError, BackendKind, BackendProvider, BackendResult, InstanceSpec, LifecycleState,
    LoadOptions, Session, SimBackend, SimError, Values,
};

const K: ValueRef = 0;
const U: ValueRef = 1;
const Y: ValueRef = 2;

#[derive(Default)]
struct Script {
    calls: Vec<String>,
    values: HashMap<ValueRef, f64>,
    steps: Vec<(f64, f64)>,
    fail_on_step: Option<usize>,
    call_logging: bool,
}

/// Integrates `y' = k * u`.
struct ScriptedBackend {
    script: Rc<RefCell<Script>>,
    stepping: bool,
}

impl SimBackend for ScriptedBackend {
    fn instantiate(&mut self) -> BackendResult<()> {
        self.script.borrow_mut().calls.push("instantiate".into());
        Ok(())
    }
    fn reset(&mut self) -> BackendResult<()> {
        let mut s = self.script.borrow_mut();
        s.calls.push("reset".into());
        s.values.clear();
        Ok(())
    }
    fn setup_experiment(&mut self, start_time: f64) -> BackendResult<()> {
        self.script
            .borrow_mut()
            .calls
            .push(format!("setup_experiment({start_time})"));
        Ok(())
    }
    fn enter_initialization_mode(&mut self) -> BackendResult<()> {
        self.script.borrow_mut().calls.push("enter_init".into());
        Ok(())
    }
    fn exit_initialization_mode(&mut self) -> BackendResult<()> {
        self.script.borrow_mut().calls.push("exit_init".into());
        Ok(())
    }
    fn terminate(&mut self) -> BackendResult<()> {
        self.script.borrow_mut().calls.push("terminate".into());
        Ok(())
    }
    fn free_instance(&mut self) -> BackendResult<()> {
        self.script.borrow_mut().calls.push("free_instance".into());
        Ok(())
    }
    fn read(&mut self, refs: &[ValueRef]) -> BackendResult<Vec<f64>> {
        let s = self.script.borrow();
        Ok(refs
            .iter()
            .map(|r| s.values.get(r).copied().unwrap_or(0.0))
            .collect())
    }
    fn write(&mut self, refs: &[ValueRef], values: &[ScalarValue]) -> BackendResult<()> {
        let mut s = self.script.borrow_mut();
        for (r, v) in refs.iter().zip(values) {
            s.values.insert(*r, v.as_f64());
        }
        Ok(())
    }
    fn supports_stepping(&self) -> bool {
        self.stepping
    }
    fn do_step(&mut self, current_time: f64, step_size: f64) -> BackendResult<()> {
        let mut s = self.script.borrow_mut();
        s.steps.push((current_time, step_size));
        if s.fail_on_step == Some(s.steps.len()) {
            return Err(BackendError::new("do_step", "solver diverged"));
        }
        let k = s.values.get(&K).copied().unwrap_or(0.0);
        let u = s.values.get(&U).copied().unwrap_or(0.0);
        *s.values.entry(Y).or_insert(0.0) += k * u * step_size;
        Ok(())
    }
    fn set_call_logging(&mut self, enabled: bool) {
        self.script.borrow_mut().call_logging = enabled;
    }
}

struct ScriptedProvider {
    description: ModelDescription,
    script: Rc<RefCell<Script>>,
    stepping: bool,
    fail_create: bool,
    extracts: Cell<usize>,
    created: RefCell<Vec<(BackendKind, InstanceSpec)>>,
}

impl ScriptedProvider {
    fn new(description: ModelDescription) -> Self {
        Self {
            description,
            script: Rc::new(RefCell::new(Script::default())),
            stepping: true,
            fail_create: false,
            extracts: Cell::new(0),
            created: RefCell::new(Vec::new()),
        }
    }
}

impl BackendProvider for ScriptedProvider {
    fn describe(&self, _model_path: &Path) -> BackendResult<ModelDescription> {
        Ok(self.description.clone())
    }

    fn extract(&self, _model_path: &Path, dest: &Path) -> std::io::Result<()> {
        self.extracts.set(self.extracts.get() + 1);
        fs::write(dest.join("modelDescription.yaml"), "extracted")
    }

    fn create(
        &self,
        kind: BackendKind,
        spec: &InstanceSpec,
    ) -> BackendResult<Box<dyn SimBackend>> {
        if self.fail_create {
            return Err(BackendError::new("create", "shared library missing"));
        }
        self.created.borrow_mut().push((kind, spec.clone()));
        Ok(Box::new(ScriptedBackend {
            script: Rc::clone(&self.script),
            stepping: self.stepping,
        }))
    }
}

fn var(name: &str, vr: ValueRef, causality: Causality, start: Option<f64>) -> VariableDescriptor {
    VariableDescriptor {
        name: name.to_string(),
        value_reference: vr,
        declared_type: DeclaredType::Real,
        causality,
        start,
        description: None,
    }
}

fn plant() -> ModelDescription {
    ModelDescription {
        model_name: "Plant".to_string(),
        guid: "{plant-guid}".to_string(),
        fmi_version: "2.0".to_string(),
        variables: vec![
            var("k", K, Causality::Parameter, Some(2.0)),
            var("u", U, Causality::Input, None),
            var("y", Y, Causality::Output, None),
        ],
        default_experiment: Some(DefaultExperiment {
            start_time: Some(0.0),
            stop_time: None,
            step_size: Some(1.0),
        }),
        co_simulation: Some(InterfaceDef {
            model_identifier: "Plant".to_string(),
        }),
        model_exchange: None,
        scheduled_execution: None,
    }
}

fn workspace(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fb_sim_session_{tag}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir.join("plant.fmu")
}

fn options() -> LoadOptions {
    LoadOptions {
        substep_size: Some(0.25),
        ..LoadOptions::default()
    }
}

fn values(pairs: &[(&str, f64)]) -> Values {
    pairs.iter().map(|(n, v)| (n.to_string(), *v)).collect()
}

fn load(provider: &ScriptedProvider, tag: &str) -> Session {
    Session::load(provider, &workspace(tag), &options(), &mut AutoApprove)
        .expect("plant model should load")
}

#[test]
fn end_to_end_step_and_read() {
    let provider = ScriptedProvider::new(plant());
    let mut session = load(&provider, "e2e");
    assert_eq!(session.lifecycle_state(), LifecycleState::Unloaded);

    session.initialize_model(Some(&Values::new())).unwrap();
    assert_eq!(session.lifecycle_state(), LifecycleState::Initialized);

    let outcome = session.step().unwrap();
    assert_eq!(outcome.substeps, 4);
    assert!((session.time() - 1.0).abs() < 1e-9);

    let states = session.read_states(None).unwrap();
    assert_eq!(
        states.names().collect::<Vec<_>>(),
        vec!["y", "FMU_error", "FMU_time"]
    );
    assert_eq!(states.get("FMU_time"), Some(1.0));
    assert_eq!(states.get("FMU_error"), Some(0.0));
    assert!(!session.halted());
}

#[test]
fn load_selects_backend_and_extracts() {
    let provider = ScriptedProvider::new(plant());
    let session = load(&provider, "select");

    let created = provider.created.borrow();
    let (kind, spec) = &created[0];
    assert_eq!(*kind, BackendKind::Fmi2CoSimulation);
    assert_eq!(spec.model_identifier, "Plant");
    assert_eq!(spec.guid, "{plant-guid}");
    assert!(spec.instance_name.starts_with("instance"));
    assert!(session.working_dir().join("modelDescription.yaml").exists());
    assert!(session.working_dir().ends_with("plant_unzipped"));
}

#[test]
fn declared_defaults_are_applied_on_initialize() {
    let provider = ScriptedProvider::new(plant());
    let mut session = load(&provider, "defaults");
    session.initialize_model(Some(&Values::new())).unwrap();

    let states = session.read_states(Some(&["k"])).unwrap();
    assert_eq!(states.get("k"), Some(2.0));

    let calls = provider.script.borrow().calls.clone();
    assert_eq!(
        calls,
        vec!["instantiate", "setup_experiment(0)", "enter_init", "exit_init"]
    );
}

#[test]
fn operations_before_initialize_are_rejected() {
    let provider = ScriptedProvider::new(plant());
    let mut session = load(&provider, "guard");

    let expect_guard = |result: Result<(), SimError>, op: &str| match result {
        Err(SimError::SessionNotInitialized { operation }) => assert_eq!(operation, op),
        other => panic!("expected SessionNotInitialized for {op}, got {other:?}"),
    };

    expect_guard(session.step().map(|_| ()), "step");
    expect_guard(session.reset(None), "reset");
    expect_guard(
        session.apply_actions(&values(&[("u", 1.0)])).map(|_| ()),
        "apply_actions",
    );
    expect_guard(session.read_states(None).map(|_| ()), "read_states");
    expect_guard(session.read_all().map(|_| ()), "read_all");

    session.terminate().expect("terminate before initialize is a no-op");
    assert!(provider.script.borrow().calls.is_empty());
}

#[test]
fn step_fault_halts_without_error() {
    let provider = ScriptedProvider::new(plant());
    provider.script.borrow_mut().fail_on_step = Some(3);
    let mut session = load(&provider, "fault");
    session.initialize_model(None).unwrap();

    let outcome = session.step().expect("faults are not errors");
    assert_eq!(outcome.substeps, 2);
    assert!(outcome.fault.is_some());
    assert!(session.halted());
    assert!((session.time() - 0.5).abs() < 1e-9);
    assert_eq!(session.read_states(None).unwrap().get("FMU_error"), Some(1.0));

    session.reset(None).unwrap();
    assert!(!session.halted());
    assert_eq!(session.time(), 0.0);
}

#[test]
fn action_step_size_carries_across_reset() {
    let provider = ScriptedProvider::new(plant());
    let mut session = load(&provider, "dynamic");
    session.initialize_model(Some(&Values::new())).unwrap();

    let applied = session
        .apply_actions(&values(&[("FMU_step_size", 2.0), ("u", 1.0)]))
        .unwrap();
    assert!(applied);
    assert_eq!(session.step_size(), 2.0);
    assert_eq!(session.substep_size(), 0.25);

    session.step().unwrap();
    assert!((session.time() - 2.0).abs() < 1e-9);
    let y = session.read_states(None).unwrap().get("y").unwrap();
    assert!((y - 4.0).abs() < 1e-9);

    assert!(!session.apply_actions(&values(&[("FMU_step_size", 3.0)])).unwrap());
    assert_eq!(session.step_size(), 3.0);
    assert!(!session.apply_actions(&values(&[("FMU_step_size", -1.0)])).unwrap());
    assert_eq!(session.step_size(), 3.0);

    session.reset(None).unwrap();
    assert_eq!(session.step_size(), 3.0);
    assert_eq!(session.substep_size(), 0.25);

    session
        .reset(Some(&values(&[("FMU_step_size", 1.0)])))
        .unwrap();
    assert_eq!(session.step_size(), 1.0);
}

#[test]
fn reset_without_substep_default_uses_macro_step() {
    let provider = ScriptedProvider::new(plant());
    let opts = LoadOptions {
        substep_size: None,
        ..options()
    };
    let mut session =
        Session::load(&provider, &workspace("reset_substep"), &opts, &mut AutoApprove).unwrap();
    session.initialize_model(None).unwrap();
    assert_eq!(session.substep_size(), 1.0);

    session.apply_actions(&values(&[("FMU_step_size", 2.0)])).unwrap();
    session.reset(None).unwrap();
    assert_eq!(session.step_size(), 2.0);
    assert_eq!(session.substep_size(), 2.0);

    provider.script.borrow_mut().steps.clear();
    session.step().unwrap();
    assert_eq!(provider.script.borrow().steps, vec![(0.0, 2.0)]);
}

#[test]
fn reset_config_overrides_step_sizes() {
    let provider = ScriptedProvider::new(plant());
    let mut session = load(&provider, "reset_cfg");
    session.initialize_model(None).unwrap();

    session
        .reset(Some(&values(&[("FMU_step_size", 0.5), ("FMU_substep_size", 0.1)])))
        .unwrap();
    provider.script.borrow_mut().steps.clear();
    session.step().unwrap();

    assert_eq!(provider.script.borrow().steps.len(), 5);
    assert!((session.time() - 0.5).abs() < 1e-9);

    let calls = provider.script.borrow().calls.clone();
    assert!(calls.contains(&"reset".to_string()));
    assert_eq!(calls.iter().filter(|c| *c == "instantiate").count(), 1);
}

#[test]
fn logging_config_enables_call_logging_per_episode() {
    let provider = ScriptedProvider::new(plant());
    let mut session = load(&provider, "logging");
    session
        .initialize_model(Some(&values(&[("FMU_logging", 1.0)])))
        .unwrap();
    assert!(provider.script.borrow().call_logging);

    session.reset(Some(&Values::new())).unwrap();
    assert!(!provider.script.borrow().call_logging);
}

#[test]
fn terminate_and_close_are_idempotent() {
    let provider = ScriptedProvider::new(plant());
    let mut session = load(&provider, "close");
    session.initialize_model(None).unwrap();

    session.terminate().unwrap();
    session.terminate().unwrap();
    assert_eq!(session.lifecycle_state(), LifecycleState::Terminated);
    assert!(matches!(
        session.step(),
        Err(SimError::SessionNotInitialized { operation: "step" })
    ));

    let dir = session.working_dir().to_path_buf();
    session.close().unwrap();
    session.close().unwrap();
    assert!(!dir.exists());
    assert_eq!(session.lifecycle_state(), LifecycleState::Closed);
    assert!(matches!(
        session.initialize_model(None),
        Err(SimError::SessionClosed { .. })
    ));

    let calls = provider.script.borrow().calls.clone();
    assert_eq!(calls.iter().filter(|c| *c == "terminate").count(), 1);
    assert_eq!(calls.iter().filter(|c| *c == "free_instance").count(), 1);
}

#[test]
fn drop_frees_the_instance() {
    let provider = ScriptedProvider::new(plant());
    {
        let mut session = load(&provider, "drop");
        session.initialize_model(None).unwrap();
    }
    let calls = provider.script.borrow().calls.clone();
    assert_eq!(calls.last().map(String::as_str), Some("free_instance"));
}

#[test]
fn steady_state_backend_does_not_advance() {
    let mut provider = ScriptedProvider::new(plant());
    provider.stepping = false;
    let mut session = load(&provider, "steady");
    session.initialize_model(None).unwrap();

    let outcome = session.step().unwrap();
    assert_eq!(outcome.substeps, 0);
    assert_eq!(session.time(), 0.0);
    assert!(provider.script.borrow().steps.is_empty());
}

#[test]
fn read_all_follows_state_inclusion() {
    let provider = ScriptedProvider::new(plant());
    let opts = LoadOptions {
        state_inclusion: StateInclusion {
            include_config: true,
            include_actions: false,
            include_other: false,
        },
        ..options()
    };
    let mut session =
        Session::load(&provider, &workspace("read_all"), &opts, &mut AutoApprove).unwrap();
    session.initialize_model(Some(&Values::new())).unwrap();

    let first = session.read_all().unwrap();
    let second = session.read_all().unwrap();
    let names: Vec<&str> = first.names().collect();
    assert_eq!(names, vec!["y", "k", "FMU_error", "FMU_time"]);
    assert_eq!(names, second.names().collect::<Vec<_>>());
}

#[test]
fn ambiguous_execution_mode_is_unsupported() {
    let mut description = plant();
    description.model_exchange = Some(InterfaceDef {
        model_identifier: "Plant".to_string(),
    });
    let provider = ScriptedProvider::new(description);
    let result = Session::load(&provider, &workspace("two_modes"), &options(), &mut AutoApprove);
    assert!(matches!(result, Err(SimError::UnsupportedModelType { .. })));
}

#[test]
fn scheduled_execution_needs_fmi3() {
    let mut description = plant();
    description.co_simulation = None;
    description.scheduled_execution = Some(InterfaceDef {
        model_identifier: "Plant".to_string(),
    });
    let provider = ScriptedProvider::new(description.clone());
    let result = Session::load(&provider, &workspace("sched2"), &options(), &mut AutoApprove);
    assert!(matches!(result, Err(SimError::UnsupportedModelType { .. })));

    description.fmi_version = "3.0".to_string();
    let provider = ScriptedProvider::new(description);
    let _session = Session::load(&provider, &workspace("sched3"), &options(), &mut AutoApprove)
        .expect("FMI 3.0 scheduled execution loads");
    assert_eq!(
        provider.created.borrow()[0].0,
        BackendKind::Fmi3ScheduledExecution
    );
}

#[test]
fn model_without_inputs_is_unresolvable() {
    let mut description = plant();
    description.variables.retain(|v| v.name != "u");
    let provider = ScriptedProvider::new(description);
    let model = workspace("no_inputs");

    match Session::load(&provider, &model, &options(), &mut AutoApprove) {
        Err(SimError::UnresolvableModelInterface { draft_path }) => {
            assert!(draft_path.ends_with("plant_conf_EDIT.yaml"));
            assert!(draft_path.exists());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("model without inputs must not load"),
    }
}

#[test]
fn interface_descriptor_is_written_when_requested() {
    let provider = ScriptedProvider::new(plant());
    let model = workspace("interface");
    let path = model.with_file_name("interface.json");
    let opts = LoadOptions {
        interface_path: Some(path.clone()),
        ..options()
    };
    let session = Session::load(&provider, &model, &opts, &mut AutoApprove).unwrap();
    let written = fb_model::InterfaceDescriptor::load_json(&path).unwrap();
    assert_eq!(&written, session.interface());
}

#[test]
fn failed_create_removes_fresh_extraction() {
    let mut provider = ScriptedProvider::new(plant());
    provider.fail_create = true;
    let model = workspace("create_fails");
    let extraction = model.with_file_name("plant_unzipped");

    let result = Session::load(&provider, &model, &options(), &mut AutoApprove);
    assert!(matches!(result, Err(SimError::Backend(ref e)) if e.call == "create"));
    assert_eq!(provider.extracts.get(), 1);
    assert!(!extraction.exists());
}

#[test]
fn failed_create_keeps_reused_extraction() {
    let mut provider = ScriptedProvider::new(plant());
    provider.fail_create = true;
    let model = workspace("create_fails_reused");
    let extraction = model.with_file_name("plant_unzipped");
    fs::create_dir_all(&extraction).unwrap();
    let opts = LoadOptions {
        reuse_extraction: true,
        ..options()
    };

    assert!(Session::load(&provider, &model, &opts, &mut AutoApprove).is_err());
    assert_eq!(provider.extracts.get(), 0);
    assert!(extraction.exists());
}

#[test]
fn reuse_skips_second_extraction() {
    let provider = ScriptedProvider::new(plant());
    let model = workspace("reuse");
    let custom = model.with_file_name("unpacked");
    let opts = LoadOptions {
        reuse_extraction: true,
        extraction_dir: Some(custom.clone()),
        ..options()
    };

    let first = Session::load(&provider, &model, &opts, &mut AutoApprove).unwrap();
    assert_eq!(first.working_dir(), custom.as_path());
    assert_eq!(provider.extracts.get(), 1);

    let second = Session::load(&provider, &model, &opts, &mut AutoApprove).unwrap();
    assert_eq!(second.working_dir(), custom.as_path());
    assert_eq!(provider.extracts.get(), 1);
    assert!(custom.join("modelDescription.yaml").exists());

    let fresh = LoadOptions {
        reuse_extraction: false,
        ..opts
    };
    let _third = Session::load(&provider, &model, &fresh, &mut AutoApprove).unwrap();
    assert_eq!(provider.extracts.get(), 2);

    drop(second);
    drop(first);
    assert!(!custom.exists());
}

#[test]
fn stalled_time_halts_instead_of_spinning() {
    let mut description = plant();
    description.default_experiment = Some(DefaultExperiment {
        start_time: Some(1.0e17),
        stop_time: None,
        step_size: Some(10.0),
    });
    let provider = ScriptedProvider::new(description);
    let opts = LoadOptions {
        substep_size: Some(1.0),
        ..options()
    };
    let mut session =
        Session::load(&provider, &workspace("stalled"), &opts, &mut AutoApprove).unwrap();
    session.initialize_model(None).unwrap();

    let outcome = session.step().expect("a stalled clock is a fault, not an error");
    assert!(outcome.faulted());
    assert_eq!(outcome.substeps, 0);
    assert!(session.halted());
    assert_eq!(session.time(), 1.0e17);
    assert!(provider.script.borrow().steps.is_empty());
}
