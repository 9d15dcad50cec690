//! Execution mode and FMI version, and the backend variant they select.

use std::fmt;

use fb_model::{InterfaceDef, ModelDescription};

use crate::error::{SimError, SimResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    CoSimulation,
    ModelExchange,
    ScheduledExecution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FmiVersion {
    V1,
    V2,
    V3,
}

impl FmiVersion {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "1.0" => Some(FmiVersion::V1),
            "2.0" => Some(FmiVersion::V2),
            "3.0" => Some(FmiVersion::V3),
            _ => None,
        }
    }
}

impl fmt::Display for FmiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FmiVersion::V1 => "1.0",
            FmiVersion::V2 => "2.0",
            FmiVersion::V3 => "3.0",
        };
        f.write_str(s)
    }
}

/// Concrete backend variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Fmi1ModelExchange,
    Fmi1CoSimulation,
    Fmi2ModelExchange,
    Fmi2CoSimulation,
    Fmi3ModelExchange,
    Fmi3CoSimulation,
    Fmi3ScheduledExecution,
}

/// Pick the backend variant for a mode and version.
pub fn select_backend_kind(mode: ExecutionMode, version: FmiVersion) -> SimResult<BackendKind> {
    use BackendKind::*;
    use ExecutionMode::*;
    use FmiVersion::*;

    match (mode, version) {
        (ModelExchange, V1) => Ok(Fmi1ModelExchange),
        (ModelExchange, V2) => Ok(Fmi2ModelExchange),
        (ModelExchange, V3) => Ok(Fmi3ModelExchange),
        (CoSimulation, V1) => Ok(Fmi1CoSimulation),
        (CoSimulation, V2) => Ok(Fmi2CoSimulation),
        (CoSimulation, V3) => Ok(Fmi3CoSimulation),
        (ScheduledExecution, V3) => Ok(Fmi3ScheduledExecution),
        (ScheduledExecution, v) => Err(SimError::UnsupportedModelType {
            message: format!("scheduled execution requires FMI 3.0, model uses FMI {v}"),
        }),
    }
}

/// The single execution mode a model declares, with its interface block.
pub fn declared_mode(description: &ModelDescription) -> SimResult<(ExecutionMode, &InterfaceDef)> {
    let declared: Vec<(ExecutionMode, &InterfaceDef)> = [
        (ExecutionMode::CoSimulation, description.co_simulation.as_ref()),
        (ExecutionMode::ModelExchange, description.model_exchange.as_ref()),
        (
            ExecutionMode::ScheduledExecution,
            description.scheduled_execution.as_ref(),
        ),
    ]
    .into_iter()
    .filter_map(|(mode, def)| def.map(|d| (mode, d)))
    .collect();

    match declared.as_slice() {
        [single] => Ok(*single),
        [] => Err(SimError::UnsupportedModelType {
            message: format!(
                "model '{}' declares none of co-simulation, model exchange, scheduled execution",
                description.model_name
            ),
        }),
        many => Err(SimError::UnsupportedModelType {
            message: format!(
                "model '{}' declares {} execution modes ({:?}), exactly one is supported",
                description.model_name,
                many.len(),
                many.iter().map(|(m, _)| *m).collect::<Vec<_>>()
            ),
        }),
    }
}

/// Use the declared version when valid, else the caller's fallback.
pub fn resolve_fmi_version(declared: &str, fallback: Option<&str>) -> SimResult<FmiVersion> {
    if let Some(version) = FmiVersion::parse(declared) {
        return Ok(version);
    }
    match fallback.and_then(FmiVersion::parse) {
        Some(version) => {
            tracing::warn!(
                declared,
                using = %version,
                "model declares no valid FMI version, using fallback"
            );
            Ok(version)
        }
        None => Err(SimError::UnsupportedModelType {
            message: format!(
                "FMI version '{declared}' is invalid and no valid fallback was given"
            ),
        }),
    }
}
