//! Static model metadata as declared by the backend.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDescription {
    pub model_name: String,
    #[serde(default)]
    pub guid: String,
    /// Declared FMI version string ("1.0", "2.0", "3.0"); anything else is resolved at load.
    #[serde(default)]
    pub fmi_version: String,
    #[serde(default)]
    pub variables: Vec<VariableDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_experiment: Option<DefaultExperiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co_simulation: Option<InterfaceDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_exchange: Option<InterfaceDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_execution: Option<InterfaceDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableDescriptor {
    pub name: String,
    pub value_reference: u32,
    #[serde(rename = "type")]
    pub declared_type: DeclaredType,
    #[serde(default)]
    pub causality: Causality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeclaredType {
    Real,
    Integer,
    Boolean,
    String,
    Enumeration,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Causality {
    Parameter,
    CalculatedParameter,
    StructuralParameter,
    Input,
    Output,
    #[default]
    Local,
    Independent,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct DefaultExperiment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_size: Option<f64>,
}

/// One execution-mode block (co-simulation, model exchange, scheduled execution).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterfaceDef {
    pub model_identifier: String,
}

impl ModelDescription {
    pub fn variable(&self, name: &str) -> Option<&VariableDescriptor> {
        self.variables.iter().find(|v| v.name == name)
    }
}
