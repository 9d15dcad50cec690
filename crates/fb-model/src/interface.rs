//! Interface descriptor consumed by the training platform.
//!
//! The descriptor is a projection of the active role assignment plus the
//! reserved synthetic fields; it carries no logic of its own.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::VariableCatalog;
use crate::error::ModelResult;
use crate::reserved;
use crate::roles::{Role, RoleAssignment};

/// Default platform timeout advertised for a simulator, in seconds.
pub const DEFAULT_TIMEOUT_S: u32 = 60;

/// Which non-output groups are appended to the observed state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateInclusion {
    pub include_config: bool,
    pub include_actions: bool,
    pub include_other: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub timeout: u32,
    pub description: InterfaceGroups,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterfaceGroups {
    pub config: InterfaceGroup,
    pub action: InterfaceGroup,
    pub state: InterfaceGroup,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterfaceGroup {
    pub category: String,
    pub fields: Vec<InterfaceField>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterfaceField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldType {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl InterfaceField {
    fn number(name: &str, comment: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType {
                category: "Number".to_string(),
                comment,
            },
        }
    }

    fn prefixed(&self, prefix: &str) -> Self {
        let comment = self.field_type.comment.as_deref().unwrap_or("");
        Self::number(&self.name, Some(format!("{prefix}{comment}")))
    }
}

impl InterfaceGroup {
    fn structure(fields: Vec<InterfaceField>) -> Self {
        Self {
            category: "Struct".to_string(),
            fields,
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

fn reserved_comment(name: &str, group: Role) -> &'static str {
    match (name, group) {
        (reserved::STEP_SIZE, Role::Action) => {
            "Reserved variable: overrides the simulation step size from this iteration on, \
             allowing variable sized time steps chosen by the policy."
        }
        (reserved::STEP_SIZE, _) => {
            "Reserved variable: if set, overrides the default simulation step size. Each \
             iteration advances the simulation by this amount of time."
        }
        (reserved::SUBSTEP_SIZE, _) => {
            "Reserved variable: if set, each iteration is performed as a sequence of smaller \
             simulation steps of this size."
        }
        (reserved::LOGGING, _) => {
            "Reserved variable: set to 1 to log every backend call during the episode."
        }
        (reserved::ERROR, _) => {
            "Reserved variable: 1 if an error occurred during the previous simulation step, \
             otherwise 0."
        }
        (reserved::TIME, _) => {
            "Reserved variable: current simulation time at the end of the last step."
        }
        _ => "Reserved variable.",
    }
}

impl InterfaceDescriptor {
    /// Project an assignment into the platform descriptor.
    pub fn project(
        model_name: &str,
        assignment: &RoleAssignment,
        catalog: &VariableCatalog,
        inclusion: StateInclusion,
    ) -> Self {
        let fields_for = |role: Role| -> Vec<InterfaceField> {
            assignment
                .names(role)
                .iter()
                .map(|name| {
                    let comment = catalog.get(name).and_then(|v| v.description.clone());
                    InterfaceField::number(name, comment)
                })
                .collect()
        };

        let mut config = fields_for(Role::Config);
        let mut action = fields_for(Role::Action);
        let mut state = fields_for(Role::State);

        if inclusion.include_config {
            state.extend(config.iter().map(|f| f.prefixed("Config value: ")));
        }
        if inclusion.include_actions {
            state.extend(action.iter().map(|f| f.prefixed("Last action value: ")));
        }
        if inclusion.include_other {
            state.extend(fields_for(Role::Other).iter().map(|f| f.prefixed("Other variable: ")));
        }

        let reserved_fields = |names: &[&str], group: Role| -> Vec<InterfaceField> {
            names
                .iter()
                .map(|name| {
                    InterfaceField::number(name, Some(reserved_comment(name, group).to_string()))
                })
                .collect()
        };
        config.extend(reserved_fields(&reserved::CONFIG_FIELDS[..], Role::Config));
        action.extend(reserved_fields(&reserved::ACTION_FIELDS[..], Role::Action));
        state.extend(reserved_fields(&reserved::STATE_FIELDS[..], Role::State));

        Self {
            name: model_name.to_string(),
            timeout: DEFAULT_TIMEOUT_S,
            description: InterfaceGroups {
                config: InterfaceGroup::structure(config),
                action: InterfaceGroup::structure(action),
                state: InterfaceGroup::structure(state),
            },
        }
    }

    pub fn save_json(&self, path: &Path) -> ModelResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> ModelResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
