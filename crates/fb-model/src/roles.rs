//! Role assignment: which variables are config, actions, states, or other.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::VariableCatalog;
use crate::description::Causality;
use crate::reserved;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Config,
    Action,
    State,
    Other,
}

impl Role {
    /// Introspection mapping from declared causality.
    pub fn from_causality(causality: Causality) -> Self {
        match causality {
            Causality::Parameter => Role::Config,
            Causality::Input => Role::Action,
            Causality::Output => Role::State,
            _ => Role::Other,
        }
    }
}

/// Partition of variable names into the four roles.
///
/// Field names match the persisted `simulation` section of the role file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleAssignment {
    pub config_params: Vec<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub other_vars: Vec<String>,
}

impl RoleAssignment {
    /// Partition every catalog variable by its declared causality.
    pub fn from_causality(catalog: &VariableCatalog) -> Self {
        let mut assignment = RoleAssignment::default();
        for var in catalog.iter() {
            assignment
                .names_mut(Role::from_causality(var.causality))
                .push(var.name.clone());
        }
        assignment
    }

    /// Usable only with at least one action and one state.
    pub fn is_usable(&self) -> bool {
        !self.inputs.is_empty() && !self.outputs.is_empty()
    }

    /// Why the assignment is unusable, if it is.
    pub fn unusable_reason(&self) -> Option<&'static str> {
        if self.inputs.is_empty() {
            Some("no inputs (actions)")
        } else if self.outputs.is_empty() {
            Some("no outputs (states)")
        } else {
            None
        }
    }

    pub fn names(&self, role: Role) -> &[String] {
        match role {
            Role::Config => &self.config_params,
            Role::Action => &self.inputs,
            Role::State => &self.outputs,
            Role::Other => &self.other_vars,
        }
    }

    fn names_mut(&mut self, role: Role) -> &mut Vec<String> {
        match role {
            Role::Config => &mut self.config_params,
            Role::Action => &mut self.inputs,
            Role::State => &mut self.outputs,
            Role::Other => &mut self.other_vars,
        }
    }

    /// Role of `name`; names absent from every list are `Other`.
    ///
    /// The first list holding the name wins, in config/action/state order.
    pub fn role_of(&self, name: &str) -> Role {
        [Role::Config, Role::Action, Role::State]
            .into_iter()
            .find(|&role| self.names(role).iter().any(|n| n == name))
            .unwrap_or(Role::Other)
    }

    /// Remove reserved `FMU_*` names from every list, returning what was removed.
    pub fn strip_reserved(&mut self) -> Vec<String> {
        let mut removed = Vec::new();
        for role in [Role::Config, Role::Action, Role::State, Role::Other] {
            self.names_mut(role).retain(|name| {
                let keep = !reserved::is_reserved(name);
                if !keep {
                    removed.push(name.clone());
                }
                keep
            });
        }
        removed
    }

    /// Names referenced by the assignment but missing from the catalog.
    pub fn unknown_names<'a>(&'a self, catalog: &VariableCatalog) -> Vec<&'a str> {
        [Role::Config, Role::Action, Role::State, Role::Other]
            .into_iter()
            .flat_map(|role| self.names(role).iter())
            .map(String::as_str)
            .filter(|name| !catalog.contains(name))
            .collect()
    }
}

impl fmt::Display for RoleAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Config params (platform config): {:?}", self.config_params)?;
        writeln!(f, "Inputs        (platform actions): {:?}", self.inputs)?;
        writeln!(f, "Outputs       (platform states):  {:?}", self.outputs)?;
        write!(f, "Other vars:                       {:?}", self.other_vars)
    }
}
