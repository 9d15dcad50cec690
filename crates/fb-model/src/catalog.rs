//! Variable catalog: normalized names, handles, and coercion rules.
//!
//! The catalog is built once from the model description. Variables of
//! unsupported kinds are excluded and become invisible to every other layer.
//! All backend access goes through the value reference, so renaming a variable
//! during normalization has no functional impact.

use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use crate::description::{Causality, DeclaredType, ModelDescription};
use crate::error::{ModelError, ModelResult};
use crate::reserved;
use crate::roles::{Role, RoleAssignment};

/// Opaque backend handle for one variable.
pub type ValueRef = u32;

/// Numeric kinds the bridge can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Real,
    Integer,
}

impl VariableKind {
    /// Map a declared backend type, `None` for unsupported kinds.
    pub fn from_declared(declared: DeclaredType) -> Option<Self> {
        match declared {
            DeclaredType::Real => Some(VariableKind::Real),
            DeclaredType::Integer => Some(VariableKind::Integer),
            _ => None,
        }
    }

    /// Coerce a caller value into this kind.
    ///
    /// Integers truncate toward zero; `None` when the value has no integer
    /// representation.
    pub fn coerce(self, value: f64) -> Option<ScalarValue> {
        match self {
            VariableKind::Real => Some(ScalarValue::Real(value)),
            VariableKind::Integer => {
                let truncated = value.trunc();
                if truncated.is_finite()
                    && truncated >= i32::MIN as f64
                    && truncated <= i32::MAX as f64
                {
                    Some(ScalarValue::Integer(truncated as i32))
                } else {
                    None
                }
            }
        }
    }
}

/// A value already coerced to its variable's kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Real(f64),
    Integer(i32),
}

impl ScalarValue {
    pub fn as_f64(self) -> f64 {
        match self {
            ScalarValue::Real(v) => v,
            ScalarValue::Integer(v) => v as f64,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Real(v) => write!(f, "{v}"),
            ScalarValue::Integer(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelVariable {
    pub name: String,
    pub handle: ValueRef,
    pub kind: VariableKind,
    pub causality: Causality,
    pub role: Role,
    pub initial_value: Option<ScalarValue>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VariableCatalog {
    variables: Vec<ModelVariable>,
    index: HashMap<String, usize>,
    to_initialize: Vec<(String, ScalarValue)>,
    renames: Vec<(String, String)>,
}

/// Strip every character that is not ASCII alphanumeric or underscore.
pub fn normalize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

impl VariableCatalog {
    /// Build the catalog from a model description.
    pub fn build(description: &ModelDescription) -> ModelResult<Self> {
        if description.variables.is_empty() {
            return Err(ModelError::invalid(format!(
                "model '{}' declares no variables",
                description.model_name
            )));
        }

        let mut catalog = VariableCatalog::default();
        for desc in &description.variables {
            let Some(kind) = VariableKind::from_declared(desc.declared_type) else {
                warn!(
                    variable = %desc.name,
                    declared_type = ?desc.declared_type,
                    "skipping variable of unsupported type"
                );
                continue;
            };

            let normalized = normalize_name(&desc.name);
            if normalized.is_empty() {
                warn!(variable = %desc.name, "skipping variable with no usable name characters");
                continue;
            }
            if reserved::is_reserved(&normalized) {
                return Err(ModelError::invalid(format!(
                    "variable '{}' collides with reserved field '{}'",
                    desc.name, normalized
                )));
            }

            let name = catalog.disambiguate(normalized);
            if name != desc.name {
                warn!(from = %desc.name, to = %name, "renamed variable to a valid field name");
                catalog.renames.push((desc.name.clone(), name.clone()));
            }

            let initial_value = match desc.start {
                Some(start) => {
                    let coerced = kind.coerce(start);
                    if coerced.is_none() {
                        warn!(variable = %name, start, "start value cannot be coerced, ignoring it");
                    }
                    coerced
                }
                None => None,
            };
            if let Some(value) = initial_value {
                catalog.to_initialize.push((name.clone(), value));
            }

            catalog.index.insert(name.clone(), catalog.variables.len());
            catalog.variables.push(ModelVariable {
                name,
                handle: desc.value_reference,
                kind,
                causality: desc.causality,
                role: Role::Other,
                initial_value,
                description: desc.description.clone(),
            });
        }

        Ok(catalog)
    }

    fn disambiguate(&self, base: String) -> String {
        if !self.index.contains_key(&base) {
            return base;
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.index.contains_key(&candidate) && !reserved::is_reserved(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Tag every variable with its role from the active assignment.
    pub fn assign_roles(&mut self, assignment: &RoleAssignment) {
        for var in &mut self.variables {
            var.role = assignment.role_of(&var.name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelVariable> {
        self.index.get(name).map(|&i| &self.variables[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelVariable> {
        self.variables.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Declared start values, in catalog order.
    pub fn to_initialize(&self) -> &[(String, ScalarValue)] {
        &self.to_initialize
    }

    /// `(declared, normalized)` pairs for every renamed variable.
    pub fn renames(&self) -> &[(String, String)] {
        &self.renames
    }
}
