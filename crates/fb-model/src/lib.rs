//! fb-model: model metadata, variable catalog, and role resolution.
//!
//! Contains:
//! - description (serde form of the backend's static metadata)
//! - catalog (normalized variables + coercion rules)
//! - roles (config/action/state/other partition)
//! - role_file (persisted `_conf.yaml` assignments)
//! - interface (descriptor for the training platform)
//! - resolve (cached-then-introspected resolution pipeline)

pub mod catalog;
pub mod description;
pub mod error;
pub mod interface;
pub mod reserved;
pub mod resolve;
pub mod role_file;
pub mod roles;

pub use catalog::{ModelVariable, ScalarValue, ValueRef, VariableCatalog, VariableKind};
pub use description::{
    Causality, DeclaredType, DefaultExperiment, InterfaceDef, ModelDescription,
    VariableDescriptor,
};
pub use error::{ModelError, ModelResult};
pub use interface::{InterfaceDescriptor, InterfaceField, StateInclusion};
pub use resolve::{Approver, AutoApprove, Resolution, ResolveRequest, RoleSource, resolve_roles};
pub use role_file::RoleStore;
pub use roles::{Role, RoleAssignment};

/// Load a model description document from YAML.
pub fn load_description_yaml(path: &std::path::Path) -> ModelResult<ModelDescription> {
    let content = std::fs::read_to_string(path)?;
    let description: ModelDescription = serde_yaml::from_str(&content)?;
    Ok(description)
}

/// Save a model description document as YAML.
pub fn save_description_yaml(
    path: &std::path::Path,
    description: &ModelDescription,
) -> ModelResult<()> {
    let content = serde_yaml::to_string(description)?;
    std::fs::write(path, content)?;
    Ok(())
}
