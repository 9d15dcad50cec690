//! Persisted role assignments.
//!
//! `cartpole.fmu` is paired with `cartpole_conf.yaml`. Assignments that still
//! need an operator's edit go to `cartpole_conf_EDIT.yaml` so the canonical
//! file is never overwritten by an unapproved draft.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ModelResult;
use crate::roles::RoleAssignment;

#[derive(Debug, Serialize, Deserialize)]
struct RoleFile {
    simulation: RoleAssignment,
}

#[derive(Debug, Clone)]
pub struct RoleStore {
    canonical: PathBuf,
    draft: PathBuf,
}

fn sibling_with_suffix(model_path: &Path, suffix: &str) -> PathBuf {
    let stem = model_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    let file_name = format!("{stem}{suffix}");
    match model_path.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

impl RoleStore {
    /// Store for the role file paired with `model_path`.
    pub fn for_model(model_path: &Path) -> Self {
        Self {
            canonical: sibling_with_suffix(model_path, "_conf.yaml"),
            draft: sibling_with_suffix(model_path, "_conf_EDIT.yaml"),
        }
    }

    pub fn canonical_path(&self) -> &Path {
        &self.canonical
    }

    pub fn draft_path(&self) -> &Path {
        &self.draft
    }

    /// Load the canonical assignment.
    ///
    /// Missing, unreadable, malformed, or unusable files all yield `None`;
    /// the reason is logged.
    pub fn load(&self) -> Option<RoleAssignment> {
        let content = match fs::read_to_string(&self.canonical) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.canonical.display(), "no cached role file");
                return None;
            }
            Err(e) => {
                warn!(path = %self.canonical.display(), error = %e, "cannot read cached role file");
                return None;
            }
        };

        let file: RoleFile = match serde_yaml::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    path = %self.canonical.display(),
                    error = %e,
                    "cached role file lacks a complete 'simulation' section, ignoring it"
                );
                return None;
            }
        };

        if let Some(reason) = file.simulation.unusable_reason() {
            warn!(path = %self.canonical.display(), reason, "cached role file is unusable");
            return None;
        }

        info!(path = %self.canonical.display(), "found cached role file");
        Some(file.simulation)
    }

    /// Write an approved assignment to the canonical file.
    pub fn save(&self, assignment: &RoleAssignment) -> ModelResult<&Path> {
        write_role_file(&self.canonical, assignment)?;
        info!(path = %self.canonical.display(), "saved role file for reuse");
        Ok(&self.canonical)
    }

    /// Write an assignment for manual editing to the `_EDIT` file.
    pub fn save_draft(&self, assignment: &RoleAssignment) -> ModelResult<&Path> {
        write_role_file(&self.draft, assignment)?;
        warn!(
            path = %self.draft.display(),
            "wrote role file draft; edit it and remove the '_EDIT' suffix to use this model"
        );
        Ok(&self.draft)
    }
}

fn write_role_file(path: &Path, assignment: &RoleAssignment) -> ModelResult<()> {
    let file = RoleFile {
        simulation: assignment.clone(),
    };
    let content = serde_yaml::to_string(&file)?;
    fs::write(path, content)?;
    Ok(())
}
