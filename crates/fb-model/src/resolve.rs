//! Role resolution pipeline.
//!
//! Strategies run in order:
//! 1. cached assignment from the model's role file
//! 2. introspection of each variable's declared causality
//!
//! The first strategy that produces a usable assignment the approver accepts
//! wins. When neither does, the introspected partition is written as an
//! `_EDIT` draft for an operator to repair and the pipeline fails.

use tracing::{info, warn};

use crate::catalog::VariableCatalog;
use crate::error::{ModelError, ModelResult};
use crate::interface::{InterfaceDescriptor, StateInclusion};
use crate::role_file::RoleStore;
use crate::roles::RoleAssignment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    Cached,
    Introspected,
}

/// Decides whether a candidate assignment is accepted.
pub trait Approver {
    fn approve(&mut self, source: RoleSource, candidate: &RoleAssignment) -> bool;
}

/// Non-interactive approval: every usable candidate is accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl Approver for AutoApprove {
    fn approve(&mut self, _source: RoleSource, _candidate: &RoleAssignment) -> bool {
        true
    }
}

impl<F> Approver for F
where
    F: FnMut(RoleSource, &RoleAssignment) -> bool,
{
    fn approve(&mut self, source: RoleSource, candidate: &RoleAssignment) -> bool {
        self(source, candidate)
    }
}

/// Inputs to one resolution run.
pub struct ResolveRequest<'a> {
    pub model_name: &'a str,
    pub catalog: &'a VariableCatalog,
    pub store: &'a RoleStore,
    pub inclusion: StateInclusion,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub assignment: RoleAssignment,
    pub source: RoleSource,
    pub interface: InterfaceDescriptor,
}

/// Resolve the active role assignment for a model.
pub fn resolve_roles(
    request: &ResolveRequest,
    approver: &mut dyn Approver,
) -> ModelResult<Resolution> {
    let finish = |assignment: RoleAssignment, source: RoleSource| {
        let interface = InterfaceDescriptor::project(
            request.model_name,
            &assignment,
            request.catalog,
            request.inclusion,
        );
        Resolution {
            assignment,
            source,
            interface,
        }
    };

    if let Some(mut cached) = request.store.load() {
        let stripped = cached.strip_reserved();
        if !stripped.is_empty() {
            warn!(names = ?stripped, "cached role file lists reserved fields, dropping them");
        }
        let unknown = cached.unknown_names(request.catalog);
        if !unknown.is_empty() {
            warn!(names = ?unknown, "cached role file names variables the model does not expose");
        }
        match cached.unusable_reason() {
            Some(reason) => warn!(reason, "cached role assignment is unusable without reserved fields"),
            None => {
                info!("cached role assignment:\n{cached}");
                if approver.approve(RoleSource::Cached, &cached) {
                    return Ok(finish(cached, RoleSource::Cached));
                }
                info!("cached role assignment declined");
            }
        }
    }

    let introspected = RoleAssignment::from_causality(request.catalog);
    info!("role assignment from variable causality:\n{introspected}");
    match introspected.unusable_reason() {
        Some(reason) => warn!(reason, "causality-derived role assignment is unusable"),
        None => {
            if approver.approve(RoleSource::Introspected, &introspected) {
                if let Err(e) = request.store.save(&introspected) {
                    warn!(error = %e, "could not persist role assignment for reuse");
                }
                return Ok(finish(introspected, RoleSource::Introspected));
            }
            info!("causality-derived role assignment declined");
        }
    }

    let draft_path = request.store.save_draft(&introspected)?.to_path_buf();
    Err(ModelError::UnresolvableModelInterface { draft_path })
}
