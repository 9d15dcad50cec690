//! Name-based bulk reads and writes against the backend.

use fb_model::{ModelVariable, ValueRef, VariableCatalog};
use tracing::{debug, warn};

use crate::Values;
use crate::backend::{BackendResult, SimBackend};
use crate::observation::Observation;

/// Resolves public names through the catalog and talks to the backend in bulk.
#[derive(Debug, Clone, Copy)]
pub struct VariableAccess<'a> {
    catalog: &'a VariableCatalog,
}

impl<'a> VariableAccess<'a> {
    pub fn new(catalog: &'a VariableCatalog) -> Self {
        Self { catalog }
    }

    /// Catalog entries for `names`, in order; unknown names are skipped.
    pub fn resolve<'n, I>(&self, names: I) -> Vec<&'a ModelVariable>
    where
        I: IntoIterator<Item = &'n str>,
    {
        let catalog = self.catalog;
        names
            .into_iter()
            .filter_map(|name| {
                let var = catalog.get(name);
                if var.is_none() {
                    debug!(name, "skipping unknown variable name");
                }
                var
            })
            .collect()
    }

    /// Read the named variables; unknown names are left out of the result.
    pub fn read<'n, I>(&self, backend: &mut dyn SimBackend, names: I) -> BackendResult<Observation>
    where
        I: IntoIterator<Item = &'n str>,
    {
        let vars = self.resolve(names);
        if vars.is_empty() {
            return Ok(Observation::new());
        }
        let refs: Vec<ValueRef> = vars.iter().map(|v| v.handle).collect();
        let values = backend.read(&refs)?;
        Ok(vars
            .iter()
            .zip(values)
            .map(|(var, value)| (var.name.clone(), value))
            .collect())
    }

    /// Coerce and write `values` in one bulk call.
    ///
    /// Returns whether anything was written.
    pub fn write(&self, backend: &mut dyn SimBackend, values: &Values) -> BackendResult<bool> {
        let pairs: Vec<(&str, f64)> = values.iter().map(|(n, v)| (n.as_str(), *v)).collect();
        self.write_pairs(backend, &pairs)
    }

    fn write_pairs(&self, backend: &mut dyn SimBackend, pairs: &[(&str, f64)]) -> BackendResult<bool> {
        let mut refs = Vec::with_capacity(pairs.len());
        let mut coerced = Vec::with_capacity(pairs.len());
        for (name, value) in pairs {
            let Some(var) = self.catalog.get(name) else {
                debug!(name, "skipping unknown variable name");
                continue;
            };
            match var.kind.coerce(*value) {
                Some(v) => {
                    refs.push(var.handle);
                    coerced.push(v);
                }
                None => warn!(name, value, kind = ?var.kind, "value cannot be coerced, skipping"),
            }
        }
        if refs.is_empty() {
            return Ok(false);
        }
        backend.write(&refs, &coerced)?;
        Ok(true)
    }

    /// Write config `values`, then every declared default they do not name.
    ///
    /// Returns whether any of `values` was written.
    pub fn apply_config(&self, backend: &mut dyn SimBackend, values: &Values) -> BackendResult<bool> {
        let applied = self.write(backend, values)?;
        if !values.is_empty() && !applied {
            debug!("no valid config parameters were given");
        }

        let defaults: Vec<(&str, f64)> = self
            .catalog
            .to_initialize()
            .iter()
            .filter(|(name, _)| !values.contains_key(name))
            .map(|(name, value)| (name.as_str(), value.as_f64()))
            .collect();
        if self.write_pairs(backend, &defaults)? {
            debug!(count = defaults.len(), "applied declared start values");
        }
        Ok(applied)
    }
}
