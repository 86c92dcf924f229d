//! Filter kind registry.
//!
//! A [`FilterRegistry`] maps kind ids to [`FilterKind`] bundles. Grids can own
//! one, or share the process-wide registry returned by [`global`], which
//! starts with the built-in kinds and only ever grows.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, LazyLock, RwLock};

use super::builtin::{
    BooleanFilter, DateRangeFilter, MultiSelectFilter, NumberRangeFilter, SelectFilter, TextFilter,
};
use super::kinds::FilterKind;
use crate::errors::RegistryError;

pub const TEXT: &str = "text";
pub const SELECT: &str = "select";
pub const MULTI_SELECT: &str = "multi_select";
pub const BOOLEAN: &str = "boolean";
pub const DATE_RANGE: &str = "date_range";
pub const NUMBER_RANGE: &str = "number_range";

#[derive(Clone, Default)]
pub struct FilterRegistry {
    kinds: BTreeMap<String, Arc<dyn FilterKind>>,
}

impl FilterRegistry {
    /// A registry without any kinds.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding the six built-in kinds.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry
            .register(TEXT, TextFilter)
            .register(SELECT, SelectFilter)
            .register(MULTI_SELECT, MultiSelectFilter)
            .register(BOOLEAN, BooleanFilter)
            .register(DATE_RANGE, DateRangeFilter)
            .register(NUMBER_RANGE, NumberRangeFilter);
        registry
    }

    /// Add or replace a kind.
    pub fn register<K>(&mut self, id: &str, kind: K) -> &mut Self
    where
        K: FilterKind + 'static,
    {
        self.kinds.insert(id.to_string(), Arc::new(kind));
        self
    }

    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if no kind is registered under `id`.
    pub fn lookup(&self, id: &str) -> Result<Arc<dyn FilterKind>, RegistryError> {
        self.kinds
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.kinds.contains_key(id)
    }

    #[must_use]
    pub fn all_kinds(&self) -> BTreeSet<String> {
        self.kinds.keys().cloned().collect()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds.keys()).finish()
    }
}

// Readers get a snapshot; registration swaps in an extended copy.
static GLOBAL: LazyLock<RwLock<Arc<FilterRegistry>>> =
    LazyLock::new(|| RwLock::new(Arc::new(FilterRegistry::with_builtin())));

/// Current snapshot of the process-wide registry.
#[must_use]
pub fn global() -> Arc<FilterRegistry> {
    match GLOBAL.read() {
        Ok(guard) => Arc::clone(&guard),
        Err(poisoned) => Arc::clone(&poisoned.into_inner()),
    }
}

/// Register a kind in the process-wide registry.
///
/// Snapshots already handed out by [`global`] keep their old contents.
pub fn register_global<K>(id: &str, kind: K)
where
    K: FilterKind + 'static,
{
    let mut guard = match GLOBAL.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let mut next = FilterRegistry::clone(&guard);
    next.register(id, kind);
    *guard = Arc::new(next);
    tracing::debug!(kind = id, "Registered filter kind");
}
