//! Improver registry.
//!
//! Name-keyed map of improvers owned by a bridge instance. Registration is
//! rare and administrative; lookups happen per message.

use crate::improve::improver::Improver;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry mapping improver names to implementations.
///
/// Names are unique; registering under an existing name overwrites it.
pub struct ImproverRegistry {
    improvers: RwLock<HashMap<String, Arc<dyn Improver>>>,
}

impl ImproverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            improvers: RwLock::new(HashMap::new()),
        }
    }

    /// Register an improver, overwriting any previous holder of `name`.
    pub fn register(&self, name: &str, improver: Arc<dyn Improver>) {
        self.improvers
            .write()
            .expect("improver registry lock poisoned")
            .insert(name.to_string(), improver);
    }

    /// Get an improver by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Improver>> {
        self.improvers
            .read()
            .expect("improver registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.improvers
            .read()
            .expect("improver registry lock poisoned")
            .contains_key(name)
    }

    /// All registered improver names.
    pub fn names(&self) -> Vec<String> {
        self.improvers
            .read()
            .expect("improver registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Number of registered improvers.
    pub fn len(&self) -> usize {
        self.improvers
            .read()
            .expect("improver registry lock poisoned")
            .len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ImproverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
