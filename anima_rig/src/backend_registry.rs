//! Backend registry.
//!
//! Provides a `BackendRegistry` for registering and retrieving backend
//! factories. The registry is built at startup and handed to `RigCore` by
//! reference; there is no global registry.

use crate::backend::{BackendFactory, RigBackend, RigError};
use crate::backends;
use std::collections::BTreeMap;
use tracing::debug;

/// Registry of available backends.
pub struct BackendRegistry {
    factories: BTreeMap<&'static str, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in backend.
    pub fn with_builtin() -> Result<Self, RigError> {
        let mut registry = Self::new();
        backends::register_builtin(&mut registry)?;
        Ok(registry)
    }

    /// Register a backend factory.
    ///
    /// # Errors
    /// Returns `RigError::DuplicateBackend` if the name is taken.
    pub fn register(&mut self, name: &'static str, factory: BackendFactory) -> Result<(), RigError> {
        if self.factories.contains_key(name) {
            return Err(RigError::DuplicateBackend(name.to_string()));
        }
        self.factories.insert(name, factory);
        debug!("backend '{}' registered", name);
        Ok(())
    }

    /// Get a backend factory by name.
    pub fn get_factory(&self, name: &str) -> Option<BackendFactory> {
        self.factories.get(name).copied()
    }

    /// Create a backend instance by name.
    ///
    /// # Errors
    /// Returns `RigError::BackendNotFound` if no backend with the given name is registered.
    pub fn create_backend(&self, name: &str) -> Result<Box<dyn RigBackend>, RigError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| RigError::BackendNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// All registered backend names, sorted.
    pub fn list_backends(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_common::rig::RigConfig;
    use anima_core::store::StoreSnapshot;
    use std::time::Duration;

    struct NullBackend;

    impl RigBackend for NullBackend {
        fn name(&self) -> &'static str {
            "null"
        }

        fn version(&self) -> &'static str {
            "0.1.0"
        }

        fn init(&mut self, _config: &RigConfig) -> Result<(), RigError> {
            Ok(())
        }

        fn cycle(&mut self, _snapshot: &StoreSnapshot, _dt: Duration) {}

        fn shutdown(&mut self) -> Result<(), RigError> {
            Ok(())
        }
    }

    fn create_null_backend() -> Box<dyn RigBackend> {
        Box::new(NullBackend)
    }

    #[test]
    fn registry_register_and_create() {
        let mut reg = BackendRegistry::new();
        reg.register("null", create_null_backend).unwrap();

        let backend = reg.create_backend("null").unwrap();
        assert_eq!(backend.name(), "null");
    }

    #[test]
    fn registry_backend_not_found() {
        let reg = BackendRegistry::new();
        let result = reg.create_backend("servo_bus");
        assert!(matches!(result, Err(RigError::BackendNotFound(_))));
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut reg = BackendRegistry::new();
        reg.register("dup", create_null_backend).unwrap();
        assert!(matches!(
            reg.register("dup", create_null_backend),
            Err(RigError::DuplicateBackend(_))
        ));
    }

    #[test]
    fn builtin_registry_has_simulation() {
        let mut reg = BackendRegistry::with_builtin().unwrap();
        reg.register("null", create_null_backend).unwrap();
        assert_eq!(reg.list_backends(), vec!["null", "simulation"]);
    }
}
