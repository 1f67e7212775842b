//! Built-in output backends.
//!
//! - [`simulation`] - Virtual actuators for development and testing
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule under `backends/`
//! 2. Implement the `RigBackend` trait from `crate::backend`
//! 3. Register its factory in [`register_builtin`]

pub mod simulation;

use crate::backend::RigError;
use crate::backend_registry::BackendRegistry;

/// Register every built-in backend with `registry`.
pub fn register_builtin(registry: &mut BackendRegistry) -> Result<(), RigError> {
    registry.register("simulation", simulation::create_backend)?;
    Ok(())
}
