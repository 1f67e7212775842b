//! Backend trait and error types.
//!
//! This module defines:
//! - `RigBackend` trait - Interface for pluggable output backends
//! - `RigError` enum - Error types for rig operations
//! - `BackendFactory` type alias - Factory function type
//! - `BackendDiagnostics` struct - Optional backend diagnostics

use anima_common::config::ConfigError;
use anima_common::rig::RigConfig;
use anima_core::error::{ChannelError, FsmError, ProfileError};
use anima_core::store::StoreSnapshot;
use std::time::Duration;
use thiserror::Error;

/// Error types for rig operations.
#[derive(Debug, Error)]
pub enum RigError {
    /// Backend or rig initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration file could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No backend registered under that name
    #[error("Backend not found: {0}")]
    BackendNotFound(String),

    /// A backend with that name is already registered
    #[error("Backend already registered: {0}")]
    DuplicateBackend(String),

    /// Backend reported a failure
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Channel registration or retargeting failed
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Unknown easing profile
    #[error(transparent)]
    Profile(#[from] ProfileError),

    /// Behavior family construction or run failed
    #[error(transparent)]
    Fsm(#[from] FsmError),
}

/// Factory function type for creating backend instances.
pub type BackendFactory = fn() -> Box<dyn RigBackend>;

/// Optional backend diagnostics.
#[derive(Debug, Clone, Default)]
pub struct BackendDiagnostics {
    /// Number of cycles executed
    pub cycle_count: u64,
    /// Channels still moving at the last cycle
    pub active_channels: usize,
    /// Backend-specific diagnostics (JSON string)
    pub custom: Option<String>,
}

/// Trait defining the interface for output backends.
///
/// `RigCore` feeds every backend the same thing: a deep copy of the channel
/// store, once per tick. Backends turn those normalized values into servo
/// positions, renderer parameters, or (for `simulation`) virtual actuators.
///
/// # Lifecycle
///
/// 1. `init()` - Called once before the tick loop starts
/// 2. `cycle()` - Called every `tick_time_us` from the tick loop
/// 3. `shutdown()` - Called when the rig is stopping
///
/// # Timing Contracts
///
/// | Operation    | Max Duration   | Constraint |
/// |--------------|----------------|------------|
/// | `init()`     | a few seconds  | None (before the loop) |
/// | `cycle()`    | `tick_time_us` | Overruns are counted as timing violations |
/// | `shutdown()` | 1 second       | None (after the loop) |
pub trait RigBackend: Send {
    /// Returns the backend's unique identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Returns the backend's semantic version.
    fn version(&self) -> &'static str;

    /// Prepare outputs for the configured origins.
    ///
    /// # Errors
    /// Return `RigError::InitFailed` if initialization cannot complete.
    fn init(&mut self, config: &RigConfig) -> Result<(), RigError>;

    /// Push one tick worth of channel values to the outputs.
    ///
    /// # Arguments
    /// * `snapshot` - Copy of every origin's rows, taken after `advance`
    /// * `dt` - Actual elapsed time since the previous tick
    fn cycle(&mut self, snapshot: &StoreSnapshot, dt: Duration);

    /// Release outputs.
    fn shutdown(&mut self) -> Result<(), RigError>;

    /// Get backend-specific diagnostics.
    /// Default: None
    fn diagnostics(&self) -> Option<BackendDiagnostics> {
        None
    }
}
