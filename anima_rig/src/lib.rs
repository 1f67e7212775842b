//! # Anima Rig Library
//!
//! Tick loop runtime with pluggable output backends.
//!
//! # Module Structure
//!
//! - [`core`] - RigCore struct, tick loop management
//! - [`backend`] - `RigBackend` trait and `RigError`
//! - [`backend_registry`] - Backend factory registration
//! - [`backends`] - Built-in backend implementations
//! - [`behavior`] - Idle behavior family
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          anima_rig                               │
//! │  ┌──────────────┐   retarget   ┌──────────────┐                  │
//! │  │ idle family  │─────────────►│ ActuatorPool │ (one per origin) │
//! │  │ (FSM thread) │              └──────▲───────┘                  │
//! │  └──────────────┘                     │ advance(dt)              │
//! │                               ┌───────┴──────┐   ┌────────────┐  │
//! │                               │   RigCore    │──►│ RigBackend │  │
//! │                               │ (tick loop)  │   │   trait    │  │
//! │                               └──────────────┘   └────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod backend_registry;
pub mod backends;
pub mod behavior;
pub mod core;

pub use backend::{BackendDiagnostics, BackendFactory, RigBackend, RigError};
pub use backend_registry::BackendRegistry;
pub use behavior::{IdleOptions, idle_family};
pub use core::{RigCore, TimingStats};
