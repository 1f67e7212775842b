//! Prelude module for common re-exports.
//!
//! ```rust
//! use anima_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};
pub use crate::rig::{OriginConfig, RigConfig, RigSection};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{DEFAULT_BACKEND, DEFAULT_PROFILE, TICK_TIME_US};
