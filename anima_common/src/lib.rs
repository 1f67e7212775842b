//! Anima Common Library
//!
//! Shared constants and configuration loading for the anima workspace.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - System-wide limits and defaults
//! - [`rig`] - Rig configuration (`rig.toml`): tick rate, profile, origins
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod prelude;
pub mod rig;
