//! Rig configuration types.
//!
//! - `RigConfig` - Main configuration loaded from `rig.toml`
//! - `RigSection` - Tick loop, easing profile and backend selection
//! - `OriginConfig` - One subsystem ("face", "spine", ...) and its channels

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    DEFAULT_BACKEND, DEFAULT_PROFILE, MAX_CHANNELS_PER_ORIGIN, MAX_ORIGINS, TICK_TIME_US,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

fn default_tick_time_us() -> u32 {
    TICK_TIME_US
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

fn default_true() -> bool {
    true
}

/// Main configuration loaded from `rig.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    /// Common `[shared]` section.
    pub shared: SharedConfig,

    /// Runtime settings.
    #[serde(default)]
    pub rig: RigSection,

    /// Declared origins, in registration order.
    #[serde(default)]
    pub origins: Vec<OriginConfig>,
}

/// `[rig]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RigSection {
    /// Tick period in microseconds.
    #[serde(default = "default_tick_time_us")]
    pub tick_time_us: u32,

    /// Whether `advance` also recomputes channel speeds.
    #[serde(default = "default_true")]
    pub with_speed: bool,

    /// Easing profile active at startup.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Backend driven by the tick loop.
    #[serde(default = "default_backend")]
    pub backend: String,
}

impl Default for RigSection {
    fn default() -> Self {
        Self {
            tick_time_us: default_tick_time_us(),
            with_speed: true,
            profile: default_profile(),
            backend: default_backend(),
        }
    }
}

impl RigSection {
    /// Tick period as a Duration.
    pub fn tick_time(&self) -> Duration {
        Duration::from_micros(u64::from(self.tick_time_us))
    }
}

/// `[[origins]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OriginConfig {
    /// Origin name, unique within the rig.
    pub name: String,

    /// Channel names, unique within the origin.
    pub channels: Vec<String>,

    /// Initial values, one per channel. Zeros when omitted.
    #[serde(default)]
    pub initial: Option<Vec<f64>>,
}

impl OriginConfig {
    /// Initial values, expanded to zeros when not configured.
    pub fn initial_values(&self) -> Vec<f64> {
        self.initial
            .clone()
            .unwrap_or_else(|| vec![0.0; self.channels.len()])
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "origin name cannot be empty".to_string(),
            ));
        }
        if self.channels.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "origin '{}' declares no channels",
                self.name
            )));
        }
        if self.channels.len() > MAX_CHANNELS_PER_ORIGIN {
            return Err(ConfigError::ValidationError(format!(
                "origin '{}': too many channels: {} (max {})",
                self.name,
                self.channels.len(),
                MAX_CHANNELS_PER_ORIGIN
            )));
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "origin '{}': empty channel name",
                    self.name
                )));
            }
            if !seen.insert(channel.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "origin '{}': duplicate channel '{}'",
                    self.name, channel
                )));
            }
        }

        if let Some(initial) = &self.initial {
            if initial.len() != self.channels.len() {
                return Err(ConfigError::ValidationError(format!(
                    "origin '{}': {} initial values for {} channels",
                    self.name,
                    initial.len(),
                    self.channels.len()
                )));
            }
            if let Some(bad) = initial.iter().find(|v| !v.is_finite()) {
                return Err(ConfigError::ValidationError(format!(
                    "origin '{}': non-finite initial value {bad}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

impl RigConfig {
    /// Validate the rig configuration.
    ///
    /// # Validation Rules
    /// 1. `[shared]` is valid
    /// 2. `tick_time_us` > 0
    /// 3. `profile` and `backend` are non-empty
    /// 4. 1..=MAX_ORIGINS origins with unique names
    /// 5. Each origin passes its own checks (channels, initial values)
    ///
    /// Whether `profile` names a known easing profile is checked by the
    /// runtime, which owns the profile table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.rig.tick_time_us == 0 {
            return Err(ConfigError::ValidationError(
                "tick_time_us must be greater than 0".to_string(),
            ));
        }
        if self.rig.profile.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "profile cannot be empty".to_string(),
            ));
        }
        if self.rig.backend.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend cannot be empty".to_string(),
            ));
        }

        if self.origins.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one origin must be declared".to_string(),
            ));
        }
        if self.origins.len() > MAX_ORIGINS {
            return Err(ConfigError::ValidationError(format!(
                "Too many origins: {} (max {})",
                self.origins.len(),
                MAX_ORIGINS
            )));
        }

        let mut names = HashSet::new();
        for origin in &self.origins {
            origin.validate()?;
            if !names.insert(origin.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate origin '{}'",
                    origin.name
                )));
            }
        }
        Ok(())
    }

    /// Look up an origin by name.
    pub fn origin(&self, name: &str) -> Option<&OriginConfig> {
        self.origins.iter().find(|o| o.name == name)
    }
}
