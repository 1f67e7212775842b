//! System-wide constants for the anima workspace.
//!
//! Single source of truth for numeric limits and default paths.

/// Maximum number of origins a rig may declare.
pub const MAX_ORIGINS: usize = 32;

/// Maximum number of channels within one origin.
pub const MAX_CHANNELS_PER_ORIGIN: usize = 256;

/// Default tick period in microseconds (100 Hz).
pub const TICK_TIME_US: u32 = 10_000;

/// Name of the easing profile active at startup.
pub const DEFAULT_PROFILE: &str = "smooth_step";

/// Name of the backend used when none is configured.
pub const DEFAULT_BACKEND: &str = "simulation";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/anima/rig.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(MAX_ORIGINS > 0);
        assert!(MAX_CHANNELS_PER_ORIGIN > 0);
        assert!(TICK_TIME_US > 0);
        assert!(!DEFAULT_PROFILE.is_empty());
        assert!(!DEFAULT_BACKEND.is_empty());
    }
}
