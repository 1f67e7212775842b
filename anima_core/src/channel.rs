//! One interpolated channel row.

use crate::profile::MotionProfile;
use serde::{Deserialize, Serialize};

/// Column names of a channel row, in storage order.
pub const COLUMNS: [&str; 6] = ["base", "distance", "duration", "remaining", "speed", "value"];

/// Interpolation state of one named actuator.
///
/// `remaining_duration` stays within `[0, target_duration]` and the channel
/// is active while it is positive. Progress is measured by
/// `elapsed_duration`, so ticks whose sum equals the duration land exactly
/// on `base_value + target_distance`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub base_value: f64,
    pub target_distance: f64,
    pub target_duration: f64,
    pub remaining_duration: f64,
    pub speed: f64,
    pub current_value: f64,
    /// Time spent on the current motion.
    #[serde(default)]
    pub elapsed_duration: f64,
}

impl Channel {
    /// Channel resting at `value`.
    pub const fn at_rest(value: f64) -> Self {
        Self {
            base_value: value,
            target_distance: 0.0,
            target_duration: 0.0,
            remaining_duration: 0.0,
            speed: 0.0,
            current_value: value,
            elapsed_duration: 0.0,
        }
    }

    /// Still interpolating.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.remaining_duration > 0.0
    }

    /// Value the channel is heading to.
    #[inline]
    pub fn target(&self) -> f64 {
        self.base_value + self.target_distance
    }

    /// Start a new motion from wherever the channel currently is.
    ///
    /// `duration` must be positive; the pool checks it before calling.
    /// Speed is left alone until the next `advance`.
    pub fn retarget(&mut self, target: f64, duration: f64) {
        self.base_value = self.current_value;
        self.target_distance = target - self.current_value;
        self.target_duration = duration;
        self.remaining_duration = duration;
        self.elapsed_duration = 0.0;
    }

    /// Move the channel forward by `dt` seconds. Returns whether it is still
    /// active afterwards.
    ///
    /// Inactive channels and non-positive `dt` leave every field untouched.
    pub fn advance(&mut self, dt: f64, profile: &MotionProfile, with_speed: bool) -> bool {
        if !self.is_active() || dt <= 0.0 {
            return self.is_active();
        }

        self.elapsed_duration += dt;
        if self.elapsed_duration >= self.target_duration {
            self.current_value = self.base_value + self.target_distance;
            self.speed = 0.0;
            self.remaining_duration = 0.0;
            self.elapsed_duration = self.target_duration;
            return false;
        }

        self.remaining_duration = self.target_duration - self.elapsed_duration;
        let x = self.elapsed_duration / self.target_duration;
        self.current_value = profile.ease(x) * self.target_distance + self.base_value;
        if with_speed {
            self.speed =
                profile.ease_derivative(x) * self.target_distance / self.target_duration;
        }
        true
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::at_rest(0.0)
    }
}
