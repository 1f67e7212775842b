//! Motion profiles and the `Dynamics` hub.
//!
//! A [`MotionProfile`] is a pair of pure functions on `[0, 1]`: the easing
//! curve and its derivative, with `ease(0) = 0` and `ease(1) = 1`. Channels
//! evaluate the active profile on every tick, so switching profiles through
//! [`Dynamics::change_profile`] reshapes motions that are already in flight.
//! The switch is immediate: a channel halfway through a smooth-step
//! retarget jumps onto the new curve at its current normalized time.
//!
//! `Dynamics` is owned explicitly and shared through `Arc`; every
//! [`ActuatorPool`](crate::pool::ActuatorPool) subscribes to it and caches
//! the profile it is told about.

use crate::error::ProfileError;
use parking_lot::{Mutex, RwLock};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shaping function on the normalized domain `[0, 1]`.
pub type EaseFn = fn(f64) -> f64;

/// Easing curve plus derivative, selectable by name.
#[derive(Clone, Copy)]
pub struct MotionProfile {
    name: &'static str,
    ease: EaseFn,
    ease_derivative: EaseFn,
}

impl MotionProfile {
    /// Build a profile from its two functions.
    pub const fn new(name: &'static str, ease: EaseFn, ease_derivative: EaseFn) -> Self {
        Self {
            name,
            ease,
            ease_derivative,
        }
    }

    /// Profile name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Eased progress for normalized time `x`.
    #[inline]
    pub fn ease(&self, x: f64) -> f64 {
        (self.ease)(x)
    }

    /// Derivative of [`ease`](Self::ease) with respect to normalized time.
    #[inline]
    pub fn ease_derivative(&self, x: f64) -> f64 {
        (self.ease_derivative)(x)
    }
}

impl fmt::Debug for MotionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MotionProfile").field(&self.name).finish()
    }
}

impl PartialEq for MotionProfile {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

fn smooth_step(x: f64) -> f64 {
    x * x * (3.0 - 2.0 * x)
}

fn smooth_step_derivative(x: f64) -> f64 {
    6.0 * x * (1.0 - x)
}

fn cos_slow(x: f64) -> f64 {
    x - (2.0 * PI * x).sin() / (2.0 * PI)
}

fn cos_slow_derivative(x: f64) -> f64 {
    1.0 - (2.0 * PI * x).cos()
}

fn linear(x: f64) -> f64 {
    x
}

fn linear_derivative(_x: f64) -> f64 {
    1.0
}

/// Cubic ease-in/ease-out, `x²(3 − 2x)`.
pub const SMOOTH_STEP: MotionProfile =
    MotionProfile::new("smooth_step", smooth_step, smooth_step_derivative);

/// Cosine-shaped ease with a slower start and finish than `SMOOTH_STEP`.
pub const COS_SLOW: MotionProfile = MotionProfile::new("cos_slow", cos_slow, cos_slow_derivative);

/// Constant speed.
pub const LINEAR: MotionProfile = MotionProfile::new("linear", linear, linear_derivative);

/// Profiles known to every `Dynamics` hub.
pub const BUILTIN_PROFILES: [MotionProfile; 3] = [SMOOTH_STEP, COS_SLOW, LINEAR];

/// Look up a built-in profile by name.
pub fn builtin(name: &str) -> Option<MotionProfile> {
    BUILTIN_PROFILES.iter().copied().find(|p| p.name == name)
}

/// Handle returned by [`Dynamics::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&MotionProfile) + Send + Sync>;

struct DynamicsInner {
    active: MotionProfile,
    profiles: Vec<MotionProfile>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
}

/// Owner of the active motion profile.
///
/// One hub per process is the usual setup, but nothing enforces it: tests
/// build as many as they need.
pub struct Dynamics {
    inner: RwLock<DynamicsInner>,
    // Serializes change + notify so subscribers see switches in order.
    switching: Mutex<()>,
}

impl Dynamics {
    /// Hub with the built-in profiles and `SMOOTH_STEP` active.
    pub fn new() -> Self {
        Self::with_active(SMOOTH_STEP)
    }

    /// Hub with the built-in profiles and `active` selected.
    ///
    /// `active` is added to the table if it is not a built-in.
    pub fn with_active(active: MotionProfile) -> Self {
        let mut profiles = BUILTIN_PROFILES.to_vec();
        if !profiles.contains(&active) {
            profiles.push(active);
        }
        Self {
            inner: RwLock::new(DynamicsInner {
                active,
                profiles,
                subscribers: Vec::new(),
                next_id: 0,
            }),
            switching: Mutex::new(()),
        }
    }

    /// Hub with the profile named `name` active.
    pub fn with_profile_name(name: &str) -> Result<Self, ProfileError> {
        builtin(name)
            .map(Self::with_active)
            .ok_or_else(|| ProfileError::UnknownProfile(name.to_string()))
    }

    /// Currently active profile.
    pub fn active(&self) -> MotionProfile {
        self.inner.read().active
    }

    /// Names of all selectable profiles.
    pub fn list_profiles(&self) -> Vec<&'static str> {
        self.inner.read().profiles.iter().map(|p| p.name).collect()
    }

    /// Make a custom profile selectable. Replaces a profile of the same name.
    pub fn add_profile(&self, profile: MotionProfile) {
        let mut inner = self.inner.write();
        inner.profiles.retain(|p| p.name != profile.name);
        inner.profiles.push(profile);
        debug!("motion profile '{}' added", profile.name);
    }

    /// Switch the active profile and notify every subscriber.
    ///
    /// Unknown names leave the active profile untouched.
    pub fn change_profile(&self, name: &str) -> Result<(), ProfileError> {
        let _switching = self.switching.lock();

        let subscribers: Vec<Subscriber> = {
            let mut inner = self.inner.write();
            let Some(profile) = inner.profiles.iter().copied().find(|p| p.name == name) else {
                warn!("motion profile '{}' doesn't exist", name);
                return Err(ProfileError::UnknownProfile(name.to_string()));
            };
            inner.active = profile;
            inner.subscribers.iter().map(|(_, s)| Arc::clone(s)).collect()
        };

        let profile = self.active();
        info!(
            "motion profile changed to '{}' ({} subscribers)",
            profile.name,
            subscribers.len()
        );
        for subscriber in subscribers {
            subscriber(&profile);
        }
        Ok(())
    }

    /// Register a callback run on every profile change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&MotionProfile) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(callback)));
        id
    }

    /// Register `callback` and run it once with the active profile.
    ///
    /// No `change_profile` can slip in between the two, so the callback sees
    /// every profile from now on, starting with the current one.
    pub fn follow<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&MotionProfile) + Send + Sync + 'static,
    {
        let _switching = self.switching.lock();
        let callback: Subscriber = Arc::new(callback);
        let (id, active) = {
            let mut inner = self.inner.write();
            let id = SubscriptionId(inner.next_id);
            inner.next_id += 1;
            inner.subscribers.push((id, Arc::clone(&callback)));
            (id, inner.active)
        };
        callback(&active);
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.write();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sid, _)| *sid != id);
        inner.subscribers.len() != before
    }

    /// Number of registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }
}

impl Default for Dynamics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dynamics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Dynamics")
            .field("active", &inner.active)
            .field("profiles", &inner.profiles.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}
