//! Per-origin façade over the channel store.
//!
//! An [`ActuatorPool`] is the single writer of its origin's rows:
//!
//! - the command layer calls [`set_targets`](ActuatorPool::set_targets) or
//!   [`commit`](ActuatorPool::commit), possibly from several threads
//! - the tick loop calls [`advance`](ActuatorPool::advance)
//! - hardware threads read [`snapshot`](ActuatorPool::snapshot) and may park
//!   in [`wait`](ActuatorPool::wait) until the next retarget
//!
//! Every operation takes the per-origin lock, so writers are serialized and
//! readers always see whole rows.

use crate::channel::Channel;
use crate::error::ChannelError;
use crate::profile::{Dynamics, MotionProfile, SubscriptionId};
use crate::store::{ChannelRow, ChannelStore, OriginSnapshot, OriginTable, TableState};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Retargets collected before a commit.
///
/// Later entries for the same channel override earlier ones when the batch
/// is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetBatch {
    entries: Vec<(String, f64, f64)>,
}

impl TargetBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `name` to move to `value` over `duration` seconds.
    pub fn push(&mut self, name: impl Into<String>, value: f64, duration: f64) -> &mut Self {
        self.entries.push((name.into(), value, duration));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<S: Into<String>> FromIterator<(S, f64, f64)> for TargetBatch {
    fn from_iter<I: IntoIterator<Item = (S, f64, f64)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, value, duration)| (name.into(), value, duration))
                .collect(),
        }
    }
}

/// Writer handle for one origin.
pub struct ActuatorPool {
    table: Arc<OriginTable>,
    store: Arc<ChannelStore>,
    dynamics: Arc<Dynamics>,
    subscription: SubscriptionId,
}

static_assertions::assert_impl_all!(ActuatorPool: Send, Sync);

impl ActuatorPool {
    /// Claim `origin` in `store` and follow profile changes from `dynamics`.
    ///
    /// Fails with `OriginTaken` if another pool already owns the origin.
    pub fn new(
        store: Arc<ChannelStore>,
        origin: &str,
        dynamics: Arc<Dynamics>,
    ) -> Result<Self, ChannelError> {
        let table = store.claim(origin, dynamics.active())?;

        // The claim's profile is provisional; `follow` overwrites it under the
        // switch lock, so a concurrent change cannot be missed.
        let weak: Weak<OriginTable> = Arc::downgrade(&table);
        let subscription = dynamics.follow(move |profile: &MotionProfile| {
            if let Some(table) = weak.upgrade() {
                table.state.lock().profile = *profile;
                debug!("origin '{}' follows profile '{}'", table.origin, profile.name());
            }
        });

        Ok(Self {
            table,
            store,
            dynamics,
            subscription,
        })
    }

    /// Origin name.
    pub fn origin(&self) -> &str {
        &self.table.origin
    }

    /// Declare channels, at rest on `initial` (zeros when `None`).
    ///
    /// Nothing is registered if any name is already taken, repeated, or if
    /// `initial` has the wrong length.
    pub fn register<S: AsRef<str>>(
        &self,
        names: &[S],
        initial: Option<&[f64]>,
    ) -> Result<(), ChannelError> {
        if let Some(values) = initial {
            if values.len() != names.len() {
                return Err(ChannelError::LengthMismatch {
                    names: names.len(),
                    values: values.len(),
                });
            }
        }

        let mut state = self.table.state.lock();
        for (i, name) in names.iter().enumerate() {
            let name = name.as_ref();
            let repeated = names[..i].iter().any(|n| n.as_ref() == name);
            if repeated || state.index.contains_key(name) {
                return Err(ChannelError::DuplicateChannel {
                    origin: self.table.origin.clone(),
                    name: name.to_string(),
                });
            }
        }

        for (i, name) in names.iter().enumerate() {
            let value = initial.map_or(0.0, |values| values[i]);
            let name = name.as_ref().to_string();
            let next = state.rows.len();
            state.index.insert(name.clone(), next);
            state.names.push(name);
            state.rows.push(Channel::at_rest(value));
        }

        info!(
            "origin '{}': registered {} channels ({} total)",
            self.table.origin,
            names.len(),
            state.rows.len()
        );
        debug!("{}", render_table(&self.table.origin, &state));
        Ok(())
    }

    /// Retarget channels as one transaction.
    ///
    /// Each entry is `(name, target_value, duration_seconds)`. Every entry is
    /// validated before any row changes. Threads parked in `wait()` are woken
    /// once the whole batch is applied.
    pub fn set_targets<I, S>(&self, updates: I) -> Result<(), ChannelError>
    where
        I: IntoIterator<Item = (S, f64, f64)>,
        S: AsRef<str>,
    {
        let updates: Vec<(S, f64, f64)> = updates.into_iter().collect();
        let mut state = self.table.state.lock();

        let mut resolved = Vec::with_capacity(updates.len());
        for (name, target, duration) in &updates {
            let name = name.as_ref();
            let Some(&row) = state.index.get(name) else {
                return Err(ChannelError::UnknownChannel {
                    origin: self.table.origin.clone(),
                    name: name.to_string(),
                });
            };
            if !(duration.is_finite() && *duration > 0.0) {
                return Err(ChannelError::InvalidDuration {
                    name: name.to_string(),
                    duration: *duration,
                });
            }
            if !target.is_finite() {
                return Err(ChannelError::InvalidTarget {
                    name: name.to_string(),
                    value: *target,
                });
            }
            resolved.push((row, *target, *duration));
        }

        for (row, target, duration) in resolved {
            state.rows[row].retarget(target, duration);
        }
        state.updates = state.updates.wrapping_add(1);
        trace!(
            "origin '{}': {} targets set (update #{})",
            self.table.origin,
            updates.len(),
            state.updates
        );
        drop(state);

        self.table.updated.notify_all();
        Ok(())
    }

    /// Apply a batch collected by the command layer.
    pub fn commit(&self, batch: TargetBatch) -> Result<(), ChannelError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.set_targets(batch.entries)
    }

    /// Advance every active channel by `dt` seconds.
    ///
    /// Returns `true` while at least one channel is still moving. A
    /// non-positive `dt` changes nothing.
    pub fn advance(&self, dt: f64, with_speed: bool) -> bool {
        let mut state = self.table.state.lock();
        if dt <= 0.0 {
            if dt < 0.0 {
                warn!(
                    "origin '{}': ignoring negative dt {}",
                    self.table.origin, dt
                );
            }
            return state.rows.iter().any(Channel::is_active);
        }

        let TableState { rows, profile, .. } = &mut *state;
        let profile = *profile;
        let mut active = false;
        for channel in rows.iter_mut().filter(|c| c.is_active()) {
            active |= channel.advance(dt, &profile, with_speed);
        }
        active
    }

    /// Current values keyed by channel name.
    ///
    /// Takes the origin lock just long enough to copy the values, so it can
    /// wait briefly behind a `set_targets` or `advance` in progress.
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        let state = self.table.state.lock();
        state
            .names
            .iter()
            .zip(&state.rows)
            .map(|(name, ch)| (name.clone(), ch.current_value))
            .collect()
    }

    /// Full rows in registration order.
    pub fn rows(&self) -> OriginSnapshot {
        let state = self.table.state.lock();
        OriginSnapshot {
            origin: self.table.origin.clone(),
            channels: state.row_copies(),
        }
    }

    /// Current value of one channel.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.row(name).map(|ch| ch.current_value)
    }

    /// Copy of one channel row.
    pub fn row(&self, name: &str) -> Option<Channel> {
        let state = self.table.state.lock();
        state.index.get(name).map(|&i| state.rows[i])
    }

    /// Channel names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.table.state.lock().names.clone()
    }

    pub fn len(&self) -> usize {
        self.table.state.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.state.lock().rows.is_empty()
    }

    /// Whether any channel is still interpolating.
    pub fn is_active(&self) -> bool {
        self.table.state.lock().rows.iter().any(Channel::is_active)
    }

    /// Profile this pool currently evaluates.
    pub fn profile(&self) -> MotionProfile {
        self.table.state.lock().profile
    }

    /// Dump the channel table at DEBUG level.
    pub fn log_channels(&self) {
        let state = self.table.state.lock();
        debug!("{}", render_table(&self.table.origin, &state));
    }

    /// Block until the next `set_targets`, or until `timeout` elapses.
    ///
    /// Returns `true` when woken by a retarget, `false` on timeout. Updates
    /// that land before the call are not reported.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut state = self.table.state.lock();
        let seen = state.updates;
        match timeout {
            None => {
                while state.updates == seen {
                    self.table.updated.wait(&mut state);
                }
                true
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while state.updates == seen {
                    if self
                        .table
                        .updated
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return state.updates != seen;
                    }
                }
                true
            }
        }
    }
}

impl Drop for ActuatorPool {
    fn drop(&mut self) {
        self.dynamics.unsubscribe(self.subscription);
        self.store.release(&self.table);
        debug!("origin '{}' pool dropped", self.table.origin);
    }
}

impl std::fmt::Debug for ActuatorPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuatorPool")
            .field("origin", &self.table.origin)
            .finish_non_exhaustive()
    }
}

fn render_table(origin: &str, state: &TableState) -> String {
    let mut out = format!(
        "origin '{}' ({} channels, profile {})",
        origin,
        state.rows.len(),
        state.profile.name()
    );
    let _ = write!(
        out,
        "\n  {:<16} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "channel", "base", "distance", "duration", "remaining", "speed", "value"
    );
    for ChannelRow { name, channel } in state.row_copies() {
        let _ = write!(
            out,
            "\n  {:<16} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
            name,
            channel.base_value,
            channel.target_distance,
            channel.target_duration,
            channel.remaining_duration,
            channel.speed,
            channel.current_value
        );
    }
    out
}
