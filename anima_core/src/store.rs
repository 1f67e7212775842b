//! Process-wide channel table, partitioned by origin.
//!
//! The store is an ordinary value passed around in an `Arc`. Each origin
//! table has exactly one writer, the [`ActuatorPool`](crate::pool::ActuatorPool)
//! that claimed it; everybody else reads deep copies through
//! [`ChannelStore::snapshot`].

use crate::channel::{COLUMNS, Channel};
use crate::error::ChannelError;
use crate::profile::MotionProfile;
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Mutable part of an origin table, guarded by the table lock.
#[derive(Debug)]
pub(crate) struct TableState {
    pub(crate) names: Vec<String>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) rows: Vec<Channel>,
    pub(crate) profile: MotionProfile,
    /// Bumped on every successful `set_targets`.
    pub(crate) updates: u64,
}

impl TableState {
    fn new(profile: MotionProfile) -> Self {
        Self {
            names: Vec::new(),
            index: HashMap::new(),
            rows: Vec::new(),
            profile,
            updates: 0,
        }
    }

    pub(crate) fn row_copies(&self) -> Vec<ChannelRow> {
        self.names
            .iter()
            .zip(&self.rows)
            .map(|(name, channel)| ChannelRow {
                name: name.clone(),
                channel: *channel,
            })
            .collect()
    }
}

/// One origin's channels plus the signal hardware threads wait on.
#[derive(Debug)]
pub(crate) struct OriginTable {
    pub(crate) origin: String,
    pub(crate) state: Mutex<TableState>,
    pub(crate) updated: Condvar,
}

impl OriginTable {
    fn snapshot(&self) -> OriginSnapshot {
        let state = self.state.lock();
        OriginSnapshot {
            origin: self.origin.clone(),
            channels: state.row_copies(),
        }
    }
}

/// Named copy of a channel row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRow {
    pub name: String,
    #[serde(flatten)]
    pub channel: Channel,
}

/// Deep copy of one origin table, rows in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginSnapshot {
    pub origin: String,
    pub channels: Vec<ChannelRow>,
}

impl OriginSnapshot {
    /// Column names of every row.
    pub fn columns(&self) -> &'static [&'static str] {
        &COLUMNS
    }

    /// Channel names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|row| row.name.as_str())
    }

    /// Row by channel name.
    pub fn get(&self, name: &str) -> Option<&ChannelRow> {
        self.channels.iter().find(|row| row.name == name)
    }

    /// Current value by channel name.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).map(|row| row.channel.current_value)
    }

    /// Current values keyed by channel name.
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.channels
            .iter()
            .map(|row| (row.name.clone(), row.channel.current_value))
            .collect()
    }

    /// Number of channels still interpolating.
    pub fn active_count(&self) -> usize {
        self.channels
            .iter()
            .filter(|row| row.channel.is_active())
            .count()
    }
}

/// Snapshot of several origins keyed by origin name.
pub type StoreSnapshot = BTreeMap<String, OriginSnapshot>;

/// Mapping from origin name to its channel table.
#[derive(Debug, Default)]
pub struct ChannelStore {
    // Registration order; a rig has a handful of origins.
    origins: RwLock<Vec<Arc<OriginTable>>>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the table for `origin` and hand out its only writer handle.
    pub(crate) fn claim(
        &self,
        origin: &str,
        profile: MotionProfile,
    ) -> Result<Arc<OriginTable>, ChannelError> {
        let mut origins = self.origins.write();
        if origins.iter().any(|t| t.origin == origin) {
            return Err(ChannelError::OriginTaken(origin.to_string()));
        }
        let table = Arc::new(OriginTable {
            origin: origin.to_string(),
            state: Mutex::new(TableState::new(profile)),
            updated: Condvar::new(),
        });
        origins.push(Arc::clone(&table));
        debug!("origin '{}' claimed", origin);
        Ok(table)
    }

    /// Drop the table previously handed out by `claim`.
    pub(crate) fn release(&self, table: &Arc<OriginTable>) {
        let mut origins = self.origins.write();
        let before = origins.len();
        origins.retain(|t| !Arc::ptr_eq(t, table));
        if origins.len() != before {
            debug!("origin '{}' released", table.origin);
        }
    }

    /// Registered origin names in registration order.
    pub fn origins(&self) -> Vec<String> {
        self.origins
            .read()
            .iter()
            .map(|t| t.origin.clone())
            .collect()
    }

    /// Whether `origin` currently has an owning pool.
    pub fn contains(&self, origin: &str) -> bool {
        self.origins.read().iter().any(|t| t.origin == origin)
    }

    pub fn len(&self) -> usize {
        self.origins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.read().is_empty()
    }

    /// Deep copy of the selected origins, or of all of them for `None`.
    ///
    /// Unknown names in the filter are skipped. Each origin is copied under
    /// its own lock, so the result is consistent per origin, not across
    /// origins.
    pub fn snapshot(&self, filter: Option<&[&str]>) -> StoreSnapshot {
        let tables: Vec<Arc<OriginTable>> = {
            let origins = self.origins.read();
            origins
                .iter()
                .filter(|t| filter.is_none_or(|names| names.contains(&t.origin.as_str())))
                .cloned()
                .collect()
        };
        tables
            .iter()
            .map(|t| (t.origin.clone(), t.snapshot()))
            .collect()
    }

    /// Deep copy of a single origin.
    pub fn origin_snapshot(&self, origin: &str) -> Option<OriginSnapshot> {
        let table = self
            .origins
            .read()
            .iter()
            .find(|t| t.origin == origin)
            .cloned();
        table.map(|t| t.snapshot())
    }
}
