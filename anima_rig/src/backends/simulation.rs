//! Simulation backend.
//!
//! Mirrors every channel into a virtual actuator so the rig can run without
//! servos or a renderer attached. Each actuator tracks the last commanded
//! position, the reported speed and the total distance travelled.

use crate::backend::{BackendDiagnostics, RigBackend, RigError};
use anima_common::rig::RigConfig;
use anima_core::store::StoreSnapshot;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Log the per-origin motion summary every N cycles.
const SUMMARY_INTERVAL: u64 = 100;

/// One simulated actuator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VirtualActuator {
    /// Last commanded position (normalized).
    pub position: f64,
    /// Last reported speed (normalized units per second).
    pub velocity: f64,
    /// Sum of absolute position changes since init.
    pub travel: f64,
}

impl VirtualActuator {
    fn new(position: f64) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    fn drive(&mut self, position: f64, velocity: f64) {
        self.travel += (position - self.position).abs();
        self.position = position;
        self.velocity = velocity;
    }
}

/// Backend that drives virtual actuators.
pub struct SimulationBackend {
    initialized: bool,
    /// origin -> channel -> actuator
    actuators: BTreeMap<String, BTreeMap<String, VirtualActuator>>,
    cycle_count: u64,
    active_channels: usize,
    elapsed: Duration,
}

impl SimulationBackend {
    /// Create an uninitialized simulation backend.
    pub fn new() -> Self {
        Self {
            initialized: false,
            actuators: BTreeMap::new(),
            cycle_count: 0,
            active_channels: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Actuator mirroring `origin`/`channel`.
    pub fn actuator(&self, origin: &str, channel: &str) -> Option<&VirtualActuator> {
        self.actuators.get(origin)?.get(channel)
    }

    /// Simulated time covered by all cycles so far.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Default for SimulationBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory registered under `"simulation"`.
pub fn create_backend() -> Box<dyn RigBackend> {
    Box::new(SimulationBackend::new())
}

impl RigBackend for SimulationBackend {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self, config: &RigConfig) -> Result<(), RigError> {
        self.actuators = config
            .origins
            .iter()
            .map(|origin| {
                let channels = origin
                    .channels
                    .iter()
                    .cloned()
                    .zip(origin.initial_values().into_iter().map(VirtualActuator::new))
                    .collect();
                (origin.name.clone(), channels)
            })
            .collect();

        self.cycle_count = 0;
        self.elapsed = Duration::ZERO;
        self.initialized = true;

        info!(
            "Simulation backend initialized with {} origins, {} actuators",
            self.actuators.len(),
            self.actuators.values().map(BTreeMap::len).sum::<usize>()
        );
        Ok(())
    }

    fn cycle(&mut self, snapshot: &StoreSnapshot, dt: Duration) {
        if !self.initialized {
            return;
        }
        trace!("Simulation backend cycle, dt={:?}", dt);

        self.active_channels = 0;
        for (origin, rows) in snapshot {
            let Some(actuators) = self.actuators.get_mut(origin) else {
                // Origins created outside the config still get mirrored.
                debug!("Simulation backend mirrors new origin '{}'", origin);
                let mirrored = rows
                    .channels
                    .iter()
                    .map(|row| (row.name.clone(), VirtualActuator::new(row.channel.current_value)))
                    .collect();
                self.actuators.insert(origin.clone(), mirrored);
                continue;
            };

            for row in &rows.channels {
                actuators
                    .entry(row.name.clone())
                    .or_insert_with(|| VirtualActuator::new(row.channel.current_value))
                    .drive(row.channel.current_value, row.channel.speed);
            }
            self.active_channels += rows.active_count();
        }

        self.cycle_count += 1;
        self.elapsed += dt;

        if self.cycle_count % SUMMARY_INTERVAL == 0 {
            let moving: Vec<String> = snapshot
                .iter()
                .map(|(origin, rows)| format!("{origin}={}", rows.active_count()))
                .collect();
            debug!(
                "Simulation cycle {}: moving channels [{}]",
                self.cycle_count,
                moving.join(", ")
            );
        }
    }

    fn shutdown(&mut self) -> Result<(), RigError> {
        info!(
            "Shutting down simulation backend after {} cycles ({:.3}s simulated)",
            self.cycle_count,
            self.elapsed.as_secs_f64()
        );
        self.actuators.clear();
        self.initialized = false;
        Ok(())
    }

    fn diagnostics(&self) -> Option<BackendDiagnostics> {
        let custom = match serde_json::to_string(&self.actuators) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!("Failed to serialize simulation state: {}", e);
                None
            }
        };
        Some(BackendDiagnostics {
            cycle_count: self.cycle_count,
            active_channels: self.active_channels,
            custom,
        })
    }
}
