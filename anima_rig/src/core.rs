//! Rig core and tick loop.
//!
//! `RigCore` owns the channel store, the profile hub and one
//! `ActuatorPool` per configured origin. Its loop is the single caller of
//! `advance(dt)`: every `tick_time_us` it measures the real elapsed time,
//! moves every pool forward and hands a snapshot to the backend.

use crate::backend::{RigBackend, RigError};
use crate::backend_registry::BackendRegistry;
use anima_common::config::ConfigLoader;
use anima_common::rig::RigConfig;
use anima_core::{ActuatorPool, ChannelStore, Dynamics};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Log every violation up to this count, then one in `VIOLATION_LOG_EVERY`.
const VIOLATION_LOG_FIRST: u64 = 10;
const VIOLATION_LOG_EVERY: u64 = 1000;

/// Tick statistics summary interval.
const STATS_LOG_EVERY: u64 = 1000;

/// Timing statistics for tick loop monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingStats {
    /// Number of ticks executed
    pub cycle_count: u64,
    /// Number of ticks that overran `tick_time_us`
    pub timing_violations: u64,
    /// Maximum observed tick time
    pub max_cycle_time_us: u64,
    /// Sum of tick times for average calculation
    pub total_cycle_time_us: u64,
}

impl TimingStats {
    /// Average tick time, 0 before the first tick.
    pub fn avg_cycle_time_us(&self) -> u64 {
        self.total_cycle_time_us
            .checked_div(self.cycle_count)
            .unwrap_or(0)
    }

    fn record(&mut self, cycle_time_us: u64, target_us: u64) -> bool {
        self.cycle_count += 1;
        self.total_cycle_time_us += cycle_time_us;
        self.max_cycle_time_us = self.max_cycle_time_us.max(cycle_time_us);
        if cycle_time_us > target_us {
            self.timing_violations += 1;
            return true;
        }
        false
    }
}

/// Rig core: pools, profile hub, backend and the tick loop.
pub struct RigCore {
    /// Rig configuration
    config: RigConfig,
    /// Every origin's channel table
    store: Arc<ChannelStore>,
    /// Active easing profile
    dynamics: Arc<Dynamics>,
    /// One pool per configured origin, in config order
    pools: Vec<Arc<ActuatorPool>>,
    /// Active backend instance
    backend: Option<Box<dyn RigBackend>>,
    /// Running flag for tick loop control
    running: Arc<AtomicBool>,
    /// Tick period from config
    tick_time: Duration,
    /// Timing statistics
    stats: TimingStats,
}

impl RigCore {
    /// Create a rig from a configuration.
    ///
    /// Validates the configuration, selects the startup profile and
    /// registers every origin's channels at their initial values.
    ///
    /// # Errors
    /// - `RigError::Config` if validation fails
    /// - `RigError::Profile` if `rig.profile` is not a known profile
    pub fn new(config: RigConfig) -> Result<Self, RigError> {
        config.validate()?;

        let dynamics = Arc::new(Dynamics::with_profile_name(&config.rig.profile)?);
        let store = Arc::new(ChannelStore::new());

        let mut pools = Vec::with_capacity(config.origins.len());
        for origin in &config.origins {
            let pool = ActuatorPool::new(Arc::clone(&store), &origin.name, Arc::clone(&dynamics))?;
            let initial = origin.initial_values();
            pool.register(origin.channels.as_slice(), Some(initial.as_slice()))?;
            pool.log_channels();
            pools.push(Arc::new(pool));
        }

        let tick_time = config.rig.tick_time();
        info!(
            "RigCore created with {} origins, tick_time={}us, profile={}",
            pools.len(),
            config.rig.tick_time_us,
            config.rig.profile
        );

        Ok(Self {
            config,
            store,
            dynamics,
            pools,
            backend: None,
            running: Arc::new(AtomicBool::new(false)),
            tick_time,
            stats: TimingStats::default(),
        })
    }

    /// Load and validate rig configuration from a TOML file.
    pub fn load_config(config_path: &Path) -> Result<RigConfig, RigError> {
        info!("Loading configuration from {:?}", config_path);
        let config = RigConfig::load(config_path)?;
        config.validate()?;
        info!(
            "Loaded config: backend={}, {} origins",
            config.rig.backend,
            config.origins.len()
        );
        Ok(config)
    }

    /// Create and initialize the backend named `backend_name`.
    ///
    /// Arms the running flag, so a signal handler installed afterwards can
    /// stop the loop even before `run()` is entered.
    pub fn init(&mut self, registry: &BackendRegistry, backend_name: &str) -> Result<(), RigError> {
        info!("Initializing RigCore with backend '{}'...", backend_name);

        let mut backend = registry.create_backend(backend_name)?;
        info!("Created backend: {} v{}", backend.name(), backend.version());
        backend.init(&self.config)?;

        self.backend = Some(backend);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Run the tick loop until the running flag is cleared.
    pub fn run(&mut self) -> Result<(), RigError> {
        self.run_until(None)
    }

    /// Run the tick loop until the running flag is cleared or `deadline`
    /// passes. The flag is cleared on exit either way, so behavior code
    /// watching it winds down too.
    pub fn run_until(&mut self, deadline: Option<Instant>) -> Result<(), RigError> {
        if self.backend.is_none() {
            return Err(RigError::InitFailed("Backend not initialized".to_string()));
        }

        info!(
            "Starting RigCore tick loop (tick_time={}us)...",
            self.tick_time.as_micros()
        );
        if detect_rt_mode() {
            info!("Running in real-time mode");
        } else {
            info!("Running in standard (non-RT) mode");
        }

        let target_us = u64::from(self.config.rig.tick_time_us);
        let mut last_tick = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            let tick_start = Instant::now();
            if deadline.is_some_and(|d| tick_start >= d) {
                info!("Run duration elapsed");
                break;
            }
            let dt = tick_start.duration_since(last_tick);
            last_tick = tick_start;

            self.tick(dt);

            let cycle_time_us = u64::try_from(tick_start.elapsed().as_micros()).unwrap_or(u64::MAX);
            if self.stats.record(cycle_time_us, target_us) {
                let violations = self.stats.timing_violations;
                if violations <= VIOLATION_LOG_FIRST || violations % VIOLATION_LOG_EVERY == 0 {
                    warn!(
                        "Timing violation #{}: tick took {}us (target {}us)",
                        violations, cycle_time_us, target_us
                    );
                }
            }

            let elapsed = tick_start.elapsed();
            if elapsed < self.tick_time {
                std::thread::sleep(self.tick_time - elapsed);
            }

            if self.stats.cycle_count % STATS_LOG_EVERY == 0 {
                debug!(
                    "Tick loop: {} ticks, avg={}us, max={}us, violations={}",
                    self.stats.cycle_count,
                    self.stats.avg_cycle_time_us(),
                    self.stats.max_cycle_time_us,
                    self.stats.timing_violations
                );
                for pool in &self.pools {
                    pool.log_channels();
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            "RigCore tick loop stopped after {} ticks (violations: {})",
            self.stats.cycle_count, self.stats.timing_violations
        );
        Ok(())
    }

    /// Advance every pool by `dt` and push the result to the backend.
    ///
    /// Returns whether any channel is still moving. Usable without a
    /// backend, which makes the rig drivable step by step.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let seconds = dt.as_secs_f64();
        let with_speed = self.config.rig.with_speed;

        let mut active = false;
        for pool in &self.pools {
            active |= pool.advance(seconds, with_speed);
        }

        if let Some(backend) = self.backend.as_mut() {
            backend.cycle(&self.store.snapshot(None), dt);
        }
        active
    }

    /// Switch the easing profile of every pool.
    pub fn set_profile(&self, name: &str) -> Result<(), RigError> {
        self.dynamics.change_profile(name)?;
        Ok(())
    }

    /// Stop the tick loop and release the backend.
    pub fn shutdown(&mut self) -> Result<(), RigError> {
        info!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);

        if let Some(mut backend) = self.backend.take() {
            backend.shutdown()?;
        }
        Ok(())
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Pool owning `origin`.
    pub fn pool(&self, origin: &str) -> Option<Arc<ActuatorPool>> {
        self.pools.iter().find(|p| p.origin() == origin).cloned()
    }

    /// Every pool, in config order.
    pub fn pools(&self) -> &[Arc<ActuatorPool>] {
        &self.pools
    }

    /// Shared channel store.
    pub fn store(&self) -> &Arc<ChannelStore> {
        &self.store
    }

    /// Profile hub.
    pub fn dynamics(&self) -> &Arc<Dynamics> {
        &self.dynamics
    }

    /// Active configuration.
    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    /// Active backend, if initialized.
    pub fn backend(&self) -> Option<&dyn RigBackend> {
        self.backend.as_deref()
    }

    /// Get timing statistics.
    pub fn stats(&self) -> TimingStats {
        self.stats
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: sched_getscheduler(0) only queries the calling thread's policy.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}
