//! Idle behavior family.
//!
//! Two machines keep an otherwise idle rig looking alive:
//!
//! ```text
//!   idle (root)                               watch
//!   STARTED ──breathe──▶ MOVING              STARTED ──arm──▶ WATCHING
//!   MOVING  ──settled──▶ SETTLED             WATCHING ──check──▶ SHUTDOWN
//!   [WATCHING] ──breathe──▶ MOVING
//!   [SHUTDOWN] ──rest──▶ STOPPED
//! ```
//!
//! `idle` has no rule for `SETTLED`; it resumes from the sibling's
//! `WATCHING` state, and winds down once `watch` reports `SHUTDOWN`.
//! `watch` polls the rig's running flag, so clearing that flag stops the
//! whole family.

use crate::backend::RigError;
use anima_core::fsm::{Family, FamilyBuilder, Machine, Rule, State, Strategy};
use anima_core::{ActionError, ActuatorPool, TargetBatch};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

const MOVING: State = State::new("MOVING");
const SETTLED: State = State::new("SETTLED");
const WATCHING: State = State::new("WATCHING");
const SHUTDOWN: State = State::new("SHUTDOWN");

/// Relative amplitude per channel, cycled by channel index.
const WEIGHTS: [f64; 3] = [1.0, 0.6, 0.3];

/// Poll period while waiting for channels to settle.
const SETTLE_POLL: Duration = Duration::from_millis(10);

/// Tuning of the idle family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleOptions {
    /// Full breathing cycle: one inhale plus one exhale.
    pub period: Duration,
    /// Peak offset from the rest value, in normalized units.
    pub amplitude: f64,
    /// Poll period of the `watch` machine.
    pub check_interval: Duration,
}

impl Default for IdleOptions {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(2),
            amplitude: 0.15,
            check_interval: Duration::from_millis(20),
        }
    }
}

/// Rest values captured when the family is built.
struct Posture {
    pool: Arc<ActuatorPool>,
    rest: Vec<(String, f64)>,
}

impl Posture {
    fn capture(pool: &Arc<ActuatorPool>) -> Self {
        let rest = pool
            .names()
            .into_iter()
            .filter_map(|name| pool.value(&name).map(|value| (name, value)))
            .collect();
        Self {
            pool: Arc::clone(pool),
            rest,
        }
    }

    /// Offsets for one half-breath. `sign` is +1 on inhale, -1 on exhale.
    fn breath(&self, sign: f64, amplitude: f64, duration: f64) -> TargetBatch {
        self.rest
            .iter()
            .enumerate()
            .map(|(i, (name, rest))| {
                let offset = sign * amplitude * WEIGHTS[i % WEIGHTS.len()];
                (name.as_str(), (rest + offset).clamp(-1.0, 1.0), duration)
            })
            .collect()
    }

    fn at_rest(&self, duration: f64) -> TargetBatch {
        self.rest
            .iter()
            .map(|(name, rest)| (name.as_str(), *rest, duration))
            .collect()
    }
}

/// Build the idle family over `pools`.
///
/// The family only retargets; the rig's tick loop must be running for the
/// channels to actually move.
pub fn idle_family(
    pools: &[Arc<ActuatorPool>],
    running: Arc<AtomicBool>,
    strategy: Strategy,
    options: IdleOptions,
) -> Result<Family, RigError> {
    let half = options.period.as_secs_f64() / 2.0;
    let postures: Arc<Vec<Posture>> = Arc::new(pools.iter().map(Posture::capture).collect());

    let breathe = {
        let postures = Arc::clone(&postures);
        let mut inhale = true;
        move || -> Result<bool, ActionError> {
            let sign = if inhale { 1.0 } else { -1.0 };
            for posture in postures.iter() {
                posture
                    .pool
                    .commit(posture.breath(sign, options.amplitude, half))?;
            }
            debug!("idle: {}", if inhale { "inhale" } else { "exhale" });
            inhale = !inhale;
            Ok(true)
        }
    };

    let settled = {
        let postures = Arc::clone(&postures);
        let running = Arc::clone(&running);
        move || {
            if !running.load(Ordering::SeqCst) || postures.iter().all(|p| !p.pool.is_active()) {
                return true;
            }
            thread::sleep(SETTLE_POLL);
            false
        }
    };

    let rest = {
        let postures = Arc::clone(&postures);
        move || -> Result<bool, ActionError> {
            for posture in postures.iter() {
                posture.pool.commit(posture.at_rest(half))?;
            }
            info!("idle: returning to rest");
            Ok(true)
        }
    };

    let idle = Machine::new(
        "idle",
        vec![
            Rule::fallible([State::STARTED, WATCHING], breathe, MOVING).named("breathe"),
            Rule::new(MOVING, settled, SETTLED).named("settled"),
            Rule::fallible(SHUTDOWN, rest, State::STOPPED).named("rest"),
        ],
    )?;

    let check_interval = options.check_interval;
    let watch = Machine::new(
        "watch",
        vec![
            Rule::new(State::STARTED, || true, WATCHING).named("arm"),
            Rule::new(
                WATCHING,
                move || {
                    thread::sleep(check_interval);
                    !running.load(Ordering::SeqCst)
                },
                SHUTDOWN,
            )
            .named("check"),
        ],
    )?;

    let family = FamilyBuilder::new(strategy)
        .machine(idle, None)?
        .machine(watch, Some("idle"))?
        .build()?;
    info!(
        "Idle family built over {} origins ({:?})",
        postures.len(),
        family.strategy()
    );
    Ok(family)
}
