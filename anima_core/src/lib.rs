//! # Anima Core
//!
//! Coordination core for animated heads: a channel store partitioned by
//! origin, time-driven easing interpolation, and a parallel FSM scheduler
//! whose actions retarget the channels.
//!
//! ## Data flow
//!
//! ```text
//! Family::run ── action ──▶ ActuatorPool::set_targets ──▶ ChannelStore rows
//!                                                              │
//! tick loop ───────────────▶ ActuatorPool::advance(dt) ◀───────┘
//!                                   │ reads active MotionProfile
//!                                   ▼
//!                  hardware: snapshot() / wait()
//! ```
//!
//! ## Modules
//!
//! - [`profile`] - easing curves and the `Dynamics` hub
//! - [`channel`] - one interpolated row
//! - [`store`] - origin tables and snapshots
//! - [`pool`] - per-origin writer handle
//! - [`fsm`] - machines, families, schedulers
//! - [`error`] - error taxonomy

pub mod channel;
pub mod error;
pub mod fsm;
pub mod pool;
pub mod profile;
pub mod store;

pub use channel::Channel;
pub use error::{ActionError, ChannelError, FsmError, ProfileError};
pub use pool::{ActuatorPool, TargetBatch};
pub use profile::{Dynamics, MotionProfile};
pub use store::{ChannelRow, ChannelStore, OriginSnapshot, StoreSnapshot};
