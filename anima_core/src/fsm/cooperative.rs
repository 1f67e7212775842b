//! Single-thread scheduler.
//!
//! One tick snapshots the state vector, then steps every live member in
//! registration order against that snapshot. Ticks are strictly sequential,
//! so given deterministic actions a run is fully deterministic.

use super::family::{Members, Scheduler};
use crate::error::FsmError;
use tracing::trace;

pub(crate) struct Cooperative;

impl Scheduler for Cooperative {
    fn run_family(
        &self,
        members: Members<'_>,
        mut callback: Option<&mut dyn FnMut()>,
    ) -> Result<(), FsmError> {
        let shared = members.shared;
        let mut tick: u64 = 0;

        loop {
            let snapshot = {
                let board = shared.board.lock();
                if board.states[0].is_stopped() {
                    break;
                }
                board.states.clone()
            };
            tick += 1;
            trace!("tick {}: {:?}", tick, snapshot);

            let mut stepped = false;
            for (index, cell) in members.machines.iter().enumerate() {
                // Re-read: an action earlier in this tick may have aborted.
                if shared.board.lock().states[index].is_stopped() {
                    continue;
                }
                let mut machine = cell.lock();
                let Some(rule) = machine.select(index, &snapshot) else {
                    continue;
                };
                stepped = true;

                let next = machine.fire(rule).map_err(|source| FsmError::ActionFailed {
                    machine: machine.name().to_string(),
                    source,
                })?;
                if let Some(next) = next {
                    let previous = shared.board.lock().transition(index, &next);
                    if let Some(previous) = previous {
                        machine.transitioned(&previous, &next);
                    }
                }
            }

            if !stepped {
                let board = shared.board.lock();
                if board.states[0].is_stopped() {
                    break;
                }
                return Err(FsmError::NoApplicableRule {
                    states: board.state_vector(),
                });
            }

            if let Some(callback) = callback.as_mut() {
                callback();
            }
        }
        Ok(())
    }
}
