//! One-thread-per-machine scheduler.
//!
//! The root runs on the caller thread, every other member on its own named
//! thread. All of them share the family board and its condvar: a machine
//! with no applicable rule parks on the condvar (re-checking at least every
//! `poll`), and every applied transition wakes all of them. The re-check
//! happens under the board lock, so a wake between check and park is never
//! lost.
//!
//! Actions run with the board unlocked. A machine blocked inside an action
//! cannot be interrupted; once the root stops, each worker gets
//! `join_attempts` bounded join attempts and is detached (with a warning)
//! if it is still busy after that.

use super::family::{Members, Scheduler, Shared, ThreadedOptions};
use super::machine::Machine;
use crate::error::FsmError;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

pub(crate) struct Threaded {
    options: ThreadedOptions,
}

impl Threaded {
    pub(crate) fn new(options: ThreadedOptions) -> Self {
        Self { options }
    }

    fn spawn_worker(
        &self,
        index: usize,
        machine: &Arc<Mutex<Machine>>,
        shared: &Arc<Shared>,
    ) -> Result<(String, JoinHandle<()>), FsmError> {
        let name = machine.lock().name().to_string();
        let machine = Arc::clone(machine);
        let shared = Arc::clone(shared);
        let poll = self.options.poll;
        let worker_name = name.clone();

        let handle = thread::Builder::new()
            .name(format!("fsm-{name}"))
            .spawn(move || {
                let _guard = PanicGuard {
                    shared: &shared,
                    name: worker_name,
                };
                let mut machine = machine.lock();
                drive(&mut machine, index, &shared, poll, None);
                debug!("{} terminating", machine.name());
            })
            .map_err(|source| FsmError::Spawn {
                machine: name.clone(),
                source,
            })?;
        Ok((name, handle))
    }

    fn join_all(&self, workers: Vec<(String, JoinHandle<()>)>, shared: &Shared) {
        for (name, handle) in workers {
            let mut attempts = 0;
            while !handle.is_finished() && attempts < self.options.join_attempts {
                debug!("joining {}", name);
                shared.stop_all();
                wait_finished(&handle, self.options.join_timeout);
                attempts += 1;
            }

            if !handle.is_finished() {
                warn!(
                    "machine '{}' still busy after {} join attempts, detaching it",
                    name, attempts
                );
                continue;
            }
            if handle.join().is_err() {
                shared.fail(FsmError::MachinePanicked(name));
            }
        }
    }
}

impl Scheduler for Threaded {
    fn run_family(
        &self,
        members: Members<'_>,
        callback: Option<&mut dyn FnMut()>,
    ) -> Result<(), FsmError> {
        let shared = members.shared;
        let mut workers = Vec::with_capacity(members.machines.len().saturating_sub(1));

        for (index, machine) in members.machines.iter().enumerate().skip(1) {
            match self.spawn_worker(index, machine, shared) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    shared.fail(e);
                    break;
                }
            }
        }

        {
            let mut root = members.machines[0].lock();
            drive(&mut root, 0, shared, self.options.poll, callback);
        }

        shared.stop_all();
        self.join_all(workers, shared);

        match shared.board.lock().failure.take() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

/// Step one machine until its own state is `STOPPED`.
///
/// Failures are recorded on the board, which also stops every member.
fn drive(
    machine: &mut Machine,
    index: usize,
    shared: &Shared,
    poll: Duration,
    mut callback: Option<&mut dyn FnMut()>,
) {
    let mut board = shared.board.lock();
    loop {
        if board.states[index].is_stopped() {
            break;
        }

        let Some(rule) = machine.select(index, &board.states) else {
            board.idle[index] = true;
            if board.deadlocked() {
                let states = board.state_vector();
                board.fail(FsmError::NoApplicableRule { states });
                shared.wake.notify_all();
                break;
            }
            trace!("{} waiting for an applicable state", machine.name());
            shared.wake.wait_for(&mut board, poll);
            if let Some(callback) = callback.as_mut() {
                MutexGuard::unlocked(&mut board, || callback());
            }
            continue;
        };
        board.idle[index] = false;

        match MutexGuard::unlocked(&mut board, || machine.fire(rule)) {
            Err(source) => {
                board.fail(FsmError::ActionFailed {
                    machine: machine.name().to_string(),
                    source,
                });
                shared.wake.notify_all();
                break;
            }
            Ok(Some(next)) => {
                if let Some(previous) = board.transition(index, &next) {
                    shared.wake.notify_all();
                    MutexGuard::unlocked(&mut board, || machine.transitioned(&previous, &next));
                }
            }
            Ok(None) => {}
        }

        if let Some(callback) = callback.as_mut() {
            MutexGuard::unlocked(&mut board, || callback());
        }
    }
}

fn wait_finished(handle: &JoinHandle<()>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
}

// Records a worker panic and stops the family so the root does not wait on
// a dead sibling.
struct PanicGuard<'a> {
    shared: &'a Shared,
    name: String,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shared
                .fail(FsmError::MachinePanicked(std::mem::take(&mut self.name)));
        }
    }
}
