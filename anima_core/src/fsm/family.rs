use super::cooperative::Cooperative;
use super::machine::Machine;
use super::state::State;
use super::threaded::Threaded;
use crate::error::FsmError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// Tuning for the one-thread-per-machine strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadedOptions {
    /// Longest a machine without an applicable rule sleeps before re-checking.
    pub poll: Duration,
    /// Length of one join attempt once the root has stopped.
    pub join_timeout: Duration,
    /// Join attempts before a machine stuck in its action is detached.
    pub join_attempts: u32,
}

impl Default for ThreadedOptions {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(50),
            join_timeout: Duration::from_millis(100),
            join_attempts: 20,
        }
    }
}

/// How a family is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Every machine stepped in turn on the caller thread. A blocking
    /// action blocks the whole family.
    #[default]
    Cooperative,
    /// Root on the caller thread, one thread per other member.
    Threaded(ThreadedOptions),
}

impl Strategy {
    pub fn threaded() -> Self {
        Self::Threaded(ThreadedOptions::default())
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The root reached `STOPPED` through its rules.
    Stopped,
    /// Someone called `abort()`.
    Aborted,
}

/// State vector and bookkeeping shared by every machine of a family.
#[derive(Debug)]
pub(crate) struct Board {
    pub(crate) names: Vec<String>,
    pub(crate) states: Vec<State>,
    /// Set by a threaded machine that found no rule for the current vector.
    pub(crate) idle: Vec<bool>,
    pub(crate) aborted: bool,
    pub(crate) failure: Option<FsmError>,
}

impl Board {
    pub(crate) fn state_vector(&self) -> Vec<(String, State)> {
        self.names
            .iter()
            .cloned()
            .zip(self.states.iter().cloned())
            .collect()
    }

    /// Apply a transition unless the machine was stopped meanwhile.
    /// Returns the previous state when something changed.
    pub(crate) fn transition(&mut self, index: usize, next: &State) -> Option<State> {
        let current = &mut self.states[index];
        if current.is_stopped() || current == next {
            return None;
        }
        let previous = std::mem::replace(current, next.clone());
        self.idle.fill(false);
        Some(previous)
    }

    /// Every live machine is waiting and none can move. A stopped root means
    /// the run is winding down, which is not a deadlock.
    pub(crate) fn deadlocked(&self) -> bool {
        if self.states[0].is_stopped() {
            return false;
        }
        let mut live = self
            .states
            .iter()
            .zip(&self.idle)
            .filter(|(state, _)| !state.is_stopped())
            .peekable();
        live.peek().is_some() && live.all(|(_, idle)| *idle)
    }

    /// Record the first failure and stop everything.
    pub(crate) fn fail(&mut self, failure: FsmError) {
        if self.failure.is_none() {
            error!("family '{}' failed: {}", self.names[0], failure);
            self.failure = Some(failure);
        }
        self.states.fill(State::STOPPED);
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) board: Mutex<Board>,
    pub(crate) wake: Condvar,
}

impl Shared {
    fn new(root: &str) -> Self {
        Self {
            board: Mutex::new(Board {
                names: vec![root.to_string()],
                states: vec![State::STARTED],
                idle: vec![false],
                aborted: false,
                failure: None,
            }),
            wake: Condvar::new(),
        }
    }

    fn reset(&self) {
        let mut board = self.board.lock();
        board.states.fill(State::STARTED);
        board.idle.fill(false);
        board.aborted = false;
        board.failure = None;
    }

    pub(crate) fn abort(&self) {
        {
            let mut board = self.board.lock();
            board.aborted = true;
            board.states.fill(State::STOPPED);
        }
        self.wake.notify_all();
    }

    /// Stop every machine without flagging an abort.
    pub(crate) fn stop_all(&self) {
        self.board.lock().states.fill(State::STOPPED);
        self.wake.notify_all();
    }

    pub(crate) fn fail(&self, failure: FsmError) {
        self.board.lock().fail(failure);
        self.wake.notify_all();
    }
}

/// Borrowed view of a family handed to a scheduler.
pub(crate) struct Members<'a> {
    pub(crate) machines: &'a [Arc<Mutex<Machine>>],
    pub(crate) shared: &'a Arc<Shared>,
}

/// Steps a family until its root stops.
///
/// Failures are returned, not recorded: `Family::run` aborts the family on
/// any error before handing it back.
pub(crate) trait Scheduler {
    fn run_family(
        &self,
        members: Members<'_>,
        callback: Option<&mut dyn FnMut()>,
    ) -> Result<(), FsmError>;
}

/// Cloneable handle that stops a family from any thread.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    shared: Arc<Shared>,
}

impl AbortHandle {
    /// Force every machine to `STOPPED` and wake them all.
    ///
    /// A machine blocked inside its action only notices once the action
    /// returns; its transition is then discarded.
    pub fn abort(&self) {
        info!("aborting family '{}'", self.shared.board.lock().names[0]);
        self.shared.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.board.lock().aborted
    }
}

// Aborts the family if a scheduler or callback unwinds out of `run`.
struct AbortOnUnwind<'a>(&'a Shared);

impl Drop for AbortOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

/// Root machine plus the siblings attached to it.
pub struct Family {
    machines: Vec<Arc<Mutex<Machine>>>,
    shared: Arc<Shared>,
    strategy: Strategy,
}

impl Family {
    pub fn new(root: Machine, strategy: Strategy) -> Self {
        let shared = Arc::new(Shared::new(root.name()));
        Self {
            machines: vec![Arc::new(Mutex::new(root))],
            shared,
            strategy,
        }
    }

    /// Add a sibling. Registration order is lookup priority.
    pub fn attach(&mut self, machine: Machine) -> Result<(), FsmError> {
        let mut board = self.shared.board.lock();
        if board.names.iter().any(|n| n == machine.name()) {
            return Err(FsmError::DuplicateMachine(machine.name().to_string()));
        }
        board.names.push(machine.name().to_string());
        board.states.push(State::STARTED);
        board.idle.push(false);
        self.machines.push(Arc::new(Mutex::new(machine)));
        Ok(())
    }

    pub fn root(&self) -> String {
        self.shared.board.lock().names[0].clone()
    }

    /// Member names in registration order, root first.
    pub fn names(&self) -> Vec<String> {
        self.shared.board.lock().names.clone()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Current `(name, state)` of every member.
    pub fn states(&self) -> Vec<(String, State)> {
        self.shared.board.lock().state_vector()
    }

    pub fn state_of(&self, name: &str) -> Option<State> {
        let board = self.shared.board.lock();
        let index = board.names.iter().position(|n| n == name)?;
        Some(board.states[index].clone())
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn abort(&self) {
        self.abort_handle().abort();
    }

    /// Run until the root reaches `STOPPED` or the family is aborted.
    ///
    /// Every member starts at `STARTED`, so a stopped family can be run
    /// again. `callback` runs on the caller thread after each root step
    /// (and, when threaded, after each idle wake of the root). On error the
    /// family is aborted before returning.
    pub fn run(&mut self, callback: Option<&mut dyn FnMut()>) -> Result<RunExit, FsmError> {
        self.shared.reset();
        let root = self.root();
        info!(
            "family '{}' starting ({} machines, {:?})",
            root,
            self.machines.len(),
            self.strategy
        );

        let members = Members {
            machines: &self.machines,
            shared: &self.shared,
        };
        let guard = AbortOnUnwind(&self.shared);
        let result = match self.strategy {
            Strategy::Cooperative => Cooperative.run_family(members, callback),
            Strategy::Threaded(options) => Threaded::new(options).run_family(members, callback),
        };
        drop(guard);

        match result {
            Ok(()) => {
                let exit = if self.shared.board.lock().aborted {
                    RunExit::Aborted
                } else {
                    RunExit::Stopped
                };
                info!("family '{}' finished: {:?}", root, exit);
                Ok(exit)
            }
            Err(e) => {
                self.shared.abort();
                debug!("family '{}' aborted after failure", root);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Family")
            .field("states", &self.states())
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Builds a family from `(machine, parent)` definitions.
///
/// The first machine is the root. Later ones name any existing member as
/// parent (or `None` for the root); the hierarchy is flattened into one
/// family in definition order.
#[derive(Debug)]
pub struct FamilyBuilder {
    strategy: Strategy,
    family: Option<Family>,
}

impl FamilyBuilder {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            family: None,
        }
    }

    pub fn machine(mut self, machine: Machine, parent: Option<&str>) -> Result<Self, FsmError> {
        let unknown_parent = |machine: &Machine, parent: &str| FsmError::UnknownParent {
            machine: machine.name().to_string(),
            parent: parent.to_string(),
        };

        let Some(family) = self.family.as_mut() else {
            if let Some(parent) = parent {
                return Err(unknown_parent(&machine, parent));
            }
            self.family = Some(Family::new(machine, self.strategy));
            return Ok(self);
        };

        if let Some(parent) = parent {
            if family.state_of(parent).is_none() {
                return Err(unknown_parent(&machine, parent));
            }
        }
        family.attach(machine)?;
        Ok(self)
    }

    pub fn build(self) -> Result<Family, FsmError> {
        self.family.ok_or(FsmError::EmptyFamily)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::Rule;

    fn stopper(name: &str) -> Machine {
        Machine::new(name, vec![Rule::new(State::STARTED, || true, State::STOPPED)]).unwrap()
    }

    #[test]
    fn duplicate_member_rejected() {
        let mut family = Family::new(stopper("root"), Strategy::Cooperative);
        family.attach(stopper("child")).unwrap();
        assert!(matches!(
            family.attach(stopper("child")),
            Err(FsmError::DuplicateMachine(name)) if name == "child"
        ));
        assert_eq!(family.names(), vec!["root", "child"]);
    }

    #[test]
    fn builder_checks_parents() {
        let err = FamilyBuilder::new(Strategy::Cooperative)
            .machine(stopper("root"), None)
            .and_then(|b| b.machine(stopper("child"), Some("nobody")))
            .unwrap_err();
        assert!(matches!(err, FsmError::UnknownParent { .. }));

        let family = FamilyBuilder::new(Strategy::Cooperative)
            .machine(stopper("root"), None)
            .and_then(|b| b.machine(stopper("child"), Some("root")))
            .and_then(|b| b.machine(stopper("grandchild"), Some("child")))
            .and_then(FamilyBuilder::build)
            .unwrap();
        assert_eq!(family.names(), vec!["root", "child", "grandchild"]);

        assert!(matches!(
            FamilyBuilder::new(Strategy::Cooperative).build(),
            Err(FsmError::EmptyFamily)
        ));
    }

    #[test]
    fn deadlock_needs_every_live_machine_idle() {
        let mut board = Board {
            names: vec!["a".into(), "b".into(), "c".into()],
            states: vec![State::STARTED, State::STOPPED, State::STARTED],
            idle: vec![false, false, true],
            aborted: false,
            failure: None,
        };
        assert!(!board.deadlocked());
        board.idle[0] = true;
        assert!(board.deadlocked());

        // Root stopped: winding down, the idle sibling is about to be stopped.
        board.states[0] = State::STOPPED;
        assert!(!board.deadlocked());
    }

    #[test]
    fn transitions_ignored_after_stop() {
        let mut board = Board {
            names: vec!["a".into()],
            states: vec![State::STOPPED],
            idle: vec![true],
            aborted: true,
            failure: None,
        };
        assert_eq!(board.transition(0, &State::new("X")), None);
        assert_eq!(board.states[0], State::STOPPED);
    }

    #[test]
    fn run_resets_to_started() {
        let mut family = Family::new(stopper("root"), Strategy::Cooperative);
        assert_eq!(family.run(None).unwrap(), RunExit::Stopped);
        assert_eq!(family.state_of("root"), Some(State::STOPPED));
        assert_eq!(family.run(None).unwrap(), RunExit::Stopped);
    }
}
