//! Integration tests: FSM families under both scheduling strategies.
//!
//! The three-machine family below is the reference scenario: a root whose
//! second state blocks, a child that moves on its own once the root
//! reaches `STATE_1`, and a non-blocking counter sharing `STATE_1`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anima_core::FsmError;
use anima_core::fsm::{
    Family, FamilyBuilder, Machine, Rule, RunExit, State, Strategy, ThreadedOptions,
};
use parking_lot::Mutex;

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Counters {
    root: AtomicUsize,
    child1: AtomicUsize,
    child2: AtomicUsize,
}

impl Counters {
    fn get(&self) -> [usize; 3] {
        [
            self.root.load(Ordering::SeqCst),
            self.child1.load(Ordering::SeqCst),
            self.child2.load(Ordering::SeqCst),
        ]
    }
}

const STATE_1: State = State::new("STATE_1");
const STATE_2: State = State::new("STATE_2");

/// Root: STARTED -> STATE_1 at once, then blocks 50 ms per step and stops
/// on its second call.
fn root_machine(counters: &Arc<Counters>) -> Machine {
    let c = Arc::clone(counters);
    Machine::new(
        "SM_parent",
        vec![
            Rule::new(State::STARTED, || true, STATE_1).named("fct1"),
            Rule::new(
                STATE_1,
                move || {
                    let n = c.root.fetch_add(1, Ordering::SeqCst) + 1;
                    thread::sleep(Duration::from_millis(50));
                    n == 2
                },
                State::STOPPED,
            )
            .named("fct2"),
        ],
    )
    .unwrap()
}

/// Child 1: blocks 10 ms per step while the root is in STATE_1, reaching
/// STATE_2 on its second call.
fn child1_machine(counters: &Arc<Counters>) -> Machine {
    let c = Arc::clone(counters);
    Machine::new(
        "SM_child1",
        vec![
            Rule::new(
                STATE_1,
                move || {
                    let n = c.child1.fetch_add(1, Ordering::SeqCst) + 1;
                    thread::sleep(Duration::from_millis(10));
                    n == 2
                },
                STATE_2,
            )
            .named("fct3"),
            Rule::new(STATE_2, || true, State::STOPPED).named("fct5"),
        ],
    )
    .unwrap()
}

/// Child 2: counts as fast as it can while anyone is in STATE_1.
fn child2_machine(counters: &Arc<Counters>) -> Machine {
    let c = Arc::clone(counters);
    Machine::new(
        "SM_child2",
        vec![
            Rule::new(
                STATE_1,
                move || {
                    c.child2.fetch_add(1, Ordering::SeqCst);
                    false
                },
                State::STOPPED,
            )
            .named("fct4"),
        ],
    )
    .unwrap()
}

fn reference_family(strategy: Strategy, counters: &Arc<Counters>) -> Family {
    FamilyBuilder::new(strategy)
        .machine(root_machine(counters), None)
        .and_then(|b| b.machine(child1_machine(counters), Some("SM_parent")))
        .and_then(|b| b.machine(child2_machine(counters), Some("SM_parent")))
        .and_then(FamilyBuilder::build)
        .unwrap()
}

fn fast_threads() -> Strategy {
    Strategy::Threaded(ThreadedOptions {
        poll: Duration::from_millis(5),
        join_timeout: Duration::from_millis(20),
        join_attempts: 10,
    })
}

/// Root that keeps stepping without ever transitioning.
fn spinner(name: &str) -> Machine {
    Machine::new(
        name,
        vec![Rule::new(
            State::STARTED,
            || {
                thread::sleep(Duration::from_millis(1));
                false
            },
            State::STOPPED,
        )],
    )
    .unwrap()
}

// ── Reference scenario ──────────────────────────────────────────────

#[test]
fn root_alone_counts_two() {
    for strategy in [Strategy::Cooperative, fast_threads()] {
        let counters = Arc::new(Counters::default());
        let mut family = Family::new(root_machine(&counters), strategy);
        assert_eq!(family.run(None).unwrap(), RunExit::Stopped);
        assert_eq!(counters.get(), [2, 0, 0]);
    }
}

#[test]
fn cooperative_family_steps_in_lockstep() {
    let counters = Arc::new(Counters::default());
    let mut family = reference_family(Strategy::Cooperative, &counters);

    assert_eq!(family.run(None).unwrap(), RunExit::Stopped);
    assert_eq!(counters.get(), [2, 2, 2]);
    assert_eq!(family.state_of("SM_parent"), Some(State::STOPPED));
    assert_eq!(family.state_of("SM_child1"), Some(STATE_2));
}

#[test]
fn threaded_family_isolates_blocking_actions() {
    let counters = Arc::new(Counters::default());
    let mut family = reference_family(fast_threads(), &counters);

    assert_eq!(family.run(None).unwrap(), RunExit::Stopped);
    let [root, child1, child2] = counters.get();
    assert_eq!(root, 2);
    assert_eq!(child1, 2);
    // Unblocked by the root's 100 ms of sleeping.
    assert!(child2 > 2, "child2 only counted {child2}");

    // Every member ends stopped once the run returns.
    for (name, state) in family.states() {
        assert_eq!(state, State::STOPPED, "{name}");
    }
}

#[test]
fn family_can_run_again() {
    let counters = Arc::new(Counters::default());
    let mut family = reference_family(Strategy::Cooperative, &counters);
    family.run(None).unwrap();

    counters.root.store(0, Ordering::SeqCst);
    counters.child1.store(0, Ordering::SeqCst);
    counters.child2.store(0, Ordering::SeqCst);
    assert_eq!(family.run(None).unwrap(), RunExit::Stopped);
    assert_eq!(counters.get(), [2, 2, 2]);
}

// ── Rule lookup ─────────────────────────────────────────────────────

/// Root reports a disconnection; the watcher cleans up; the root stops once
/// it sees the watcher's state.
fn link_family(
    strategy: Strategy,
    cleanups: &Arc<AtomicUsize>,
    transitions: &Arc<Mutex<Vec<String>>>,
) -> Family {
    let sink = Arc::clone(transitions);
    let root = Machine::new(
        "link",
        vec![
            Rule::new(State::STARTED, || true, "DISCONNECTED"),
            Rule::new("CLEANED", || true, State::STOPPED),
        ],
    )
    .unwrap()
    .on_state_change(move |name, from, to| sink.lock().push(format!("{name}:{from}->{to}")));

    let c = Arc::clone(cleanups);
    let watcher = Machine::new(
        "watcher",
        vec![Rule::new(
            "DISCONNECTED",
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                true
            },
            "CLEANED",
        )],
    )
    .unwrap();

    let mut family = Family::new(root, strategy);
    family.attach(watcher).unwrap();
    family
}

#[test]
fn sibling_state_triggers_rules() {
    for strategy in [Strategy::Cooperative, fast_threads()] {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let mut family = link_family(strategy, &cleanups, &transitions);

        assert_eq!(family.run(None).unwrap(), RunExit::Stopped);
        assert!(cleanups.load(Ordering::SeqCst) >= 1, "{strategy:?}");
        assert_eq!(
            *transitions.lock(),
            vec!["link:STARTED->DISCONNECTED", "link:DISCONNECTED->STOPPED"],
            "{strategy:?}"
        );
    }
}

#[test]
fn state_sets_share_one_action() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let root = Machine::new(
        "root",
        vec![
            Rule::new(State::STARTED, || true, "A"),
            Rule::new(
                ["A", "B"],
                move || {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    n >= 1
                },
                State::STOPPED,
            ),
        ],
    )
    .unwrap();
    let mut family = Family::new(root, Strategy::Cooperative);
    assert_eq!(family.run(None).unwrap(), RunExit::Stopped);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ── Errors ──────────────────────────────────────────────────────────

#[test]
fn no_applicable_rule_aborts_the_family() {
    for strategy in [Strategy::Cooperative, fast_threads()] {
        // Nobody has a rule for LIMBO or WAITING, so [LIMBO, WAITING] is stuck.
        let root = Machine::new("root", vec![Rule::new(State::STARTED, || true, "LIMBO")]).unwrap();
        let child = Machine::new("child", vec![Rule::new(State::STARTED, || true, "WAITING")])
            .unwrap();
        let mut family = Family::new(root, strategy);
        family.attach(child).unwrap();

        match family.run(None) {
            Err(FsmError::NoApplicableRule { states }) => {
                assert_eq!(states[0], ("root".to_string(), State::new("LIMBO")));
            }
            other => panic!("{strategy:?}: unexpected {other:?}"),
        }
        assert!(
            family.states().iter().all(|(_, s)| s.is_stopped()),
            "{strategy:?}"
        );
    }
}

#[test]
fn sibling_state_refires_a_finished_rule() {
    let fired = Arc::new(AtomicUsize::new(0));
    let root = {
        let fired = Arc::clone(&fired);
        Machine::new(
            "root",
            vec![Rule::new(
                State::STARTED,
                move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                    true
                },
                "LIMBO",
            )],
        )
        .unwrap()
    };
    // The child never leaves STARTED, so the root keeps matching its own
    // STARTED rule through the sibling's state.
    let child = Machine::new("child", vec![Rule::new("NEVER", || true, "X")]).unwrap();
    let mut family = Family::new(root, Strategy::Cooperative);
    family.attach(child).unwrap();

    let abort = family.abort_handle();
    let mut ticks = 0;
    let mut callback = || {
        ticks += 1;
        if ticks == 25 {
            abort.abort();
        }
    };

    assert_eq!(family.run(Some(&mut callback)).unwrap(), RunExit::Aborted);
    assert_eq!(ticks, 25);
    assert_eq!(fired.load(Ordering::SeqCst), 25);
}

#[test]
fn failing_action_stops_everyone() {
    for strategy in [Strategy::Cooperative, fast_threads()] {
        let root = spinner("root");
        let child = Machine::new(
            "uplink",
            vec![Rule::fallible(
                State::STARTED,
                || Err("socket closed".into()),
                State::STOPPED,
            )],
        )
        .unwrap();
        let mut family = Family::new(root, strategy);
        family.attach(child).unwrap();

        match family.run(None) {
            Err(FsmError::ActionFailed { machine, source }) => {
                assert_eq!(machine, "uplink");
                assert_eq!(source.to_string(), "socket closed");
            }
            other => panic!("{strategy:?}: unexpected {other:?}"),
        }
        assert_eq!(family.state_of("root"), Some(State::STOPPED));
    }
}

#[test]
fn duplicate_states_rejected_at_construction() {
    let err = Machine::new(
        "face",
        vec![
            Rule::new(["SMILE", "FROWN"], || true, "IDLE"),
            Rule::new("FROWN", || true, "IDLE"),
        ],
    )
    .unwrap_err();
    assert!(matches!(err, FsmError::DuplicateState { .. }));
}

#[test]
fn worker_panic_is_reported() {
    let root = spinner("root");
    let child = Machine::new(
        "fragile",
        vec![Rule::new(State::STARTED, || panic!("servo exploded"), State::STOPPED)],
    )
    .unwrap();
    let mut family = Family::new(root, fast_threads());
    family.attach(child).unwrap();

    assert!(matches!(
        family.run(None),
        Err(FsmError::MachinePanicked(name)) if name == "fragile"
    ));
}

// ── Abort ───────────────────────────────────────────────────────────

#[test]
fn abort_ends_run_quickly() {
    for strategy in [Strategy::Cooperative, fast_threads()] {
        let mut family = Family::new(spinner("root"), strategy);
        family.attach(spinner("sibling")).unwrap();
        let handle = family.abort_handle();

        let aborter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            handle.abort();
        });
        let started = Instant::now();
        assert_eq!(family.run(None).unwrap(), RunExit::Aborted);
        assert!(started.elapsed() < Duration::from_secs(1), "{strategy:?}");
        aborter.join().unwrap();
    }
}

#[test]
fn callback_runs_after_each_tick_and_can_abort() {
    let mut family = Family::new(spinner("root"), Strategy::Cooperative);
    let handle = family.abort_handle();
    let mut ticks = 0;
    let mut callback = || {
        ticks += 1;
        if ticks == 5 {
            handle.abort();
        }
    };

    assert_eq!(family.run(Some(&mut callback)).unwrap(), RunExit::Aborted);
    assert_eq!(ticks, 5);
    assert!(family.abort_handle().is_aborted());
}

#[test]
fn threaded_callback_runs_on_caller_thread() {
    let root = Machine::new(
        "root",
        vec![
            Rule::new(State::STARTED, || true, "A"),
            Rule::new("A", || true, State::STOPPED),
        ],
    )
    .unwrap();
    let mut family = Family::new(root, fast_threads());
    let caller = thread::current().id();
    let mut calls = 0;
    let mut callback = || {
        assert_eq!(thread::current().id(), caller);
        calls += 1;
    };

    assert_eq!(family.run(Some(&mut callback)).unwrap(), RunExit::Stopped);
    assert_eq!(calls, 2);
}

#[test]
fn stuck_worker_is_detached_after_bounded_join() {
    let options = ThreadedOptions {
        poll: Duration::from_millis(5),
        join_timeout: Duration::from_millis(10),
        join_attempts: 3,
    };
    let blocker = Machine::new(
        "blocker",
        vec![Rule::new(
            State::STARTED,
            || {
                thread::sleep(Duration::from_millis(800));
                true
            },
            "DONE",
        )],
    )
    .unwrap();
    let mut family = Family::new(spinner("root"), Strategy::Threaded(options));
    family.attach(blocker).unwrap();
    let handle = family.abort_handle();

    let aborter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        handle.abort();
    });
    let started = Instant::now();
    assert_eq!(family.run(None).unwrap(), RunExit::Aborted);
    assert!(started.elapsed() < Duration::from_millis(600));
    aborter.join().unwrap();

    // The blocked action's transition is discarded when it finally returns.
    thread::sleep(Duration::from_millis(900));
    assert_eq!(family.state_of("blocker"), Some(State::STOPPED));
}
