//! Parallel finite state machines.
//!
//! A [`Machine`] is a named table of [`Rule`]s. Machines are grouped into a
//! [`Family`]: a root plus attached siblings that can all read each other's
//! current state. To pick a machine's next step the scheduler looks up the
//! machine's own state in its table first, then each other member's state
//! in registration order, and runs the first rule found. This is how a
//! state reported by one machine (say `DISCONNECTED` on the root) triggers
//! actions in its siblings.
//!
//! Two strategies drive a family to completion:
//!
//! | Strategy      | Threads                  | Blocking action blocks |
//! |---------------|--------------------------|------------------------|
//! | `Cooperative` | caller only              | the whole family       |
//! | `Threaded`    | caller + one per sibling | only its own machine   |
//!
//! Both raise [`FsmError::NoApplicableRule`](crate::error::FsmError) when no
//! live machine can move, and both abort the family on any error.
//!
//! ```rust
//! use anima_core::fsm::{Family, Machine, Rule, RunExit, State, Strategy};
//!
//! let root = Machine::new(
//!     "blink",
//!     vec![
//!         Rule::new(State::STARTED, || true, "OPEN"),
//!         Rule::new("OPEN", || true, State::STOPPED),
//!     ],
//! )
//! .unwrap();
//! let mut family = Family::new(root, Strategy::Cooperative);
//! assert_eq!(family.run(None).unwrap(), RunExit::Stopped);
//! ```

mod cooperative;
mod family;
mod machine;
mod rule;
mod state;
mod threaded;

pub use family::{AbortHandle, Family, FamilyBuilder, RunExit, Strategy, ThreadedOptions};
pub use machine::{Machine, StateHook};
pub use rule::Rule;
pub use state::{State, Triggers};
