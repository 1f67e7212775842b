use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// Opaque state token.
///
/// `STARTED` is where every machine begins a run and `STOPPED` ends it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct State(Cow<'static, str>);

impl State {
    pub const STARTED: State = State(Cow::Borrowed("STARTED"));
    pub const STOPPED: State = State(Cow::Borrowed("STOPPED"));

    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// State named at runtime.
    pub fn owned(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_stopped(&self) -> bool {
        *self == Self::STOPPED
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl From<&'static str> for State {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl From<String> for State {
    fn from(name: String) -> Self {
        Self::owned(name)
    }
}

impl From<&State> for State {
    fn from(state: &State) -> Self {
        state.clone()
    }
}

/// Input states of one rule: a single state or a set of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triggers(pub(crate) Vec<State>);

impl Triggers {
    pub fn states(&self) -> &[State] {
        &self.0
    }
}

impl From<State> for Triggers {
    fn from(state: State) -> Self {
        Self(vec![state])
    }
}

impl From<&'static str> for Triggers {
    fn from(name: &'static str) -> Self {
        Self(vec![State::new(name)])
    }
}

impl From<Vec<State>> for Triggers {
    fn from(states: Vec<State>) -> Self {
        Self(states)
    }
}

impl<const N: usize> From<[State; N]> for Triggers {
    fn from(states: [State; N]) -> Self {
        Self(states.into())
    }
}

impl<const N: usize> From<[&'static str; N]> for Triggers {
    fn from(names: [&'static str; N]) -> Self {
        Self(names.into_iter().map(State::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrowed_and_owned_compare_equal() {
        assert_eq!(State::new("IDLE"), State::owned("IDLE".to_string()));
        assert_eq!(State::owned("STOPPED"), State::STOPPED);
        assert!(State::owned("STOPPED").is_stopped());
        assert!(!State::STARTED.is_stopped());
    }

    #[test]
    fn triggers_from_sets() {
        let t: Triggers = ["A", "B"].into();
        assert_eq!(t.states(), &[State::new("A"), State::new("B")]);
        let t: Triggers = State::STARTED.into();
        assert_eq!(t.states().len(), 1);
    }
}
