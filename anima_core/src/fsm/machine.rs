use super::rule::Rule;
use super::state::State;
use crate::error::{ActionError, FsmError};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

/// Hook called with `(machine, from, to)` after each transition.
pub type StateHook = Box<dyn FnMut(&str, &State, &State) + Send>;

/// Named rule table.
///
/// A machine does not store its current state: the family keeps the state
/// vector of all its members so siblings can read it.
pub struct Machine {
    name: String,
    rules: Vec<Rule>,
    lookup: HashMap<State, usize>,
    hook: Option<StateHook>,
}

impl Machine {
    /// Build a machine, rejecting two rules on the same input state.
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Result<Self, FsmError> {
        let name = name.into();
        let mut lookup = HashMap::new();
        for (index, rule) in rules.iter().enumerate() {
            for state in &rule.triggers {
                if lookup.insert(state.clone(), index).is_some() {
                    return Err(FsmError::DuplicateState {
                        machine: name,
                        state: state.clone(),
                    });
                }
            }
        }
        Ok(Self {
            name,
            rules,
            lookup,
            hook: None,
        })
    }

    /// Install a transition hook, replacing any previous one.
    pub fn on_state_change<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str, &State, &State) + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Whether some rule is keyed on `state`.
    pub fn handles(&self, state: &State) -> bool {
        self.lookup.contains_key(state)
    }

    /// Pick the rule to run given the family's state vector.
    ///
    /// The machine's own state (at `own`) is tried first, then the other
    /// members' states in registration order. Returns the rule index.
    pub(crate) fn select(&self, own: usize, states: &[State]) -> Option<usize> {
        let own_state = states.get(own)?;
        if let Some(&rule) = self.lookup.get(own_state) {
            return Some(rule);
        }
        states
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != own)
            .find_map(|(_, state)| self.lookup.get(state).copied())
    }

    /// Run a rule's action. `Some(next)` when it asked for a transition.
    pub(crate) fn fire(&mut self, rule: usize) -> Result<Option<State>, ActionError> {
        let rule = &mut self.rules[rule];
        trace!("{} calling {}()", self.name, rule.label);
        let proceed = (rule.action)()?;
        Ok(proceed.then(|| rule.next.clone()))
    }

    /// Report an applied transition.
    pub(crate) fn transitioned(&mut self, from: &State, to: &State) {
        let via = self
            .lookup
            .get(to)
            .map_or("<no rule for state>", |&i| self.rules[i].label.as_str());
        debug!("{} changed to state |{}| (next: {})", self.name, to, via);
        if let Some(hook) = self.hook.as_mut() {
            hook(&self.name, from, to);
        }
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("name", &self.name)
            .field("rules", &self.rules)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
