use super::state::{State, Triggers};
use crate::error::ActionError;
use std::fmt;

pub(crate) type Action = Box<dyn FnMut() -> Result<bool, ActionError> + Send>;

/// `(trigger states, action, next state)` triple.
///
/// The action takes no arguments; whatever it needs (pools, counters,
/// connections) is captured by the closure. `true` moves the machine to
/// `next`, `false` keeps its current state.
pub struct Rule {
    pub(crate) triggers: Vec<State>,
    pub(crate) action: Action,
    pub(crate) label: String,
    pub(crate) next: State,
}

impl Rule {
    pub fn new<T, F, N>(triggers: T, mut action: F, next: N) -> Self
    where
        T: Into<Triggers>,
        F: FnMut() -> bool + Send + 'static,
        N: Into<State>,
    {
        Self {
            triggers: triggers.into().0,
            action: Box::new(move || Ok(action())),
            label: short_type_name::<F>(),
            next: next.into(),
        }
    }

    /// Rule whose action can fail. An error stops the whole family.
    pub fn fallible<T, F, N>(triggers: T, action: F, next: N) -> Self
    where
        T: Into<Triggers>,
        F: FnMut() -> Result<bool, ActionError> + Send + 'static,
        N: Into<State>,
    {
        Self {
            triggers: triggers.into().0,
            label: short_type_name::<F>(),
            action: Box::new(action),
            next: next.into(),
        }
    }

    /// Name shown in transition logs instead of the closure's type name.
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn triggers(&self) -> &[State] {
        &self.triggers
    }

    pub fn next(&self) -> &State {
        &self.next
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("triggers", &self.triggers)
            .field("action", &self.label)
            .field("next", &self.next)
            .finish()
    }
}

// `my_crate::behavior::breathe` -> `breathe`; closures keep their enclosing fn.
fn short_type_name<F>() -> String {
    let full = std::any::type_name::<F>();
    let mut parts = full.rsplit("::").filter(|p| !p.starts_with('{'));
    parts.next().unwrap_or(full).to_string()
}
