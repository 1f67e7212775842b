//! Error types for the animation core.
//!
//! - `ChannelError` - registration and retargeting of channels (caller bugs, never retried)
//! - `ProfileError` - easing profile selection
//! - `FsmError` - rule table construction and scheduling failures
//!
//! Stopping a family through `abort()` is not an error; see
//! [`RunExit::Aborted`](crate::fsm::RunExit).

use crate::fsm::State;
use thiserror::Error;

/// Error returned by a fallible FSM action.
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Channel table errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    /// Channel name already registered for this origin.
    #[error("channel '{name}' already registered for origin '{origin}'")]
    DuplicateChannel { origin: String, name: String },

    /// Channel name not registered for this origin.
    #[error("unknown channel '{name}' in origin '{origin}'")]
    UnknownChannel { origin: String, name: String },

    /// Target duration is zero, negative or not finite.
    #[error("invalid duration {duration}s for channel '{name}'")]
    InvalidDuration { name: String, duration: f64 },

    /// Target value is not finite.
    #[error("invalid target {value} for channel '{name}'")]
    InvalidTarget { name: String, value: f64 },

    /// Another pool already owns this origin.
    #[error("origin '{0}' is already owned by another pool")]
    OriginTaken(String),

    /// Initial values do not line up with channel names.
    #[error("{values} initial values given for {names} channels")]
    LengthMismatch { names: usize, values: usize },
}

/// Easing profile errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    /// No profile registered under that name.
    #[error("unknown motion profile '{0}'")]
    UnknownProfile(String),
}

/// Rule table and scheduler errors.
#[derive(Debug, Error)]
pub enum FsmError {
    /// Two rules of one machine share an input state.
    #[error("machine '{machine}': state '{state}' already has a rule")]
    DuplicateState { machine: String, state: State },

    /// Two machines of one family share a name.
    #[error("machine '{0}' already belongs to the family")]
    DuplicateMachine(String),

    /// A machine definition names a parent that is not (yet) in the family.
    #[error("machine '{machine}': parent '{parent}' not found")]
    UnknownParent { machine: String, parent: String },

    /// A family definition list was empty.
    #[error("a family needs at least a root machine")]
    EmptyFamily,

    /// No machine has a rule for the combined state vector.
    #[error("no applicable rule for any state in {}", format_states(.states))]
    NoApplicableRule { states: Vec<(String, State)> },

    /// A fallible action returned an error.
    #[error("action of machine '{machine}' failed: {source}")]
    ActionFailed {
        machine: String,
        #[source]
        source: ActionError,
    },

    /// A machine thread panicked.
    #[error("machine '{0}' panicked")]
    MachinePanicked(String),

    /// A machine thread could not be spawned.
    #[error("failed to spawn thread for machine '{machine}': {source}")]
    Spawn {
        machine: String,
        #[source]
        source: std::io::Error,
    },
}

fn format_states(states: &[(String, State)]) -> String {
    let parts: Vec<String> = states
        .iter()
        .map(|(name, state)| format!("{name}={state}"))
        .collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_error_display() {
        let err = ChannelError::UnknownChannel {
            origin: "face".to_string(),
            name: "au_99".to_string(),
        };
        assert_eq!(err.to_string(), "unknown channel 'au_99' in origin 'face'");

        let err = ChannelError::InvalidDuration {
            name: "au_01".to_string(),
            duration: 0.0,
        };
        assert!(err.to_string().contains("invalid duration 0s"));
    }

    #[test]
    fn no_applicable_rule_lists_states() {
        let err = FsmError::NoApplicableRule {
            states: vec![
                ("root".to_string(), State::new("IDLE")),
                ("child".to_string(), State::STARTED),
            ],
        };
        assert_eq!(
            err.to_string(),
            "no applicable rule for any state in [root=IDLE, child=STARTED]"
        );
    }

    #[test]
    fn action_failure_keeps_source() {
        let err = FsmError::ActionFailed {
            machine: "gaze".to_string(),
            source: "link lost".into(),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("link lost"));
    }
}
