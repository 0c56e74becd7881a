//! Error types shared across the simbridge workspace.
//!
//! Organised by failure class: configuration (a declared name the model
//! does not contain), protocol misuse (touching values before the
//! readiness gate opens), and engine-state creation.

use std::error::Error;
use std::fmt;

use crate::id::HandleKind;

/// A declared handle could not be resolved against the loaded model.
///
/// Always fatal for the episode: retrying cannot make an absent name
/// appear in the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandleError {
    /// The engine returned an invalid sentinel for this declaration.
    Unresolved {
        /// Declared handle name.
        name: String,
        /// Declared kind.
        kind: HandleKind,
        /// Raw value the engine returned.
        raw: i32,
    },
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved { name, kind, raw } => {
                write!(f, "{kind} handle '{name}' is not available in the model (engine returned {raw})")
            }
        }
    }
}

impl Error for HandleError {}

/// Misuse of the exchange protocol by the callback chain.
///
/// These indicate a defect in the bridge, not a runtime condition the
/// controller can recover from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// A value was read or written before the readiness gate opened.
    NotReady {
        /// The operation that was attempted.
        operation: &'static str,
    },
    /// A name was used that the frozen handle table does not contain.
    UnknownHandle {
        /// The missing name.
        name: String,
    },
    /// An action carried the wrong number of actuator values.
    ActionArity {
        /// Number of declared actuators.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady { operation } => {
                write!(f, "{operation} attempted before the exchange was ready")
            }
            Self::UnknownHandle { name } => write!(f, "no resolved handle named '{name}'"),
            Self::ActionArity { expected, got } => {
                write!(f, "action has {got} values, expected {expected}")
            }
        }
    }
}

impl Error for ProtocolError {}

/// Errors raised by the external engine library itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// A fresh engine state could not be created.
    StateCreation {
        /// Engine-provided description.
        reason: String,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateCreation { reason } => write!(f, "engine state creation failed: {reason}"),
        }
    }
}

impl Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_names_kind_and_raw_value() {
        let err = HandleError::Unresolved {
            name: "oat".into(),
            kind: HandleKind::Variable,
            raw: -1,
        };
        let msg = err.to_string();
        assert!(msg.contains("variable handle 'oat'"), "{msg}");
        assert!(msg.contains("-1"), "{msg}");
    }

    #[test]
    fn arity_message_reports_both_counts() {
        let msg = ProtocolError::ActionArity {
            expected: 2,
            got: 3,
        }
        .to_string();
        assert_eq!(msg, "action has 3 values, expected 2");
    }
}
