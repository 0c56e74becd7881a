//! Engine handle identifiers and the [`HandleKind`] taxonomy.

use std::fmt;

/// Raw value the engine returns when a declared name does not exist in
/// the loaded model.
pub const INVALID_HANDLE: i32 = -1;

/// An opaque, engine-assigned handle for one sensor, meter or actuator.
///
/// Handles are only meaningful for the engine state that produced them.
/// A new episode creates a new engine state, so handles are re-resolved
/// on every reset and never carried across episodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub i32);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Handle {
    fn from(v: i32) -> Self {
        Self(v)
    }
}

/// The kind of engine value a handle refers to.
///
/// Each kind is looked up with a different number of selector strings
/// and read through a different exchange primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandleKind {
    /// Report variable, selected by `(variable name, key)`.
    Variable,
    /// Meter, selected by `(meter name)`.
    Meter,
    /// Actuator, selected by `(component type, control type, actuator key)`.
    Actuator,
    /// Internal variable, selected by `(variable name, key)`.
    InternalVariable,
}

impl HandleKind {
    /// All kinds, in the order their values appear in an observation.
    pub const ALL: [HandleKind; 4] = [
        HandleKind::Variable,
        HandleKind::Meter,
        HandleKind::InternalVariable,
        HandleKind::Actuator,
    ];

    /// Number of selector strings the engine needs to resolve this kind.
    pub fn selector_arity(self) -> usize {
        match self {
            Self::Variable | Self::InternalVariable => 2,
            Self::Meter => 1,
            Self::Actuator => 3,
        }
    }

    /// Whether a raw value returned by the engine is a usable handle.
    pub fn is_valid(self, raw: i32) -> bool {
        raw >= 0
    }

    /// Whether values of this kind are part of the observation vector.
    ///
    /// Actuator read-backs are reported through `Info` instead.
    pub fn is_observed(self) -> bool {
        !matches!(self, Self::Actuator)
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Variable => "variable",
            Self::Meter => "meter",
            Self::Actuator => "actuator",
            Self::InternalVariable => "internal variable",
        };
        f.write_str(s)
    }
}
