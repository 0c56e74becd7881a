//! Declarative handle specifications.
//!
//! A [`HandleSpec`] names one engine value the bridge should read or
//! write. Specs are declared once per configuration and are immutable;
//! resolution into engine handles happens per episode.

use smallvec::SmallVec;

use crate::id::HandleKind;

/// Selector strings used to look a handle up in the engine (1 to 3).
pub type Selectors = SmallVec<[String; 3]>;

/// Declaration of one engine value exchanged with the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandleSpec {
    /// Name used as the observation/info key.
    pub name: String,
    /// What kind of engine value this is.
    pub kind: HandleKind,
    /// Engine lookup selectors; arity depends on `kind`.
    pub selectors: Selectors,
}

impl HandleSpec {
    /// Report variable, e.g. `("Site Outdoor Air Drybulb Temperature", "Environment")`.
    pub fn variable(
        name: impl Into<String>,
        variable_name: impl Into<String>,
        variable_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: HandleKind::Variable,
            selectors: smallvec::smallvec![variable_name.into(), variable_key.into()],
        }
    }

    /// Meter, e.g. `"Electricity:Facility"`.
    pub fn meter(name: impl Into<String>, meter_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: HandleKind::Meter,
            selectors: smallvec::smallvec![meter_name.into()],
        }
    }

    /// Actuator, e.g. `("Lights", "Electricity Rate", "Basement_lights")`.
    pub fn actuator(
        name: impl Into<String>,
        component_type: impl Into<String>,
        control_type: impl Into<String>,
        actuator_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: HandleKind::Actuator,
            selectors: smallvec::smallvec![
                component_type.into(),
                control_type.into(),
                actuator_key.into()
            ],
        }
    }

    /// Internal variable, e.g. `("Zone Floor Area", "Zone 1")`.
    pub fn internal_variable(
        name: impl Into<String>,
        variable_name: impl Into<String>,
        variable_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: HandleKind::InternalVariable,
            selectors: smallvec::smallvec![variable_name.into(), variable_key.into()],
        }
    }

    /// Check structural invariants. Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("handle name is empty".to_string());
        }
        let expected = self.kind.selector_arity();
        if self.selectors.len() != expected {
            return Err(format!(
                "{} '{}' needs {expected} selectors, got {}",
                self.kind,
                self.name,
                self.selectors.len()
            ));
        }
        if let Some(i) = self.selectors.iter().position(|s| s.trim().is_empty()) {
            return Err(format!("{} '{}' selector {i} is empty", self.kind, self.name));
        }
        Ok(())
    }
}
