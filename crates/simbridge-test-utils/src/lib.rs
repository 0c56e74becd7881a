//! Test utilities and mock types for simbridge development.
//!
//! Provides a [`MockModel`] (the set of names a building model offers), a
//! [`MockExchange`] implementing [`DataExchange`] over it, a
//! [`ScriptedEngine`] that drives registered callbacks through a fixed
//! number of timesteps on the calling thread, and a [`TempInputs`]
//! fixture for model, weather, and output paths.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::cell::Cell;
use std::collections::HashMap;

use simbridge_core::{DataExchange, Handle, HandleKind, SimClock};

pub mod fixtures;
pub mod scripted;

pub use fixtures::TempInputs;
pub use scripted::{EngineLog, Script, ScriptedEngine, ScriptedState};

// ── MockModel ────────────────────────────────────────────────────

/// The exchangeable values a building model offers.
///
/// Each entry's handle is its insertion index; lookups of anything not
/// added return `-1`.
#[derive(Clone, Debug, Default)]
pub struct MockModel {
    entries: Vec<(HandleKind, Vec<String>)>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small office model with the names used throughout the tests.
    pub fn office() -> Self {
        Self::new()
            .with_variable("Site Outdoor Air Drybulb Temperature", "Environment")
            .with_variable("Zone Mean Air Temperature", "Zone 1")
            .with_meter("Electricity:Facility")
            .with_actuator("Schedule:Constant", "Schedule Value", "Cooling SP")
            .with_actuator("Schedule:Constant", "Schedule Value", "Heating SP")
            .with_internal_variable("Zone Floor Area", "Zone 1")
    }

    pub fn with_variable(self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.with(HandleKind::Variable, vec![name.into(), key.into()])
    }

    pub fn with_meter(self, name: impl Into<String>) -> Self {
        self.with(HandleKind::Meter, vec![name.into()])
    }

    pub fn with_actuator(
        self,
        component_type: impl Into<String>,
        control_type: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.with(
            HandleKind::Actuator,
            vec![component_type.into(), control_type.into(), key.into()],
        )
    }

    pub fn with_internal_variable(self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.with(HandleKind::InternalVariable, vec![name.into(), key.into()])
    }

    fn with(mut self, kind: HandleKind, selectors: Vec<String>) -> Self {
        self.entries.push((kind, selectors));
        self
    }

    /// Raw handle for `(kind, selectors)`, or `-1` when absent.
    pub fn lookup(&self, kind: HandleKind, selectors: &[String]) -> i32 {
        self.entries
            .iter()
            .position(|(k, s)| *k == kind && s.as_slice() == selectors)
            .and_then(|i| i32::try_from(i).ok())
            .unwrap_or(-1)
    }

    /// CSV listing in the shape the engine writes to its data dictionary.
    pub fn available_data_csv(&self) -> String {
        let mut out = String::from("kind,selectors\n");
        for (kind, selectors) in &self.entries {
            out.push_str(&format!("{kind},{}\n", selectors.join(",")));
        }
        out
    }
}

// ── MockExchange ─────────────────────────────────────────────────

/// In-memory [`DataExchange`] over a [`MockModel`].
///
/// Defaults to data-ready and not warming up. Sensor values are
/// deterministic: `handle * 10 + tick`. Actuators read back the last
/// value written to them (0.0 before any write).
pub struct MockExchange {
    model: MockModel,
    data_ready: bool,
    warmup: bool,
    tick: u64,
    clock: SimClock,
    actuators: HashMap<i32, f64>,
    applied: Vec<(Handle, f64)>,
    resolve_calls: usize,
    premature_resolves: usize,
    value_reads: Cell<usize>,
    premature_reads: Cell<usize>,
}

impl MockExchange {
    pub fn new(model: MockModel) -> Self {
        Self {
            model,
            data_ready: true,
            warmup: false,
            tick: 0,
            clock: SimClock {
                month: 1,
                day_of_month: 1,
                day_of_year: 1,
                day_of_week: 1,
                num_time_steps_in_hour: 4,
                ..SimClock::default()
            },
            actuators: HashMap::new(),
            applied: Vec::new(),
            resolve_calls: 0,
            premature_resolves: 0,
            value_reads: Cell::new(0),
            premature_reads: Cell::new(0),
        }
    }

    pub fn set_data_ready(&mut self, ready: bool) {
        self.data_ready = ready;
    }

    pub fn set_warmup(&mut self, warmup: bool) {
        self.warmup = warmup;
    }

    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    pub fn set_clock(&mut self, clock: SimClock) {
        self.clock = clock;
    }

    /// Number of `resolve_handle` calls so far.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls
    }

    /// `resolve_handle` calls made before the surface was ready.
    pub fn premature_resolves(&self) -> usize {
        self.premature_resolves
    }

    /// Number of `value` calls so far.
    pub fn value_reads(&self) -> usize {
        self.value_reads.get()
    }

    /// `value` calls made while not ready or still warming up.
    pub fn premature_reads(&self) -> usize {
        self.premature_reads.get()
    }

    /// Every actuator write, in order.
    pub fn applied(&self) -> Vec<(Handle, f64)> {
        self.applied.clone()
    }
}

impl DataExchange for MockExchange {
    fn api_data_fully_ready(&self) -> bool {
        self.data_ready
    }

    fn warmup_flag(&self) -> bool {
        self.warmup
    }

    fn resolve_handle(&mut self, kind: HandleKind, selectors: &[String]) -> i32 {
        self.resolve_calls += 1;
        if !self.data_ready {
            self.premature_resolves += 1;
        }
        self.model.lookup(kind, selectors)
    }

    fn value(&self, kind: HandleKind, handle: Handle) -> f64 {
        self.value_reads.set(self.value_reads.get() + 1);
        if !self.data_ready || self.warmup {
            self.premature_reads.set(self.premature_reads.get() + 1);
        }
        match kind {
            HandleKind::Actuator => self.actuators.get(&handle.0).copied().unwrap_or(0.0),
            _ => f64::from(handle.0) * 10.0 + self.tick as f64,
        }
    }

    fn set_actuator_value(&mut self, handle: Handle, value: f64) {
        self.actuators.insert(handle.0, value);
        self.applied.push((handle, value));
    }

    fn clock(&self) -> SimClock {
        self.clock
    }

    fn available_data_csv(&self) -> String {
        self.model.available_data_csv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_uses_insertion_index() {
        let m = MockModel::new()
            .with_meter("Electricity:Facility")
            .with_variable("Zone Mean Air Temperature", "Zone 1");
        let sel = ["Zone Mean Air Temperature".to_string(), "Zone 1".to_string()];
        assert_eq!(m.lookup(HandleKind::Variable, &sel), 1);
        assert_eq!(m.lookup(HandleKind::Meter, &sel[..1]), -1);
    }

    #[test]
    fn sensor_values_follow_tick_and_actuators_read_back() {
        let mut ex = MockExchange::new(MockModel::office());
        ex.set_tick(3);
        assert_eq!(ex.value(HandleKind::Variable, Handle(2)), 23.0);
        ex.set_actuator_value(Handle(4), 21.5);
        assert_eq!(ex.value(HandleKind::Actuator, Handle(4)), 21.5);
        assert_eq!(ex.value_reads(), 2);
        assert_eq!(ex.premature_reads(), 0);
    }

    #[test]
    fn reads_before_ready_are_counted() {
        let mut ex = MockExchange::new(MockModel::office());
        ex.set_warmup(true);
        ex.value(HandleKind::Meter, Handle(2));
        assert_eq!(ex.premature_reads(), 1);
    }
}
