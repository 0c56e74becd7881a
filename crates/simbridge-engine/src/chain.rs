//! The engine-thread callback chain as pure state transitions.
//!
//! [`CallbackChain`] holds everything the engine thread owns for one
//! episode (readiness, handle table, timestep index, last applied action)
//! and exposes one method per meaningful calling point. Each method takes
//! the live [`DataExchange`] and returns what should leave the engine
//! thread; it never touches a channel. The channel side lives in
//! [`crate::engine_thread`].

use std::error::Error;
use std::fmt;

use indexmap::IndexMap;

use simbridge_core::{
    Action, DataExchange, HandleError, HandleKind, Info, Observation, ProtocolError,
};

use crate::handles::HandleTable;
use crate::readiness::{Readiness, ReadinessMachine};

// ── EpisodeFault ─────────────────────────────────────────────────

/// A fatal, unrecoverable fault recorded for an episode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EpisodeFault {
    /// A declared handle does not exist in the model.
    Handle(HandleError),
    /// The callback chain violated the exchange protocol.
    Protocol(ProtocolError),
    /// The engine thread panicked.
    EnginePanicked,
}

impl fmt::Display for EpisodeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handle(e) => write!(f, "configuration: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::EnginePanicked => write!(f, "engine thread panicked"),
        }
    }
}

impl Error for EpisodeFault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Handle(e) => Some(e),
            Self::Protocol(e) => Some(e),
            Self::EnginePanicked => None,
        }
    }
}

impl From<HandleError> for EpisodeFault {
    fn from(e: HandleError) -> Self {
        Self::Handle(e)
    }
}

impl From<ProtocolError> for EpisodeFault {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ── ReadinessEvents ──────────────────────────────────────────────

/// Readiness edges crossed during one callback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadinessEvents {
    /// The handle table was resolved during this callback.
    pub resolved: bool,
    /// The gate opened during this callback.
    pub became_ready: bool,
}

// ── CallbackChain ────────────────────────────────────────────────

/// Engine-thread state for one episode.
#[derive(Debug)]
pub struct CallbackChain {
    readiness: ReadinessMachine,
    warmup_done: bool,
    timestep: u64,
    last_action: Option<Action>,
}

impl CallbackChain {
    /// Fresh chain for a new episode.
    pub fn new(specs: Vec<simbridge_core::HandleSpec>) -> Self {
        Self {
            readiness: ReadinessMachine::new(specs),
            warmup_done: false,
            timestep: 0,
            last_action: None,
        }
    }

    /// Current readiness state.
    pub fn readiness(&self) -> Readiness {
        self.readiness.state()
    }

    /// Whether data exchange is permitted.
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Whether the warm-up-complete callback has fired.
    pub fn warmup_done(&self) -> bool {
        self.warmup_done
    }

    /// Engine-side timestep index.
    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    /// The frozen handle table, once resolved.
    pub fn table(&self) -> Option<&HandleTable> {
        self.readiness.table()
    }

    /// Warm-up-complete calling point.
    ///
    /// Returns `true` the first time only, which is when the caller
    /// should publish the one-shot warm-up token.
    pub fn warmup_complete(&mut self) -> bool {
        if self.warmup_done {
            return false;
        }
        self.warmup_done = true;
        true
    }

    /// Advance readiness and report which edges were crossed.
    pub fn advance(
        &mut self,
        exchange: &mut dyn DataExchange,
    ) -> Result<ReadinessEvents, EpisodeFault> {
        let before = self.readiness.state();
        let after = self.readiness.advance(exchange)?;
        let unresolved = |s| matches!(s, Readiness::NotReady | Readiness::HandlesResolving);
        Ok(ReadinessEvents {
            resolved: unresolved(before) && !unresolved(after),
            became_ready: before != Readiness::Ready && after == Readiness::Ready,
        })
    }

    /// Post-predictor calling point.
    ///
    /// Advances readiness; once ready, asks `take_action` for the pending
    /// action (if none is queued the previous one stays in effect),
    /// applies it in actuator declaration order, and advances the
    /// timestep index.
    pub fn after_predictor<F>(
        &mut self,
        exchange: &mut dyn DataExchange,
        take_action: F,
    ) -> Result<ReadinessEvents, EpisodeFault>
    where
        F: FnOnce() -> Option<Action>,
    {
        let events = self.advance(exchange)?;
        if !self.readiness.is_ready() {
            return Ok(events);
        }
        if let Some(action) = take_action() {
            self.apply_action(exchange, action)?;
        }
        self.timestep += 1;
        Ok(events)
    }

    /// End-of-timestep calling point.
    ///
    /// Advances readiness; once ready, reads every declared value and
    /// returns the observation/info pair for this timestep.
    pub fn end_of_timestep(
        &mut self,
        exchange: &mut dyn DataExchange,
    ) -> Result<(ReadinessEvents, Option<(Observation, Info)>), EpisodeFault> {
        let events = self.advance(exchange)?;
        if !self.readiness.is_ready() {
            return Ok((events, None));
        }
        let pair = self.collect(exchange)?;
        Ok((events, Some(pair)))
    }

    /// Mark the run as ended.
    pub fn complete(&mut self) {
        self.readiness.complete();
    }

    /// Write one action through the actuator handles.
    pub fn apply_action(
        &mut self,
        exchange: &mut dyn DataExchange,
        action: Action,
    ) -> Result<(), ProtocolError> {
        let table = self.readiness.ready_table("apply action")?;
        let expected = table.actuator_count();
        if action.len() != expected {
            return Err(ProtocolError::ActionArity {
                expected,
                got: action.len(),
            });
        }
        for ((_, handle), value) in table
            .of_kind(HandleKind::Actuator)
            .zip(action.as_slice().iter().copied())
        {
            exchange.set_actuator_value(handle, value);
        }
        self.last_action = Some(action);
        Ok(())
    }

    /// Read every declared value into an observation/info pair.
    pub fn collect(
        &self,
        exchange: &mut dyn DataExchange,
    ) -> Result<(Observation, Info), ProtocolError> {
        let table = self.readiness.ready_table("collect observation")?;

        let mut observation = Observation::with_capacity(table.len());
        for kind in HandleKind::ALL.into_iter().filter(|k| k.is_observed()) {
            for (name, handle) in table.of_kind(kind) {
                observation.insert(name, exchange.value(kind, handle));
            }
        }

        let actuators: IndexMap<String, f64> = table
            .of_kind(HandleKind::Actuator)
            .map(|(name, handle)| {
                (
                    name.to_string(),
                    exchange.value(HandleKind::Actuator, handle),
                )
            })
            .collect();

        let clock = exchange.clock();
        let info = Info {
            time_elapsed_hours: clock.current_sim_time,
            month: clock.month,
            day: clock.day_of_month,
            hour: clock.hour,
            sim_timestep: self.timestep,
            applied_action: self.last_action.clone(),
            actuators,
            ..Info::default()
        };
        Ok((observation, info))
    }
}
