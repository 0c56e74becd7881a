//! Readiness state machine gating every value exchange with the engine.
//!
//! ```text
//! NotReady ──exchange ready──▶ HandlesResolving ──all valid──▶ WarmupPending
//!                                    │                              │
//!                                    └─invalid handle: Err          └─warm-up over──▶ Ready
//!
//! any state ──adapter detached or released──▶ Complete
//! ```
//!
//! `Ready` is left only for `Complete`. Reads and writes through the
//! handle table are permitted only in `Ready`.

use simbridge_core::{DataExchange, HandleError, HandleSpec, ProtocolError};

use crate::handles::{self, HandleTable};

/// Position in the readiness lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// The engine has not populated its exchange surface yet.
    NotReady,
    /// The surface is populated and handles are being resolved.
    HandlesResolving,
    /// Handles are resolved; the engine is still warming up.
    WarmupPending,
    /// Handles resolved and warm-up over: data exchange is permitted.
    Ready,
    /// The engine run has ended.
    Complete,
}

/// Tracks readiness and owns the episode's handle table.
#[derive(Debug)]
pub struct ReadinessMachine {
    specs: Vec<HandleSpec>,
    state: Readiness,
    table: Option<HandleTable>,
}

impl ReadinessMachine {
    /// Start in `NotReady` with nothing resolved.
    pub fn new(specs: Vec<HandleSpec>) -> Self {
        Self {
            specs,
            state: Readiness::NotReady,
            table: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> Readiness {
        self.state
    }

    /// Whether data exchange is permitted.
    pub fn is_ready(&self) -> bool {
        self.state == Readiness::Ready
    }

    /// The frozen handle table, once resolution has succeeded.
    pub fn table(&self) -> Option<&HandleTable> {
        self.table.as_ref()
    }

    /// The handle table, provided the gate is open.
    pub fn ready_table(&self, operation: &'static str) -> Result<&HandleTable, ProtocolError> {
        match (&self.table, self.state) {
            (Some(table), Readiness::Ready) => Ok(table),
            _ => Err(ProtocolError::NotReady { operation }),
        }
    }

    /// Advance as far as the engine currently allows.
    ///
    /// Attempts resolution while the surface is unresolved, then checks
    /// the warm-up predicate. An unresolvable declaration is returned as
    /// an error and leaves the machine in `HandlesResolving`; the caller
    /// must treat it as fatal for the episode.
    pub fn advance(&mut self, exchange: &mut dyn DataExchange) -> Result<Readiness, HandleError> {
        if matches!(self.state, Readiness::NotReady | Readiness::HandlesResolving) {
            if !exchange.api_data_fully_ready() {
                return Ok(self.state);
            }
            self.state = Readiness::HandlesResolving;
            if let Some(table) = handles::resolve(&self.specs, exchange)? {
                self.table = Some(table);
                self.state = Readiness::WarmupPending;
            }
        }
        if self.state == Readiness::WarmupPending && !exchange.warmup_flag() {
            self.state = Readiness::Ready;
        }
        Ok(self.state)
    }

    /// Mark the run as ended.
    pub fn complete(&mut self) {
        self.state = Readiness::Complete;
    }
}
