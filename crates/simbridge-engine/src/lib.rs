//! Engine-thread bridge between a callback-driven building simulator and
//! a synchronous `reset`/`step` control loop.
//!
//! The simulator owns its own time loop and calls back into registered
//! code at fixed points of each timestep. This crate runs that loop on a
//! dedicated engine thread and hands observations, info records, and
//! actions across single-slot channels, so the controller sees an
//! ordinary RL-style environment ([`BridgeEnv`]).
//!
//! Layering, bottom up: [`handles`] resolves declared names once per
//! episode, [`readiness`] gates every value exchange, [`chain`] turns each
//! calling point into a pure state transition, [`engine_thread`] wires the
//! chain to the [`handoff`] channels, [`supervisor`] owns the engine state
//! and thread, and [`env`] exposes `reset`/`step`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod config;
pub mod engine_thread;
pub mod env;
pub mod handles;
pub mod handoff;
pub mod readiness;
pub mod supervisor;

pub use chain::{CallbackChain, EpisodeFault, ReadinessEvents};
pub use config::{ConfigError, EnvConfig};
pub use engine_thread::{BridgeCallbacks, EpisodeRunState, EpisodeShared, DATA_AVAILABLE_FILE};
pub use env::{BridgeEnv, EnvError, EnvPhase, StepResult};
pub use handles::{HandleTable, ResolvedHandle};
pub use handoff::{ControllerSide, EngineSide, HandoffError};
pub use readiness::{Readiness, ReadinessMachine};
pub use supervisor::RunSupervisor;
