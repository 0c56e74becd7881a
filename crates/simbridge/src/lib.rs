//! simbridge: run a callback-driven building simulator as a reset/step
//! reinforcement-learning environment.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the simbridge sub-crates. For most users, adding `simbridge` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use simbridge::prelude::*;
//! use simbridge_test_utils::{Script, ScriptedEngine, TempInputs};
//!
//! let inputs = TempInputs::new("doc-quickstart");
//! let config = EnvConfig::new(
//!     "office",
//!     inputs.model_path(),
//!     inputs.weather_path(),
//!     inputs.output_dir(),
//! )
//! .with_handle(HandleSpec::variable("zone_t", "Zone Mean Air Temperature", "Zone 1"))
//! .with_handle(HandleSpec::actuator(
//!     "cool_sp",
//!     "Schedule:Constant",
//!     "Schedule Value",
//!     "Cooling SP",
//! ));
//!
//! let reward = |obs: &Observation| {
//!     let dev = (obs.get("zone_t").unwrap_or(22.0) - 22.0).abs();
//!     (-dev, RewardTerms::new())
//! };
//! let engine = Arc::new(ScriptedEngine::new(Script::default()));
//! let mut env = BridgeEnv::new(engine, config, reward).unwrap();
//!
//! let (obs, info) = env.reset().unwrap();
//! assert_eq!(info.timestep, 0);
//! assert!(obs.get("zone_t").is_some());
//!
//! let result = env.step(Action::from([24.0])).unwrap();
//! assert_eq!(result.info.timestep, 1);
//! env.close();
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `simbridge-core` | Handles, records, errors, engine traits |
//! | [`engine`] | `simbridge-engine` | Handle table, readiness, handoff, supervisor, `BridgeEnv` |
//! | [`logging`] | this crate | `tracing` subscriber setup |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod logging;

/// Core types, traits, and errors (`simbridge-core`).
///
/// Contains handle specifications, observation and info records, the
/// error enums, and the traits an engine binding implements
/// ([`types::EngineApi`], [`types::EngineState`], [`types::DataExchange`],
/// [`types::RuntimeCallbacks`]).
pub use simbridge_core as types;

/// The engine-thread bridge (`simbridge-engine`).
///
/// [`engine::BridgeEnv`] is the reset/step facade; [`engine::RunSupervisor`]
/// owns the engine state and thread underneath it.
pub use simbridge_engine as engine;

/// Common imports for typical simbridge usage.
///
/// ```rust
/// use simbridge::prelude::*;
/// ```
pub mod prelude {
    // Core records and specs
    pub use simbridge_core::{
        Action, Handle, HandleKind, HandleSpec, Info, Observation, RewardTerms, SimClock,
    };

    // Engine traits
    pub use simbridge_core::{
        CallingPoint, DataExchange, EngineApi, EngineState, RewardFn, RuntimeCallbacks,
    };

    // Errors
    pub use simbridge_core::{EngineError, HandleError, ProtocolError};
    pub use simbridge_engine::{ConfigError, EnvError, EpisodeFault};

    // Bridge
    pub use simbridge_engine::{BridgeEnv, EnvConfig, EnvPhase, EpisodeRunState, StepResult};
}
