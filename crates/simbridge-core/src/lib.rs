//! Core types and traits for the simbridge simulation bridge.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the bridge, the engine adapters, and the
//! test fixtures: handle identifiers and declarations, the observation,
//! info and action records, error types, and the traits through which
//! the external simulation engine and reward function are reached.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod error;
pub mod handle;
pub mod id;
pub mod record;
pub mod traits;

pub use clock::SimClock;
pub use error::{EngineError, HandleError, ProtocolError};
pub use handle::{HandleSpec, Selectors};
pub use id::{Handle, HandleKind, INVALID_HANDLE};
pub use record::{Action, Info, Observation, RewardTerms};
pub use traits::{CallingPoint, DataExchange, EngineApi, EngineState, RewardFn, RuntimeCallbacks};
