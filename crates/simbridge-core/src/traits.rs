//! Seams to the external simulation engine and reward function.
//!
//! The engine is an opaque, synchronous library: it owns its time loop and
//! calls back into registered code at fixed points of each timestep. The
//! bridge only sees it through these traits, which keeps the concurrency
//! machinery testable against a scripted engine.

use crate::clock::SimClock;
use crate::error::EngineError;
use crate::id::{Handle, HandleKind};
use crate::record::{Observation, RewardTerms};

/// Lifecycle injection points, in the order the engine visits them.
///
/// `BeginNewEnvironment` and `AfterNewEnvironmentWarmupComplete` fire once
/// per environment period; the rest fire once per zone timestep in the
/// order given by [`CallingPoint::TIMESTEP_ORDER`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallingPoint {
    /// Start of an environment period (sizing period, design day, run period).
    BeginNewEnvironment,
    /// Warm-up days of the current environment have converged.
    AfterNewEnvironmentWarmupComplete,
    /// Start of a zone timestep, before the heat balance is initialised.
    BeginZoneTimestepBeforeInitHeatBalance,
    /// Start of a zone timestep, after the heat balance is initialised.
    BeginZoneTimestepAfterInitHeatBalance,
    /// Start of a system timestep, before the predictor runs.
    BeginSystemTimestepBeforePredictor,
    /// After the predictor, before setpoint and availability managers.
    AfterPredictorBeforeHvacManagers,
    /// After the predictor and the HVAC managers; actions are applied here.
    AfterPredictorAfterHvacManagers,
    /// End of the zone timestep after reporting; observations are collected here.
    EndZoneTimestepAfterZoneReporting,
}

impl CallingPoint {
    /// Per-timestep calling points in engine order.
    pub const TIMESTEP_ORDER: [CallingPoint; 6] = [
        CallingPoint::BeginZoneTimestepBeforeInitHeatBalance,
        CallingPoint::BeginZoneTimestepAfterInitHeatBalance,
        CallingPoint::BeginSystemTimestepBeforePredictor,
        CallingPoint::AfterPredictorBeforeHvacManagers,
        CallingPoint::AfterPredictorAfterHvacManagers,
        CallingPoint::EndZoneTimestepAfterZoneReporting,
    ];
}

/// The engine's data-exchange surface, valid only inside a callback.
pub trait DataExchange {
    /// Whether the exchange surface is fully populated and handles can
    /// be requested.
    fn api_data_fully_ready(&self) -> bool;

    /// Whether the engine is still in its warm-up phase.
    fn warmup_flag(&self) -> bool;

    /// Look up a handle. Returns the engine's raw value, which is
    /// negative when the selectors name nothing in the model.
    fn resolve_handle(&mut self, kind: HandleKind, selectors: &[String]) -> i32;

    /// Read the current value behind a resolved handle.
    fn value(&self, kind: HandleKind, handle: Handle) -> f64;

    /// Write an actuator value for the current timestep.
    fn set_actuator_value(&mut self, handle: Handle, value: f64);

    /// Calendar and time fields at this callback.
    fn clock(&self) -> SimClock;

    /// CSV listing of every exchangeable value the loaded model offers.
    fn available_data_csv(&self) -> String {
        String::new()
    }
}

/// Code registered with an engine state, invoked on the engine's thread.
pub trait RuntimeCallbacks: Send {
    /// Called at every lifecycle point with the live exchange surface.
    fn on_calling_point(&mut self, point: CallingPoint, exchange: &mut dyn DataExchange);

    /// Called as the run advances; `percent` is in `0..=100`.
    fn on_progress(&mut self, percent: u8);
}

/// One engine instance. Created per episode and disposed by dropping it.
pub trait EngineState: Send {
    /// Enable or silence the engine's own console output.
    fn set_console_output(&mut self, enabled: bool);

    /// Register the callback set for the next run.
    fn register_callbacks(&mut self, callbacks: Box<dyn RuntimeCallbacks>);

    /// Drop all registered callbacks.
    fn clear_callbacks(&mut self);

    /// Run a full simulation with command-line style arguments.
    ///
    /// Blocks the calling thread until the run ends and returns the
    /// engine's exit status (0 on success).
    fn run(&mut self, args: &[String]) -> i32;
}

/// Entry point into the engine library.
pub trait EngineApi: Send + Sync {
    /// Create a fresh engine state.
    fn new_state(&self) -> Result<Box<dyn EngineState>, EngineError>;
}

/// Reward computation over a fresh observation.
///
/// Implemented for any `FnMut(&Observation) -> (f64, RewardTerms)`.
pub trait RewardFn: Send {
    /// Compute the scalar reward and its named decomposition.
    fn reward(&mut self, observation: &Observation) -> (f64, RewardTerms);
}

impl<F> RewardFn for F
where
    F: FnMut(&Observation) -> (f64, RewardTerms) + Send,
{
    fn reward(&mut self, observation: &Observation) -> (f64, RewardTerms) {
        self(observation)
    }
}
