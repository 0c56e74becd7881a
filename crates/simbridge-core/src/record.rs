//! Per-timestep records exchanged between the engine and controller threads.
//!
//! [`Observation`] and [`Info`] are produced once per simulation timestep
//! on the engine thread and handed to the controller; [`Action`] travels
//! the other way.

use indexmap::IndexMap;
use smallvec::SmallVec;

/// Named reward-decomposition terms returned by a reward function.
pub type RewardTerms = IndexMap<String, f64>;

// ── Observation ─────────────────────────────────────────────────

/// Ordered snapshot of observed engine values at one timestep.
///
/// Keys follow declaration order: variables, then meters, then internal
/// variables. Iteration order is stable, so [`to_vec`](Self::to_vec)
/// yields a fixed-layout vector suitable for a policy network.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observation {
    values: IndexMap<String, f64>,
}

impl Observation {
    /// Create an empty observation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty observation with room for `n` values.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            values: IndexMap::with_capacity(n),
        }
    }

    /// Insert or overwrite a value. Overwriting keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Look a value up by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the observation holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Names in observation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// `(name, value)` pairs in observation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Values in observation order.
    pub fn to_vec(&self) -> Vec<f64> {
        self.values.values().copied().collect()
    }

    /// Values in observation order, narrowed to `f32` for model input.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.values.values().map(|&v| v as f32).collect()
    }
}

impl FromIterator<(String, f64)> for Observation {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

// ── Action ──────────────────────────────────────────────────────

/// One value per declared actuator, in actuator declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Action(pub SmallVec<[f64; 8]>);

impl Action {
    /// Number of actuator values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the action carries no values.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The values as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for Action {
    fn from(v: Vec<f64>) -> Self {
        Self(SmallVec::from_vec(v))
    }
}

impl From<&[f64]> for Action {
    fn from(v: &[f64]) -> Self {
        Self(SmallVec::from_slice(v))
    }
}

impl<const N: usize> From<[f64; N]> for Action {
    fn from(v: [f64; N]) -> Self {
        Self(v.iter().copied().collect())
    }
}

// ── Info ────────────────────────────────────────────────────────

/// Auxiliary data accompanying an observation.
///
/// The engine thread fills the time, calendar, and actuator fields; the
/// controller side merges `timestep`, `action`, and `reward_terms` after
/// each successful step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Info {
    /// Cumulative simulation time in hours.
    pub time_elapsed_hours: f64,
    /// Month of the year (1-12).
    pub month: u32,
    /// Day of the month (1-31).
    pub day: u32,
    /// Hour of the day (0-23).
    pub hour: u32,
    /// Engine-side timestep index at collection time.
    pub sim_timestep: u64,
    /// Last action applied to the actuators on the engine thread, if any.
    pub applied_action: Option<Action>,
    /// Actuator read-backs at collection time, in declaration order.
    pub actuators: IndexMap<String, f64>,
    /// Controller-side step counter: 0 after reset, +1 per successful step.
    pub timestep: u64,
    /// Action submitted by the controller for this step.
    pub action: Option<Action>,
    /// Reward decomposition for this step.
    pub reward_terms: RewardTerms,
}
