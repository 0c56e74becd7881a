//! Benchmark profiles for the simbridge handoff path.
//!
//! Provides pre-built environments over the scripted engine:
//!
//! - [`office_config`]: three observed values and two actuators
//! - [`office_env`]: a [`BridgeEnv`] over [`office_config`] with a comfort reward
//! - [`comfort_reward`]: deviation of zone 1 from 22 °C

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;
use std::time::Duration;

use simbridge_core::{HandleSpec, Observation, RewardFn, RewardTerms};
use simbridge_engine::{BridgeEnv, EnvConfig, EnvError};
use simbridge_test_utils::{Script, ScriptedEngine, TempInputs};

/// Office configuration over the paths in `inputs`.
///
/// Observes outdoor temperature, zone 1 temperature, and facility
/// electricity; acts on the cooling and heating setpoints.
pub fn office_config(inputs: &TempInputs) -> EnvConfig {
    EnvConfig::new(
        "bench",
        inputs.model_path(),
        inputs.weather_path(),
        inputs.output_dir(),
    )
    .with_handle(HandleSpec::variable(
        "oat",
        "Site Outdoor Air Drybulb Temperature",
        "Environment",
    ))
    .with_handle(HandleSpec::variable(
        "zone1_t",
        "Zone Mean Air Temperature",
        "Zone 1",
    ))
    .with_handle(HandleSpec::meter("elec", "Electricity:Facility"))
    .with_handle(HandleSpec::actuator(
        "cool_sp",
        "Schedule:Constant",
        "Schedule Value",
        "Cooling SP",
    ))
    .with_handle(HandleSpec::actuator(
        "heat_sp",
        "Schedule:Constant",
        "Schedule Value",
        "Heating SP",
    ))
    .with_step_timeout(Duration::from_secs(5))
}

/// Negative absolute deviation of `zone1_t` from 22 °C.
pub fn comfort_reward(obs: &Observation) -> (f64, RewardTerms) {
    let dev = (obs.get("zone1_t").unwrap_or(22.0) - 22.0).abs();
    let mut terms = RewardTerms::new();
    terms.insert("comfort".into(), -dev);
    (-dev, terms)
}

/// Build an office environment whose episodes last `timesteps` steps.
pub fn office_env(
    inputs: &TempInputs,
    timesteps: u64,
) -> Result<BridgeEnv<impl RewardFn>, EnvError> {
    let engine = ScriptedEngine::new(Script::default().with_timesteps(timesteps));
    BridgeEnv::new(Arc::new(engine), office_config(inputs), comfort_reward)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbridge_core::Action;

    #[test]
    fn office_config_validates() {
        let inputs = TempInputs::new("bench-config");
        office_config(&inputs).validate().unwrap();
        assert_eq!(office_config(&inputs).action_len(), 2);
    }

    #[test]
    fn office_env_steps() {
        let inputs = TempInputs::new("bench-env");
        let mut env = office_env(&inputs, 16).unwrap();
        let (obs, _) = env.reset().unwrap();
        assert_eq!(obs.len(), 3);
        let r = env.step(Action::from([24.0, 20.0])).unwrap();
        assert!(!r.truncated);
        assert_eq!(r.info.timestep, 1);
    }

    #[test]
    fn comfort_reward_is_zero_at_setpoint() {
        let mut obs = Observation::new();
        obs.insert("zone1_t", 22.0);
        let (r, terms) = comfort_reward(&obs);
        assert_eq!(r, 0.0);
        assert_eq!(terms["comfort"], 0.0);
    }
}
