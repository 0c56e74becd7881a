//! Integration test: full episodes through `BridgeEnv` over a scripted engine.
//!
//! Every test runs a real engine thread. The scripted engine walks the
//! registered callbacks through warm-up and a fixed number of timesteps,
//! so ordering, readiness gating, and termination are exercised end to
//! end through the handoff channels.

use std::sync::Arc;
use std::time::Duration;

use simbridge_core::{Action, HandleSpec, Observation, RewardFn, RewardTerms};
use simbridge_engine::{BridgeEnv, EnvConfig, EnvPhase, DATA_AVAILABLE_FILE};
use simbridge_test_utils::{MockModel, Script, ScriptedEngine, TempInputs};

// ── Fixtures ─────────────────────────────────────────────────────

fn three_zone_model() -> MockModel {
    MockModel::new()
        .with_variable("Site Outdoor Air Drybulb Temperature", "Environment")
        .with_variable("Zone Mean Air Temperature", "Zone 1")
        .with_variable("Zone Mean Air Temperature", "Zone 2")
        .with_actuator("Schedule:Constant", "Schedule Value", "Cooling SP")
        .with_actuator("Schedule:Constant", "Schedule Value", "Heating SP")
}

/// Two actuators and three variables, actuators declared first.
fn config(inputs: &TempInputs) -> EnvConfig {
    EnvConfig::new(
        "office",
        inputs.model_path(),
        inputs.weather_path(),
        inputs.output_dir(),
    )
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
    .with_handle(HandleSpec::variable(
        "oat",
        "Site Outdoor Air Drybulb Temperature",
        "Environment",
    ))
    .with_handle(HandleSpec::variable("zone1_t", "Zone Mean Air Temperature", "Zone 1"))
    .with_handle(HandleSpec::variable("zone2_t", "Zone Mean Air Temperature", "Zone 2"))
    .with_step_timeout(Duration::from_secs(2))
}

fn comfort_reward(obs: &Observation) -> (f64, RewardTerms) {
    let dev = (obs.get("zone1_t").unwrap_or(0.0) - 22.0).abs();
    let mut terms = RewardTerms::new();
    terms.insert("comfort".into(), -dev);
    (-dev, terms)
}

fn make_env(
    inputs: &TempInputs,
    script: Script,
) -> (BridgeEnv<impl RewardFn>, ScriptedEngine) {
    let engine = ScriptedEngine::with_model(script, three_zone_model());
    let env = BridgeEnv::new(Arc::new(engine.clone()), config(inputs), comfort_reward).unwrap();
    (env, engine)
}

// ── Scenarios ────────────────────────────────────────────────────

#[test]
fn reset_returns_three_observed_keys_and_timestep_zero() {
    let inputs = TempInputs::new("scn-a");
    let (mut env, _engine) = make_env(&inputs, Script::default());

    let (obs, info) = env.reset().unwrap();

    assert_eq!(obs.len(), 3);
    assert_eq!(obs.names().collect::<Vec<_>>(), ["oat", "zone1_t", "zone2_t"]);
    assert_eq!(info.timestep, 0);
    assert_eq!(info.actuators.len(), 2);
    assert_eq!(env.phase(), EnvPhase::Stepping);
    assert!(env.is_running());
}

#[test]
fn one_step_on_live_engine() {
    let inputs = TempInputs::new("scn-b");
    let (mut env, _engine) = make_env(&inputs, Script::default().with_timesteps(20));
    env.reset().unwrap();

    let r = env.step(Action::from([1.0, 2.0])).unwrap();

    assert!(!r.terminated);
    assert!(!r.truncated);
    assert_eq!(r.info.timestep, 1);
    assert_eq!(r.info.action, Some(Action::from([1.0, 2.0])));
    assert!(r.info.reward_terms.contains_key("comfort"));
    assert_eq!(r.reward, r.info.reward_terms["comfort"]);
}

#[test]
fn engine_exit_mid_step_truncates_with_cached_data() {
    let inputs = TempInputs::new("scn-c");
    // One timestep: the engine delivers it, lingers, then exits while the
    // controller is waiting on the next observation.
    let (mut env, _engine) = make_env(
        &inputs,
        Script::default()
            .with_timesteps(1)
            .with_exit_delay(Duration::from_millis(300)),
    );
    let (obs, info) = env.reset().unwrap();

    let r = env.step(Action::from([1.0, 2.0])).unwrap();

    assert!(r.truncated);
    assert!(!r.terminated);
    // Terminal results score the cached observation.
    assert_eq!(r.reward, comfort_reward(&obs).0);
    assert_eq!(r.observation, obs);
    assert_eq!(r.info, info);
    assert_eq!(env.phase(), EnvPhase::Truncated);
    assert_eq!(env.timestep(), 0);
}

#[test]
fn step_after_termination_repeats_cache_without_channel_use() {
    let inputs = TempInputs::new("scn-d");
    let (mut env, engine) = make_env(&inputs, Script::default().with_timesteps(3));
    env.reset().unwrap();

    let mut last_ok = None;
    for _ in 0..10 {
        let r = env.step(Action::from([20.0, 24.0])).unwrap();
        if r.terminated {
            break;
        }
        if !r.truncated {
            last_ok = Some(r);
        }
    }
    assert_eq!(env.phase(), EnvPhase::Terminated);
    let last_ok = last_ok.expect("at least one successful step");

    let before = engine.log().applied();
    let r = env.step(Action::from([99.0, 99.0])).unwrap();
    assert!(r.terminated);
    assert_eq!(r.reward, last_ok.reward);
    assert_eq!(r.observation, last_ok.observation);
    assert_eq!(r.info, last_ok.info);
    assert_eq!(engine.log().applied(), before);
}

// ── Ordering and idempotence ─────────────────────────────────────

#[test]
fn info_timestep_counts_successful_steps() {
    let inputs = TempInputs::new("ordering");
    let (mut env, _engine) = make_env(&inputs, Script::default().with_timesteps(30));
    env.reset().unwrap();

    for expected in 1..=10u64 {
        let r = env.step(Action::from([21.0, 23.0])).unwrap();
        assert!(!r.terminated && !r.truncated);
        assert_eq!(r.info.timestep, expected);
        assert_eq!(env.timestep(), expected);
        // reset consumed the first engine timestep
        assert_eq!(r.info.sim_timestep, expected + 1);
    }
}

#[test]
fn actions_reach_actuators_in_declaration_order() {
    let inputs = TempInputs::new("act-order");
    let (mut env, engine) = make_env(&inputs, Script::default().with_timesteps(10));
    env.reset().unwrap();
    // A step only succeeds once the previous action left the slot, so the
    // first two actions are applied by the time the third step returns.
    for action in [[18.5, 26.5], [19.0, 25.0], [20.0, 24.0]] {
        let r = env.step(Action::from(action)).unwrap();
        assert!(!r.truncated);
    }
    let table = env.handles().cloned().unwrap();
    env.close();

    let cool = table.get("cool_sp").unwrap().handle;
    let heat = table.get("heat_sp").unwrap().handle;
    let runs = engine.log().applied();
    let applied = &runs[0];
    assert!(applied.len() >= 4);
    assert_eq!(
        &applied[..4],
        &[(cool, 18.5), (heat, 26.5), (cool, 19.0), (heat, 25.0)]
    );
}

#[test]
fn consecutive_resets_start_fresh_episodes() {
    let inputs = TempInputs::new("reset-twice");
    let (mut env, engine) = make_env(&inputs, Script::default().with_timesteps(50));

    let (_, first) = env.reset().unwrap();
    let (_, second) = env.reset().unwrap();

    assert_eq!(first.timestep, 0);
    assert_eq!(second.timestep, 0);
    assert_eq!(env.episode(), 2);
    assert_eq!(env.timestep(), 0);
    assert_eq!(engine.log().states_created(), 2);
    assert_eq!(env.handles().map(|t| t.len()), Some(5));
    assert!(inputs.output_dir().join("office1").is_dir());
    assert!(inputs.output_dir().join("office2").is_dir());
}

#[test]
fn values_are_never_read_before_ready() {
    let inputs = TempInputs::new("premature");
    let (mut env, engine) = make_env(
        &inputs,
        Script::default()
            .with_warmup_timesteps(4)
            .with_data_ready_after(6)
            .with_timesteps(6),
    );
    let (_, info) = env.reset().unwrap();
    // Two post-warm-up timesteps pass before the surface is ready.
    assert_eq!(info.sim_timestep, 1);
    for _ in 0..3 {
        env.step(Action::from([20.0, 24.0])).unwrap();
    }
    env.close();

    assert_eq!(engine.log().premature_reads(), 0);
    assert_eq!(engine.log().premature_resolves(), 0);
}

#[test]
fn engine_args_and_available_data_listing() {
    let inputs = TempInputs::new("args");
    let (mut env, engine) = make_env(&inputs, Script::default());
    env.reset().unwrap();
    env.close();

    let dir = inputs.output_dir().join("office1");
    let runs = engine.log().runs();
    assert_eq!(
        runs[0],
        vec![
            "-w".to_string(),
            inputs.weather_path().display().to_string(),
            "-d".to_string(),
            dir.display().to_string(),
            inputs.model_path().display().to_string(),
        ]
    );
    let listing = std::fs::read_to_string(dir.join(DATA_AVAILABLE_FILE)).unwrap();
    assert!(listing.contains("Zone Mean Air Temperature"));
}

#[test]
fn console_output_follows_config() {
    let inputs = TempInputs::new("console");
    let engine = ScriptedEngine::with_model(Script::default(), three_zone_model());
    let mut cfg = config(&inputs);
    cfg.console_output = true;
    let mut env = BridgeEnv::new(Arc::new(engine.clone()), cfg, comfort_reward).unwrap();
    env.reset().unwrap();
    assert_eq!(engine.log().console_output(), vec![true]);
}
