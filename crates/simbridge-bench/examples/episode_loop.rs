//! End-to-end reset/step loop over the scripted office engine.
//!
//! Demonstrates: build config → BridgeEnv → reset → step with a bang-bang
//! setpoint policy → read observations and rewards → reset → repeat.

use std::time::Instant;

use simbridge_bench::office_env;
use simbridge_core::Action;
use simbridge_test_utils::TempInputs;

fn main() {
    println!("=== simbridge episode loop ===\n");

    let inputs = TempInputs::new("episode-loop");
    let mut env = office_env(&inputs, 96).unwrap();

    for episode in 1..=2 {
        let (obs, _) = env.reset().unwrap();
        println!("Episode {episode}: reset, {} observed values", obs.len());

        let start = Instant::now();
        let mut total_reward = 0.0;
        let mut last = obs;
        loop {
            // Cool harder when the zone runs warm.
            let warm = last.get("zone1_t").unwrap_or(22.0) > 22.0;
            let action = if warm {
                Action::from([21.0, 18.0])
            } else {
                Action::from([26.0, 21.0])
            };
            let r = env.step(action).unwrap();
            total_reward += r.reward;

            if r.info.timestep % 24 == 0 {
                println!(
                    "  step {:>3}: hour={:>2} zone1_t={:>8.2} reward={:>8.3}",
                    r.info.timestep,
                    r.info.hour,
                    r.observation.get("zone1_t").unwrap_or(f64::NAN),
                    r.reward,
                );
            }
            if r.terminated || r.truncated {
                println!(
                    "  ended after {} steps (terminated={}, truncated={}), total_reward={:.3}, {:?}",
                    env.timestep(),
                    r.terminated,
                    r.truncated,
                    total_reward,
                    start.elapsed(),
                );
                break;
            }
            last = r.observation;
        }
    }

    env.close();
    println!("\nDone.");
}
