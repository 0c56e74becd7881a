//! Scripted engine: a deterministic stand-in for the simulation library.
//!
//! [`ScriptedEngine`] hands out [`ScriptedState`]s whose `run` walks the
//! registered callbacks through a warm-up phase and a fixed number of
//! timesteps on the calling thread, in the real calling-point order.
//! Everything observable about those runs lands in a shared [`EngineLog`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use simbridge_core::{
    CallingPoint, EngineApi, EngineError, EngineState, Handle, RuntimeCallbacks, SimClock,
};

use crate::{MockExchange, MockModel};

// ── Script ───────────────────────────────────────────────────────

/// What a scripted run does.
#[derive(Clone, Debug)]
pub struct Script {
    /// Timesteps (counting warm-up) before the exchange surface is ready.
    pub data_ready_after: u64,
    /// Warm-up timesteps run with the warm-up flag raised.
    pub warmup_timesteps: u64,
    /// Timesteps after warm-up.
    pub timesteps: u64,
    /// Zone timesteps per simulated hour.
    pub timesteps_per_hour: u32,
    /// Status returned from `run`.
    pub exit_status: i32,
    /// Sleep for the given duration before this post-warm-up timestep.
    pub stall_at: Option<(u64, Duration)>,
    /// Panic before this post-warm-up timestep.
    pub panic_at: Option<u64>,
    /// Sleep after the last timestep before `run` returns.
    pub exit_delay: Option<Duration>,
    /// Make `new_state` fail.
    pub fail_new_state: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            data_ready_after: 0,
            warmup_timesteps: 2,
            timesteps: 8,
            timesteps_per_hour: 4,
            exit_status: 0,
            stall_at: None,
            panic_at: None,
            exit_delay: None,
            fail_new_state: false,
        }
    }
}

impl Script {
    pub fn with_timesteps(mut self, n: u64) -> Self {
        self.timesteps = n;
        self
    }

    pub fn with_warmup_timesteps(mut self, n: u64) -> Self {
        self.warmup_timesteps = n;
        self
    }

    pub fn with_data_ready_after(mut self, n: u64) -> Self {
        self.data_ready_after = n;
        self
    }

    pub fn with_exit_status(mut self, status: i32) -> Self {
        self.exit_status = status;
        self
    }

    pub fn with_stall_at(mut self, timestep: u64, duration: Duration) -> Self {
        self.stall_at = Some((timestep, duration));
        self
    }

    pub fn with_panic_at(mut self, timestep: u64) -> Self {
        self.panic_at = Some(timestep);
        self
    }

    pub fn with_exit_delay(mut self, delay: Duration) -> Self {
        self.exit_delay = Some(delay);
        self
    }

    pub fn failing_new_state(mut self) -> Self {
        self.fail_new_state = true;
        self
    }
}

// ── EngineLog ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LogInner {
    states_created: usize,
    console_output: Vec<bool>,
    runs: Vec<Vec<String>>,
    applied: Vec<Vec<(Handle, f64)>>,
    callbacks_cleared: usize,
    premature_reads: usize,
    premature_resolves: usize,
    timesteps_run: Vec<u64>,
}

/// Shared record of everything scripted states did.
#[derive(Clone, Debug, Default)]
pub struct EngineLog {
    inner: Arc<Mutex<LogInner>>,
}

impl EngineLog {
    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Engine states handed out.
    pub fn states_created(&self) -> usize {
        self.lock().states_created
    }

    /// Console-output settings, one per `set_console_output` call.
    pub fn console_output(&self) -> Vec<bool> {
        self.lock().console_output.clone()
    }

    /// Arguments of every `run`, in order.
    pub fn runs(&self) -> Vec<Vec<String>> {
        self.lock().runs.clone()
    }

    /// Actuator writes per finished run.
    pub fn applied(&self) -> Vec<Vec<(Handle, f64)>> {
        self.lock().applied.clone()
    }

    /// `clear_callbacks` calls across all states.
    pub fn callbacks_cleared(&self) -> usize {
        self.lock().callbacks_cleared
    }

    /// Value reads made before the exchange was ready, across all runs.
    pub fn premature_reads(&self) -> usize {
        self.lock().premature_reads
    }

    /// Handle lookups made before the exchange was ready, across all runs.
    pub fn premature_resolves(&self) -> usize {
        self.lock().premature_resolves
    }

    /// Post-warm-up timesteps each finished run executed.
    pub fn timesteps_run(&self) -> Vec<u64> {
        self.lock().timesteps_run.clone()
    }
}

// ── ScriptedEngine ───────────────────────────────────────────────

/// [`EngineApi`] producing [`ScriptedState`]s.
#[derive(Clone, Debug)]
pub struct ScriptedEngine {
    script: Script,
    model: MockModel,
    log: EngineLog,
}

impl ScriptedEngine {
    /// Engine over [`MockModel::office`].
    pub fn new(script: Script) -> Self {
        Self::with_model(script, MockModel::office())
    }

    pub fn with_model(script: Script, model: MockModel) -> Self {
        Self {
            script,
            model,
            log: EngineLog::default(),
        }
    }

    pub fn log(&self) -> &EngineLog {
        &self.log
    }
}

impl EngineApi for ScriptedEngine {
    fn new_state(&self) -> Result<Box<dyn EngineState>, EngineError> {
        if self.script.fail_new_state {
            return Err(EngineError::StateCreation {
                reason: "scripted failure".into(),
            });
        }
        self.log.lock().states_created += 1;
        Ok(Box::new(ScriptedState {
            script: self.script.clone(),
            model: self.model.clone(),
            log: self.log.clone(),
            callbacks: None,
        }))
    }
}

// ── ScriptedState ────────────────────────────────────────────────

/// One scripted engine instance.
pub struct ScriptedState {
    script: Script,
    model: MockModel,
    log: EngineLog,
    callbacks: Option<Box<dyn RuntimeCallbacks>>,
}

impl ScriptedState {
    fn clock(&self, step: u64) -> SimClock {
        let per_hour = self.script.timesteps_per_hour.max(1);
        let zone_step = (step % u64::from(per_hour)) as u32 + 1;
        let hours = step / u64::from(per_hour);
        let day = hours / 24;
        let hour = (hours % 24) as u32;
        SimClock {
            year: 2024,
            month: 1 + (day / 31 % 12) as u32,
            day_of_month: 1 + (day % 31) as u32,
            day_of_year: 1 + (day % 365) as u32,
            day_of_week: 1 + (day % 7) as u32,
            hour,
            minutes: zone_step * (60 / per_hour),
            current_time: f64::from(hour) + f64::from(zone_step) / f64::from(per_hour),
            current_sim_time: (step + 1) as f64 / f64::from(per_hour),
            num_time_steps_in_hour: per_hour,
            zone_time_step_number: zone_step,
        }
    }

    fn timestep(cb: &mut dyn RuntimeCallbacks, ex: &mut MockExchange) {
        for point in CallingPoint::TIMESTEP_ORDER {
            cb.on_calling_point(point, ex);
        }
    }
}

impl EngineState for ScriptedState {
    fn set_console_output(&mut self, enabled: bool) {
        self.log.lock().console_output.push(enabled);
    }

    fn register_callbacks(&mut self, callbacks: Box<dyn RuntimeCallbacks>) {
        self.callbacks = Some(callbacks);
    }

    fn clear_callbacks(&mut self) {
        self.callbacks = None;
        self.log.lock().callbacks_cleared += 1;
    }

    fn run(&mut self, args: &[String]) -> i32 {
        self.log.lock().runs.push(args.to_vec());
        let Some(mut cb) = self.callbacks.take() else {
            return self.script.exit_status;
        };
        let mut ex = MockExchange::new(self.model.clone());
        let mut total = 0u64;

        cb.on_calling_point(CallingPoint::BeginNewEnvironment, &mut ex);
        ex.set_warmup(true);
        for _ in 0..self.script.warmup_timesteps {
            ex.set_data_ready(total >= self.script.data_ready_after);
            ex.set_tick(total);
            ex.set_clock(self.clock(0));
            Self::timestep(cb.as_mut(), &mut ex);
            total += 1;
        }
        ex.set_warmup(false);
        ex.set_data_ready(total >= self.script.data_ready_after);
        cb.on_calling_point(CallingPoint::AfterNewEnvironmentWarmupComplete, &mut ex);

        let mut ran = 0u64;
        for step in 0..self.script.timesteps {
            if let Some((at, pause)) = self.script.stall_at {
                if at == step {
                    thread::sleep(pause);
                }
            }
            if self.script.panic_at == Some(step) {
                panic!("scripted engine panic at timestep {step}");
            }
            ex.set_data_ready(total >= self.script.data_ready_after);
            ex.set_tick(total);
            ex.set_clock(self.clock(step));
            Self::timestep(cb.as_mut(), &mut ex);
            let percent = (step + 1) * 100 / self.script.timesteps;
            cb.on_progress(percent as u8);
            total += 1;
            ran += 1;
        }
        if let Some(delay) = self.script.exit_delay {
            thread::sleep(delay);
        }

        {
            let mut log = self.log.lock();
            log.applied.push(ex.applied());
            log.premature_reads += ex.premature_reads();
            log.premature_resolves += ex.premature_resolves();
            log.timesteps_run.push(ran);
        }
        self.callbacks = Some(cb);
        self.script.exit_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbridge_core::DataExchange;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        points: Arc<Mutex<Vec<CallingPoint>>>,
        progress: Arc<AtomicUsize>,
    }

    impl RuntimeCallbacks for Counting {
        fn on_calling_point(&mut self, point: CallingPoint, _: &mut dyn DataExchange) {
            self.points.lock().unwrap().push(point);
        }

        fn on_progress(&mut self, _: u8) {
            self.progress.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn run_visits_points_in_engine_order() {
        let engine = ScriptedEngine::new(Script::default().with_warmup_timesteps(1).with_timesteps(2));
        let points = Arc::new(Mutex::new(Vec::new()));
        let progress = Arc::new(AtomicUsize::new(0));
        let mut state = engine.new_state().unwrap();
        state.register_callbacks(Box::new(Counting {
            points: Arc::clone(&points),
            progress: Arc::clone(&progress),
        }));
        assert_eq!(state.run(&["-w".into()]), 0);

        let points = points.lock().unwrap();
        // begin-env + 3 timesteps of 6 points + warm-up-complete
        assert_eq!(points.len(), 1 + 3 * 6 + 1);
        assert_eq!(points[0], CallingPoint::BeginNewEnvironment);
        assert_eq!(points[7], CallingPoint::AfterNewEnvironmentWarmupComplete);
        assert_eq!(progress.load(Ordering::Relaxed), 2);
        assert_eq!(engine.log().timesteps_run(), vec![2]);
    }

    #[test]
    fn failing_creation_is_an_engine_error() {
        let engine = ScriptedEngine::new(Script::default().failing_new_state());
        assert!(engine.new_state().is_err());
        assert_eq!(engine.log().states_created(), 0);
    }

    #[test]
    fn clock_advances_by_timestep() {
        let engine = ScriptedEngine::new(Script::default());
        let state = ScriptedState {
            script: Script::default(),
            model: MockModel::office(),
            log: engine.log().clone(),
            callbacks: None,
        };
        let c = state.clock(4);
        assert_eq!(c.current_sim_time, 1.25);
        assert_eq!(c.hour, 1);
        assert_eq!(c.zone_time_step_number, 1);
        assert_eq!(c.num_time_steps_in_hour, 4);
    }
}
