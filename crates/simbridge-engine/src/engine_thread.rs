//! Engine-thread side of an episode: shared run state, the callback
//! adapter registered with the engine, and the thread body.
//!
//! The engine thread owns its [`EngineState`] and the [`BridgeCallbacks`]
//! registered on it (both moved in at spawn). The controller only sees
//! [`EpisodeShared`]: atomics for flags that change during a run and
//! write-once cells for values that are set at most once per episode.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::{debug, error, info, warn};

use simbridge_core::{CallingPoint, DataExchange, EngineState, RuntimeCallbacks};

use crate::chain::{CallbackChain, EpisodeFault, ReadinessEvents};
use crate::readiness::Readiness;
use crate::handles::HandleTable;
use crate::handoff::EngineSide;

/// File the engine's available-data listing is written to.
pub const DATA_AVAILABLE_FILE: &str = "data_available.txt";

// ── EpisodeRunState ──────────────────────────────────────────────

/// Point-in-time snapshot of an episode's run state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EpisodeRunState {
    /// Episode number (1-based; 0 before the first reset).
    pub episode: u64,
    /// Handles resolved and warm-up over.
    pub ready: bool,
    /// The warm-up-complete callback has fired.
    pub warmup_done: bool,
    /// The engine thread is live.
    pub running: bool,
    /// The engine thread has exited.
    pub complete: bool,
    /// Engine-side timestep index.
    pub timestep: u64,
    /// Engine exit status, once the run has returned.
    pub exit_status: Option<i32>,
    /// A fatal fault has been recorded.
    pub faulted: bool,
}

// ── EpisodeShared ────────────────────────────────────────────────

/// State shared between the engine thread and the controller.
#[derive(Debug, Default)]
pub struct EpisodeShared {
    episode: u64,
    running: AtomicBool,
    complete: AtomicBool,
    ready: AtomicBool,
    warmup_done: AtomicBool,
    timestep: AtomicU64,
    exit_status: OnceLock<i32>,
    fault: OnceLock<EpisodeFault>,
    handles: OnceLock<HandleTable>,
}

impl EpisodeShared {
    /// Fresh state for episode `episode`.
    pub fn new(episode: u64) -> Self {
        Self {
            episode,
            ..Self::default()
        }
    }

    /// Episode number.
    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// Whether the engine thread is live.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the engine thread has exited.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Whether data exchange is currently permitted.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Engine exit status, once recorded.
    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status.get().copied()
    }

    /// The fatal fault, once recorded.
    pub fn fault(&self) -> Option<&EpisodeFault> {
        self.fault.get()
    }

    /// The resolved handle table, once published.
    pub fn handles(&self) -> Option<&HandleTable> {
        self.handles.get()
    }

    /// Snapshot every flag.
    pub fn snapshot(&self) -> EpisodeRunState {
        EpisodeRunState {
            episode: self.episode,
            ready: self.is_ready(),
            warmup_done: self.warmup_done.load(Ordering::Acquire),
            running: self.is_running(),
            complete: self.is_complete(),
            timestep: self.timestep.load(Ordering::Acquire),
            exit_status: self.exit_status(),
            faulted: self.fault.get().is_some(),
        }
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub(crate) fn clear_ready(&self) {
        self.ready.store(false, Ordering::Release);
    }

    /// Record a fault; the first one wins.
    pub(crate) fn record_fault(&self, fault: EpisodeFault) {
        let _ = self.fault.set(fault);
    }

    /// Mark the engine thread as exited.
    pub(crate) fn mark_complete(&self) {
        self.ready.store(false, Ordering::Release);
        self.complete.store(true, Ordering::Release);
        self.running.store(false, Ordering::Release);
    }
}

// ── BridgeCallbacks ──────────────────────────────────────────────

/// Callback set registered with the engine for one episode.
///
/// Runs [`CallbackChain`] at each calling point and moves its output
/// through the handoff channels. After a fatal fault or a controller
/// disconnect it detaches: the chain moves to [`Readiness::Complete`], the
/// engine side of the channels is dropped, and every later callback
/// returns immediately. Dropping the adapter detaches it as well.
pub struct BridgeCallbacks {
    chain: CallbackChain,
    handoff: Option<EngineSide>,
    shared: Arc<EpisodeShared>,
    episode_dir: PathBuf,
    last_progress: Option<u8>,
}

impl BridgeCallbacks {
    /// Adapter for one episode.
    pub fn new(
        chain: CallbackChain,
        handoff: EngineSide,
        shared: Arc<EpisodeShared>,
        episode_dir: PathBuf,
    ) -> Self {
        Self {
            chain,
            handoff: Some(handoff),
            shared,
            episode_dir,
            last_progress: None,
        }
    }

    /// Whether the adapter has detached from the controller.
    pub fn is_detached(&self) -> bool {
        self.handoff.is_none()
    }

    /// Readiness of the underlying chain.
    pub fn readiness(&self) -> Readiness {
        self.chain.readiness()
    }

    fn detach(&mut self) {
        self.chain.complete();
        self.shared.clear_ready();
        self.handoff = None;
    }

    fn fault(&mut self, fault: EpisodeFault) {
        error!(
            episode = self.shared.episode,
            timestep = self.chain.timestep(),
            %fault,
            "episode fault; detaching from engine"
        );
        self.shared.record_fault(fault);
        self.detach();
    }

    fn disconnected(&mut self) {
        debug!(
            episode = self.shared.episode,
            timestep = self.chain.timestep(),
            "controller gone; detaching from engine"
        );
        self.detach();
    }

    fn on_events(&mut self, events: ReadinessEvents, exchange: &mut dyn DataExchange) {
        if events.resolved {
            if let Some(table) = self.chain.table() {
                debug!(
                    episode = self.shared.episode,
                    handles = table.len(),
                    "handles resolved"
                );
                let _ = self.shared.handles.set(table.clone());
            }
            self.write_available_data(exchange);
        }
        if events.became_ready {
            self.shared.ready.store(true, Ordering::Release);
            info!(episode = self.shared.episode, "engine ready for data exchange");
        }
    }

    fn write_available_data(&self, exchange: &mut dyn DataExchange) {
        let path = self.episode_dir.join(DATA_AVAILABLE_FILE);
        if let Err(err) = std::fs::write(&path, exchange.available_data_csv()) {
            warn!(path = %path.display(), %err, "could not write available data listing");
        }
    }

    fn after_predictor(&mut self, exchange: &mut dyn DataExchange) {
        let Some(handoff) = self.handoff.as_ref() else {
            return;
        };
        let mut disconnected = false;
        let result = self.chain.after_predictor(exchange, || {
            match handoff.try_take_action() {
                Ok(action) => action,
                Err(_) => {
                    disconnected = true;
                    None
                }
            }
        });
        match result {
            Ok(events) => {
                self.shared
                    .timestep
                    .store(self.chain.timestep(), Ordering::Release);
                self.on_events(events, exchange);
                if disconnected {
                    self.disconnected();
                }
            }
            Err(fault) => self.fault(fault),
        }
    }

    fn end_of_timestep(&mut self, exchange: &mut dyn DataExchange) {
        if self.handoff.is_none() {
            return;
        }
        let pair = match self.chain.end_of_timestep(exchange) {
            Ok((events, pair)) => {
                self.on_events(events, exchange);
                pair
            }
            Err(fault) => {
                self.fault(fault);
                return;
            }
        };
        let (Some((observation, info)), Some(handoff)) = (pair, self.handoff.as_ref()) else {
            return;
        };
        if handoff.deliver(observation, info).is_err() {
            self.disconnected();
        }
    }
}

impl RuntimeCallbacks for BridgeCallbacks {
    fn on_calling_point(&mut self, point: CallingPoint, exchange: &mut dyn DataExchange) {
        if self.handoff.is_none() {
            return;
        }
        match point {
            CallingPoint::AfterNewEnvironmentWarmupComplete => {
                if self.chain.warmup_complete() {
                    self.shared.warmup_done.store(true, Ordering::Release);
                    if let Some(handoff) = &self.handoff {
                        handoff.signal_warmup();
                    }
                    debug!(episode = self.shared.episode, "warm-up complete");
                }
            }
            CallingPoint::AfterPredictorAfterHvacManagers => self.after_predictor(exchange),
            CallingPoint::EndZoneTimestepAfterZoneReporting => self.end_of_timestep(exchange),
            _ => {}
        }
    }

    fn on_progress(&mut self, percent: u8) {
        if !self.chain.is_ready() || self.last_progress == Some(percent) {
            return;
        }
        self.last_progress = Some(percent);
        debug!(episode = self.shared.episode, percent, "simulation progress");
    }
}

impl Drop for BridgeCallbacks {
    fn drop(&mut self) {
        if !self.is_detached() {
            debug!(
                episode = self.shared.episode,
                timestep = self.chain.timestep(),
                "callbacks released"
            );
        }
        self.detach();
    }
}

// ── Thread body ──────────────────────────────────────────────────

/// Run one engine state to completion on the current thread.
///
/// Records the exit status, clears the callbacks (dropping the engine
/// side of the handoff), disposes the state, and marks the episode
/// complete. A panic inside the run is recorded as
/// [`EpisodeFault::EnginePanicked`]; the episode is marked complete either
/// way.
pub(crate) fn run_engine(
    mut state: Box<dyn EngineState>,
    args: Vec<String>,
    shared: Arc<EpisodeShared>,
) {
    let episode = shared.episode;
    info!(episode, ?args, "engine run starting");
    match panic::catch_unwind(AssertUnwindSafe(|| state.run(&args))) {
        Ok(status) => {
            let _ = shared.exit_status.set(status);
            if status > 0 {
                warn!(episode, exit_status = status, "engine run failed");
            } else {
                info!(episode, exit_status = status, "engine run finished");
            }
        }
        Err(_) => {
            error!(episode, "engine run panicked");
            shared.record_fault(EpisodeFault::EnginePanicked);
        }
    }
    state.clear_callbacks();
    drop(state);
    shared.mark_complete();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use simbridge_core::{Action, HandleSpec};
    use simbridge_test_utils::{MockExchange, MockModel, TempInputs};

    use crate::handoff::{self, ControllerSide, HandoffError};

    const WAIT: Duration = Duration::from_secs(2);

    fn model() -> MockModel {
        MockModel::new()
            .with_variable("Zone Mean Air Temperature", "Zone 1")
            .with_actuator("Schedule:Constant", "Schedule Value", "Cooling SP")
    }

    fn specs() -> Vec<HandleSpec> {
        vec![
            HandleSpec::variable("zone_t", "Zone Mean Air Temperature", "Zone 1"),
            HandleSpec::actuator("cool_sp", "Schedule:Constant", "Schedule Value", "Cooling SP"),
        ]
    }

    fn adapter(inputs: &TempInputs) -> (BridgeCallbacks, ControllerSide, Arc<EpisodeShared>) {
        let (engine, ctrl) = handoff::channels();
        let shared = Arc::new(EpisodeShared::new(1));
        let cb = BridgeCallbacks::new(
            CallbackChain::new(specs()),
            engine,
            Arc::clone(&shared),
            inputs.output_dir(),
        );
        (cb, ctrl, shared)
    }

    fn timestep(cb: &mut BridgeCallbacks, ex: &mut MockExchange) {
        for point in CallingPoint::TIMESTEP_ORDER {
            cb.on_calling_point(point, ex);
        }
    }

    #[test]
    fn first_ready_timestep_publishes_handles_and_pair() {
        let inputs = TempInputs::new("adapter-ready");
        let (mut cb, ctrl, shared) = adapter(&inputs);
        let mut ex = MockExchange::new(model());

        timestep(&mut cb, &mut ex);

        assert!(shared.is_ready());
        assert_eq!(shared.handles().map(HandleTable::len), Some(2));
        assert!(inputs.output_dir().join(DATA_AVAILABLE_FILE).is_file());
        let info = ctrl.recv_info(WAIT).unwrap();
        assert_eq!(info.sim_timestep, 1);
        assert!(ctrl.recv_observation(WAIT).unwrap().get("zone_t").is_some());
    }

    #[test]
    fn warmup_signal_reaches_controller_once() {
        let inputs = TempInputs::new("adapter-warmup");
        let (mut cb, ctrl, shared) = adapter(&inputs);
        let mut ex = MockExchange::new(model());
        cb.on_calling_point(CallingPoint::AfterNewEnvironmentWarmupComplete, &mut ex);
        cb.on_calling_point(CallingPoint::AfterNewEnvironmentWarmupComplete, &mut ex);
        assert!(shared.snapshot().warmup_done);
        assert_eq!(ctrl.wait_warmup(WAIT), Ok(()));
        assert!(!ctrl.warmup_signalled());
    }

    #[test]
    fn queued_action_is_applied() {
        let inputs = TempInputs::new("adapter-action");
        let (mut cb, ctrl, _shared) = adapter(&inputs);
        let mut ex = MockExchange::new(model());
        ctrl.send_action(Action::from([23.5]), WAIT).unwrap();
        timestep(&mut cb, &mut ex);
        assert_eq!(ex.applied().len(), 1);
        assert_eq!(ex.applied()[0].1, 23.5);
        let info = ctrl.recv_info(WAIT).unwrap();
        assert_eq!(info.applied_action, Some(Action::from([23.5])));
    }

    #[test]
    fn unresolved_handle_records_fault_and_detaches() {
        let inputs = TempInputs::new("adapter-fault");
        let (engine, ctrl) = handoff::channels();
        let shared = Arc::new(EpisodeShared::new(1));
        let mut cb = BridgeCallbacks::new(
            CallbackChain::new(vec![HandleSpec::meter("gas", "NaturalGas:Facility")]),
            engine,
            Arc::clone(&shared),
            inputs.output_dir(),
        );
        let mut ex = MockExchange::new(model());
        timestep(&mut cb, &mut ex);

        assert!(cb.is_detached());
        assert_eq!(cb.readiness(), Readiness::Complete);
        assert!(matches!(shared.fault(), Some(EpisodeFault::Handle(_))));
        assert!(!shared.is_ready());
        assert_eq!(ctrl.recv_pair_blocking(), Err(HandoffError::Disconnected));

        let reads = ex.value_reads();
        timestep(&mut cb, &mut ex);
        assert_eq!(ex.value_reads(), reads);
    }

    #[test]
    fn controller_drop_detaches_silently() {
        let inputs = TempInputs::new("adapter-drop");
        let (mut cb, ctrl, shared) = adapter(&inputs);
        let mut ex = MockExchange::new(model());
        drop(ctrl);
        timestep(&mut cb, &mut ex);
        assert!(cb.is_detached());
        assert_eq!(cb.readiness(), Readiness::Complete);
        assert!(shared.fault().is_none());
        assert!(!shared.is_ready());

        let reads = ex.value_reads();
        timestep(&mut cb, &mut ex);
        assert_eq!(ex.value_reads(), reads);
    }

    #[test]
    fn dropping_the_adapter_releases_the_controller() {
        let inputs = TempInputs::new("adapter-release");
        let (mut cb, ctrl, shared) = adapter(&inputs);
        let mut ex = MockExchange::new(model());
        timestep(&mut cb, &mut ex);
        assert!(shared.is_ready());
        ctrl.recv_pair_blocking().unwrap();

        drop(cb);
        assert!(!shared.is_ready());
        assert_eq!(ctrl.recv_pair_blocking(), Err(HandoffError::Disconnected));
    }

    struct PanickingState;

    impl EngineState for PanickingState {
        fn set_console_output(&mut self, _: bool) {}
        fn register_callbacks(&mut self, _: Box<dyn RuntimeCallbacks>) {}
        fn clear_callbacks(&mut self) {}
        fn run(&mut self, _: &[String]) -> i32 {
            panic!("engine blew up");
        }
    }

    #[test]
    fn panicking_run_is_recorded_and_completes() {
        let shared = Arc::new(EpisodeShared::new(3));
        shared.set_running(true);
        run_engine(Box::new(PanickingState), Vec::new(), Arc::clone(&shared));

        let state = shared.snapshot();
        assert!(state.complete);
        assert!(!state.running);
        assert!(state.faulted);
        assert_eq!(state.exit_status, None);
        assert_eq!(shared.fault(), Some(&EpisodeFault::EnginePanicked));
    }

    #[test]
    fn warmup_timesteps_produce_nothing() {
        let inputs = TempInputs::new("adapter-warming");
        let (mut cb, ctrl, shared) = adapter(&inputs);
        let mut ex = MockExchange::new(model());
        ex.set_warmup(true);
        timestep(&mut cb, &mut ex);
        cb.on_progress(10);
        assert!(!shared.is_ready());
        assert_eq!(ctrl.recv_observation(Duration::from_millis(20)), Err(HandoffError::Timeout));
        assert_eq!(ex.value_reads(), 0);
    }
}
