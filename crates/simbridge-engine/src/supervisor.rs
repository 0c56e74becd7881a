//! Engine run lifecycle: one owned engine state and one engine thread per
//! episode.
//!
//! [`RunSupervisor::reset`] prepares a fresh engine state with the callback
//! adapter registered; [`RunSupervisor::run`] moves it onto a named thread.
//! [`RunSupervisor::stop`] drops the controller ends of the handoff
//! channels, which releases an engine thread blocked on a put, and then
//! joins it. There is no forced interruption: an engine stuck inside its
//! own loop keeps `stop` waiting until the run returns.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, warn};

use simbridge_core::{EngineApi, EngineState};

use crate::chain::{CallbackChain, EpisodeFault};
use crate::config::{ConfigError, EnvConfig};
use crate::engine_thread::{run_engine, BridgeCallbacks, EpisodeRunState, EpisodeShared};
use crate::handles::HandleTable;
use crate::handoff::{self, ControllerSide};

/// Owns the engine state and engine thread of the current episode.
pub struct RunSupervisor {
    api: Arc<dyn EngineApi>,
    config: EnvConfig,
    state: Option<Box<dyn EngineState>>,
    shared: Arc<EpisodeShared>,
    thread: Option<JoinHandle<()>>,
    controller: Option<ControllerSide>,
    episode: u64,
    episode_dir: Option<PathBuf>,
}

impl RunSupervisor {
    /// Validate `config` and create an idle supervisor.
    pub fn new(api: Arc<dyn EngineApi>, config: EnvConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            api,
            config,
            state: None,
            shared: Arc::new(EpisodeShared::new(0)),
            thread: None,
            controller: None,
            episode: 0,
            episode_dir: None,
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Current episode number (0 before the first reset).
    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// Output directory of the current episode.
    pub fn episode_dir(&self) -> Option<&Path> {
        self.episode_dir.as_deref()
    }

    /// Prepare a new episode.
    ///
    /// Stops any previous run, creates the episode output directory and a
    /// fresh engine state, and registers a callback adapter wired to new
    /// handoff channels. The engine does not start until [`run`](Self::run).
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        self.stop();

        let episode = self.episode + 1;
        let dir = self.config.episode_output_dir(episode);
        if dir.exists() {
            warn!(path = %dir.display(), "episode output directory already exists");
        }
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::OutputDir {
            path: dir.clone(),
            reason: e.to_string(),
        })?;

        let mut state = self.api.new_state()?;
        state.set_console_output(self.config.console_output);

        let (engine_side, controller) = handoff::channels();
        let shared = Arc::new(EpisodeShared::new(episode));
        state.register_callbacks(Box::new(BridgeCallbacks::new(
            CallbackChain::new(self.config.handles.clone()),
            engine_side,
            Arc::clone(&shared),
            dir.clone(),
        )));

        info!(episode, path = %dir.display(), "episode prepared");
        self.episode = episode;
        self.episode_dir = Some(dir);
        self.state = Some(state);
        self.shared = shared;
        self.controller = Some(controller);
        Ok(())
    }

    /// Start the prepared engine state on its own thread.
    ///
    /// A second call while the engine is running, or a call with nothing
    /// prepared, logs a warning and does nothing.
    pub fn run(&mut self) -> Result<(), ConfigError> {
        if self.shared.is_running() {
            warn!(episode = self.episode, "engine already running; run ignored");
            return Ok(());
        }
        let (Some(state), Some(dir)) = (self.state.take(), self.episode_dir.as_deref()) else {
            warn!(episode = self.episode, "no prepared engine state; run ignored");
            return Ok(());
        };

        let args = self.config.engine_args(dir);
        let shared = Arc::clone(&self.shared);
        self.shared.set_running(true);
        let spawned = thread::Builder::new()
            .name(format!("simbridge-{}-ep{}", self.config.name, self.episode))
            .spawn(move || run_engine(state, args, shared));
        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.set_running(false);
                Err(ConfigError::ThreadSpawnFailed {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// End the current episode.
    ///
    /// Drops the controller channel ends, joins the engine thread, disposes
    /// a prepared-but-never-run state, and clears readiness. Idempotent.
    pub fn stop(&mut self) {
        self.controller = None;
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!(episode = self.episode, "engine thread panicked");
                self.shared.record_fault(EpisodeFault::EnginePanicked);
            }
            self.shared.mark_complete();
        }
        if let Some(mut state) = self.state.take() {
            state.clear_callbacks();
        }
        self.shared.clear_ready();
    }

    /// Whether the last run returned a positive exit status.
    pub fn failed(&self) -> bool {
        self.shared.exit_status().is_some_and(|s| s > 0)
    }

    /// Whether the engine thread is live.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Whether the engine thread has exited.
    pub fn is_complete(&self) -> bool {
        self.shared.is_complete()
    }

    /// Exit status of the last run, once it has returned.
    pub fn exit_status(&self) -> Option<i32> {
        self.shared.exit_status()
    }

    /// Fatal fault recorded for the current episode.
    pub fn fault(&self) -> Option<&EpisodeFault> {
        self.shared.fault()
    }

    /// Resolved handles of the current episode, once published.
    pub fn handles(&self) -> Option<&HandleTable> {
        self.shared.handles()
    }

    /// Snapshot of the current episode's run state.
    pub fn run_state(&self) -> EpisodeRunState {
        self.shared.snapshot()
    }

    /// Controller ends of the handoff channels, until the next stop.
    pub fn handoff(&self) -> Option<&ControllerSide> {
        self.controller.as_ref()
    }

    /// Wait up to `timeout` for the engine to finish warming up.
    pub fn wait_for_warmup(&self, timeout: Duration) -> bool {
        if self.shared.snapshot().warmup_done {
            return true;
        }
        match &self.controller {
            Some(ctrl) => ctrl.wait_warmup(timeout).is_ok(),
            None => false,
        }
    }
}

impl Drop for RunSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}
