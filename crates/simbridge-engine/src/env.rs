//! Synchronous `reset`/`step` control loop over the engine thread.
//!
//! # Episode state machine
//!
//! ```text
//! Idle ──reset──▶ Resetting ──first pair──▶ Stepping ──engine exited──▶ Terminated
//!                     │                        │                           ▲
//!                     └─fault / exit: Err      └─handoff failed──▶ Truncated ┘
//! ```
//!
//! A handoff that times out or finds the engine side gone truncates the
//! step. Completion of the engine run is only observed at the start of a
//! step, which then reports `Terminated`, also from `Truncated`. Steps in
//! a terminal phase return the cached observation and info with the
//! matching flag set and never touch the channels; their reward is the
//! reward function evaluated on the cached observation.
//!
//! A fault or engine failure is returned by every `step` after it is
//! recorded. One that no `step` returned is returned once by the next
//! `reset`, and the reset after that starts a fresh episode.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use simbridge_core::{Action, EngineApi, Info, Observation, RewardFn};

use crate::chain::EpisodeFault;
use crate::config::{ConfigError, EnvConfig};
use crate::engine_thread::EpisodeRunState;
use crate::handles::HandleTable;
use crate::handoff::HandoffError;
use crate::supervisor::RunSupervisor;

// ── EnvError ─────────────────────────────────────────────────────

/// Errors returned by [`BridgeEnv::reset`] and [`BridgeEnv::step`].
#[derive(Debug, PartialEq)]
pub enum EnvError {
    /// Configuration or engine setup failed.
    Config(ConfigError),
    /// The episode hit a fatal fault on the engine thread.
    Fault(EpisodeFault),
    /// The engine run returned a positive exit status.
    EngineFailed {
        /// The engine's exit status.
        exit_status: i32,
    },
    /// The engine run ended before producing its first observation.
    EndedBeforeReady,
    /// `step` was called before a successful `reset`.
    NotReset,
    /// The action length does not match the declared actuators.
    ActionArity {
        /// Number of declared actuators.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Fault(e) => write!(f, "episode fault: {e}"),
            Self::EngineFailed { exit_status } => {
                write!(f, "engine run failed with exit status {exit_status}")
            }
            Self::EndedBeforeReady => write!(f, "engine run ended before the first observation"),
            Self::NotReset => write!(f, "step called before a successful reset"),
            Self::ActionArity { expected, got } => {
                write!(f, "action has {got} values, expected {expected}")
            }
        }
    }
}

impl Error for EnvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Fault(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for EnvError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<EpisodeFault> for EnvError {
    fn from(e: EpisodeFault) -> Self {
        Self::Fault(e)
    }
}

// ── StepResult / EnvPhase ────────────────────────────────────────

/// Result of one [`BridgeEnv::step`].
#[derive(Clone, Debug, PartialEq)]
pub struct StepResult {
    /// Observation after the step (cached one on terminal results).
    pub observation: Observation,
    /// Reward for this step. On terminal results the reward function is
    /// evaluated again on the cached observation.
    pub reward: f64,
    /// The engine run has ended.
    pub terminated: bool,
    /// A handoff deadline elapsed.
    pub truncated: bool,
    /// Auxiliary data for this step.
    pub info: Info,
}

/// Position in the episode state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvPhase {
    /// No episode has been started, or the last reset failed.
    Idle,
    /// Waiting for the first observation of a new episode.
    Resetting,
    /// Exchanging one action/observation pair per step.
    Stepping,
    /// The engine run ended.
    Terminated,
    /// A handoff deadline elapsed.
    Truncated,
}

// ── BridgeEnv ────────────────────────────────────────────────────

/// RL-style environment driven by an engine running on its own thread.
pub struct BridgeEnv<R: RewardFn> {
    supervisor: RunSupervisor,
    reward_fn: R,
    phase: EnvPhase,
    timestep: u64,
    last_observation: Observation,
    last_info: Info,
    failure_reported: bool,
}

impl<R: RewardFn> BridgeEnv<R> {
    /// Validate `config` and create an idle environment.
    pub fn new(api: Arc<dyn EngineApi>, config: EnvConfig, reward_fn: R) -> Result<Self, EnvError> {
        Ok(Self {
            supervisor: RunSupervisor::new(api, config)?,
            reward_fn,
            phase: EnvPhase::Idle,
            timestep: 0,
            last_observation: Observation::new(),
            last_info: Info::default(),
            failure_reported: false,
        })
    }

    /// Start a new episode and block until its first observation.
    ///
    /// There is no deadline: an engine that never finishes warming up
    /// blocks here. Returns early with the episode's fault, the engine
    /// failure, or [`EnvError::EndedBeforeReady`] when the engine thread
    /// stops producing before the first pair. A fault or failure of the
    /// previous episode that was never returned is returned instead of
    /// starting a new episode.
    pub fn reset(&mut self) -> Result<(Observation, Info), EnvError> {
        if !self.failure_reported {
            if let Some(err) = self.recorded_failure() {
                self.failure_reported = true;
                return Err(err);
            }
        }

        self.phase = EnvPhase::Resetting;
        self.timestep = 0;
        if let Err(e) = self.supervisor.reset().and_then(|()| self.supervisor.run()) {
            self.phase = EnvPhase::Idle;
            return Err(e.into());
        }
        self.failure_reported = false;

        let received = match self.supervisor.handoff() {
            Some(ctrl) => ctrl.recv_pair_blocking(),
            None => Err(HandoffError::Disconnected),
        };
        match received {
            Ok((observation, mut info)) => {
                info.timestep = 0;
                self.last_observation = observation.clone();
                self.last_info = info.clone();
                self.phase = EnvPhase::Stepping;
                info!(
                    episode = self.supervisor.episode(),
                    sim_timestep = info.sim_timestep,
                    "episode started"
                );
                Ok((observation, info))
            }
            Err(_) => {
                self.phase = EnvPhase::Idle;
                Err(self.reset_failure())
            }
        }
    }

    /// Apply one action and wait for the next observation.
    pub fn step(&mut self, action: Action) -> Result<StepResult, EnvError> {
        if matches!(self.phase, EnvPhase::Idle | EnvPhase::Resetting) {
            return Err(EnvError::NotReset);
        }
        let expected = self.supervisor.config().action_len();
        if action.len() != expected {
            return Err(EnvError::ActionArity {
                expected,
                got: action.len(),
            });
        }
        if let Some(err) = self.recorded_failure() {
            self.failure_reported = true;
            return Err(err);
        }
        if self.phase != EnvPhase::Terminated && self.supervisor.is_complete() {
            self.end_episode(EnvPhase::Terminated);
        }
        if matches!(self.phase, EnvPhase::Terminated | EnvPhase::Truncated) {
            return Ok(self.terminal_result());
        }

        let timeout = self.supervisor.config().step_timeout;
        let exchanged = match self.supervisor.handoff() {
            Some(ctrl) => ctrl.send_action(action.clone(), timeout).and_then(|()| {
                let observation = ctrl.recv_observation(timeout)?;
                let info = ctrl.recv_info(timeout)?;
                Ok((observation, info))
            }),
            None => Err(HandoffError::Disconnected),
        };

        match exchanged {
            Ok((observation, mut info)) => {
                self.timestep += 1;
                let (reward, terms) = self.reward_fn.reward(&observation);
                info.timestep = self.timestep;
                info.action = Some(action);
                info.reward_terms = terms;
                self.last_observation = observation.clone();
                self.last_info = info.clone();
                Ok(StepResult {
                    observation,
                    reward,
                    terminated: false,
                    truncated: false,
                    info,
                })
            }
            Err(err) => {
                warn!(
                    episode = self.supervisor.episode(),
                    timestep = self.timestep,
                    %err,
                    "handoff failed; truncating episode"
                );
                self.end_episode(EnvPhase::Truncated);
                Ok(self.terminal_result())
            }
        }
    }

    /// Resolved handles of the current episode.
    pub fn handles(&self) -> Option<&HandleTable> {
        self.supervisor.handles()
    }

    /// Whether the engine thread is live.
    pub fn is_running(&self) -> bool {
        self.supervisor.is_running()
    }

    /// Current episode number.
    pub fn episode(&self) -> u64 {
        self.supervisor.episode()
    }

    /// Controller-side step count within the episode.
    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    /// Current phase.
    pub fn phase(&self) -> EnvPhase {
        self.phase
    }

    /// Snapshot of the engine thread's run state.
    pub fn run_state(&self) -> EpisodeRunState {
        self.supervisor.run_state()
    }

    /// The underlying supervisor.
    pub fn supervisor(&self) -> &RunSupervisor {
        &self.supervisor
    }

    /// Stop the engine thread; the environment needs a new `reset`.
    pub fn close(&mut self) {
        self.supervisor.stop();
        self.phase = EnvPhase::Idle;
    }

    /// The episode's fault, else its engine failure.
    fn recorded_failure(&self) -> Option<EnvError> {
        if let Some(fault) = self.supervisor.fault() {
            return Some(EnvError::Fault(fault.clone()));
        }
        self.supervisor.failed().then(|| self.engine_failed())
    }

    fn engine_failed(&self) -> EnvError {
        EnvError::EngineFailed {
            exit_status: self.supervisor.exit_status().unwrap_or_default(),
        }
    }

    fn end_episode(&mut self, phase: EnvPhase) {
        self.phase = phase;
        debug!(
            episode = self.supervisor.episode(),
            timestep = self.timestep,
            ?phase,
            "episode ended"
        );
    }

    fn terminal_result(&mut self) -> StepResult {
        let (reward, _) = self.reward_fn.reward(&self.last_observation);
        StepResult {
            observation: self.last_observation.clone(),
            reward,
            terminated: self.phase == EnvPhase::Terminated,
            truncated: self.phase == EnvPhase::Truncated,
            info: self.last_info.clone(),
        }
    }

    /// Classify why the first pair never arrived.
    fn reset_failure(&mut self) -> EnvError {
        if self.supervisor.fault().is_none() {
            self.supervisor.stop();
        }
        match self.recorded_failure() {
            Some(err) => {
                self.failure_reported = true;
                err
            }
            None => EnvError::EndedBeforeReady,
        }
    }
}
