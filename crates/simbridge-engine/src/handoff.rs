//! Single-slot handoff channels between the engine thread and the controller.
//!
//! Every channel has capacity 1: the engine cannot run ahead of the
//! controller by more than one value of each kind. Engine-side puts block
//! until the slot is drained or the controller side is dropped; dropping
//! [`ControllerSide`] is how a stop releases a blocked engine thread.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError,
};

use simbridge_core::{Action, Info, Observation};

/// Failure of a handoff operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandoffError {
    /// The deadline elapsed before the peer was ready.
    Timeout,
    /// The peer side has been dropped.
    Disconnected,
}

impl fmt::Display for HandoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "handoff timed out"),
            Self::Disconnected => write!(f, "handoff peer disconnected"),
        }
    }
}

impl Error for HandoffError {}

impl<T> From<SendTimeoutError<T>> for HandoffError {
    fn from(e: SendTimeoutError<T>) -> Self {
        match e {
            SendTimeoutError::Timeout(_) => Self::Timeout,
            SendTimeoutError::Disconnected(_) => Self::Disconnected,
        }
    }
}

impl From<RecvTimeoutError> for HandoffError {
    fn from(e: RecvTimeoutError) -> Self {
        match e {
            RecvTimeoutError::Timeout => Self::Timeout,
            RecvTimeoutError::Disconnected => Self::Disconnected,
        }
    }
}

/// Create a fresh set of channels for one episode.
pub fn channels() -> (EngineSide, ControllerSide) {
    let (obs_tx, obs_rx) = bounded(1);
    let (info_tx, info_rx) = bounded(1);
    let (act_tx, act_rx) = bounded(1);
    let (warmup_tx, warmup_rx) = bounded(1);
    (
        EngineSide {
            obs_tx,
            info_tx,
            act_rx,
            warmup_tx,
        },
        ControllerSide {
            obs_rx,
            info_rx,
            act_tx,
            warmup_rx,
        },
    )
}

/// Engine-thread ends: observation and info producers, action consumer.
#[derive(Debug)]
pub struct EngineSide {
    obs_tx: Sender<Observation>,
    info_tx: Sender<Info>,
    act_rx: Receiver<Action>,
    warmup_tx: Sender<()>,
}

impl EngineSide {
    /// Take the pending action without waiting.
    ///
    /// `Ok(None)` when the slot is empty; `Err(Disconnected)` once the
    /// controller side is gone.
    pub fn try_take_action(&self) -> Result<Option<Action>, HandoffError> {
        match self.act_rx.try_recv() {
            Ok(action) => Ok(Some(action)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(HandoffError::Disconnected),
        }
    }

    /// Publish one observation/info pair, blocking on each slot.
    pub fn deliver(&self, observation: Observation, info: Info) -> Result<(), HandoffError> {
        self.obs_tx
            .send(observation)
            .map_err(|_| HandoffError::Disconnected)?;
        self.info_tx
            .send(info)
            .map_err(|_| HandoffError::Disconnected)
    }

    /// Push the one-shot warm-up token. Never blocks.
    pub fn signal_warmup(&self) {
        let _ = self.warmup_tx.try_send(());
    }
}

/// Controller ends: observation and info consumers, action producer.
#[derive(Debug)]
pub struct ControllerSide {
    obs_rx: Receiver<Observation>,
    info_rx: Receiver<Info>,
    act_tx: Sender<Action>,
    warmup_rx: Receiver<()>,
}

impl ControllerSide {
    /// Queue an action, waiting at most `timeout` for the slot.
    pub fn send_action(&self, action: Action, timeout: Duration) -> Result<(), HandoffError> {
        Ok(self.act_tx.send_timeout(action, timeout)?)
    }

    /// Wait at most `timeout` for the next observation.
    pub fn recv_observation(&self, timeout: Duration) -> Result<Observation, HandoffError> {
        Ok(self.obs_rx.recv_timeout(timeout)?)
    }

    /// Wait at most `timeout` for the next info record.
    pub fn recv_info(&self, timeout: Duration) -> Result<Info, HandoffError> {
        Ok(self.info_rx.recv_timeout(timeout)?)
    }

    /// Wait for the next observation/info pair with no deadline.
    ///
    /// Returns `Err(Disconnected)` as soon as the engine side is dropped,
    /// which happens when the engine thread detaches or exits.
    pub fn recv_pair_blocking(&self) -> Result<(Observation, Info), HandoffError> {
        let observation = self
            .obs_rx
            .recv()
            .map_err(|_| HandoffError::Disconnected)?;
        let info = self
            .info_rx
            .recv()
            .map_err(|_| HandoffError::Disconnected)?;
        Ok((observation, info))
    }

    /// Wait at most `timeout` for the warm-up token.
    pub fn wait_warmup(&self, timeout: Duration) -> Result<(), HandoffError> {
        Ok(self.warmup_rx.recv_timeout(timeout)?)
    }

    /// Whether the warm-up token is already queued.
    pub fn warmup_signalled(&self) -> bool {
        !self.warmup_rx.is_empty()
    }
}
