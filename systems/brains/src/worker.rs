//! Brain hosted on a background thread behind a JSON message protocol.

use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use learninator_core::{Brain, BrainKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{BrainError, Learner};

const COMPLETE: &str = "complete";
/// Requests buffered between host and worker.
const REQUEST_CAPACITY: usize = 16;
/// Decisions allowed in flight before new `act` requests are dropped.
const MAX_PENDING_ACTS: usize = 2;

/// Message sent from the host to the worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "input", rename_all = "camelCase")]
pub enum Request {
    /// Replaces the worker's brain with a saved [`Learner`] state.
    Init(Value),
    /// Chooses an action for the state vector.
    Act(Vec<f32>),
    /// Credits a reward to the most recent action.
    Learn(f32),
    /// Forgets per-episode bookkeeping.
    ResetEpisode,
}

/// Acknowledgement sent from the worker to the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Command being acknowledged.
    pub cmd: String,
    /// Completion marker, always `"complete"` for well-formed replies.
    pub msg: String,
    /// Command result; the chosen action index for `act`.
    #[serde(default)]
    pub input: Value,
}

impl Response {
    fn complete(cmd: &str, input: Value) -> Self {
        Self {
            cmd: cmd.to_owned(),
            msg: COMPLETE.to_owned(),
            input,
        }
    }
}

/// Brain running on its own thread.
///
/// [`Brain::act`] never blocks: it posts the state to the worker and returns
/// the most recent action the worker has reported, so decisions trail the
/// state they were computed from by at least one tick. While the worker is
/// behind, new states are dropped instead of queued.
#[derive(Debug)]
pub struct WorkerBrain {
    kind: BrainKind,
    requests: Option<SyncSender<String>>,
    responses: Receiver<String>,
    handle: Option<JoinHandle<()>>,
    last_action: usize,
    pending: usize,
}

impl WorkerBrain {
    /// Moves `learner` onto a new worker thread.
    #[must_use]
    pub fn spawn(learner: Learner) -> Self {
        let kind = learner.kind();
        let (request_tx, request_rx) = mpsc::sync_channel(REQUEST_CAPACITY);
        let (response_tx, response_rx) = mpsc::channel();
        let handle = thread::spawn(move || serve(learner, request_rx, response_tx));
        debug!(%kind, "brain worker started");
        Self {
            kind,
            requests: Some(request_tx),
            responses: response_rx,
            handle: Some(handle),
            last_action: 0,
            pending: 0,
        }
    }

    /// Sends a saved brain state for the worker to adopt.
    pub fn init(&mut self, learner: &Learner) -> Result<(), BrainError> {
        let state = serde_json::to_value(learner).map_err(BrainError::Encode)?;
        self.kind = learner.kind();
        self.post(&Request::Init(state));
        Ok(())
    }

    /// Most recent action reported by the worker.
    #[must_use]
    pub const fn last_action(&self) -> usize {
        self.last_action
    }

    /// Waits up to `timeout` for every outstanding decision to arrive.
    ///
    /// Returns `true` when no decision is outstanding any more.
    pub fn sync(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.responses.recv_timeout(remaining) {
                Ok(raw) => self.receive(&raw),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    fn post(&mut self, request: &Request) {
        let Some(requests) = self.requests.as_ref() else {
            return;
        };
        let is_act = matches!(request, Request::Act(_));
        if is_act && self.pending >= MAX_PENDING_ACTS {
            debug!(kind = %self.kind, pending = self.pending, "brain worker busy; dropping state");
            return;
        }
        let json = match serde_json::to_string(request) {
            Ok(json) => json,
            Err(error) => {
                warn!(%error, "failed to encode worker request");
                return;
            }
        };
        let sent = if is_act {
            match requests.try_send(json) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    debug!(kind = %self.kind, "brain worker queue full; dropping state");
                    return;
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        } else {
            requests.send(json).is_ok()
        };
        if !sent {
            warn!(kind = %self.kind, "brain worker stopped; keeping last action");
            self.requests = None;
        } else if is_act {
            self.pending += 1;
        }
    }

    fn drain(&mut self) {
        while let Ok(raw) = self.responses.try_recv() {
            self.receive(&raw);
        }
    }

    fn receive(&mut self, raw: &str) {
        let response: Response = match serde_json::from_str(raw) {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "ignoring malformed worker response");
                return;
            }
        };
        if response.msg != COMPLETE {
            warn!(cmd = %response.cmd, msg = %response.msg, "ignoring unexpected worker response");
            return;
        }
        match response.cmd.as_str() {
            "act" => {
                self.pending = self.pending.saturating_sub(1);
                match response.input.as_u64().and_then(|a| usize::try_from(a).ok()) {
                    Some(action) => self.last_action = action,
                    None => warn!(input = %response.input, "worker reported no action"),
                }
            }
            "init" | "learn" | "resetEpisode" => {}
            other => warn!(cmd = other, "ignoring unknown worker response"),
        }
    }
}

impl Brain for WorkerBrain {
    fn kind(&self) -> BrainKind {
        self.kind
    }

    fn act(&mut self, state: &[f32]) -> usize {
        self.drain();
        self.post(&Request::Act(state.to_vec()));
        self.last_action
    }

    fn learn(&mut self, reward: f32) {
        self.post(&Request::Learn(reward));
        self.drain();
    }

    fn reset_episode(&mut self) {
        self.post(&Request::ResetEpisode);
    }
}

impl Drop for WorkerBrain {
    fn drop(&mut self) {
        drop(self.requests.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(kind = %self.kind, "brain worker panicked");
            }
        }
    }
}

fn serve(mut learner: Learner, requests: Receiver<String>, responses: Sender<String>) {
    for raw in requests {
        let request: Request = match serde_json::from_str(&raw) {
            Ok(request) => request,
            Err(error) => {
                warn!(%error, "ignoring unrecognised worker message");
                continue;
            }
        };
        let response = match request {
            Request::Init(state) => match Learner::from_value(state) {
                Ok(restored) => {
                    learner = restored;
                    Response::complete("init", Value::Null)
                }
                Err(error) => {
                    warn!(%error, "worker kept its current brain");
                    continue;
                }
            },
            Request::Act(state) => Response::complete("act", Value::from(learner.act(&state))),
            Request::Learn(reward) => {
                learner.learn(reward);
                Response::complete("learn", Value::Null)
            }
            Request::ResetEpisode => {
                learner.reset_episode();
                Response::complete("resetEpisode", Value::Null)
            }
        };
        let Ok(json) = serde_json::to_string(&response) else {
            continue;
        };
        if responses.send(json).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrainConfig, Shape};

    const WAIT: Duration = Duration::from_secs(5);

    fn learner(kind: BrainKind, seed: u64) -> Learner {
        Learner::new(kind, &BrainConfig::default(), Shape::new(3, 4), seed)
    }

    #[test]
    fn requests_use_the_cmd_input_envelope() {
        let json = serde_json::to_string(&Request::Act(vec![0.5])).expect("encode");
        assert_eq!(json, r#"{"cmd":"act","input":[0.5]}"#);
        let reset: Request = serde_json::from_str(r#"{"cmd":"resetEpisode"}"#).expect("decode");
        assert_eq!(reset, Request::ResetEpisode);
    }

    #[test]
    fn act_returns_cached_action_until_worker_replies() {
        let state = [0.2, -0.4, 0.9];
        let mut local = learner(BrainKind::Td, 4);
        let expected = local.act(&state);

        let mut worker = WorkerBrain::spawn(learner(BrainKind::Td, 4));
        assert_eq!(worker.act(&state), 0);
        assert!(worker.sync(WAIT));
        assert_eq!(worker.last_action(), expected);
        assert_eq!(worker.kind(), BrainKind::Td);
    }

    #[test]
    fn unknown_commands_are_ignored() {
        let (request_tx, request_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();
        let brain = learner(BrainKind::Qlearn, 1);
        let handle = thread::spawn(move || serve(brain, request_rx, response_tx));

        request_tx
            .send(r#"{"cmd":"dance","input":1}"#.to_owned())
            .expect("send");
        request_tx
            .send(serde_json::to_string(&Request::Learn(1.0)).expect("encode"))
            .expect("send");
        drop(request_tx);
        handle.join().expect("worker exits");

        let replies: Vec<Response> = response_rx
            .iter()
            .map(|raw| serde_json::from_str(&raw).expect("decode"))
            .collect();
        assert_eq!(replies, vec![Response::complete("learn", Value::Null)]);
    }

    #[test]
    fn states_are_dropped_while_the_worker_is_behind() {
        let mut worker = WorkerBrain::spawn(learner(BrainKind::Dqn, 6));
        for step in 0..500 {
            let _ = worker.act(&[step as f32 * 0.01, 0.0, 1.0]);
            worker.learn(0.5);
            assert!(worker.pending <= MAX_PENDING_ACTS);
        }
        assert!(worker.sync(WAIT));
        assert_eq!(worker.pending, 0);
        assert!(worker.last_action() < 4);
    }

    #[test]
    fn init_replaces_the_worker_brain() {
        let state = [0.7, 0.1, -0.3];
        let trained = learner(BrainKind::Ga, 21);
        let expected = trained.clone().act(&state);

        let mut worker = WorkerBrain::spawn(learner(BrainKind::Qlearn, 2));
        worker.init(&trained).expect("encode state");
        assert_eq!(worker.kind(), BrainKind::Ga);
        let _ = worker.act(&state);
        assert!(worker.sync(WAIT));
        assert_eq!(worker.last_action(), expected);
    }
}
