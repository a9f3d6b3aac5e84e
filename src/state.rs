use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle phase of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Idle,
    Init,
    Ready,
    Running,
    Error,
    Shutting,
    Shutdown,
}

impl State {
    pub const ALL: [State; 7] = [
        State::Idle,
        State::Init,
        State::Ready,
        State::Running,
        State::Error,
        State::Shutting,
        State::Shutdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Init => "init",
            State::Ready => "ready",
            State::Running => "running",
            State::Error => "error",
            State::Shutting => "shutting",
            State::Shutdown => "shutdown",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Shutdown)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown state `{0}`")]
pub struct StateParseError(pub String);

impl FromStr for State {
    type Err = StateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        State::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StateParseError(s.to_string()))
    }
}

/// Decides which state changes the registry accepts.
pub trait TransitionPolicy: Send + Sync {
    fn permits(&self, from: State, to: State) -> bool;
}

/// Default lifecycle table.
///
/// `idle -> init -> ready <-> running`, anything non-terminal may fall into
/// `error`, `error` recovers through `init`, and `ready`/`running`/`error`
/// may begin shutting down. `shutdown` accepts nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl TransitionPolicy for DefaultPolicy {
    fn permits(&self, from: State, to: State) -> bool {
        use State::*;
        if from.is_terminal() {
            return false;
        }
        match (from, to) {
            (_, Error) => true,
            (Idle, Init) => true,
            (Init, Ready) => true,
            (Ready, Running) => true,
            (Running, Ready) => true,
            (Error, Init) => true,
            (Ready | Running | Error, Shutting) => true,
            (Shutting, Shutdown) => true,
            _ => false,
        }
    }
}

/// Every `(from, to)` pair the policy accepts, in declaration order.
pub fn permitted_transitions(policy: &dyn TransitionPolicy) -> Vec<(State, State)> {
    let mut out = Vec::new();
    for from in State::ALL {
        for to in State::ALL {
            if policy.permits(from, to) {
                out.push((from, to));
            }
        }
    }
    out
}
