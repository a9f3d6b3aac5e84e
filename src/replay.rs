use crate::clock::{Clock, ManualClock};
use crate::module::Result;
use crate::registry::{DeviceRegistry, DeviceStatus, RegistryError};
use crate::state::State;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

/// One scripted registry call, one per NDJSON line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Register {
        id: String,
        #[serde(rename = "type")]
        kind: String,
    },
    Heartbeat { id: String },
    UpdateState { id: String, state: State },
    Remove { id: String },
    Get { id: String },
    List,
    /// Move the synthetic clock forward.
    Advance { secs: u64 },
    /// Expire with the given window in seconds.
    Expire { window: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    Device(DeviceStatus),
    Devices(Vec<DeviceStatus>),
    Expired(usize),
    Clock(i64),
    Failed(#[serde(serialize_with = "error_message")] RegistryError),
}

fn error_message<S: Serializer>(err: &RegistryError, ser: S) -> std::result::Result<S::Ok, S::Error> {
    ser.collect_str(err)
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Done => write!(f, "ok"),
            Outcome::Device(d) => write!(
                f,
                "{} type={} state={} online={} last_seen={}",
                d.id, d.kind, d.state, d.online, d.last_seen
            ),
            Outcome::Devices(ds) => {
                let ids: Vec<&str> = ds.iter().map(|d| d.id.as_str()).collect();
                write!(f, "{} device(s) [{}]", ds.len(), ids.join(", "))
            }
            Outcome::Expired(n) => write!(f, "expired {n}"),
            Outcome::Clock(t) => write!(f, "clock at {t}"),
            Outcome::Failed(e) => write!(f, "error: {e}"),
        }
    }
}

/// Result of one script line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub line: usize,
    pub outcome: Outcome,
}

/// Fresh registry on a manual clock, driven by scripted ops.
pub struct Replay {
    clock: Arc<ManualClock>,
    registry: DeviceRegistry,
}

impl Replay {
    pub fn new(start: i64) -> Self {
        let clock = Arc::new(ManualClock::new(start));
        let registry = DeviceRegistry::with_clock(clock.clone());
        Self { clock, registry }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn apply(&self, op: Op) -> Outcome {
        let reg = &self.registry;
        let res = match op {
            Op::Register { id, kind } => reg.register(id, kind).map(Outcome::Device),
            Op::Heartbeat { id } => reg.heartbeat(&id).map(|_| Outcome::Done),
            Op::UpdateState { id, state } => reg.update_state(&id, state).map(|_| Outcome::Done),
            Op::Remove { id } => reg.remove(&id).map(|_| Outcome::Done),
            Op::Get { id } => reg.get(&id).map(Outcome::Device),
            Op::List => Ok(Outcome::Devices(reg.list())),
            Op::Advance { secs } => Ok(Outcome::Clock(self.clock.advance(secs))),
            Op::Expire { window } => Ok(Outcome::Expired(reg.expire_stale(Duration::from_secs(window)))),
        };
        res.unwrap_or_else(Outcome::Failed)
    }

    /// Run a whole script. Registry failures are recorded per step; a line
    /// that does not parse stops the run.
    pub fn run<R: BufRead>(&self, reader: R) -> Result<Vec<Step>> {
        let mut steps = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let op: Op = serde_json::from_str(trimmed)
                .map_err(|e| format!("line {}: {e}", idx + 1))?;
            let outcome = self.apply(op);
            if let Outcome::Failed(e) = &outcome {
                tracing::debug!(line = idx + 1, error = %e, "replay step failed");
            }
            steps.push(Step { line: idx + 1, outcome });
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
# lifecycle walk-through
{"op":"register","id":"d1","type":"sensor"}
{"op":"update_state","id":"d1","state":"init"}
{"op":"update_state","id":"d1","state":"running"}
{"op":"update_state","id":"d1","state":"ready"}
{"op":"update_state","id":"d1","state":"running"}
{"op":"get","id":"d1"}
"#;

    #[test]
    fn scenario_script() {
        let replay = Replay::new(0);
        let steps = replay.run(SCRIPT.as_bytes()).unwrap();
        assert_eq!(steps.len(), 6);
        assert_eq!(steps[0].line, 3);
        assert!(matches!(
            steps[2].outcome,
            Outcome::Failed(RegistryError::InvalidTransition { from: State::Init, to: State::Running, .. })
        ));
        match &steps[5].outcome {
            Outcome::Device(d) => assert_eq!(d.state, State::Running),
            other => panic!("expected device, got {other:?}"),
        }
    }

    #[test]
    fn clock_and_expiry() {
        let replay = Replay::new(100);
        let script = r#"{"op":"register","id":"b","type":"cam"}
{"op":"register","id":"a","type":"cam"}
{"op":"advance","secs":40}
{"op":"heartbeat","id":"a"}
{"op":"expire","window":30}
{"op":"expire","window":30}
{"op":"list"}"#;
        let steps = replay.run(script.as_bytes()).unwrap();
        assert_eq!(steps[2].outcome, Outcome::Clock(140));
        assert_eq!(steps[4].outcome, Outcome::Expired(1));
        assert_eq!(steps[5].outcome, Outcome::Expired(0));
        match &steps[6].outcome {
            Outcome::Devices(ds) => {
                assert_eq!(ds[0].id, "a");
                assert!(ds[0].online);
                assert!(!ds[1].online);
            }
            other => panic!("expected list, got {other:?}"),
        }
        assert_eq!(replay.now(), 140);
    }

    #[test]
    fn failures_do_not_abort() {
        let replay = Replay::new(0);
        let script = r#"{"op":"remove","id":"ghost"}
{"op":"register","id":"d1","type":"sensor"}
{"op":"register","id":"d1","type":"sensor"}"#;
        let steps = replay.run(script.as_bytes()).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].outcome.to_string(), "error: device `ghost` not found");
        assert_eq!(steps[2].outcome, Outcome::Failed(RegistryError::AlreadyRegistered("d1".into())));
        assert_eq!(replay.registry().len(), 1);
    }

    #[test]
    fn advance_saturates_at_clock_limit() {
        let replay = Replay::new(i64::MAX - 5);
        let steps = replay.run(r#"{"op":"advance","secs":10}"#.as_bytes()).unwrap();
        assert_eq!(steps[0].outcome, Outcome::Clock(i64::MAX));
        assert_eq!(replay.now(), i64::MAX);
    }

    #[test]
    fn advance_cannot_rewind() {
        let replay = Replay::new(100);
        let err = replay.run(r#"{"op":"advance","secs":-10}"#.as_bytes()).unwrap_err();
        assert!(err.to_string().starts_with("line 1:"), "{err}");
        assert_eq!(replay.now(), 100);
    }

    #[test]
    fn steps_serialize_as_json() {
        let replay = Replay::new(7);
        let script = r#"{"op":"register","id":"d1","type":"sensor"}
{"op":"heartbeat","id":"nope"}
{"op":"expire","window":5}"#;
        let steps = replay.run(script.as_bytes()).unwrap();
        let json: Vec<_> = steps.iter().map(|s| serde_json::to_value(s).unwrap()).collect();
        assert_eq!(
            json[0],
            serde_json::json!({"line": 1, "outcome": {"result": "device", "value": {
                "id": "d1", "type": "sensor", "state": "idle", "online": true, "last_seen": 7
            }}})
        );
        assert_eq!(
            json[1],
            serde_json::json!({"line": 2, "outcome": {"result": "failed", "value": "device `nope` not found"}})
        );
        assert_eq!(json[2], serde_json::json!({"line": 3, "outcome": {"result": "expired", "value": 0}}));
    }

    #[test]
    fn malformed_line_reports_position() {
        let replay = Replay::new(0);
        let script = "{\"op\":\"list\"}\n{\"op\":\"teleport\"}\n";
        let err = replay.run(script.as_bytes()).unwrap_err();
        assert!(err.to_string().starts_with("line 2:"), "{err}");
    }

    #[test]
    fn unknown_state_name_is_malformed() {
        let replay = Replay::new(0);
        let script = r#"{"op":"update_state","id":"d1","state":"paused"}"#;
        assert!(replay.run(script.as_bytes()).is_err());
    }
}
