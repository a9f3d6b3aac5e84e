use crate::clock::{Clock, SystemClock};
use crate::state::{DefaultPolicy, State, TransitionPolicy};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Snapshot of one tracked device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub state: State,
    pub online: bool,
    pub last_seen: i64,
}

impl DeviceStatus {
    // Never lets last_seen go backwards, even if the clock does.
    fn touch(&mut self, now: i64) {
        self.last_seen = self.last_seen.max(now);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("device `{0}` is already registered")]
    AlreadyRegistered(String),
    #[error("device `{0}` not found")]
    NotFound(String),
    #[error("device `{id}`: transition {from} -> {to} is not permitted")]
    InvalidTransition { id: String, from: State, to: State },
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Counts over the current set of devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub by_state: BTreeMap<State, usize>,
}

/// In-memory device table guarded by a single lock.
///
/// Every operation takes the lock for its own duration only and hands back
/// copies, so callers never hold a reference into the table.
pub struct DeviceRegistry {
    devices: Mutex<BTreeMap<String, DeviceStatus>>,
    clock: Arc<dyn Clock>,
    policy: Box<dyn TransitionPolicy>,
}

impl DeviceRegistry {
    /// Registry on the wall clock with the default transition table.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_policy(clock, DefaultPolicy)
    }

    pub fn with_policy<P: TransitionPolicy + 'static>(clock: Arc<dyn Clock>, policy: P) -> Self {
        Self {
            devices: Mutex::new(BTreeMap::new()),
            clock,
            policy: Box::new(policy),
        }
    }

    pub fn register(&self, id: impl Into<String>, kind: impl Into<String>) -> RegistryResult<DeviceStatus> {
        let id = id.into();
        let now = self.clock.now();
        let mut devices = self.devices.lock();
        if devices.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        let status = DeviceStatus {
            id: id.clone(),
            kind: kind.into(),
            state: State::Idle,
            online: true,
            last_seen: now,
        };
        devices.insert(id, status.clone());
        tracing::debug!(id = %status.id, kind = %status.kind, "device registered");
        Ok(status)
    }

    pub fn heartbeat(&self, id: &str) -> RegistryResult<()> {
        let now = self.clock.now();
        let mut devices = self.devices.lock();
        let dev = devices.get_mut(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if !dev.online {
            tracing::debug!(id, "device back online");
        }
        dev.online = true;
        dev.touch(now);
        Ok(())
    }

    pub fn update_state(&self, id: &str, to: State) -> RegistryResult<()> {
        let now = self.clock.now();
        let mut devices = self.devices.lock();
        let dev = devices.get_mut(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let from = dev.state;
        if !self.policy.permits(from, to) {
            return Err(RegistryError::InvalidTransition { id: id.to_string(), from, to });
        }
        dev.state = to;
        dev.touch(now);
        tracing::debug!(id, %from, %to, "state changed");
        Ok(())
    }

    pub fn get(&self, id: &str) -> RegistryResult<DeviceStatus> {
        self.devices
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// All devices ordered by id.
    pub fn list(&self) -> Vec<DeviceStatus> {
        self.devices.lock().values().cloned().collect()
    }

    /// Mark every online device silent for longer than `window` as offline.
    /// Returns how many records changed.
    pub fn expire_stale(&self, window: Duration) -> usize {
        let window = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        let now = self.clock.now();
        let mut devices = self.devices.lock();
        let mut expired = 0usize;
        for dev in devices.values_mut() {
            if dev.online && now.saturating_sub(dev.last_seen) > window {
                dev.online = false;
                expired += 1;
                tracing::debug!(id = %dev.id, last_seen = dev.last_seen, "device went offline");
            }
        }
        if expired > 0 {
            tracing::info!(expired, window_secs = window, "expired stale devices");
        }
        expired
    }

    pub fn remove(&self, id: &str) -> RegistryResult<()> {
        match self.devices.lock().remove(id) {
            Some(_) => {
                tracing::debug!(id, "device removed");
                Ok(())
            }
            None => Err(RegistryError::NotFound(id.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> RegistrySummary {
        let devices = self.devices.lock();
        let mut summary = RegistrySummary { total: devices.len(), ..Default::default() };
        for dev in devices.values() {
            if dev.online { summary.online += 1 } else { summary.offline += 1 }
            *summary.by_state.entry(dev.state).or_insert(0) += 1;
        }
        summary
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
