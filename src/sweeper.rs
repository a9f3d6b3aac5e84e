use crate::module::{Health, Module, Result};
use crate::registry::DeviceRegistry;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// Upper bound on how long stop() waits for the worker to notice.
const POLL_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug, Default)]
struct Counters {
    sweeps: AtomicU64,
    expired: AtomicU64,
}

/// Background module that periodically marks silent devices offline.
pub struct Sweeper {
    registry: Arc<DeviceRegistry>,
    window: Duration,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    counters: Arc<Counters>,
    worker: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub fn new(registry: Arc<DeviceRegistry>, window: Duration, interval: Duration) -> Self {
        Self {
            registry,
            window,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            worker: None,
        }
    }

    /// Run one expiry pass right now.
    pub fn sweep_once(&self) -> usize {
        sweep(&self.registry, self.window, &self.counters)
    }

    /// Number of passes completed so far.
    pub fn sweeps(&self) -> u64 {
        self.counters.sweeps.load(Ordering::Relaxed)
    }

    /// Total devices flipped offline so far.
    pub fn expired_total(&self) -> u64 {
        self.counters.expired.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

fn sweep(registry: &DeviceRegistry, window: Duration, counters: &Counters) -> usize {
    let n = registry.expire_stale(window);
    counters.sweeps.fetch_add(1, Ordering::Relaxed);
    counters.expired.fetch_add(n as u64, Ordering::Relaxed);
    n
}

impl Module for Sweeper {
    fn name(&self) -> &str { "sweeper" }

    fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err("sweeper already running".into());
        }
        if self.interval.is_zero() {
            return Err("sweep interval must be non-zero".into());
        }
        self.shutdown.store(false, Ordering::SeqCst);

        let registry = self.registry.clone();
        let shutdown = self.shutdown.clone();
        let counters = self.counters.clone();
        let (window, interval) = (self.window, self.interval);

        let handle = thread::Builder::new()
            .name("sentinel-sweeper".into())
            .spawn(move || {
                // None: the next pass lies beyond what Instant can represent.
                let mut next = Instant::now().checked_add(interval);
                while !shutdown.load(Ordering::SeqCst) {
                    let now = Instant::now();
                    match next {
                        Some(at) if now >= at => {
                            sweep(&registry, window, &counters);
                            next = at.checked_add(interval);
                        }
                        Some(at) => thread::sleep((at - now).min(POLL_SLICE)),
                        None => thread::sleep(POLL_SLICE),
                    }
                }
            })?;
        self.worker = Some(handle);
        tracing::info!(window_secs = window.as_secs(), interval_ms = interval.as_millis() as u64, "sweeper started");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else { return Ok(()) };
        self.shutdown.store(true, Ordering::SeqCst);
        handle.join().map_err(|_| "sweeper thread panicked")?;
        tracing::info!(sweeps = self.sweeps(), expired = self.expired_total(), "sweeper stopped");
        Ok(())
    }

    fn health(&self) -> Health {
        if self.worker.is_none() {
            return Health::Unhealthy { reason: "sweeper not running".into() };
        }
        let summary = self.registry.summary();
        if summary.offline > 0 {
            Health::Degraded { reason: format!("{} of {} devices offline", summary.offline, summary.total) }
        } else {
            Health::Healthy
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
