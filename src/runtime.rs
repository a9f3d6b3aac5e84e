use crate::module::{Health, Module, Result};
use std::sync::{atomic::{AtomicBool, Ordering}, Arc};
use std::thread;
use std::time::Duration;

/// Runtime shell that owns the service modules.
pub struct Runtime {
    modules: Vec<Box<dyn Module>>,
    started: usize,
}

impl Runtime {
    pub fn new() -> Self { Self { modules: Vec::new(), started: 0 } }

    pub fn register<M: Module + 'static>(&mut self, m: M) {
        self.modules.push(Box::new(m));
    }

    /// Start all modules in registration order. If one fails, the ones
    /// already started are stopped again before the error is returned.
    pub fn start_all(&mut self) -> Result<()> {
        while self.started < self.modules.len() {
            let m = &mut self.modules[self.started];
            if let Err(e) = m.start() {
                tracing::error!(module = m.name(), error = %e, "module failed to start");
                let _ = self.stop_all();
                return Err(e);
            }
            tracing::debug!(module = m.name(), "module started");
            self.started += 1;
        }
        Ok(())
    }

    /// Stop started modules in reverse order. Every module gets a stop call;
    /// the first error is returned.
    pub fn stop_all(&mut self) -> Result<()> {
        let mut first_err = None;
        while self.started > 0 {
            self.started -= 1;
            let m = &mut self.modules[self.started];
            match m.stop() {
                Ok(()) => tracing::debug!(module = m.name(), "module stopped"),
                Err(e) => {
                    tracing::warn!(module = m.name(), error = %e, "module failed to stop");
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Aggregate health (first non-Healthy wins).
    pub fn overall_health(&self) -> Health {
        for m in &self.modules {
            match m.health() {
                Health::Healthy => continue,
                other => return other,
            }
        }
        Health::Healthy
    }

    /// Start modules and block until Ctrl-C, then stop modules.
    pub fn run_until_ctrlc(&mut self) -> Result<()> {
        let (shutdown, _installed) = ctrlc_flag();
        self.run_until(&shutdown)
    }

    /// Start modules, wait for `shutdown` to be raised, then stop them.
    pub fn run_until(&mut self, shutdown: &AtomicBool) -> Result<()> {
        self.start_all()?;
        tracing::info!(modules = self.modules.len(), "runtime: started; press Ctrl-C to stop");

        while !shutdown.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(50));
        }

        tracing::info!("runtime: shutting down");
        self.stop_all()?;
        tracing::info!("runtime: stopped");
        Ok(())
    }
}

/// Flag raised on Ctrl-C, and whether the handler could be installed.
/// A handler already installed elsewhere is not fatal, but Ctrl-C will not
/// reach this flag.
fn ctrlc_flag() -> (Arc<AtomicBool>, bool) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let installed = match ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "runtime: could not install Ctrl-C handler");
            false
        }
    };
    (shutdown, installed)
}

impl Default for Runtime {
    fn default() -> Self { Self::new() }
}
