pub mod cli;
pub mod clock;
pub mod config;
pub mod module;
pub mod registry;
pub mod replay;
pub mod runtime;
pub mod state;
pub mod sweeper;
pub mod telemetry;

pub use cli::Cli;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, load_config_from, Config};
pub use module::{Error, Health, Module, Result};
pub use registry::{DeviceRegistry, DeviceStatus, RegistryError, RegistryResult, RegistrySummary};
pub use replay::{Op, Outcome, Replay, Step};
pub use runtime::Runtime;
pub use state::{permitted_transitions, DefaultPolicy, State, StateParseError, TransitionPolicy};
pub use sweeper::Sweeper;
pub use telemetry::init_telemetry;
