use crate::config::Config;
use crate::module::Result;
use crate::registry::DeviceRegistry;
use crate::replay::Replay;
use crate::runtime::Runtime;
use crate::state::{permitted_transitions, DefaultPolicy};
use crate::sweeper::Sweeper;
use clap::{Parser, Subcommand};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

// CLI definition
#[derive(Parser, Debug)]
#[command(name = "sentinel", author, version, about = "Device lifecycle registry")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Host the registry and its expiry sweep until Ctrl-C
    Serve,

    /// Print the permitted lifecycle transitions
    Transitions,

    /// Run an NDJSON script of registry operations against a fresh registry
    Replay {
        file: PathBuf,
        /// Initial reading of the synthetic clock (epoch seconds)
        #[arg(long, default_value_t = 0)]
        start: i64,
        /// Only print the final device listing
        #[arg(long, conflicts_with = "json")]
        quiet: bool,
        /// Print each step as a JSON line instead of text
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn run(self, cfg: &Config) -> Result<()> {
        match self.command {
            Command::Serve => serve(cfg),
            Command::Transitions => {
                for (from, to) in permitted_transitions(&DefaultPolicy) {
                    println!("{from:>8} -> {to}");
                }
                Ok(())
            }
            Command::Replay { file, start, quiet, json } => {
                let f = std::fs::File::open(&file)?;
                let replay = Replay::new(start);
                let steps = replay.run(BufReader::new(f))?;
                for step in &steps {
                    if json {
                        println!("{}", serde_json::to_string(step)?);
                    } else if !quiet {
                        println!("{:>4}: {}", step.line, step.outcome);
                    }
                }
                let devices = replay.registry().list();
                println!("{}", serde_json::to_string_pretty(&devices)?);
                tracing::info!(steps = steps.len(), devices = devices.len(), file = %file.display(), "replay finished");
                Ok(())
            }
        }
    }
}

fn serve(cfg: &Config) -> Result<()> {
    let registry = Arc::new(DeviceRegistry::new());
    tracing::info!(
        listen_addr = %cfg.listen_addr,
        window_secs = cfg.liveness_window_secs,
        "serving device registry"
    );

    let mut rt = Runtime::new();
    rt.register(Sweeper::new(registry.clone(), cfg.liveness_window(), cfg.sweep_interval()));
    rt.run_until_ctrlc()?;

    let summary = registry.summary();
    tracing::info!(total = summary.total, online = summary.online, offline = summary.offline, "final registry state");
    Ok(())
}

// Testing CLI parsing
#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_cli_serve() {
        let cli = Cli::parse_from(["sentinel", "serve"]);
        assert!(matches!(cli.command, Command::Serve));
    }

    #[test]
    fn test_cli_transitions() {
        let cli = Cli::parse_from(["sentinel", "transitions"]);
        assert!(matches!(cli.command, Command::Transitions));
        cli.run(&Config::default()).unwrap();
    }

    #[test]
    fn test_cli_replay() {
        let cli = Cli::parse_from(["sentinel", "replay", "ops.ndjson", "--start", "1700000000", "--quiet"]);
        match cli.command {
            Command::Replay { file, start, quiet, json } => {
                assert_eq!(file, PathBuf::from("ops.ndjson"));
                assert_eq!(start, 1_700_000_000);
                assert!(quiet);
                assert!(!json);
            }
            _ => panic!("Expected Replay command"),
        }
    }

    #[test]
    fn test_cli_replay_json() {
        let cli = Cli::parse_from(["sentinel", "replay", "ops.ndjson", "--json"]);
        match cli.command {
            Command::Replay { start, quiet, json, .. } => {
                assert_eq!(start, 0);
                assert!(!quiet);
                assert!(json);
            }
            _ => panic!("Expected Replay command"),
        }
        assert!(Cli::try_parse_from(["sentinel", "replay", "ops.ndjson", "--json", "--quiet"]).is_err());
    }

    #[test]
    fn test_replay_runs_file() {
        let path = std::env::temp_dir().join(format!("sentinel_replay_{}.ndjson", std::process::id()));
        std::fs::write(&path, "{\"op\":\"register\",\"id\":\"d1\",\"type\":\"sensor\"}\n").unwrap();
        let args = vec![
            OsString::from("sentinel"),
            OsString::from("replay"),
            path.clone().into_os_string(),
            OsString::from("--json"),
        ];
        let cli = Cli::parse_from(args);
        cli.run(&Config::default()).unwrap();
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_replay_missing_file() {
        let cli = Cli::parse_from(["sentinel", "replay", "___missing___.ndjson"]);
        assert!(cli.run(&Config::default()).is_err());
    }

    #[test]
    fn test_unknown_subcommand() {
        assert!(Cli::try_parse_from(["sentinel", "submit"]).is_err());
    }
}
