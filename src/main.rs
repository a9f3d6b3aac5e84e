use clap::Parser;

use sentinel::{init_telemetry, load_config, Cli, Result};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Parse first so --help/--version skip config loading
    let cli = Cli::parse();

    // Load config + init logs
    let cfg = load_config()?;
    init_telemetry(&cfg)?;
    tracing::info!(version = VERSION, listen_addr = %cfg.listen_addr, debug = cfg.debug, "SENTINEL starting");

    cli.run(&cfg)
}
