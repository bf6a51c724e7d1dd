//! vpsdeploy - main entry point
//!
//! Resolves the compiled-in settings for the invoking user and runs the
//! deployment sequence against real processes.

use anyhow::Context;
use tracing::{error, warn};
use tracing_subscriber::{fmt, EnvFilter};

use vpsdeploy::cli::Cli;
use vpsdeploy::command_runner::SystemRunner;
use vpsdeploy::config::DeployConfig;
use vpsdeploy::interrupt::{self, FAILURE_EXIT_CODE};
use vpsdeploy::sequencer::Sequencer;

/// Timestamped, leveled lines on stdout. RUST_LOG overrides `default_level`.
fn init_logger(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();
}

fn run() -> anyhow::Result<()> {
    let config =
        DeployConfig::from_environment().context("Failed to resolve deployment settings")?;
    let mut sequencer = Sequencer::new(config, SystemRunner);
    // The sequencer logs its own failure details
    sequencer.run()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse_args();
    init_logger(cli.log_level());

    if let Err(e) = interrupt::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    if let Err(e) = run() {
        if e.downcast_ref::<vpsdeploy::DeployError>().is_none() {
            error!("Deployment failed: {:#}", e);
        }
        std::process::exit(FAILURE_EXIT_CODE);
    }
}
