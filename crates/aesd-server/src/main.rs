use aesd_logging::AesdSubscriberBuilder;
use aesd_server::process::{block_shutdown_signals, daemonize, spawn_signal_listener};
use aesd_server::{Cli, Supervisor};
use anyhow::Context;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    // Bind before detaching so a busy port is reported on the terminal
    let supervisor = Supervisor::bind(&config)?;

    if cli.daemon {
        daemonize().context("Failed to daemonize")?;
    }

    // Must precede every thread spawn, the log writer's included
    block_shutdown_signals().context("Failed to block shutdown signals")?;

    let _log_guard = AesdSubscriberBuilder::new()
        .with_config(config.log.clone())
        .init();

    spawn_signal_listener(supervisor.shutdown_handle())
        .context("Failed to spawn signal listener")?;

    let summary = supervisor.run().inspect_err(|e| {
        tracing::error!(error = %e, "Server stopped with an error");
    })?;
    tracing::info!(connections = summary.connections, "Exiting");
    Ok(())
}
