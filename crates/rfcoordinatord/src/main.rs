//! Entry point: parses the CLI, loads the static configuration, and drives
//! the coordinator loop to completion (§6, §10.1, §10.2).

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rfcoordinatord::config::{self, Cli};
use rfcoordinatord::daemon::{self, Coordinator};
use rfcoordinatord::ipc::{IpcService, LoopbackTransport};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let static_config = config::load(&cli)?;
    info!(
        config_entries = static_config.config.iter().count(),
        fastpath_enabled = static_config.fastpath_enabled,
        "configuration loaded"
    );

    // The external socket implementation is out of scope (§1, §4.3) — a
    // process wiring a real peer in supplies its own `IpcTransport` here.
    let (transport, _delivered) = LoopbackTransport::new();
    let (ipc, mailbox_worker) = IpcService::new(Arc::new(transport), true);
    let ipc = Arc::new(ipc);
    tokio::spawn(mailbox_worker);

    let (dp_tx, dp_rx) = tokio::sync::mpsc::unbounded_channel();
    let coordinator = Coordinator::new(static_config, dp_tx);

    info!("coordinator starting");
    daemon::run(coordinator, ipc, dp_rx).await;
    info!("coordinator shut down");
    Ok(())
}
