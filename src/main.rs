//! Nomina service
//!
//! Keeps the dashboard live: reconciles the session at startup, follows
//! session changes in local storage and refreshes every view on a timer
//! until Ctrl-C.
//!
//! Run with: cargo run --bin nomina -- [config.toml]

use nomina::view::MemorySink;
use nomina::{App, Config};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => Config::load_with_env(&path)?,
        None => Config::load_default(),
    };
    nomina::app::init_logging(&config.logging);

    tracing::info!("Nomina v{}", env!("CARGO_PKG_VERSION"));

    let sink = Arc::new(MemorySink::new());
    let app = App::build(config, sink.clone())?;

    // Follow session writes before the first check so none are missed,
    // including sign-ins and sign-outs done with nomina-cli
    let watcher = app.reconciler.watch_storage();
    let poller = app.watch_external_writes();
    let state = app.reconciler.check_auth_status().await;
    match app.reconciler.current_user() {
        Some(user) => tracing::info!(%state, user = %user.email, role = %user.role, "Session ready"),
        None => tracing::info!(%state, "Session ready, nobody signed in"),
    }

    let refresher = app.refresher();
    let refresh_handle = refresher.clone().start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    refresher.stop().await;
    if let Err(e) = refresh_handle.await {
        tracing::warn!(error = %e, "Refresh task ended abnormally");
    }
    poller.abort();
    watcher.abort();

    for (field, value) in sink.texts() {
        tracing::debug!(field = %field, value = %value, "Last rendered");
    }
    let stats = refresher.stats().await;
    tracing::info!(
        full_cycles = stats.full_cycles,
        chart_cycles = stats.chart_cycles,
        failed_loads = stats.failed_loads,
        "Nomina stopped"
    );

    Ok(())
}
