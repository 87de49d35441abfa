mod config;
mod metrics;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dd_utils::ShutdownFlag;
use hyper::Server;

use config::Config;
use state::Coordinator;

#[tokio::main]
async fn main() -> Result<()> {
    dd_utils::logging::init("info");
    let config = Config::parse();
    config.validate_or_exit();

    let shutdown = ShutdownFlag::new();
    shutdown.install_signal_handler();

    let addr: SocketAddr = config.listen.parse().context("parsing --listen address")?;
    let coordinator = Arc::new(Coordinator::new(config.schedule_window));
    let service = routes::build(coordinator);

    tracing::info!(%addr, "dd-coordinator listening");
    let server = Server::bind(&addr).serve(service).with_graceful_shutdown(async move {
        while shutdown.is_running() {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    });

    server.await.context("coordinator HTTP server failed")?;
    Ok(())
}
