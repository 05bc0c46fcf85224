// src/main.rs

use color_eyre::eyre::{Result, WrapErr};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod config;
mod core;
mod limiter;
mod logging;
mod server;

use crate::config::Config;
use crate::core::client::HttpApiClient;
use crate::core::dispatcher::Dispatcher;
use crate::core::runner::ProcessRunner;
use crate::core::store::SubdomainStore;
use crate::core::whois::WhoisClient;
use crate::limiter::RateLimiter;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Setup ---
    color_eyre::install()?;
    logging::initialize_logging()?;
    let config = Config::from_env()?;
    info!(?config, "Configuration loaded.");

    let store = SubdomainStore::open(&config.db_path)
        .wrap_err_with(|| format!("cannot open subdomain store at {}", config.db_path.display()))?;
    let whois = WhoisClient::new(config.jobs.whois_server.clone(), config.jobs.whois_timeout)
        .with_port(config.jobs.whois_port);
    let client = HttpApiClient::new(whois).wrap_err("cannot build HTTP client")?;
    let dispatcher = Dispatcher::new(Arc::new(ProcessRunner), Arc::new(client), store, config.jobs.clone());

    let app = server::router(AppState {
        dispatcher,
        session_buffer: config.session_buffer,
        max_message_bytes: config.max_message_bytes,
        limiter: Arc::new(RateLimiter::from_settings(&config.rate_limit)),
    });

    // --- Serve ---
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("cannot bind {addr}"))?;
    info!(%addr, "Listening.");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("server error")?;

    info!("Shut down.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for Ctrl-C; running until killed.");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, shutting down.");
}
