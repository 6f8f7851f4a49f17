//! Pool Manager
//!
//! REST service for network resource pools:
//! - IP pools: IPv4/IPv6 CIDRs carved into aligned sub-blocks
//! - RT/RD pools: L3VPN Route-Target and Route-Distinguisher values
//!
//! Every allocation and release against one pool runs as a single
//! serialized unit; different pools never share a lock.

mod api;
mod backoff;
mod config;
mod error;
mod manager;
#[cfg(test)]
mod test_utils;

use anyhow::Context;
use config::{Config, SeedFile};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Pool Manager");

    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Configuration:");
    info!("  Bind address: {}", config.bind_addr);
    info!(
        "  API prefix: {}",
        if config.api_prefix.is_empty() { "/" } else { config.api_prefix.as_str() }
    );
    info!("  Commit attempts: {}", config.commit_attempts);
    info!(
        "  Seed file: {}",
        config
            .seed_file
            .as_deref()
            .map_or_else(|| "none".to_string(), |p| p.display().to_string())
    );

    let state = api::AppState::in_memory(config.commit_attempts);

    if let Some(path) = &config.seed_file {
        let seed = SeedFile::load(path)
            .with_context(|| format!("Failed to load seed file {}", path.display()))?;
        let (address_pools, value_pools) = seed
            .apply(&state.address_pools, &state.value_pools)
            .await
            .context("Failed to create seed pools")?;
        info!(
            "Seeded {} IP pools and {} RT/RD pools",
            address_pools, value_pools
        );
    }

    let app = api::build_router(state, &config.api_prefix);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Pool Manager stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
