use anyhow::Result;
use discovery_core::InstanceRegistry;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::tokio::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::fmt::init as tracing_init;

mod api;
mod config;

use config::RegistryConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let config = RegistryConfig::from_env()?;
    info!("Starting registry-server...");
    info!("  - Expiry window: {:?}", config.expiry_window);
    info!("  - Sweep interval: {:?}", config.sweep_interval);

    let registry = Arc::new(InstanceRegistry::new(config.expiry_window));

    // Background expiry sweep
    {
        let registry = registry.clone();
        let sweep_interval = config.sweep_interval;
        tokio::task::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                let evicted = registry.sweep().await;
                if evicted > 0 {
                    info!("Sweep evicted {} expired instances", evicted);
                }
            }
        });
    }

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Registry listening on {}", config.listen_addr);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let registry = registry.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| api::handle_request(req, registry.clone()));

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving connection from {}: {}", peer_addr, e);
            }
        });
    }
}
