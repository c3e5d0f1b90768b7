use anyhow::Result;
use discovery_client::{DiscoveryCache, RegistryClient};
use gateway_proxy::{GatewayMetrics, LoadBalancer, RequestForwarder, RouteTable};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::tokio::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::fmt::init as tracing_init;

mod config;
mod handler;

use config::GatewayConfig;
use handler::{handle_request, GatewayContext};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let config = GatewayConfig::load()?;
    info!("Starting api-gateway...");

    let routes = RouteTable::build(&config.routes)?;
    info!("Route table loaded with {} routes", routes.len());

    let client = RegistryClient::new(config.registry_url.clone())?;
    let cache = Arc::new(DiscoveryCache::new(
        client,
        routes.target_services(),
        config.cache_refresh_interval(),
    ));
    // Prime the cache so early requests already see instances
    cache.refresh().await;
    tokio::task::spawn(cache.clone().run());
    info!(
        "Discovery cache refreshing every {:?} from {}",
        config.cache_refresh_interval(),
        config.registry_url
    );

    let context = Arc::new(GatewayContext {
        routes,
        cache,
        balancer: LoadBalancer::new(config.load_balancing),
        forwarder: RequestForwarder::new(config.upstream_timeout()),
        metrics: GatewayMetrics::new()?,
    });
    info!(
        "Upstream timeout {:?}, load balancing {:?}",
        config.upstream_timeout(),
        config.load_balancing
    );

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Gateway listening on {}", config.listen_addr);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let context = context.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, context.clone()));

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving connection from {}: {}", peer_addr, e);
            }
        });
    }
}
