//! Gateway configuration loaded from a YAML file

use anyhow::{Context, Result};
use gateway_proxy::{LoadBalancingStrategy, RouteConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Top-level gateway configuration
#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_registry_url")]
    pub registry_url: String,
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    #[serde(default = "default_cache_refresh_secs")]
    pub cache_refresh_secs: u64,
    #[serde(default)]
    pub load_balancing: LoadBalancingStrategy,
    /// Ordered route list; the first match wins
    pub routes: Vec<RouteConfig>,
}

fn default_listen_addr() -> SocketAddr {
    ([0, 0, 0, 0], 8080).into()
}

fn default_registry_url() -> String {
    "http://127.0.0.1:8761".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    10
}

fn default_cache_refresh_secs() -> u64 {
    5
}

impl GatewayConfig {
    /// Load from the path in GATEWAY_CONFIG, defaulting to gateway.yaml.
    pub fn load() -> Result<Self> {
        let path = std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| "gateway.yaml".to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read gateway config from {}", path))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("Unable to parse gateway config {}", path))?;
        Ok(config)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn cache_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.cache_refresh_secs)
    }
}
