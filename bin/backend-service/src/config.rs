//! Backend service configuration from the environment

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration for one backend instance
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub listen_addr: SocketAddr,
    /// Host other processes can reach this instance on, as advertised to the
    /// registry (the listen address is usually a bind-all address)
    pub advertised_host: String,
    pub registry_url: String,
    pub service_name: String,
    /// Must stay below the registry's expiry window; one third is the
    /// recommended ratio
    pub heartbeat_interval: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], 8081).into(),
            advertised_host: "127.0.0.1".to_string(),
            registry_url: "http://127.0.0.1:8761".to_string(),
            service_name: "backend-service".to_string(),
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

impl BackendConfig {
    /// Read configuration from BACKEND_* / REGISTRY_URL environment
    /// variables, falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("BACKEND_LISTEN_ADDR") {
            config.listen_addr = addr.parse().context("Invalid BACKEND_LISTEN_ADDR")?;
        }
        if let Ok(host) = std::env::var("BACKEND_ADVERTISED_HOST") {
            config.advertised_host = host;
        }
        if let Ok(url) = std::env::var("REGISTRY_URL") {
            config.registry_url = url;
        }
        if let Ok(name) = std::env::var("BACKEND_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Ok(secs) = std::env::var("BACKEND_HEARTBEAT_INTERVAL_SECS") {
            let secs = secs
                .parse()
                .context("Invalid BACKEND_HEARTBEAT_INTERVAL_SECS")?;
            config.heartbeat_interval = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.listen_addr.port(), 8081);
        assert_eq!(config.service_name, "backend-service");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
    }
}
