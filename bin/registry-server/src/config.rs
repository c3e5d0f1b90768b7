//! Registry server configuration from the environment

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration for the registry process
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub listen_addr: SocketAddr,
    /// Instances without a heartbeat for this long are considered dead
    pub expiry_window: Duration,
    /// Interval of the background eviction sweep
    pub sweep_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], 8761).into(),
            expiry_window: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

impl RegistryConfig {
    /// Read configuration from REGISTRY_* environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("REGISTRY_LISTEN_ADDR") {
            config.listen_addr = addr.parse().context("Invalid REGISTRY_LISTEN_ADDR")?;
        }
        if let Ok(secs) = std::env::var("REGISTRY_EXPIRY_WINDOW_SECS") {
            let secs = secs.parse().context("Invalid REGISTRY_EXPIRY_WINDOW_SECS")?;
            config.expiry_window = Duration::from_secs(secs);
        }
        if let Ok(secs) = std::env::var("REGISTRY_SWEEP_INTERVAL_SECS") {
            let secs = secs.parse().context("Invalid REGISTRY_SWEEP_INTERVAL_SECS")?;
            config.sweep_interval = Duration::from_secs(secs);
        }
        Ok(config)
    }
}
