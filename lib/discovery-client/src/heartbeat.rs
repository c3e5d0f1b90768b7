//! Periodic heartbeat loop for a registered instance

use crate::backoff::BackoffPolicy;
use crate::client::RegistryClient;
use crate::error::ClientError;
use discovery_core::ServiceInstance;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Drives periodic heartbeats for one registered instance.
///
/// The interval must stay well below the registry's expiry window; one third
/// of the window is the recommended ratio.
pub struct HeartbeatTask {
    client: RegistryClient,
    service: String,
    instance: ServiceInstance,
    interval: Duration,
    backoff: BackoffPolicy,
}

impl HeartbeatTask {
    pub fn new(
        client: RegistryClient,
        service: impl Into<String>,
        instance: ServiceInstance,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            service: service.into(),
            instance,
            interval,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Run the heartbeat loop until the owning task is aborted.
    ///
    /// A NotFound from the registry means our record expired there;
    /// re-register and keep going rather than crash.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self
                .client
                .heartbeat(&self.service, &self.instance.instance_id)
                .await
            {
                Ok(()) => {
                    debug!(
                        "Heartbeat ok for {}/{}",
                        self.service, self.instance.instance_id
                    );
                }
                Err(ClientError::NotFound { .. }) => {
                    warn!(
                        "Registry lost instance {}/{}; re-registering",
                        self.service, self.instance.instance_id
                    );
                    if let Err(error) = self
                        .client
                        .register_with_backoff(&self.service, &self.instance, &self.backoff)
                        .await
                    {
                        warn!(
                            "Re-registration of {}/{} failed: {}",
                            self.service, self.instance.instance_id, error
                        );
                    }
                }
                Err(error) => {
                    warn!(
                        "Heartbeat failed for {}/{}: {}",
                        self.service, self.instance.instance_id, error
                    );
                }
            }
        }
    }
}
