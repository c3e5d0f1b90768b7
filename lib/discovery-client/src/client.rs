//! HTTP client for the instance registry

use crate::backoff::BackoffPolicy;
use crate::error::{ClientError, Result};
use discovery_core::ServiceInstance;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the registry's HTTP/JSON protocol.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    /// Create a client for the registry at `base_url` (e.g. `http://host:8761`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn instance_url(&self, service: &str, instance_id: &str) -> String {
        format!("{}/instances/{}/{}", self.base_url, service, instance_id)
    }

    fn service_url(&self, service: &str) -> String {
        format!("{}/instances/{}", self.base_url, service)
    }

    /// Register an instance descriptor under a service name.
    pub async fn register(&self, service: &str, instance: &ServiceInstance) -> Result<()> {
        let url = self.instance_url(service, &instance.instance_id);
        debug!("Registering {}/{} at {}", service, instance.instance_id, url);
        let response = self.http.put(&url).json(instance).send().await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(ClientError::Duplicate {
                service: service.to_string(),
                instance_id: instance.instance_id.clone(),
            }),
            status => Err(ClientError::UnexpectedStatus(status.as_u16())),
        }
    }

    /// Register, retrying with exponential backoff until the registry accepts.
    ///
    /// Registration is mandatory for a backend process, so transient registry
    /// failures are retried indefinitely with a capped delay. A Duplicate
    /// answer is not retryable and is surfaced immediately.
    pub async fn register_with_backoff(
        &self,
        service: &str,
        instance: &ServiceInstance,
        policy: &BackoffPolicy,
    ) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            match self.register(service, instance).await {
                Ok(()) => return Ok(()),
                Err(error @ ClientError::Duplicate { .. }) => return Err(error),
                Err(error) => {
                    let delay = policy.delay(attempt);
                    warn!(
                        "Registration attempt {} for {}/{} failed: {}; retrying in {:?}",
                        attempt + 1,
                        service,
                        instance.instance_id,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    /// Refresh the instance's heartbeat.
    ///
    /// NotFound means the registry no longer knows the instance and the
    /// caller must re-register.
    pub async fn heartbeat(&self, service: &str, instance_id: &str) -> Result<()> {
        let url = self.instance_url(service, instance_id);
        let response = self.http.put(&url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound {
                service: service.to_string(),
                instance_id: instance_id.to_string(),
            }),
            status => Err(ClientError::UnexpectedStatus(status.as_u16())),
        }
    }

    /// Remove the instance from the registry. Idempotent on the server side.
    pub async fn deregister(&self, service: &str, instance_id: &str) -> Result<()> {
        let url = self.instance_url(service, instance_id);
        debug!("Deregistering {}/{}", service, instance_id);
        let response = self.http.delete(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::UnexpectedStatus(response.status().as_u16()))
        }
    }

    /// Fetch the current UP instances for a service.
    pub async fn lookup(&self, service: &str) -> Result<Vec<ServiceInstance>> {
        let response = self.http.get(&self.service_url(service)).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}
