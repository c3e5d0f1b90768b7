//! Registry state for tracking live service instances

use crate::{CoreError, InstanceStatus, Result, ServiceInstance};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A registered instance together with its liveness bookkeeping
#[derive(Clone, Debug)]
struct TrackedInstance {
    instance: ServiceInstance,
    registered_at: DateTime<Utc>,
    last_heartbeat: Instant,
}

/// Instances registered under a single service name
#[derive(Default)]
struct ServiceEntry {
    instances: HashMap<String, TrackedInstance>,
}

/// InstanceRegistry maintains the mapping of service name to live instances.
///
/// Each service has its own lock, so heartbeats and lookups for one service
/// never contend with another. Mutations to a single instance id are
/// serialized by the owning service entry's write lock.
pub struct InstanceRegistry {
    services: RwLock<HashMap<String, Arc<RwLock<ServiceEntry>>>>,
    expiry_window: Duration,
}

impl InstanceRegistry {
    pub fn new(expiry_window: Duration) -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            expiry_window,
        }
    }

    pub fn expiry_window(&self) -> Duration {
        self.expiry_window
    }

    async fn entry(&self, service: &str) -> Option<Arc<RwLock<ServiceEntry>>> {
        let services = self.services.read().await;
        services.get(service).cloned()
    }

    async fn entry_or_insert(&self, service: &str) -> Arc<RwLock<ServiceEntry>> {
        {
            let services = self.services.read().await;
            if let Some(entry) = services.get(service) {
                return entry.clone();
            }
        }
        let mut services = self.services.write().await;
        services
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(ServiceEntry::default())))
            .clone()
    }

    /// Register an instance, or refresh an identical registration.
    ///
    /// Fails with DuplicateInstance when the instance id is already present
    /// under a different host/port.
    pub async fn register(&self, service: &str, instance: ServiceInstance) -> Result<()> {
        let entry = self.entry_or_insert(service).await;
        let mut entry = entry.write().await;

        if let Some(existing) = entry.instances.get(&instance.instance_id) {
            if existing.instance.host != instance.host || existing.instance.port != instance.port {
                return Err(CoreError::DuplicateInstance(
                    service.to_string(),
                    instance.instance_id.clone(),
                ));
            }
        }

        let instance_id = instance.instance_id.clone();
        entry.instances.insert(
            instance_id.clone(),
            TrackedInstance {
                instance,
                registered_at: Utc::now(),
                last_heartbeat: Instant::now(),
            },
        );

        info!("Registered instance {}/{}", service, instance_id);
        Ok(())
    }

    /// Refresh an instance's heartbeat.
    ///
    /// Fails with InstanceNotFound when the instance is absent; the client is
    /// expected to re-register in that case.
    pub async fn heartbeat(&self, service: &str, instance_id: &str) -> Result<()> {
        let entry = match self.entry(service).await {
            Some(entry) => entry,
            None => {
                return Err(CoreError::InstanceNotFound(
                    service.to_string(),
                    instance_id.to_string(),
                ))
            }
        };
        let mut entry = entry.write().await;
        match entry.instances.get_mut(instance_id) {
            Some(tracked) => {
                tracked.last_heartbeat = Instant::now();
                debug!("Heartbeat for {}/{}", service, instance_id);
                Ok(())
            }
            None => Err(CoreError::InstanceNotFound(
                service.to_string(),
                instance_id.to_string(),
            )),
        }
    }

    /// Remove an instance. Idempotent: removing an absent instance is a no-op.
    pub async fn deregister(&self, service: &str, instance_id: &str) {
        if let Some(entry) = self.entry(service).await {
            let mut entry = entry.write().await;
            if entry.instances.remove(instance_id).is_some() {
                info!("Deregistered instance {}/{}", service, instance_id);
            }
        }
    }

    /// Snapshot of UP instances that have heartbeated within the expiry window.
    ///
    /// Returns an empty list, not an error, when the service is unknown or has
    /// no live instances. Expired instances are filtered here even before the
    /// sweep has physically evicted them.
    pub async fn lookup(&self, service: &str) -> Vec<ServiceInstance> {
        let entry = match self.entry(service).await {
            Some(entry) => entry,
            None => return Vec::new(),
        };
        let entry = entry.read().await;
        let now = Instant::now();
        entry
            .instances
            .values()
            .filter(|tracked| tracked.instance.status == InstanceStatus::Up)
            .filter(|tracked| now.duration_since(tracked.last_heartbeat) < self.expiry_window)
            .map(|tracked| tracked.instance.clone())
            .collect()
    }

    /// Evict every instance whose heartbeat is older than the expiry window.
    ///
    /// Returns the number of evicted instances.
    pub async fn sweep(&self) -> usize {
        let services: Vec<(String, Arc<RwLock<ServiceEntry>>)> = {
            let services = self.services.read().await;
            services
                .iter()
                .map(|(name, entry)| (name.clone(), entry.clone()))
                .collect()
        };

        let now = Instant::now();
        let mut evicted = 0;
        for (service, entry) in services {
            let mut entry = entry.write().await;
            let expired: Vec<(String, DateTime<Utc>)> = entry
                .instances
                .iter()
                .filter(|(_, tracked)| {
                    now.duration_since(tracked.last_heartbeat) >= self.expiry_window
                })
                .map(|(id, tracked)| (id.clone(), tracked.registered_at))
                .collect();
            for (instance_id, registered_at) in expired {
                entry.instances.remove(&instance_id);
                evicted += 1;
                info!(
                    "Evicted expired instance {}/{} (registered at {})",
                    service, instance_id, registered_at
                );
            }
        }
        evicted
    }

    /// Count of instance records for a service, including not-yet-swept ones.
    pub async fn instance_count(&self, service: &str) -> usize {
        match self.entry(service).await {
            Some(entry) => entry.read().await.instances.len(),
            None => 0,
        }
    }

    /// Count of service names with at least one instance record.
    pub async fn service_count(&self) -> usize {
        let services: Vec<Arc<RwLock<ServiceEntry>>> = {
            let services = self.services.read().await;
            services.values().cloned().collect()
        };
        let mut count = 0;
        for entry in services {
            if !entry.read().await.instances.is_empty() {
                count += 1;
            }
        }
        count
    }
}
