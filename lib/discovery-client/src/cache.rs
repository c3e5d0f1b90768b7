//! Gateway-side cache of discovered instances

use crate::client::RegistryClient;
use arc_swap::ArcSwap;
use discovery_core::ServiceInstance;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

type Snapshot = HashMap<String, Arc<Vec<ServiceInstance>>>;

/// Periodically refreshed snapshot of instances per service.
///
/// Readers load the current snapshot without locking; the refresh loop swaps
/// in a new map wholesale. A failed lookup keeps the service's previous
/// entries rather than dropping them.
pub struct DiscoveryCache {
    client: RegistryClient,
    services: Vec<String>,
    snapshot: ArcSwap<Snapshot>,
    refresh_interval: Duration,
}

impl DiscoveryCache {
    /// Create a cache that tracks the given services.
    pub fn new(client: RegistryClient, services: Vec<String>, refresh_interval: Duration) -> Self {
        Self {
            client,
            services,
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            refresh_interval,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Current instances for a service; empty when none are known.
    pub fn instances(&self, service: &str) -> Arc<Vec<ServiceInstance>> {
        match self.snapshot.load().get(service) {
            Some(instances) => instances.clone(),
            None => Arc::new(Vec::new()),
        }
    }

    /// Replace the cached instances for a single service.
    pub fn store(&self, service: &str, instances: Vec<ServiceInstance>) {
        let mut next: Snapshot = (**self.snapshot.load()).clone();
        next.insert(service.to_string(), Arc::new(instances));
        self.snapshot.store(Arc::new(next));
    }

    /// Re-resolve every tracked service against the registry.
    pub async fn refresh(&self) {
        let mut next: Snapshot = (**self.snapshot.load()).clone();
        for service in &self.services {
            match self.client.lookup(service).await {
                Ok(instances) => {
                    debug!("Discovered {} instances for {}", instances.len(), service);
                    next.insert(service.clone(), Arc::new(instances));
                }
                Err(error) => {
                    warn!(
                        "Lookup failed for {}: {}; keeping previous instances",
                        service, error
                    );
                }
            }
        }
        self.snapshot.store(Arc::new(next));
    }

    /// Run the refresh loop until the owning task is aborted.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.refresh_interval);
        loop {
            ticker.tick().await;
            self.refresh().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::InstanceStatus;

    fn cache() -> DiscoveryCache {
        let client = RegistryClient::new("http://127.0.0.1:1").expect("Failed to build client");
        DiscoveryCache::new(client, Vec::new(), Duration::from_secs(5))
    }

    fn instance(id: &str) -> ServiceInstance {
        ServiceInstance {
            instance_id: id.to_string(),
            host: "127.0.0.1".to_string(),
            port: 8081,
            status: InstanceStatus::Up,
        }
    }

    #[test]
    fn test_unknown_service_is_empty() {
        let cache = cache();
        assert!(cache.instances("backend").is_empty());
    }

    #[test]
    fn test_store_and_read_back() {
        let cache = cache();
        cache.store("backend", vec![instance("a"), instance("b")]);

        let instances = cache.instances("backend");
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].instance_id, "a");
    }

    #[test]
    fn test_store_replaces_previous_snapshot() {
        let cache = cache();
        cache.store("backend", vec![instance("a")]);
        cache.store("backend", vec![instance("b")]);

        let instances = cache.instances("backend");
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].instance_id, "b");
    }

    #[test]
    fn test_reader_snapshot_is_stable_across_store() {
        let cache = cache();
        cache.store("backend", vec![instance("a")]);
        let before = cache.instances("backend");
        cache.store("backend", vec![instance("b")]);

        // The old snapshot stays valid for readers that already loaded it
        assert_eq!(before[0].instance_id, "a");
        assert_eq!(cache.instances("backend")[0].instance_id, "b");
    }
}
