//! Load balancing strategies for distributing requests across instances

use discovery_core::{InstanceStatus, ServiceInstance};
use rand::Rng;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Load balancing strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancingStrategy {
    /// Distribute requests evenly across instances
    RoundRobin,
    /// Pick a uniformly random instance per request
    Random,
}

impl Default for LoadBalancingStrategy {
    fn default() -> Self {
        LoadBalancingStrategy::RoundRobin
    }
}

/// Selects an UP instance for each request according to the strategy.
pub struct LoadBalancer {
    strategy: LoadBalancingStrategy,
    round_robin_counter: AtomicUsize,
}

impl LoadBalancer {
    /// Create a new load balancer with the specified strategy
    pub fn new(strategy: LoadBalancingStrategy) -> Self {
        Self {
            strategy,
            round_robin_counter: AtomicUsize::new(0),
        }
    }

    pub fn strategy(&self) -> LoadBalancingStrategy {
        self.strategy
    }

    /// Select an instance, skipping any whose id is in `exclude`.
    ///
    /// Exclusion lets the caller retry a failed connect against a different
    /// instance from the same discovery snapshot.
    pub fn select<'a>(
        &self,
        instances: &'a [ServiceInstance],
        exclude: &[&str],
    ) -> Option<&'a ServiceInstance> {
        let candidates: Vec<&'a ServiceInstance> = instances
            .iter()
            .filter(|instance| instance.status == InstanceStatus::Up)
            .filter(|instance| !exclude.contains(&instance.instance_id.as_str()))
            .collect();

        if candidates.is_empty() {
            return None;
        }

        match self.strategy {
            LoadBalancingStrategy::RoundRobin => {
                let current = self.round_robin_counter.fetch_add(1, Ordering::SeqCst);
                candidates.get(current % candidates.len()).copied()
            }
            LoadBalancingStrategy::Random => {
                let index = rand::thread_rng().gen_range(0..candidates.len());
                candidates.get(index).copied()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instances(ids: &[&str]) -> Vec<ServiceInstance> {
        ids.iter()
            .map(|id| ServiceInstance {
                instance_id: id.to_string(),
                host: "127.0.0.1".to_string(),
                port: 8081,
                status: InstanceStatus::Up,
            })
            .collect()
    }

    #[test]
    fn test_round_robin_cycles() {
        let balancer = LoadBalancer::new(LoadBalancingStrategy::RoundRobin);
        let pool = instances(&["a", "b", "c"]);

        let picked: Vec<&str> = (0..6)
            .map(|_| {
                balancer
                    .select(&pool, &[])
                    .expect("Should select an instance")
                    .instance_id
                    .as_str()
            })
            .collect();
        assert_eq!(picked, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn test_empty_pool_returns_none() {
        let balancer = LoadBalancer::new(LoadBalancingStrategy::RoundRobin);
        assert!(balancer.select(&[], &[]).is_none());
    }

    #[test]
    fn test_non_up_instances_skipped() {
        let balancer = LoadBalancer::new(LoadBalancingStrategy::RoundRobin);
        let mut pool = instances(&["a", "b"]);
        pool[0].status = InstanceStatus::Starting;

        for _ in 0..4 {
            let selected = balancer.select(&pool, &[]).expect("Should select");
            assert_eq!(selected.instance_id, "b");
        }
    }

    #[test]
    fn test_exclusion_picks_other_instance() {
        let balancer = LoadBalancer::new(LoadBalancingStrategy::RoundRobin);
        let pool = instances(&["a", "b"]);

        for _ in 0..4 {
            let selected = balancer.select(&pool, &["a"]).expect("Should select");
            assert_eq!(selected.instance_id, "b");
        }
        assert!(balancer.select(&pool, &["a", "b"]).is_none());
    }

    #[test]
    fn test_random_selects_from_pool() {
        let balancer = LoadBalancer::new(LoadBalancingStrategy::Random);
        let pool = instances(&["a", "b", "c"]);

        for _ in 0..20 {
            let selected = balancer.select(&pool, &[]).expect("Should select");
            assert!(["a", "b", "c"].contains(&selected.instance_id.as_str()));
        }
    }
}
