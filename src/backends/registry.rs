//! Immutable backend registry with a lock-free selection cursor

use std::sync::atomic::AtomicUsize;

use super::node::{parse_backend_url, Backend};
use super::strategy::Strategy;
use crate::config::AppConfig;

/// Startup failures while building the registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid backend address '{address}' in service '{service}': {reason}")]
    InvalidBackendAddress {
        service: String,
        address: String,
        reason: String,
    },

    #[error("No backends configured: at least one replica is required")]
    EmptyRegistry,

    #[error("Unsupported load balancer strategy: '{0}'. Supported: RoundRobin")]
    UnsupportedStrategy(String),
}

/// Ordered, immutable set of backends plus the shared cursor.
///
/// Built once at startup; the backend list never changes afterwards, so it is
/// read without synchronization. The cursor is the only mutable state.
pub struct BackendRegistry {
    backends: Vec<Backend>,
    cursor: AtomicUsize,
    strategy: Strategy,
}

impl BackendRegistry {
    /// Build the registry from configuration, flattening replicas in service order
    pub fn from_config(config: &AppConfig) -> Result<Self, RegistryError> {
        let strategy: Strategy = config.strategy.parse()?;

        let mut backends = Vec::with_capacity(config.replica_count());
        for service in &config.services {
            for address in &service.replicas {
                let url = parse_backend_url(&service.name, address)?;
                let backend = Backend::from_config(url, &config.forwarding).map_err(|e| {
                    RegistryError::InvalidBackendAddress {
                        service: service.name.clone(),
                        address: address.clone(),
                        reason: e.to_string(),
                    }
                })?;
                backends.push(backend);
            }
        }

        Self::new(backends, strategy)
    }

    pub fn new(backends: Vec<Backend>, strategy: Strategy) -> Result<Self, RegistryError> {
        if backends.is_empty() {
            return Err(RegistryError::EmptyRegistry);
        }
        Ok(Self {
            backends,
            cursor: AtomicUsize::new(0),
            strategy,
        })
    }

    /// Advance the cursor and return the selected index, always in `[0, len)`
    pub fn next_index(&self) -> usize {
        self.strategy.next_index(&self.cursor, self.backends.len())
    }

    /// Select the next backend according to the strategy
    pub fn next(&self) -> &Backend {
        &self.backends[self.next_index()]
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Always false for a constructed registry
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ForwardingConfig, ServiceConfig};

    fn make_config(strategy: &str, services: &[(&str, Vec<&str>)]) -> AppConfig {
        AppConfig {
            strategy: strategy.to_string(),
            services: services
                .iter()
                .map(|(name, replicas)| ServiceConfig {
                    name: name.to_string(),
                    replicas: replicas.iter().map(|r| r.to_string()).collect(),
                })
                .collect(),
            forwarding: ForwardingConfig::default(),
        }
    }

    fn urls(registry: &BackendRegistry) -> Vec<&str> {
        registry.backends().iter().map(|b| b.base_url()).collect()
    }

    #[test]
    fn test_flattened_order() {
        let config = make_config(
            "RoundRobin",
            &[
                ("api", vec!["http://127.0.0.1:8081", "http://127.0.0.1:8082"]),
                ("web", vec!["http://127.0.0.1:9001"]),
            ],
        );
        let registry = BackendRegistry::from_config(&config).unwrap();

        assert_eq!(registry.len(), 3);
        assert!(!registry.is_empty());
        assert_eq!(
            urls(&registry),
            vec!["http://127.0.0.1:8081", "http://127.0.0.1:8082", "http://127.0.0.1:9001"]
        );
    }

    #[test]
    fn test_round_robin_cycling() {
        let config = make_config(
            "RoundRobin",
            &[("svc", vec!["http://localhost:8080", "http://localhost:8081", "http://localhost:8082"])],
        );
        let registry = BackendRegistry::from_config(&config).unwrap();

        assert_eq!(registry.next().base_url(), "http://localhost:8080");
        assert_eq!(registry.next().base_url(), "http://localhost:8081");
        assert_eq!(registry.next().base_url(), "http://localhost:8082");
        assert_eq!(registry.next().base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_cycle_for_each_size() {
        let addresses: Vec<String> = (0..7).map(|i| format!("http://127.0.0.1:{}", 9000 + i)).collect();

        for n in 1..=addresses.len() {
            let replicas: Vec<&str> = addresses[..n].iter().map(String::as_str).collect();
            let config = make_config("RoundRobin", &[("svc", replicas)]);
            let registry = BackendRegistry::from_config(&config).unwrap();

            let first_round: Vec<usize> = (0..n).map(|_| registry.next_index()).collect();
            assert_eq!(first_round, (0..n).collect::<Vec<_>>());
            assert_eq!(registry.next_index(), 0);
        }
    }

    #[test]
    fn test_concurrent_selection_is_balanced() {
        let config = make_config(
            "RoundRobin",
            &[("svc", vec!["http://127.0.0.1:9001", "http://127.0.0.1:9002", "http://127.0.0.1:9003"])],
        );
        let registry = BackendRegistry::from_config(&config).unwrap();
        let threads = 8;
        let per_thread = 1001;

        let registry = &registry;
        let mut counts = vec![0usize; registry.len()];
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    scope.spawn(move || {
                        let mut local = vec![0usize; registry.len()];
                        for _ in 0..per_thread {
                            local[registry.next_index()] += 1;
                        }
                        local
                    })
                })
                .collect();

            for handle in handles {
                for (total, n) in counts.iter_mut().zip(handle.join().unwrap()) {
                    *total += n;
                }
            }
        });

        assert_eq!(counts.iter().sum::<usize>(), threads * per_thread);
        let max = *counts.iter().max().unwrap();
        let min = *counts.iter().min().unwrap();
        assert!(max - min <= 1, "unbalanced counts: {:?}", counts);
    }

    #[test]
    fn test_empty_registry_error() {
        let config = make_config("RoundRobin", &[("svc", vec![]), ("other", vec![])]);
        let result = BackendRegistry::from_config(&config);
        assert!(matches!(result, Err(RegistryError::EmptyRegistry)));

        let config = make_config("RoundRobin", &[]);
        assert!(matches!(
            BackendRegistry::from_config(&config),
            Err(RegistryError::EmptyRegistry)
        ));
    }

    #[test]
    fn test_invalid_address_rejects_whole_config() {
        let config = make_config(
            "RoundRobin",
            &[
                ("good", vec!["http://127.0.0.1:9001"]),
                ("bad", vec!["http://127.0.0.1:9002", "not a url"]),
            ],
        );
        let err = BackendRegistry::from_config(&config).err().unwrap();
        match &err {
            RegistryError::InvalidBackendAddress { service, address, .. } => {
                assert_eq!(service, "bad");
                assert_eq!(address, "not a url");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_address_with_query_rejected() {
        let config = make_config("RoundRobin", &[("api", vec!["http://127.0.0.1:9001/api?x=1"])]);
        let err = BackendRegistry::from_config(&config).err().unwrap();
        assert!(matches!(
            err,
            RegistryError::InvalidBackendAddress { ref address, .. } if address == "http://127.0.0.1:9001/api?x=1"
        ));
    }

    #[test]
    fn test_unsupported_strategy() {
        let config = make_config("Weighted", &[("svc", vec!["http://127.0.0.1:9001"])]);
        let err = BackendRegistry::from_config(&config).err().unwrap();
        assert!(matches!(err, RegistryError::UnsupportedStrategy(ref s) if s == "Weighted"));
    }

    #[test]
    fn test_strategy_accessor() {
        let config = make_config("round_robin", &[("svc", vec!["http://127.0.0.1:9001"])]);
        let registry = BackendRegistry::from_config(&config).unwrap();
        assert_eq!(registry.strategy(), Strategy::RoundRobin);
    }

    #[test]
    fn test_new_with_no_backends() {
        assert!(matches!(
            BackendRegistry::new(vec![], Strategy::RoundRobin),
            Err(RegistryError::EmptyRegistry)
        ));
    }
}
