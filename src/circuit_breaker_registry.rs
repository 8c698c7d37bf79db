//! Registry of named circuit breakers.
//!
//! Services take their breaker from here at wiring time; operators use the same registry to
//! inspect, force open, or reset a breaker by name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::clock::Clock;
use tracing::warn;

/// Errors from breaker registries.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BreakerRegistryError {
    /// The requested circuit breaker name was not found.
    #[error("circuit breaker '{name}' not found")]
    NotFound {
        /// Name that could not be located.
        name: String,
    },
}

/// In-memory registry backed by an RwLock. Clones share entries.
#[derive(Default, Clone, Debug)]
pub struct BreakerRegistry {
    inner: Arc<RwLock<HashMap<String, CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a breaker under its own name, overwriting any existing entry.
    ///
    /// The replaced breaker keeps working for whoever still holds it, but is no longer
    /// reachable through the registry.
    pub fn register(&self, breaker: CircuitBreaker) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let name = breaker.name().to_string();
        if map.contains_key(&name) {
            warn!(target: "shopit::circuit_breaker_registry", name = %name, "circuit breaker name replaced; last registration wins");
        }
        map.insert(name, breaker);
    }

    /// Return the breaker named `name`, creating it from `config` if absent.
    pub fn get_or_create(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> CircuitBreaker {
        if let Some(existing) = self.get(name) {
            return existing;
        }
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.entry(name.to_string())
            .or_insert_with(|| CircuitBreaker::new(name, config).with_clock(clock))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }

    /// Hold a breaker open until it is reset.
    pub fn force_open(&self, name: &str) -> Result<(), BreakerRegistryError> {
        self.lookup(name).map(|breaker| breaker.force_open())
    }

    /// Close a breaker and clear its failure count.
    pub fn reset(&self, name: &str) -> Result<(), BreakerRegistryError> {
        self.lookup(name).map(|breaker| breaker.reset())
    }

    /// Breaker states sorted by name.
    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<(String, CircuitState)> =
            map.iter().map(|(k, v)| (k.clone(), v.state())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn lookup(&self, name: &str) -> Result<CircuitBreaker, BreakerRegistryError> {
        self.get(name).ok_or_else(|| BreakerRegistryError::NotFound { name: name.to_string() })
    }
}
