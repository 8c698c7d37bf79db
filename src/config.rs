//! Service configuration.
//!
//! Every field has a default, so an empty JSON object is a complete configuration.

use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerError};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

/// Errors produced while loading or validating configuration.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// The document is not valid JSON for this schema.
    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),
    /// A rate was zero.
    #[error("rate limit for '{service}' must be > 0")]
    ZeroRate {
        /// Service whose default rate was zero.
        service: &'static str,
    },
    /// The quote timeout was zero.
    #[error("quote_timeout_ms must be > 0")]
    ZeroQuoteTimeout,
    /// The order service identity was blank.
    #[error("order_service_identity must not be empty")]
    EmptyIdentity,
    /// Breaker settings were rejected.
    #[error("inventory_call breaker: {0}")]
    Breaker(#[from] CircuitBreakerError),
}

/// Default tokens-per-minute for identities without a stored profile, per service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub order: u32,
    pub product: u32,
    pub inventory: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self { order: 10, product: 15, inventory: 10 }
    }
}

/// Circuit-breaker settings for one remote dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: usize,
    pub recovery_timeout_ms: u64,
    pub half_open_max_calls: usize,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_timeout_ms: 10_000, half_open_max_calls: 1 }
    }
}

impl TryFrom<&BreakerSettings> for CircuitBreakerConfig {
    type Error = CircuitBreakerError;

    fn try_from(settings: &BreakerSettings) -> Result<Self, Self::Error> {
        CircuitBreakerConfig::new(
            settings.failure_threshold,
            Duration::from_millis(settings.recovery_timeout_ms),
            settings.half_open_max_calls,
        )
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    pub rate_limits: RateLimitSettings,
    pub inventory_call: BreakerSettings,
    /// Upper bound on one stock-quote round trip.
    pub quote_timeout_ms: u64,
    /// Identity the order service presents when it calls the inventory service.
    pub order_service_identity: String,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            rate_limits: RateLimitSettings::default(),
            inventory_call: BreakerSettings::default(),
            quote_timeout_ms: 3_000,
            order_service_identity: "order-service".to_string(),
        }
    }
}

impl ShopConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.order_rate()?;
        self.product_rate()?;
        self.inventory_rate()?;
        if self.quote_timeout_ms == 0 {
            return Err(ConfigError::ZeroQuoteTimeout);
        }
        if self.order_service_identity.trim().is_empty() {
            return Err(ConfigError::EmptyIdentity);
        }
        self.breaker_config()?;
        Ok(())
    }

    pub fn order_rate(&self) -> Result<NonZeroU32, ConfigError> {
        non_zero("order", self.rate_limits.order)
    }

    pub fn product_rate(&self) -> Result<NonZeroU32, ConfigError> {
        non_zero("product", self.rate_limits.product)
    }

    pub fn inventory_rate(&self) -> Result<NonZeroU32, ConfigError> {
        non_zero("inventory", self.rate_limits.inventory)
    }

    pub fn quote_timeout(&self) -> Duration {
        Duration::from_millis(self.quote_timeout_ms)
    }

    pub fn breaker_config(&self) -> Result<CircuitBreakerConfig, ConfigError> {
        Ok(CircuitBreakerConfig::try_from(&self.inventory_call)?)
    }
}

fn non_zero(service: &'static str, rate: u32) -> Result<NonZeroU32, ConfigError> {
    NonZeroU32::new(rate).ok_or(ConfigError::ZeroRate { service })
}
