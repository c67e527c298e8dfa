//! Service settings loaded from `STOREFRONT_*` environment variables

use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::domain::StorePolicy;

/// Storefront service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Default tracing filter, overridden by `RUST_LOG`
    pub log_filter: String,
    pub max_write_attempts: u32,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub checkout_timeout_secs: u64,
    /// Lifetime of cached catalog entries when Redis is configured
    pub catalog_cache_ttl_secs: u64,
}

impl ServiceConfig {
    /// Create a new ServiceConfig from environment variables
    ///
    /// # Environment Variables
    /// - `STOREFRONT_HOST` (default: 0.0.0.0)
    /// - `STOREFRONT_PORT` (default: 8000)
    /// - `STOREFRONT_LOG_FILTER` (default: info)
    /// - `STOREFRONT_MAX_WRITE_ATTEMPTS` (default: 3)
    /// - `STOREFRONT_READ_TIMEOUT_SECS` (default: 10)
    /// - `STOREFRONT_WRITE_TIMEOUT_SECS` (default: 5)
    /// - `STOREFRONT_CHECKOUT_TIMEOUT_SECS` (default: 15)
    /// - `STOREFRONT_CATALOG_CACHE_TTL_SECS` (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000)?
            .set_default("log_filter", "info")?
            .set_default("max_write_attempts", 3)?
            .set_default("read_timeout_secs", 10)?
            .set_default("write_timeout_secs", 5)?
            .set_default("checkout_timeout_secs", 15)?
            .set_default("catalog_cache_ttl_secs", 60)?
            .add_source(Environment::with_prefix("STOREFRONT").try_parsing(true))
            .build()?
            .try_deserialize()?;

        if config.max_write_attempts == 0 {
            return Err(ConfigError::Message(
                "STOREFRONT_MAX_WRITE_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Retry and timeout budgets for the domain layer
    pub fn policy(&self) -> StorePolicy {
        StorePolicy {
            max_write_attempts: self.max_write_attempts,
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            write_timeout: Duration::from_secs(self.write_timeout_secs),
            checkout_timeout: Duration::from_secs(self.checkout_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 8] = [
        "STOREFRONT_HOST",
        "STOREFRONT_PORT",
        "STOREFRONT_LOG_FILTER",
        "STOREFRONT_MAX_WRITE_ATTEMPTS",
        "STOREFRONT_READ_TIMEOUT_SECS",
        "STOREFRONT_WRITE_TIMEOUT_SECS",
        "STOREFRONT_CHECKOUT_TIMEOUT_SECS",
        "STOREFRONT_CATALOG_CACHE_TTL_SECS",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_without_env() {
        clear_env();

        let config = ServiceConfig::from_env().unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.catalog_cache_ttl_secs, 60);
        assert_eq!(config.policy(), StorePolicy::default());
    }

    #[test]
    #[serial]
    fn env_overrides_defaults() {
        clear_env();
        unsafe {
            std::env::set_var("STOREFRONT_PORT", "9100");
            std::env::set_var("STOREFRONT_MAX_WRITE_ATTEMPTS", "7");
            std::env::set_var("STOREFRONT_CHECKOUT_TIMEOUT_SECS", "30");
        }

        let config = ServiceConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.port, 9100);
        let policy = config.policy();
        assert_eq!(policy.max_write_attempts, 7);
        assert_eq!(policy.checkout_timeout, Duration::from_secs(30));
        assert_eq!(policy.write_timeout, Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn zero_attempts_is_rejected() {
        clear_env();
        unsafe {
            std::env::set_var("STOREFRONT_MAX_WRITE_ATTEMPTS", "0");
        }

        let result = ServiceConfig::from_env();
        clear_env();

        assert!(result.is_err());
    }
}
