//! Redis cache used in front of read-mostly data
//!
//! Caching is optional: without `REDIS_URL` the service runs uncached. Values
//! are stored as JSON strings with a TTL so stale entries age out on their own.

use anyhow::Result;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{info, warn};

/// Configuration for Redis connection
///
/// All commands share one multiplexed connection, so there is no pool size
/// to configure.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a RedisConfig from environment variables, if caching is enabled
    ///
    /// Returns `None` when `REDIS_URL` is unset.
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())?;

        Some(RedisConfig { url })
    }
}

/// Shared handle on a Redis server
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Open a client; no connection is made until the first command
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis cache configured at {}", config.url);
        Ok(RedisPool { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Store a raw string, expiring after `ttl_seconds` when given
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.connection().await?;
        match ttl_seconds {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    /// Fetch a raw string
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    /// Store `value` as JSON with a TTL
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, Some(ttl_seconds)).await
    }

    /// Fetch and decode a JSON value
    ///
    /// An entry that no longer decodes (for instance after a schema change)
    /// is evicted and reported as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, "Evicting undecodable cache entry: {}", e);
                self.delete(key).await?;
                Ok(None)
            }
        }
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn cache_is_disabled_without_url() {
        unsafe {
            std::env::remove_var("REDIS_URL");
        }
        assert!(RedisConfig::from_env().is_none());
    }

    #[test]
    #[serial]
    fn blank_url_disables_the_cache() {
        unsafe {
            std::env::set_var("REDIS_URL", "  ");
        }
        assert!(RedisConfig::from_env().is_none());
        unsafe {
            std::env::remove_var("REDIS_URL");
        }
    }

    #[test]
    #[serial]
    fn config_reads_env() {
        unsafe {
            std::env::set_var("REDIS_URL", "redis://cache:6380");
        }

        let config = RedisConfig::from_env().expect("cache should be enabled");
        assert_eq!(config.url, "redis://cache:6380");

        unsafe {
            std::env::remove_var("REDIS_URL");
        }
    }

    #[test]
    fn invalid_url_is_rejected() {
        let config = RedisConfig {
            url: "not a url".to_string(),
        };
        assert!(RedisPool::new(&config).is_err());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis on localhost:6379"]
    async fn json_entries_round_trip_and_bad_ones_are_evicted() -> Result<()> {
        let pool = RedisPool::new(&RedisConfig {
            url: "redis://localhost:6379".to_string(),
        })?;
        assert!(pool.health_check().await?);

        pool.set_json("test:prices", &vec![100u64, 250], 5).await?;
        assert_eq!(pool.get_json::<Vec<u64>>("test:prices").await?, Some(vec![100, 250]));

        pool.set("test:broken", "{not json", Some(5)).await?;
        assert_eq!(pool.get_json::<Vec<u64>>("test:broken").await?, None);
        assert_eq!(pool.get("test:broken").await?, None);

        Ok(())
    }
}
