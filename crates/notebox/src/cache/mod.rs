//! Advisory key/value cache.
//!
//! The cache is never authoritative: callers treat a failed read as a miss and
//! only log failed writes. Whether Redis is reachable is decided once at
//! startup by [`connect`]; afterwards handlers hold an `Arc<dyn Cache>` and
//! never check for its presence.

use std::{sync::Arc, time::Duration};

use thiserror::Error;

mod redis;

pub use self::redis::RedisCache;

use crate::config::RedisConfig;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] ::redis::RedisError),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait::async_trait]
pub trait Cache: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Stands in when no cache is configured: every read misses, every write
/// succeeds without storing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait::async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Connect to Redis, falling back to [`NoopCache`] if it is disabled or does
/// not answer a `PING` within the connect timeout.
pub async fn connect(config: &RedisConfig) -> Arc<dyn Cache> {
    if config.disabled {
        tracing::info!("Redis disabled, running without cache");
        return Arc::new(NoopCache);
    }

    match RedisCache::connect(config).await {
        Ok(cache) => {
            tracing::info!(addr = %config.addr(), "Connected to Redis");
            Arc::new(cache)
        }
        Err(e) => {
            tracing::error!(addr = %config.addr(), error = %e, "Failed to connect to Redis");
            Arc::new(NoopCache)
        }
    }
}
