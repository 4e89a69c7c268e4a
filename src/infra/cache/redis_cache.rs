// Optional Redis-backed cache.
//
// This is a pass-through wrapper: get/setex/delete/ttl forwarded to Redis,
// nothing more. What to cache and for how long is decided by callers. When no
// REDIS_URL is configured (or the connection fails at startup) the wrapper is
// a guaranteed no-op: every read misses, every write is dropped, and no call
// ever surfaces an error.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub struct RedisCache {
    conn: Option<ConnectionManager>,
}

impl RedisCache {
    /// A cache with no backing store. All operations are no-ops.
    pub fn disabled() -> Self {
        Self { conn: None }
    }

    /// Connect to Redis if a URL is configured.
    ///
    /// Connection problems are reported once as a warning here; afterwards
    /// the bot runs exactly as if no cache was configured.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else {
            tracing::info!("No cache URL configured, running without Redis");
            return Self::disabled();
        };

        let client = match redis::Client::open(url) {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!("Invalid Redis URL, running without cache: {err}");
                return Self::disabled();
            }
        };

        match ConnectionManager::new(client).await {
            Ok(conn) => {
                tracing::info!("Connected to Redis");
                Self { conn: Some(conn) }
            }
            Err(err) => {
                tracing::warn!("Failed to connect to Redis, running without cache: {err}");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    /// Get a value. `None` on miss, on error, or when disabled.
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone()?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, "Cache get failed: {err}");
                None
            }
        }
    }

    /// Set a value with an expiry in seconds.
    pub async fn setex(&self, key: &str, seconds: u64, value: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        if let Err(err) = conn.set_ex::<_, _, ()>(key, value, seconds).await {
            tracing::warn!(key, "Cache setex failed: {err}");
        }
    }

    /// Delete a key. Deleting a missing key is not an error.
    pub async fn delete(&self, key: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        if let Err(err) = conn.del::<_, ()>(key).await {
            tracing::warn!(key, "Cache delete failed: {err}");
        }
    }

    /// Remaining time-to-live in seconds.
    ///
    /// `None` when disabled, on error, or when the key does not exist;
    /// `Some(-1)` is passed through for keys without an expiry.
    pub async fn ttl(&self, key: &str) -> Option<i64> {
        let mut conn = self.conn.clone()?;
        match conn.ttl::<_, i64>(key).await {
            // -2 is Redis for "no such key".
            Ok(-2) => None,
            Ok(secs) => Some(secs),
            Err(err) => {
                tracing::warn!(key, "Cache ttl failed: {err}");
                None
            }
        }
    }

    /// Get and deserialize a JSON value. A corrupt entry counts as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, "Discarding corrupt cache entry: {err}");
                self.delete(key).await;
                None
            }
        }
    }

    /// Serialize and store a JSON value with an expiry in seconds.
    pub async fn setex_json<T: Serialize>(&self, key: &str, seconds: u64, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.setex(key, seconds, &raw).await,
            Err(err) => tracing::warn!(key, "Cache serialization failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The properties worth pinning down are the disabled-mode ones: every
    // operation declines to act and nothing panics or errors.

    #[tokio::test]
    async fn test_disabled_cache_is_a_noop() {
        let cache = RedisCache::disabled();

        assert!(!cache.is_enabled());
        cache.setex("key", 60, "value").await;
        assert_eq!(cache.get("key").await, None);
        assert_eq!(cache.ttl("key").await, None);
        cache.delete("key").await;
    }

    #[tokio::test]
    async fn test_connect_without_url_disables() {
        let cache = RedisCache::connect(None).await;
        assert!(!cache.is_enabled());
        assert_eq!(cache.get("anything").await, None);
    }

    #[tokio::test]
    async fn test_invalid_url_disables() {
        let cache = RedisCache::connect(Some("not-a-redis-url")).await;
        assert!(!cache.is_enabled());
        cache.setex("key", 60, "value").await;
        assert_eq!(cache.get("key").await, None);
    }

    #[tokio::test]
    async fn test_disabled_json_helpers_are_noops() {
        let cache = RedisCache::disabled();

        cache.setex_json("key", 60, &vec![1u64, 2, 3]).await;
        let value: Option<Vec<u64>> = cache.get_json("key").await;
        assert_eq!(value, None);
    }
}
