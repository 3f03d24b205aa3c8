//! Redis-backed signal queue
//!
//! Uses plain Redis sets: SADD to announce, SPOP to take, SMEMBERS and SREM
//! to compact.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::OnceCell;
use tracing::debug;

use super::SignalQueue;
use crate::error::{Error, Result};

/// Signal queue shared through Redis (for multi-instance deployments)
pub struct RedisSignalQueue {
    client: redis::Client,
    conn: OnceCell<MultiplexedConnection>,
}

impl RedisSignalQueue {
    /// Create a queue client
    ///
    /// The connection is opened on first use.
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is invalid
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                self.client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| Error::Signal(format!("Redis connection failed: {}", e)))
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl SignalQueue for RedisSignalQueue {
    async fn announce(&self, set: &str, messages: &[String]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let mut conn = self.get_connection().await?;
        let added: i64 = redis::cmd("SADD")
            .arg(set)
            .arg(messages)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Signal(format!("Redis SADD failed: {}", e)))?;

        debug!(set = %set, added, "Signals announced");
        Ok(())
    }

    async fn try_take(&self, set: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        redis::cmd("SPOP")
            .arg(set)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Signal(format!("Redis SPOP failed: {}", e)))
    }

    async fn list(&self, set: &str) -> Result<Vec<String>> {
        let mut conn = self.get_connection().await?;
        redis::cmd("SMEMBERS")
            .arg(set)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Signal(format!("Redis SMEMBERS failed: {}", e)))
    }

    async fn remove(&self, set: &str, messages: &[String]) -> Result<usize> {
        if messages.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_connection().await?;
        let removed: usize = redis::cmd("SREM")
            .arg(set)
            .arg(messages)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Signal(format!("Redis SREM failed: {}", e)))?;

        debug!(set = %set, removed, "Signals removed");
        Ok(removed)
    }
}

#[cfg(all(test, feature = "redis-tests"))]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    #[tokio::test]
    async fn test_announce_list_remove_take() {
        let queue = RedisSignalQueue::new(&redis_url()).unwrap();
        let started = "cloudsync-test:started";
        let stop = "cloudsync-test:stop";
        queue
            .remove(started, &["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        queue
            .announce(started, &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        queue.announce(stop, &["b".to_string()]).await.unwrap();

        let mut members = queue.list(started).await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a", "b"]);

        assert_eq!(queue.remove(started, &["b".to_string()]).await.unwrap(), 1);
        assert_eq!(queue.try_take(started).await.unwrap().as_deref(), Some("a"));
        assert_eq!(queue.try_take(started).await.unwrap(), None);
        assert_eq!(queue.try_take(stop).await.unwrap().as_deref(), Some("b"));
    }
}
