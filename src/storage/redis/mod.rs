//! Redis key-value backend
//!
//! Connections come from a `deadpool-redis` pool. Batches are sent as a
//! single atomic pipeline, which Redis executes as `MULTI ... EXEC`.

#[cfg(feature = "redis-cluster")]
mod cluster;

#[cfg(feature = "redis-cluster")]
pub use cluster::RedisClusterKvBackend;

use crate::errors::StorageError;
use crate::storage::traits::{BatchOp, KvBackend, Result, WriteBatch};
use ::redis::AsyncCommands;
use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};

/// Redis implementation of [`KvBackend`]
pub struct RedisKvBackend {
    pool: Pool,
}

impl RedisKvBackend {
    /// Build a pooled backend from a `redis://` URL
    pub fn from_url(redis_url: &str) -> Result<Self> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| {
                StorageError::ConnectionFailed(format!("Redis pool creation failed: {}", e))
            })?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Verify a connection can be obtained and the server answers
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn connection(&self) -> Result<Connection> {
        if self.pool.is_closed() {
            return Err(StorageError::ConnectionFailed(
                "Redis pool is closed".to_string(),
            ));
        }
        Ok(self.pool.get().await?)
    }
}

fn pipeline(batch: WriteBatch) -> ::redis::Pipeline {
    let mut pipe = ::redis::pipe();
    pipe.atomic();
    for op in batch.into_ops() {
        match op {
            BatchOp::Set { key, value, ttl } => {
                pipe.cmd("SET").arg(key).arg(value);
                if let Some(ttl) = ttl.filter(|ttl| !ttl.is_zero()) {
                    pipe.arg("PX")
                        .arg(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));
                }
                pipe.ignore();
            }
        }
    }
    pipe
}

#[async_trait]
impl KvBackend for RedisKvBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn exec(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let ops = batch.len();
        let mut conn = self.connection().await?;
        let _: () = pipeline(batch).query_async(&mut conn).await?;
        tracing::trace!(ops, "applied redis transaction");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close();
        Ok(())
    }
}
