//! Redis Cluster key-value backend
//!
//! Same command set as [`super::RedisKvBackend`] over a cluster-aware pool.
//! A transaction runs on the node owning its keys, so every key in one batch
//! must hash to the same slot.

use super::pipeline;
use crate::errors::StorageError;
use crate::storage::traits::{BatchOp, KvBackend, Result, WriteBatch};
use ::redis::AsyncCommands;
use ::redis::cluster_routing::get_slot;
use async_trait::async_trait;
use deadpool_redis::Runtime;
use deadpool_redis::cluster::{Config, Connection, Pool};

/// Redis Cluster implementation of [`KvBackend`]
pub struct RedisClusterKvBackend {
    pool: Pool,
}

impl RedisClusterKvBackend {
    /// Build a pooled backend from the URLs of one or more cluster nodes
    pub fn from_urls(urls: Vec<String>) -> Result<Self> {
        if urls.is_empty() {
            return Err(StorageError::InvalidData(
                "Redis cluster requires at least one node URL".to_string(),
            ));
        }

        let pool = Config::from_urls(urls)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| {
                StorageError::ConnectionFailed(format!(
                    "Redis cluster pool creation failed: {}",
                    e
                ))
            })?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing cluster pool
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Verify a connection can be obtained and the cluster answers
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn connection(&self) -> Result<Connection> {
        if self.pool.is_closed() {
            return Err(StorageError::ConnectionFailed(
                "Redis cluster pool is closed".to_string(),
            ));
        }
        Ok(self.pool.get().await?)
    }
}

fn check_single_slot(batch: &WriteBatch) -> Result<()> {
    let mut slots = batch.ops().iter().map(|op| match op {
        BatchOp::Set { key, .. } => (key, get_slot(key.as_bytes())),
    });

    let Some((first_key, first_slot)) = slots.next() else {
        return Ok(());
    };
    match slots.find(|(_, slot)| *slot != first_slot) {
        Some((key, _)) => Err(StorageError::InvalidData(format!(
            "batch keys {} and {} map to different cluster slots",
            first_key, key
        ))),
        None => Ok(()),
    }
}

#[async_trait]
impl KvBackend for RedisClusterKvBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn exec(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        check_single_slot(&batch)?;

        let ops = batch.len();
        let mut conn = self.connection().await?;
        let _: () = pipeline(batch).query_async(&mut conn).await?;
        tracing::trace!(ops, "applied redis cluster transaction");
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
