//! In-memory key-value backend
//!
//! Batches are applied under a single write lock, so readers never observe a
//! partially applied batch. Failure injection hooks let tests exercise the
//! store's error paths without a network.

use crate::errors::StorageError;
use crate::storage::traits::{BatchOp, KvBackend, Result, WriteBatch};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// In-memory implementation of [`KvBackend`]
#[derive(Default)]
pub struct MemoryKvBackend {
    entries: RwLock<HashMap<String, Entry>>,
    closed: AtomicBool,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
    exec_count: AtomicUsize,
}

impl MemoryKvBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every command fail as if the connection was lost
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every command by `latency`
    pub fn set_latency(&self, latency: Duration) {
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(latency_ms, Ordering::SeqCst);
    }

    /// Number of batches applied so far
    pub fn exec_count(&self) -> usize {
        self.exec_count.load(Ordering::SeqCst)
    }

    /// Live keys currently stored
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Store raw bytes under `key`, bypassing any encoding
    pub async fn insert_raw(&self, key: impl Into<String>, value: Vec<u8>) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: None,
            },
        );
    }

    async fn ready(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::ConnectionFailed(
                "memory backend is closed".to_string(),
            ));
        }

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::ConnectionFailed(
                "memory backend is unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl KvBackend for MemoryKvBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ready().await?;

        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn exec(&self, batch: WriteBatch) -> Result<()> {
        self.ready().await?;

        let now = Instant::now();
        let mut entries = self.entries.write().await;
        for op in batch.into_ops() {
            match op {
                BatchOp::Set { key, value, ttl } => {
                    let expires_at = ttl.filter(|ttl| !ttl.is_zero()).map(|ttl| now + ttl);
                    entries.insert(key, Entry { value, expires_at });
                }
            }
        }
        self.exec_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ready().await?;

        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.entries.write().await.clear();
        Ok(())
    }
}
