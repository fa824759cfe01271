//! Trait-based client storage over pluggable key-value backends.

pub mod client_store;
pub mod context;
pub mod inmemory;
pub mod traits;

#[cfg(feature = "redis")]
pub mod redis;

// Re-export commonly used types and traits
pub use client_store::{CLIENT_INFO_PREFIX, CLIENT_PERMISSIONS_PREFIX, KvClientStore};
pub use context::RequestContext;
pub use inmemory::MemoryKvBackend;
pub use traits::*;

#[cfg(feature = "redis")]
pub use self::redis::RedisKvBackend;
#[cfg(feature = "redis-cluster")]
pub use self::redis::RedisClusterKvBackend;

use crate::errors::StorageError;
use std::sync::Arc;
use std::time::Duration;

/// Storage backend configuration and factory
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    #[cfg(feature = "redis")]
    Redis(String), // Connection URL
    #[cfg(feature = "redis-cluster")]
    RedisCluster(Vec<String>), // Node URLs
}

/// Options applied to every store built by [`create_client_store`]
#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    pub namespace: String,
    pub operation_timeout: Option<Duration>,
}

/// Create a client store over the configured backend
pub async fn create_client_store(
    backend: StorageBackend,
    options: StoreOptions,
) -> std::result::Result<Arc<dyn ClientStore>, StorageError> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(build_store(MemoryKvBackend::new(), options))),
        #[cfg(feature = "redis")]
        StorageBackend::Redis(redis_url) => {
            let backend = RedisKvBackend::from_url(&redis_url)?;

            // Fail at startup rather than on the first lookup
            backend.ping().await?;
            tracing::info!(namespace = %options.namespace, "connected to redis");

            Ok(Arc::new(build_store(backend, options)))
        }
        #[cfg(feature = "redis-cluster")]
        StorageBackend::RedisCluster(node_urls) => {
            let nodes = node_urls.len();
            let backend = RedisClusterKvBackend::from_urls(node_urls)?;

            backend.ping().await?;
            tracing::info!(namespace = %options.namespace, nodes, "connected to redis cluster");

            Ok(Arc::new(build_store(backend, options)))
        }
    }
}

fn build_store<B: KvBackend + 'static>(backend: B, options: StoreOptions) -> KvClientStore<B> {
    let store = KvClientStore::with_namespace(backend, options.namespace);
    match options.operation_timeout {
        Some(timeout) => store.with_operation_timeout(timeout),
        None => store,
    }
}

/// Parse storage backend from configuration string.
///
/// For `redis-cluster`, `redis_url` is a comma-separated list of node URLs.
#[cfg_attr(not(feature = "redis"), allow(unused_variables))]
pub fn parse_storage_backend(
    backend_name: &str,
    redis_url: Option<&str>,
) -> std::result::Result<StorageBackend, StorageError> {
    match backend_name {
        "memory" => Ok(StorageBackend::Memory),
        #[cfg(feature = "redis")]
        "redis" => {
            let url = redis_url.ok_or_else(|| {
                StorageError::InvalidData("REDIS_URL required for redis backend".to_string())
            })?;
            Ok(StorageBackend::Redis(url.to_string()))
        }
        #[cfg(feature = "redis-cluster")]
        "redis-cluster" => {
            let node_urls: Vec<String> = redis_url
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect();
            if node_urls.is_empty() {
                return Err(StorageError::InvalidData(
                    "REDIS_URL must list at least one node for redis-cluster backend".to_string(),
                ));
            }
            Ok(StorageBackend::RedisCluster(node_urls))
        }
        _ => Err(StorageError::InvalidData(format!(
            "Unknown storage backend: {}",
            backend_name
        ))),
    }
}
