//! Client registration store over any [`KvBackend`].
//!
//! Keys are `namespace + entity prefix + id`. Client records and permission
//! lists use separate entity prefixes so the same id never collides across
//! the two.

use crate::errors::StorageError;
use crate::oauth::types::{ClientInfo, ClientPermission, StoredClient};
use crate::storage::context::RequestContext;
use crate::storage::traits::{ClientStore, KvBackend, Result, WriteBatch};
use async_trait::async_trait;
use std::time::Duration;

/// Entity prefix for client registration records
pub const CLIENT_INFO_PREFIX: &str = "oauth2:client:";

/// Entity prefix for client permission lists
pub const CLIENT_PERMISSIONS_PREFIX: &str = "oauth2:client-permissions:";

/// OAuth2 client store persisting JSON records in a key-value backend
pub struct KvClientStore<B> {
    backend: B,
    namespace: String,
    operation_timeout: Option<Duration>,
}

impl<B: KvBackend> KvClientStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_namespace(backend, "")
    }

    /// Create a store whose keys are all prefixed by `namespace`
    pub fn with_namespace(backend: B, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            operation_timeout: None,
        }
    }

    /// Bound every backend call by `timeout` unless the caller's context
    /// already has an earlier deadline
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout).filter(|timeout| !timeout.is_zero());
        self
    }

    fn wrapper_key(&self, prefix: &str, id: &str) -> String {
        format!("{}{}{}", self.namespace, prefix, id)
    }

    fn client_key(&self, id: &str) -> String {
        self.wrapper_key(CLIENT_INFO_PREFIX, id)
    }

    fn permissions_key(&self, client_id: &str) -> String {
        self.wrapper_key(CLIENT_PERMISSIONS_PREFIX, client_id)
    }

    fn scoped(&self, ctx: &RequestContext) -> RequestContext {
        match self.operation_timeout {
            Some(timeout) => ctx.clone().with_timeout(timeout),
            None => ctx.clone(),
        }
    }

    /// Write one key with no expiration inside an atomic batch
    async fn set_atomic(&self, ctx: &RequestContext, key: String, value: Vec<u8>) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.set(key, value, None);
        self.scoped(ctx).run(self.backend.exec(batch)).await
    }

    async fn read(&self, ctx: &RequestContext, key: &str) -> Result<Option<Vec<u8>>> {
        self.scoped(ctx).run(self.backend.get(key)).await
    }
}

fn decode_client(key: &str, payload: &[u8]) -> Result<ClientInfo> {
    let stored: StoredClient = serde_json::from_slice(payload).map_err(|e| {
        StorageError::DeserializationFailed(format!("client record at {}: {}", key, e))
    })?;
    ClientInfo::try_from(stored)
}

fn decode_permissions(key: &str, payload: &[u8]) -> Result<Vec<ClientPermission>> {
    serde_json::from_slice(payload).map_err(|e| {
        StorageError::DeserializationFailed(format!("permission list at {}: {}", key, e))
    })
}

#[async_trait]
impl<B: KvBackend> ClientStore for KvClientStore<B> {
    async fn create_client(&self, ctx: &RequestContext, client: &ClientInfo) -> Result<()> {
        let payload = serde_json::to_vec(&StoredClient::from(client))
            .map_err(|e| StorageError::SerializationFailed(e.to_string()))?;

        if client.id().is_empty() {
            tracing::debug!("skipping client write with empty id");
            return Ok(());
        }

        let key = self.client_key(client.id());
        self.set_atomic(ctx, key, payload).await?;
        tracing::debug!(
            client_id = %client.id(),
            grant_type = %client.grant_type(),
            "stored client"
        );
        Ok(())
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> Result<Option<ClientInfo>> {
        let key = self.client_key(id);
        match self.read(ctx, &key).await? {
            Some(payload) => decode_client(&key, &payload).map(Some),
            None => Ok(None),
        }
    }

    async fn remove_client_info_by_id(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        let key = self.client_key(id);
        self.scoped(ctx).run(self.backend.delete(&key)).await?;
        tracing::debug!(client_id = %id, "removed client");
        Ok(())
    }

    async fn create_client_permission(
        &self,
        ctx: &RequestContext,
        client_id: &str,
        permissions: &[ClientPermission],
    ) -> Result<()> {
        let payload = serde_json::to_vec(permissions)
            .map_err(|e| StorageError::SerializationFailed(e.to_string()))?;

        if client_id.is_empty() {
            tracing::debug!("skipping permission write with empty client id");
            return Ok(());
        }

        let key = self.permissions_key(client_id);
        self.set_atomic(ctx, key, payload).await?;
        tracing::debug!(
            client_id = %client_id,
            count = permissions.len(),
            "stored client permissions"
        );
        Ok(())
    }

    async fn get_permission_by_id(
        &self,
        ctx: &RequestContext,
        client_id: &str,
    ) -> Result<Vec<ClientPermission>> {
        let key = self.permissions_key(client_id);
        match self.read(ctx, &key).await? {
            Some(payload) => decode_permissions(&key, &payload),
            None => Ok(Vec::new()),
        }
    }

    async fn close(&self) -> Result<()> {
        self.backend.close().await
    }
}

const _: fn() = || {
    fn assert_client_store<T: ClientStore + Send + Sync + 'static>() {}
    assert_client_store::<KvClientStore<crate::storage::inmemory::MemoryKvBackend>>();
    #[cfg(feature = "redis")]
    assert_client_store::<KvClientStore<crate::storage::redis::RedisKvBackend>>();
    #[cfg(feature = "redis-cluster")]
    assert_client_store::<KvClientStore<crate::storage::redis::RedisClusterKvBackend>>();
};
