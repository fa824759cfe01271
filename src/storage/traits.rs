//! Storage trait definitions.
//!
//! `KvBackend` is the minimal command set the client store needs from a
//! key-value engine. `ClientStore` is the interface the authorization server
//! consumes.

use crate::errors::StorageError;
use crate::oauth::types::{ClientInfo, ClientPermission};
use crate::storage::context::RequestContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, StorageError>;

// ===== Key-Value Backend =====

/// A single write queued in a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Set {
        key: String,
        value: Vec<u8>,
        /// `None` stores the key without expiration
        ttl: Option<Duration>,
    },
}

/// Writes applied by [`KvBackend::exec`] as one all-or-nothing unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> &mut Self {
        self.ops.push(BatchOp::Set {
            key: key.into(),
            value,
            ttl,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Trait for key-value engines backing the client store
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Read a key; `Ok(None)` means the key is absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Apply every write in the batch atomically
    async fn exec(&self, batch: WriteBatch) -> Result<()>;

    /// Delete a key; deleting an absent key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// Release the underlying connection or pool
    async fn close(&self) -> Result<()>;
}

#[async_trait]
impl<T: KvBackend + ?Sized> KvBackend for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn exec(&self, batch: WriteBatch) -> Result<()> {
        (**self).exec(batch).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}

// ===== Client Store =====

/// Trait for storing and retrieving OAuth2 clients and their permissions
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Store a client registration. Clients with an empty ID are skipped
    /// without error.
    async fn create_client(&self, ctx: &RequestContext, client: &ClientInfo) -> Result<()>;

    /// Retrieve a client by ID, `None` when it was never stored
    async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> Result<Option<ClientInfo>>;

    /// Delete a client registration
    async fn remove_client_info_by_id(&self, ctx: &RequestContext, id: &str) -> Result<()>;

    /// Replace the permission list of a client. An empty client ID is
    /// skipped without error.
    async fn create_client_permission(
        &self,
        ctx: &RequestContext,
        client_id: &str,
        permissions: &[ClientPermission],
    ) -> Result<()>;

    /// Retrieve the permission list of a client, empty when none is stored
    async fn get_permission_by_id(
        &self,
        ctx: &RequestContext,
        client_id: &str,
    ) -> Result<Vec<ClientPermission>>;

    /// Release the backend
    async fn close(&self) -> Result<()>;
}
