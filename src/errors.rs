//! Standardized error types following the `error-clientstore-<domain>-<number>` format.

use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when version information is not available
    #[error("error-clientstore-config-1 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-clientstore-config-2 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),
}

/// Key-value storage errors.
///
/// Absence of a key is never reported through this type: lookups return
/// `Ok(None)` or an empty list instead.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when the backend connection cannot be obtained or is closed
    #[error("error-clientstore-storage-1 Backend connection failed: {0}")]
    ConnectionFailed(String),

    /// Error when a backend command fails
    #[error("error-clientstore-storage-2 Backend command failed: {0}")]
    CommandFailed(String),

    /// Error when a record cannot be encoded
    #[error("error-clientstore-storage-3 Data serialization failed: {0}")]
    SerializationFailed(String),

    /// Error when a stored payload cannot be decoded
    #[error("error-clientstore-storage-4 Data deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Error when the caller cancelled the operation
    #[error("error-clientstore-storage-5 Operation cancelled")]
    Cancelled,

    /// Error when the operation deadline passed before the backend answered
    #[error("error-clientstore-storage-6 Operation deadline exceeded")]
    DeadlineExceeded,

    /// Error when data validation fails
    #[error("error-clientstore-storage-7 Invalid data: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Payload could not be encoded or decoded.
    pub fn is_encoding(&self) -> bool {
        matches!(
            self,
            StorageError::SerializationFailed(_) | StorageError::DeserializationFailed(_)
        )
    }

    /// Failure originating from the key-value transport, including
    /// cancellation and deadlines.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            StorageError::ConnectionFailed(_)
                | StorageError::CommandFailed(_)
                | StorageError::Cancelled
                | StorageError::DeadlineExceeded
        )
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            StorageError::ConnectionFailed(err.to_string())
        } else if err.is_timeout() {
            StorageError::DeadlineExceeded
        } else {
            StorageError::CommandFailed(err.to_string())
        }
    }
}

#[cfg(feature = "redis")]
impl From<deadpool_redis::PoolError> for StorageError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        match err {
            deadpool_redis::PoolError::Backend(err) => err.into(),
            other => StorageError::ConnectionFailed(other.to_string()),
        }
    }
}
