//! Environment-based configuration for the client store.

use anyhow::Result;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::storage::{StorageBackend, StoreOptions, parse_storage_backend};

/// Key namespace shared by every key of one store instance
#[derive(Clone, Debug, Default)]
pub struct KeyNamespace(String);

/// Per-operation backend timeout, `None` when disabled
#[derive(Clone, Debug)]
pub struct OperationTimeout(Option<Duration>);

/// Main application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub version: String,
    pub storage_backend: String,
    pub redis_url: Option<String>,
    pub key_namespace: KeyNamespace,
    pub operation_timeout: OperationTimeout,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let redis_url = optional_env("REDIS_URL");
        let storage_backend = default_env(
            "STORAGE_BACKEND",
            default_storage_backend(redis_url.as_deref()),
        );
        let key_namespace: KeyNamespace = optional_env("KEY_NAMESPACE").into();
        let operation_timeout: OperationTimeout =
            default_env("OPERATION_TIMEOUT", "5s").try_into()?;

        Ok(Self {
            version: version()?,
            storage_backend,
            redis_url,
            key_namespace,
            operation_timeout,
        })
    }

    /// Resolve the configured backend name and URL
    pub fn backend(&self) -> Result<StorageBackend> {
        Ok(parse_storage_backend(
            &self.storage_backend,
            self.redis_url.as_deref(),
        )?)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            namespace: self.key_namespace.as_ref().clone(),
            operation_timeout: *self.operation_timeout.as_ref(),
        }
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

/// Backend used when `STORAGE_BACKEND` is unset: redis once a URL is given
fn default_storage_backend(redis_url: Option<&str>) -> &'static str {
    if redis_url.is_some_and(|url| !url.trim().is_empty()) {
        "redis"
    } else {
        "memory"
    }
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

impl From<Option<String>> for KeyNamespace {
    fn from(value: Option<String>) -> Self {
        Self(value.unwrap_or_default())
    }
}

impl From<String> for KeyNamespace {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<String> for KeyNamespace {
    fn as_ref(&self) -> &String {
        &self.0
    }
}

impl TryFrom<String> for OperationTimeout {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.is_empty() || value == "0" {
            return Ok(Self(None));
        }

        let duration = duration_str::parse(value)
            .map_err(|e| ConfigError::DurationParsingFailed(value.to_string(), e.to_string()))?;
        Ok(Self(Some(duration).filter(|duration| !duration.is_zero())))
    }
}

impl AsRef<Option<Duration>> for OperationTimeout {
    fn as_ref(&self) -> &Option<Duration> {
        &self.0
    }
}
