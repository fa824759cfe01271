//! Per-call cancellation and deadline handling for storage operations.

use crate::errors::StorageError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline scope for a single storage call.
///
/// The backend future is raced against both; whichever fires first ends the
/// call with [`StorageError::Cancelled`] or [`StorageError::DeadlineExceeded`].
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    cancellation: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancellation: Some(token),
            deadline: None,
        }
    }

    /// Bound the context by `timeout` from now, keeping any earlier deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Drive `operation` to completion unless the context ends first.
    pub async fn run<T, F>(&self, operation: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        let cancelled = async {
            match &self.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(StorageError::Cancelled),
            _ = expired => Err(StorageError::DeadlineExceeded),
            result = operation => result,
        }
    }
}
