//! Timeout and cancellation around collaborator calls

use ragwise_common::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bounds every external call of a turn by the operation timeout and the
/// turn's cancellation token
#[derive(Clone)]
pub(crate) struct CallGuard {
    token: CancellationToken,
    timeout: Duration,
}

impl CallGuard {
    pub fn new(token: CancellationToken, timeout: Duration) -> Self {
        Self { token, timeout }
    }

    /// Fail with `Cancelled` once the turn has been cancelled
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub async fn call<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(AppError::Cancelled),
            result = tokio::time::timeout(self.timeout, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(AppError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }),
            },
        }
    }
}
