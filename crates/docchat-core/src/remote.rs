//! Timeout-bounded, cancellable execution of remote calls.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Bounds every remote call with a timeout and a shared cancellation token.
///
/// Calls are awaited one at a time by their owner; the guard only races the
/// call against the clock and the token.
#[derive(Debug, Clone)]
pub struct CallGuard {
    timeout: Duration,
    cancel: CancellationToken,
}

impl CallGuard {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self { Self { timeout, cancel } }

    pub fn timeout(&self) -> Duration { self.timeout }
    pub fn token(&self) -> &CancellationToken { &self.cancel }
    pub fn is_cancelled(&self) -> bool { self.cancel.is_cancelled() }

    pub async fn run<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled { operation: operation.to_string() });
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled { operation: operation.to_string() }),
            out = tokio::time::timeout(self.timeout, call) => match out {
                Ok(res) => res,
                Err(_) => {
                    tracing::warn!(operation, timeout_secs = self.timeout.as_secs(), "remote call timed out");
                    Err(Error::Timeout { operation: operation.to_string(), after: self.timeout })
                }
            },
        }
    }
}

impl Default for CallGuard {
    fn default() -> Self { Self::new(Duration::from_secs(60), CancellationToken::new()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_result() {
        let guard = CallGuard::default();
        let out = guard.run("noop", async { Ok::<_, Error>(7) }).await.expect("ok");
        assert_eq!(out, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let guard = CallGuard::new(Duration::from_secs(1), CancellationToken::new());
        let err = guard
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, Error>(())
            })
            .await
            .expect_err("timeout");
        assert!(matches!(err, Error::Timeout { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let guard = CallGuard::new(Duration::from_secs(1), token);
        let err = guard.run("embed", async { Ok::<_, Error>(()) }).await.expect_err("cancelled");
        assert!(matches!(err, Error::Cancelled { ref operation } if operation == "embed"));
    }
}
