//! Caller-scoped deadline and cancellation.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Deadline and cancellation bound to one request.
///
/// Clones share the same cancellation token, so cancelling any clone cancels
/// all of them.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl RequestContext {
    /// A context that never expires on its own.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: CancellationToken::new(),
        }
    }

    /// A context driven by an existing cancellation token.
    #[must_use]
    pub const fn with_token(token: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { deadline, token }
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The underlying cancellation token.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The terminal error if the context is already done.
    #[must_use]
    pub fn err(&self) -> Option<Error> {
        if self.token.is_cancelled() {
            return Some(Error::Cancelled);
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::Timeout),
            _ => None,
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                () = self.token.cancelled() => Error::Cancelled,
                () = tokio::time::sleep_until(deadline) => Error::Timeout,
            },
            None => {
                self.token.cancelled().await;
                Error::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_yields_timeout() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        assert!(ctx.err().is_none());

        assert!(matches!(ctx.done().await, Error::Timeout));
        assert!(matches!(ctx.err(), Some(Error::Timeout)));
    }

    #[tokio::test]
    async fn test_cancel_yields_cancelled() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(60));
        let clone = ctx.clone();
        clone.cancel();

        assert!(matches!(ctx.done().await, Error::Cancelled));
        assert!(matches!(ctx.err(), Some(Error::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_never_expires() {
        let ctx = RequestContext::background();
        let result = tokio::time::timeout(Duration::from_secs(3600), ctx.done()).await;
        assert!(result.is_err());
        assert!(ctx.err().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_token() {
        let token = CancellationToken::new();
        let ctx = RequestContext::with_token(token.clone(), None);
        assert!(ctx.deadline().is_none());
        assert!(ctx.err().is_none());

        token.cancel();
        assert!(matches!(ctx.done().await, Error::Cancelled));

        // Cancelling through the context reaches the caller's token too.
        let token = CancellationToken::new();
        let deadline = Instant::now() + Duration::from_millis(10);
        let ctx = RequestContext::with_token(token.clone(), Some(deadline));
        assert!(matches!(ctx.done().await, Error::Timeout));
        ctx.cancel();
        assert!(token.is_cancelled());
    }
}
