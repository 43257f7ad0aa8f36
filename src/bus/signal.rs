//! # Subscription cancellation signal.
//!
//! A [`Signal`] is what ends a subscription: a [`CancellationToken`] plus an
//! optional deadline. Cancelling the token is a normal stop; hitting the deadline
//! first is reported as [`BusError::DeadlineExceeded`].

use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::BusError;

/// Why a [`Signal`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// The token was cancelled.
    Cancelled,
    /// The deadline passed first.
    DeadlineExceeded,
}

impl Stop {
    /// Terminal value for a subscription stopped for this reason.
    pub fn into_result(self) -> Result<(), BusError> {
        match self {
            Stop::Cancelled => Ok(()),
            Stop::DeadlineExceeded => Err(BusError::DeadlineExceeded),
        }
    }
}

/// Caller-owned signal that ends a subscription.
///
/// Cloning shares the token; cancelling any clone (or a parent token) fires it.
#[derive(Debug, Clone)]
pub struct Signal {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Signal {
    /// Signal without a deadline.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Signal that also fires at `deadline`.
    pub fn with_deadline(token: CancellationToken, deadline: Instant) -> Self {
        Self {
            token,
            deadline: Some(deadline),
        }
    }

    /// Signal that also fires `timeout` from now.
    pub fn with_timeout(token: CancellationToken, timeout: Duration) -> Self {
        Self::with_deadline(token, Instant::now() + timeout)
    }

    /// Underlying token.
    #[inline]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Deadline, if any.
    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Completes when the signal fires. Cancellation wins a tie with the deadline.
    pub async fn done(&self) -> Stop {
        match self.deadline {
            Some(at) => tokio::select! {
                biased;
                _ = self.token.cancelled() => Stop::Cancelled,
                _ = time::sleep_until(at) => Stop::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                Stop::Cancelled
            }
        }
    }
}

impl From<CancellationToken> for Signal {
    fn from(token: CancellationToken) -> Self {
        Self::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_is_not_an_error() {
        let token = CancellationToken::new();
        let sig = Signal::from(token.clone());
        token.cancel();
        let stop = sig.done().await;
        assert_eq!(stop, Stop::Cancelled);
        assert_eq!(stop.into_result(), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_an_error() {
        let sig = Signal::with_timeout(CancellationToken::new(), Duration::from_secs(5));
        let stop = sig.done().await;
        assert_eq!(stop, Stop::DeadlineExceeded);
        assert_eq!(stop.into_result(), Err(BusError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wins_tie() {
        let token = CancellationToken::new();
        let sig = Signal::with_deadline(token.clone(), Instant::now());
        token.cancel();
        assert_eq!(sig.done().await, Stop::Cancelled);
    }
}
