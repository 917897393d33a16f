//! Cancellation and deadlines threaded through reconciliation.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why an operation stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

impl Interrupt {
    /// Turn the interrupt into an entry error for `node`.
    pub fn into_error(self, node: impl std::fmt::Display) -> crate::Error {
        let node = node.to_string();
        match self {
            Self::Cancelled => crate::Error::Cancelled { node },
            Self::DeadlineExceeded => crate::Error::DeadlineExceeded { node },
        }
    }
}

/// Read side of a cancellation signal, optionally bounded by a deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    signal: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that never fires.
    pub fn none() -> Self {
        Self::default()
    }

    /// Add an absolute deadline. The earlier of two deadlines wins.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    /// Add a deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Deadline, if any.
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check whether the operation should stop now.
    pub fn check(&self) -> Result<(), Interrupt> {
        if self.signal.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Err(Interrupt::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Interrupt::DeadlineExceeded);
        }
        Ok(())
    }

    /// Sleep for `duration`, waking early on cancellation or deadline.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupt> {
        self.check()?;

        let wake = self
            .deadline
            .map_or(Instant::now() + duration, |d| d.min(Instant::now() + duration));

        let mut signal = self.signal.clone();
        let cancelled = async move {
            match signal.as_mut() {
                // A dropped handle can no longer cancel.
                Some(rx) => {
                    let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
                    if closed {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            () = tokio::time::sleep_until(wake) => {}
            () = cancelled => {}
        }

        self.check()
    }
}

/// Write side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Create a handle and its first token.
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        let token = CancelToken {
            signal: Some(rx),
            deadline: None,
        };
        (Self { tx }, token)
    }

    /// Another token observing this handle.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            signal: Some(self.tx.subscribe()),
            deadline: None,
        }
    }

    /// Signal cancellation to every token.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation was signalled.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}
