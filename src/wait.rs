//! Polling until provider state converges.
//!
//! [`StateWaiter::wait_until`] repeatedly runs a query and returns the first
//! state accepted by a predicate. Every loop is bounded by a deadline and by
//! a budget of consecutive query failures, and can be interrupted through a
//! [`CancelToken`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, warn};

/// Default delay between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default upper bound for a single wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(20 * 60);
/// Default number of consecutive failed queries tolerated by a wait.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Errors raised by bounded waits.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum WaitError {
    /// The predicate did not hold before the deadline.
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout {
        /// Description of the awaited condition.
        what: String,
        /// Configured upper bound.
        waited: Duration,
    },
    /// The wait was interrupted by the caller.
    #[error("cancelled while waiting for {what}")]
    Cancelled {
        /// Description of the awaited condition.
        what: String,
    },
    /// The query kept failing.
    #[error("giving up waiting for {what} after {attempts} failed queries: {last_error}")]
    QueryFailed {
        /// Description of the awaited condition.
        what: String,
        /// Number of consecutive failures.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },
}

/// Observes cancellation requested through the paired [`Canceller`].
#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Requests cancellation of every clone of the paired [`CancelToken`].
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

/// Creates a connected canceller and token.
#[must_use]
pub fn cancel_pair() -> (Canceller, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx }, CancelToken { rx })
}

impl Canceller {
    /// Signals cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelToken {
    /// Token that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; pends forever when the
    /// canceller is gone without having fired.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|flag| *flag).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Bounded, cancellable polling primitive.
#[derive(Clone, Debug)]
pub struct StateWaiter {
    poll_interval: Duration,
    max_wait: Duration,
    max_consecutive_errors: u32,
    cancel: CancelToken,
}

impl StateWaiter {
    /// Creates a waiter with explicit bounds.
    #[must_use]
    pub const fn new(poll_interval: Duration, max_wait: Duration, cancel: CancelToken) -> Self {
        Self {
            poll_interval,
            max_wait,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            cancel,
        }
    }

    /// Overrides the consecutive query error budget. A budget of zero is
    /// treated as one.
    #[must_use]
    pub fn with_error_budget(mut self, max_consecutive_errors: u32) -> Self {
        self.max_consecutive_errors = max_consecutive_errors.max(1);
        self
    }

    /// Cancellation token observed by this waiter.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Polls `query` until `predicate` accepts its result.
    ///
    /// Each query races the deadline and the cancel token, so a query that
    /// never resolves still ends the wait.
    ///
    /// A failed query is logged and retried; the wait gives up once
    /// `max_consecutive_errors` failures happen in a row. A successful query
    /// resets the count.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Timeout`] once the deadline passes,
    /// [`WaitError::Cancelled`] when the token fires and
    /// [`WaitError::QueryFailed`] when the error budget is spent.
    pub async fn wait_until<T, E, Q, Fut, P>(
        &self,
        what: &str,
        mut query: Q,
        predicate: P,
    ) -> Result<T, WaitError>
    where
        Q: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&T) -> bool,
    {
        let deadline = Instant::now() + self.max_wait;
        let mut consecutive_errors = 0_u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(WaitError::Cancelled {
                    what: what.to_owned(),
                });
            }

            let outcome = tokio::select! {
                biased;
                result = query() => result,
                () = self.cancel.cancelled() => {
                    return Err(WaitError::Cancelled {
                        what: what.to_owned(),
                    });
                }
                () = sleep_until(deadline) => {
                    return Err(WaitError::Timeout {
                        what: what.to_owned(),
                        waited: self.max_wait,
                    });
                }
            };

            match outcome {
                Ok(state) if predicate(&state) => return Ok(state),
                Ok(_) => {
                    consecutive_errors = 0;
                    debug!(what, "condition not met yet");
                }
                Err(err) => {
                    consecutive_errors += 1;
                    warn!(what, attempt = consecutive_errors, error = %err, "state query failed");
                    if consecutive_errors >= self.max_consecutive_errors {
                        return Err(WaitError::QueryFailed {
                            what: what.to_owned(),
                            attempts: consecutive_errors,
                            last_error: err.to_string(),
                        });
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(WaitError::Timeout {
                    what: what.to_owned(),
                    waited: self.max_wait,
                });
            }
            self.pause(what, self.poll_interval).await?;
        }
    }

    /// Sleeps for `duration` unless cancelled first.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Cancelled`] when the token fires.
    pub async fn pause(&self, what: &str, duration: Duration) -> Result<(), WaitError> {
        tokio::select! {
            () = sleep(duration) => Ok(()),
            () = self.cancel.cancelled() => Err(WaitError::Cancelled {
                what: what.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests;
