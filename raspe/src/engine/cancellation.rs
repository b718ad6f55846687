//! Cooperative cancellation for scrape runs.

use crate::errors::ScraperError;
use parking_lot::RwLock;
use tokio::sync::Notify;

/// Stops a scrape between page requests.
///
/// The engine checks the token before each page and abandons its page
/// delay as soon as the token fires. Requests already on the wire finish.
/// Only the first reason is kept.
#[derive(Default)]
pub struct CancellationToken {
    reason: RwLock<Option<String>>,
    notify: Notify,
}

impl CancellationToken {
    /// Creates a token that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token. Later calls keep the first reason.
    pub fn cancel(&self, reason: impl Into<String>) {
        {
            let mut slot = self.reason.write();
            if slot.is_some() {
                return;
            }
            *slot = Some(reason.into());
        }
        self.notify.notify_waiters();
    }

    /// Returns whether the token has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason.read().is_some()
    }

    /// The reason given to the first [`cancel`](Self::cancel).
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Fails with [`ScraperError::Cancelled`] once the token has fired.
    pub fn check(&self) -> Result<(), ScraperError> {
        match self.reason() {
            Some(reason) => Err(ScraperError::Cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Resolves when the token fires.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Re-arms the token so the engine can run again.
    pub fn reset(&self) {
        *self.reason.write() = None;
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("reason", &*self.reason.read())
            .finish_non_exhaustive()
    }
}
