//! Cancellation tied to the lifetime of a consuming view.
//!
//! Work started on behalf of a view carries a [`ScopeToken`]. Once the view's
//! [`ViewScope`] is closed or dropped, results that arrive are discarded
//! instead of being applied to state nobody is looking at.

use std::future::Future;

use tokio::sync::watch;

#[derive(Debug)]
pub struct ViewScope {
    closed_tx: watch::Sender<bool>,
}

impl ViewScope {
    pub fn new() -> Self {
        let (closed_tx, _closed_rx) = watch::channel(false);
        Self { closed_tx }
    }

    pub fn token(&self) -> ScopeToken {
        ScopeToken {
            closed_rx: self.closed_tx.subscribe(),
        }
    }

    pub fn close(&self) {
        self.closed_tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.closed_tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct ScopeToken {
    closed_rx: watch::Receiver<bool>,
}

impl ScopeToken {
    pub fn is_cancelled(&self) -> bool {
        *self.closed_rx.borrow()
    }

    /// Resolves once the scope is closed or dropped.
    pub async fn cancelled(&self) {
        let mut closed_rx = self.closed_rx.clone();
        loop {
            if *closed_rx.borrow() {
                return;
            }
            if closed_rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Drive `fut` to completion unless the scope closes first.
    ///
    /// `None` means the result must not be applied: either the scope closed
    /// while waiting, or it closed before the result could be observed.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            output = fut => {
                if self.is_cancelled() {
                    None
                } else {
                    Some(output)
                }
            }
            _ = self.cancelled() => None,
        }
    }
}
