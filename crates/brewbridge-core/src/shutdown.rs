//! Process-wide shutdown signal

use std::time::Duration;

use tokio::sync::watch;

/// Sending half, held by whoever decides the process stops
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Receiving half, cheap to clone into every task that waits
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Create a connected trigger/signal pair
#[must_use]
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    /// Signal every [`Shutdown`] handle
    pub fn trigger(&self) {
        // No receivers left is fine
        let _ = self.tx.send(true);
    }

    #[must_use]
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    /// A signal that never fires
    #[must_use]
    pub fn never() -> Self {
        channel().1
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is triggered
    ///
    /// If the trigger is dropped without firing this never resolves.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `delay`; returns `true` if shutdown cut the sleep short
    pub async fn sleep(&mut self, delay: Duration) -> bool {
        let interrupted = tokio::time::timeout(delay, self.wait()).await.is_ok();
        interrupted || self.is_triggered()
    }
}
