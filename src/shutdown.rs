//! Level-triggered shutdown signal shared by the feeds and the pick loop.
//!
//! Backed by a `watch` channel holding a single flag, so a task that was
//! busy when shutdown was requested still sees it on its next check.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested, immediately if it
    /// already was.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_before_wait_is_not_lost() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());

        // Nobody is waiting when the signal fires.
        shutdown.clone().trigger();
        assert!(shutdown.is_triggered());

        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("wait resolves after an earlier trigger");
    }

    #[tokio::test]
    async fn test_trigger_while_task_is_busy() {
        let shutdown = Shutdown::new();
        let worker = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut passes = 0u32;
            loop {
                // Busy with a pass, not selecting on the signal.
                tokio::time::sleep(Duration::from_millis(20)).await;
                passes += 1;
                tokio::select! {
                    _ = worker.wait() => return passes,
                    _ = tokio::time::sleep(Duration::from_millis(5)) => {}
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();

        let passes = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker stops")
            .unwrap();
        assert_eq!(passes, 1);
    }
}
