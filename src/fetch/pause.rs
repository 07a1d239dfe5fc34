//! Cooperative pause/resume for the fetch loops
//!
//! Loops call [`PauseSignal::wait_if_paused`] before each unit of work. Work
//! already in flight always finishes.

use tokio::sync::watch;

/// Shared pause flag backed by a watch channel
#[derive(Debug, Clone)]
pub struct PauseSignal {
    tx: watch::Sender<bool>,
}

impl PauseSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn pause(&self) {
        tracing::info!("Pausing acquisition");
        self.tx.send_replace(true);
    }

    pub fn resume(&self) {
        tracing::info!("Resuming acquisition");
        self.tx.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }

    /// Return immediately when running, otherwise wait for [`resume`](Self::resume)
    pub async fn wait_if_paused(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            let paused = *rx.borrow_and_update();
            if !paused {
                return;
            }
            // The sender lives in `self`, so the channel cannot close here
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for PauseSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_not_paused_returns_immediately() {
        let signal = PauseSignal::new();
        tokio::time::timeout(Duration::from_millis(100), signal.wait_if_paused())
            .await
            .expect("should not block");
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_resumed() {
        let signal = PauseSignal::new();
        signal.pause();
        assert!(signal.is_paused());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait_if_paused().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        signal.resume();
        waiter.await.unwrap();
        assert!(!signal.is_paused());
    }
}
