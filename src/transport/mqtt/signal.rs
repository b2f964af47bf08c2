//! Resettable wait/notify flag for broker handshakes
//!
//! One side clears the flag and issues a request, the network loop sets it
//! when the acknowledgment arrives, and the requester waits with a timeout.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Signal {
    tx: Arc<watch::Sender<bool>>,
}

impl Signal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    pub fn clear(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the flag is set; returns `false` if `timeout` elapses first
    ///
    /// Returns immediately when the flag is already set.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let outcome = tokio::time::timeout(timeout, rx.wait_for(|set| *set))
            .await
            .map(|result| result.is_ok());
        matches!(outcome, Ok(true))
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_times_out_when_never_set() {
        let signal = Signal::new();
        assert!(!signal.wait(Duration::from_millis(20)).await);
        assert!(!signal.is_set());
    }

    #[tokio::test]
    async fn test_wait_returns_when_set_from_another_task() {
        let signal = Signal::new();
        let setter = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            setter.set();
        });

        assert!(signal.wait(Duration::from_secs(1)).await);
        assert!(signal.is_set());
    }

    #[tokio::test]
    async fn test_already_set_flag_is_observed_until_cleared() {
        let signal = Signal::new();
        signal.set();
        assert!(signal.wait(Duration::from_millis(1)).await);

        signal.clear();
        assert!(!signal.wait(Duration::from_millis(10)).await);
    }
}
