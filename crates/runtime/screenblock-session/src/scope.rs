use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation signal bound to one started session
///
/// Created on start, cancelled on stop. Work that outlives a command (the
/// pattern comparison) races against [`SessionScope::cancelled`].
#[derive(Clone, Debug)]
pub struct SessionScope {
    tx: Arc<watch::Sender<bool>>,
}

impl SessionScope {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the scope is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only returns once cancelled
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for SessionScope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let scope = SessionScope::new();
        let waiter = {
            let scope = scope.clone();
            tokio::spawn(async move { scope.cancelled().await })
        };

        assert!(!scope.is_cancelled());
        scope.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn test_already_cancelled_resolves_immediately() {
        let scope = SessionScope::new();
        scope.cancel();
        scope.cancel();
        tokio::time::timeout(Duration::from_millis(100), scope.cancelled())
            .await
            .unwrap();
    }
}
