//! Signal-once gate announcing server saturation.

use std::time::Duration;

use tokio::sync::watch;

use super::SyncError;

/// A gate that latches on its first [`raise`](StarvationSignal::raise).
///
/// Used by scenarios to learn that the server under test has stopped
/// making progress: the write path raises it on the first stalled flush,
/// or the rendezvous gate raises it when all parties have arrived.
/// Later raises are no-ops; only the first occurrence matters.
#[derive(Debug, Clone)]
pub struct StarvationSignal {
    raised: watch::Sender<bool>,
}

impl StarvationSignal {
    /// Create an unraised signal.
    pub fn new() -> Self {
        let (raised, _) = watch::channel(false);
        Self { raised }
    }

    /// Latch the signal. Idempotent; only the first call has any effect.
    pub fn raise(&self) {
        self.raised.send_if_modified(|raised| {
            if *raised {
                false
            } else {
                *raised = true;
                true
            }
        });
    }

    /// Whether the signal has been raised.
    pub fn is_raised(&self) -> bool {
        *self.raised.borrow()
    }

    /// Wait until the signal is raised, failing after `deadline`.
    pub async fn wait(&self, deadline: Duration) -> Result<(), SyncError> {
        let mut rx = self.raised.subscribe();
        let result = tokio::time::timeout(deadline, rx.wait_for(|raised| *raised)).await;
        match result {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(SyncError::Broken),
            Err(_) => Err(SyncError::TimedOut { waited: deadline }),
        }
    }
}

impl Default for StarvationSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn raise_is_idempotent() {
        let signal = StarvationSignal::new();
        assert!(!signal.is_raised());

        signal.raise();
        signal.raise();
        assert!(signal.is_raised());
        signal.wait(Duration::from_millis(10)).await.expect("raised");
    }

    #[tokio::test]
    async fn wait_sees_a_later_raise() {
        let signal = StarvationSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        signal.raise();
        waiter.await.expect("join").expect("raised");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_when_nothing_raises() {
        let signal = StarvationSignal::new();
        assert_eq!(
            signal.wait(Duration::from_millis(100)).await,
            Err(SyncError::TimedOut {
                waited: Duration::from_millis(100)
            })
        );
    }
}
