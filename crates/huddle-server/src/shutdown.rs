//! Server-wide shutdown signal.
//!
//! Triggering it stops the listener from accepting and makes every chat
//! socket leave its read loop with a 1001 close frame. Upgraded sockets run
//! under a [`TaskTracker`], so [`ShutdownSignal::drain`] returns only once
//! those close frames have been flushed.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// How long [`ShutdownSignal::drain`] waits when no timeout is given.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shutdown token shared by the listener and all chat sockets.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    sockets: TaskTracker,
}

impl ShutdownSignal {
    /// Create an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled when shutdown begins.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Begin shutdown. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Register a chat socket task so [`ShutdownSignal::drain`] waits for it.
    pub fn track_socket<F: Future>(&self, socket: F) -> TrackedFuture<F> {
        self.sockets.track_future(socket)
    }

    /// Chat sockets still running.
    pub fn open_sockets(&self) -> usize {
        self.sockets.len()
    }

    /// Trigger shutdown, then wait for the listener task and every tracked
    /// socket, up to `timeout`.
    ///
    /// Returns `false` if the timeout elapsed first.
    pub async fn drain(&self, listener: JoinHandle<()>, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.trigger();
        let _ = self.sockets.close();
        info!(
            open_sockets = self.sockets.len(),
            timeout_secs = timeout.as_secs(),
            "draining chat sockets"
        );

        let everything = async {
            let _ = listener.await;
            self.sockets.wait().await;
        };
        let drained = tokio::time::timeout(timeout, everything).await.is_ok();
        if drained {
            info!("all chat sockets closed");
        } else {
            warn!(open_sockets = self.sockets.len(), "drain timed out after {timeout:?}");
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn trigger_cancels_every_token() {
        let signal = ShutdownSignal::new();
        let token = signal.token();
        assert!(!token.is_cancelled());
        signal.trigger();
        signal.trigger();
        assert!(token.is_cancelled());
        assert!(signal.token().is_cancelled());
    }

    #[tokio::test]
    async fn drain_waits_for_sockets_to_finish_closing() {
        let signal = ShutdownSignal::new();
        let closed = Arc::new(AtomicBool::new(false));
        let socket = {
            let token = signal.token();
            let closed = Arc::clone(&closed);
            async move {
                token.cancelled().await;
                // Stands in for flushing the close frame.
                tokio::time::sleep(Duration::from_millis(20)).await;
                closed.store(true, Ordering::SeqCst);
            }
        };
        let _ = tokio::spawn(signal.track_socket(socket));
        assert_eq!(signal.open_sockets(), 1);

        let listener = tokio::spawn(async {});
        assert!(signal.drain(listener, None).await);
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(signal.open_sockets(), 0);
    }

    #[tokio::test]
    async fn drain_gives_up_on_stuck_socket() {
        let signal = ShutdownSignal::new();
        let _ = tokio::spawn(signal.track_socket(tokio::time::sleep(Duration::from_secs(300))));
        let listener = tokio::spawn(async {});
        assert!(!signal.drain(listener, Some(Duration::from_millis(50))).await);
        assert_eq!(signal.open_sockets(), 1);
    }
}
