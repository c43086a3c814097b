//! Cooperative cancellation shared by the watch loop and ingestion.

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable cancellation flag.
///
/// Every clone observes the same flag. Synchronous code polls
/// [`is_cancelled`](Self::is_cancelled); async code awaits
/// [`cancelled`](Self::cancelled).
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        CancelToken {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives as long as any clone of the token, so this only
        // errors if every handle is gone.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
