//! Handles to running listeners.

use tokio::sync::oneshot;

/// Handle to a running listener.
///
/// The listener shuts down when the handle is stopped or dropped.
#[derive(Debug)]
pub struct ListenerHandle {
    /// Unique identifier for this listener.
    pub id: String,
    /// Shutdown signal sender.
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ListenerHandle {
    /// Creates a new listener handle.
    pub fn new(id: impl Into<String>, shutdown_tx: oneshot::Sender<()>) -> Self {
        Self {
            id: id.into(),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Stops the listener.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_signals_shutdown() {
        let (tx, rx) = oneshot::channel();
        let handle = ListenerHandle::new("test", tx);
        handle.stop();
        assert!(rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_drop_signals_shutdown() {
        let (tx, rx) = oneshot::channel();
        drop(ListenerHandle::new("test", tx));
        assert!(rx.await.is_ok());
    }
}
