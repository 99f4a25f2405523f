use log::{error, warn};
use tokio::sync::{mpsc, watch};

/// Held by every long-running loop (accept loop, consumer poll loop) that has
/// to stop when the process shuts down.
#[derive(Clone, Debug)]
pub struct ShutdownReceiver {
    shutdown_rx: watch::Receiver<bool>,
    /// Dropped together with the receiver; the sender counts the drops.
    _shutdown_confirm_tx: mpsc::Sender<bool>,
}

impl ShutdownReceiver {
    /// Resolves once [`ShutdownSender::shutdown`] has been called.
    ///
    /// The receiver must be dropped after this returns.
    pub async fn watch(mut self) {
        if *self.shutdown_rx.borrow() {
            return;
        }

        if let Err(e) = self.shutdown_rx.changed().await {
            error!(target: "partlog_core::shutdown", "Error watching shutdown_rx : {:?}", e);
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }
}

pub struct ShutdownSender {
    shutdown_tx: watch::Sender<bool>,
    shutdown_confirm_rx: mpsc::Receiver<bool>,
}

impl ShutdownSender {
    /// Signals every [`ShutdownReceiver`] and waits until all of them are dropped.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.shutdown_tx.send(true) {
            warn!(target: "partlog_core::shutdown", "Failed to send shutdown signal: {:?}", e);
        }

        let _ = self.shutdown_confirm_rx.recv().await;
    }
}

/// Creates a linked sender/receiver pair. Clone the receiver for each task.
pub fn create_shutdown() -> (ShutdownSender, ShutdownReceiver) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (shutdown_confirm_tx, shutdown_confirm_rx) = mpsc::channel::<bool>(1);

    (
        ShutdownSender {
            shutdown_tx,
            shutdown_confirm_rx,
        },
        ShutdownReceiver {
            shutdown_rx,
            _shutdown_confirm_tx: shutdown_confirm_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use super::*;

    #[tokio::test]
    async fn test_shutdown_waits_for_receivers() {
        let (mut shutdown_tx, shutdown_rx) = create_shutdown();

        let task_rx = shutdown_rx.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_rx.clone().watch() => break,
                    _ = sleep(Duration::from_millis(10)) => (),
                }
            }
            drop(task_rx);
        });
        drop(shutdown_rx);

        timeout(Duration::from_secs(5), shutdown_tx.shutdown())
            .await
            .expect("shutdown should be confirmed");
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_watch_after_shutdown() {
        let (mut shutdown_tx, shutdown_rx) = create_shutdown();
        let late_rx = shutdown_rx.clone();
        drop(shutdown_rx);

        let watcher = tokio::spawn(async move {
            late_rx.watch().await;
        });

        timeout(Duration::from_secs(5), shutdown_tx.shutdown())
            .await
            .expect("shutdown should be confirmed");
        watcher.await.unwrap();
    }
}
