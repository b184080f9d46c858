use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use campground_watch::Watcher;

/// Runs the watcher in the background until it is stopped
pub struct WatchManager {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl WatchManager {
    /// Create a manager with nothing running
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Start polling every registered watch
    pub fn start(&mut self, watcher: Watcher) {
        info!("Starting watch execution system");
        let cancel = self.cancel.clone();
        self.handle = Some(tokio::spawn(watcher.run(cancel)));
    }

    async fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Watcher task failed: {}", e);
            }
        }
        info!("Watch execution system stopped");
    }

    /// Cancel every watch and wait for them to stop
    pub async fn stop(&mut self) {
        info!("Stopping watch execution system");
        self.cancel.cancel();
        self.wait().await;
    }
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT (Ctrl+C) received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}

impl Drop for WatchManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
