//! Main entry point for the campsite watcher.
//! Loads watches from a JSON file and polls recreation.gov until shut down.

mod config;
mod watch_manager;

use std::sync::Arc;

use anyhow::Context;
use campground_watch::{LoggingTransport, NotificationTransport, RecGovClient, Watcher};
use notification_services::NotificationService;

use crate::config::{NotifierKind, Settings, load_watches};
use crate::watch_manager::{WatchManager, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("🚀 Starting campsite watcher...");

    let settings = Settings::from_env()?;
    let watches = load_watches(&settings.watch_file)?;
    if watches.is_empty() {
        log::warn!(
            "⚠️ No watches found in {}, nothing to do",
            settings.watch_file.display()
        );
        return Ok(());
    }

    let source = Arc::new(
        RecGovClient::new(settings.rec_gov.clone())
            .context("Failed to create recreation.gov client")?,
    );

    let transport: Arc<dyn NotificationTransport> = match settings.notifier {
        NotifierKind::Log => {
            log::info!("📝 Notifications will be logged only");
            Arc::new(LoggingTransport)
        }
        NotifierKind::Aws => {
            log::info!("📧 Notifications will be sent through AWS from {}", settings.from_email);
            Arc::new(NotificationService::new(settings.from_email.clone()).await)
        }
    };

    let mut watcher = Watcher::new(source, transport, settings.watcher.clone());
    for watch in watches {
        let id = watch.id;
        watcher
            .register(watch)
            .with_context(|| format!("Failed to register watch {}", id))?;
    }

    let mut manager = WatchManager::new();
    manager.start(watcher);
    shutdown_signal().await;
    manager.stop().await;

    log::info!("👋 Campsite watcher exited");
    Ok(())
}
