use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::info;

use crate::{NotificationError, NotificationTransport};

/// Transport that writes notifications to the log instead of sending them.
///
/// Used for development and dry runs.
pub struct LoggingTransport;

#[async_trait]
impl NotificationTransport for LoggingTransport {
    async fn send(
        &self,
        recipients: &BTreeSet<String>,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        let to = recipients.iter().cloned().collect::<Vec<_>>().join(", ");
        let message_id = uuid::Uuid::new_v4();

        info!("📧 [NOTIFICATION {}] To: {}", message_id, to);
        info!("📧 [NOTIFICATION {}] Subject: {}", message_id, subject);
        info!("📧 [NOTIFICATION {}] Body:\n{}", message_id, body);

        Ok(())
    }
}
