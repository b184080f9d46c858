use std::collections::BTreeSet;

use aws_config::BehaviorVersion;
use aws_sdk_ses::Client as SesClient;
use aws_sdk_sns::Client as SnsClient;
use campground_watch::{NotificationError, NotificationTransport};

use crate::types::*;

/// Notification transport that sends e-mail through SES and SMS through SNS.
#[derive(Debug, Clone)]
pub struct NotificationService {
    ses_client: SesClient,
    sns_client: SnsClient,
    from_email: String,
}

impl NotificationService {
    /// Creates a new instance of the NotificationService with AWS clients initialized.
    pub async fn new(from_email: impl Into<String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;

        Self {
            ses_client: SesClient::new(&config),
            sns_client: SnsClient::new(&config),
            from_email: from_email.into(),
        }
    }

    /// Sends a plain-text email, returning the SES message ID.
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, AwsNotificationError> {
        log::info!("📧 Sending email to {} with subject: {}", to, subject);

        let subject_content = aws_sdk_ses::types::Content::builder()
            .data(subject)
            .build()
            .map_err(|e| AwsNotificationError::SesError(format!("Failed to build subject: {}", e)))?;

        let text_content = aws_sdk_ses::types::Content::builder()
            .data(body)
            .build()
            .map_err(|e| {
                AwsNotificationError::SesError(format!("Failed to build text body: {}", e))
            })?;

        let message = aws_sdk_ses::types::Message::builder()
            .subject(subject_content)
            .body(aws_sdk_ses::types::Body::builder().text(text_content).build())
            .build();

        let destination = aws_sdk_ses::types::Destination::builder()
            .to_addresses(to)
            .build();

        let result = self
            .ses_client
            .send_email()
            .source(&self.from_email)
            .destination(destination)
            .message(message)
            .send()
            .await;

        match result {
            Ok(output) => {
                let message_id = output.message_id().to_string();
                log::info!("✅ Email sent to {} (SES Message ID: {})", to, message_id);
                Ok(message_id)
            }
            Err(e) => {
                let error_msg = if let Some(service_error) = e.as_service_error() {
                    format!("AWS SES service error: {:?}", service_error)
                } else {
                    format!("AWS SES error: {}", e)
                };
                Err(AwsNotificationError::SesError(error_msg))
            }
        }
    }

    /// Sends an SMS to a number already in E.164 format.
    pub async fn send_sms(&self, phone: &str, message: &str) -> Result<(), AwsNotificationError> {
        self.sns_client
            .publish()
            .phone_number(phone)
            .message(message)
            .send()
            .await
            .map_err(|e| AwsNotificationError::SnsError(e.to_string()))?;

        log::info!("📱 SMS sent to {}", phone);
        Ok(())
    }

    async fn deliver(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), AwsNotificationError> {
        match Recipient::parse(recipient)? {
            Recipient::Email(address) => self.send_email(&address, subject, body).await.map(|_| ()),
            Recipient::Phone(number) => self.send_sms(&number, &sms_message(subject, body)).await,
        }
    }
}

#[async_trait::async_trait]
impl NotificationTransport for NotificationService {
    async fn send(
        &self,
        recipients: &BTreeSet<String>,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        deliver_all(recipients, move |recipient| async move {
            self.deliver(&recipient, subject, body).await
        })
        .await
    }
}

/// Attempt `deliver` for every recipient, even after a failure.
///
/// Failures are reported together: `InvalidRecipient` when every failed
/// recipient was rejected before sending, `DeliveryFailed` otherwise.
pub async fn deliver_all<F, Fut>(
    recipients: &BTreeSet<String>,
    deliver: F,
) -> Result<(), NotificationError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<(), AwsNotificationError>>,
{
    let mut failures = Vec::new();
    let mut all_invalid = true;

    for recipient in recipients {
        if let Err(e) = deliver(recipient.clone()).await {
            log::error!("❌ Failed to notify {}: {}", recipient, e);
            all_invalid &= e.is_invalid_recipient();
            failures.push(format!("{}: {}", recipient, e));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else if all_invalid {
        Err(NotificationError::InvalidRecipient(failures.join("; ")))
    } else {
        Err(NotificationError::DeliveryFailed(failures.join("; ")))
    }
}

/// Short SMS form of a notification: the subject plus the booking link.
pub fn sms_message(subject: &str, body: &str) -> String {
    match body.lines().find(|line| line.trim_start().starts_with("https://")) {
        Some(link) => format!("{} Book: {}", subject, link.trim()),
        None => subject.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recipients(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|r| r.to_string()).collect()
    }

    #[tokio::test]
    async fn test_every_recipient_is_attempted() {
        let attempted = Mutex::new(Vec::new());
        let result = deliver_all(
            &recipients(&["a@example.com", "b@example.com", "+14155550100"]),
            |recipient| {
                attempted.lock().unwrap().push(recipient.clone());
                async move {
                    if recipient == "a@example.com" {
                        Err(AwsNotificationError::SesError("throttled".to_string()))
                    } else {
                        Ok(())
                    }
                }
            },
        )
        .await;

        assert_eq!(attempted.lock().unwrap().len(), 3);
        match result {
            Err(NotificationError::DeliveryFailed(reason)) => {
                assert!(reason.contains("a@example.com"));
                assert!(!reason.contains("b@example.com"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failures_are_combined() {
        let result = deliver_all(&recipients(&["a@b.", "+14155550100"]), |recipient| async move {
            match Recipient::parse(&recipient) {
                Ok(Recipient::Email(_)) => Ok(()),
                Ok(Recipient::Phone(_)) => Err(AwsNotificationError::SnsError("opted out".to_string())),
                Err(e) => Err(e),
            }
        })
        .await;

        match result {
            Err(NotificationError::DeliveryFailed(reason)) => {
                assert!(reason.contains("a@b."));
                assert!(reason.contains("+14155550100: AWS SNS error: opted out"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_only_invalid_recipients() {
        let result = deliver_all(&recipients(&["not a number", "@example.com"]), |recipient| async move {
            Recipient::parse(&recipient).map(|_| ())
        })
        .await;

        assert!(matches!(result, Err(NotificationError::InvalidRecipient(_))));
    }

    #[tokio::test]
    async fn test_all_delivered() {
        let result = deliver_all(&recipients(&["a@example.com"]), |_| async { Ok(()) }).await;
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_sms_message_uses_booking_link() {
        let body = "Great news!\n\nVisit recreation.gov to book your site:\nhttps://www.recreation.gov/camping/campgrounds/232447\n";
        assert_eq!(
            sms_message("🏕️ Campsite available: Upper Pines (1 new)", body),
            "🏕️ Campsite available: Upper Pines (1 new) Book: https://www.recreation.gov/camping/campgrounds/232447"
        );
    }

    #[test]
    fn test_sms_message_without_link() {
        assert_eq!(sms_message("subject", "no link here"), "subject");
    }
}
