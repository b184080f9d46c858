//! # Notification Services
//!
//! This crate delivers campsite availability notifications through AWS:
//! e-mail recipients via SES and phone recipients via SNS.

/// The AWS-backed notification transport.
pub mod service;
/// Error and recipient types used by the transport.
pub mod types;

pub use service::{NotificationService, deliver_all, sms_message};
pub use types::{AwsNotificationError, Recipient, format_phone};
