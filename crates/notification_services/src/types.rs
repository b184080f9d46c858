use validator::ValidateEmail;

/// Errors raised while delivering through AWS.
#[derive(Debug, thiserror::Error)]
pub enum AwsNotificationError {
    /// Simple email service (SES) errors.
    #[error("AWS SES error: {0}")]
    SesError(String),

    /// Simple notification service (SNS) errors.
    #[error("AWS SNS error: {0}")]
    SnsError(String),

    /// Invalid phone number format.
    #[error("Invalid phone number format: {0}")]
    InvalidPhoneNumber(String),

    /// Invalid email format.
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),
}

impl AwsNotificationError {
    /// Whether the recipient itself was rejected, before anything was sent
    pub fn is_invalid_recipient(&self) -> bool {
        matches!(self, Self::InvalidPhoneNumber(_) | Self::InvalidEmail(_))
    }
}

/// A recipient resolved to the channel that reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Delivered through SES.
    Email(String),
    /// Delivered through SNS, in E.164 format.
    Phone(String),
}

impl Recipient {
    /// Classify a raw recipient string from a watch.
    ///
    /// Anything containing `@` is an e-mail address; anything else must be a
    /// phone number, which is normalised to E.164.
    pub fn parse(raw: &str) -> Result<Self, AwsNotificationError> {
        let raw = raw.trim().to_string();

        if raw.contains('@') {
            return if raw.validate_email() {
                Ok(Recipient::Email(raw))
            } else {
                Err(AwsNotificationError::InvalidEmail(raw))
            };
        }

        format_phone(&raw).map(Recipient::Phone)
    }
}

/// Ensure a phone number is in E.164 format.
pub fn format_phone(phone: &str) -> Result<String, AwsNotificationError> {
    let digits: String = phone
        .trim_start_matches('+')
        .replace(['(', ')', '-', ' ', '.'], "");

    if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AwsNotificationError::InvalidPhoneNumber(phone.to_string()));
    }

    Ok(format!("+{}", digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email() {
        assert_eq!(
            Recipient::parse(" camper@example.com ").unwrap(),
            Recipient::Email("camper@example.com".to_string())
        );
        assert!(matches!(
            Recipient::parse("@example.com"),
            Err(AwsNotificationError::InvalidEmail(_))
        ));
        assert!(matches!(
            Recipient::parse("a@b."),
            Err(AwsNotificationError::InvalidEmail(_))
        ));
        assert!(matches!(
            Recipient::parse("camper@@example.com"),
            Err(AwsNotificationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_parse_phone() {
        assert_eq!(
            Recipient::parse("+1 (415) 555-0100").unwrap(),
            Recipient::Phone("+14155550100".to_string())
        );
        assert_eq!(
            Recipient::parse("1.415.555.0100").unwrap(),
            Recipient::Phone("+14155550100".to_string())
        );
        assert!(matches!(
            Recipient::parse("call me maybe"),
            Err(AwsNotificationError::InvalidPhoneNumber(_))
        ));
        assert!(matches!(
            Recipient::parse("+123"),
            Err(AwsNotificationError::InvalidPhoneNumber(_))
        ));
    }
}
