use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info};

use crate::scan_types::{Match, MatchKey, WatchDefinition};

/// Outbound channel for availability alerts (e-mail, SMS, ...)
///
/// Implementations are shared between watches and must accept concurrent
/// calls.
#[async_trait::async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Deliver one message to every recipient
    async fn send(
        &self,
        recipients: &BTreeSet<String>,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError>;
}

/// Errors reported by a notification transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    /// The message could not be delivered
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
    /// The recipient is neither an e-mail address nor a phone number
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Keys of matches already reported for one watch
#[derive(Debug, Default)]
pub struct DedupState {
    seen: HashSet<MatchKey>,
}

impl DedupState {
    /// Empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the key was already reported
    pub fn contains(&self, key: &MatchKey) -> bool {
        self.seen.contains(key)
    }

    /// Record a key, returning `false` if it was already present
    pub fn insert(&mut self, key: MatchKey) -> bool {
        self.seen.insert(key)
    }

    /// Drop keys whose date is before `today`, returning how many went
    pub fn evict_before(&mut self, today: NaiveDate) -> usize {
        let before = self.seen.len();
        self.seen.retain(|key| key.date >= today);
        before - self.seen.len()
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Where a dispatcher is in its per-poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Waiting for the next batch of matches
    Idle,
    /// Filtering a batch against the dedup state
    Evaluating,
    /// New matches were found and are being delivered
    NewMatchesFound,
    /// The batch held nothing new
    NoNewMatches,
}

/// Result of handing the notification to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Nothing new, nothing sent
    NotAttempted,
    /// Transport accepted the notification
    Sent,
    /// Transport failed; the matches stay marked as seen
    Failed(NotificationError),
}

/// What one `process` call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Matches reported for the first time
    pub new_matches: Vec<Match>,
    /// Outcome of the delivery attempt
    pub delivery: DeliveryStatus,
}

/// Suppresses repeat matches for one watch and notifies about new ones
pub struct NotificationDispatcher {
    watch: Arc<WatchDefinition>,
    transport: Arc<dyn NotificationTransport>,
    dedup: DedupState,
    state: DispatcherState,
}

impl NotificationDispatcher {
    /// Dispatcher with an empty dedup state
    pub fn new(watch: Arc<WatchDefinition>, transport: Arc<dyn NotificationTransport>) -> Self {
        Self {
            watch,
            transport,
            dedup: DedupState::new(),
            state: DispatcherState::Idle,
        }
    }

    /// Current cycle state
    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Read access to the dedup state
    pub fn dedup(&self) -> &DedupState {
        &self.dedup
    }

    /// Report the matches not seen before and send one notification for them.
    ///
    /// Matches are marked as seen before delivery and stay marked if the
    /// transport fails, so a flapping transport cannot cause repeated alerts.
    pub async fn process(&mut self, matches: Vec<Match>, today: NaiveDate) -> DispatchReport {
        self.state = DispatcherState::Evaluating;

        let evicted = self.dedup.evict_before(today);
        if evicted > 0 {
            debug!(
                "Evicted {} past matches for watch {}",
                evicted, self.watch.id
            );
        }

        let mut new_matches = Vec::new();
        for candidate in matches {
            // A past night can never be booked, even if the source still lists it.
            if candidate.date < today {
                continue;
            }
            if self.dedup.insert(candidate.key()) {
                new_matches.push(candidate);
            }
        }

        if new_matches.is_empty() {
            self.state = DispatcherState::NoNewMatches;
            debug!("No new matches for {}", self.watch.campground_name);
            self.state = DispatcherState::Idle;
            return DispatchReport {
                new_matches,
                delivery: DeliveryStatus::NotAttempted,
            };
        }

        self.state = DispatcherState::NewMatchesFound;
        info!(
            "Found {} new matches for {} ({})",
            new_matches.len(),
            self.watch.campground_name,
            self.watch.id
        );

        let (subject, body) = notification_content(&self.watch, &new_matches);
        let delivery = match self
            .transport
            .send(&self.watch.recipients, &subject, &body)
            .await
        {
            Ok(()) => {
                info!(
                    "Sent notification for {} to {} recipients",
                    self.watch.campground_name,
                    self.watch.recipients.len()
                );
                DeliveryStatus::Sent
            }
            Err(e) => {
                error!(
                    "Failed to send notification for {}: {}",
                    self.watch.campground_name, e
                );
                DeliveryStatus::Failed(e)
            }
        };

        self.state = DispatcherState::Idle;
        DispatchReport {
            new_matches,
            delivery,
        }
    }
}

/// Build the subject and body of an availability notification
pub fn notification_content(watch: &WatchDefinition, matches: &[Match]) -> (String, String) {
    let subject = format!(
        "🏕️ Campsite available: {} ({} new)",
        watch.campground_name,
        matches.len()
    );

    let site_list = matches
        .iter()
        .map(|m| format!("• Site {} on {}", m.site_name, m.date.format("%A, %B %d, %Y")))
        .collect::<Vec<_>>()
        .join("\n");

    let body = format!(
        r#"Great news! New campsites are available for your watch:

🏕️ Campground: {}

Available Sites:
{}

Visit recreation.gov to book your site:
{}
"#,
        watch.campground_name,
        site_list,
        watch.booking_url()
    );

    (subject, body)
}
