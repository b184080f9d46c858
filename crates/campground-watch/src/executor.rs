use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::date_utils::months_for;
use crate::matcher::evaluate;
use crate::notification_service::{DeliveryStatus, NotificationDispatcher, NotificationTransport};
use crate::rec_gov_client::{AvailabilitySource, SourceError};
use crate::scan_types::{AvailabilitySnapshot, Match, ReservationMonth, WatchDefinition, WatchError};

/// Scheduling settings shared by every watch
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Time between polls of one watch (default: 15 minutes)
    pub poll_interval: Duration,

    /// Upper bound on a single availability request (default: 30 seconds)
    pub request_timeout: Duration,

    /// First backoff after a failed poll (default: 30 seconds)
    pub initial_backoff: Duration,

    /// Longest backoff between failed polls (default: 1 hour)
    pub max_backoff: Duration,

    /// Randomize backoff delays (default: true)
    pub jitter: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15 * 60),
            request_timeout: Duration::from_secs(30),
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(60 * 60),
            jitter: true,
        }
    }
}

/// What a single poll of a watch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Every date of the watch is in the past; nothing was queried
    Idle,
    /// All months were queried (or skipped as malformed) and the matches dispatched
    Completed {
        /// Matches reported for the first time
        new_matches: Vec<Match>,
        /// Outcome of the notification
        delivery: DeliveryStatus,
    },
    /// The source was unreachable or throttling; the poll was abandoned
    BackedOff {
        /// Error that aborted the poll
        error: SourceError,
        /// Wait before the next poll
        delay: Duration,
    },
}

/// Polling loop for one watch. Owns the watch's dedup state and backoff.
pub struct WatchRunner {
    watch: Arc<WatchDefinition>,
    source: Arc<dyn AvailabilitySource>,
    dispatcher: NotificationDispatcher,
    backoff: Backoff,
    config: WatcherConfig,
}

impl WatchRunner {
    /// Create a runner with fresh dedup and backoff state
    pub fn new(
        watch: Arc<WatchDefinition>,
        source: Arc<dyn AvailabilitySource>,
        transport: Arc<dyn NotificationTransport>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            dispatcher: NotificationDispatcher::new(watch.clone(), transport),
            backoff: Backoff::new(config.initial_backoff, config.max_backoff, config.jitter),
            watch,
            source,
            config,
        }
    }

    /// The watch this runner polls
    pub fn watch(&self) -> &WatchDefinition {
        &self.watch
    }

    /// The runner's dispatcher
    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Poll every month that still has dates of interest and dispatch the matches
    pub async fn run_tick(&mut self, today: NaiveDate) -> TickOutcome {
        let pending: BTreeSet<NaiveDate> = self.watch.dates.range(today..).copied().collect();
        if pending.is_empty() {
            debug!(
                "All dates of {} ({}) are in the past, nothing to poll",
                self.watch.campground_name, self.watch.id
            );
            return TickOutcome::Idle;
        }

        let months = months_for(&pending);
        debug!(
            "Polling campground {} across {} months for watch {}",
            self.watch.campground_id,
            months.len(),
            self.watch.id
        );

        let mut combined = Vec::new();

        for month in months {
            let snapshot = match self.fetch(month).await {
                Ok(snapshot) => snapshot,
                Err(SourceError::MalformedResponse(reason)) => {
                    warn!(
                        "Skipping {} for campground {}: {}",
                        month, self.watch.campground_id, reason
                    );
                    continue;
                }
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    warn!(
                        "Polling {} failed ({} consecutive): {}. Backing off for {:?}",
                        self.watch.campground_name,
                        self.backoff.consecutive_failures(),
                        e,
                        delay
                    );
                    return TickOutcome::BackedOff { error: e, delay };
                }
            };

            match evaluate(&self.watch, &snapshot) {
                Ok(matches) => combined.extend(matches),
                Err(e) => {
                    error!(
                        "Discarding {} data for watch {} ({}): {}",
                        month, self.watch.id, self.watch.campground_name, e
                    );
                }
            }
        }

        self.backoff.reset();

        let report = self.dispatcher.process(combined, today).await;
        TickOutcome::Completed {
            new_matches: report.new_matches,
            delivery: report.delivery,
        }
    }

    /// Fetch one month. The request is bounded by the timeout, the wait for
    /// the source to be ready is not.
    async fn fetch(&self, month: ReservationMonth) -> Result<AvailabilitySnapshot, SourceError> {
        self.source.ready().await;

        match timeout(
            self.config.request_timeout,
            self.source
                .fetch_availability(self.watch.campground_id, month),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SourceError::Unreachable(format!(
                "request timed out after {:?}",
                self.config.request_timeout
            ))),
        }
    }

    /// Poll on the configured interval until `cancel` fires.
    ///
    /// Ticks of one watch never overlap: the next tick starts only after the
    /// previous one, and any backoff, has finished.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let today = Utc::now().date_naive();
            if let TickOutcome::BackedOff { delay, .. } = self.run_tick(today).await {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(delay) => {}
                }
            }
        }

        debug!("Stopped polling watch {}", self.watch.id);
    }
}

/// Runs one independent polling loop per registered watch
pub struct Watcher {
    watches: Vec<Arc<WatchDefinition>>,
    source: Arc<dyn AvailabilitySource>,
    transport: Arc<dyn NotificationTransport>,
    config: WatcherConfig,
}

impl Watcher {
    /// Create a watcher with no watches
    pub fn new(
        source: Arc<dyn AvailabilitySource>,
        transport: Arc<dyn NotificationTransport>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            watches: Vec::new(),
            source,
            transport,
            config,
        }
    }

    /// Add a watch, rejecting it if it is invalid or its ID is taken
    pub fn register(&mut self, watch: WatchDefinition) -> Result<(), WatchError> {
        watch.validate()?;

        if self.watches.iter().any(|existing| existing.id == watch.id) {
            return Err(WatchError::Validation(format!(
                "duplicate watch id {}",
                watch.id
            )));
        }

        info!(
            "Registered watch {} for {} ({} dates)",
            watch.id,
            watch.campground_name,
            watch.dates.len()
        );
        self.watches.push(Arc::new(watch));
        Ok(())
    }

    /// Registered watches
    pub fn watches(&self) -> &[Arc<WatchDefinition>] {
        &self.watches
    }

    /// Run every watch until `cancel` fires, then wait for them to stop.
    ///
    /// A watch task that panics is logged and does not affect the others.
    pub async fn run(self, cancel: CancellationToken) {
        let campgrounds: HashSet<u64> = self.watches.iter().map(|w| w.campground_id).collect();
        info!(
            "Starting campground watcher: {} watches across {} campgrounds",
            self.watches.len(),
            campgrounds.len()
        );

        let mut tasks = JoinSet::new();
        for watch in &self.watches {
            let runner = WatchRunner::new(
                watch.clone(),
                self.source.clone(),
                self.transport.clone(),
                self.config.clone(),
            );
            tasks.spawn(runner.run(cancel.child_token()));
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Watch task failed: {}", e);
            }
        }

        info!("Campground watcher stopped");
    }
}
