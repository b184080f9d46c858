use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::scan_types::{
    AvailabilitySnapshot, AvailabilityStatus, CampsiteMetadata, ReservationMonth, SiteAvailability,
};

/// Source of per-month campground availability
///
/// Calls must be free of side effects from the watcher's point of view; the
/// watcher may repeat them on every poll.
#[async_trait::async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// Wait until the source accepts another request.
    ///
    /// Called before every fetch. Time spent here is not part of the
    /// request timeout.
    async fn ready(&self) {}

    /// Availability of every site of `campground_id` during `month`
    async fn fetch_availability(
        &self,
        campground_id: u64,
        month: ReservationMonth,
    ) -> Result<AvailabilitySnapshot, SourceError>;
}

/// Failure modes of an availability source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Network or transport failure, including timeouts
    #[error("Source unreachable: {0}")]
    Unreachable(String),

    /// The source is throttling us
    #[error("Rate limited by availability source")]
    RateLimited,

    /// The response did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Settings for [`RecGovClient`]
#[derive(Debug, Clone)]
pub struct RecGovConfig {
    /// Base URL of the internal recreation.gov API
    pub base_url: String,

    /// User agent sent with every request
    pub user_agent: String,

    /// HTTP timeout per request (default: 30 seconds)
    pub request_timeout: Duration,

    /// Minimum spacing between outbound requests (default: 2 seconds)
    pub min_request_interval: Duration,
}

impl Default for RecGovConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.recreation.gov/api".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
            request_timeout: Duration::from_secs(30),
            min_request_interval: Duration::from_secs(2),
        }
    }
}

/// Client for the recreation.gov month availability endpoint
pub struct RecGovClient {
    client: Client,
    config: RecGovConfig,

    /// When the last request went out, for pacing
    last_request: Mutex<Option<Instant>>,
}

/// Response of `camps/availability/campground/{id}/month`
#[derive(Debug, Deserialize)]
pub struct MonthAvailabilityResponse {
    /// Sites keyed by campsite ID
    pub campsites: HashMap<String, CampsiteMonth>,
}

/// One campsite in a month availability response
#[derive(Debug, Deserialize)]
pub struct CampsiteMonth {
    /// Status per date key ("2025-07-04T00:00:00Z")
    #[serde(default)]
    pub availabilities: HashMap<String, String>,

    /// Display name of the site
    pub site: Option<String>,

    /// Loop name
    #[serde(rename = "loop")]
    pub campsite_loop: Option<String>,

    /// e.g. "STANDARD NONELECTRIC"
    pub campsite_type: Option<String>,

    /// "Overnight" or "Day"
    pub type_of_use: Option<String>,

    /// Minimum party size
    pub min_num_people: Option<u32>,

    /// Maximum party size
    pub max_num_people: Option<u32>,

    /// e.g. "Site-Specific"
    pub campsite_reserve_type: Option<String>,
}

impl RecGovClient {
    /// Create a new recreation.gov client
    pub fn new(config: RecGovConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SourceError::Unreachable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            last_request: Mutex::new(None),
        })
    }

    /// Wait until the minimum interval since the previous request has passed
    async fn pace(&self) {
        let mut last_request = self.last_request.lock().await;

        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_request_interval {
                sleep(self.config.min_request_interval - elapsed).await;
            }
        }

        *last_request = Some(Instant::now());
    }
}

#[async_trait::async_trait]
impl AvailabilitySource for RecGovClient {
    async fn ready(&self) {
        self.pace().await;
    }

    async fn fetch_availability(
        &self,
        campground_id: u64,
        month: ReservationMonth,
    ) -> Result<AvailabilitySnapshot, SourceError> {
        let url = format!(
            "{}/camps/availability/campground/{}/month",
            self.config.base_url, campground_id
        );
        let start_date = format!("{}T00:00:00.000Z", month.first_day().format("%Y-%m-%d"));

        debug!("Making request to: {}?start_date={}", url, start_date);

        let response = self
            .client
            .get(&url)
            .query(&[("start_date", start_date.as_str())])
            .send()
            .await
            .map_err(|e| SourceError::Unreachable(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            warn!("API request failed with status {}: {}", status, body);
            return Err(classify_status(status, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Unreachable(format!("Failed to read response: {}", e)))?;

        parse_month_response(campground_id, month, &body)
    }
}

/// Map a non-success HTTP status onto the source error taxonomy
fn classify_status(status: StatusCode, body: &str) -> SourceError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited,
        s if s.is_server_error() => SourceError::Unreachable(format!("HTTP {}", s)),
        s => SourceError::MalformedResponse(format!("HTTP {} - {}", s, body)),
    }
}

/// Turn a month availability response body into a snapshot
pub fn parse_month_response(
    campground_id: u64,
    month: ReservationMonth,
    body: &str,
) -> Result<AvailabilitySnapshot, SourceError> {
    let response: MonthAvailabilityResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

    let sites = response
        .campsites
        .into_iter()
        .map(|(campsite_id, campsite)| {
            let availabilities = parse_availabilities(&campsite_id, &campsite.availabilities);
            let metadata = CampsiteMetadata {
                site_name: campsite.site,
                loop_name: campsite.campsite_loop,
                campsite_type: campsite.campsite_type,
                type_of_use: campsite.type_of_use,
                min_people: campsite.min_num_people,
                max_people: campsite.max_num_people,
                reserve_type: campsite.campsite_reserve_type,
            };
            (
                campsite_id,
                SiteAvailability {
                    metadata,
                    availabilities,
                },
            )
        })
        .collect();

    Ok(AvailabilitySnapshot {
        campground_id,
        month,
        sites,
        fetched_at: Utc::now(),
    })
}

/// Parse the date-keyed status map, skipping entries we cannot read
fn parse_availabilities(
    campsite_id: &str,
    raw: &HashMap<String, String>,
) -> BTreeMap<NaiveDate, AvailabilityStatus> {
    let mut parsed = BTreeMap::new();

    for (date_str, status) in raw {
        let Some(date) = parse_date_key(date_str) else {
            warn!("Failed to parse date: {}", date_str);
            continue;
        };

        match status.parse::<AvailabilityStatus>() {
            Ok(status) => {
                parsed.insert(date, status);
            }
            Err(_) => {
                warn!(
                    "Unknown availability status '{}' for site {} on {}",
                    status, campsite_id, date
                );
            }
        }
    }

    parsed
}

/// Date keys look like "2024-01-15T00:00:00Z"
fn parse_date_key(key: &str) -> Option<NaiveDate> {
    let day = key.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
