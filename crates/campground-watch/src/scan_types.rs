use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::date_utils::{expand_range, weekends_in_range};

/// Base URL of the public campground page used in notifications
pub const CAMPGROUND_URL_BASE: &str = "https://www.recreation.gov/camping/campgrounds";

/// A user's standing request to be alerted about one campground
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchDefinition {
    /// Unique identifier of the watch, used to scope dedup keys
    pub id: Uuid,
    /// Campground name for display purposes
    pub campground_name: String,
    /// Recreation.gov facility ID used to query availability
    pub campground_id: u64,
    /// Calendar dates the user cares about
    pub dates: BTreeSet<NaiveDate>,
    /// Restrict to these loops (`None` = any loop)
    pub loops: Option<BTreeSet<String>>,
    /// Restrict to one site (`None` = any site)
    pub site: Option<String>,
    /// Delivery addresses (e-mail or phone)
    pub recipients: BTreeSet<String>,
}

impl WatchDefinition {
    /// Create a watch for any site on the given dates
    pub fn new(
        campground_name: impl Into<String>,
        campground_id: u64,
        dates: impl IntoIterator<Item = NaiveDate>,
        recipients: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campground_name: campground_name.into(),
            campground_id,
            dates: dates.into_iter().collect(),
            loops: None,
            site: None,
            recipients: recipients.into_iter().collect(),
        }
    }

    /// Restrict the watch to the given loops
    pub fn with_loops(mut self, loops: impl IntoIterator<Item = String>) -> Self {
        self.loops = Some(loops.into_iter().collect());
        self
    }

    /// Restrict the watch to one site
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Check the registration invariants of the watch
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.campground_name.trim().is_empty() {
            return Err(WatchError::Validation(
                "campground name is required".to_string(),
            ));
        }
        if self.dates.is_empty() {
            return Err(WatchError::Validation(format!(
                "watch '{}' has no dates",
                self.campground_name
            )));
        }
        if self.recipients.is_empty() {
            return Err(WatchError::Validation(format!(
                "watch '{}' has no recipients",
                self.campground_name
            )));
        }
        if matches!(self.loops, Some(ref loops) if loops.is_empty()) {
            return Err(WatchError::Validation(format!(
                "watch '{}' restricts to an empty set of loops",
                self.campground_name
            )));
        }
        Ok(())
    }

    /// Link to the campground's booking page
    pub fn booking_url(&self) -> String {
        format!("{}/{}", CAMPGROUND_URL_BASE, self.campground_id)
    }
}

/// How the dates of a watch are expressed in configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DateSelection {
    /// Every night from `start` to `end` inclusive
    Range {
        /// First date
        start: NaiveDate,
        /// Last date
        end: NaiveDate,
    },
    /// Saturday/Sunday pairs between `start` and `end`
    Weekends {
        /// First date
        start: NaiveDate,
        /// Last date
        end: NaiveDate,
    },
    /// An explicit list of dates
    List {
        /// The dates
        dates: Vec<NaiveDate>,
    },
}

impl DateSelection {
    /// Resolve the selection into concrete calendar dates
    pub fn resolve(&self) -> Result<BTreeSet<NaiveDate>, WatchError> {
        match self {
            DateSelection::Range { start, end } => Ok(expand_range(*start, *end)?.collect()),
            DateSelection::Weekends { start, end } => {
                if end < start {
                    return Err(WatchError::InvalidDateRange {
                        start: *start,
                        end: *end,
                    });
                }
                Ok(weekends_in_range(*start, *end).collect())
            }
            DateSelection::List { dates } => Ok(dates.iter().copied().collect()),
        }
    }
}

/// A watch as written in the watch file
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    /// Optional stable identifier; generated when absent
    #[serde(default)]
    pub id: Option<Uuid>,

    /// Name of the campground for display purposes
    #[validate(length(min = 1, message = "Campground name is required"))]
    pub campground_name: String,

    /// Recreation.gov facility ID
    #[validate(range(min = 1, message = "Campground ID must be positive"))]
    pub campground_id: u64,

    /// Dates to watch
    pub dates: DateSelection,

    /// Optional loop restriction
    #[serde(default)]
    pub loops: Option<Vec<String>>,

    /// Optional site restriction
    #[serde(default)]
    pub site: Option<String>,

    /// Who to notify
    #[validate(length(min = 1, message = "At least one recipient is required"))]
    pub recipients: Vec<String>,
}

impl WatchConfig {
    /// Validate the record and turn it into a [`WatchDefinition`]
    pub fn into_definition(self) -> Result<WatchDefinition, WatchError> {
        self.validate()
            .map_err(|e| WatchError::Validation(format!("{}: {}", self.campground_name, e)))?;

        let definition = WatchDefinition {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            campground_name: self.campground_name,
            campground_id: self.campground_id,
            dates: self.dates.resolve()?,
            loops: self.loops.map(|loops| loops.into_iter().collect()),
            site: self.site,
            recipients: self.recipients.into_iter().collect(),
        };
        definition.validate()?;

        Ok(definition)
    }
}

/// A calendar month bucket, the unit the availability source is queried by
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ReservationMonth(NaiveDate);

impl ReservationMonth {
    /// The month containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        // Day 1 exists in every month.
        Self(date.with_day(1).unwrap_or(date))
    }

    /// First day of the month
    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// Whether `date` falls inside this month
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.0.year() && date.month() == self.0.month()
    }
}

impl fmt::Display for ReservationMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

/// Availability of one site on one night
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AvailabilityStatus {
    /// Bookable now
    Available,
    /// Booked or otherwise unavailable
    NotAvailable,
    /// Cannot be reserved online
    NotReservable,
    /// Closed for reservation by management
    NotReservableManagement,
    /// First-come first-served and open
    Open,
    /// Already reserved
    Reserved,
}

impl AvailabilityStatus {
    /// The single match rule: only `Available` and `Open` count
    pub fn is_positive(self) -> bool {
        matches!(self, AvailabilityStatus::Available | AvailabilityStatus::Open)
    }

    /// Display string used by recreation.gov
    pub fn as_str(self) -> &'static str {
        match self {
            AvailabilityStatus::Available => "Available",
            AvailabilityStatus::NotAvailable => "Not Available",
            AvailabilityStatus::NotReservable => "Not Reservable",
            AvailabilityStatus::NotReservableManagement => "Not Reservable Management",
            AvailabilityStatus::Open => "Open",
            AvailabilityStatus::Reserved => "Reserved",
        }
    }
}

impl FromStr for AvailabilityStatus {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Available" => Ok(AvailabilityStatus::Available),
            "Not Available" => Ok(AvailabilityStatus::NotAvailable),
            "Not Reservable" => Ok(AvailabilityStatus::NotReservable),
            "Not Reservable Management" => Ok(AvailabilityStatus::NotReservableManagement),
            "Open" => Ok(AvailabilityStatus::Open),
            "Reserved" => Ok(AvailabilityStatus::Reserved),
            other => Err(WatchError::DataFormat(format!(
                "unknown availability status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive data about a campsite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CampsiteMetadata {
    /// Display name, e.g. "A001"
    pub site_name: Option<String>,
    /// Loop the site belongs to
    pub loop_name: Option<String>,
    /// e.g. "STANDARD NONELECTRIC"
    pub campsite_type: Option<String>,
    /// "Overnight" or "Day"
    pub type_of_use: Option<String>,
    /// Minimum party size
    pub min_people: Option<u32>,
    /// Maximum party size
    pub max_people: Option<u32>,
    /// e.g. "Site-Specific"
    pub reserve_type: Option<String>,
}

/// Availability of one site over the nights of a month
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteAvailability {
    /// Site metadata
    pub metadata: CampsiteMetadata,
    /// Status per night
    pub availabilities: BTreeMap<NaiveDate, AvailabilityStatus>,
}

/// The availability of a campground for one reservation month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilitySnapshot {
    /// Campground the data belongs to
    pub campground_id: u64,
    /// Month that was queried
    pub month: ReservationMonth,
    /// Sites keyed by site ID
    pub sites: BTreeMap<String, SiteAvailability>,
    /// When the data was fetched
    pub fetched_at: DateTime<Utc>,
}

/// A qualifying (site, date) pair found for a watch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// Watch that matched
    pub watch_id: Uuid,
    /// Campground of the watch
    pub campground_id: u64,
    /// Site ID
    pub site_id: String,
    /// Human readable site name (falls back to the site ID)
    pub site_name: String,
    /// Night that is available
    pub date: NaiveDate,
}

impl Match {
    /// Dedup key of this match
    pub fn key(&self) -> MatchKey {
        MatchKey {
            watch_id: self.watch_id,
            campground_id: self.campground_id,
            site_id: self.site_id.clone(),
            date: self.date,
        }
    }
}

/// Identity of a match for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    /// Watch that matched
    pub watch_id: Uuid,
    /// Campground of the watch
    pub campground_id: u64,
    /// Site ID
    pub site_id: String,
    /// Night that is available
    pub date: NaiveDate,
}

/// Errors raised by the watch core
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    /// Invalid date range
    #[error("Invalid date range: end {end} is before start {start}")]
    InvalidDateRange {
        /// Requested start
        start: NaiveDate,
        /// Requested end
        end: NaiveDate,
    },

    /// Snapshot does not belong to the watch's campground
    #[error("Unknown campground: expected {expected}, snapshot is for {actual}")]
    UnknownCampground {
        /// Campground of the watch
        expected: u64,
        /// Campground of the snapshot
        actual: u64,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Data format error
    #[error("Data format error: {0}")]
    DataFormat(String),
}
