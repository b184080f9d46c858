//! # Campground Watch
//!
//! This crate polls campground availability, matches it against user watches
//! and notifies each watch's recipients once per newly found campsite night.
//! It owns date reasoning, match evaluation, notification dedup and the
//! per-watch polling loops; the availability source and the notification
//! transport are supplied by the caller.

/// Backoff policy for failing polls
mod backoff;
pub use backoff::*;

/// Date ranges, weekend pairs and reservation months
pub mod date_utils;
pub use date_utils::{DateRange, Weekends, expand_range, months_for, weekends_in_range};

/// Transport that only logs notifications
mod email_service;
pub use email_service::*;

/// Per-watch polling loops
mod executor;
pub use executor::*;

/// Matching availability snapshots against watches
mod matcher;
pub use matcher::*;

/// Dedup state and notification dispatch
mod notification_service;
pub use notification_service::*;

/// Availability source contract and the recreation.gov client
mod rec_gov_client;
pub use rec_gov_client::*;

/// Types for campground watches
mod scan_types;
pub use scan_types::*;
