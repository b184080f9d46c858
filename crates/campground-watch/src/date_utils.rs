use std::collections::BTreeSet;
use std::iter::FusedIterator;

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::scan_types::{ReservationMonth, WatchError};

/// Reduce a set of dates to the reservation months that cover them.
///
/// The availability source answers per month, so this yields one query per
/// distinct month instead of one per date.
pub fn months_for<'a, I>(dates: I) -> BTreeSet<ReservationMonth>
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    dates
        .into_iter()
        .map(|date| ReservationMonth::containing(*date))
        .collect()
}

/// Every calendar day from `start` to `end`, inclusive and ascending.
pub fn expand_range(start: NaiveDate, end: NaiveDate) -> Result<DateRange, WatchError> {
    if end < start {
        return Err(WatchError::InvalidDateRange { start, end });
    }

    Ok(DateRange {
        next: Some(start),
        end,
    })
}

/// Saturday/Sunday pairs for every Saturday in `[start, end]`.
///
/// A pair is emitted whole even when its Sunday falls after `end`. A Sunday
/// at the very start of the range is not paired with the Saturday before it,
/// so it is dropped.
pub fn weekends_in_range(start: NaiveDate, end: NaiveDate) -> Weekends {
    let offset = (Weekday::Sat.num_days_from_monday() + 7
        - start.weekday().num_days_from_monday())
        % 7;

    Weekends {
        saturday: start.checked_add_days(Days::new(u64::from(offset))),
        sunday: None,
        end,
    }
}

/// Lazy iterator over the days of an inclusive range.
///
/// Cloning restarts the walk from the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DateRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next.filter(|date| *date <= self.end)?;
        self.next = current.succ_opt();
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next {
            Some(next) if next <= self.end => (self.end - next).num_days() as usize + 1,
            _ => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DateRange {}
impl FusedIterator for DateRange {}

/// Lazy iterator over weekend pairs, see [`weekends_in_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weekends {
    saturday: Option<NaiveDate>,
    sunday: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for Weekends {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        if let Some(sunday) = self.sunday.take() {
            return Some(sunday);
        }

        let saturday = self.saturday.filter(|date| *date <= self.end)?;
        self.sunday = saturday.succ_opt();
        self.saturday = saturday.checked_add_days(Days::new(7));
        Some(saturday)
    }
}

impl FusedIterator for Weekends {}
