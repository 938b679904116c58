//! Month bucketing and source filtering
//!
//! Groups qualifying milestone rows into a trailing window of calendar
//! months ending at the current month.

use crate::error::TimelineError;
use crate::milestone::{MilestoneRow, QUALIFYING_STATUSES};
use crate::month::MonthToken;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Validated length of the month window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct MonthsToShow(u32);

impl MonthsToShow {
    /// Smallest accepted window
    pub const MIN: u32 = 1;
    /// Largest accepted window
    pub const MAX: u32 = 120;
    /// Window used when a block has no setting
    pub const DEFAULT: u32 = 30;

    /// Validate a window length
    ///
    /// # Errors
    /// Returns [`TimelineError::InvalidMonthsToShow`] outside `1..=120`
    pub fn new(value: i64) -> Result<Self, TimelineError> {
        if value < i64::from(Self::MIN) || value > i64::from(Self::MAX) {
            return Err(TimelineError::InvalidMonthsToShow {
                value,
                min: Self::MIN,
                max: Self::MAX,
            });
        }
        Ok(Self(value as u32))
    }

    /// Raw value
    #[inline]
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for MonthsToShow {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<i64> for MonthsToShow {
    type Error = TimelineError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MonthsToShow> for u32 {
    fn from(value: MonthsToShow) -> Self {
        value.0
    }
}

/// Row filter applied before bucketing, recorded for provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFilter {
    pub required_fields: Vec<String>,
    pub status_any_of: Vec<String>,
    pub status_match: String,
    pub date_format: String,
}

impl Default for SourceFilter {
    fn default() -> Self {
        Self {
            required_fields: vec!["officialDate".to_string(), "summary".to_string()],
            status_any_of: QUALIFYING_STATUSES.iter().map(|s| (*s).to_string()).collect(),
            status_match: "case-insensitive substring".to_string(),
            date_format: "mon-yyyy".to_string(),
        }
    }
}

/// True if the row belongs on the timeline
#[must_use]
pub fn passes_source_filter(row: &MilestoneRow) -> bool {
    !row.official_date.trim().is_empty()
        && !row.summary.trim().is_empty()
        && row.has_qualifying_status()
}

/// One calendar month of qualifying rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBucket {
    /// Label, e.g. `Jan-2025`
    pub month: String,
    pub year: i32,
    #[serde(deserialize_with = "crate::month::deserialize_month_index")]
    pub month_index: u32,
    pub rows: Vec<MilestoneRow>,
    pub has_data: bool,
}

impl MonthBucket {
    fn empty(token: MonthToken) -> Self {
        Self {
            month: token.label(),
            year: token.year,
            month_index: token.month_index,
            rows: Vec::new(),
            has_data: false,
        }
    }

    /// The bucket's month
    #[must_use]
    pub fn token(&self) -> MonthToken {
        MonthToken {
            year: self.year,
            month_index: self.month_index,
        }
    }
}

/// First and last month of the window ending at `today`
#[must_use]
pub fn window_bounds(months: MonthsToShow, today: NaiveDate) -> (MonthToken, MonthToken) {
    let current = MonthToken::from_date(today);
    let span = i32::try_from(months.get()).unwrap_or(i32::MAX) - 1;
    (current.offset(-span), current)
}

/// Bucket qualifying rows into `months` calendar months ending at `today`
///
/// Buckets are ordered oldest first. Rows whose month token does not parse,
/// or that fall outside the window, are dropped silently. Within a bucket,
/// rows keep their input order.
#[must_use]
pub fn bucketize(rows: &[MilestoneRow], months: MonthsToShow, today: NaiveDate) -> Vec<MonthBucket> {
    let (first, _) = window_bounds(months, today);
    let mut buckets: Vec<MonthBucket> = (0..months.get())
        .map(|i| MonthBucket::empty(first.offset(i as i32)))
        .collect();

    for row in rows.iter().filter(|r| passes_source_filter(r)) {
        let Some(token) = MonthToken::parse(row.official_date.trim()) else {
            tracing::debug!("Skipping row with unparseable date: {}", row.official_date);
            continue;
        };
        if let Some(bucket) = buckets.iter_mut().find(|b| b.token() == token) {
            bucket.rows.push(row.clone());
            bucket.has_data = true;
        }
    }

    buckets
}
