//! Month tokens and date parsing
//!
//! Milestone rows carry their date as a month token such as `nov-2025`.
//! Other date columns hold free-form timestamps; [`parse_loose_date`]
//! accepts the formats seen in practice.

use crate::error::TimelineError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

static MONTH_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]{3})-(\d{4})$").expect("static regex"));

/// A calendar month: year plus zero-based month index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthToken {
    pub year: i32,
    #[serde(deserialize_with = "deserialize_month_index")]
    pub month_index: u32,
}

/// Reject stored month indexes outside `0..12`
pub(crate) fn deserialize_month_index<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let index = u32::deserialize(deserializer)?;
    if index < 12 {
        Ok(index)
    } else {
        Err(serde::de::Error::custom(TimelineError::InvalidMonthIndex(index)))
    }
}

impl MonthToken {
    /// Create token; `month_index` must be `0..12`
    #[must_use]
    pub fn new(year: i32, month_index: u32) -> Option<Self> {
        (month_index < 12).then_some(Self { year, month_index })
    }

    /// Month containing the given date
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month_index: date.month0(),
        }
    }

    /// Strictly parse `<3-letter-lowercase-month>-<year>`
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let caps = MONTH_TOKEN.captures(token)?;
        let month_index = MONTH_ABBREVIATIONS.iter().position(|m| *m == &caps[1])?;
        let year = caps[2].parse().ok()?;
        Some(Self {
            year,
            month_index: u32::try_from(month_index).ok()?,
        })
    }

    /// Shift by a signed number of months
    #[must_use]
    pub fn offset(self, months: i32) -> Self {
        let total = self.year * 12 + self.month_index as i32 + months;
        Self {
            year: total.div_euclid(12),
            month_index: total.rem_euclid(12) as u32,
        }
    }

    /// First day of this month
    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month_index + 1, 1).unwrap_or_default()
    }

    // Total for out-of-range struct literals
    fn abbreviation(self) -> &'static str {
        MONTH_ABBREVIATIONS[self.month_index as usize % MONTH_ABBREVIATIONS.len()]
    }

    /// Display label, e.g. `Nov-2025`
    #[must_use]
    pub fn label(self) -> String {
        let mut chars = self.abbreviation().chars();
        let capitalized: String = chars
            .next()
            .map(|c| c.to_ascii_uppercase())
            .into_iter()
            .chain(chars)
            .collect();
        format!("{capitalized}-{}", self.year)
    }

    /// Storage token, e.g. `nov-2025`
    #[must_use]
    pub fn token(self) -> String {
        format!("{}-{}", self.abbreviation(), self.year)
    }
}

impl fmt::Display for MonthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

impl FromStr for MonthToken {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| TimelineError::InvalidMonthToken(s.to_string()))
    }
}

/// Parse any of the date shapes found in row columns
///
/// Accepts month tokens (first of month), RFC 3339 timestamps,
/// `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` and `MM/DD/YYYY`.
#[must_use]
pub fn parse_loose_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(token) = MonthToken::parse(&raw.to_ascii_lowercase()) {
        return token.first_day().and_hms_opt(0, 0, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}
