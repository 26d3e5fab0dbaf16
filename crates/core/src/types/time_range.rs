//! Order history time windows.

use core::fmt;
use core::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Error returned when parsing an unknown [`TimeRange`] name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown time range: {0} (expected all, last_month or last_3_months)")]
pub struct TimeRangeError(String);

/// Window applied to a user's order history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeRange {
    /// Every order.
    #[default]
    #[serde(rename = "all")]
    All,
    /// Orders placed at most 31 days before the reference date.
    #[serde(rename = "last_month")]
    LastMonth,
    /// Orders placed at most 92 days before the reference date.
    #[serde(rename = "last_3_months")]
    LastThreeMonths,
}

impl TimeRange {
    /// All accepted wire names, in declaration order.
    pub const NAMES: [&'static str; 3] = ["all", "last_month", "last_3_months"];

    /// Maximum order age in days, or `None` for no limit.
    #[must_use]
    pub const fn max_age_days(&self) -> Option<i64> {
        match self {
            Self::All => None,
            Self::LastMonth => Some(31),
            Self::LastThreeMonths => Some(92),
        }
    }

    /// Parse a wire name, treating anything unrecognised as [`TimeRange::All`].
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Whether an order placed on `order_date` falls inside this window
    /// relative to `today`.
    #[must_use]
    pub fn contains(&self, order_date: NaiveDate, today: NaiveDate) -> bool {
        self.max_age_days()
            .is_none_or(|limit| (today - order_date).num_days() <= limit)
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::LastMonth => "last_month",
            Self::LastThreeMonths => "last_3_months",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = TimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(Self::All),
            "last_month" => Ok(Self::LastMonth),
            "last_3_months" => Ok(Self::LastThreeMonths),
            other => Err(TimeRangeError(other.to_string())),
        }
    }
}
