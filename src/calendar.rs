use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::InputError;

/// Horizon length used when neither the caller nor the config asks for another one.
pub const DEFAULT_HORIZON_MONTHS: usize = 100;

/// Longest horizon ever generated: one hundred years.
pub const MAX_HORIZON_MONTHS: usize = 1200;

/// Canonical calendar month. Ordering and equality only look at year and month.
///
/// Internally this is the first day of the month, so the day component never
/// leaks into comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey(NaiveDate);

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// Truncates a date to its month.
    pub fn of(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    /// First day of the month.
    pub fn first_day(self) -> NaiveDate {
        self.0
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }

    /// The month `n` months later, or `None` past the end of the supported calendar.
    pub fn plus(self, n: u32) -> Option<Self> {
        self.0.checked_add_months(Months::new(n)).map(Self)
    }

    pub fn next(self) -> Option<Self> {
        self.plus(1)
    }

    /// Short human label, e.g. `Jan 2025`.
    pub fn label(self) -> String {
        self.0.format("%b %Y").to_string()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for MonthKey {
    type Err = InputError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let (y, m) = trimmed
            .split_once('-')
            .ok_or_else(|| InputError::Month(raw.to_string()))?;
        let year: i32 = y.parse().map_err(|_| InputError::Month(raw.to_string()))?;
        let month: u32 = m.parse().map_err(|_| InputError::Month(raw.to_string()))?;
        MonthKey::new(year, month).ok_or_else(|| InputError::Month(raw.to_string()))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One month of the projection horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HorizonMonth {
    pub key: MonthKey,
    pub date: NaiveDate,
    pub label: String,
    pub is_current: bool,
}

/// `count` consecutive months starting at the anchor's month. Index 0 is the current month.
///
/// `count` is capped at [`MAX_HORIZON_MONTHS`].
pub fn horizon(count: usize, anchor: NaiveDate) -> Vec<HorizonMonth> {
    let count = count.min(MAX_HORIZON_MONTHS);
    let start = MonthKey::of(anchor);
    let mut months = Vec::with_capacity(count);
    let mut cursor = Some(start);
    for i in 0..count {
        let Some(key) = cursor else {
            break;
        };
        months.push(HorizonMonth {
            key,
            date: key.first_day(),
            label: key.label(),
            is_current: i == 0,
        });
        cursor = key.next();
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_key_discards_day() {
        assert_eq!(MonthKey::of(date(2025, 1, 31)), MonthKey::of(date(2025, 1, 1)));
        assert_eq!(MonthKey::of(date(2025, 1, 15)).first_day(), date(2025, 1, 1));
    }

    #[test]
    fn month_key_orders_by_year_then_month() {
        let dec = MonthKey::new(2024, 12).unwrap();
        let jan = MonthKey::new(2025, 1).unwrap();
        let feb = MonthKey::new(2025, 2).unwrap();
        assert!(dec < jan && jan < feb);
        assert_eq!(dec.next(), Some(jan));
        assert_eq!(jan.plus(1), Some(feb));
    }

    #[test]
    fn month_key_string_form_round_trips() {
        let key: MonthKey = "2025-03".parse().unwrap();
        assert_eq!(key.to_string(), "2025-03");
        assert_eq!(key.label(), "Mar 2025");
        assert!("2025-13".parse::<MonthKey>().is_err());
        assert!("2025".parse::<MonthKey>().is_err());
        assert!("abcd-01".parse::<MonthKey>().is_err());
    }

    #[test]
    fn horizon_starts_at_anchor_month_and_marks_only_first_current() {
        let months = horizon(14, date(2025, 11, 20));
        assert_eq!(months.len(), 14);
        assert_eq!(months[0].key.to_string(), "2025-11");
        assert_eq!(months[0].date, date(2025, 11, 1));
        assert!(months[0].is_current);
        assert!(months[1..].iter().all(|m| !m.is_current));
        assert_eq!(months[2].key.to_string(), "2026-01");
        assert_eq!(months[13].key.to_string(), "2026-12");
    }

    #[test]
    fn oversized_horizon_is_capped() {
        let months = horizon(usize::MAX, date(2025, 1, 1));
        assert_eq!(months.len(), MAX_HORIZON_MONTHS);
        assert_eq!(months[MAX_HORIZON_MONTHS - 1].key.to_string(), "2124-12");
    }

    #[test]
    fn empty_horizon_is_allowed() {
        assert!(horizon(0, date(2025, 1, 1)).is_empty());
    }
}
