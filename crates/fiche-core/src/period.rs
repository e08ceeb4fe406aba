use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar month, the bucket unit of every monthly series.
///
/// Serialized as `"YYYY-MM"` so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<YearMonth> {
        (1..=12).contains(&month).then_some(YearMonth { year, month })
    }

    pub fn of<D: Datelike>(date: &D) -> YearMonth {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn succ(self) -> YearMonth {
        if self.month == 12 {
            YearMonth {
                year: self.year + 1,
                month: 1,
            }
        } else {
            YearMonth {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// Every month from `self` to `last`, both included. Empty when `last`
    /// precedes `self`.
    pub fn through(self, last: YearMonth) -> Vec<YearMonth> {
        let mut months = Vec::new();
        let mut current = self;
        while current <= last {
            months.push(current);
            current = current.succ();
        }
        months
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("invalid month '{s}' (expected YYYY-MM)"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{s}'"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{s}'"))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month out of range in '{s}'"))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Closed interval of instants a figure is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// The trailing stock window ending at `as_of`, `None` when it would
    /// start before the earliest representable date.
    pub fn trailing(as_of: DateTime<Utc>, days: i64) -> Option<Window> {
        Some(Window {
            start: trailing_window_start(as_of, days)?,
            end: as_of,
        })
    }

    /// January 1st of the year of `as_of` up to `as_of`.
    pub fn year_to_date(as_of: DateTime<Utc>) -> Window {
        Window {
            start: year_start(as_of),
            end: as_of,
        }
    }

    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        self.start <= *t && *t <= self.end
    }
}

/// Start of the trailing stock window: the first day of the month that
/// contains `as_of - days`, at midnight UTC.
pub fn trailing_window_start(as_of: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    let back = as_of.checked_sub_signed(Duration::try_days(days)?)?;
    let first = YearMonth::of(&back).first_day();
    Some(Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0)?))
}

/// January 1st of the year of `as_of`, at midnight UTC.
pub fn year_start(as_of: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(as_of.year(), 1, 1).unwrap_or_default();
    Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Days elapsed since January 1st, counting the current day.
pub fn days_elapsed_in_year(as_of: DateTime<Utc>) -> u32 {
    as_of.ordinal()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_succ_wraps_year() {
        let dec = YearMonth::new(2023, 12).unwrap();
        assert_eq!(dec.succ(), YearMonth::new(2024, 1).unwrap());
    }

    #[test]
    fn test_through_inclusive() {
        let from = YearMonth::new(2023, 11).unwrap();
        let to = YearMonth::new(2024, 2).unwrap();
        let months: Vec<String> = from.through(to).iter().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert!(to.through(from).is_empty());
    }

    #[test]
    fn test_parse_and_display() {
        let m: YearMonth = "2024-03".parse().unwrap();
        assert_eq!(m, YearMonth::new(2024, 3).unwrap());
        assert_eq!(m.to_string(), "2024-03");
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("march".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_month_serializes_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(YearMonth::new(2024, 1).unwrap(), 3u64);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"2024-01":3}"#);
    }

    #[test]
    fn test_trailing_window_starts_on_first_of_month() {
        let start = trailing_window_start(utc(2024, 6, 15), 365).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_overlong_window_is_none() {
        assert_eq!(trailing_window_start(utc(2024, 6, 15), 1_000_000_000), None);
        assert_eq!(trailing_window_start(utc(2024, 6, 15), i64::MAX), None);
        assert!(Window::trailing(utc(2024, 6, 15), 1_000_000_000).is_none());
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let as_of = utc(2024, 6, 15);
        let w = Window::trailing(as_of, 365).unwrap();
        assert!(w.contains(&Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()));
        assert!(w.contains(&as_of));
        assert!(!w.contains(&Utc.with_ymd_and_hms(2023, 5, 31, 23, 59, 59).unwrap()));
        assert!(!Window::year_to_date(as_of).contains(&utc(2023, 12, 31)));
    }

    #[test]
    fn test_year_start_and_days_elapsed() {
        let as_of = utc(2024, 2, 10);
        assert_eq!(year_start(as_of), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(days_elapsed_in_year(as_of), 41);
    }
}
