//! Date and time normalization. Public entry points accept dates, date-times
//! or ISO strings and convert them once through [`IntoMoment`].
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{Error, Result};

/// A UTC calendar date or a UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moment {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Moment {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Date(d) => *d,
            Self::DateTime(dt) => dt.date(),
        }
    }

    /// Lower bound of a search window. A bare date covers the whole day.
    pub fn as_start(&self) -> NaiveDateTime {
        match self {
            Self::Date(d) => d.and_time(NaiveTime::MIN),
            Self::DateTime(dt) => *dt,
        }
    }

    /// Upper bound of a search window. A bare date covers the whole day.
    pub fn as_end(&self) -> NaiveDateTime {
        match self {
            Self::Date(d) => d.and_hms_opt(23, 59, 59).unwrap_or(d.and_time(NaiveTime::MIN)),
            Self::DateTime(dt) => *dt,
        }
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

impl FromStr for Moment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::Date(d));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::DateTime(dt.with_timezone(&Utc).naive_utc()));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(Self::DateTime)
            .ok_or_else(|| Error::InvalidTime(s.to_string()))
    }
}

pub trait IntoMoment {
    fn into_moment(self) -> Result<Moment>;
}

impl IntoMoment for Moment {
    fn into_moment(self) -> Result<Moment> {
        Ok(self)
    }
}

impl IntoMoment for NaiveDate {
    fn into_moment(self) -> Result<Moment> {
        Ok(Moment::Date(self))
    }
}

impl IntoMoment for NaiveDateTime {
    fn into_moment(self) -> Result<Moment> {
        Ok(Moment::DateTime(self))
    }
}

impl IntoMoment for DateTime<Utc> {
    fn into_moment(self) -> Result<Moment> {
        Ok(Moment::DateTime(self.naive_utc()))
    }
}

impl IntoMoment for &str {
    fn into_moment(self) -> Result<Moment> {
        self.parse()
    }
}

impl IntoMoment for String {
    fn into_moment(self) -> Result<Moment> {
        self.parse()
    }
}

impl IntoMoment for &String {
    fn into_moment(self) -> Result<Moment> {
        self.parse()
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: impl IntoMoment, end: impl IntoMoment) -> Result<Self> {
        Ok(Self {
            start: start.into_moment()?.date(),
            end: end.into_moment()?.date(),
        })
    }

    /// Days from `start` to `end` in calendar order; empty when inverted.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_string() {
        let moment: Moment = "2023-08-15".parse().unwrap();
        assert_eq!(moment, Moment::Date(date(2023, 8, 15)));
    }

    #[test]
    fn test_parse_datetime_strings() {
        let expected = date(2023, 8, 1).and_hms_opt(12, 0, 0).unwrap();
        for s in ["2023-08-01T12:00:00", "2023-08-01 12:00:00", "2023-08-01T12:00:00Z"] {
            assert_eq!(s.into_moment().unwrap(), Moment::DateTime(expected), "{s}");
        }
    }

    #[test]
    fn test_parse_invalid() {
        let err = "15/08/2023".into_moment().unwrap_err();
        assert!(matches!(err, Error::InvalidTime(_)));
    }

    #[test]
    fn test_date_bounds_cover_whole_day() {
        let moment = Moment::Date(date(2023, 8, 15));
        assert_eq!(moment.as_start(), date(2023, 8, 15).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(moment.as_end(), date(2023, 8, 15).and_hms_opt(23, 59, 59).unwrap());
    }

    #[test]
    fn test_datetime_bounds_pass_through() {
        let dt = date(2023, 8, 1).and_hms_opt(18, 0, 0).unwrap();
        let moment = dt.into_moment().unwrap();
        assert_eq!(moment.as_start(), dt);
        assert_eq!(moment.as_end(), dt);
        assert_eq!(moment.date(), date(2023, 8, 1));
    }

    #[test]
    fn test_window_days_inclusive() {
        let window = DateWindow::new("2023-08-30", "2023-09-02").unwrap();
        let days: Vec<_> = window.days().collect();
        assert_eq!(
            days,
            vec![date(2023, 8, 30), date(2023, 8, 31), date(2023, 9, 1), date(2023, 9, 2)]
        );
        assert_eq!(window.len(), 4);
    }

    #[test]
    fn test_window_single_day() {
        let window = DateWindow::new(date(2023, 8, 15), date(2023, 8, 15)).unwrap();
        assert_eq!(window.days().count(), 1);
        assert!(!window.is_empty());
    }

    #[test]
    fn test_window_inverted_is_empty() {
        let window = DateWindow::new("2023-08-16", "2023-08-15").unwrap();
        assert_eq!(window.days().count(), 0);
        assert_eq!(window.len(), 0);
        assert!(window.is_empty());
    }
}
