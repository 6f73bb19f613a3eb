use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A reporting window: one calendar month or one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Month { year: i32, month: u32 },
    Year(i32),
}

#[derive(Debug, PartialEq, Eq)]
pub struct PeriodParseError(pub String);

impl fmt::Display for PeriodParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid period '{}', expected YYYY or YYYY-MM", self.0)
    }
}

impl Period {
    /// `None` unless both the first and the last day of the month exist.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)?;
        last_of(year, month)?;
        Some(Period::Month { year, month })
    }

    pub fn year(year: i32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, 1, 1)?;
        last_of(year, 12)?;
        Some(Period::Year(year))
    }

    /// First day, inclusive.
    pub fn start(&self) -> NaiveDate {
        match *self {
            Period::Month { year, month } => first_of(year, month),
            Period::Year(year) => first_of(year, 1),
        }
    }

    /// Last day, inclusive.
    pub fn end(&self) -> NaiveDate {
        let last = match *self {
            Period::Month { year, month } => last_of(year, month),
            Period::Year(year) => last_of(year, 12),
        };
        last.unwrap_or(NaiveDate::MAX)
    }

    pub fn days(&self) -> i64 {
        (self.end() - self.start()).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start() <= date && date <= self.end()
    }

    /// The twelve months of a year, or the month itself.
    pub fn months(&self) -> Vec<Period> {
        match *self {
            Period::Month { .. } => vec![*self],
            Period::Year(year) => (1..=12).map(|month| Period::Month { year, month }).collect(),
        }
    }

    /// Short column label: `Jan`, `Feb`, ... or the year.
    pub fn label(&self) -> String {
        match *self {
            Period::Month { .. } => self.start().format("%b").to_string(),
            Period::Year(year) => year.to_string(),
        }
    }
}

// Only called with validated (year, month) pairs.
fn first_of(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

/// Last day of the month, built without stepping into the next one.
fn last_of(year: i32, month: u32) -> Option<NaiveDate> {
    if month == 12 {
        return NaiveDate::from_ymd_opt(year, 12, 31);
    }
    NaiveDate::from_ymd_opt(year, month + 1, 1)?.pred_opt()
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
            Period::Year(year) => write!(f, "{:04}", year),
        }
    }
}

impl FromStr for Period {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PeriodParseError(s.to_string());
        let s = s.trim();

        match s.split_once('-') {
            Some((y, m)) => {
                let year: i32 = y.parse().map_err(|_| err())?;
                let month: u32 = m.parse().map_err(|_| err())?;
                Period::month(year, month).ok_or_else(err)
            }
            None => {
                let year: i32 = s.parse().map_err(|_| err())?;
                Period::year(year).ok_or_else(err)
            }
        }
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Inclusive days of `[start, end]` that fall inside `period`.
///
/// A range crossing a period boundary is only counted for the part inside,
/// so a leave spanning two months is split between them.
pub fn overlap_days(start: NaiveDate, end: NaiveDate, period: &Period) -> i64 {
    let from = start.max(period.start());
    let to = end.min(period.end());
    ((to - from).num_days() + 1).max(0)
}

/// Month of `date` as a period.
pub fn month_of(date: NaiveDate) -> Period {
    Period::Month {
        year: date.year(),
        month: date.month(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn month_bounds() {
        let feb = Period::month(2024, 2).unwrap();
        assert_eq!(feb.start(), d("2024-02-01"));
        assert_eq!(feb.end(), d("2024-02-29"));
        assert_eq!(feb.days(), 29);

        let dec = Period::month(2023, 12).unwrap();
        assert_eq!(dec.end(), d("2023-12-31"));
        assert_eq!(Period::Year(2023).days(), 365);
    }

    #[test]
    fn parses_and_prints() {
        assert_eq!("2024-06".parse::<Period>(), Ok(Period::Month { year: 2024, month: 6 }));
        assert_eq!("2024".parse::<Period>(), Ok(Period::Year(2024)));
        assert!("2024-13".parse::<Period>().is_err());
        assert!("June".parse::<Period>().is_err());
        assert_eq!(Period::Month { year: 2024, month: 6 }.to_string(), "2024-06");
    }

    #[test]
    fn leave_across_june_and_july_is_split() {
        let (start, end) = (d("2024-06-25"), d("2024-07-05"));

        let june = Period::month(2024, 6).unwrap();
        let july = Period::month(2024, 7).unwrap();

        assert_eq!(overlap_days(start, end, &june), 6);
        assert_eq!(overlap_days(start, end, &july), 5);
        assert_eq!(overlap_days(start, end, &Period::Year(2024)), 11);
    }

    #[test]
    fn disjoint_ranges_count_zero() {
        let june = Period::month(2024, 6).unwrap();
        assert_eq!(overlap_days(d("2024-05-01"), d("2024-05-31"), &june), 0);
        assert_eq!(overlap_days(d("2024-07-01"), d("2024-07-02"), &june), 0);
    }

    #[test]
    fn overlap_stays_within_period_length() {
        let periods = [
            Period::month(2024, 2).unwrap(),
            Period::month(2023, 12).unwrap(),
            Period::Year(2024),
        ];
        let ranges = [
            (d("2020-01-01"), d("2030-01-01")),
            (d("2024-02-10"), d("2024-02-10")),
            (d("2023-12-31"), d("2024-01-01")),
            (d("2024-03-01"), d("2024-02-01")),
        ];

        for period in &periods {
            for (start, end) in ranges {
                let days = overlap_days(start, end, period);
                assert!(days >= 0 && days <= period.days(), "{} {:?}", period, (start, end));
            }
        }
    }

    #[test]
    fn last_supported_year_keeps_a_positive_length() {
        let year: Period = "262142".parse().unwrap();
        assert_eq!(year.end(), NaiveDate::MAX);
        assert!(year.start() <= year.end());
        assert_eq!(year.days(), 365);

        let december: Period = "262142-12".parse().unwrap();
        assert_eq!(december.days(), 31);
        assert_eq!(
            overlap_days(NaiveDate::MIN, NaiveDate::MAX, &december),
            december.days()
        );

        assert!("262143".parse::<Period>().is_err());
        assert!(Period::month(262143, 1).is_none());
    }

    #[test]
    fn year_expands_to_labelled_months() {
        let months = Period::Year(2024).months();
        assert_eq!(months.len(), 12);
        assert_eq!(months[0].label(), "Jan");
        assert_eq!(months[11].label(), "Dec");
        assert_eq!(month_of(d("2024-06-25")), Period::Month { year: 2024, month: 6 });
    }
}
