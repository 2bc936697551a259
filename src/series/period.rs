use chrono::{Datelike, Duration, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// Width of one time-series period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Day,
    /// ISO weeks, starting on Monday.
    Week,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    /// First day of the period containing `date`.
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            Granularity::Month => first_of(date.year(), date.month()).unwrap_or(date),
            Granularity::Quarter => {
                let month = (date.month() - 1) / 3 * 3 + 1;
                first_of(date.year(), month).unwrap_or(date)
            }
            Granularity::Year => first_of(date.year(), 1).unwrap_or(date),
        }
    }

    /// Start of the period after the one starting at `start`.
    pub fn next(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => start.checked_add_signed(Duration::days(1)),
            Granularity::Week => start.checked_add_signed(Duration::days(7)),
            Granularity::Month => start.checked_add_months(Months::new(1)),
            Granularity::Quarter => start.checked_add_months(Months::new(3)),
            Granularity::Year => start.checked_add_months(Months::new(12)),
        }
    }

    /// Human-readable period name, e.g. `2023-04` or `2023-Q2`.
    pub fn label(&self, start: NaiveDate) -> String {
        match self {
            Granularity::Day => start.format("%Y-%m-%d").to_string(),
            Granularity::Week => start.format("%G-W%V").to_string(),
            Granularity::Month => start.format("%Y-%m").to_string(),
            Granularity::Quarter => format!("{}-Q{}", start.year(), (start.month() - 1) / 3 + 1),
            Granularity::Year => start.format("%Y").to_string(),
        }
    }
}

fn first_of(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "d" | "daily" => Ok(Granularity::Day),
            "week" | "w" | "weekly" => Ok(Granularity::Week),
            "month" | "m" | "monthly" => Ok(Granularity::Month),
            "quarter" | "q" | "quarterly" => Ok(Granularity::Quarter),
            "year" | "y" | "yearly" => Ok(Granularity::Year),
            other => Err(format!("unknown granularity {:?}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_start() {
        let d = date(2023, 8, 17); // a Thursday
        assert_eq!(Granularity::Day.period_start(d), d);
        assert_eq!(Granularity::Week.period_start(d), date(2023, 8, 14));
        assert_eq!(Granularity::Month.period_start(d), date(2023, 8, 1));
        assert_eq!(Granularity::Quarter.period_start(d), date(2023, 7, 1));
        assert_eq!(Granularity::Year.period_start(d), date(2023, 1, 1));
    }

    #[test]
    fn test_next_and_label() {
        assert_eq!(Granularity::Month.next(date(2023, 12, 1)), Some(date(2024, 1, 1)));
        assert_eq!(Granularity::Quarter.next(date(2023, 10, 1)), Some(date(2024, 1, 1)));
        assert_eq!(Granularity::Month.label(date(2023, 4, 1)), "2023-04");
        assert_eq!(Granularity::Quarter.label(date(2023, 4, 1)), "2023-Q2");
        assert_eq!(Granularity::Week.label(date(2023, 1, 2)), "2023-W01");
    }

    #[test]
    fn test_parse() {
        assert_eq!("Month".parse::<Granularity>(), Ok(Granularity::Month));
        assert_eq!("q".parse::<Granularity>(), Ok(Granularity::Quarter));
        assert_eq!(Granularity::Week.to_string(), "week");
        assert!("fortnight".parse::<Granularity>().is_err());
    }
}
