use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Time Helper Types
// ============================================================================

/// Calendar month key used to index monthly observations.
///
/// Ordering is chronological. Serialized as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Create a period, returning `None` for a month outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month of year (1-12)
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Zero-based month index (0 = January), i.e. the seasonal position
    pub fn month0(&self) -> usize {
        (self.month - 1) as usize
    }

    /// Months since year 0, handy for arithmetic
    fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month - 1)
    }

    fn from_ordinal(ordinal: i64) -> Self {
        let year = ordinal.div_euclid(12) as i32;
        let month = ordinal.rem_euclid(12) as u32 + 1;
        Self { year, month }
    }

    /// Period `n` months later (or earlier for negative `n`)
    pub fn add_months(&self, n: i64) -> Self {
        Self::from_ordinal(self.ordinal() + n)
    }

    /// The following month
    pub fn succ(&self) -> Self {
        self.add_months(1)
    }

    /// Signed number of months from `self` to `other`
    pub fn months_until(&self, other: &YearMonth) -> i64 {
        other.ordinal() - self.ordinal()
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
            .ok_or_else(|| format!("expected YYYY-MM, got '{s}'"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{s}'"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{s}'"))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month out of range in '{s}'"))
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_arithmetic_wraps_years() {
        let dec = YearMonth::new(2021, 12).unwrap();
        assert_eq!(dec.succ(), YearMonth::new(2022, 1).unwrap());
        assert_eq!(dec.add_months(13), YearMonth::new(2023, 1).unwrap());
        assert_eq!(dec.add_months(-12), YearMonth::new(2020, 12).unwrap());
        assert_eq!(dec.months_until(&YearMonth::new(2022, 3).unwrap()), 3);
    }

    #[test]
    fn test_parse_and_display() {
        let p: YearMonth = "2021-03".parse().unwrap();
        assert_eq!(p.to_string(), "2021-03");
        assert_eq!(p.month0(), 2);
        assert!("2021-13".parse::<YearMonth>().is_err());
        assert!("202103".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_from_date_drops_day() {
        let date = NaiveDate::from_ymd_opt(2022, 7, 31).unwrap();
        assert_eq!(YearMonth::from_date(date), YearMonth::new(2022, 7).unwrap());
    }

    #[test]
    fn test_serde_as_string() {
        let p = YearMonth::new(2022, 1).unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"2022-01\"");
        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
