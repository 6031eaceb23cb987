//! Periodic climatology keys derived from timestamps.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike};
use era5_common::{day_of_year, hour_of_year, Season};
use grid_store::{CoordValues, Grid};
use serde::{Deserialize, Serialize};

use crate::error::{ClimatologyError, Result};

/// Periodic attribute of a timestamp used to group observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ClimatologyKey {
    /// `hour + 24 * (dayofyear - 1)`, 0..=8783
    HourOfYear,
    /// 1..=366
    DayOfYear,
    Month,
    /// 1..=4 for DJF, MAM, JJA, SON
    Season,
    Year,
    /// Day of month
    Day,
    Hour,
    /// Monday = 0
    DayOfWeek,
    /// ISO week number
    WeekOfYear,
    Quarter,
}

impl ClimatologyKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClimatologyKey::HourOfYear => "hourofyear",
            ClimatologyKey::DayOfYear => "dayofyear",
            ClimatologyKey::Month => "month",
            ClimatologyKey::Season => "season",
            ClimatologyKey::Year => "year",
            ClimatologyKey::Day => "day",
            ClimatologyKey::Hour => "hour",
            ClimatologyKey::DayOfWeek => "dayofweek",
            ClimatologyKey::WeekOfYear => "weekofyear",
            ClimatologyKey::Quarter => "quarter",
        }
    }

    /// Key value of one timestamp.
    pub fn value(&self, t: &NaiveDateTime) -> i64 {
        let v = match self {
            ClimatologyKey::HourOfYear => hour_of_year(t),
            ClimatologyKey::DayOfYear => day_of_year(t),
            ClimatologyKey::Month => t.month(),
            ClimatologyKey::Season => Season::from_month(t.month()).map_or(0, |s| s.index()),
            ClimatologyKey::Year => return t.year() as i64,
            ClimatologyKey::Day => t.day(),
            ClimatologyKey::Hour => t.hour(),
            ClimatologyKey::DayOfWeek => t.weekday().num_days_from_monday(),
            ClimatologyKey::WeekOfYear => t.iso_week().week(),
            ClimatologyKey::Quarter => (t.month() - 1) / 3 + 1,
        };
        v as i64
    }
}

impl fmt::Display for ClimatologyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClimatologyKey {
    type Err = ClimatologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hourofyear" => Ok(ClimatologyKey::HourOfYear),
            "dayofyear" => Ok(ClimatologyKey::DayOfYear),
            "month" => Ok(ClimatologyKey::Month),
            "season" => Ok(ClimatologyKey::Season),
            "year" => Ok(ClimatologyKey::Year),
            "day" => Ok(ClimatologyKey::Day),
            "hour" => Ok(ClimatologyKey::Hour),
            "dayofweek" | "weekday" => Ok(ClimatologyKey::DayOfWeek),
            "weekofyear" | "week" => Ok(ClimatologyKey::WeekOfYear),
            "quarter" => Ok(ClimatologyKey::Quarter),
            other => Err(ClimatologyError::UnsupportedKey(other.to_string())),
        }
    }
}

impl TryFrom<String> for ClimatologyKey {
    type Error = ClimatologyError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ClimatologyKey> for String {
    fn from(key: ClimatologyKey) -> Self {
        key.as_str().to_string()
    }
}

/// Key value of every timestamp of the grid.
pub fn periodic_key(grid: &Grid, key: ClimatologyKey) -> Result<Vec<i64>> {
    Ok(grid.times()?.iter().map(|t| key.value(t)).collect())
}

/// Attach the key as an auxiliary coordinate along `time` and return it.
pub fn assign_key(grid: &mut Grid, key: ClimatologyKey) -> Result<Vec<i64>> {
    let values = periodic_key(grid, key)?;
    grid.assign_aux(key.as_str(), "time", CoordValues::Int(values.clone()))?;
    Ok(values)
}

/// Sorted distinct key values.
pub fn expected_groups(values: &[i64]) -> Vec<i64> {
    let mut groups = values.to_vec();
    groups.sort_unstable();
    groups.dedup();
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_key_values() {
        let t = at(2001, 2, 3, 18);
        assert_eq!(ClimatologyKey::HourOfYear.value(&t), 18 + 24 * 33);
        assert_eq!(ClimatologyKey::DayOfYear.value(&t), 34);
        assert_eq!(ClimatologyKey::Month.value(&t), 2);
        assert_eq!(ClimatologyKey::Season.value(&t), 1);
        assert_eq!(ClimatologyKey::Season.value(&at(2001, 7, 1, 0)), 3);
        assert_eq!(ClimatologyKey::Quarter.value(&t), 1);
        assert_eq!(ClimatologyKey::DayOfWeek.value(&t), 5);
        assert_eq!(ClimatologyKey::Year.value(&t), 2001);
    }

    #[test]
    fn test_parse_key() {
        assert_eq!("DayOfYear".parse::<ClimatologyKey>().unwrap(), ClimatologyKey::DayOfYear);
        assert!(matches!(
            "fortnight".parse::<ClimatologyKey>(),
            Err(ClimatologyError::UnsupportedKey(_))
        ));
    }

    #[test]
    fn test_expected_groups() {
        assert_eq!(expected_groups(&[3, 1, 3, 2, 1]), vec![1, 2, 3]);
    }
}
