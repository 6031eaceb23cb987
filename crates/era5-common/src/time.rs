//! Calendar helpers and time selectors for reanalysis data.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Day of year, 1-based (366 on 31 December of leap years).
pub fn day_of_year(dt: &NaiveDateTime) -> u32 {
    dt.ordinal()
}

/// Hour of year, `hour + 24 * (day_of_year - 1)`, in `0..=8783`.
pub fn hour_of_year(dt: &NaiveDateTime) -> u32 {
    dt.hour() + 24 * (dt.ordinal() - 1)
}

/// The four meteorological seasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Season {
    Djf,
    Mam,
    Jja,
    Son,
}

impl Season {
    /// Months belonging to this season.
    pub fn months(&self) -> [u32; 3] {
        match self {
            Season::Djf => [12, 1, 2],
            Season::Mam => [3, 4, 5],
            Season::Jja => [6, 7, 8],
            Season::Son => [9, 10, 11],
        }
    }

    /// Season containing a given month (1-12).
    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            12 | 1 | 2 => Some(Season::Djf),
            3..=5 => Some(Season::Mam),
            6..=8 => Some(Season::Jja),
            9..=11 => Some(Season::Son),
            _ => None,
        }
    }

    /// Position of the season in DJF, MAM, JJA, SON order, starting at 1.
    pub fn index(&self) -> u32 {
        match self {
            Season::Djf => 1,
            Season::Mam => 2,
            Season::Jja => 3,
            Season::Son => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Djf => "DJF",
            Season::Mam => "MAM",
            Season::Jja => "JJA",
            Season::Son => "SON",
        }
    }
}

impl FromStr for Season {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DJF" => Ok(Season::Djf),
            "MAM" => Ok(Season::Mam),
            "JJA" => Ok(Season::Jja),
            "SON" => Ok(Season::Son),
            other => Err(SelectorParseError::InvalidSeason(other.to_string())),
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Season filter: a named season or an explicit list of months.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeasonSelector {
    Named(Season),
    Months(Vec<u32>),
}

impl SeasonSelector {
    /// Months selected, in the order they are enumerated.
    pub fn months(&self) -> Vec<u32> {
        match self {
            SeasonSelector::Named(season) => season.months().to_vec(),
            SeasonSelector::Months(months) => months.clone(),
        }
    }

    pub fn contains_month(&self, month: u32) -> bool {
        match self {
            SeasonSelector::Named(season) => season.months().contains(&month),
            SeasonSelector::Months(months) => months.contains(&month),
        }
    }
}

impl FromStr for SeasonSelector {
    type Err = SelectorParseError;

    /// Parse `"DJF"` style names or a comma-separated month list `"6,7,8"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(season) = s.parse::<Season>() {
            return Ok(SeasonSelector::Named(season));
        }

        let months: Result<Vec<u32>, _> = s
            .split(',')
            .map(|m| {
                m.trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|m| (1..=12).contains(m))
                    .ok_or_else(|| SelectorParseError::InvalidSeason(s.to_string()))
            })
            .collect();
        Ok(SeasonSelector::Months(months?))
    }
}

/// Selection of years to load.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Period {
    /// Every year of the configured range
    #[default]
    All,
    Year(i32),
    Years(Vec<i32>),
    /// Inclusive `(start, end)` pair
    Range(i32, i32),
}

impl Period {
    /// Expand to the explicit list of years.
    pub fn years(&self, all_years: &RangeInclusive<i32>) -> Vec<i32> {
        match self {
            Period::All => all_years.clone().collect(),
            Period::Year(year) => vec![*year],
            Period::Years(years) => years.clone(),
            Period::Range(start, end) => (*start..=*end).collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Period::All)
    }
}

impl FromStr for Period {
    type Err = SelectorParseError;

    /// Parse `"all"`, `"1990"`, `"1990-2000"` or `"1990,1995,2003"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || SelectorParseError::InvalidPeriod(s.to_string());

        if s.eq_ignore_ascii_case("all") {
            return Ok(Period::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            let start: i32 = start.trim().parse().map_err(|_| bad())?;
            let end: i32 = end.trim().parse().map_err(|_| bad())?;
            if start > end {
                return Err(bad());
            }
            return Ok(Period::Range(start, end));
        }

        if s.contains(',') {
            let years: Result<Vec<i32>, _> =
                s.split(',').map(|y| y.trim().parse::<i32>().map_err(|_| bad())).collect();
            return Ok(Period::Years(years?));
        }

        s.parse().map(Period::Year).map_err(|_| bad())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectorParseError {
    #[error("Invalid season specifier: {0} (expected DJF, MAM, JJA, SON or a month list)")]
    InvalidSeason(String),

    #[error("Invalid period specifier: {0}")]
    InvalidPeriod(String),
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
    fn test_hour_of_year() {
        assert_eq!(hour_of_year(&at(2001, 1, 1, 0)), 0);
        assert_eq!(hour_of_year(&at(2001, 1, 2, 6)), 30);
        assert_eq!(hour_of_year(&at(2000, 12, 31, 23)), 8783);
        assert_eq!(day_of_year(&at(2000, 12, 31, 0)), 366);
    }

    #[test]
    fn test_season_months() {
        assert_eq!(Season::Djf.months(), [12, 1, 2]);
        assert_eq!(Season::from_month(1), Some(Season::Djf));
        assert_eq!(Season::from_month(13), None);
        assert!("XYZ".parse::<Season>().is_err());
    }

    #[test]
    fn test_parse_season_selector() {
        assert_eq!(
            "JJA".parse::<SeasonSelector>().unwrap(),
            SeasonSelector::Named(Season::Jja)
        );
        assert_eq!(
            "1, 2".parse::<SeasonSelector>().unwrap(),
            SeasonSelector::Months(vec![1, 2])
        );
        assert!("0,13".parse::<SeasonSelector>().is_err());
        assert!("summer".parse::<SeasonSelector>().is_err());
    }

    #[test]
    fn test_parse_period() {
        assert_eq!("all".parse::<Period>().unwrap(), Period::All);
        assert_eq!("1990".parse::<Period>().unwrap(), Period::Year(1990));
        assert_eq!("1990-1992".parse::<Period>().unwrap(), Period::Range(1990, 1992));
        assert_eq!(
            "1990,1995".parse::<Period>().unwrap(),
            Period::Years(vec![1990, 1995])
        );
        assert!("1995-1990".parse::<Period>().is_err());
    }

    #[test]
    fn test_period_years() {
        let all = 1959..=1961;
        assert_eq!(Period::All.years(&all), vec![1959, 1960, 1961]);
        assert_eq!(Period::Range(2000, 2002).years(&all), vec![2000, 2001, 2002]);
        assert_eq!(Period::Year(1970).years(&all), vec![1970]);
    }
}
