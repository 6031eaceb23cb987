//! Common types and utilities shared across the ERA5 anomaly workspace.

pub mod bbox;
pub mod level;
pub mod time;

pub use bbox::{BboxParseError, BoundingBox, SELECTION_EPSILON};
pub use level::{LevelType, LevelTypeParseError};
pub use time::{
    day_of_year, hour_of_year, Period, Season, SeasonSelector, SelectorParseError,
};
