//! Bounding box types and operations.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Slack added to the upper bounds of a selection so that grid points lying
/// exactly on the requested edge survive floating-point rounding.
pub const SELECTION_EPSILON: f64 = 0.1;

/// A geographic bounding box in degrees.
///
/// Field order follows the `minlon, maxlon, minlat, maxlat` convention used by
/// the data access layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from its longitude and latitude bounds.
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    /// Width of the bounding box in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height of the bounding box in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Whether a longitude falls inside the selection, upper bound widened by
    /// [`SELECTION_EPSILON`].
    pub fn selects_lon(&self, lon: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon + SELECTION_EPSILON
    }

    /// Whether a latitude falls inside the selection, upper bound widened by
    /// [`SELECTION_EPSILON`].
    pub fn selects_lat(&self, lat: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat + SELECTION_EPSILON
    }

    /// Strict containment check (no epsilon).
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

impl FromStr for BoundingBox {
    type Err = BboxParseError;

    /// Parse `"minlon,maxlon,minlat,maxlat"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let parse = |p: &str| {
            p.parse::<f64>()
                .map_err(|_| BboxParseError::InvalidNumber(p.to_string()))
        };

        let bbox = Self::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?, parse(parts[3])?);
        if bbox.min_lon > bbox.max_lon || bbox.min_lat > bbox.max_lat {
            return Err(BboxParseError::Inverted(s.to_string()));
        }
        Ok(bbox)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid bounding box format: {0}. Expected 'minlon,maxlon,minlat,maxlat'")]
    InvalidFormat(String),

    #[error("Invalid number in bounding box: {0}")]
    InvalidNumber(String),

    #[error("Bounding box has min > max: {0}")]
    Inverted(String),
}
