//! Vertical level families used in the on-disk layout.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The vertical coordinate family of a dataset, second path component below
/// the dataset root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelType {
    /// Pressure levels (hPa)
    #[serde(rename = "plev")]
    Plev,
    /// Isentropic levels (K)
    #[serde(rename = "thetalev")]
    Thetalev,
    /// The 2 PVU dynamical tropopause
    #[serde(rename = "2PVU")]
    Pv2,
    /// Single-level surface fields
    #[serde(rename = "surf")]
    Surf,
}

impl LevelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LevelType::Plev => "plev",
            LevelType::Thetalev => "thetalev",
            LevelType::Pv2 => "2PVU",
            LevelType::Surf => "surf",
        }
    }

    /// Whether grids of this family carry a meaningful `lev` dimension.
    pub fn has_levels(&self) -> bool {
        matches!(self, LevelType::Plev | LevelType::Thetalev)
    }
}

impl fmt::Display for LevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LevelType {
    type Err = LevelTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plev" => Ok(LevelType::Plev),
            "thetalev" => Ok(LevelType::Thetalev),
            "2PVU" | "2pvu" => Ok(LevelType::Pv2),
            "surf" => Ok(LevelType::Surf),
            other => Err(LevelTypeParseError(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown level type '{0}', expected one of plev, thetalev, 2PVU, surf")]
pub struct LevelTypeParseError(pub String);
