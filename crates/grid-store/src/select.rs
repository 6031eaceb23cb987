//! Selection and normalisation helpers applied after loading a grid.

use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::debug;

use era5_common::{BoundingBox, SeasonSelector};

use crate::error::{GridError, Result};
use crate::grid::{CoordValues, Grid};

const LEVEL_TOLERANCE: f64 = 1e-6;

/// Rename `longitude`, `latitude` and `level` to `lon`, `lat` and `lev`.
pub fn canonicalize_dims(grid: &mut Grid) -> Result<()> {
    for (old, new) in [("longitude", "lon"), ("latitude", "lat"), ("level", "lev")] {
        if grid.rename_dim(old, new)? {
            debug!(from = old, to = new, "Renamed dimension");
        }
    }
    Ok(())
}

/// Reduce an `expver` dimension to `expver = 1` and drop it.
pub fn drop_expver(grid: Grid) -> Result<Grid> {
    if !grid.has_dim("expver") {
        return Ok(grid);
    }

    let coord = grid.coord("expver")?;
    let index = coord
        .to_numeric()
        .and_then(|values| values.iter().position(|&v| v == 1.0))
        .or_else(|| match coord {
            CoordValues::Label(labels) => labels.iter().position(|l| l.trim() == "1" || l == "0001"),
            _ => None,
        })
        .ok_or_else(|| GridError::invalid_metadata("expver dimension has no entry 1"))?;

    grid.isel("expver", &[index])?.squeeze_dim("expver")
}

/// Reverse the latitude axis if it is stored north to south.
pub fn ensure_lat_ascending(grid: Grid) -> Result<Grid> {
    if !grid.has_dim("lat") {
        return Ok(grid);
    }
    let lats = float_coord(&grid, "lat")?;
    if lats.len() > 1 && lats[0] > lats[lats.len() - 1] {
        return grid.reverse("lat");
    }
    Ok(grid)
}

/// Restrict to a bounding box, upper bounds widened by the selection epsilon.
pub fn select_bbox(grid: &Grid, bbox: &BoundingBox) -> Result<Grid> {
    let mut out = grid.clone();
    if out.has_dim("lon") {
        let lons = float_coord(&out, "lon")?;
        out = out.filter("lon", |i| bbox.selects_lon(lons[i]))?;
    }
    if out.has_dim("lat") {
        let lats = float_coord(&out, "lat")?;
        out = out.filter("lat", |i| bbox.selects_lat(lats[i]))?;
    }
    Ok(out)
}

/// Keep timestamps whose year is listed.
pub fn select_years(grid: &Grid, years: &[i32]) -> Result<Grid> {
    grid.select_times(|t| years.contains(&t.year()))
}

/// Keep timestamps whose month belongs to the season.
pub fn select_season(grid: &Grid, season: &SeasonSelector) -> Result<Grid> {
    grid.select_times(|t| season.contains_month(t.month()))
}

/// One requested vertical level: a single level or a band averaged into a
/// pseudo-level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LevelSpec {
    Single(f64),
    Band(Vec<f64>),
}

impl LevelSpec {
    fn sort_key(&self) -> f64 {
        match self {
            LevelSpec::Single(v) => *v,
            LevelSpec::Band(vs) => vs.first().copied().unwrap_or(f64::NAN),
        }
    }

    /// Label of the level in the output coordinate.
    pub fn label(&self) -> String {
        match self {
            LevelSpec::Single(v) => format!("{}", v),
            LevelSpec::Band(vs) => match (vs.first(), vs.last()) {
                (Some(first), Some(last)) => format!("{}-{}-{}", first, vs.len(), last),
                _ => String::from("empty"),
            },
        }
    }
}

impl FromStr for LevelSpec {
    type Err = GridError;

    /// `"500"` or a band `"200/250/300"`.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || GridError::ConfigError(format!("invalid level '{}'", s));
        let values: Vec<f64> = s
            .split('/')
            .map(|v| v.trim().parse::<f64>().map_err(|_| bad()))
            .collect::<Result<_>>()?;
        match values.as_slice() {
            [single] if !s.contains('/') => Ok(LevelSpec::Single(*single)),
            [] => Err(bad()),
            _ => Ok(LevelSpec::Band(values)),
        }
    }
}

/// Which vertical levels to keep.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LevelSelection {
    #[default]
    All,
    Levels(Vec<LevelSpec>),
}

impl FromStr for LevelSelection {
    type Err = GridError;

    /// `"all"` or comma-separated [`LevelSpec`]s, e.g. `"250,200/250/300"`.
    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(LevelSelection::All);
        }
        let specs = s
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<LevelSpec>>>()?;
        Ok(LevelSelection::Levels(specs))
    }
}

impl fmt::Display for LevelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelSelection::All => f.write_str("all"),
            LevelSelection::Levels(specs) => {
                let labels: Vec<String> = specs.iter().map(LevelSpec::label).collect();
                f.write_str(&labels.join(","))
            }
        }
    }
}

/// Extract vertical levels.
///
/// Levels are sorted by (first) value. When only single levels are requested
/// they are selected directly, and a lone level removes the `lev` dimension.
/// Any band switches the output `lev` coordinate to labels: single levels keep
/// their value as label, bands are averaged and labelled
/// `"{first}-{count}-{last}"`.
pub fn extract_levels(grid: &Grid, selection: &LevelSelection) -> Result<Grid> {
    let specs = match selection {
        LevelSelection::All => return Ok(grid.clone()),
        LevelSelection::Levels(specs) => specs,
    };
    if specs.is_empty() {
        return Err(GridError::Empty("no levels requested".to_string()));
    }

    let mut specs = specs.clone();
    specs.sort_by(|a, b| a.sort_key().total_cmp(&b.sort_key()));

    let levels = float_coord(grid, "lev")?;
    let find = |value: f64| {
        levels
            .iter()
            .position(|&l| (l - value).abs() < LEVEL_TOLERANCE)
            .ok_or(GridError::LevelNotFound(value))
    };

    let all_single = specs.iter().all(|s| matches!(s, LevelSpec::Single(_)));
    if all_single {
        let indices = specs
            .iter()
            .map(|s| find(s.sort_key()))
            .collect::<Result<Vec<_>>>()?;
        let out = grid.isel("lev", &indices)?;
        return if indices.len() == 1 {
            out.squeeze_dim("lev")
        } else {
            Ok(out)
        };
    }

    let ax = grid.axis_of("lev")?;
    let mut slabs = Vec::with_capacity(specs.len());
    let mut labels = Vec::with_capacity(specs.len());
    for spec in &specs {
        let indices = match spec {
            LevelSpec::Single(v) => vec![find(*v)?],
            LevelSpec::Band(vs) => vs.iter().map(|&v| find(v)).collect::<Result<Vec<_>>>()?,
        };
        let band = grid.data().select(Axis(ax), &indices);
        let mean = band
            .mean_axis(Axis(ax))
            .ok_or_else(|| GridError::Empty(format!("level band {}", spec.label())))?;
        slabs.push(mean.insert_axis(Axis(ax)));
        labels.push(spec.label());
    }

    let views: Vec<_> = slabs.iter().map(|s| s.view()).collect();
    let data = ndarray::concatenate(Axis(ax), &views)?;

    let mut dims = grid.dims().to_vec();
    dims[ax].coord = CoordValues::Label(labels);
    let mut out = Grid::new(grid.name(), dims, data)?.with_attrs(grid.attrs().clone());
    out.restore_aux(
        grid.aux_coords()
            .iter()
            .filter(|a| a.dim != "lev")
            .cloned()
            .collect(),
    )?;
    Ok(out)
}

/// Numeric values of a coordinate.
pub fn float_coord(grid: &Grid, dim: &str) -> Result<Vec<f64>> {
    grid.coord(dim)?
        .to_numeric()
        .ok_or_else(|| GridError::CoordinateKind {
            dim: dim.to_string(),
            expected: "numeric",
        })
}

/// Longitudes cover the whole circle: the first is 0 and the last lies within
/// one grid step of 360.
pub fn is_global_lon(lons: &[f64]) -> bool {
    if lons.len() < 2 {
        return false;
    }
    let step = lons[1] - lons[0];
    let last = lons[lons.len() - 1];
    lons[0] == 0.0 && last <= 360.0 && last >= 360.0 - step
}
