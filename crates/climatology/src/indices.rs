//! Daily teleconnection indices stored as `year,month,day,value` CSV.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use grid_store::{CoordValues, Dimension, Grid};
use ndarray::{Array, IxDyn};
use tracing::debug;

use crate::error::{ClimatologyError, Result};

/// Location of the daily NAO index below the data root.
pub fn nao_path(root: &Path) -> PathBuf {
    root.join("ERA5").join("daily_nao.csv")
}

/// A daily index time series, sorted by time.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyIndex {
    name: String,
    times: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl DailyIndex {
    pub fn read(path: &Path, name: impl Into<String>) -> Result<Self> {
        let rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let index = Self::from_csv(rdr, name)?;
        debug!(path = %path.display(), days = index.len(), "Read daily index");
        Ok(index)
    }

    /// The daily NAO index stored at [`nao_path`].
    pub fn nao(root: &Path) -> Result<Self> {
        Self::read(&nao_path(root), "nao")
    }

    pub fn from_reader<R: Read>(reader: R, name: impl Into<String>) -> Result<Self> {
        let rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        Self::from_csv(rdr, name)
    }

    fn from_csv<R: Read>(mut rdr: csv::Reader<R>, name: impl Into<String>) -> Result<Self> {
        let mut rows = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            rows.push(parse_record(&record?, line + 2)?);
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        let (times, values) = rows.into_iter().unzip();
        Ok(Self {
            name: name.into(),
            times,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Linear interpolation in time; NaN outside the covered range.
    pub fn interp(&self, targets: &[NaiveDateTime]) -> Vec<f64> {
        targets.iter().map(|t| self.interp_one(t)).collect()
    }

    fn interp_one(&self, t: &NaiveDateTime) -> f64 {
        let upper = self.times.partition_point(|x| x < t);
        if upper < self.times.len() && self.times[upper] == *t {
            return self.values[upper];
        }
        if upper == 0 || upper == self.times.len() {
            return f64::NAN;
        }

        let (t0, t1) = (self.times[upper - 1], self.times[upper]);
        let span = (t1 - t0).num_seconds() as f64;
        let w = (*t - t0).num_seconds() as f64 / span;
        self.values[upper - 1] * (1.0 - w) + self.values[upper] * w
    }

    /// The index on the time axis of `like`, as a one-dimensional grid.
    pub fn interp_like(&self, like: &Grid) -> Result<Grid> {
        let times = like.times()?.to_vec();
        let values: Vec<f32> = self.interp(&times).into_iter().map(|v| v as f32).collect();
        let data = Array::from_shape_vec(IxDyn(&[times.len()]), values)
            .map_err(grid_store::GridError::from)?;
        Ok(Grid::new(
            self.name.clone(),
            vec![Dimension::new("time", CoordValues::Time(times))],
            data,
        )?)
    }
}

fn parse_record(record: &StringRecord, line: usize) -> Result<(NaiveDateTime, f64)> {
    let bad = |what: &str| ClimatologyError::Index(format!("line {}: invalid {}", line, what));
    let field = |i: usize| record.get(i).map(str::trim).ok_or_else(|| bad("record length"));

    let year: i32 = field(0)?.parse().map_err(|_| bad("year"))?;
    let month: u32 = field(1)?.parse().map_err(|_| bad("month"))?;
    let day: u32 = field(2)?.parse().map_err(|_| bad("day"))?;
    let value: f64 = field(3)?.parse().map_err(|_| bad("value"))?;

    let time = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| bad("date"))?;
    Ok((time, value))
}
