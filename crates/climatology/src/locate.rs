//! Which artifact files make up a dataset directory.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime};
use era5_common::{Period, SeasonSelector};
use tracing::debug;

use crate::config::DataConfig;
use crate::error::{ClimatologyError, Result};

/// How a directory partitions its data into files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `full.{ext}`
    SingleFile,
    /// `{year}.{ext}`
    Yearly,
    /// `{year}{month:02}.{ext}`
    Monthly,
}

/// Finds artifact files for a year range and artifact extension.
#[derive(Debug, Clone)]
pub struct FileLocator {
    years: RangeInclusive<i32>,
    extension: String,
}

impl FileLocator {
    pub fn new(years: RangeInclusive<i32>, extension: impl Into<String>) -> Self {
        Self {
            years,
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &DataConfig) -> Self {
        Self::new(config.years(), config.extension.clone())
    }

    pub fn years(&self) -> &RangeInclusive<i32> {
        &self.years
    }

    fn file(&self, dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{}.{}", stem, self.extension))
    }

    /// Probe `dir` for a whole-range file, then yearly files, then monthly
    /// files, in that order.
    pub fn detect_layout(&self, dir: &Path) -> Result<Layout> {
        if self.file(dir, "full").exists() {
            return Ok(Layout::SingleFile);
        }
        if self
            .years
            .clone()
            .any(|year| self.file(dir, &year.to_string()).exists())
        {
            return Ok(Layout::Yearly);
        }
        if self
            .years
            .clone()
            .any(|year| self.file(dir, &format!("{}01", year)).exists())
        {
            return Ok(Layout::Monthly);
        }
        Err(ClimatologyError::LayoutUnknown(dir.to_path_buf()))
    }

    /// Existing files covering `period` (and `season`, for monthly layouts).
    ///
    /// Monthly files are enumerated month by month, all years of a month
    /// together. Missing files are skipped.
    pub fn files_for(
        &self,
        layout: Layout,
        dir: &Path,
        period: &Period,
        season: Option<&SeasonSelector>,
    ) -> Vec<PathBuf> {
        let years = period.years(&self.years);
        let candidates: Vec<PathBuf> = match layout {
            Layout::SingleFile => vec![self.file(dir, "full")],
            Layout::Yearly => years
                .iter()
                .map(|year| self.file(dir, &year.to_string()))
                .collect(),
            Layout::Monthly => {
                let months = season.map_or_else(|| (1..=12).collect(), |s| s.months());
                months
                    .iter()
                    .flat_map(|month| {
                        years
                            .iter()
                            .map(move |year| self.file(dir, &format!("{}{:02}", year, month)))
                    })
                    .collect()
            }
        };

        let total = candidates.len();
        let files: Vec<PathBuf> = candidates.into_iter().filter(|p| p.exists()).collect();
        debug!(
            dir = %dir.display(),
            layout = ?layout,
            found = files.len(),
            skipped = total - files.len(),
            "Enumerated files"
        );
        files
    }
}

/// Which of `times` fall inside the artifact file `file_name`
/// (`full.*`, `YYYY.*` or `YYYYMM.*`).
pub fn time_mask(times: &[NaiveDateTime], file_name: &str) -> Result<Vec<bool>> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    if stem == "full" {
        return Ok(vec![true; times.len()]);
    }

    let bad = || ClimatologyError::config(format!("cannot derive a time range from '{}'", file_name));
    if !stem.chars().all(|c| c.is_ascii_digit()) {
        return Err(bad());
    }

    match stem.len() {
        4 => {
            let year: i32 = stem.parse().map_err(|_| bad())?;
            Ok(times.iter().map(|t| t.year() == year).collect())
        }
        6 => {
            let year: i32 = stem[..4].parse().map_err(|_| bad())?;
            let month: u32 = stem[4..].parse().map_err(|_| bad())?;
            Ok(times
                .iter()
                .map(|t| t.year() == year && t.month() == month)
                .collect())
        }
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn touch(dir: &Path, name: &str) {
        std::fs::create_dir_all(dir.join(name)).unwrap();
    }

    #[test]
    fn test_detect_layout() {
        let dir = tempfile::tempdir().unwrap();
        let locator = FileLocator::new(2000..=2002, "zarr");
        assert!(matches!(
            locator.detect_layout(dir.path()),
            Err(ClimatologyError::LayoutUnknown(_))
        ));

        touch(dir.path(), "200101.zarr");
        assert_eq!(locator.detect_layout(dir.path()).unwrap(), Layout::Monthly);
        touch(dir.path(), "2002.zarr");
        assert_eq!(locator.detect_layout(dir.path()).unwrap(), Layout::Yearly);
    }

    #[test]
    fn test_monthly_files_month_major() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["200012.zarr", "200112.zarr", "200101.zarr", "200006.zarr"] {
            touch(dir.path(), name);
        }
        let locator = FileLocator::new(2000..=2001, "zarr");
        let djf: SeasonSelector = "DJF".parse().unwrap();
        let files = locator.files_for(Layout::Monthly, dir.path(), &Period::All, Some(&djf));
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["200012.zarr", "200112.zarr", "200101.zarr"]);
    }

    #[test]
    fn test_yearly_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "2001.zarr");
        let locator = FileLocator::new(1990..=2010, "zarr");
        let files = locator.files_for(Layout::Yearly, dir.path(), &Period::Range(2000, 2002), None);
        assert_eq!(files, vec![dir.path().join("2001.zarr")]);
    }

    #[test]
    fn test_time_mask() {
        let times: Vec<NaiveDateTime> = [(2000, 12, 31), (2001, 1, 1), (2001, 2, 1)]
            .iter()
            .map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
            .collect();
        assert_eq!(time_mask(&times, "full.zarr").unwrap(), vec![true, true, true]);
        assert_eq!(time_mask(&times, "2001.zarr").unwrap(), vec![false, true, true]);
        assert_eq!(time_mask(&times, "200102.zarr").unwrap(), vec![false, false, true]);
        assert!(time_mask(&times, "clim.zarr").is_err());
    }
}
