//! Deterministic artifact paths.
//!
//! ```text
//! root/{dataset}/{level_type}/{var}/{resolution}         raw files
//!     └── {clim_type}_{encode(clim_smoothing)}           clim.{ext}
//!         └── {encode(smoothing)}                        anomaly files
//! ```

use std::path::{Path, PathBuf};

use era5_common::LevelType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClimatologyError, Result};
use crate::key::ClimatologyKey;
use crate::smoothing::{SmoothingSpec, SmoothingStep};

/// Climatology segment used when writing without a climatology type.
const NO_CLIMATOLOGY: &str = "none";

/// Encode a smoothing specification as a path segment.
///
/// Each kernel step becomes `dim ++ kernel ++ window` (`dayofyear` shortened
/// to `doy`), a true detrend flag becomes `detrended`, and the tokens are
/// joined with `_` in specification order.
pub fn encode(spec: &SmoothingSpec) -> String {
    let tokens: Vec<String> = spec
        .steps()
        .iter()
        .filter_map(|step| match step {
            SmoothingStep::Detrend(true) => Some("detrended".to_string()),
            SmoothingStep::Detrend(false) => None,
            SmoothingStep::Kernel { dim, kernel, window } => {
                let dim = if dim == "dayofyear" { "doy" } else { dim.as_str() };
                Some(format!("{}{}{}", dim, kernel.token(), window))
            }
        })
        .collect();
    tokens.join("_")
}

/// A raw dataset: one variable of one dataset at one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetId {
    pub dataset: String,
    pub level_type: LevelType,
    pub var: String,
    pub resolution: String,
}

impl DatasetId {
    pub fn new(
        dataset: impl Into<String>,
        level_type: LevelType,
        var: impl Into<String>,
        resolution: impl Into<String>,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            level_type,
            var: var.into(),
            resolution: resolution.into(),
        }
    }

    /// Directory of the raw files below `root`.
    pub fn raw_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.dataset)
            .join(self.level_type.as_str())
            .join(&self.var)
            .join(&self.resolution)
    }
}

/// Processing applied on top of the raw data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessingSpec {
    #[serde(default)]
    pub clim_type: Option<ClimatologyKey>,
    #[serde(default)]
    pub clim_smoothing: SmoothingSpec,
    #[serde(default)]
    pub smoothing: SmoothingSpec,
}

impl ProcessingSpec {
    pub fn new(
        clim_type: Option<ClimatologyKey>,
        clim_smoothing: SmoothingSpec,
        smoothing: SmoothingSpec,
    ) -> Self {
        Self {
            clim_type,
            clim_smoothing,
            smoothing,
        }
    }

    /// Reject climatology smoothing without a climatology.
    pub fn validate(&self) -> Result<()> {
        if self.clim_type.is_none() && !self.clim_smoothing.is_empty() {
            return Err(ClimatologyError::config(
                "clim_smoothing requires a clim_type",
            ));
        }
        Ok(())
    }
}

/// The three directory levels of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub raw: PathBuf,
    pub clim: PathBuf,
    pub anom: PathBuf,
}

/// Builds artifact paths below a data root.
#[derive(Debug, Clone)]
pub struct PathCodec {
    root: PathBuf,
}

impl PathCodec {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pure path computation, no filesystem access.
    ///
    /// `clim_segment_when_absent` is the climatology segment used when no
    /// climatology type is requested.
    fn paths(
        &self,
        id: &DatasetId,
        spec: &ProcessingSpec,
        clim_segment_when_absent: &str,
    ) -> Result<ArtifactPaths> {
        spec.validate()?;

        let raw = id.raw_dir(&self.root);
        let clim_name = spec
            .clim_type
            .map(|k| k.as_str())
            .unwrap_or(clim_segment_when_absent);
        let clim_code = encode(&spec.clim_smoothing);
        let clim_segment = match (clim_name.is_empty(), clim_code.is_empty()) {
            (_, true) => clim_name.to_string(),
            (true, false) => clim_code,
            (false, false) => format!("{}_{}", clim_name, clim_code),
        };

        let clim = join_segment(&raw, &clim_segment);
        let anom = join_segment(&clim, &encode(&spec.smoothing));
        Ok(ArtifactPaths { raw, clim, anom })
    }

    /// Directory to read data for `spec` from.
    ///
    /// Falls back to the climatology directory (the raw directory when there
    /// is no climatology) if the anomaly directory does not exist and no
    /// climatology type was requested; callers then smooth on the fly.
    pub fn resolve_read(&self, id: &DatasetId, spec: &ProcessingSpec) -> Result<PathBuf> {
        let paths = self.paths(id, spec, "")?;
        if paths.anom.is_dir() {
            return Ok(paths.anom);
        }
        if spec.clim_type.is_some() {
            return Err(ClimatologyError::NotComputed(paths.anom));
        }
        debug!(
            missing = %paths.anom.display(),
            fallback = %paths.clim.display(),
            "Smoothed directory absent, falling back"
        );
        Ok(paths.clim)
    }

    /// Paths for computing `spec`, creating every directory up to the
    /// anomaly directory.
    pub fn resolve_write(&self, id: &DatasetId, spec: &ProcessingSpec) -> Result<ArtifactPaths> {
        let paths = self.paths(id, spec, NO_CLIMATOLOGY)?;
        std::fs::create_dir_all(&paths.anom)?;
        Ok(paths)
    }
}

fn join_segment(base: &Path, segment: &str) -> PathBuf {
    if segment.is_empty() {
        base.to_path_buf()
    } else {
        base.join(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smoothing::{Kernel, WindowSize};

    fn id() -> DatasetId {
        DatasetId::new("ERA5", LevelType::Plev, "u", "6H")
    }

    #[test]
    fn test_encode() {
        let spec = SmoothingSpec::new()
            .kernel("dayofyear", Kernel::WindowSmooth, WindowSize::Int(15))
            .detrended(true)
            .kernel("lon+lat", Kernel::LowpassSmooth, WindowSize::Float(0.1));
        assert_eq!(encode(&spec), "doywin15_detrended_lon+latfft0.10");
        assert_eq!(encode(&SmoothingSpec::new().detrended(false)), "");
        assert_eq!(encode(&SmoothingSpec::new()), "");
    }

    #[test]
    fn test_write_paths() {
        let dir = tempfile::tempdir().unwrap();
        let codec = PathCodec::new(dir.path());
        let spec = ProcessingSpec::new(
            Some(ClimatologyKey::DayOfYear),
            "dayofyear:win:15".parse().unwrap(),
            SmoothingSpec::new(),
        );
        let paths = codec.resolve_write(&id(), &spec).unwrap();
        assert_eq!(paths.raw, dir.path().join("ERA5/plev/u/6H"));
        assert_eq!(paths.clim, paths.raw.join("dayofyear_doywin15"));
        assert_eq!(paths.anom, paths.clim);
        assert!(paths.anom.is_dir());

        let again = codec.resolve_write(&id(), &spec).unwrap();
        assert_eq!(again, paths);
    }

    #[test]
    fn test_write_without_climatology_uses_none() {
        let dir = tempfile::tempdir().unwrap();
        let codec = PathCodec::new(dir.path());
        let spec = ProcessingSpec::new(None, SmoothingSpec::new(), "lon:win:5".parse().unwrap());
        let paths = codec.resolve_write(&id(), &spec).unwrap();
        assert_eq!(paths.anom, paths.raw.join("none").join("lonwin5"));
    }

    #[test]
    fn test_read_not_computed() {
        let dir = tempfile::tempdir().unwrap();
        let codec = PathCodec::new(dir.path());
        let spec = ProcessingSpec::new(Some(ClimatologyKey::Month), SmoothingSpec::new(), SmoothingSpec::new());
        assert!(matches!(
            codec.resolve_read(&id(), &spec),
            Err(ClimatologyError::NotComputed(_))
        ));
    }

    #[test]
    fn test_read_falls_back_without_climatology() {
        let dir = tempfile::tempdir().unwrap();
        let codec = PathCodec::new(dir.path());
        let spec = ProcessingSpec::new(None, SmoothingSpec::new(), "lon:win:5".parse().unwrap());
        let path = codec.resolve_read(&id(), &spec).unwrap();
        assert_eq!(path, dir.path().join("ERA5/plev/u/6H"));
    }
}
