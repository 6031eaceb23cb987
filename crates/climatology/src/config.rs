//! Runtime configuration: data location, year range and compute resources.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use grid_store::{GridStore, StoreConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ClimatologyError, Result};

/// Resources for parallel reductions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Worker threads in the reduction pool.
    pub n_workers: usize,

    /// Memory ceiling per worker, in bytes.
    pub memory_limit_bytes: u64,

    /// Upper bound on the number of time steps per reduction batch.
    pub time_batch: usize,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            n_workers: 4,
            memory_limit_bytes: 8 * GIB,
            time_batch: 500,
        }
    }
}

impl ComputeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ERA5_N_WORKERS") {
            if let Ok(n) = val.parse() {
                config.n_workers = n;
            }
        }

        if let Ok(val) = std::env::var("ERA5_MEMORY_LIMIT") {
            if let Some(bytes) = parse_memory(&val) {
                config.memory_limit_bytes = bytes;
            }
        }

        if let Ok(val) = std::env::var("ERA5_TIME_BATCH") {
            if let Ok(n) = val.parse() {
                config.time_batch = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.n_workers == 0 {
            return Err("n_workers must be > 0".to_string());
        }

        if self.memory_limit_bytes == 0 {
            return Err("memory_limit_bytes must be > 0".to_string());
        }

        if self.time_batch == 0 {
            return Err("time_batch must be > 0".to_string());
        }

        Ok(())
    }

    /// Build the bounded worker pool used by reductions.
    pub fn build_pool(&self) -> Result<rayon::ThreadPool> {
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_workers)
            .thread_name(|i| format!("era5-worker-{}", i))
            .build()?)
    }

    /// Number of time steps a worker may hold at once, given the size in
    /// bytes of one time step.
    ///
    /// Partial moments keep three `f64` accumulators per cell next to the
    /// `f32` input, so a step costs about seven times its input size.
    pub fn batch_len(&self, step_bytes: usize) -> usize {
        let per_step = (step_bytes as u64).saturating_mul(7).max(1);
        let fits = (self.memory_limit_bytes / per_step) as usize;
        fits.clamp(1, self.time_batch.max(1))
    }
}

/// Where the data lives and which years exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root of the `{dataset}/{level_type}/{var}/{resolution}` tree.
    pub root: PathBuf,

    pub first_year: i32,

    pub last_year: i32,

    /// Artifact file extension, without the dot.
    pub extension: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            first_year: 1940,
            last_year: 2022,
            extension: "zarr".to_string(),
        }
    }
}

impl DataConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ERA5_DATA_DIR") {
            config.root = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("ERA5_FIRST_YEAR") {
            if let Ok(year) = val.parse() {
                config.first_year = year;
            }
        }

        if let Ok(val) = std::env::var("ERA5_LAST_YEAR") {
            if let Ok(year) = val.parse() {
                config.last_year = year;
            }
        }

        if let Ok(val) = std::env::var("ERA5_ARTIFACT_EXT") {
            config.extension = val.trim_start_matches('.').to_string();
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.first_year > self.last_year {
            return Err(format!(
                "first_year ({}) must not exceed last_year ({})",
                self.first_year, self.last_year
            ));
        }

        if self.extension.is_empty() || self.extension.contains('/') {
            return Err(format!("invalid artifact extension '{}'", self.extension));
        }

        Ok(())
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.first_year..=self.last_year
    }

    /// File name of an artifact stem, e.g. `1990` → `1990.zarr`.
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension)
    }
}

/// Complete configuration passed to data access and the batch builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Era5Config {
    pub data: DataConfig,
    pub compute: ComputeConfig,
    pub store: StoreConfig,
}

impl Era5Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            data: DataConfig::from_env(),
            compute: ComputeConfig::from_env(),
            store: StoreConfig::from_env(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.data
            .validate()
            .and_then(|_| self.compute.validate())
            .and_then(|_| self.store.validate())
            .map_err(ClimatologyError::Config)
    }

    /// Reject a store whose artifact extension differs from the configured
    /// one. Artifacts written through it could not be located again.
    pub fn check_store(&self, store: &dyn GridStore) -> Result<()> {
        if store.extension() != self.data.extension {
            return Err(ClimatologyError::config(format!(
                "store writes '.{}' artifacts but the data configuration expects '.{}'",
                store.extension(),
                self.data.extension
            )));
        }
        Ok(())
    }
}

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;
const TIB: u64 = 1024 * GIB;

/// Parse a memory size such as `"8GiB"`, `"20GB"`, `"512MiB"` or `"1048576"`.
///
/// Binary suffixes (`KiB`, `MiB`, ...) are powers of 1024, decimal suffixes
/// (`KB`, `MB`, ...) powers of 1000. A bare number is a byte count.
pub fn parse_memory(s: &str) -> Option<u64> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: f64 = number.parse().ok()?;

    let multiplier = match unit.trim().to_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "m" | "mb" => 1_000_000,
        "g" | "gb" => 1_000_000_000,
        "t" | "tb" => 1_000_000_000_000,
        "kib" => KIB,
        "mib" => MIB,
        "gib" => GIB,
        "tib" => TIB,
        _ => return None,
    };

    if value < 0.0 || !value.is_finite() {
        return None;
    }
    Some((value * multiplier as f64) as u64)
}
