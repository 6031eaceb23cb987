//! ERA5 climatology and anomaly data access.
//!
//! Raw reanalysis grids live in a directory tree keyed by dataset, level
//! type, variable and resolution. This crate derives and caches artifacts
//! below it:
//!
//! - periodic climatologies (`clim.zarr`), grouped means over a
//!   [`ClimatologyKey`] computed with a cohort reduction on a bounded pool
//! - anomaly files, optionally smoothed by an ordered [`SmoothingSpec`]
//!
//! The directory of every artifact is a pure function of the request
//! ([`PathCodec`]), so existing artifacts are found again instead of being
//! recomputed. [`BatchOrchestrator`] materialises them; [`open_grid`] reads
//! them back, cut to a region, period, season and set of levels.

pub mod access;
pub mod anomaly;
pub mod batch;
pub mod clim;
pub mod config;
pub mod error;
pub mod indices;
pub mod key;
pub mod locate;
pub mod path;
pub mod reduce;
pub mod smoothing;
pub mod timing;

// Re-exports
pub use access::{load_prepared, open_grid, prepare, OpenRequest};
pub use anomaly::{AnomalyEngine, DATASET_CLIMATOLOGY_WINDOW};
pub use batch::{BatchOrchestrator, BatchReport, ClimatologyStatus};
pub use clim::{ClimatologyAccumulator, ClimatologyEngine};
pub use config::{ComputeConfig, DataConfig, Era5Config};
pub use error::{ClimatologyError, Result};
pub use indices::DailyIndex;
pub use key::{assign_key, expected_groups, periodic_key, ClimatologyKey};
pub use locate::{time_mask, FileLocator, Layout};
pub use path::{encode, ArtifactPaths, DatasetId, PathCodec, ProcessingSpec};
pub use reduce::{GroupedMoments, Statistic};
pub use smoothing::{apply_smoothing_spec, Kernel, SmoothingSpec, SmoothingStep, WindowSize};
pub use timing::{TimingCollector, TimingScope};
