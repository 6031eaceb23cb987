//! Labelled reanalysis grids and their on-disk storage.
//!
//! This crate provides the array layer of the anomaly pipeline:
//!
//! - **Grid**: an `ndarray` array with named dimensions, coordinates,
//!   auxiliary coordinates and attributes
//! - **Storage**: one Zarr V3 store per artifact, written atomically
//! - **Selection**: bounding box, season, year and level extraction plus
//!   coordinate normalisation
//!
//! # Architecture
//!
//! ```text
//! Artifact paths
//!      │
//!      ▼
//! GridStore::read_many(paths)
//!      │
//!      ├─► read_grid(path) per file (Zarr attributes → labels)
//!      │
//!      └─► Grid::concat(.., "time") + sort by time
//!               │
//!               ▼
//!      select::{canonicalize_dims, ensure_lat_ascending, select_bbox, ...}
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_store::{GridStore, ZarrGridStore};
//!
//! let store = ZarrGridStore::default();
//! let grid = store.read(&root.join("1990.zarr"))?;
//! let jja = grid_store::select::select_season(&grid, &"JJA".parse()?)?;
//! store.write(&jja, &out.join("1990.zarr"))?;
//! ```

pub mod bundle;
pub mod config;
pub mod error;
pub mod grid;
pub mod select;
pub mod store;

pub use bundle::GridBundle;
pub use config::{StoreConfig, ZarrCompression};
pub use error::{GridError, Result};
pub use grid::{AuxCoord, CoordValues, Dimension, Grid};
pub use select::{LevelSelection, LevelSpec};
pub use store::{read_grid, write_grid, GridStore, ZarrGridStore};
