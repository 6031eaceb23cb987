//! Persistent grid storage.
//!
//! Every artifact is one labelled grid in its own Zarr V3 store. Labels
//! travel in the array attributes:
//!
//! ```text
//! {
//!   "_ARRAY_DIMENSIONS": ["time", "lat", "lon"],
//!   "name": "u",
//!   "coords": [{"name": "time", "coord": {"kind": "time", "values": [...]}}, ...],
//!   "aux_coords": [...],
//!   "attrs": {...}
//! }
//! ```

mod reader;
mod writer;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{GridError, Result};
use crate::grid::Grid;

pub use reader::read_grid;
pub use writer::write_grid;

/// Attribute keys used in the array metadata.
pub(crate) mod keys {
    pub const DIMENSIONS: &str = "_ARRAY_DIMENSIONS";
    pub const NAME: &str = "name";
    pub const COORDS: &str = "coords";
    pub const AUX_COORDS: &str = "aux_coords";
    pub const ATTRS: &str = "attrs";
}

/// Read/write access to grid artifacts on disk.
pub trait GridStore: Send + Sync {
    /// File extension of artifacts handled by this store, without the dot.
    fn extension(&self) -> &str;

    /// Read one artifact.
    fn read(&self, path: &Path) -> Result<Grid>;

    /// Write one artifact. The artifact only becomes visible once complete.
    fn write(&self, grid: &Grid, path: &Path) -> Result<()>;

    /// Whether an artifact exists at `path`.
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Read several artifacts and join them along `time`, sorted by time.
    fn read_many(&self, paths: &[PathBuf]) -> Result<Grid> {
        if paths.is_empty() {
            return Err(GridError::Empty("no files to open".to_string()));
        }

        let grids = paths
            .iter()
            .map(|p| {
                debug!(path = %p.display(), "Opening grid");
                self.read(p)
            })
            .collect::<Result<Vec<_>>>()?;

        if grids.len() == 1 || !grids[0].has_dim("time") {
            return grids
                .into_iter()
                .next()
                .ok_or_else(|| GridError::Empty("no files to open".to_string()));
        }

        Grid::concat(&grids, "time")?.sort_by("time")
    }
}

/// Filesystem-backed Zarr V3 store.
#[derive(Debug, Clone)]
pub struct ZarrGridStore {
    config: StoreConfig,
    extension: String,
}

impl ZarrGridStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            extension: "zarr".to_string(),
        }
    }

    /// Use a different artifact extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl Default for ZarrGridStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl GridStore for ZarrGridStore {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn read(&self, path: &Path) -> Result<Grid> {
        read_grid(path)
    }

    fn write(&self, grid: &Grid, path: &Path) -> Result<()> {
        write_grid(path, grid, &self.config)
    }
}
