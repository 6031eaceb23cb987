//! On-disk dataset trees for integration tests.

use std::path::{Path, PathBuf};

use chrono::Datelike;
use grid_store::{Grid, GridStore, ZarrGridStore};
use tempfile::TempDir;

/// Common bounding boxes as `(min_lon, max_lon, min_lat, max_lat)`.
pub mod bbox {
    /// North Atlantic in 0..360 longitudes
    pub const NORTH_ATLANTIC: (f64, f64, f64, f64) = (280.0, 350.0, 20.0, 80.0);

    pub const GLOBAL: (f64, f64, f64, f64) = (0.0, 360.0, -90.0, 90.0);
}

/// A temporary data root holding one raw dataset directory
/// `root/{dataset}/{level_type}/{var}/{resolution}`.
pub struct DatasetTree {
    root: TempDir,
    segments: [String; 4],
    store: ZarrGridStore,
}

impl DatasetTree {
    pub fn new(dataset: &str, level_type: &str, var: &str, resolution: &str) -> Self {
        let root = tempfile::tempdir().expect("create temp data root");
        let tree = Self {
            root,
            segments: [
                dataset.to_string(),
                level_type.to_string(),
                var.to_string(),
                resolution.to_string(),
            ],
            store: ZarrGridStore::default(),
        };
        std::fs::create_dir_all(tree.raw_dir()).expect("create raw dir");
        tree
    }

    /// `ERA5/surf/t2m/dailymean`
    pub fn era5_surface() -> Self {
        Self::new("ERA5", "surf", "t2m", "dailymean")
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.segments
            .iter()
            .fold(self.root.path().to_path_buf(), |p, s| p.join(s))
    }

    pub fn store(&self) -> &ZarrGridStore {
        &self.store
    }

    /// Write `grid` as the single `full` file.
    pub fn write_full(&self, grid: &Grid) -> PathBuf {
        let path = self.raw_dir().join(format!("full.{}", self.store.extension()));
        self.store.write(grid, &path).expect("write full file");
        path
    }

    /// Split `grid` by year into `{year}` files.
    pub fn write_yearly(&self, grid: &Grid) -> Vec<PathBuf> {
        self.write_split(grid, |t| t.year().to_string())
    }

    /// Split `grid` by month into `{year}{month:02}` files.
    pub fn write_monthly(&self, grid: &Grid) -> Vec<PathBuf> {
        self.write_split(grid, |t| format!("{}{:02}", t.year(), t.month()))
    }

    fn write_split(&self, grid: &Grid, stem: impl Fn(&chrono::NaiveDateTime) -> String) -> Vec<PathBuf> {
        let times = grid.times().expect("grid has a time axis");
        let mut stems: Vec<String> = times.iter().map(&stem).collect();
        stems.dedup();

        stems
            .into_iter()
            .map(|s| {
                let part = grid.select_times(|t| stem(t) == s).expect("select part");
                let path = self.raw_dir().join(format!("{}.{}", s, self.store.extension()));
                self.store.write(&part, &path).expect("write part");
                path
            })
            .collect()
    }
}

/// Modification time of an artifact directory's metadata file, or of the
/// path itself.
pub fn artifact_mtime(path: &Path) -> std::time::SystemTime {
    let meta = path.join("zarr.json");
    let target = if meta.exists() { meta } else { path.to_path_buf() };
    std::fs::metadata(&target)
        .and_then(|m| m.modified())
        .unwrap_or_else(|e| panic!("mtime of {}: {}", target.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::seasonal_grid;

    #[test]
    fn test_yearly_tree() {
        let tree = DatasetTree::era5_surface();
        let grid = seasonal_grid("t2m", 2000, 2001, vec![0.0], vec![0.0]);
        let files = tree.write_yearly(&grid);
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("2000.zarr"));
        assert_eq!(tree.store().read(&files[1]).unwrap().len_of("time").unwrap(), 365);
    }
}
