//! Materialise climatologies and anomaly files for one dataset.

use std::path::{Path, PathBuf};

use grid_store::GridStore;
use tracing::{debug, info};

use crate::access::load_prepared;
use crate::anomaly::AnomalyEngine;
use crate::clim::{ClimatologyEngine, CLIMATOLOGY_STEM};
use crate::config::Era5Config;
use crate::error::{ClimatologyError, Result};
use crate::path::{ArtifactPaths, DatasetId, PathCodec, ProcessingSpec};
use crate::smoothing::apply_smoothing_spec;
use crate::timing::TimingCollector;

/// What happened to the climatology artifact during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimatologyStatus {
    /// No climatology type requested.
    NotRequested,
    /// Already on disk and nothing left to do with it.
    Present,
    /// Read back from disk.
    Loaded,
    /// Computed and written.
    Computed,
}

/// Outcome of [`BatchOrchestrator::run`].
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub paths: ArtifactPaths,
    pub climatology: ClimatologyStatus,
    /// Anomaly (or smoothed) files written by this run.
    pub written: Vec<PathBuf>,
    /// Source files whose output already existed.
    pub skipped: usize,
}

impl BatchReport {
    /// True when the run neither computed nor wrote anything.
    pub fn is_noop(&self) -> bool {
        self.climatology != ClimatologyStatus::Computed && self.written.is_empty()
    }
}

/// Builds every artifact of a (dataset, processing) pair that does not exist
/// yet.
pub struct BatchOrchestrator<S: GridStore> {
    codec: PathCodec,
    store: S,
    engine: ClimatologyEngine,
    timings: TimingCollector,
}

impl<S: GridStore> BatchOrchestrator<S> {
    pub fn new(config: &Era5Config, store: S) -> Result<Self> {
        config.validate()?;
        config.check_store(&store)?;
        Ok(Self {
            codec: PathCodec::new(&config.data.root),
            store,
            engine: ClimatologyEngine::new(config.compute.clone())?,
            timings: TimingCollector::new(),
        })
    }

    pub fn timings(&self) -> &TimingCollector {
        &self.timings
    }

    pub fn engine(&self) -> &ClimatologyEngine {
        &self.engine
    }

    /// Produce the climatology and anomaly files of `id` for `spec`.
    ///
    /// Existing artifacts are reused, so a second identical run does no work.
    /// Without a climatology type every source file is only smoothed. Any
    /// failure aborts the remaining files.
    pub fn run(&self, id: &DatasetId, spec: &ProcessingSpec) -> Result<BatchReport> {
        let _total = self.timings.scope("batch");
        let paths = self.codec.resolve_write(id, spec)?;

        let sources = raw_sources(&paths.raw, self.store.extension())?;
        if sources.is_empty() {
            return Err(ClimatologyError::LayoutUnknown(paths.raw));
        }
        let dests: Vec<PathBuf> = sources
            .iter()
            .filter_map(|s| s.file_name().map(|name| paths.anom.join(name)))
            .collect();
        let dest_clim = paths
            .clim
            .join(format!("{}.{}", CLIMATOLOGY_STEM, self.store.extension()));

        let clim_done = spec.clim_type.is_none() || self.store.exists(&dest_clim);
        if clim_done && dests.iter().all(|d| self.store.exists(d)) {
            info!(
                var = %id.var,
                dir = %paths.anom.display(),
                files = dests.len(),
                "All artifacts present"
            );
            let climatology = if spec.clim_type.is_some() {
                ClimatologyStatus::Present
            } else {
                ClimatologyStatus::NotRequested
            };
            return Ok(BatchReport {
                paths,
                climatology,
                written: Vec::new(),
                skipped: dests.len(),
            });
        }

        let Some(key) = spec.clim_type else {
            let (written, skipped) = self.for_each_missing(&sources, &dests, |source| {
                let grid = load_prepared(&self.store, source, id)?;
                let _t = self.timings.scope("smoothing");
                self.engine
                    .install(|| apply_smoothing_spec(grid, &spec.smoothing))
            })?;
            return Ok(BatchReport {
                paths,
                climatology: ClimatologyStatus::NotRequested,
                written,
                skipped,
            });
        };

        let (clim, computed) = {
            let _t = self.timings.scope("climatology");
            self.engine.load_or_compute(
                &self.store,
                &dest_clim,
                &sources,
                key,
                &spec.clim_smoothing,
                |source| load_prepared(&self.store, source, id),
            )?
        };

        let anomalies = AnomalyEngine::new(&self.engine);
        let (written, skipped) = self.for_each_missing(&sources, &dests, |source| {
            let grid = load_prepared(&self.store, source, id)?;
            let anom = {
                let _t = self.timings.scope("anomaly");
                self.engine
                    .install(|| anomalies.compute(&grid, &clim, key, false))?
            };
            if spec.smoothing.is_empty() {
                return Ok(anom);
            }
            let _t = self.timings.scope("smoothing");
            self.engine
                .install(|| apply_smoothing_spec(anom, &spec.smoothing))
        })?;

        info!(
            var = %id.var,
            key = %key,
            climatology_computed = computed,
            written = written.len(),
            skipped,
            "Batch finished"
        );
        Ok(BatchReport {
            paths,
            climatology: if computed {
                ClimatologyStatus::Computed
            } else {
                ClimatologyStatus::Loaded
            },
            written,
            skipped,
        })
    }

    /// Produce and write every destination that does not exist yet, in
    /// source order. Returns the written paths and the number skipped.
    fn for_each_missing<F>(
        &self,
        sources: &[PathBuf],
        dests: &[PathBuf],
        produce: F,
    ) -> Result<(Vec<PathBuf>, usize)>
    where
        F: Fn(&Path) -> Result<grid_store::Grid>,
    {
        let mut written = Vec::new();
        let mut skipped = 0;
        for (source, dest) in sources.iter().zip(dests) {
            if self.store.exists(dest) {
                skipped += 1;
                continue;
            }
            debug!(source = %source.display(), dest = %dest.display(), "Processing file");
            let grid = produce(source)?;
            let _t = self.timings.scope("write");
            self.store.write(&grid, dest)?;
            written.push(dest.clone());
        }
        Ok((written, skipped))
    }
}

/// Artifact files directly inside `dir` with the given extension, sorted.
///
/// Entries whose stem is the climatology stem are excluded.
pub fn raw_sources(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut sources = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| ClimatologyError::Io(e.into()))?;
        let path = entry.path();
        let matches = path.extension().is_some_and(|ext| ext == extension)
            && path.file_stem().is_some_and(|stem| stem != CLIMATOLOGY_STEM);
        if matches {
            sources.push(path.to_path_buf());
        }
    }
    sources.sort();
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_sources_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2001.zarr", "2000.zarr", "notes.txt", "clim.zarr"] {
            std::fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        std::fs::create_dir_all(dir.path().join("dayofyear").join("1999.zarr")).unwrap();

        let sources = raw_sources(dir.path(), "zarr").unwrap();
        assert_eq!(
            sources,
            vec![dir.path().join("2000.zarr"), dir.path().join("2001.zarr")]
        );
    }

    #[test]
    fn test_raw_sources_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(raw_sources(&dir.path().join("absent"), "zarr").unwrap().is_empty());
    }
}
