//! Climatology computation and persistence.

use std::path::{Path, PathBuf};

use grid_store::{Grid, GridStore};
use tracing::{debug, info};

use crate::config::ComputeConfig;
use crate::error::{ClimatologyError, Result};
use crate::key::{periodic_key, ClimatologyKey};
use crate::reduce::{GroupedMoments, Statistic};
use crate::smoothing::{apply_smoothing_spec, SmoothingSpec};

/// File stem of the climatology artifact.
pub const CLIMATOLOGY_STEM: &str = "clim";

/// Computes grouped climatologies on a bounded worker pool.
pub struct ClimatologyEngine {
    compute: ComputeConfig,
    pool: rayon::ThreadPool,
}

impl ClimatologyEngine {
    pub fn new(compute: ComputeConfig) -> Result<Self> {
        compute.validate().map_err(ClimatologyError::Config)?;
        let pool = compute.build_pool()?;
        debug!(
            workers = compute.n_workers,
            memory_limit = compute.memory_limit_bytes,
            "Built worker pool"
        );
        Ok(Self { compute, pool })
    }

    pub fn config(&self) -> &ComputeConfig {
        &self.compute
    }

    /// Run `op` on the worker pool. Parallel smoothing and reductions
    /// started inside use the pool's threads.
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Grouped moments of `grid` by `key`.
    pub fn moments(&self, grid: &Grid, key: ClimatologyKey) -> Result<GroupedMoments> {
        let keys = periodic_key(grid, key)?;
        let nt = keys.len().max(1);
        let step_bytes = grid.nbytes() / nt;
        let batch_len = self.compute.batch_len(step_bytes);
        self.pool
            .install(|| GroupedMoments::compute(grid, &keys, batch_len))
    }

    /// Mean of `grid` per distinct value of `key`.
    pub fn compute(&self, grid: &Grid, key: ClimatologyKey) -> Result<Grid> {
        self.moments(grid, key)?.to_grid(key, Statistic::Mean)
    }

    /// Population standard deviation of `grid` per distinct value of `key`.
    pub fn compute_std(&self, grid: &Grid, key: ClimatologyKey) -> Result<Grid> {
        self.moments(grid, key)?.to_grid(key, Statistic::Std)
    }

    /// Start a climatology fed one grid at a time.
    pub fn accumulator(&self, key: ClimatologyKey) -> ClimatologyAccumulator<'_> {
        ClimatologyAccumulator {
            engine: self,
            key,
            moments: None,
            ingested: 0,
        }
    }

    /// Read the climatology at `dest`, or compute it from `sources`, apply
    /// `smoothing` and write it there.
    ///
    /// `load` opens one source file in analysis-ready form. Returns the
    /// climatology and whether it was computed.
    pub fn load_or_compute<F>(
        &self,
        store: &dyn GridStore,
        dest: &Path,
        sources: &[PathBuf],
        key: ClimatologyKey,
        smoothing: &SmoothingSpec,
        load: F,
    ) -> Result<(Grid, bool)>
    where
        F: Fn(&Path) -> Result<Grid>,
    {
        if store.exists(dest) {
            debug!(path = %dest.display(), "Loading climatology");
            return Ok((store.read(dest)?, false));
        }

        info!(
            path = %dest.display(),
            key = %key,
            sources = sources.len(),
            "Computing climatology"
        );
        let mut acc = self.accumulator(key);
        for source in sources {
            acc.ingest(&load(source)?)?;
        }
        let clim = acc.finish(Statistic::Mean)?;
        let clim = self.install(|| apply_smoothing_spec(clim, smoothing))?;

        store.write(&clim, dest)?;
        Ok((clim, true))
    }
}

/// Grouped moments accumulated over several grids of the same cells.
pub struct ClimatologyAccumulator<'a> {
    engine: &'a ClimatologyEngine,
    key: ClimatologyKey,
    moments: Option<GroupedMoments>,
    ingested: usize,
}

impl ClimatologyAccumulator<'_> {
    pub fn ingest(&mut self, grid: &Grid) -> Result<()> {
        let moments = self.engine.moments(grid, self.key)?;
        match self.moments.as_mut() {
            Some(acc) => acc.merge(moments)?,
            None => self.moments = Some(moments),
        }
        self.ingested += 1;
        Ok(())
    }

    /// Number of grids ingested so far.
    pub fn ingested(&self) -> usize {
        self.ingested
    }

    pub fn finish(self, stat: Statistic) -> Result<Grid> {
        let moments = self
            .moments
            .ok_or_else(|| ClimatologyError::config("no data ingested into the climatology"))?;
        moments.to_grid(self.key, stat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use grid_store::{CoordValues, Dimension};
    use ndarray::{Array, IxDyn};

    fn daily(start: (i32, u32, u32), values: Vec<f32>) -> Grid {
        let t0 = NaiveDate::from_ymd_opt(start.0, start.1, start.2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let n = values.len();
        let times = (0..n).map(|i| t0 + Duration::days(i as i64)).collect();
        Grid::new(
            "t2m",
            vec![
                Dimension::new("time", CoordValues::Time(times)),
                Dimension::new("lat", CoordValues::Float(vec![45.0])),
            ],
            Array::from_shape_vec(IxDyn(&[n, 1]), values).unwrap(),
        )
        .unwrap()
    }

    fn engine() -> ClimatologyEngine {
        ClimatologyEngine::new(ComputeConfig {
            n_workers: 2,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_monthly_climatology() {
        // 31 days of January then 28 of February
        let values: Vec<f32> = (0..59).map(|i| if i < 31 { 1.0 } else { 3.0 }).collect();
        let clim = engine()
            .compute(&daily((2001, 1, 1), values), ClimatologyKey::Month)
            .unwrap();
        assert_eq!(clim.coord("month").unwrap(), &CoordValues::Int(vec![1, 2]));
        assert_eq!(clim.data()[[0, 0]], 1.0);
        assert_eq!(clim.data()[[1, 0]], 3.0);
    }

    #[test]
    fn test_accumulator_matches_whole() {
        let engine = engine();
        let a = daily((2001, 1, 1), vec![1.0, 2.0, 3.0]);
        let b = daily((2002, 1, 1), vec![5.0, 6.0, 7.0]);
        let mut acc = engine.accumulator(ClimatologyKey::DayOfYear);
        acc.ingest(&a).unwrap();
        acc.ingest(&b).unwrap();
        assert_eq!(acc.ingested(), 2);
        let clim = acc.finish(Statistic::Mean).unwrap();
        assert_eq!(clim.coord("dayofyear").unwrap(), &CoordValues::Int(vec![1, 2, 3]));
        assert_eq!(clim.data()[[0, 0]], 3.0);
        assert_eq!(clim.data()[[2, 0]], 5.0);
    }

    #[test]
    fn test_empty_accumulator_fails() {
        let engine = engine();
        let acc = engine.accumulator(ClimatologyKey::Month);
        assert!(matches!(acc.finish(Statistic::Mean), Err(ClimatologyError::Config(_))));
    }
}
