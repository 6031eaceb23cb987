//! Anomalies: departures from a per-period climatology.

use std::collections::HashMap;

use grid_store::{Grid, GridBundle, GridError};
use ndarray::{ArrayD, Axis, Zip};
use tracing::debug;

use crate::clim::ClimatologyEngine;
use crate::error::{ClimatologyError, Result};
use crate::key::{periodic_key, ClimatologyKey};
use crate::reduce::Statistic;
use crate::smoothing::window_smooth;

/// Window applied along the key dimension to the climatology (and standard
/// deviation) in [`AnomalyEngine::compute_for_dataset`].
pub const DATASET_CLIMATOLOGY_WINDOW: usize = 61;

/// Subtracts climatologies and optionally normalises by the grouped
/// standard deviation.
pub struct AnomalyEngine<'a> {
    engine: &'a ClimatologyEngine,
}

impl<'a> AnomalyEngine<'a> {
    pub fn new(engine: &'a ClimatologyEngine) -> Self {
        Self { engine }
    }

    /// Anomaly of `grid` with respect to `clim`, a climatology over `key`.
    ///
    /// With `normalized`, the anomaly is divided by the standard deviation
    /// of `grid` itself per key value, and NaN or infinite results become 0.
    /// Otherwise non-finite values pass through unchanged.
    pub fn compute(
        &self,
        grid: &Grid,
        clim: &Grid,
        key: ClimatologyKey,
        normalized: bool,
    ) -> Result<Grid> {
        let keys = periodic_key(grid, key)?;
        let mut out = subtract_per_period(grid, &keys, clim, key)?;
        if normalized {
            let std = self.engine.compute_std(grid, key)?;
            divide_per_period(&mut out, &keys, &std, key)?;
        }
        finish(grid, out, key)
    }

    /// Anomalies of every grid of `bundle`, each against its own climatology
    /// smoothed by a [`DATASET_CLIMATOLOGY_WINDOW`]-sample window along the
    /// key dimension.
    pub fn compute_for_dataset(
        &self,
        bundle: &GridBundle,
        key: ClimatologyKey,
        normalized: bool,
    ) -> Result<GridBundle> {
        let mut out = GridBundle::new();
        for grid in bundle.iter() {
            debug!(name = grid.name(), key = %key, normalized, "Dataset anomaly");
            let keys = periodic_key(grid, key)?;
            let moments = self.engine.moments(grid, key)?;
            let smooth = |stat| -> Result<Grid> {
                let g = moments.to_grid(key, stat)?;
                self.engine.install(|| {
                    window_smooth(&g, &[key.as_str()], DATASET_CLIMATOLOGY_WINDOW, true)
                })
            };

            let clim = smooth(Statistic::Mean)?;
            let mut data = subtract_per_period(grid, &keys, &clim, key)?;
            if normalized {
                let std = smooth(Statistic::Std)?;
                divide_per_period(&mut data, &keys, &std, key)?;
            }
            out.insert(finish(grid, data, key)?)?;
        }
        Ok(out)
    }
}

/// Position in `clim` of each key value, checking that `clim` is laid out
/// like `grid` with the key dimension in place of `time`.
fn period_positions(
    grid: &Grid,
    keys: &[i64],
    clim: &Grid,
    key: ClimatologyKey,
) -> Result<(usize, Vec<usize>)> {
    let t_ax = grid.axis_of("time")?;
    let k_ax = clim.axis_of(key.as_str())?;

    let aligned = t_ax == k_ax
        && grid.dims().len() == clim.dims().len()
        && grid
            .dims()
            .iter()
            .zip(clim.dims())
            .enumerate()
            .all(|(i, (a, b))| i == t_ax || a == b);
    if !aligned {
        return Err(GridError::Incompatible(format!(
            "climatology dims {:?} do not match {:?} of '{}'",
            clim.dim_names(),
            grid.dim_names(),
            grid.name()
        ))
        .into());
    }

    let periods = clim
        .coord(key.as_str())?
        .to_numeric()
        .ok_or(GridError::CoordinateKind {
            dim: key.as_str().to_string(),
            expected: "numeric",
        })?;
    let index: HashMap<i64, usize> = periods
        .iter()
        .enumerate()
        .map(|(i, &p)| (p.round() as i64, i))
        .collect();

    let positions = keys
        .iter()
        .map(|k| {
            index
                .get(k)
                .copied()
                .ok_or_else(|| ClimatologyError::MissingPeriod {
                    key: key.as_str().to_string(),
                    period: *k,
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((t_ax, positions))
}

fn subtract_per_period(
    grid: &Grid,
    keys: &[i64],
    clim: &Grid,
    key: ClimatologyKey,
) -> Result<ArrayD<f32>> {
    let (t_ax, positions) = period_positions(grid, keys, clim, key)?;
    let mut out = grid.data().to_owned();
    let reference = clim.data();
    Zip::from(out.axis_iter_mut(Axis(t_ax)))
        .and(&ndarray::Array1::from(positions))
        .par_for_each(|mut slab, &p| {
            slab -= &reference.index_axis(Axis(t_ax), p);
        });
    Ok(out)
}

/// Divide by the per-period standard deviation; non-finite results become 0.
fn divide_per_period(
    data: &mut ArrayD<f32>,
    keys: &[i64],
    std: &Grid,
    key: ClimatologyKey,
) -> Result<()> {
    let t_ax = std.axis_of(key.as_str())?;
    let periods = std.coord(key.as_str())?.as_ints().map(<[i64]>::to_vec).ok_or(
        GridError::CoordinateKind {
            dim: key.as_str().to_string(),
            expected: "int",
        },
    )?;
    let index: HashMap<i64, usize> = periods.iter().enumerate().map(|(i, &p)| (p, i)).collect();
    let positions = keys
        .iter()
        .map(|k| {
            index
                .get(k)
                .copied()
                .ok_or_else(|| ClimatologyError::MissingPeriod {
                    key: key.as_str().to_string(),
                    period: *k,
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let reference = std.data();
    Zip::from(data.axis_iter_mut(Axis(t_ax)))
        .and(&ndarray::Array1::from(positions))
        .par_for_each(|mut slab, &p| {
            Zip::from(&mut slab)
                .and(&reference.index_axis(Axis(t_ax), p))
                .for_each(|v, &s| {
                    let q = *v / s;
                    *v = if q.is_finite() { q } else { 0.0 };
                });
        });
    Ok(())
}

/// Wrap anomaly values in the input's labels, without the key coordinate.
fn finish(grid: &Grid, data: ArrayD<f32>, key: ClimatologyKey) -> Result<Grid> {
    let mut out = grid.with_data(data)?;
    out.drop_aux(key.as_str());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComputeConfig;
    use chrono::{Duration, NaiveDate};
    use grid_store::{CoordValues, Dimension};
    use ndarray::{Array, IxDyn};

    fn daily(days: usize, value: impl Fn(usize) -> f32) -> Grid {
        let t0 = NaiveDate::from_ymd_opt(2001, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let times = (0..days).map(|i| t0 + Duration::days(i as i64)).collect();
        let values = (0..days * 2).map(|i| value(i / 2)).collect();
        Grid::new(
            "z",
            vec![
                Dimension::new("time", CoordValues::Time(times)),
                Dimension::new("lon", CoordValues::Float(vec![0.0, 10.0])),
            ],
            Array::from_shape_vec(IxDyn(&[days, 2]), values).unwrap(),
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
    fn test_anomaly_subtracts_period_mean() {
        let engine = engine();
        let grid = daily(59, |i| i as f32);
        let clim = engine.compute(&grid, ClimatologyKey::Month).unwrap();
        let anom = AnomalyEngine::new(&engine)
            .compute(&grid, &clim, ClimatologyKey::Month, false)
            .unwrap();
        assert_eq!(anom.dim_names(), grid.dim_names());
        assert!(anom.aux("month").is_none());
        // January mean is 15, February mean is 44.5
        assert!((anom.data()[[0, 0]] + 15.0).abs() < 1e-4);
        assert!((anom.data()[[58, 1]] - 13.5).abs() < 1e-4);
    }

    #[test]
    fn test_missing_period() {
        let engine = engine();
        let january = daily(31, |i| i as f32);
        let clim = engine.compute(&january, ClimatologyKey::Month).unwrap();
        let grid = daily(40, |i| i as f32);
        let err = AnomalyEngine::new(&engine)
            .compute(&grid, &clim, ClimatologyKey::Month, false)
            .unwrap_err();
        assert!(matches!(err, ClimatologyError::MissingPeriod { period: 2, .. }));
    }

    #[test]
    fn test_non_normalized_keeps_nan() {
        let engine = engine();
        let grid = daily(10, |i| if i == 3 { f32::NAN } else { 1.0 });
        let clim = engine.compute(&grid, ClimatologyKey::Month).unwrap();
        let anom = AnomalyEngine::new(&engine)
            .compute(&grid, &clim, ClimatologyKey::Month, false)
            .unwrap();
        assert!(anom.data()[[3, 0]].is_nan());
    }

    #[test]
    fn test_dataset_anomaly_smooths_climatology() {
        let engine = engine();
        let grid = daily(365, |i| if i % 2 == 0 { 1.0 } else { -1.0 });
        let bundle = GridBundle::try_from(vec![grid]).unwrap();
        let out = AnomalyEngine::new(&engine)
            .compute_for_dataset(&bundle, ClimatologyKey::DayOfYear, false)
            .unwrap();
        let anom = out.get("z").unwrap();
        // A single year makes the raw climatology equal to the data; the
        // smoothed one is close to zero, so anomalies keep the signal.
        assert!(anom.data()[[0, 0]] > 0.9);
        assert!(anom.data()[[1, 0]] < -0.9);
    }
}
