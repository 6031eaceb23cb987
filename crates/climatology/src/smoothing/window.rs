//! Moving-average smoothing.

use std::collections::BTreeMap;

use grid_store::select::is_global_lon;
use grid_store::{Grid, GridError};
use ndarray::Axis;

use crate::error::Result;

/// Whether `dim` wraps around: `dayofyear`, or a longitude axis covering the
/// full circle from 0.
pub fn is_circular(grid: &Grid, dim: &str) -> bool {
    match dim {
        "dayofyear" => true,
        "lon" | "longitude" => grid
            .coord(dim)
            .ok()
            .and_then(|c| c.to_numeric())
            .map(|lons| is_global_lon(&lons))
            .unwrap_or(false),
        _ => false,
    }
}

/// Moving average over `window` samples, in place. NaN is skipped; a window
/// without any valid sample yields NaN.
///
/// Centered windows cover `[i - w/2, i - w/2 + w - 1]`, trailing windows
/// `[i - w + 1, i]`. Windows are truncated at the ends of the lane.
pub fn rolling_mean(lane: &mut [f64], window: usize, centered: bool) {
    let n = lane.len();
    if n == 0 || window <= 1 {
        return;
    }

    let mut sums = vec![0.0f64; n + 1];
    let mut counts = vec![0usize; n + 1];
    for (i, &v) in lane.iter().enumerate() {
        let valid = !v.is_nan();
        sums[i + 1] = sums[i] + if valid { v } else { 0.0 };
        counts[i + 1] = counts[i] + valid as usize;
    }

    let w = window as isize;
    let last = n as isize - 1;
    for (i, out) in lane.iter_mut().enumerate() {
        let i = i as isize;
        let (lo, hi) = if centered {
            let lo = i - w / 2;
            (lo, lo + w - 1)
        } else {
            (i - w + 1, i)
        };
        let lo = lo.max(0) as usize;
        let hi = hi.min(last) as usize;

        let count = counts[hi + 1] - counts[lo];
        *out = if count == 0 {
            f64::NAN
        } else {
            (sums[hi + 1] - sums[lo]) / count as f64
        };
    }
}

/// Moving average along each of `dims` in turn.
///
/// Circular dimensions are padded by `ceil(window / 2)` wrapped values on
/// both sides before averaging and trimmed afterwards. `hourofyear` is
/// smoothed separately for every hour of the day.
pub fn window_smooth(grid: &Grid, dims: &[&str], window: usize, centered: bool) -> Result<Grid> {
    let mut out = grid.clone();
    for &dim in dims {
        out = smooth_dim(&out, dim, window, centered)?;
    }
    Ok(out)
}

fn smooth_dim(grid: &Grid, dim: &str, window: usize, centered: bool) -> Result<Grid> {
    if dim == "hourofyear" {
        return smooth_hourofyear(grid, window, centered);
    }

    if is_circular(grid, dim) {
        let len = grid.len_of(dim)?;
        let pad = window.div_ceil(2);
        let mut padded = grid.pad_wrap(dim, pad)?;
        padded.apply_along(dim, |lane| rolling_mean(lane, window, centered))?;
        let interior: Vec<usize> = (pad..pad + len).collect();
        return Ok(padded.isel(dim, &interior)?);
    }

    let mut out = grid.clone();
    out.apply_along(dim, |lane| rolling_mean(lane, window, centered))?;
    Ok(out)
}

/// Within a day consecutive hours of year are not neighbours in the "same
/// hour, adjacent days" sense, so each hour of day is smoothed on its own with
/// the window shared out between the groups.
fn smooth_hourofyear(grid: &Grid, window: usize, centered: bool) -> Result<Grid> {
    let dim = if grid.has_dim("hourofyear") {
        "hourofyear"
    } else {
        grid.aux("hourofyear")
            .map(|a| a.dim.as_str())
            .ok_or_else(|| GridError::UnknownDimension("hourofyear".to_string()))?
    };
    let keys = grid
        .coord("hourofyear")?
        .to_numeric()
        .ok_or(GridError::CoordinateKind {
            dim: "hourofyear".to_string(),
            expected: "numeric",
        })?;

    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, key) in keys.iter().enumerate() {
        groups
            .entry((key.round() as i64).rem_euclid(24))
            .or_default()
            .push(i);
    }
    let group_window = (window / groups.len().max(1)).max(1);

    let ax = grid.axis_of(dim)?;
    let mut data = grid.data().clone();
    for indices in groups.values() {
        let mut sub = grid.isel(dim, indices)?;
        sub.apply_along(dim, |lane| rolling_mean(lane, group_window, centered))?;
        for (k, &i) in indices.iter().enumerate() {
            data.index_axis_mut(Axis(ax), i)
                .assign(&sub.data().index_axis(Axis(ax), k));
        }
    }
    Ok(grid.with_data(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_store::{CoordValues, Dimension};
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn test_centered_window() {
        let mut lane = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        rolling_mean(&mut lane, 3, true);
        assert_eq!(lane, vec![1.5, 2.0, 3.0, 4.0, 4.5]);
    }

    #[test]
    fn test_trailing_window_and_nan() {
        let mut lane = vec![2.0, f64::NAN, 4.0, f64::NAN, f64::NAN, f64::NAN];
        rolling_mean(&mut lane, 2, false);
        assert_eq!(lane[0], 2.0);
        assert_eq!(lane[1], 2.0);
        assert_eq!(lane[2], 4.0);
        assert_eq!(lane[3], 4.0);
        assert!(lane[4].is_nan());
    }

    #[test]
    fn test_even_centered_window() {
        let mut lane = vec![0.0, 10.0, 20.0, 30.0];
        rolling_mean(&mut lane, 2, true);
        assert_eq!(lane, vec![0.0, 5.0, 15.0, 25.0]);
    }

    #[test]
    fn test_dayofyear_wraps() {
        let n = 366;
        let data = ArrayD::from_shape_fn(IxDyn(&[n]), |ix| if ix[0] == n - 1 { 3.0 } else { 0.0 });
        let grid = Grid::new(
            "clim",
            vec![Dimension::new(
                "dayofyear",
                CoordValues::Int((1..=n as i64).collect()),
            )],
            data,
        )
        .unwrap();
        let out = window_smooth(&grid, &["dayofyear"], 3, true).unwrap();
        assert_eq!(out.data()[[0]], 1.0);
        assert_eq!(out.data()[[n - 2]], 1.0);
        assert_eq!(out.data()[[1]], 0.0);
        assert_eq!(out.len_of("dayofyear").unwrap(), n);
    }

    #[test]
    fn test_hourofyear_groups_by_hour_of_day() {
        // Two days at 00 and 12 UTC: hour-of-day groups {0, 24} and {12, 36}.
        let data = ArrayD::from_shape_vec(IxDyn(&[4]), vec![0.0, 100.0, 2.0, 102.0]).unwrap();
        let grid = Grid::new(
            "clim",
            vec![Dimension::new(
                "hourofyear",
                CoordValues::Int(vec![0, 12, 24, 36]),
            )],
            data,
        )
        .unwrap();
        let out = window_smooth(&grid, &["hourofyear"], 4, true).unwrap();
        assert_eq!(out.data().as_slice().unwrap(), &[0.0, 100.0, 1.0, 101.0]);
    }
}
