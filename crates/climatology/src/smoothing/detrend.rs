//! Linear detrending along time.

use grid_store::{Grid, GridError};

use crate::error::Result;

/// Remove the least-squares line through `(x, lane)` from `lane`, in place.
/// NaN samples are ignored in the fit and stay NaN.
pub fn detrend_lane(x: &[f64], lane: &mut [f64]) {
    let (mut n, mut sx, mut sy) = (0.0f64, 0.0f64, 0.0f64);
    for (&xi, &yi) in x.iter().zip(lane.iter()) {
        if !yi.is_nan() {
            n += 1.0;
            sx += xi;
            sy += yi;
        }
    }
    if n == 0.0 {
        return;
    }
    let (mx, my) = (sx / n, sy / n);

    let (mut sxy, mut sxx) = (0.0f64, 0.0f64);
    for (&xi, &yi) in x.iter().zip(lane.iter()) {
        if !yi.is_nan() {
            sxy += (xi - mx) * (yi - my);
            sxx += (xi - mx) * (xi - mx);
        }
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    for (&xi, yi) in x.iter().zip(lane.iter_mut()) {
        *yi -= my + slope * (xi - mx);
    }
}

/// Linear detrend of every `time` series of the grid, in parallel.
pub fn detrend(grid: &Grid) -> Result<Grid> {
    let x = grid
        .coord("time")?
        .to_numeric()
        .ok_or(GridError::CoordinateKind {
            dim: "time".to_string(),
            expected: "numeric",
        })?;

    let mut out = grid.clone();
    out.apply_along("time", |lane| detrend_lane(&x, lane))?;
    Ok(out)
}
