//! Synthetic reanalysis-like grids with predictable values.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use grid_store::{CoordValues, Dimension, Grid};
use ndarray::{Array, IxDyn};

/// Midnight on the given date.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_else(|| panic!("invalid test date {}-{}-{}", year, month, day))
}

/// `count` timestamps spaced `step_hours` apart, starting at `start`.
pub fn time_axis(start: NaiveDateTime, count: usize, step_hours: i64) -> Vec<NaiveDateTime> {
    (0..count)
        .map(|i| start + Duration::hours(i as i64 * step_hours))
        .collect()
}

/// Every day of the years `first..=last`.
pub fn daily_times(first: i32, last: i32) -> Vec<NaiveDateTime> {
    let start = date(first, 1, 1);
    let end = date(last + 1, 1, 1);
    let days = (end - start).num_days() as usize;
    time_axis(start, days, 24)
}

/// Longitudes `0, step, ..., 360 - step`.
pub fn global_lons(step: f64) -> Vec<f64> {
    let n = (360.0 / step).round() as usize;
    (0..n).map(|i| i as f64 * step).collect()
}

/// `count` values from `start`, spaced `step`.
pub fn linspace(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + i as f64 * step).collect()
}

/// A `(time, lat, lon)` grid whose values come from `f(time, lat, lon)`.
pub fn make_grid<F>(
    name: &str,
    times: Vec<NaiveDateTime>,
    lats: Vec<f64>,
    lons: Vec<f64>,
    f: F,
) -> Grid
where
    F: Fn(&NaiveDateTime, f64, f64) -> f32,
{
    let shape = [times.len(), lats.len(), lons.len()];
    let mut values = Vec::with_capacity(shape.iter().product());
    for t in &times {
        for &lat in &lats {
            for &lon in &lons {
                values.push(f(t, lat, lon));
            }
        }
    }

    let data = Array::from_shape_vec(IxDyn(&shape), values).expect("shape matches values");
    Grid::new(
        name,
        vec![
            Dimension::new("time", CoordValues::Time(times)),
            Dimension::new("lat", CoordValues::Float(lats)),
            Dimension::new("lon", CoordValues::Float(lons)),
        ],
        data,
    )
    .expect("valid test grid")
}

/// Annual temperature cycle in Kelvin: 280 K mean, 10 K amplitude peaking in
/// July, plus a small latitude gradient.
pub fn seasonal_temperature(t: &NaiveDateTime, lat: f64, _lon: f64) -> f32 {
    let phase = 2.0 * std::f64::consts::PI * (t.ordinal0() as f64 - 196.0) / 365.25;
    (280.0 + 10.0 * phase.cos() - 0.1 * lat) as f32
}

/// Daily `(time, lat, lon)` grid of [`seasonal_temperature`] over
/// `first..=last`.
pub fn seasonal_grid(name: &str, first: i32, last: i32, lats: Vec<f64>, lons: Vec<f64>) -> Grid {
    make_grid(name, daily_times(first, last), lats, lons, seasonal_temperature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_times_leap_year() {
        let times = daily_times(2000, 2001);
        assert_eq!(times.len(), 366 + 365);
        assert_eq!(times[0], date(2000, 1, 1));
        assert_eq!(times[times.len() - 1], date(2001, 12, 31));
    }

    #[test]
    fn test_global_lons() {
        let lons = global_lons(90.0);
        assert_eq!(lons, vec![0.0, 90.0, 180.0, 270.0]);
    }

    #[test]
    fn test_make_grid_layout() {
        let grid = make_grid(
            "x",
            time_axis(date(2000, 1, 1), 2, 6),
            vec![10.0, 20.0],
            vec![0.0, 1.0, 2.0],
            |_, lat, lon| (lat + lon) as f32,
        );
        assert_eq!(grid.shape(), &[2, 2, 3]);
        assert_eq!(grid.data()[[1, 1, 2]], 22.0);
    }

    #[test]
    fn test_seasonal_cycle_peaks_in_summer() {
        let july = seasonal_temperature(&date(2001, 7, 15), 0.0, 0.0);
        let january = seasonal_temperature(&date(2001, 1, 15), 0.0, 0.0);
        assert!(july > 289.0);
        assert!(january < 271.0);
    }
}
