//! Frequency-domain low-pass filtering.

use grid_store::Grid;
use ndarray::{ArrayD, Axis, Zip};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::error::Result;

/// Sample frequencies of a length-`n` transform with sample spacing `d`,
/// in the usual order `0, 1, ..., -1` scaled by `1 / (n d)`.
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let val = 1.0 / (n as f64 * d);
    let n_half = n.div_ceil(2);
    let mut results: Vec<f64> = (0..n_half).map(|i| i as f64).collect();
    results.extend((-(n as isize / 2)..0).map(|i| i as f64));
    results.iter_mut().for_each(|x| *x *= val);
    results
}

/// Low-pass filter `grid` jointly over `dims`.
///
/// Missing values are zero-filled, the data is transformed over every listed
/// dimension, and every component whose summed absolute frequency
/// `Σ|f_dim|` reaches `cutoff` is removed. Frequencies are in cycles per
/// coordinate unit (per day for `time`). Name, attributes and auxiliary
/// coordinates are carried over.
pub fn lowpass_smooth(grid: &Grid, dims: &[&str], cutoff: f64) -> Result<Grid> {
    let mut spectrum: ArrayD<Complex<f64>> = grid.data().mapv(|v| {
        if v.is_nan() {
            Complex::new(0.0, 0.0)
        } else {
            Complex::new(v as f64, 0.0)
        }
    });

    let mut planner = FftPlanner::<f64>::new();
    let mut axes = Vec::with_capacity(dims.len());
    for &dim in dims {
        let ax = grid.axis_of(dim)?;
        let n = grid.len_of(dim)?;
        let d = grid
            .coord(dim)?
            .spacing()
            .filter(|d| *d != 0.0)
            .unwrap_or(1.0);
        axes.push((ax, fftfreq(n, d)));

        transform_axis(&mut spectrum, ax, planner.plan_fft_forward(n));
    }

    spectrum.indexed_iter_mut().for_each(|(ix, value)| {
        let magnitude: f64 = axes.iter().map(|(ax, freqs)| freqs[ix[*ax]].abs()).sum();
        if magnitude >= cutoff {
            *value = Complex::new(0.0, 0.0);
        }
    });

    for (ax, freqs) in &axes {
        let n = freqs.len();
        transform_axis(&mut spectrum, *ax, planner.plan_fft_inverse(n));
        let scale = 1.0 / n as f64;
        spectrum.mapv_inplace(|c| c * scale);
    }

    let data = spectrum.mapv(|c| c.re as f32);
    Ok(grid.with_data(data)?)
}

/// Run `fft` over every lane along `ax`.
fn transform_axis(data: &mut ArrayD<Complex<f64>>, ax: usize, fft: Arc<dyn Fft<f64>>) {
    Zip::from(data.lanes_mut(Axis(ax))).par_for_each(|mut lane| {
        let mut buffer: Vec<Complex<f64>> = lane.iter().copied().collect();
        fft.process(&mut buffer);
        lane.iter_mut()
            .zip(buffer)
            .for_each(|(dst, src)| *dst = src);
    });
}
