//! Smoothing specifications and kernels.
//!
//! A [`SmoothingSpec`] is an ordered list of steps. The order is significant
//! twice: steps are applied in that order, and the encoded artifact path lists
//! them in that order.
//!
//! Text form, used on the command line and in job files:
//!
//! ```text
//! dayofyear:win:15,detrended
//! lon+lat:fft:0.25
//! ```

mod detrend;
mod lowpass;
mod window;

use std::fmt;
use std::str::FromStr;

use grid_store::Grid;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClimatologyError, Result};

pub use detrend::{detrend, detrend_lane};
pub use lowpass::{fftfreq, lowpass_smooth};
pub use window::{is_circular, rolling_mean, window_smooth};

/// Smoothing kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kernel {
    /// Moving average.
    WindowSmooth,
    /// Frequency-domain low-pass filter.
    LowpassSmooth,
    /// Spherical-harmonic truncation. Declared, not implemented.
    SphericalTruncation,
}

impl Kernel {
    /// Token used in artifact paths.
    pub fn token(&self) -> &'static str {
        match self {
            Kernel::WindowSmooth => "win",
            Kernel::LowpassSmooth => "fft",
            Kernel::SphericalTruncation => "trunc",
        }
    }
}

impl FromStr for Kernel {
    type Err = ClimatologyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "win" | "window" | "window_smoothing" => Ok(Kernel::WindowSmooth),
            "fft" | "lowpass" | "fft_smoothing" => Ok(Kernel::LowpassSmooth),
            "trunc" | "spherical" | "truncation" | "windspharm" => Ok(Kernel::SphericalTruncation),
            other => Err(ClimatologyError::config(format!(
                "unknown smoothing kernel '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Window size or cutoff of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WindowSize {
    Int(i64),
    Float(f64),
}

impl WindowSize {
    pub fn as_f64(&self) -> f64 {
        match self {
            WindowSize::Int(v) => *v as f64,
            WindowSize::Float(v) => *v,
        }
    }

    /// Window length in samples. Floats are rounded.
    pub fn samples(&self) -> Result<usize> {
        let n = match self {
            WindowSize::Int(v) => *v,
            WindowSize::Float(v) => v.round() as i64,
        };
        if n < 1 {
            return Err(ClimatologyError::config(format!(
                "window size must be at least 1, got {}",
                self
            )));
        }
        Ok(n as usize)
    }
}

impl fmt::Display for WindowSize {
    /// Integers plain, floats with two decimals.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowSize::Int(v) => write!(f, "{}", v),
            WindowSize::Float(v) => write!(f, "{:.2}", v),
        }
    }
}

impl FromStr for WindowSize {
    type Err = ClimatologyError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Ok(WindowSize::Int(v));
        }
        s.parse::<f64>()
            .map(WindowSize::Float)
            .map_err(|_| ClimatologyError::config(format!("invalid window size '{}'", s)))
    }
}

/// One entry of a smoothing specification.
#[derive(Debug, Clone, PartialEq)]
pub enum SmoothingStep {
    /// Linear detrend along `time` when true; no-op when false.
    Detrend(bool),
    /// Apply `kernel` along `dim`, which may join several dimensions with `+`.
    Kernel {
        dim: String,
        kernel: Kernel,
        window: WindowSize,
    },
}

impl SmoothingStep {
    /// Individual dimensions of a (possibly composite) key.
    pub fn dims(&self) -> Vec<&str> {
        match self {
            SmoothingStep::Detrend(_) => vec!["time"],
            SmoothingStep::Kernel { dim, .. } => dim.split('+').collect(),
        }
    }
}

impl fmt::Display for SmoothingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmoothingStep::Detrend(true) => f.write_str("detrended"),
            SmoothingStep::Detrend(false) => f.write_str("detrended=false"),
            SmoothingStep::Kernel { dim, kernel, window } => {
                write!(f, "{}:{}:{}", dim, kernel, window)
            }
        }
    }
}

impl FromStr for SmoothingStep {
    type Err = ClimatologyError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "detrended" | "detrended=true" => return Ok(SmoothingStep::Detrend(true)),
            "detrended=false" => return Ok(SmoothingStep::Detrend(false)),
            _ => {}
        }

        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [dim, kernel, window] if !dim.is_empty() => Ok(SmoothingStep::Kernel {
                dim: dim.to_string(),
                kernel: kernel.parse()?,
                window: window.parse()?,
            }),
            _ => Err(ClimatologyError::config(format!(
                "invalid smoothing step '{}', expected 'dim:kernel:window' or 'detrended'",
                s
            ))),
        }
    }
}

/// Ordered smoothing specification.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SmoothingSpec {
    steps: Vec<SmoothingStep>,
}

impl SmoothingSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a kernel step.
    pub fn kernel(mut self, dim: impl Into<String>, kernel: Kernel, window: WindowSize) -> Self {
        self.steps.push(SmoothingStep::Kernel {
            dim: dim.into(),
            kernel,
            window,
        });
        self
    }

    /// Append a detrend flag.
    pub fn detrended(mut self, enabled: bool) -> Self {
        self.steps.push(SmoothingStep::Detrend(enabled));
        self
    }

    pub fn steps(&self) -> &[SmoothingStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl From<Vec<SmoothingStep>> for SmoothingSpec {
    fn from(steps: Vec<SmoothingStep>) -> Self {
        Self { steps }
    }
}

impl FromStr for SmoothingSpec {
    type Err = ClimatologyError;

    /// Comma-separated steps; an empty string is the empty specification.
    fn from_str(s: &str) -> Result<Self> {
        let steps = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }
}

impl fmt::Display for SmoothingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.steps.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

impl TryFrom<String> for SmoothingSpec {
    type Error = ClimatologyError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<SmoothingSpec> for String {
    fn from(spec: SmoothingSpec) -> Self {
        spec.to_string()
    }
}

/// Apply every step of `spec` to `grid`, in order.
pub fn apply_smoothing_spec(grid: Grid, spec: &SmoothingSpec) -> Result<Grid> {
    let mut grid = grid;
    for step in spec.steps() {
        debug!(step = %step, name = grid.name(), "Applying smoothing step");
        grid = match step {
            SmoothingStep::Detrend(false) => grid,
            SmoothingStep::Detrend(true) => detrend(&grid)?,
            SmoothingStep::Kernel { kernel, window, .. } => match kernel {
                Kernel::WindowSmooth => window_smooth(&grid, &step.dims(), window.samples()?, true)?,
                Kernel::LowpassSmooth => lowpass_smooth(&grid, &step.dims(), window.as_f64())?,
                Kernel::SphericalTruncation => {
                    return Err(ClimatologyError::NotImplemented(format!(
                        "spherical truncation ({})",
                        step
                    )))
                }
            },
        };
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_aliases() {
        for alias in ["win", "Window", "WINDOW_SMOOTHING"] {
            assert_eq!(alias.parse::<Kernel>().unwrap(), Kernel::WindowSmooth);
        }
        for alias in ["fft", "lowpass", "fft_smoothing"] {
            assert_eq!(alias.parse::<Kernel>().unwrap(), Kernel::LowpassSmooth);
        }
        for alias in ["trunc", "spherical", "truncation", "windspharm"] {
            assert_eq!(alias.parse::<Kernel>().unwrap(), Kernel::SphericalTruncation);
        }
        assert!("gaussian".parse::<Kernel>().is_err());
    }

    #[test]
    fn test_parse_spec_keeps_order() {
        let spec: SmoothingSpec = "dayofyear:win:15, detrended, lon+lat:fft:0.5".parse().unwrap();
        assert_eq!(spec.steps().len(), 3);
        assert_eq!(spec.steps()[1], SmoothingStep::Detrend(true));
        assert_eq!(spec.steps()[2].dims(), vec!["lon", "lat"]);
        assert_eq!(spec.to_string(), "dayofyear:win:15,detrended,lon+lat:fft:0.50");
    }

    #[test]
    fn test_parse_spec_errors() {
        assert!("".parse::<SmoothingSpec>().unwrap().is_empty());
        assert!("lon:win".parse::<SmoothingSpec>().is_err());
        assert!("lon:blur:3".parse::<SmoothingSpec>().is_err());
        assert!("lon:win:abc".parse::<SmoothingSpec>().is_err());
    }

    #[test]
    fn test_window_size_formatting() {
        assert_eq!(WindowSize::Int(15).to_string(), "15");
        assert_eq!(WindowSize::Float(0.1).to_string(), "0.10");
        assert_eq!("7".parse::<WindowSize>().unwrap(), WindowSize::Int(7));
        assert_eq!("7.0".parse::<WindowSize>().unwrap(), WindowSize::Float(7.0));
        assert!(WindowSize::Int(0).samples().is_err());
    }
}
