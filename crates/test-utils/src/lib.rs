//! Shared test utilities for the ERA5 anomaly workspace.
//!
//! - Synthetic daily grids with a known seasonal cycle
//! - Temporary dataset trees written in yearly, monthly or single-file layout
//! - Approximate float assertions
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! ```ignore
//! use test_utils::{seasonal_grid, DatasetTree};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff.is_nan() || diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that every value of a grid is finite.
#[macro_export]
macro_rules! assert_all_finite {
    ($grid:expr) => {{
        let grid = &$grid;
        if let Some((i, v)) = grid.data().iter().enumerate().find(|(_, v)| !v.is_finite()) {
            panic!(
                "assertion failed: grid '{}' has non-finite value {:?} at flat index {}",
                grid.name(),
                v,
                i
            );
        }
    }};
}
