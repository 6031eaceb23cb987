//! Grouped mean and standard deviation over `time`.
//!
//! The time axis is cut into batches. Batches covering the same set of key
//! values form a cohort: with periodic keys and contiguous batches, most
//! cohorts touch few keys, so partial results stay small. Every batch is
//! reduced in parallel to per-key partial moments (count, mean, M2), partials
//! are merged within each cohort and then across cohorts.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::ops::Range;

use grid_store::{CoordValues, Dimension, Grid, GridError};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::key::ClimatologyKey;

/// Statistic extracted from grouped moments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Mean,
    /// Population standard deviation (ddof = 0).
    Std,
}

/// Running moments for every cell of one group.
#[derive(Debug, Clone)]
pub struct CellMoments {
    count: Vec<f64>,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl CellMoments {
    pub fn new(cells: usize) -> Self {
        Self {
            count: vec![0.0; cells],
            mean: vec![0.0; cells],
            m2: vec![0.0; cells],
        }
    }

    /// Add one observation per cell; NaN is skipped.
    pub fn push(&mut self, values: ArrayViewD<f32>) {
        for (i, &v) in values.iter().enumerate() {
            if v.is_nan() {
                continue;
            }
            let v = v as f64;
            self.count[i] += 1.0;
            let delta = v - self.mean[i];
            self.mean[i] += delta / self.count[i];
            self.m2[i] += delta * (v - self.mean[i]);
        }
    }

    /// Combine with moments computed over disjoint observations.
    pub fn merge(&mut self, other: &CellMoments) {
        for i in 0..self.count.len() {
            let (na, nb) = (self.count[i], other.count[i]);
            if nb == 0.0 {
                continue;
            }
            if na == 0.0 {
                self.count[i] = nb;
                self.mean[i] = other.mean[i];
                self.m2[i] = other.m2[i];
                continue;
            }
            let n = na + nb;
            let delta = other.mean[i] - self.mean[i];
            self.mean[i] += delta * nb / n;
            self.m2[i] += other.m2[i] + delta * delta * na * nb / n;
            self.count[i] = n;
        }
    }

    fn statistic(&self, stat: Statistic) -> impl Iterator<Item = f32> + '_ {
        (0..self.count.len()).map(move |i| {
            let n = self.count[i];
            if n == 0.0 {
                return f32::NAN;
            }
            match stat {
                Statistic::Mean => self.mean[i] as f32,
                Statistic::Std => (self.m2[i] / n).sqrt() as f32,
            }
        })
    }
}

type Partials = BTreeMap<i64, CellMoments>;

fn merge_partials(mut a: Partials, b: Partials) -> Partials {
    for (key, moments) in b {
        match a.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(moments);
            }
            Entry::Occupied(mut slot) => slot.get_mut().merge(&moments),
        }
    }
    a
}

/// Per-key moments of a grid, with the labels needed to rebuild a grid.
#[derive(Debug, Clone)]
pub struct GroupedMoments {
    name: String,
    dims: Vec<Dimension>,
    time_axis: usize,
    attrs: Map<String, Value>,
    groups: Partials,
}

impl GroupedMoments {
    /// Reduce `grid` grouped by `keys` (one per time step), at most
    /// `batch_len` time steps per batch. Runs on the current rayon pool.
    pub fn compute(grid: &Grid, keys: &[i64], batch_len: usize) -> Result<Self> {
        let time_axis = grid.axis_of("time")?;
        let nt = grid.len_of("time")?;
        if keys.len() != nt {
            return Err(GridError::shape_mismatch(format!(
                "{} keys for {} time steps",
                keys.len(),
                nt
            ))
            .into());
        }

        let cells = grid.data().len() / nt.max(1);
        let cohorts = plan_cohorts(keys, batch_len.max(1));
        debug!(
            name = grid.name(),
            time_steps = nt,
            batch_len,
            cohorts = cohorts.len(),
            "Grouped reduction"
        );

        let data = grid.data();
        let partials: Vec<Partials> = cohorts
            .par_iter()
            .map(|batches| {
                batches
                    .par_iter()
                    .map(|range| reduce_batch(data, time_axis, keys, range.clone(), cells))
                    .reduce(Partials::new, merge_partials)
            })
            .collect();
        let groups = partials.into_iter().fold(Partials::new(), merge_partials);

        let mut dims = grid.dims().to_vec();
        dims[time_axis].coord = CoordValues::Int(Vec::new());

        Ok(Self {
            name: grid.name().to_string(),
            dims,
            time_axis,
            attrs: grid.attrs().clone(),
            groups,
        })
    }

    /// Fold in moments computed from other observations of the same cells.
    pub fn merge(&mut self, other: GroupedMoments) -> Result<()> {
        let same_cells = self.dims.len() == other.dims.len()
            && self
                .dims
                .iter()
                .zip(&other.dims)
                .enumerate()
                .all(|(i, (a, b))| a.name == b.name && (i == self.time_axis || a == b));
        if !same_cells {
            return Err(GridError::Incompatible(format!(
                "cannot merge moments of '{}' over different grids",
                self.name
            ))
            .into());
        }

        let groups = std::mem::take(&mut self.groups);
        self.groups = merge_partials(groups, other.groups);
        Ok(())
    }

    /// Sorted key values with at least one observation.
    pub fn keys(&self) -> Vec<i64> {
        self.groups.keys().copied().collect()
    }

    /// Build the grid of `stat`, with the key dimension in place of `time`.
    pub fn to_grid(&self, key: ClimatologyKey, stat: Statistic) -> Result<Grid> {
        let cell_shape: Vec<usize> = self
            .dims
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.time_axis)
            .map(|(_, d)| d.len())
            .collect();

        let mut values = Vec::with_capacity(self.groups.len() * cell_shape.iter().product::<usize>());
        for moments in self.groups.values() {
            values.extend(moments.statistic(stat));
        }

        let mut shape = vec![self.groups.len()];
        shape.extend(&cell_shape);
        let stacked = ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(GridError::from)?;

        let ndim = shape.len();
        let order: Vec<usize> = (1..=self.time_axis)
            .chain(std::iter::once(0))
            .chain(self.time_axis + 1..ndim)
            .collect();
        let data = stacked
            .permuted_axes(IxDyn(&order))
            .as_standard_layout()
            .into_owned();

        let mut dims = self.dims.clone();
        dims[self.time_axis] = Dimension::new(key.as_str(), CoordValues::Int(self.keys()));

        Ok(Grid::new(self.name.clone(), dims, data)?.with_attrs(self.attrs.clone()))
    }
}

/// Group contiguous batches by the set of keys they cover.
fn plan_cohorts(keys: &[i64], batch_len: usize) -> Vec<Vec<Range<usize>>> {
    let mut cohorts: BTreeMap<Vec<i64>, Vec<Range<usize>>> = BTreeMap::new();
    let mut start = 0;
    while start < keys.len() {
        let end = (start + batch_len).min(keys.len());
        let mut set = keys[start..end].to_vec();
        set.sort_unstable();
        set.dedup();
        cohorts.entry(set).or_default().push(start..end);
        start = end;
    }
    cohorts.into_values().collect()
}

fn reduce_batch(
    data: &ArrayD<f32>,
    time_axis: usize,
    keys: &[i64],
    range: Range<usize>,
    cells: usize,
) -> Partials {
    let mut partial = Partials::new();
    for t in range {
        partial
            .entry(keys[t])
            .or_insert_with(|| CellMoments::new(cells))
            .push(data.index_axis(Axis(time_axis), t));
    }
    partial
}
