//! Labelled N-dimensional grids.
//!
//! A [`Grid`] is an `ndarray` array whose axes carry names and coordinate
//! values, plus optional auxiliary coordinates laid along one dimension
//! (for example an `hourofyear` label for every timestamp).

use std::collections::HashSet;

use chrono::NaiveDateTime;
use ndarray::{ArrayD, ArrayViewD, Axis, Zip};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GridError, Result};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Values of a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "lowercase")]
pub enum CoordValues {
    Time(Vec<NaiveDateTime>),
    Float(Vec<f64>),
    Int(Vec<i64>),
    Label(Vec<String>),
}

fn pick<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

impl CoordValues {
    pub fn len(&self) -> usize {
        match self {
            CoordValues::Time(v) => v.len(),
            CoordValues::Float(v) => v.len(),
            CoordValues::Int(v) => v.len(),
            CoordValues::Label(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CoordValues::Time(_) => "time",
            CoordValues::Float(_) => "float",
            CoordValues::Int(_) => "int",
            CoordValues::Label(_) => "label",
        }
    }

    /// Gather the values at `indices` (indices must be in bounds).
    pub fn select(&self, indices: &[usize]) -> Self {
        match self {
            CoordValues::Time(v) => CoordValues::Time(pick(v, indices)),
            CoordValues::Float(v) => CoordValues::Float(pick(v, indices)),
            CoordValues::Int(v) => CoordValues::Int(pick(v, indices)),
            CoordValues::Label(v) => CoordValues::Label(pick(v, indices)),
        }
    }

    /// Concatenate coordinates of the same kind.
    pub fn concat(parts: &[&CoordValues]) -> Result<Self> {
        let first = parts
            .first()
            .ok_or_else(|| GridError::Empty("no coordinates to concatenate".to_string()))?;

        let mut out = (*first).clone();
        for part in &parts[1..] {
            match (&mut out, part) {
                (CoordValues::Time(a), CoordValues::Time(b)) => a.extend_from_slice(b),
                (CoordValues::Float(a), CoordValues::Float(b)) => a.extend_from_slice(b),
                (CoordValues::Int(a), CoordValues::Int(b)) => a.extend_from_slice(b),
                (CoordValues::Label(a), CoordValues::Label(b)) => a.extend_from_slice(b),
                (a, b) => {
                    return Err(GridError::Incompatible(format!(
                        "cannot concatenate {} and {} coordinates",
                        a.kind(),
                        b.kind()
                    )))
                }
            }
        }
        Ok(out)
    }

    pub fn as_times(&self) -> Option<&[NaiveDateTime]> {
        match self {
            CoordValues::Time(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            CoordValues::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            CoordValues::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view of the coordinate. Timestamps become days since the Unix
    /// epoch; labels have no numeric view.
    pub fn to_numeric(&self) -> Option<Vec<f64>> {
        match self {
            CoordValues::Time(v) => Some(
                v.iter()
                    .map(|t| t.and_utc().timestamp() as f64 / SECONDS_PER_DAY)
                    .collect(),
            ),
            CoordValues::Float(v) => Some(v.clone()),
            CoordValues::Int(v) => Some(v.iter().map(|&i| i as f64).collect()),
            CoordValues::Label(_) => None,
        }
    }

    /// Distance between the first two values, in coordinate units.
    pub fn spacing(&self) -> Option<f64> {
        let values = self.to_numeric()?;
        if values.len() < 2 {
            return None;
        }
        Some(values[1] - values[0])
    }

    /// Indices that would sort the coordinate (stable).
    pub fn argsort(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        match self {
            CoordValues::Time(v) => order.sort_by_key(|&i| v[i]),
            CoordValues::Float(v) => order.sort_by(|&a, &b| v[a].total_cmp(&v[b])),
            CoordValues::Int(v) => order.sort_by_key(|&i| v[i]),
            CoordValues::Label(v) => order.sort_by(|&a, &b| v[a].cmp(&v[b])),
        }
        order
    }
}

/// A named dimension and its coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub coord: CoordValues,
}

impl Dimension {
    pub fn new(name: impl Into<String>, coord: CoordValues) -> Self {
        Self {
            name: name.into(),
            coord,
        }
    }

    pub fn len(&self) -> usize {
        self.coord.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coord.is_empty()
    }
}

/// A coordinate that is not a dimension of its own but is laid along one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxCoord {
    pub name: String,
    pub dim: String,
    pub values: CoordValues,
}

/// A labelled array of `f32` values.
#[derive(Debug, Clone)]
pub struct Grid {
    name: String,
    dims: Vec<Dimension>,
    aux: Vec<AuxCoord>,
    data: ArrayD<f32>,
    attrs: Map<String, Value>,
}

fn validate_layout(dims: &[Dimension], shape: &[usize]) -> Result<()> {
    if dims.len() != shape.len() {
        return Err(GridError::shape_mismatch(format!(
            "{} dimensions for an array of rank {}",
            dims.len(),
            shape.len()
        )));
    }

    let mut seen = HashSet::new();
    for (dim, &len) in dims.iter().zip(shape) {
        if !seen.insert(dim.name.as_str()) {
            return Err(GridError::DuplicateDimension(dim.name.clone()));
        }
        if dim.len() != len {
            return Err(GridError::shape_mismatch(format!(
                "coordinate '{}' has {} values but axis has length {}",
                dim.name,
                dim.len(),
                len
            )));
        }
    }
    Ok(())
}

impl Grid {
    /// Create a grid, checking that coordinates match the array shape.
    pub fn new(name: impl Into<String>, dims: Vec<Dimension>, data: ArrayD<f32>) -> Result<Self> {
        validate_layout(&dims, data.shape())?;
        Ok(Self {
            name: name.into(),
            dims,
            aux: Vec::new(),
            data,
            attrs: Map::new(),
        })
    }

    /// Builder-style attribute assignment.
    pub fn with_attrs(mut self, attrs: Map<String, Value>) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn dim_names(&self) -> Vec<&str> {
        self.dims.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.iter().any(|d| d.name == dim)
    }

    /// Axis index of a named dimension.
    pub fn axis_of(&self, dim: &str) -> Result<usize> {
        self.dims
            .iter()
            .position(|d| d.name == dim)
            .ok_or_else(|| GridError::UnknownDimension(dim.to_string()))
    }

    pub fn len_of(&self, dim: &str) -> Result<usize> {
        Ok(self.data.len_of(Axis(self.axis_of(dim)?)))
    }

    /// Coordinate of a dimension, or of an auxiliary coordinate with that name.
    pub fn coord(&self, name: &str) -> Result<&CoordValues> {
        if let Some(dim) = self.dims.iter().find(|d| d.name == name) {
            return Ok(&dim.coord);
        }
        self.aux(name)
            .map(|a| &a.values)
            .ok_or_else(|| GridError::UnknownDimension(name.to_string()))
    }

    /// The `time` coordinate as timestamps.
    pub fn times(&self) -> Result<&[NaiveDateTime]> {
        self.coord("time")?
            .as_times()
            .ok_or(GridError::CoordinateKind {
                dim: "time".to_string(),
                expected: "time",
            })
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.data
    }

    /// Size of the values in bytes.
    pub fn nbytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    pub fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.attrs
    }

    pub fn aux_coords(&self) -> &[AuxCoord] {
        &self.aux
    }

    pub fn aux(&self, name: &str) -> Option<&AuxCoord> {
        self.aux.iter().find(|a| a.name == name)
    }

    /// Attach (or replace) an auxiliary coordinate along `dim`.
    pub fn assign_aux(
        &mut self,
        name: impl Into<String>,
        dim: &str,
        values: CoordValues,
    ) -> Result<()> {
        let name = name.into();
        let len = self.len_of(dim)?;
        if values.len() != len {
            return Err(GridError::shape_mismatch(format!(
                "auxiliary coordinate '{}' has {} values but '{}' has length {}",
                name,
                values.len(),
                dim,
                len
            )));
        }
        if self.has_dim(&name) {
            return Err(GridError::DuplicateDimension(name));
        }

        self.aux.retain(|a| a.name != name);
        self.aux.push(AuxCoord {
            name,
            dim: dim.to_string(),
            values,
        });
        Ok(())
    }

    pub fn drop_aux(&mut self, name: &str) -> Option<AuxCoord> {
        let pos = self.aux.iter().position(|a| a.name == name)?;
        Some(self.aux.remove(pos))
    }

    /// Attach auxiliary coordinates, checking each against its dimension.
    pub fn restore_aux(&mut self, aux: Vec<AuxCoord>) -> Result<()> {
        for a in aux {
            self.assign_aux(a.name, &a.dim, a.values)?;
        }
        Ok(())
    }

    /// Same labels, new values.
    pub fn with_data(&self, data: ArrayD<f32>) -> Result<Grid> {
        if data.shape() != self.data.shape() {
            return Err(GridError::shape_mismatch(format!(
                "expected shape {:?}, got {:?}",
                self.data.shape(),
                data.shape()
            )));
        }
        Ok(Grid {
            name: self.name.clone(),
            dims: self.dims.clone(),
            aux: self.aux.clone(),
            data,
            attrs: self.attrs.clone(),
        })
    }

    /// Select positions along a dimension.
    pub fn isel(&self, dim: &str, indices: &[usize]) -> Result<Grid> {
        let ax = self.axis_of(dim)?;
        let len = self.data.len_of(Axis(ax));
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(GridError::shape_mismatch(format!(
                "index {} out of bounds for '{}' of length {}",
                bad, dim, len
            )));
        }

        let data = self.data.select(Axis(ax), indices);
        let mut dims = self.dims.clone();
        dims[ax].coord = self.dims[ax].coord.select(indices);

        let aux = self
            .aux
            .iter()
            .map(|a| {
                if a.dim == dim {
                    AuxCoord {
                        name: a.name.clone(),
                        dim: a.dim.clone(),
                        values: a.values.select(indices),
                    }
                } else {
                    a.clone()
                }
            })
            .collect();

        Ok(Grid {
            name: self.name.clone(),
            dims,
            aux,
            data,
            attrs: self.attrs.clone(),
        })
    }

    /// Keep the positions along `dim` for which `keep` returns true.
    pub fn filter(&self, dim: &str, keep: impl Fn(usize) -> bool) -> Result<Grid> {
        let indices: Vec<usize> = (0..self.len_of(dim)?).filter(|&i| keep(i)).collect();
        self.isel(dim, &indices)
    }

    /// Keep the timestamps for which `keep` returns true.
    pub fn select_times(&self, keep: impl Fn(&NaiveDateTime) -> bool) -> Result<Grid> {
        let times = self.times()?;
        let indices: Vec<usize> = times
            .iter()
            .enumerate()
            .filter(|(_, t)| keep(t))
            .map(|(i, _)| i)
            .collect();
        self.isel("time", &indices)
    }

    /// Rename a dimension if present. Returns whether anything changed.
    pub fn rename_dim(&mut self, old: &str, new: &str) -> Result<bool> {
        if !self.has_dim(old) {
            return Ok(false);
        }
        if self.has_dim(new) {
            return Err(GridError::DuplicateDimension(new.to_string()));
        }
        for d in self.dims.iter_mut().filter(|d| d.name == old) {
            d.name = new.to_string();
        }
        for a in self.aux.iter_mut().filter(|a| a.dim == old) {
            a.dim = new.to_string();
        }
        Ok(true)
    }

    /// Drop a length-one dimension (and any auxiliary coordinate along it).
    pub fn squeeze_dim(self, dim: &str) -> Result<Grid> {
        let ax = self.axis_of(dim)?;
        let len = self.data.len_of(Axis(ax));
        if len != 1 {
            return Err(GridError::shape_mismatch(format!(
                "cannot squeeze '{}' of length {}",
                dim, len
            )));
        }

        let Grid {
            name,
            mut dims,
            aux,
            data,
            attrs,
        } = self;
        dims.remove(ax);
        let aux = aux.into_iter().filter(|a| a.dim != dim).collect();
        Ok(Grid {
            name,
            dims,
            aux,
            data: data.index_axis_move(Axis(ax), 0),
            attrs,
        })
    }

    /// Reorder along `dim` so that its coordinate is ascending.
    pub fn sort_by(&self, dim: &str) -> Result<Grid> {
        let order = self.coord_of_dim(dim)?.argsort();
        self.isel(dim, &order)
    }

    pub fn reverse(&self, dim: &str) -> Result<Grid> {
        let order: Vec<usize> = (0..self.len_of(dim)?).rev().collect();
        self.isel(dim, &order)
    }

    /// Extend `dim` by `pad` positions on each side, taking values from the
    /// opposite end (periodic boundary).
    pub fn pad_wrap(&self, dim: &str, pad: usize) -> Result<Grid> {
        let len = self.len_of(dim)? as isize;
        if len == 0 {
            return Err(GridError::Empty(format!("cannot wrap empty dimension '{}'", dim)));
        }
        let pad = pad as isize;
        let indices: Vec<usize> = (-pad..len + pad)
            .map(|i| i.rem_euclid(len) as usize)
            .collect();
        self.isel(dim, &indices)
    }

    /// Concatenate grids along an existing dimension. Every other dimension
    /// must carry identical coordinates.
    pub fn concat(grids: &[Grid], dim: &str) -> Result<Grid> {
        let first = grids
            .first()
            .ok_or_else(|| GridError::Empty("no grids to concatenate".to_string()))?;
        let ax = first.axis_of(dim)?;

        for other in &grids[1..] {
            if other.dim_names() != first.dim_names() {
                return Err(GridError::Incompatible(format!(
                    "dimension mismatch {:?} vs {:?}",
                    first.dim_names(),
                    other.dim_names()
                )));
            }
            for (a, b) in first.dims.iter().zip(&other.dims) {
                if a.name != dim && a.coord != b.coord {
                    return Err(GridError::Incompatible(format!(
                        "coordinate '{}' differs between grids",
                        a.name
                    )));
                }
            }
        }

        let views: Vec<ArrayViewD<f32>> = grids.iter().map(|g| g.data.view()).collect();
        let data = ndarray::concatenate(Axis(ax), &views)?;

        let mut dims = first.dims.clone();
        let coords: Vec<&CoordValues> = grids.iter().map(|g| &g.dims[ax].coord).collect();
        dims[ax].coord = CoordValues::concat(&coords)?;

        let mut aux = Vec::new();
        for a in &first.aux {
            if a.dim != dim {
                aux.push(a.clone());
                continue;
            }
            let parts: Option<Vec<&CoordValues>> = grids
                .iter()
                .map(|g| g.aux(&a.name).map(|x| &x.values))
                .collect();
            if let Some(parts) = parts {
                aux.push(AuxCoord {
                    name: a.name.clone(),
                    dim: a.dim.clone(),
                    values: CoordValues::concat(&parts)?,
                });
            }
        }

        Ok(Grid {
            name: first.name.clone(),
            dims,
            aux,
            data,
            attrs: first.attrs.clone(),
        })
    }

    /// Run `f` over every 1-D lane along `dim`, in parallel on the current
    /// rayon pool. Lanes are handed over as `f64` buffers.
    pub fn apply_along<F>(&mut self, dim: &str, f: F) -> Result<()>
    where
        F: Fn(&mut [f64]) + Send + Sync,
    {
        let ax = self.axis_of(dim)?;
        Zip::from(self.data.lanes_mut(Axis(ax))).par_for_each(|mut lane| {
            let mut buf: Vec<f64> = lane.iter().map(|&v| v as f64).collect();
            f(&mut buf);
            for (dst, src) in lane.iter_mut().zip(buf) {
                *dst = src as f32;
            }
        });
        Ok(())
    }

    fn coord_of_dim(&self, dim: &str) -> Result<&CoordValues> {
        Ok(&self.dims[self.axis_of(dim)?].coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::{Array, IxDyn};

    fn sample() -> Grid {
        let data = Array::from_shape_vec(IxDyn(&[3, 2]), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let times = (1..=3)
            .map(|d| {
                NaiveDate::from_ymd_opt(2000, 1, d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            })
            .collect();
        Grid::new(
            "t",
            vec![
                Dimension::new("time", CoordValues::Time(times)),
                Dimension::new("lon", CoordValues::Float(vec![0.0, 180.0])),
            ],
            data,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_bad_shape() {
        let data = ArrayD::<f32>::zeros(IxDyn(&[2, 2]));
        let result = Grid::new(
            "x",
            vec![
                Dimension::new("a", CoordValues::Int(vec![0, 1, 2])),
                Dimension::new("b", CoordValues::Int(vec![0, 1])),
            ],
            data,
        );
        assert!(matches!(result, Err(GridError::ShapeMismatch(_))));
    }

    #[test]
    fn test_new_rejects_duplicate_dims() {
        let data = ArrayD::<f32>::zeros(IxDyn(&[1, 1]));
        let result = Grid::new(
            "x",
            vec![
                Dimension::new("a", CoordValues::Int(vec![0])),
                Dimension::new("a", CoordValues::Int(vec![0])),
            ],
            data,
        );
        assert!(matches!(result, Err(GridError::DuplicateDimension(_))));
    }

    #[test]
    fn test_isel_and_aux() {
        let mut grid = sample();
        grid.assign_aux("doy", "time", CoordValues::Int(vec![1, 2, 3]))
            .unwrap();
        let sub = grid.isel("time", &[2, 0]).unwrap();
        assert_eq!(sub.shape(), &[2, 2]);
        assert_eq!(sub.data()[[0, 1]], 5.0);
        assert_eq!(sub.aux("doy").unwrap().values, CoordValues::Int(vec![3, 1]));
        assert!(grid.isel("time", &[3]).is_err());
    }

    #[test]
    fn test_pad_wrap() {
        let grid = sample();
        let padded = grid.pad_wrap("lon", 1).unwrap();
        assert_eq!(padded.len_of("lon").unwrap(), 4);
        let row: Vec<f32> = padded.data().index_axis(Axis(0), 0).iter().copied().collect();
        assert_eq!(row, vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_concat_and_sort() {
        let grid = sample();
        let a = grid.isel("time", &[2]).unwrap();
        let b = grid.isel("time", &[0, 1]).unwrap();
        let joined = Grid::concat(&[a, b], "time").unwrap();
        assert_eq!(joined.data()[[0, 0]], 4.0);

        let sorted = joined.sort_by("time").unwrap();
        assert_eq!(sorted.data(), grid.data());
        assert_eq!(sorted.times().unwrap(), grid.times().unwrap());
    }

    #[test]
    fn test_concat_rejects_mismatched_coords() {
        let grid = sample();
        let mut other = grid.clone();
        other.dims[1].coord = CoordValues::Float(vec![0.0, 90.0]);
        assert!(Grid::concat(&[grid, other], "time").is_err());
    }

    #[test]
    fn test_squeeze_and_rename() {
        let mut grid = sample().isel("time", &[1]).unwrap();
        assert!(grid.rename_dim("lon", "longitude").unwrap());
        assert!(!grid.rename_dim("lat", "latitude").unwrap());
        let squeezed = grid.squeeze_dim("time").unwrap();
        assert_eq!(squeezed.dim_names(), vec!["longitude"]);
        assert_eq!(squeezed.shape(), &[2]);
    }

    #[test]
    fn test_apply_along() {
        let mut grid = sample();
        grid.apply_along("time", |lane| {
            let total: f64 = lane.iter().sum();
            lane.iter_mut().for_each(|v| *v = total);
        })
        .unwrap();
        assert_eq!(grid.data()[[0, 0]], 6.0);
        assert_eq!(grid.data()[[2, 1]], 9.0);
    }

    #[test]
    fn test_time_spacing_in_days() {
        let grid = sample();
        assert_eq!(grid.coord("time").unwrap().spacing(), Some(1.0));
    }
}
