//! Zarr V3 reader for labelled grids.

use std::path::Path;
use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};
use serde_json::{Map, Value};
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use super::keys;
use crate::error::{GridError, Result};
use crate::grid::{AuxCoord, Dimension, Grid};

/// Read the grid stored at `path`.
pub fn read_grid(path: &Path) -> Result<Grid> {
    if !path.exists() {
        return Err(GridError::open_failed(format!(
            "{} does not exist",
            path.display()
        )));
    }

    let store = FilesystemStore::new(path).map_err(|e| GridError::open_failed(e.to_string()))?;
    let array = Array::open(Arc::new(store), "/")
        .map_err(|e| GridError::open_failed(format!("{}: {}", path.display(), e)))?;

    let attrs = array.attributes();
    let name = attrs
        .get(keys::NAME)
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let dims: Vec<Dimension> = parse_attr(attrs, keys::COORDS)?
        .ok_or_else(|| GridError::invalid_metadata(format!("missing '{}'", keys::COORDS)))?;
    let aux: Vec<AuxCoord> = parse_attr(attrs, keys::AUX_COORDS)?.unwrap_or_default();
    let user_attrs = match attrs.get(keys::ATTRS) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    let shape: Vec<usize> = array.shape().iter().map(|&n| n as usize).collect();
    let values: Vec<f32> = if shape.iter().product::<usize>() == 0 {
        Vec::new()
    } else {
        let subset = ArraySubset::new_with_start_shape(vec![0; shape.len()], array.shape().to_vec())
            .map_err(|e| GridError::read_failed(e.to_string()))?;
        array
            .retrieve_array_subset_elements(&subset)
            .map_err(|e| GridError::read_failed(e.to_string()))?
    };

    let data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;
    let mut grid = Grid::new(name, dims, data)?.with_attrs(user_attrs);
    grid.restore_aux(aux)?;
    Ok(grid)
}

fn parse_attr<T: serde::de::DeserializeOwned>(
    attrs: &Map<String, Value>,
    key: &str,
) -> Result<Option<T>> {
    attrs
        .get(key)
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|e| GridError::invalid_metadata(format!("'{}': {}", key, e)))
}
