//! Collections of co-indexed grids.

use crate::error::{GridError, Result};
use crate::grid::Grid;

/// Several variables sharing one time axis, addressed by name.
#[derive(Debug, Clone, Default)]
pub struct GridBundle {
    grids: Vec<Grid>,
}

impl GridBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable. Its `time` coordinate must match the variables already
    /// present, and its name must be new.
    pub fn insert(&mut self, grid: Grid) -> Result<()> {
        if self.get(grid.name()).is_some() {
            return Err(GridError::DuplicateDimension(grid.name().to_string()));
        }
        if let Some(first) = self.grids.first() {
            if first.has_dim("time") && first.coord("time")? != grid.coord("time")? {
                return Err(GridError::Incompatible(format!(
                    "variable '{}' does not share the time axis of '{}'",
                    grid.name(),
                    first.name()
                )));
            }
        }
        self.grids.push(grid);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Grid> {
        self.grids.iter().find(|g| g.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.grids.iter().map(|g| g.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Grid> {
        self.grids.iter()
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}

impl TryFrom<Vec<Grid>> for GridBundle {
    type Error = GridError;

    fn try_from(grids: Vec<Grid>) -> Result<Self> {
        let mut bundle = GridBundle::new();
        for grid in grids {
            bundle.insert(grid)?;
        }
        Ok(bundle)
    }
}

impl IntoIterator for GridBundle {
    type Item = Grid;
    type IntoIter = std::vec::IntoIter<Grid>;

    fn into_iter(self) -> Self::IntoIter {
        self.grids.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CoordValues, Dimension};
    use ndarray::{ArrayD, IxDyn};

    fn grid(name: &str, times: Vec<i64>) -> Grid {
        let n = times.len();
        Grid::new(
            name,
            vec![Dimension::new("time", CoordValues::Int(times))],
            ArrayD::zeros(IxDyn(&[n])),
        )
        .unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let bundle = GridBundle::try_from(vec![grid("u", vec![0, 1]), grid("v", vec![0, 1])]).unwrap();
        assert_eq!(bundle.names(), vec!["u", "v"]);
        assert!(bundle.get("v").is_some());
        assert!(bundle.get("w").is_none());
    }

    #[test]
    fn test_rejects_mismatched_time() {
        let mut bundle = GridBundle::new();
        bundle.insert(grid("u", vec![0, 1])).unwrap();
        assert!(bundle.insert(grid("v", vec![0, 2])).is_err());
        assert!(bundle.insert(grid("u", vec![0, 1])).is_err());
    }
}
