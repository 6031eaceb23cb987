//! Opening analysis-ready grids from the artifact tree.

use std::path::Path;

use era5_common::{BoundingBox, LevelType, Period, SeasonSelector};
use grid_store::select::{
    canonicalize_dims, drop_expver, ensure_lat_ascending, extract_levels, select_bbox,
    select_season, select_years,
};
use grid_store::{Grid, GridStore, LevelSelection};
use tracing::{debug, warn};

use crate::config::Era5Config;
use crate::error::Result;
use crate::locate::{FileLocator, Layout};
use crate::path::{DatasetId, PathCodec, ProcessingSpec};
use crate::smoothing::apply_smoothing_spec;

/// What to open and how to cut it.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub id: DatasetId,
    pub processing: ProcessingSpec,
    pub period: Period,
    pub season: Option<SeasonSelector>,
    pub bbox: Option<BoundingBox>,
    pub levels: LevelSelection,
}

impl OpenRequest {
    pub fn new(id: DatasetId) -> Self {
        Self {
            id,
            processing: ProcessingSpec::default(),
            period: Period::All,
            season: None,
            bbox: None,
            levels: LevelSelection::All,
        }
    }

    pub fn processing(mut self, processing: ProcessingSpec) -> Self {
        self.processing = processing;
        self
    }

    pub fn period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    pub fn season(mut self, season: SeasonSelector) -> Self {
        self.season = Some(season);
        self
    }

    pub fn bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn levels(mut self, levels: LevelSelection) -> Self {
        self.levels = levels;
        self
    }
}

/// Bring a freshly read grid into canonical form: `lon`/`lat`/`lev` names,
/// no `expver`, no vertical axis for level types without levels, and
/// ascending latitudes.
pub fn prepare(grid: Grid, level_type: LevelType) -> Result<Grid> {
    let mut grid = grid;
    canonicalize_dims(&mut grid)?;
    let mut grid = drop_expver(grid)?;

    if !level_type.has_levels() && grid.has_dim("lev") {
        if grid.len_of("lev")? == 1 {
            grid = grid.squeeze_dim("lev")?;
        } else {
            warn!(
                name = grid.name(),
                level_type = level_type.as_str(),
                "Keeping multi-level lev dimension"
            );
        }
    }

    Ok(ensure_lat_ascending(grid)?)
}

/// Read one artifact file and prepare it.
pub fn load_prepared(store: &dyn GridStore, path: &Path, id: &DatasetId) -> Result<Grid> {
    let mut grid = prepare(store.read(path)?, id.level_type)?;
    grid.set_name(id.var.clone());
    Ok(grid)
}

/// Open the grid described by `request`.
///
/// Steps: resolve the read directory, detect its layout, read the matching
/// files joined along time, canonicalise, cut to the bounding box, years,
/// season and levels, and smooth on the fly when no climatology type is
/// requested.
pub fn open_grid(config: &Era5Config, store: &dyn GridStore, request: &OpenRequest) -> Result<Grid> {
    config.check_store(store)?;
    let codec = PathCodec::new(&config.data.root);
    let dir = codec.resolve_read(&request.id, &request.processing)?;

    let locator = FileLocator::from_config(&config.data);
    let layout = locator.detect_layout(&dir)?;
    let files = locator.files_for(layout, &dir, &request.period, request.season.as_ref());
    debug!(
        dir = %dir.display(),
        layout = ?layout,
        files = files.len(),
        "Opening dataset"
    );

    let mut grid = prepare(store.read_many(&files)?, request.id.level_type)?;
    grid.set_name(request.id.var.clone());

    if let Some(bbox) = &request.bbox {
        grid = select_bbox(&grid, bbox)?;
    }
    if layout == Layout::SingleFile && request.period != Period::All {
        grid = select_years(&grid, &request.period.years(locator.years()))?;
    }
    if let Some(season) = &request.season {
        grid = select_season(&grid, season)?;
    }
    if grid.has_dim("lev") {
        grid = extract_levels(&grid, &request.levels)?;
    }

    // Raw data read in place of a missing smoothed directory
    let from_raw = dir == request.id.raw_dir(codec.root());
    if request.processing.clim_type.is_some() || !from_raw {
        return Ok(grid);
    }
    apply_smoothing_spec(grid, &request.processing.smoothing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_store::{CoordValues, Dimension};
    use ndarray::{Array, IxDyn};

    #[test]
    fn test_prepare_canonicalizes() {
        let grid = Grid::new(
            "var",
            vec![
                Dimension::new("level", CoordValues::Float(vec![500.0])),
                Dimension::new("latitude", CoordValues::Float(vec![10.0, 0.0])),
            ],
            Array::from_shape_vec(IxDyn(&[1, 2]), vec![1.0, 2.0]).unwrap(),
        )
        .unwrap();

        let out = prepare(grid.clone(), LevelType::Surf).unwrap();
        assert_eq!(out.dim_names(), vec!["lat"]);
        assert_eq!(out.coord("lat").unwrap(), &CoordValues::Float(vec![0.0, 10.0]));
        assert_eq!(out.data().as_slice().unwrap(), &[2.0, 1.0]);

        let out = prepare(grid, LevelType::Plev).unwrap();
        assert_eq!(out.dim_names(), vec!["lev", "lat"]);
    }
}
