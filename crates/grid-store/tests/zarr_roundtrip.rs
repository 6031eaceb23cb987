//! Integration test: write labelled grids to Zarr V3 and read them back.

use chrono::{NaiveDate, NaiveDateTime};
use grid_store::{
    CoordValues, Dimension, Grid, GridStore, StoreConfig, ZarrCompression, ZarrGridStore,
};
use ndarray::{ArrayD, IxDyn};
use serde_json::json;

fn day(year: i32, month: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Value at (t, lat, lon) = t * 100 + lat * 10 + lon.
fn create_test_grid(times: Vec<NaiveDateTime>) -> Grid {
    let nt = times.len();
    let data = ArrayD::from_shape_fn(IxDyn(&[nt, 3, 4]), |ix| {
        (ix[0] * 100 + ix[1] * 10 + ix[2]) as f32
    });
    let mut grid = Grid::new(
        "t2m",
        vec![
            Dimension::new("time", CoordValues::Time(times)),
            Dimension::new("lat", CoordValues::Float(vec![40.0, 50.0, 60.0])),
            Dimension::new("lon", CoordValues::Float(vec![0.0, 90.0, 180.0, 270.0])),
        ],
        data,
    )
    .unwrap();
    grid.attrs_mut().insert("units".to_string(), json!("K"));
    grid
}

#[test]
fn test_zarr_roundtrip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("2000.zarr");
    let store = ZarrGridStore::default();

    let mut grid = create_test_grid((1..=5).map(|d| day(2000, 1, d)).collect());
    grid.data_mut()[[2, 1, 1]] = f32::NAN;
    grid.assign_aux("dayofyear", "time", CoordValues::Int(vec![1, 2, 3, 4, 5]))
        .unwrap();

    store.write(&grid, &path).unwrap();
    assert!(store.exists(&path));

    let back = store.read(&path).unwrap();
    assert_eq!(back.name(), "t2m");
    assert_eq!(back.dims(), grid.dims());
    assert_eq!(back.attrs().get("units"), Some(&json!("K")));
    assert_eq!(
        back.aux("dayofyear").unwrap().values,
        CoordValues::Int(vec![1, 2, 3, 4, 5])
    );
    assert!(back.data()[[2, 1, 1]].is_nan());
    assert_eq!(back.data()[[4, 2, 3]], 423.0);
}

#[test]
fn test_uncompressed_roundtrip_with_small_chunks() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("full.zarr");
    let config = StoreConfig {
        time_chunk: 2,
        compression: ZarrCompression::None,
        ..StoreConfig::default()
    };
    let store = ZarrGridStore::new(config);

    let grid = create_test_grid((1..=7).map(|d| day(2001, 3, d)).collect());
    store.write(&grid, &path).unwrap();

    let back = store.read(&path).unwrap();
    assert_eq!(back.data(), grid.data());
}

#[test]
fn test_read_many_sorts_by_time() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ZarrGridStore::default();

    let late = create_test_grid(vec![day(2001, 1, 1), day(2001, 1, 2)]);
    let early = create_test_grid(vec![day(2000, 1, 1)]);
    let late_path = temp_dir.path().join("2001.zarr");
    let early_path = temp_dir.path().join("2000.zarr");
    store.write(&late, &late_path).unwrap();
    store.write(&early, &early_path).unwrap();

    let joined = store.read_many(&[late_path, early_path]).unwrap();
    assert_eq!(
        joined.times().unwrap(),
        &[day(2000, 1, 1), day(2001, 1, 1), day(2001, 1, 2)]
    );
    assert_eq!(joined.data()[[0, 0, 1]], 1.0);
    assert_eq!(joined.data()[[2, 0, 1]], 101.0);
}

#[test]
fn test_overwrite_replaces_store() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("clim.zarr");
    let store = ZarrGridStore::default();

    store
        .write(&create_test_grid(vec![day(2000, 1, 1)]), &path)
        .unwrap();
    let replacement = create_test_grid(vec![day(2000, 1, 1), day(2000, 1, 2)]);
    store.write(&replacement, &path).unwrap();

    assert_eq!(store.read(&path).unwrap().shape(), &[2, 3, 4]);
    let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains("partial"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_write_sweeps_stale_staging_dirs() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("2000.zarr");
    // Beyond the kernel pid limit, so never a running process
    let stale = temp_dir.path().join(".2000.zarr.partial-999999999");
    let other = temp_dir.path().join(".2001.zarr.partial-999999999");
    std::fs::create_dir_all(stale.join("c")).unwrap();
    std::fs::create_dir_all(&other).unwrap();

    let store = ZarrGridStore::default();
    store
        .write(&create_test_grid(vec![day(2000, 1, 1)]), &path)
        .unwrap();

    assert!(store.exists(&path));
    assert!(!stale.exists());
    // Only staging dirs of the artifact being written are touched
    assert!(other.exists());

    let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".2000.zarr.partial-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_read_missing_store() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ZarrGridStore::default();
    assert!(store.read(&temp_dir.path().join("nope.zarr")).is_err());
}
