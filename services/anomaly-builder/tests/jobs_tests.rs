//! Tests for jobs files and running them against an on-disk dataset tree.

use std::io::Write;

use anomaly_builder::{load_jobs, parse_jobs, run_jobs};
use climatology::{BatchOrchestrator, ClimatologyKey, ClimatologyStatus, ComputeConfig, DataConfig, Era5Config};
use era5_common::LevelType;
use grid_store::{StoreConfig, ZarrGridStore};
use test_utils::{seasonal_grid, DatasetTree};

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_load_jobs_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
- dataset: ERA5
  level_type: plev
  var: u
  resolution: 6H
  clim_type: dayofyear
  clim_smoothing: "dayofyear:win:15"
  smoothing: "lon+lat:win:5"
- level_type: surf
  var: t2m
  resolution: dailymean
"#
    )
    .unwrap();

    let jobs = load_jobs(file.path()).unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].level_type, LevelType::Plev);
    assert_eq!(jobs[0].clim_type, Some(ClimatologyKey::DayOfYear));
    assert_eq!(jobs[0].smoothing.steps().len(), 1);
    assert_eq!(jobs[1].clim_type, None);
    assert!(jobs[1].smoothing.is_empty());
}

#[test]
fn test_unknown_level_type_rejected() {
    assert!(parse_jobs("- {level_type: sigma, var: u, resolution: 6H}").is_err());
}

#[test]
fn test_missing_jobs_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_jobs(&dir.path().join("jobs.yaml")).is_err());
}

// ============================================================================
// Running
// ============================================================================

#[test]
fn test_run_jobs_builds_then_reuses() {
    let tree = DatasetTree::era5_surface();
    tree.write_yearly(&seasonal_grid("t2m", 2000, 2001, vec![0.0], vec![0.0]));

    let config = Era5Config {
        data: DataConfig {
            root: tree.root().to_path_buf(),
            first_year: 2000,
            last_year: 2001,
            extension: "zarr".to_string(),
        },
        compute: ComputeConfig {
            n_workers: 2,
            ..Default::default()
        },
        store: StoreConfig::default(),
    };
    let orchestrator = BatchOrchestrator::new(&config, ZarrGridStore::default()).unwrap();

    let jobs = parse_jobs(
        r#"
- level_type: surf
  var: t2m
  resolution: dailymean
  clim_type: month
"#,
    )
    .unwrap();

    let first = run_jobs(&orchestrator, &jobs).unwrap();
    assert_eq!(first[0].climatology, ClimatologyStatus::Computed);
    assert_eq!(first[0].written.len(), 2);

    let second = run_jobs(&orchestrator, &jobs).unwrap();
    assert!(second[0].is_noop());
}

#[test]
fn test_run_jobs_stops_at_failure() {
    let tree = DatasetTree::era5_surface();
    let config = Era5Config {
        data: DataConfig {
            root: tree.root().to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    };
    let orchestrator = BatchOrchestrator::new(&config, ZarrGridStore::default()).unwrap();

    // No raw files anywhere
    let jobs = parse_jobs("- {level_type: surf, var: t2m, resolution: dailymean, clim_type: month}").unwrap();
    assert!(run_jobs(&orchestrator, &jobs).is_err());
}
