//! Tests for smoothing-spec encoding and artifact path resolution.

use climatology::{
    encode, ClimatologyError, ClimatologyKey, DatasetId, Kernel, PathCodec, ProcessingSpec,
    SmoothingSpec, WindowSize,
};
use era5_common::LevelType;

fn id() -> DatasetId {
    DatasetId::new("ERA5", LevelType::Plev, "u", "6H")
}

// ============================================================================
// Encoding
// ============================================================================

#[test]
fn test_encode_is_deterministic() {
    let spec: SmoothingSpec = "lon+lat:win:5,dayofyear:fft:0.1,detrended".parse().unwrap();
    assert_eq!(encode(&spec), encode(&spec.clone()));
    assert_eq!(encode(&spec), "lon+latwin5_doyfft0.10_detrended");
}

#[test]
fn test_encode_is_order_sensitive() {
    let a = SmoothingSpec::new()
        .kernel("lon", Kernel::WindowSmooth, WindowSize::Int(5))
        .kernel("dayofyear", Kernel::WindowSmooth, WindowSize::Int(15));
    let b = SmoothingSpec::new()
        .kernel("dayofyear", Kernel::WindowSmooth, WindowSize::Int(15))
        .kernel("lon", Kernel::WindowSmooth, WindowSize::Int(5));
    assert_ne!(encode(&a), encode(&b));
}

#[test]
fn test_encode_kernel_aliases_are_canonical() {
    let a: SmoothingSpec = "lon:window_smoothing:5".parse().unwrap();
    let b: SmoothingSpec = "lon:win:5".parse().unwrap();
    assert_eq!(encode(&a), encode(&b));
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_processing_spec_from_yaml() {
    let yaml = r#"
clim_type: dayofyear
clim_smoothing: "dayofyear:win:15"
smoothing: "lon+lat:fft:0.25,detrended"
"#;
    let spec: ProcessingSpec = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(spec.clim_type, Some(ClimatologyKey::DayOfYear));
    assert_eq!(spec.smoothing.steps().len(), 2);
    assert_eq!(encode(&spec.smoothing), "lon+latfft0.25_detrended");

    let back = serde_yaml::to_string(&spec).unwrap();
    let again: ProcessingSpec = serde_yaml::from_str(&back).unwrap();
    assert_eq!(again, spec);
}

#[test]
fn test_processing_spec_yaml_defaults() {
    let spec: ProcessingSpec = serde_yaml::from_str("{}").unwrap();
    assert_eq!(spec, ProcessingSpec::default());
}

#[test]
fn test_processing_spec_yaml_rejects_bad_key() {
    assert!(serde_yaml::from_str::<ProcessingSpec>("clim_type: fortnight").is_err());
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_contradiction_rejected_before_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("never-created");
    let codec = PathCodec::new(&root);
    let spec = ProcessingSpec::new(None, "dayofyear:win:15".parse().unwrap(), SmoothingSpec::new());

    assert!(matches!(
        codec.resolve_write(&id(), &spec),
        Err(ClimatologyError::Config(_))
    ));
    assert!(matches!(
        codec.resolve_read(&id(), &spec),
        Err(ClimatologyError::Config(_))
    ));
    assert!(!root.exists());
}

#[test]
fn test_read_after_write_resolves_anomaly_dir() {
    let dir = tempfile::tempdir().unwrap();
    let codec = PathCodec::new(dir.path());
    let spec = ProcessingSpec::new(
        Some(ClimatologyKey::DayOfYear),
        "dayofyear:win:15".parse().unwrap(),
        "lon:win:3".parse().unwrap(),
    );

    let written = codec.resolve_write(&id(), &spec).unwrap();
    let read = codec.resolve_read(&id(), &spec).unwrap();
    assert_eq!(read, written.anom);
    assert!(read.ends_with("ERA5/plev/u/6H/dayofyear_doywin15/lonwin3"));
}
