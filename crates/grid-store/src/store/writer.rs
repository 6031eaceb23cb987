//! Zarr V3 writer for labelled grids.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use super::keys;
use crate::config::{StoreConfig, ZarrCompression};
use crate::error::{GridError, Result};
use crate::grid::Grid;

/// Write `grid` to a Zarr store at `path`.
///
/// The store is assembled in a sibling staging directory and renamed into
/// place, so a reader never sees a half-written artifact. An existing store
/// at `path` is replaced. Staging directories of writers that are no longer
/// running are removed first.
pub fn write_grid(path: &Path, grid: &Grid, config: &StoreConfig) -> Result<()> {
    sweep_stale_staging(path)?;
    let staging = staging_path(path);
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir_all(&staging)?;

    if let Err(e) = write_store(&staging, grid, config) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }

    if path.exists() {
        std::fs::remove_dir_all(path)?;
    }
    std::fs::rename(&staging, path)?;

    debug!(
        path = %path.display(),
        name = grid.name(),
        shape = ?grid.shape(),
        bytes = grid.nbytes(),
        "Wrote grid"
    );
    Ok(())
}

fn staging_prefix(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(".{}.partial-", file_name)
}

fn staging_path(path: &Path) -> PathBuf {
    path.with_file_name(format!("{}{}", staging_prefix(path), std::process::id()))
}

/// Remove `.{name}.partial-{pid}` siblings of `path` whose writer process is
/// gone. Without `/proc` every foreign staging directory counts as stale.
fn sweep_stale_staging(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let entries = match std::fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let prefix = staging_prefix(path);
    let own = std::process::id().to_string();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(pid) = name.strip_prefix(&prefix) else {
            continue;
        };
        if pid == own || writer_running(pid) {
            continue;
        }
        debug!(path = %entry.path().display(), "Removing stale staging directory");
        std::fs::remove_dir_all(entry.path())?;
    }
    Ok(())
}

fn writer_running(pid: &str) -> bool {
    let proc = Path::new("/proc");
    let numeric = !pid.is_empty() && pid.bytes().all(|b| b.is_ascii_digit());
    numeric && proc.is_dir() && proc.join(pid).exists()
}

fn build_attributes(grid: &Grid) -> Result<Map<String, Value>> {
    let mut attrs = Map::new();
    attrs.insert(keys::DIMENSIONS.to_string(), json!(grid.dim_names()));
    attrs.insert(keys::NAME.to_string(), json!(grid.name()));
    attrs.insert(keys::COORDS.to_string(), serde_json::to_value(grid.dims())?);
    attrs.insert(
        keys::AUX_COORDS.to_string(),
        serde_json::to_value(grid.aux_coords())?,
    );
    attrs.insert(keys::ATTRS.to_string(), Value::Object(grid.attrs().clone()));
    Ok(attrs)
}

fn write_store(dir: &Path, grid: &Grid, config: &StoreConfig) -> Result<()> {
    let store = FilesystemStore::new(dir).map_err(|e| GridError::write_failed(e.to_string()))?;

    let shape: Vec<u64> = grid.shape().iter().map(|&n| n as u64).collect();
    let chunk_shape: Vec<u64> = grid
        .dim_names()
        .iter()
        .zip(grid.shape())
        .map(|(name, &len)| {
            let chunk = if *name == "time" {
                len.min(config.time_chunk)
            } else {
                len
            };
            chunk.max(1) as u64
        })
        .collect();

    let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
        .try_into()
        .map_err(|e| GridError::ConfigError(format!("{:?}", e)))?;

    let mut binding = ArrayBuilder::new(
        shape.clone(),
        DataType::Float32,
        chunk_grid,
        FillValue::from(f32::NAN),
    );
    let mut builder = binding.attributes(build_attributes(grid)?);

    if config.compression != ZarrCompression::None {
        builder = builder.bytes_to_bytes_codecs(vec![compression_codec(config)?]);
    }

    let array = builder
        .build(Arc::new(store), "/")
        .map_err(|e| GridError::write_failed(e.to_string()))?;

    array
        .store_metadata()
        .map_err(|e| GridError::write_failed(e.to_string()))?;

    if grid.data().is_empty() {
        return Ok(());
    }

    let subset = ArraySubset::new_with_start_shape(vec![0; shape.len()], shape)
        .map_err(|e| GridError::write_failed(e.to_string()))?;
    let values: Vec<f32> = grid.data().iter().copied().collect();

    array
        .store_array_subset_elements(&subset, &values)
        .map_err(|e| GridError::write_failed(e.to_string()))?;

    Ok(())
}

fn compression_codec(
    config: &StoreConfig,
) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
    let level = BloscCompressionLevel::try_from(config.compression_level)
        .map_err(|_| GridError::ConfigError("Invalid compression level".to_string()))?;

    let (shuffle, typesize) = if config.shuffle {
        (BloscShuffleMode::Shuffle, Some(std::mem::size_of::<f32>()))
    } else {
        (BloscShuffleMode::NoShuffle, None)
    };

    let compressor = match config.compression {
        ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
        ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        ZarrCompression::None => {
            return Err(GridError::ConfigError(
                "No compression configured".to_string(),
            ))
        }
    };

    let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
        .map_err(|e| GridError::ConfigError(e.to_string()))?;

    Ok(Arc::new(codec))
}
