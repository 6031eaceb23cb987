//! Batch jobs: one dataset plus the processing to build for it.
//!
//! A jobs file is a YAML list:
//!
//! ```yaml
//! - dataset: ERA5
//!   level_type: plev
//!   var: u
//!   resolution: 6H
//!   clim_type: dayofyear
//!   clim_smoothing: "dayofyear:win:15"
//!   smoothing: "lon+lat:win:5"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use climatology::{BatchOrchestrator, BatchReport, ClimatologyKey, DatasetId, ProcessingSpec, SmoothingSpec};
use era5_common::LevelType;
use grid_store::GridStore;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default = "default_dataset")]
    pub dataset: String,
    pub level_type: LevelType,
    pub var: String,
    pub resolution: String,
    #[serde(default)]
    pub clim_type: Option<ClimatologyKey>,
    #[serde(default)]
    pub clim_smoothing: SmoothingSpec,
    #[serde(default)]
    pub smoothing: SmoothingSpec,
}

fn default_dataset() -> String {
    "ERA5".to_string()
}

impl Job {
    pub fn id(&self) -> DatasetId {
        DatasetId::new(&self.dataset, self.level_type, &self.var, &self.resolution)
    }

    pub fn processing(&self) -> ProcessingSpec {
        ProcessingSpec::new(self.clim_type, self.clim_smoothing.clone(), self.smoothing.clone())
    }
}

/// Parse a jobs file. Every job's processing is validated up front so a bad
/// entry late in the file fails before any work starts.
pub fn load_jobs(path: &Path) -> Result<Vec<Job>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read jobs file {}", path.display()))?;
    parse_jobs(&text).with_context(|| format!("Invalid jobs file {}", path.display()))
}

pub fn parse_jobs(text: &str) -> Result<Vec<Job>> {
    let jobs: Vec<Job> = serde_yaml::from_str(text)?;
    for (i, job) in jobs.iter().enumerate() {
        job.processing()
            .validate()
            .with_context(|| format!("job {} ({}/{})", i, job.var, job.resolution))?;
    }
    Ok(jobs)
}

/// Run jobs in order, stopping at the first failure.
pub fn run_jobs<S: GridStore>(
    orchestrator: &BatchOrchestrator<S>,
    jobs: &[Job],
) -> Result<Vec<BatchReport>> {
    let mut reports = Vec::with_capacity(jobs.len());

    for job in jobs {
        let report = orchestrator
            .run(&job.id(), &job.processing())
            .map_err(|e| {
                error!(var = %job.var, resolution = %job.resolution, error = %e, "Job failed");
                e
            })
            .with_context(|| format!("job {}/{}/{}", job.dataset, job.var, job.resolution))?;

        info!(
            var = %job.var,
            resolution = %job.resolution,
            written = report.written.len(),
            skipped = report.skipped,
            "Job finished"
        );
        reports.push(report);
    }

    Ok(reports)
}
