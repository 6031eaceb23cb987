//! Batch builder for ERA5 climatologies and anomalies.
//!
//! The binary resolves a host profile, builds an [`climatology::Era5Config`]
//! and feeds jobs to the [`climatology::BatchOrchestrator`].

pub mod config;
pub mod jobs;

pub use config::{HostProfile, Node};
pub use jobs::{load_jobs, parse_jobs, run_jobs, Job};
