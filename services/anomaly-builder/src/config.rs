//! Host detection and runtime configuration for the builder.
//!
//! Each known compute host has a profile with a data root and worker
//! resources. Environment variables (see [`Era5Config::from_env`]) override
//! whatever the profile provides.

use std::path::PathBuf;

use climatology::config::parse_memory;
use climatology::Era5Config;
use tracing::{debug, info};

/// Known compute hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Daint,
    Clim,
    Ubelix,
    Local,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Daint => "DAINT",
            Node::Clim => "CLIM",
            Node::Ubelix => "UBELIX",
            Node::Local => "LOCAL",
        }
    }

    /// Identify the host from the kernel release string and the node name.
    ///
    /// The platform string is checked first, so a Cray system is `Daint`
    /// whatever its node is called.
    pub fn detect(platform: &str, node_name: &str) -> Self {
        if platform.contains("cray") {
            Node::Daint
        } else if node_name.starts_with("clim") {
            Node::Clim
        } else if platform.contains("el7") {
            Node::Ubelix
        } else {
            Node::Local
        }
    }

    /// Detect the current host.
    pub fn current() -> Self {
        let platform = std::fs::read_to_string("/proc/sys/kernel/osrelease").unwrap_or_default();
        let node_name = std::env::var("HOSTNAME")
            .ok()
            .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
            .unwrap_or_default();
        let node = Self::detect(platform.trim(), node_name.trim());
        debug!(platform = platform.trim(), node_name = node_name.trim(), node = node.as_str(), "Detected host");
        node
    }
}

/// Data root and resources of a host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostProfile {
    pub node: Node,
    pub data_root: PathBuf,
    pub n_workers: usize,
    pub memory_limit: &'static str,
}

impl HostProfile {
    pub fn for_node(node: Node) -> Self {
        let (data_root, n_workers, memory_limit) = match node {
            Node::Daint => ("/scratch/snx3000/era5/persistent", 8, "8GiB"),
            Node::Clim => ("/scratch2/era5", 8, "4GiB"),
            Node::Ubelix => ("/storage/workspaces/era5", 6, "20GB"),
            Node::Local => ("../data", 8, "2GB"),
        };
        Self {
            node,
            data_root: PathBuf::from(data_root),
            n_workers,
            memory_limit,
        }
    }

    /// Build the runtime configuration for this host.
    ///
    /// Profile values fill in whatever the environment leaves unset.
    pub fn resolve(&self) -> Era5Config {
        let mut config = Era5Config::from_env();

        if std::env::var_os("ERA5_DATA_DIR").is_none() {
            config.data.root = self.data_root.clone();
        }
        if std::env::var_os("ERA5_N_WORKERS").is_none() {
            config.compute.n_workers = self.n_workers;
        }
        if std::env::var_os("ERA5_MEMORY_LIMIT").is_none() {
            if let Some(bytes) = parse_memory(self.memory_limit) {
                config.compute.memory_limit_bytes = bytes;
            }
        }

        info!(
            node = self.node.as_str(),
            root = %config.data.root.display(),
            n_workers = config.compute.n_workers,
            memory_limit_bytes = config.compute.memory_limit_bytes,
            "Resolved configuration"
        );
        config
    }
}
