//! Configuration management for Weft
//!
//! This module provides the repository-level configuration: peering behaviour
//! of the orchestrator, its timing knobs, and the line normalization switches
//! used by the diff engine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{Result, WeftError};

/// Repository-level Weft configuration
///
/// Loaded from `.weft/config.toml` in the repo root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeftConfig {
    /// How orchestrator instances discover each other
    #[serde(default)]
    pub peering: PeeringSettings,

    /// Reconciliation loop timing
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    /// Line normalization applied before diffing
    #[serde(default)]
    pub diff: DiffConfig,
}

/// Peering configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringSettings {
    /// Name of the peering object shared by cooperating instances
    #[serde(default = "default_peering_name")]
    pub name: String,

    /// Freeze all work while the peering resource is absent
    #[serde(default)]
    pub mandatory: bool,

    /// Run without peering at all
    #[serde(default)]
    pub standalone: bool,

    /// Use the cluster-scoped peering kind instead of the namespaced one
    #[serde(default)]
    pub clusterwide: bool,
}

/// Orchestrator timing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Grace period for a task to stop after cancellation
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Polling interval of the snapshot file watcher
    #[serde(default = "default_snapshot_poll_ms")]
    pub snapshot_poll_ms: u64,

    /// Identity announced to peers (random when unset)
    #[serde(default)]
    pub identity: Option<String>,
}

/// Line normalization switches
///
/// Two lines whose normalized keys are equal are treated as the same line
/// when aligning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Strip all whitespace before comparing
    #[serde(default)]
    pub ignore_whitespace: bool,

    /// Collapse runs of whitespace into a single space
    #[serde(default)]
    pub ignore_whitespace_changes: bool,

    /// Compare case-insensitively
    #[serde(default)]
    pub ignore_case: bool,

    /// Treat all whitespace-only lines as equal
    #[serde(default)]
    pub ignore_blank_lines: bool,

    /// Ignore trailing line terminators
    #[serde(default)]
    pub ignore_end_of_line: bool,
}

// Default value providers
fn default_peering_name() -> String {
    "default".to_string()
}

fn default_stop_timeout_secs() -> u64 {
    10
}

fn default_snapshot_poll_ms() -> u64 {
    500
}

impl WeftConfig {
    /// Load configuration from `.weft/config.toml` or use defaults
    pub fn load_or_default(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(".weft/config.toml");

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write default configuration to `.weft/config.toml`
    pub fn write_default(repo_root: &Path) -> Result<()> {
        let config_dir = repo_root.join(".weft");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| WeftError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }
}

impl OrchestratorSettings {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn snapshot_poll_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_poll_ms)
    }
}

impl Default for PeeringSettings {
    fn default() -> Self {
        Self {
            name: default_peering_name(),
            mandatory: false,
            standalone: false,
            clusterwide: false,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            stop_timeout_secs: default_stop_timeout_secs(),
            snapshot_poll_ms: default_snapshot_poll_ms(),
            identity: None,
        }
    }
}
