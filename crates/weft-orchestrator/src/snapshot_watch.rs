//! Snapshot file watcher feeding [`SharedInsights`]
//!
//! The file is TOML:
//!
//! ```toml
//! namespaces = ["default", "prod"]
//! cluster_scope = false
//!
//! [[watched]]
//! group = "example.com"
//! version = "v1"
//! plural = "widgets"
//!
//! [[backbone]]
//! group = "weft.dev"
//! version = "v1"
//! plural = "weftpeerings"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use weft_core::fail_open::fail_open_with_retries;
use weft_core::{Result, WeftError};

use crate::insights::{InsightsSnapshot, SharedInsights};
use crate::resource::Resource;

/// On-disk layout of a snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Also serve cluster scope
    #[serde(default)]
    pub cluster_scope: bool,
    #[serde(default)]
    pub watched: Vec<Resource>,
    #[serde(default)]
    pub backbone: Vec<Resource>,
}

impl SnapshotFile {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn into_snapshot(self) -> Result<InsightsSnapshot> {
        for resource in self.watched.iter().chain(&self.backbone) {
            if resource.plural.is_empty() || resource.version.is_empty() {
                return Err(WeftError::InvalidSnapshot(format!(
                    "resource '{}' needs a plural and a version",
                    resource
                )));
            }
        }
        if let Some(blank) = self.namespaces.iter().find(|ns| ns.trim().is_empty()) {
            return Err(WeftError::InvalidSnapshot(format!(
                "blank namespace '{}'",
                blank
            )));
        }

        let mut namespaces: BTreeSet<_> = self.namespaces.into_iter().map(Some).collect();
        if self.cluster_scope {
            namespaces.insert(None);
        }
        Ok(InsightsSnapshot {
            watched: self.watched.into_iter().collect(),
            backbone: self.backbone.into_iter().collect(),
            namespaces,
        })
    }
}

/// Read and validate a snapshot file, returning its raw text as well
pub async fn read_snapshot(path: &Path) -> Result<(String, InsightsSnapshot)> {
    let content = tokio::fs::read_to_string(path).await?;
    let snapshot = SnapshotFile::parse(&content)?.into_snapshot()?;
    Ok((content, snapshot))
}

/// Configuration for the snapshot watcher
#[derive(Debug, Clone)]
pub struct SnapshotWatcherConfig {
    pub poll_interval: Duration,
    /// Read attempts per poll before giving up until the next tick
    pub read_retries: usize,
}

impl Default for SnapshotWatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            read_retries: 3,
        }
    }
}

/// Polls a snapshot file and publishes it whenever its content changes
pub struct SnapshotFileWatcher {
    path: PathBuf,
    publisher: SharedInsights,
    config: SnapshotWatcherConfig,
    last_content: Option<String>,
}

impl SnapshotFileWatcher {
    pub fn new(path: impl Into<PathBuf>, publisher: SharedInsights) -> Self {
        Self {
            path: path.into(),
            publisher,
            config: SnapshotWatcherConfig::default(),
            last_content: None,
        }
    }

    pub fn with_config(mut self, config: SnapshotWatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file once; returns whether a new snapshot was published
    pub async fn check_once(&mut self) -> Result<bool> {
        let (content, snapshot) = read_snapshot(&self.path).await?;
        Ok(self.apply(content, snapshot))
    }

    fn apply(&mut self, content: String, snapshot: InsightsSnapshot) -> bool {
        if self.last_content.as_deref() == Some(content.as_str()) {
            return false;
        }
        self.last_content = Some(content);
        let changed = self.publisher.publish(snapshot);
        if changed {
            debug!("Published snapshot from {}", self.path.display());
        }
        changed
    }

    /// Poll until `shutdown` is cancelled
    ///
    /// Read or parse failures are logged and the previous snapshot stays in
    /// effect.
    pub fn spawn(mut self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Snapshot watcher started for {}", self.path.display());
            let mut poll_interval = interval(self.config.poll_interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = poll_interval.tick() => {}
                }

                let path = self.path.clone();
                let read = fail_open_with_retries(
                    "snapshot read",
                    || read_snapshot(&path),
                    self.config.read_retries,
                )
                .await;
                if let Some((content, snapshot)) = read {
                    self.apply(content, snapshot);
                }
            }

            info!("Snapshot watcher stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::Insights;
    use tempfile::TempDir;

    const SNAPSHOT: &str = r#"
namespaces = ["default", "prod"]

[[watched]]
group = "example.com"
version = "v1"
plural = "widgets"

[[backbone]]
group = "weft.dev"
version = "v1"
plural = "clusterweftpeerings"
namespaced = false
"#;

    #[test]
    fn test_parse_snapshot() {
        let snapshot = SnapshotFile::parse(SNAPSHOT).unwrap().into_snapshot().unwrap();
        assert_eq!(
            snapshot.namespaces,
            BTreeSet::from([Some("default".to_string()), Some("prod".to_string())])
        );
        assert_eq!(
            snapshot.watched,
            BTreeSet::from([Resource::new("example.com", "v1", "widgets")])
        );
        let peering = snapshot.backbone.iter().next().unwrap();
        assert!(!peering.namespaced);
    }

    #[test]
    fn test_cluster_scope_adds_none() {
        let snapshot = SnapshotFile::parse("cluster_scope = true")
            .unwrap()
            .into_snapshot()
            .unwrap();
        assert_eq!(snapshot.namespaces, BTreeSet::from([None]));
    }

    #[test]
    fn test_invalid_snapshot_rejected() {
        let err = SnapshotFile::parse("namespaces = [\" \"]")
            .unwrap()
            .into_snapshot()
            .unwrap_err();
        assert!(matches!(err, WeftError::InvalidSnapshot(_)));

        let err = SnapshotFile::parse("[[watched]]\nversion = \"\"\nplural = \"x\"")
            .unwrap()
            .into_snapshot()
            .unwrap_err();
        assert!(matches!(err, WeftError::InvalidSnapshot(_)));
    }

    #[tokio::test]
    async fn test_check_once_publishes_on_change_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.toml");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let shared = SharedInsights::default();
        let receiver = shared.subscribe();
        let mut watcher = SnapshotFileWatcher::new(&path, shared);
        assert_eq!(watcher.path(), path.as_path());

        assert!(watcher.check_once().await.unwrap());
        assert_eq!(receiver.current_resources().len(), 1);
        assert!(!watcher.check_once().await.unwrap());

        std::fs::write(&path, "namespaces = [\"default\"]").unwrap();
        assert!(watcher.check_once().await.unwrap());
        assert!(receiver.current_resources().is_empty());
    }

    #[tokio::test]
    async fn test_check_once_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let mut watcher =
            SnapshotFileWatcher::new(dir.path().join("absent.toml"), SharedInsights::default());
        assert!(matches!(
            watcher.check_once().await.unwrap_err(),
            WeftError::Io(_)
        ));
    }

    #[tokio::test]
    async fn test_spawned_watcher_publishes_and_stops() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.toml");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let shared = SharedInsights::default();
        let receiver = shared.subscribe();
        let shutdown = CancellationToken::new();
        let handle = SnapshotFileWatcher::new(&path, shared)
            .with_config(SnapshotWatcherConfig {
                poll_interval: Duration::from_millis(10),
                read_retries: 1,
            })
            .spawn(shutdown.clone());

        tokio::time::timeout(Duration::from_secs(5), receiver.wait_for_change())
            .await
            .expect("snapshot published")
            .unwrap();
        assert_eq!(receiver.current_namespaces().len(), 2);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("watcher stopped")
            .unwrap();
    }
}
