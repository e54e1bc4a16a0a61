//! Resource kinds and the keys of the task matrix

use serde::{Deserialize, Serialize};
use std::fmt;

/// A namespace; `None` is cluster scope.
pub type Namespace = Option<String>;

/// A watchable resource kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub plural: String,
    /// Whether objects of this kind live inside namespaces
    #[serde(default = "default_namespaced")]
    pub namespaced: bool,
}

fn default_namespaced() -> bool {
    true
}

impl Resource {
    /// A namespaced resource kind
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        plural: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            plural: plural.into(),
            namespaced: true,
        }
    }

    /// Mark the kind as cluster-scoped
    pub fn cluster_scoped(mut self) -> Self {
        self.namespaced = false;
        self
    }

    /// The namespace a task for this kind runs in: cluster-scoped kinds
    /// always run at cluster scope.
    pub fn scope(&self, namespace: &Namespace) -> Namespace {
        if self.namespaced {
            namespace.clone()
        } else {
            None
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}.{}", self.plural, self.version)
        } else {
            write!(f, "{}.{}.{}", self.plural, self.version, self.group)
        }
    }
}

/// One cell of the task matrix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnsembleKey {
    pub resource: Resource,
    pub namespace: Namespace,
}

impl EnsembleKey {
    pub fn new(resource: Resource, namespace: Namespace) -> Self {
        Self {
            resource,
            namespace,
        }
    }

    pub fn namespace_label(&self) -> &str {
        self.namespace.as_deref().unwrap_or("*")
    }
}

impl fmt::Display for EnsembleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.resource, self.namespace_label())
    }
}

/// Kind of background task kept per key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    /// Watches the resource and processes its events
    Watcher,
    /// Watches peering objects for conflicting instances
    Peering,
    /// Periodically announces this instance in the peering object
    Pinging,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Watcher => "watcher",
            TaskKind::Peering => "peering observer",
            TaskKind::Pinging => "peering keepalive",
        };
        f.write_str(name)
    }
}
