//! Peering resource selection

use std::fmt;
use weft_core::PeeringSettings;

use crate::resource::Resource;

/// API group of the peering resources
pub const PEERING_GROUP: &str = "weft.dev";

/// Plural of the cluster-scoped peering kind
pub const CLUSTER_PEERING_PLURAL: &str = "clusterweftpeerings";

/// Plural of the namespaced peering kind
pub const NAMESPACED_PEERING_PLURAL: &str = "weftpeerings";

/// Criteria identifying the peering resource among the known kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeeringSelector {
    pub group: String,
    pub plural: String,
    pub namespaced: bool,
}

impl PeeringSelector {
    pub fn clusterwide() -> Self {
        Self {
            group: PEERING_GROUP.to_string(),
            plural: CLUSTER_PEERING_PLURAL.to_string(),
            namespaced: false,
        }
    }

    pub fn namespaced() -> Self {
        Self {
            group: PEERING_GROUP.to_string(),
            plural: NAMESPACED_PEERING_PLURAL.to_string(),
            namespaced: true,
        }
    }

    /// Pick the selector for the configured peering mode; `None` when
    /// running standalone.
    pub fn from_settings(settings: &PeeringSettings) -> Option<Self> {
        if settings.standalone {
            None
        } else if settings.clusterwide {
            Some(Self::clusterwide())
        } else {
            Some(Self::namespaced())
        }
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        resource.group == self.group
            && resource.plural == self.plural
            && resource.namespaced == self.namespaced
    }
}

impl fmt::Display for PeeringSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.plural, self.group)
    }
}
