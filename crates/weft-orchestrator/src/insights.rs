//! Observed state of the cluster
//!
//! The orchestrator never discovers resources or namespaces itself. It reads
//! them from an [`Insights`] source and reacts whenever that source signals a
//! change.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use weft_core::{Result, WeftError};

use crate::peering::PeeringSelector;
use crate::resource::{Namespace, Resource};

/// One consistent view of what exists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsightsSnapshot {
    /// Resource kinds to run watchers for
    pub watched: BTreeSet<Resource>,
    /// Infrastructure kinds, such as the peering resources
    pub backbone: BTreeSet<Resource>,
    /// Namespaces currently served
    pub namespaces: BTreeSet<Namespace>,
}

impl InsightsSnapshot {
    /// First backbone kind matching `selector`
    pub fn lookup(&self, selector: &PeeringSelector) -> Option<Resource> {
        self.backbone.iter().find(|r| selector.matches(r)).cloned()
    }
}

/// Source of observed resources and namespaces
#[async_trait]
pub trait Insights: Send + Sync {
    /// Resolve once the observed state may have changed
    ///
    /// Fails with [`WeftError::InsightsClosed`] when no further changes can
    /// ever arrive.
    async fn wait_for_change(&self) -> Result<()>;

    /// Resource kinds to run watchers for
    fn current_resources(&self) -> BTreeSet<Resource>;

    /// Namespaces currently served
    fn current_namespaces(&self) -> BTreeSet<Namespace>;

    /// Resolve a peering selector against the known backbone kinds
    fn lookup(&self, selector: &PeeringSelector) -> Option<Resource>;
}

/// Publishing side of an in-memory insights source
///
/// Cloning shares the same state. Once every clone is dropped, subscribers
/// report [`WeftError::InsightsClosed`].
#[derive(Debug, Clone)]
pub struct SharedInsights {
    tx: Arc<watch::Sender<InsightsSnapshot>>,
}

impl Default for SharedInsights {
    fn default() -> Self {
        Self::new(InsightsSnapshot::default())
    }
}

impl SharedInsights {
    pub fn new(initial: InsightsSnapshot) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the snapshot; subscribers are only woken if it differs
    pub fn publish(&self, snapshot: InsightsSnapshot) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        })
    }

    /// Modify the snapshot in place
    pub fn update(&self, f: impl FnOnce(&mut InsightsSnapshot)) -> bool {
        let mut next = self.snapshot();
        f(&mut next);
        self.publish(next)
    }

    pub fn snapshot(&self) -> InsightsSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> InsightsReceiver {
        InsightsReceiver {
            current: self.tx.subscribe(),
            changes: Mutex::new(self.tx.subscribe()),
        }
    }
}

/// Subscribing side of [`SharedInsights`]
#[derive(Debug)]
pub struct InsightsReceiver {
    current: watch::Receiver<InsightsSnapshot>,
    changes: Mutex<watch::Receiver<InsightsSnapshot>>,
}

#[async_trait]
impl Insights for InsightsReceiver {
    async fn wait_for_change(&self) -> Result<()> {
        self.changes
            .lock()
            .await
            .changed()
            .await
            .map_err(|_| WeftError::InsightsClosed)
    }

    fn current_resources(&self) -> BTreeSet<Resource> {
        self.current.borrow().watched.clone()
    }

    fn current_namespaces(&self) -> BTreeSet<Namespace> {
        self.current.borrow().namespaces.clone()
    }

    fn lookup(&self, selector: &PeeringSelector) -> Option<Resource> {
        self.current.borrow().lookup(selector)
    }
}
