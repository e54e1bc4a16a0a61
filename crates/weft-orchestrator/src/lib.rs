//! # weft-orchestrator
//!
//! Keeps a matrix of background tasks in line with an observed state.
//!
//! For every watched resource kind and every served namespace one watcher task
//! runs. When peering is enabled, each namespace also gets a peering observer
//! and a keep-alive task sharing a freeze toggle. Whenever the observed state
//! changes, [`Orchestrator::reconcile`] stops tasks whose key disappeared and
//! spawns the missing ones.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use weft_orchestrator::{
//!     LoggingTaskFactory, Orchestrator, OrchestratorConfig, SharedInsights,
//! };
//!
//! # async fn example() -> weft_core::Result<()> {
//! let insights = SharedInsights::default();
//! let mut orchestrator = Orchestrator::new(
//!     OrchestratorConfig::new(),
//!     insights.subscribe(),
//!     Arc::new(LoggingTaskFactory::default()),
//! );
//! orchestrator.run(CancellationToken::new()).await
//! # }
//! ```

pub mod ensemble;
pub mod insights;
pub mod orchestrator;
pub mod peering;
pub mod resource;
pub mod snapshot_watch;
pub mod task;
pub mod toggle;

pub use ensemble::{format_uptime, Ensemble, StopOutcome, TaskHandle};
pub use insights::{Insights, InsightsReceiver, InsightsSnapshot, SharedInsights};
pub use orchestrator::{Orchestrator, OrchestratorConfig, ReconcileReport};
pub use peering::PeeringSelector;
pub use resource::{EnsembleKey, Namespace, Resource, TaskKind};
pub use snapshot_watch::{SnapshotFile, SnapshotFileWatcher, SnapshotWatcherConfig};
pub use task::{LoggingTaskFactory, TaskContext, TaskFactory};
pub use toggle::{Toggle, ToggleSet};
