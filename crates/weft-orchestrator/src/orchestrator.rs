//! The reconciliation loop

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use weft_core::fail_open::fail_open;
use weft_core::{PeeringSettings, Result, WeftConfig, WeftError};

use crate::ensemble::{format_uptime, stop_tasks, Ensemble, TaskHandle};
use crate::insights::Insights;
use crate::peering::PeeringSelector;
use crate::resource::{EnsembleKey, Namespace, Resource, TaskKind};
use crate::task::{TaskContext, TaskFactory};
use crate::toggle::Toggle;

/// Configuration for an orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub peering: PeeringSettings,
    /// Grace period for each task to exit after cancellation
    pub stop_timeout: Duration,
    /// Identity announced to peers
    pub identity: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self {
            peering: PeeringSettings::default(),
            stop_timeout: Duration::from_secs(10),
            identity: Uuid::new_v4().to_string(),
        }
    }

    pub fn from_settings(config: &WeftConfig) -> Self {
        Self {
            peering: config.peering.clone(),
            stop_timeout: config.orchestrator.stop_timeout(),
            identity: config
                .orchestrator
                .identity
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        }
    }

    pub fn with_peering(mut self, peering: PeeringSettings) -> Self {
        self.peering = peering;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }
}

/// What a single reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys whose tasks and toggles were removed
    pub terminated: BTreeSet<EnsembleKey>,
    /// Tasks started, in spawn order
    pub spawned: Vec<(EnsembleKey, TaskKind)>,
    /// Whether the freeze blocker is on after the pass
    pub frozen: bool,
}

impl ReconcileReport {
    /// True when the pass neither stopped nor started anything
    pub fn is_noop(&self) -> bool {
        self.terminated.is_empty() && self.spawned.is_empty()
    }
}

/// Keeps one watcher per (resource, namespace) pair and the peering tasks
/// in line with what the [`Insights`] source reports
pub struct Orchestrator<I: Insights> {
    config: OrchestratorConfig,
    selector: Option<PeeringSelector>,
    insights: I,
    factory: Arc<dyn TaskFactory>,
    ensemble: Ensemble,
}

impl<I: Insights> Orchestrator<I> {
    pub fn new(config: OrchestratorConfig, insights: I, factory: Arc<dyn TaskFactory>) -> Self {
        let selector = PeeringSelector::from_settings(&config.peering);
        Self {
            config,
            selector,
            insights,
            factory,
            ensemble: Ensemble::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    pub fn insights(&self) -> &I {
        &self.insights
    }

    /// Bring the running tasks in line with the current insights
    ///
    /// Redundant tasks are stopped before missing ones are spawned. A task
    /// that fails to be admitted aborts the rest of the pass; whatever was
    /// already spawned stays tracked.
    #[instrument(skip(self), fields(identity = %self.config.identity))]
    pub async fn reconcile(&mut self) -> Result<ReconcileReport> {
        let watched = self.insights.current_resources();
        let namespaces = self.insights.current_namespaces();
        let peering_resource = self
            .selector
            .as_ref()
            .and_then(|selector| self.insights.lookup(selector));

        let mut report = ReconcileReport::default();

        report.frozen = self.config.peering.mandatory && peering_resource.is_none();
        if report.frozen && !self.ensemble.freeze_blocker().is_on() {
            match &self.selector {
                Some(selector) => warn!(
                    "Peering resource {} is missing; pausing until it appears",
                    selector
                ),
                None => warn!("Peering is mandatory but standalone mode is on; pausing"),
            }
        }
        self.ensemble.freeze_blocker().turn_to(report.frozen);

        // Cluster scope is always retained so cluster-scoped kinds survive
        // namespace changes.
        let mut retained_resources = watched.clone();
        retained_resources.extend(peering_resource.clone());
        let mut retained_namespaces = namespaces.clone();
        retained_namespaces.insert(None);
        report.terminated = self
            .terminate_redundancies(&retained_resources, &retained_namespaces)
            .await;

        if let Some(resource) = &peering_resource {
            self.spawn_missing_peerings(resource, &namespaces, &mut report)?;
        }
        self.spawn_missing_watchers(&watched, &namespaces, &mut report)?;

        if !report.spawned.is_empty() {
            tokio::task::yield_now().await;
        }
        Ok(report)
    }

    async fn terminate_redundancies(
        &mut self,
        resources: &BTreeSet<Resource>,
        namespaces: &BTreeSet<Namespace>,
    ) -> BTreeSet<EnsembleKey> {
        let redundant: BTreeSet<EnsembleKey> = self
            .ensemble
            .keys()
            .into_iter()
            .filter(|key| {
                !resources.contains(&key.resource) || !namespaces.contains(&key.namespace)
            })
            .collect();
        if redundant.is_empty() {
            return redundant;
        }

        for key in &redundant {
            info!("Stopping tasks for {}", key);
        }
        let (handles, toggles) = self.ensemble.take(&redundant);
        stop_tasks(handles, self.config.stop_timeout).await;
        self.ensemble.freeze_checker().drop_toggles(&toggles);
        redundant
    }

    fn spawn_missing_peerings(
        &mut self,
        resource: &Resource,
        namespaces: &BTreeSet<Namespace>,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        for namespace in namespaces {
            let key = EnsembleKey::new(resource.clone(), resource.scope(namespace));
            if self.ensemble.contains(&key, TaskKind::Peering) {
                continue;
            }
            self.admit(&key, TaskKind::Pinging)?;
            self.admit(&key, TaskKind::Peering)?;

            // Mandatory peering starts frozen until the observer has seen
            // the peers at least once.
            let toggle = self.ensemble.freeze_checker().make_toggle(
                self.config.peering.mandatory,
                format!("{}@{}", self.config.peering.name, key.namespace_label()),
            );
            let pinging = self.start(&key, TaskKind::Pinging, Some(toggle.clone()));
            let peering = self.start(&key, TaskKind::Peering, Some(toggle.clone()));

            self.ensemble.insert_freeze_toggle(key.clone(), toggle);
            self.ensemble.insert_task(key.clone(), TaskKind::Pinging, pinging);
            self.ensemble.insert_task(key.clone(), TaskKind::Peering, peering);
            report.spawned.push((key.clone(), TaskKind::Pinging));
            report.spawned.push((key, TaskKind::Peering));
        }
        Ok(())
    }

    fn spawn_missing_watchers(
        &mut self,
        resources: &BTreeSet<Resource>,
        namespaces: &BTreeSet<Namespace>,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        for resource in resources {
            for namespace in namespaces {
                let key = EnsembleKey::new(resource.clone(), resource.scope(namespace));
                if self.ensemble.contains(&key, TaskKind::Watcher) {
                    continue;
                }
                self.admit(&key, TaskKind::Watcher)?;
                let watcher = self.start(&key, TaskKind::Watcher, None);
                self.ensemble.insert_task(key.clone(), TaskKind::Watcher, watcher);
                report.spawned.push((key, TaskKind::Watcher));
            }
        }
        Ok(())
    }

    fn admit(&self, key: &EnsembleKey, kind: TaskKind) -> Result<()> {
        if self.ensemble.contains(key, kind) {
            return Err(WeftError::Orchestrator(format!(
                "{} for {} is already running",
                kind, key
            )));
        }
        self.factory
            .admit(key, kind)
            .map_err(|e| WeftError::TaskSpawn {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn start(&self, key: &EnsembleKey, kind: TaskKind, freeze_toggle: Option<Toggle>) -> TaskHandle {
        let cancel = CancellationToken::new();
        let ctx = TaskContext {
            key: key.clone(),
            kind,
            identity: self.config.identity.clone(),
            peering_name: self.config.peering.name.clone(),
            cancel: cancel.clone(),
            freeze_checker: self.ensemble.freeze_checker().clone(),
            freeze_toggle,
        };
        let name = format!("{} for {}", kind, key);
        debug!("Spawning {}", name);

        let factory = Arc::clone(&self.factory);
        let label = name.clone();
        TaskHandle::spawn(name, cancel, async move {
            let finished = match kind {
                TaskKind::Watcher => fail_open(&label, || factory.run_watcher(ctx)).await,
                TaskKind::Peering => fail_open(&label, || factory.run_peering(ctx)).await,
                TaskKind::Pinging => fail_open(&label, || factory.run_pinging(ctx)).await,
            };
            if finished.is_some() {
                debug!("{} exited", label);
            }
        })
    }

    /// Reconcile on every insights change until `shutdown` is cancelled or
    /// the insights source closes, then stop every task
    ///
    /// A failed pass is returned as an error after the tasks are stopped.
    #[instrument(skip_all, fields(identity = %self.config.identity))]
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        info!("Orchestrator starting");
        let outcome = self.run_until(&shutdown).await;
        self.shutdown().await;
        match &outcome {
            Ok(()) => info!("Orchestrator stopped"),
            Err(e) => warn!("Orchestrator stopped: {}", e),
        }
        outcome
    }

    async fn run_until(&mut self, shutdown: &CancellationToken) -> Result<()> {
        self.reconcile_logged().await?;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                changed = self.insights.wait_for_change() => changed?,
            }
            self.reconcile_logged().await?;
        }
    }

    async fn reconcile_logged(&mut self) -> Result<()> {
        let report = self.reconcile().await?;
        if !report.is_noop() {
            info!(
                "Reconciled: {} keys terminated, {} tasks spawned",
                report.terminated.len(),
                report.spawned.len()
            );
        }
        for (key, kind) in self.ensemble.finished() {
            if let Some(task) = self.ensemble.task(&key, kind) {
                warn!(
                    "{} has exited after {} and will not be restarted",
                    task.name(),
                    format_uptime(task.uptime())
                );
            }
        }
        Ok(())
    }

    /// Stop every task and forget every key
    pub async fn shutdown(&mut self) {
        let (handles, toggles) = self.ensemble.drain();
        let count = handles.len();
        stop_tasks(handles, self.config.stop_timeout).await;
        self.ensemble.freeze_checker().drop_toggles(&toggles);
        if count > 0 {
            info!("Stopped {} tasks", count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{InsightsSnapshot, SharedInsights};
    use crate::task::LoggingTaskFactory;

    fn widgets() -> Resource {
        Resource::new("example.com", "v1", "widgets")
    }

    fn orchestrator(snapshot: InsightsSnapshot) -> (SharedInsights, Orchestrator<crate::InsightsReceiver>) {
        let shared = SharedInsights::new(snapshot);
        let config = OrchestratorConfig::new()
            .with_identity("test")
            .with_peering(PeeringSettings {
                standalone: true,
                ..PeeringSettings::default()
            })
            .with_stop_timeout(Duration::from_secs(1));
        let orchestrator = Orchestrator::new(
            config,
            shared.subscribe(),
            Arc::new(LoggingTaskFactory::default()),
        );
        (shared, orchestrator)
    }

    #[test]
    fn test_config_from_settings() {
        let mut settings = WeftConfig::default();
        settings.orchestrator.identity = Some("node-a".to_string());
        settings.orchestrator.stop_timeout_secs = 3;
        let config = OrchestratorConfig::from_settings(&settings);
        assert_eq!(config.identity, "node-a");
        assert_eq!(config.stop_timeout, Duration::from_secs(3));

        let generated = OrchestratorConfig::from_settings(&WeftConfig::default());
        assert!(Uuid::parse_str(&generated.identity).is_ok());
    }

    #[tokio::test]
    async fn test_reconcile_spawns_and_reports() {
        let (_shared, mut orchestrator) = orchestrator(InsightsSnapshot {
            watched: BTreeSet::from([widgets()]),
            namespaces: BTreeSet::from([Some("prod".to_string())]),
            ..InsightsSnapshot::default()
        });

        let report = orchestrator.reconcile().await.unwrap();
        let key = EnsembleKey::new(widgets(), Some("prod".to_string()));
        assert_eq!(report.spawned, vec![(key.clone(), TaskKind::Watcher)]);
        assert!(report.terminated.is_empty());
        assert!(!report.frozen);
        assert!(orchestrator.ensemble().contains(&key, TaskKind::Watcher));

        assert!(orchestrator.reconcile().await.unwrap().is_noop());
        orchestrator.shutdown().await;
        assert!(orchestrator.ensemble().is_empty());
    }
}
