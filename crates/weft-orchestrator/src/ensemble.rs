//! Bookkeeping of the running tasks and their freeze toggles

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::resource::{EnsembleKey, TaskKind};
use crate::toggle::{Toggle, ToggleSet};

/// How a task ended when asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited within the grace period
    Stopped,
    /// Panicked before or while stopping
    Panicked,
    /// Ignored cancellation; left running detached
    TimedOut,
}

/// A spawned background task
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    token: CancellationToken,
    join: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

impl TaskHandle {
    /// Spawn `future` on the runtime; `token` is the cancellation signal the
    /// future is expected to observe.
    pub fn spawn<F>(name: impl Into<String>, token: CancellationToken, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            token,
            join: tokio::spawn(future),
            started_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall-clock time since the task was spawned
    pub fn uptime(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.started_at)
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the task and wait up to `grace` for it to exit
    pub async fn stop(self, grace: Duration) -> StopOutcome {
        self.token.cancel();
        let uptime = format_uptime(self.uptime());
        let mut join = self.join;
        match tokio::time::timeout(grace, &mut join).await {
            Ok(Ok(())) => {
                debug!("{} stopped", self.name);
                StopOutcome::Stopped
            }
            Ok(Err(e)) if e.is_panic() => {
                warn!("{} panicked after {}: {}", self.name, uptime, e);
                StopOutcome::Panicked
            }
            Ok(Err(_)) => StopOutcome::Stopped,
            Err(_) => {
                warn!(
                    "{} did not stop within {:?} after running {}; leaving it detached",
                    self.name, grace, uptime
                );
                StopOutcome::TimedOut
            }
        }
    }
}

/// Render a task runtime for log lines, e.g. `450ms`, `12s`, `3m 05s`
pub fn format_uptime(uptime: chrono::Duration) -> String {
    let millis = uptime.num_milliseconds().max(0);
    if millis < 1_000 {
        return format!("{}ms", millis);
    }
    let secs = millis / 1_000;
    if secs < 60 {
        return format!("{}s", secs);
    }
    if secs < 3_600 {
        return format!("{}m {:02}s", secs / 60, secs % 60);
    }
    format!("{}h {:02}m", secs / 3_600, (secs % 3_600) / 60)
}

/// Stop a batch of tasks concurrently
///
/// Every task gets the same grace period, so the whole batch takes at most
/// `grace` regardless of its size.
pub async fn stop_tasks(
    handles: impl IntoIterator<Item = TaskHandle>,
    grace: Duration,
) -> Vec<StopOutcome> {
    join_all(handles.into_iter().map(|handle| handle.stop(grace))).await
}

/// Everything the orchestrator keeps per key
///
/// The freeze checker aggregates the global freeze blocker (peering resource
/// missing) and one toggle per peering key (conflicting peers present).
#[derive(Debug)]
pub struct Ensemble {
    freeze_checker: ToggleSet,
    freeze_blocker: Toggle,
    freeze_toggles: HashMap<EnsembleKey, Toggle>,
    tasks: HashMap<(EnsembleKey, TaskKind), TaskHandle>,
}

impl Default for Ensemble {
    fn default() -> Self {
        Self::new()
    }
}

impl Ensemble {
    pub fn new() -> Self {
        let freeze_checker = ToggleSet::new();
        let freeze_blocker = freeze_checker.make_toggle(false, "peering resource missing");
        Self {
            freeze_checker,
            freeze_blocker,
            freeze_toggles: HashMap::new(),
            tasks: HashMap::new(),
        }
    }

    pub fn freeze_checker(&self) -> &ToggleSet {
        &self.freeze_checker
    }

    pub fn freeze_blocker(&self) -> &Toggle {
        &self.freeze_blocker
    }

    pub fn freeze_toggle(&self, key: &EnsembleKey) -> Option<&Toggle> {
        self.freeze_toggles.get(key)
    }

    pub fn contains(&self, key: &EnsembleKey, kind: TaskKind) -> bool {
        self.tasks.contains_key(&(key.clone(), kind))
    }

    pub fn task(&self, key: &EnsembleKey, kind: TaskKind) -> Option<&TaskHandle> {
        self.tasks.get(&(key.clone(), kind))
    }

    /// Number of tracked tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.freeze_toggles.is_empty()
    }

    /// Every key known to any map
    pub fn keys(&self) -> BTreeSet<EnsembleKey> {
        self.tasks
            .keys()
            .map(|(key, _)| key.clone())
            .chain(self.freeze_toggles.keys().cloned())
            .collect()
    }

    /// Keys that have a task of the given kind
    pub fn keys_of(&self, kind: TaskKind) -> BTreeSet<EnsembleKey> {
        self.tasks
            .keys()
            .filter(|(_, k)| *k == kind)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Tasks that exited on their own
    pub fn finished(&self) -> Vec<(EnsembleKey, TaskKind)> {
        let mut finished: Vec<_> = self
            .tasks
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(entry, _)| entry.clone())
            .collect();
        finished.sort();
        finished
    }

    pub(crate) fn insert_task(&mut self, key: EnsembleKey, kind: TaskKind, handle: TaskHandle) {
        self.tasks.insert((key, kind), handle);
    }

    pub(crate) fn insert_freeze_toggle(&mut self, key: EnsembleKey, toggle: Toggle) {
        self.freeze_toggles.insert(key, toggle);
    }

    /// Detach every entry of `keys` from all maps at once
    pub(crate) fn take(&mut self, keys: &BTreeSet<EnsembleKey>) -> (Vec<TaskHandle>, Vec<Toggle>) {
        let entries: Vec<(EnsembleKey, TaskKind)> = self
            .tasks
            .keys()
            .filter(|(key, _)| keys.contains(key))
            .cloned()
            .collect();
        let handles = entries
            .iter()
            .filter_map(|entry| self.tasks.remove(entry))
            .collect();
        let toggles = keys
            .iter()
            .filter_map(|key| self.freeze_toggles.remove(key))
            .collect();
        (handles, toggles)
    }

    /// Detach everything
    pub(crate) fn drain(&mut self) -> (Vec<TaskHandle>, Vec<Toggle>) {
        let handles = self.tasks.drain().map(|(_, handle)| handle).collect();
        let toggles = self.freeze_toggles.drain().map(|(_, toggle)| toggle).collect();
        (handles, toggles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;

    fn key(ns: &str) -> EnsembleKey {
        EnsembleKey::new(Resource::new("example.com", "v1", "widgets"), Some(ns.to_string()))
    }

    fn idle_task(name: &str) -> TaskHandle {
        let token = CancellationToken::new();
        let child = token.clone();
        TaskHandle::spawn(name, token, async move { child.cancelled().await })
    }

    #[tokio::test]
    async fn test_stop_cooperative_task() {
        let handle = idle_task("idle");
        assert!(!handle.is_finished());
        assert_eq!(handle.stop(Duration::from_secs(1)).await, StopOutcome::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_stubborn_task_times_out() {
        let handle = TaskHandle::spawn("stubborn", CancellationToken::new(), async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert_eq!(
            handle.stop(Duration::from_secs(10)).await,
            StopOutcome::TimedOut
        );
    }

    #[tokio::test]
    async fn test_stop_panicked_task() {
        let handle = TaskHandle::spawn("broken", CancellationToken::new(), async {
            panic!("boom");
        });
        tokio::task::yield_now().await;
        assert_eq!(handle.stop(Duration::from_secs(1)).await, StopOutcome::Panicked);
    }

    #[tokio::test]
    async fn test_stop_tasks_batch() {
        let outcomes = stop_tasks(
            vec![idle_task("a"), idle_task("b"), idle_task("c")],
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(outcomes, vec![StopOutcome::Stopped; 3]);
    }

    #[tokio::test]
    async fn test_take_removes_every_map_entry() {
        let mut ensemble = Ensemble::new();
        let prod = key("prod");
        let dev = key("dev");

        ensemble.insert_task(prod.clone(), TaskKind::Watcher, idle_task("w-prod"));
        ensemble.insert_task(prod.clone(), TaskKind::Peering, idle_task("p-prod"));
        ensemble.insert_task(dev.clone(), TaskKind::Watcher, idle_task("w-dev"));
        let toggle = ensemble.freeze_checker().make_toggle(false, "prod");
        ensemble.insert_freeze_toggle(prod.clone(), toggle);

        assert_eq!(ensemble.keys(), BTreeSet::from([dev.clone(), prod.clone()]));
        assert_eq!(ensemble.keys_of(TaskKind::Peering), BTreeSet::from([prod.clone()]));

        let (handles, toggles) = ensemble.take(&BTreeSet::from([prod.clone()]));
        assert_eq!(handles.len(), 2);
        assert_eq!(toggles.len(), 1);
        assert_eq!(ensemble.keys(), BTreeSet::from([dev]));
        assert!(ensemble.freeze_toggle(&prod).is_none());

        stop_tasks(handles, Duration::from_secs(1)).await;
        let (rest, _) = ensemble.drain();
        stop_tasks(rest, Duration::from_secs(1)).await;
        assert!(ensemble.is_empty());
    }

    #[tokio::test]
    async fn test_blocker_is_member_of_checker() {
        let ensemble = Ensemble::new();
        assert!(ensemble.freeze_checker().contains(ensemble.freeze_blocker()));
        assert!(ensemble.freeze_checker().is_off());
        ensemble.freeze_blocker().turn_to(true);
        assert!(ensemble.freeze_checker().is_on());
    }

    #[tokio::test]
    async fn test_finished_lists_exited_tasks() {
        let mut ensemble = Ensemble::new();
        let done = TaskHandle::spawn("done", CancellationToken::new(), async {});
        ensemble.insert_task(key("prod"), TaskKind::Watcher, done);
        ensemble.insert_task(key("dev"), TaskKind::Watcher, idle_task("idle"));

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(ensemble.finished(), vec![(key("prod"), TaskKind::Watcher)]);
        let task = ensemble.task(&key("prod"), TaskKind::Watcher).unwrap();
        assert_eq!(task.name(), "done");
        assert!(task.uptime() >= chrono::Duration::zero());

        let (handles, _) = ensemble.drain();
        stop_tasks(handles, Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_uptime_counts_from_spawn() {
        let handle = idle_task("idle");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.uptime() >= chrono::Duration::milliseconds(20));
        assert!(handle.started_at() <= Utc::now());
        handle.stop(Duration::from_secs(1)).await;
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(chrono::Duration::milliseconds(450)), "450ms");
        assert_eq!(format_uptime(chrono::Duration::seconds(12)), "12s");
        assert_eq!(format_uptime(chrono::Duration::seconds(185)), "3m 05s");
        assert_eq!(format_uptime(chrono::Duration::seconds(7_260)), "2h 01m");
        assert_eq!(format_uptime(chrono::Duration::milliseconds(-5)), "0ms");
    }
}
