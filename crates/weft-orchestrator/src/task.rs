//! Task payloads
//!
//! The orchestrator only decides *which* tasks run. What a watcher or a
//! peering task actually does is supplied through a [`TaskFactory`].

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weft_core::Result;

use crate::resource::{EnsembleKey, TaskKind};
use crate::toggle::{Toggle, ToggleSet};

/// Everything a spawned task gets to see
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub key: EnsembleKey,
    pub kind: TaskKind,
    /// Identity of this orchestrator instance
    pub identity: String,
    /// Name of the peering object shared with other instances
    pub peering_name: String,
    /// Cancelled when the task should exit
    pub cancel: CancellationToken,
    /// On while all processing must pause
    pub freeze_checker: ToggleSet,
    /// This key's conflict toggle (peering tasks only)
    pub freeze_toggle: Option<Toggle>,
}

impl TaskContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until processing may proceed; `false` if cancelled first
    pub async fn wait_unfrozen(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = self.freeze_checker.wait_for(false) => true,
        }
    }
}

/// Builds the payload of watcher and peering tasks
///
/// Payloads must return once `ctx.cancel` fires. Errors they return are
/// logged and swallowed; they never affect the orchestrator.
#[async_trait]
pub trait TaskFactory: Send + Sync + 'static {
    /// Called before a task is spawned; an error aborts the current
    /// reconciliation pass.
    fn admit(&self, _key: &EnsembleKey, _kind: TaskKind) -> Result<()> {
        Ok(())
    }

    /// Watch `ctx.key.resource` in `ctx.key.namespace`
    async fn run_watcher(&self, ctx: TaskContext) -> Result<()>;

    /// Observe peering objects and flip `ctx.freeze_toggle` on conflicts
    async fn run_peering(&self, ctx: TaskContext) -> Result<()>;

    /// Keep this instance's peering entry alive
    async fn run_pinging(&self, ctx: TaskContext) -> Result<()>;
}

/// Factory whose tasks only log, used by the CLI
#[derive(Debug, Clone)]
pub struct LoggingTaskFactory {
    heartbeat: Duration,
}

impl Default for LoggingTaskFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl LoggingTaskFactory {
    pub fn new(heartbeat: Duration) -> Self {
        Self { heartbeat }
    }
}

#[async_trait]
impl TaskFactory for LoggingTaskFactory {
    async fn run_watcher(&self, ctx: TaskContext) -> Result<()> {
        info!("Watching {}", ctx.key);
        loop {
            if ctx.freeze_checker.is_on() {
                warn!(
                    "{} frozen by: {}",
                    ctx.key,
                    ctx.freeze_checker.names_on().join(", ")
                );
                if !ctx.wait_unfrozen().await {
                    break;
                }
                info!("{} resumed", ctx.key);
            }
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.heartbeat) => debug!("{} still watching", ctx.key),
            }
        }
        info!("Stopped watching {}", ctx.key);
        Ok(())
    }

    async fn run_peering(&self, ctx: TaskContext) -> Result<()> {
        info!("Observing peering '{}' for {}", ctx.peering_name, ctx.key);
        // Without a real peering backend there are never conflicting peers.
        if let Some(toggle) = &ctx.freeze_toggle {
            toggle.turn_to(false);
        }
        ctx.cancel.cancelled().await;
        Ok(())
    }

    async fn run_pinging(&self, ctx: TaskContext) -> Result<()> {
        let mut keepalive = tokio::time::interval(self.heartbeat);
        loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                _ = keepalive.tick() => {
                    debug!("{} alive in peering '{}' for {}", ctx.identity, ctx.peering_name, ctx.key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;

    fn context(kind: TaskKind, checker: ToggleSet, toggle: Option<Toggle>) -> TaskContext {
        TaskContext {
            key: EnsembleKey::new(Resource::new("example.com", "v1", "widgets"), None),
            kind,
            identity: "test".to_string(),
            peering_name: "default".to_string(),
            cancel: CancellationToken::new(),
            freeze_checker: checker,
            freeze_toggle: toggle,
        }
    }

    #[tokio::test]
    async fn test_wait_unfrozen_respects_cancel() {
        let checker = ToggleSet::new();
        checker.make_toggle(true, "blocker");
        let ctx = context(TaskKind::Watcher, checker, None);
        ctx.cancel.cancel();
        assert!(!ctx.wait_unfrozen().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logging_watcher_exits_on_cancel() {
        let factory = LoggingTaskFactory::new(Duration::from_secs(1));
        let ctx = context(TaskKind::Watcher, ToggleSet::new(), None);
        let cancel = ctx.cancel.clone();

        let task = tokio::spawn(async move { factory.run_watcher(ctx).await });
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_logging_peering_clears_conflict_toggle() {
        let checker = ToggleSet::new();
        let toggle = checker.make_toggle(true, "default@*");
        let ctx = context(TaskKind::Peering, checker.clone(), Some(toggle));
        let cancel = ctx.cancel.clone();

        let factory = LoggingTaskFactory::default();
        let task = tokio::spawn(async move { factory.run_peering(ctx).await });
        checker.wait_for(false).await;
        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
