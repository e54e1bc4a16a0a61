//! Freeze toggles
//!
//! A [`ToggleSet`] is "on" while any of its member toggles is on. Tasks hold a
//! clone of the set and block on [`ToggleSet::wait_for`] while the operator is
//! frozen, either by a missing peering resource or by a conflicting peer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Debug)]
struct ToggleState {
    name: String,
    on: AtomicBool,
}

#[derive(Debug)]
struct SetShared {
    members: Mutex<Vec<Arc<ToggleState>>>,
    // Bumped on every membership or state change.
    changes: watch::Sender<u64>,
}

impl SetShared {
    fn members(&self) -> MutexGuard<'_, Vec<Arc<ToggleState>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }
}

/// A named boolean flag belonging to a [`ToggleSet`]
#[derive(Debug, Clone)]
pub struct Toggle {
    state: Arc<ToggleState>,
    set: Arc<SetShared>,
}

impl Toggle {
    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn is_on(&self) -> bool {
        self.state.on.load(Ordering::SeqCst)
    }

    /// Set the state; waiters on the owning set are woken on a transition
    pub fn turn_to(&self, on: bool) {
        if self.state.on.swap(on, Ordering::SeqCst) != on {
            self.set.notify();
        }
    }

    fn same_as(&self, other: &Toggle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

/// Aggregate of toggles, on while any member is on
#[derive(Debug, Clone)]
pub struct ToggleSet {
    shared: Arc<SetShared>,
}

impl Default for ToggleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ToggleSet {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            shared: Arc::new(SetShared {
                members: Mutex::new(Vec::new()),
                changes,
            }),
        }
    }

    /// Create a member toggle with an initial state
    pub fn make_toggle(&self, on: bool, name: impl Into<String>) -> Toggle {
        let state = Arc::new(ToggleState {
            name: name.into(),
            on: AtomicBool::new(on),
        });
        self.shared.members().push(Arc::clone(&state));
        self.shared.notify();
        Toggle {
            state,
            set: Arc::clone(&self.shared),
        }
    }

    /// Remove toggles from the set; toggles that are not members are ignored
    pub fn drop_toggles<'a>(&self, toggles: impl IntoIterator<Item = &'a Toggle>) {
        let toggles: Vec<&Toggle> = toggles.into_iter().collect();
        if toggles.is_empty() {
            return;
        }
        self.shared
            .members()
            .retain(|member| !toggles.iter().any(|t| Arc::ptr_eq(member, &t.state)));
        self.shared.notify();
    }

    pub fn contains(&self, toggle: &Toggle) -> bool {
        Arc::ptr_eq(&self.shared, &toggle.set)
            && self
                .shared
                .members()
                .iter()
                .any(|member| Arc::ptr_eq(member, &toggle.state))
    }

    pub fn is_on(&self) -> bool {
        self.shared
            .members()
            .iter()
            .any(|member| member.on.load(Ordering::SeqCst))
    }

    pub fn is_off(&self) -> bool {
        !self.is_on()
    }

    pub fn len(&self) -> usize {
        self.shared.members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the toggles currently on, for diagnostics
    pub fn names_on(&self) -> Vec<String> {
        self.shared
            .members()
            .iter()
            .filter(|member| member.on.load(Ordering::SeqCst))
            .map(|member| member.name.clone())
            .collect()
    }

    /// Wait until the aggregate state equals `on`
    pub async fn wait_for(&self, on: bool) {
        let mut changes = self.shared.changes.subscribe();
        while self.is_on() != on {
            // The sender lives as long as `self`, so this cannot fail.
            if changes.changed().await.is_err() {
                return;
            }
        }
    }
}

impl PartialEq for Toggle {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Toggle {}
