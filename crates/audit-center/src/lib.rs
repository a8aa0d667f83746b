//! Bounded audit trail for session activity.
//!
//! An injected collaborator (never a module global) that keeps the most
//! recent session transitions, plan acceptances and step dispatches in
//! ring buffers with an explicit capacity and drop-oldest eviction.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use pagepilot_core_types::TabId;

/// Outcome recorded for a dispatched step.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Success,
    Failure,
    ConfirmationDeclined,
}

/// One audit entry. Statuses and reasons travel as plain strings so the
/// ring stays decoupled from the session crates.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    Transition {
        tab: TabId,
        from: String,
        to: String,
        #[serde(skip)]
        recorded_at: SystemTime,
    },
    PlanAccepted {
        tab: TabId,
        version: u32,
        steps: usize,
        #[serde(skip)]
        recorded_at: SystemTime,
    },
    Dispatch {
        tab: TabId,
        step_index: usize,
        action: String,
        status: DispatchStatus,
        reason: Option<String>,
        #[serde(skip)]
        recorded_at: SystemTime,
    },
}

impl AuditEvent {
    pub fn transition(tab: TabId, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Transition {
            tab,
            from: from.into(),
            to: to.into(),
            recorded_at: SystemTime::now(),
        }
    }

    pub fn plan_accepted(tab: TabId, version: u32, steps: usize) -> Self {
        Self::PlanAccepted {
            tab,
            version,
            steps,
            recorded_at: SystemTime::now(),
        }
    }

    pub fn dispatch(
        tab: TabId,
        step_index: usize,
        action: impl Into<String>,
        status: DispatchStatus,
        reason: Option<String>,
    ) -> Self {
        Self::Dispatch {
            tab,
            step_index,
            action: action.into(),
            status,
            reason,
            recorded_at: SystemTime::now(),
        }
    }

    fn tab(&self) -> &TabId {
        match self {
            AuditEvent::Transition { tab, .. }
            | AuditEvent::PlanAccepted { tab, .. }
            | AuditEvent::Dispatch { tab, .. } => tab,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AuditStats {
    pub total_events: u64,
    pub transitions: u64,
    pub plans_accepted: u64,
    pub dispatch_success: u64,
    pub dispatch_failure: u64,
    pub confirmations_declined: u64,
}

#[derive(Debug)]
struct BoundedRing<T> {
    capacity: usize,
    data: VecDeque<T>,
}

impl<T: Clone> BoundedRing<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            data: VecDeque::new(),
        }
    }

    fn push(&mut self, item: T) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(item);
    }

    fn snapshot(&self) -> Vec<T> {
        self.data.iter().cloned().collect()
    }
}

#[async_trait]
pub trait AuditCenter: Send + Sync {
    async fn append(&self, event: AuditEvent);
}

/// In-memory ring buffer of recent audit events.
pub struct InMemoryAuditCenter {
    tab_capacity: usize,
    events: Mutex<BoundedRing<AuditEvent>>,
    tab_events: DashMap<TabId, Mutex<BoundedRing<AuditEvent>>>,
    stats: Mutex<AuditStats>,
}

impl InMemoryAuditCenter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            tab_capacity: std::cmp::max(capacity / 2, 16),
            events: Mutex::new(BoundedRing::new(capacity)),
            tab_events: DashMap::new(),
            stats: Mutex::new(AuditStats::default()),
        }
    }

    pub fn snapshot(&self) -> Vec<AuditEvent> {
        self.events.lock().snapshot()
    }

    pub fn recent_tab(&self, tab: &TabId) -> Vec<AuditEvent> {
        self.tab_events
            .get(tab)
            .map(|entry| entry.value().lock().snapshot())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> AuditStats {
        self.stats.lock().clone()
    }

    fn update_stats(&self, event: &AuditEvent) {
        let mut stats = self.stats.lock();
        stats.total_events = stats.total_events.saturating_add(1);
        match event {
            AuditEvent::Transition { .. } => {
                stats.transitions = stats.transitions.saturating_add(1)
            }
            AuditEvent::PlanAccepted { .. } => {
                stats.plans_accepted = stats.plans_accepted.saturating_add(1)
            }
            AuditEvent::Dispatch { status, .. } => match status {
                DispatchStatus::Success => {
                    stats.dispatch_success = stats.dispatch_success.saturating_add(1)
                }
                DispatchStatus::Failure => {
                    stats.dispatch_failure = stats.dispatch_failure.saturating_add(1)
                }
                DispatchStatus::ConfirmationDeclined => {
                    stats.confirmations_declined = stats.confirmations_declined.saturating_add(1)
                }
            },
        }
    }
}

#[async_trait]
impl AuditCenter for InMemoryAuditCenter {
    async fn append(&self, event: AuditEvent) {
        {
            let mut guard = self.events.lock();
            guard.push(event.clone());
        }
        {
            let mut entry = self
                .tab_events
                .entry(event.tab().clone())
                .or_insert_with(|| Mutex::new(BoundedRing::new(self.tab_capacity)));
            entry.value_mut().lock().push(event.clone());
        }
        self.update_stats(&event);
    }
}

/// No-op center for tests and hosts that do not collect audit data.
pub struct NoopAuditCenter;

impl NoopAuditCenter {
    pub fn new() -> Arc<dyn AuditCenter> {
        Arc::new(Self)
    }
}

#[async_trait]
impl AuditCenter for NoopAuditCenter {
    async fn append(&self, _event: AuditEvent) {}
}
