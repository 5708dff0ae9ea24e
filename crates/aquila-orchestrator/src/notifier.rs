use aquila_core::{subjects, Event, EventBus};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Scheduling milestones, published on [`subjects::SYSTEM`] with an
/// `action` discriminator and camelCase payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LifecycleEvent {
    TaskScheduled {
        task_id: String,
        agent_id: String,
    },
    TaskStarted {
        task_id: String,
        agent_id: String,
    },
    TaskCompleted {
        task_id: String,
        result: serde_json::Value,
    },
    TaskFailed {
        task_id: String,
        error: String,
    },
    TaskCancelled {
        task_id: String,
    },
    SchedulerPaused,
    SchedulerResumed,
}

const ACTIONS: &[&str] = &[
    "task_scheduled",
    "task_started",
    "task_completed",
    "task_failed",
    "task_cancelled",
    "scheduler_paused",
    "scheduler_resumed",
];

impl LifecycleEvent {
    /// Decode a lifecycle event from a bus event, if it is one.
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.subject != subjects::SYSTEM {
            return None;
        }
        let action = event.action()?;
        if !ACTIONS.contains(&action) {
            return None;
        }
        serde_json::from_value(event.payload.clone()).ok()
    }

    /// The task this event concerns, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            LifecycleEvent::TaskScheduled { task_id, .. }
            | LifecycleEvent::TaskStarted { task_id, .. }
            | LifecycleEvent::TaskCompleted { task_id, .. }
            | LifecycleEvent::TaskFailed { task_id, .. }
            | LifecycleEvent::TaskCancelled { task_id } => Some(task_id),
            LifecycleEvent::SchedulerPaused | LifecycleEvent::SchedulerResumed => None,
        }
    }
}

/// Publishes [`LifecycleEvent`]s and traces each one.
#[derive(Clone)]
pub struct LifecycleNotifier {
    bus: EventBus,
}

impl LifecycleNotifier {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn notify(&self, event: LifecycleEvent) {
        match &event {
            LifecycleEvent::TaskScheduled { task_id, agent_id } => {
                info!(task_id = %task_id, agent_id = %agent_id, "Task scheduled");
            }
            LifecycleEvent::TaskStarted { task_id, agent_id } => {
                info!(task_id = %task_id, agent_id = %agent_id, "Task started");
            }
            LifecycleEvent::TaskCompleted { task_id, .. } => {
                info!(task_id = %task_id, "Task completed");
            }
            LifecycleEvent::TaskFailed { task_id, error } => {
                warn!(task_id = %task_id, error = %error, "Task failed");
            }
            LifecycleEvent::TaskCancelled { task_id } => {
                info!(task_id = %task_id, "Task cancelled");
            }
            LifecycleEvent::SchedulerPaused => info!("Scheduler paused"),
            LifecycleEvent::SchedulerResumed => info!("Scheduler resumed"),
        }

        if let Err(e) = self.bus.emit(subjects::SYSTEM, &event) {
            warn!(error = %e, "Failed to publish lifecycle event");
        }
    }
}
