use crate::config::SchedulerConfig;
use crate::scheduler::{PriorityTaskScheduler, TaskScheduler};
use crate::types::{SchedulerStats, Task};
use aquila_agent::AgentDirectory;
use aquila_core::{subjects, AquilaResult, EventBus};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// Generate a task id of the form `task_{unix_millis}_{7 hex chars}`.
pub fn generate_task_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("task_{}_{}", Utc::now().timestamp_millis(), &suffix[..7])
}

/// The user-facing entry point: creates tasks for agents and forwards
/// cancel/pause/resume to the one scheduler it owns.
///
/// Build one per process at the composition root and share it by reference.
pub struct Orchestrator {
    scheduler: Arc<dyn TaskScheduler>,
    default_priority: i64,
    event_log: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Create an orchestrator backed by a [`PriorityTaskScheduler`].
    pub fn new(
        config: &SchedulerConfig,
        agents: Arc<dyn AgentDirectory>,
        bus: EventBus,
    ) -> AquilaResult<Self> {
        let scheduler = PriorityTaskScheduler::new(config, agents, bus.clone())?;
        let mut orchestrator = Self::with_scheduler(Arc::new(scheduler), config.default_priority);
        orchestrator.event_log = Some(tokio::spawn(log_system_events(bus)));
        Ok(orchestrator)
    }

    /// Create an orchestrator around any scheduler implementation.
    pub fn with_scheduler(scheduler: Arc<dyn TaskScheduler>, default_priority: i64) -> Self {
        Self {
            scheduler,
            default_priority,
            event_log: None,
        }
    }

    /// Create a task for `agent_id` with the default priority. Returns its id.
    pub fn create_task(&self, agent_id: &str, data: serde_json::Value) -> AquilaResult<String> {
        self.create_task_with_priority(agent_id, data, self.default_priority)
    }

    /// Create a task for `agent_id` with an explicit priority. Returns its id.
    pub fn create_task_with_priority(
        &self,
        agent_id: &str,
        data: serde_json::Value,
        priority: i64,
    ) -> AquilaResult<String> {
        let task_id = generate_task_id();
        let task = Task::new(task_id.clone(), agent_id, data).with_priority(priority);
        self.scheduler.schedule_task(task)?;
        Ok(task_id)
    }

    pub fn cancel_task(&self, task_id: &str) -> bool {
        self.scheduler.cancel_task(task_id)
    }

    pub fn pause(&self) {
        self.scheduler.pause_processing();
    }

    pub fn resume(&self) {
        self.scheduler.resume_processing();
    }

    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.scheduler.task(task_id)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub fn scheduler(&self) -> &Arc<dyn TaskScheduler> {
        &self.scheduler
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(handle) = self.event_log.take() {
            handle.abort();
        }
    }
}

async fn log_system_events(bus: EventBus) {
    let mut events = bus.subscribe();
    drop(bus);
    while let Some(event) = events.recv_subject(subjects::SYSTEM).await {
        debug!(
            action = event.action().unwrap_or("unknown"),
            payload = %event.payload,
            "Orchestrator received system event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;
    use aquila_core::AquilaError;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Records calls instead of scheduling anything.
    #[derive(Default)]
    struct RecordingScheduler {
        scheduled: Mutex<Vec<Task>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl TaskScheduler for RecordingScheduler {
        fn schedule_task(&self, task: Task) -> AquilaResult<()> {
            let mut scheduled = self.scheduled.lock();
            if scheduled.iter().any(|t| t.id == task.id) {
                return Err(AquilaError::DuplicateTaskId(task.id));
            }
            scheduled.push(task);
            Ok(())
        }

        fn cancel_task(&self, task_id: &str) -> bool {
            self.calls.lock().push("cancel");
            self.scheduled.lock().iter().any(|t| t.id == task_id)
        }

        fn pause_processing(&self) {
            self.calls.lock().push("pause");
        }

        fn resume_processing(&self) {
            self.calls.lock().push("resume");
        }

        fn task(&self, task_id: &str) -> Option<Task> {
            self.scheduled.lock().iter().find(|t| t.id == task_id).cloned()
        }

        fn stats(&self) -> SchedulerStats {
            SchedulerStats::from_tasks(self.scheduled.lock().iter())
        }
    }

    #[test]
    fn test_generate_task_id_format() {
        let id = generate_task_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "task");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 7);
        assert_ne!(generate_task_id(), generate_task_id());
    }

    #[test]
    fn test_create_task_defaults() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let orchestrator = Orchestrator::with_scheduler(scheduler.clone(), 1);

        let id = orchestrator.create_task("writer", json!({"topic": "rust"})).unwrap();
        let task = orchestrator.task(&id).unwrap();
        assert_eq!(task.agent_id, "writer");
        assert_eq!(task.priority, 1);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.data, json!({"topic": "rust"}));
        assert_eq!(orchestrator.stats().total, 1);
    }

    #[test]
    fn test_create_task_with_priority() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let orchestrator = Orchestrator::with_scheduler(scheduler, 1);
        let id = orchestrator
            .create_task_with_priority("writer", json!(null), 8)
            .unwrap();
        assert_eq!(orchestrator.task(&id).unwrap().priority, 8);
    }

    #[test]
    fn test_forwards_control_calls() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let orchestrator = Orchestrator::with_scheduler(scheduler.clone(), 1);

        orchestrator.pause();
        orchestrator.resume();
        assert!(!orchestrator.cancel_task("nope"));

        assert_eq!(*scheduler.calls.lock(), ["pause", "resume", "cancel"]);
    }
}
