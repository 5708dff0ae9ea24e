use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority assigned to tasks that do not specify one.
pub const DEFAULT_PRIORITY: i64 = 1;

/// Status of a task. Transitions only move forward:
/// `Pending → Running → {Completed, Failed}` or `Pending → Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether the status is final.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Why a task ended in [`TaskStatus::Failed`]. The display string is what
/// gets stored in [`Task::error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskFailure {
    /// The target agent was not registered when the task was dispatched.
    #[error("Agent {agent_id} not found")]
    AgentNotFound { agent_id: String },

    /// The target agent was removed while the task was pending or running.
    #[error("Agent {agent_id} was removed")]
    AgentRemoved { agent_id: String },

    /// The agent's processing step failed.
    #[error("{0}")]
    Execution(String),

    /// The execution exceeded the configured timeout.
    #[error("Task timed out after {after_ms}ms")]
    TimedOut { after_ms: u64 },

    /// The task was cancelled by a caller.
    #[error("Task cancelled")]
    Cancelled,
}

/// A unit of work directed at a named agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub agent_id: String,
    /// Higher values are dispatched first; ties keep scheduling order.
    pub priority: i64,
    /// Opaque payload handed to the agent untouched.
    pub data: serde_json::Value,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        agent_id: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            priority: DEFAULT_PRIORITY,
            data,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Reset lifecycle fields so the task enters the scheduler as pending.
    pub(crate) fn into_pending(mut self) -> Self {
        self.status = TaskStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.result = None;
        self.error = None;
        self
    }

    /// `Pending → Running`.
    pub(crate) fn mark_running(&mut self) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// `Running → Completed`. No-op on any other status.
    pub(crate) fn mark_completed(&mut self, result: serde_json::Value) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        true
    }

    /// `Pending | Running → Failed`. No-op once terminal.
    pub(crate) fn mark_failed(&mut self, error: String) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
        true
    }
}

/// Point-in-time counts of tasks by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl SchedulerStats {
    /// Tally the given tasks.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = Self::default();
        for task in tasks {
            stats.total += 1;
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Whether every task has reached a terminal status.
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.running == 0
    }
}
