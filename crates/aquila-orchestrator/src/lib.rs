//! Task scheduling core of the Aquila multi-agent orchestration layer.
//!
//! Accepts tasks destined for named agents, holds them in a priority-ordered
//! queue, and dispatches them for execution under a bounded-concurrency limit
//! while reacting to agents being removed from the registry.
//!
//! # Main types
//!
//! - [`Orchestrator`] — Facade that creates tasks and owns one scheduler.
//! - [`PriorityTaskScheduler`] — Dispatch loop with priority queue and concurrency gate.
//! - [`TaskScheduler`] — Trait implemented by schedulers the facade can drive.
//! - [`TaskQueue`] — Priority-ordered queue of pending task ids.
//! - [`ConcurrencyGate`] — Limit on simultaneously running tasks.
//! - [`LifecycleNotifier`] — Publishes scheduling milestones on the event bus.
//! - [`SchedulerConfig`] — Concurrency limit, timeout and defaults.

/// Scheduler configuration.
pub mod config;
/// Orchestrator facade.
pub mod engine;
/// Execution pool for agent work.
pub mod executor;
/// Concurrency gate.
pub mod gate;
/// Lifecycle notifications.
pub mod notifier;
/// Dispatch loop and scheduler trait.
pub mod scheduler;
/// Priority queue of pending task ids.
pub mod task_queue;
/// Task model and failure reasons.
pub mod types;

pub use config::SchedulerConfig;
pub use engine::{generate_task_id, Orchestrator};
pub use executor::{ExecutionOutcome, ExecutionPool};
pub use gate::ConcurrencyGate;
pub use notifier::{LifecycleEvent, LifecycleNotifier};
pub use scheduler::{CancelOutcome, PriorityTaskScheduler, TaskScheduler};
pub use task_queue::TaskQueue;
pub use types::{SchedulerStats, Task, TaskFailure, TaskStatus};
