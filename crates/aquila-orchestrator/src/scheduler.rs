use crate::config::SchedulerConfig;
use crate::executor::{ExecutionOutcome, ExecutionPool};
use crate::gate::ConcurrencyGate;
use crate::notifier::{LifecycleEvent, LifecycleNotifier};
use crate::task_queue::TaskQueue;
use crate::types::{SchedulerStats, Task, TaskFailure, TaskStatus};
use aquila_agent::{AgentDirectory, AgentEvent, RemovalObserver};
use aquila_core::{AquilaError, AquilaResult, EventBus, EventSubscription, Received};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Operations the [`Orchestrator`](crate::Orchestrator) drives.
pub trait TaskScheduler: Send + Sync {
    /// Accept a task. Fails with [`AquilaError::DuplicateTaskId`] if the id was seen before.
    fn schedule_task(&self, task: Task) -> AquilaResult<()>;

    /// Cancel a task. Returns `true` only if the cancellation took effect.
    fn cancel_task(&self, task_id: &str) -> bool;

    /// Stop starting new executions. Running ones continue.
    fn pause_processing(&self);

    /// Start dispatching again.
    fn resume_processing(&self);

    /// Snapshot of one task.
    fn task(&self, task_id: &str) -> Option<Task>;

    /// Counts of tasks by status.
    fn stats(&self) -> SchedulerStats;
}

/// Result of [`PriorityTaskScheduler::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The task was pending or running and is now failed with "Task cancelled".
    Cancelled,
    /// No task has this id.
    NotFound,
    /// The task had already completed or failed.
    AlreadyTerminal,
}

struct SchedulerState {
    tasks: HashMap<String, Task>,
    queue: TaskQueue,
    gate: ConcurrencyGate,
    paused: bool,
}

impl SchedulerState {
    /// Fail a non-terminal task, dequeuing it or releasing its slot.
    /// Returns the status it left, or `None` if nothing changed.
    fn terminate(&mut self, task_id: &str, failure: &TaskFailure) -> Option<TaskStatus> {
        let task = self.tasks.get_mut(task_id)?;
        let previous = task.status;
        if !task.mark_failed(failure.to_string()) {
            return None;
        }
        match previous {
            TaskStatus::Pending => {
                self.queue.remove_if_present(task_id);
            }
            TaskStatus::Running => self.gate.release(),
            TaskStatus::Completed | TaskStatus::Failed => {}
        }
        Some(previous)
    }
}

struct Shared {
    state: Mutex<SchedulerState>,
    /// Work-available signal. A signal raised while a pass is running is
    /// kept as a permit and triggers exactly one more pass.
    work: Notify,
    agents: Arc<dyn AgentDirectory>,
    notifier: LifecycleNotifier,
    pool: ExecutionPool,
}

impl Shared {
    fn wake(&self) {
        self.work.notify_one();
    }

    /// One dispatch pass: move pending tasks to running until the gate is
    /// full, the queue is empty, or the scheduler is paused.
    fn dispatch_pass(self: &Arc<Self>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.paused {
            debug!("Dispatch skipped, scheduler paused");
            return;
        }

        let mut started = 0usize;
        while state.gate.has_capacity() && !state.paused {
            let Some(task_id) = state.queue.pop_front() else {
                break;
            };
            let Some(task) = state.tasks.get_mut(&task_id) else {
                continue;
            };
            if task.status != TaskStatus::Pending {
                continue;
            }

            let Some(agent) = self.agents.lookup(&task.agent_id) else {
                let failure = TaskFailure::AgentNotFound {
                    agent_id: task.agent_id.clone(),
                };
                if task.mark_failed(failure.to_string()) {
                    self.notifier.notify(LifecycleEvent::TaskFailed {
                        task_id,
                        error: failure.to_string(),
                    });
                }
                continue;
            };

            let started_running = task.mark_running();
            debug_assert!(started_running, "queued task was not pending");
            let acquired = state.gate.try_acquire();
            debug_assert!(acquired, "gate reported capacity but refused a slot");
            started += 1;
            self.notifier.notify(LifecycleEvent::TaskStarted {
                task_id: task_id.clone(),
                agent_id: task.agent_id.clone(),
            });

            let input = task.data.clone();
            let shared = Arc::clone(self);
            let settled_id = task_id.clone();
            self.pool.launch(task_id, agent, input, move |outcome| {
                shared.settle(&settled_id, outcome);
            });
        }

        debug!(
            started,
            running = state.gate.in_flight(),
            queued = state.queue.len(),
            "Dispatch pass finished"
        );
    }

    /// Record how an execution ended. Ignored if the task already reached a
    /// terminal status through cancellation or agent removal.
    fn settle(&self, task_id: &str, outcome: ExecutionOutcome) {
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(task) = state.tasks.get_mut(task_id) else {
                return;
            };
            if task.status != TaskStatus::Running {
                debug!(task_id = %task_id, status = %task.status, "Ignoring outcome for finished task");
                return;
            }

            match outcome {
                ExecutionOutcome::Succeeded(result) => {
                    task.mark_completed(result.clone());
                    state.gate.release();
                    self.notifier.notify(LifecycleEvent::TaskCompleted {
                        task_id: task_id.to_string(),
                        result,
                    });
                }
                ExecutionOutcome::Failed(failure) => {
                    if state.terminate(task_id, &failure).is_some() {
                        self.notifier.notify(LifecycleEvent::TaskFailed {
                            task_id: task_id.to_string(),
                            error: failure.to_string(),
                        });
                    }
                }
            }
        }
        self.wake();
    }

    fn handle_agent_removal(&self, agent_id: &str) -> usize {
        let failure = TaskFailure::AgentRemoved {
            agent_id: agent_id.to_string(),
        };
        let mut freed_slot = false;
        let failed = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let mut affected: Vec<(chrono::DateTime<chrono::Utc>, String)> = state
                .tasks
                .values()
                .filter(|t| t.agent_id == agent_id && !t.is_terminal())
                .map(|t| (t.created_at, t.id.clone()))
                .collect();
            affected.sort();

            let mut failed = 0usize;
            for (_, task_id) in affected {
                if let Some(previous) = state.terminate(&task_id, &failure) {
                    freed_slot |= previous == TaskStatus::Running;
                    failed += 1;
                    self.notifier.notify(LifecycleEvent::TaskFailed {
                        task_id,
                        error: failure.to_string(),
                    });
                }
            }

            let tasks = &state.tasks;
            state
                .queue
                .retain(|id| tasks.get(id).map_or(true, |t| t.agent_id != agent_id));
            failed
        };

        if failed > 0 {
            info!(agent_id = %agent_id, failed, "Failed tasks of removed agent");
        }
        if freed_slot {
            self.wake();
        }
        failed
    }

    /// Fail the tasks of every agent the directory no longer knows. Used when
    /// removal notifications may have been lost.
    fn fail_orphaned_tasks(&self) -> usize {
        let agent_ids: BTreeSet<String> = {
            let state = self.state.lock();
            state
                .tasks
                .values()
                .filter(|t| !t.is_terminal())
                .map(|t| t.agent_id.clone())
                .collect()
        };
        agent_ids
            .iter()
            .filter(|id| self.agents.lookup(id).is_none())
            .map(|id| self.handle_agent_removal(id))
            .sum()
    }
}

impl RemovalObserver for Shared {
    fn agent_removed(&self, agent_id: &str) {
        self.handle_agent_removal(agent_id);
    }
}

/// Priority-ordered, bounded-concurrency task scheduler.
///
/// A single dispatcher task owns dispatch passes, so passes never overlap.
/// Agent executions launched by a pass run concurrently on the tokio runtime
/// and report back through [`ExecutionPool`].
///
/// Agent removals reach the scheduler synchronously through
/// [`AgentDirectory::observe_removals`], so a task whose agent was removed
/// before dispatch always fails as removed. A background task also listens
/// for `agent_unregistered` on the bus for directories that cannot report
/// removals directly; if that subscription lags it re-checks every agent.
///
/// Must be created inside a tokio runtime.
pub struct PriorityTaskScheduler {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PriorityTaskScheduler {
    pub fn new(
        config: &SchedulerConfig,
        agents: Arc<dyn AgentDirectory>,
        bus: EventBus,
    ) -> AquilaResult<Self> {
        config.validate()?;
        let handle = Handle::try_current().map_err(|e| {
            AquilaError::Orchestrator(format!("scheduler requires a tokio runtime: {e}"))
        })?;

        let removals = bus.subscribe();
        let shared = Arc::new(Shared {
            state: Mutex::new(SchedulerState {
                tasks: HashMap::new(),
                queue: TaskQueue::new(),
                gate: ConcurrencyGate::new(config.max_concurrent_tasks),
                paused: false,
            }),
            work: Notify::new(),
            agents,
            notifier: LifecycleNotifier::new(bus),
            pool: ExecutionPool::new(handle.clone(), config.execution_timeout()),
        });
        shared
            .agents
            .observe_removals(Arc::downgrade(&shared) as Weak<dyn RemovalObserver>);

        let dispatcher = handle.spawn(run_dispatcher(Arc::clone(&shared)));
        let listener = handle.spawn(run_removal_listener(Arc::clone(&shared), removals));

        info!(
            max_concurrent_tasks = config.max_concurrent_tasks,
            timeout_ms = ?config.execution_timeout_ms,
            "Scheduler started"
        );

        Ok(Self {
            shared,
            workers: Mutex::new(vec![dispatcher, listener]),
        })
    }

    /// Cancel a task and report why nothing happened if it could not be.
    ///
    /// Cancelling a running task marks it failed immediately and frees its
    /// slot; the agent execution itself is not interrupted and its eventual
    /// outcome is discarded.
    pub fn cancel(&self, task_id: &str) -> CancelOutcome {
        let previous = {
            let mut state = self.shared.state.lock();
            match state.tasks.get(task_id) {
                None => return CancelOutcome::NotFound,
                Some(task) if task.is_terminal() => return CancelOutcome::AlreadyTerminal,
                Some(_) => {}
            }
            let previous = state.terminate(task_id, &TaskFailure::Cancelled);
            if previous.is_some() {
                self.shared.notifier.notify(LifecycleEvent::TaskCancelled {
                    task_id: task_id.to_string(),
                });
            }
            previous
        };

        if previous == Some(TaskStatus::Running) {
            self.shared.wake();
        }
        CancelOutcome::Cancelled
    }

    /// Fail every pending or running task of `agent_id` and purge its queued
    /// ids. Idempotent: tasks already terminal are left alone. Returns the
    /// number of tasks failed.
    pub fn handle_agent_removal(&self, agent_id: &str) -> usize {
        self.shared.handle_agent_removal(agent_id)
    }

    /// Fail the non-terminal tasks of every agent the directory no longer
    /// resolves, as if each had been removed. Returns the number failed.
    pub fn reconcile_agents(&self) -> usize {
        self.shared.fail_orphaned_tasks()
    }

    /// All tasks ordered by creation time.
    pub fn tasks(&self) -> Vec<Task> {
        let state = self.shared.state.lock();
        let mut tasks: Vec<Task> = state.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    /// Pending ids in dispatch order.
    pub fn pending_ids(&self) -> Vec<String> {
        self.shared.state.lock().queue.ids()
    }

    pub fn running_count(&self) -> usize {
        self.shared.state.lock().gate.in_flight()
    }

    pub fn max_concurrent_tasks(&self) -> usize {
        self.shared.state.lock().gate.limit()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().paused
    }

    /// Stop the dispatcher and the removal listener. Running executions are
    /// left to finish; queued tasks stay pending.
    pub fn shutdown(&self) {
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        if workers.is_empty() {
            return;
        }
        for worker in workers {
            worker.abort();
        }
        info!("Scheduler stopped");
    }
}

impl TaskScheduler for PriorityTaskScheduler {
    fn schedule_task(&self, task: Task) -> AquilaResult<()> {
        {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            if state.tasks.contains_key(&task.id) {
                warn!(task_id = %task.id, "Rejected duplicate task id");
                return Err(AquilaError::DuplicateTaskId(task.id));
            }

            let task = task.into_pending();
            let task_id = task.id.clone();
            let agent_id = task.agent_id.clone();
            state.queue.insert(task_id.clone(), task.priority);
            state.tasks.insert(task_id.clone(), task);
            self.shared
                .notifier
                .notify(LifecycleEvent::TaskScheduled { task_id, agent_id });
        }
        self.shared.wake();
        Ok(())
    }

    fn cancel_task(&self, task_id: &str) -> bool {
        self.cancel(task_id) == CancelOutcome::Cancelled
    }

    fn pause_processing(&self) {
        self.shared.state.lock().paused = true;
        self.shared.notifier.notify(LifecycleEvent::SchedulerPaused);
    }

    fn resume_processing(&self) {
        self.shared.state.lock().paused = false;
        self.shared.notifier.notify(LifecycleEvent::SchedulerResumed);
        self.shared.wake();
    }

    fn task(&self, task_id: &str) -> Option<Task> {
        self.shared.state.lock().tasks.get(task_id).cloned()
    }

    fn stats(&self) -> SchedulerStats {
        SchedulerStats::from_tasks(self.shared.state.lock().tasks.values())
    }
}

impl Drop for PriorityTaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_dispatcher(shared: Arc<Shared>) {
    loop {
        shared.work.notified().await;
        shared.dispatch_pass();
    }
}

async fn run_removal_listener(shared: Arc<Shared>, mut events: EventSubscription) {
    while let Some(received) = events.recv_or_lag().await {
        match received {
            Received::Event(event) => {
                if let Some(AgentEvent::AgentUnregistered { agent_id }) =
                    AgentEvent::from_event(&event)
                {
                    debug!(agent_id = %agent_id, "Agent removal observed");
                    shared.handle_agent_removal(&agent_id);
                }
            }
            Received::Lagged(skipped) => {
                warn!(skipped, "Removal listener lagged, re-checking agents");
                let failed = shared.fail_orphaned_tasks();
                if failed > 0 {
                    info!(failed, "Failed tasks of agents removed while lagging");
                }
            }
        }
    }
}
