use crate::types::TaskFailure;
use aquila_agent::Agent;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error};

/// How an agent execution settled.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Succeeded(serde_json::Value),
    Failed(TaskFailure),
}

/// Runs agent executions as tokio tasks and reports each outcome to a
/// completion callback.
///
/// `launch` returns immediately. The callback runs exactly once per launch,
/// including when the agent returns an error, panics, or exceeds the
/// configured timeout. Without a timeout an execution that never settles
/// never invokes its callback.
pub struct ExecutionPool {
    handle: Handle,
    timeout: Option<Duration>,
}

impl ExecutionPool {
    pub fn new(handle: Handle, timeout: Option<Duration>) -> Self {
        Self {
            handle,
            timeout,
        }
    }

    /// Start `agent.process(input)` and hand the outcome to `on_settle`.
    pub fn launch<F>(
        &self,
        task_id: String,
        agent: Arc<dyn Agent>,
        input: serde_json::Value,
        on_settle: F,
    ) where
        F: FnOnce(ExecutionOutcome) + Send + 'static,
    {
        let timeout = self.timeout;

        let work = self
            .handle
            .spawn(async move { execute(agent.as_ref(), input, timeout).await });

        self.handle.spawn(async move {
            let outcome = match work.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    error!(task_id = %task_id, "Agent execution panicked");
                    ExecutionOutcome::Failed(TaskFailure::Execution(
                        "Agent execution panicked".to_string(),
                    ))
                }
                Err(_) => ExecutionOutcome::Failed(TaskFailure::Execution(
                    "Agent execution aborted".to_string(),
                )),
            };
            debug!(task_id = %task_id, "Execution settled");
            on_settle(outcome);
        });
    }
}

async fn execute(
    agent: &dyn Agent,
    input: serde_json::Value,
    timeout: Option<Duration>,
) -> ExecutionOutcome {
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, agent.process(input)).await {
            Ok(result) => result,
            Err(_) => {
                return ExecutionOutcome::Failed(TaskFailure::TimedOut {
                    after_ms: limit.as_millis() as u64,
                })
            }
        },
        None => agent.process(input).await,
    };

    match result {
        Ok(output) => ExecutionOutcome::Succeeded(output),
        Err(e) => ExecutionOutcome::Failed(TaskFailure::Execution(e.to_string())),
    }
}
