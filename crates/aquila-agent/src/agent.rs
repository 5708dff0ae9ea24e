use aquila_core::AquilaResult;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

/// Trait that all agents must implement.
///
/// `process` is treated by the scheduler as an opaque, fallible operation:
/// its input is the task payload and its output becomes the task result.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique identifier the agent is registered under.
    fn id(&self) -> &str;

    /// Human-readable name. Defaults to the id.
    fn name(&self) -> &str {
        self.id()
    }

    /// Prepare the agent before it receives work.
    async fn init(&self) -> AquilaResult<()> {
        Ok(())
    }

    /// Process one unit of work.
    async fn process(&self, input: serde_json::Value) -> AquilaResult<serde_json::Value>;

    /// Release any resources held by the agent.
    async fn shutdown(&self) -> AquilaResult<()> {
        Ok(())
    }
}

/// Lookup of agents by id. This is the only view of the registry the
/// scheduler depends on.
pub trait AgentDirectory: Send + Sync {
    /// Find the agent registered under `agent_id`.
    fn lookup(&self, agent_id: &str) -> Option<Arc<dyn Agent>>;

    /// Call `observer` synchronously whenever an agent is removed, before the
    /// removing call returns. Directories that cannot report removals ignore it.
    fn observe_removals(&self, _observer: Weak<dyn RemovalObserver>) {}
}

/// Receives agent removals from an [`AgentDirectory`].
pub trait RemovalObserver: Send + Sync {
    /// `agent_id` is no longer available. Must not call back into the directory
    /// with a write.
    fn agent_removed(&self, agent_id: &str);
}

type Handler = Box<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = AquilaResult<serde_json::Value>> + Send>>
        + Send
        + Sync,
>;

/// An agent whose `process` is backed by a closure.
pub struct FnAgent {
    id: String,
    name: String,
    handler: Handler,
}

impl FnAgent {
    /// Create an agent that answers every request with `handler`.
    pub fn new<F, Fut>(id: impl Into<String>, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AquilaResult<serde_json::Value>> + Send + 'static,
    {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            handler: Box::new(move |input| Box::pin(handler(input))),
        }
    }

    /// Set a display name distinct from the id.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Agent for FnAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, input: serde_json::Value) -> AquilaResult<serde_json::Value> {
        (self.handler)(input).await
    }
}
