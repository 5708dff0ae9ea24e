use crate::agent::{Agent, AgentDirectory, RemovalObserver};
use aquila_core::{subjects, AquilaError, AquilaResult, Event, EventBus};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{error, info, warn};

/// Registry lifecycle events, published on [`subjects::SYSTEM`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AgentEvent {
    /// An agent became available.
    AgentRegistered {
        /// Id of the new agent.
        agent_id: String,
        /// Display name of the new agent.
        agent_name: String,
    },
    /// An agent was removed and will receive no further work.
    AgentUnregistered {
        /// Id of the removed agent.
        agent_id: String,
    },
}

impl AgentEvent {
    /// Decode an agent event from a bus event, if it is one.
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.subject != subjects::SYSTEM {
            return None;
        }
        match event.action() {
            Some("agent_registered" | "agent_unregistered") => {
                serde_json::from_value(event.payload.clone()).ok()
            }
            _ => None,
        }
    }
}

/// Central registry for all available agents.
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
    observers: RwLock<Vec<Weak<dyn RemovalObserver>>>,
    bus: EventBus,
}

impl AgentRegistry {
    /// Create an empty registry announcing changes on `bus`.
    pub fn new(bus: EventBus) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
            bus,
        }
    }

    /// Register an agent. Fails if the id is already taken.
    pub fn register(&self, agent: Arc<dyn Agent>) -> AquilaResult<()> {
        let id = agent.id().to_string();
        let name = agent.name().to_string();
        {
            let mut agents = self.agents.write();
            if agents.contains_key(&id) {
                return Err(AquilaError::DuplicateAgent(id));
            }
            agents.insert(id.clone(), agent);
        }
        info!(agent_id = %id, agent_name = %name, "Registered agent");
        self.announce(&AgentEvent::AgentRegistered {
            agent_id: id,
            agent_name: name,
        });
        Ok(())
    }

    /// Remove an agent and shut it down in the background.
    ///
    /// Removal observers have run by the time this returns. Returns `false`
    /// if no agent was registered under `agent_id`.
    pub fn unregister(&self, agent_id: &str) -> bool {
        let Some(agent) = self.agents.write().remove(agent_id) else {
            return false;
        };
        self.notify_removed(agent_id);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let id = agent_id.to_string();
                handle.spawn(async move {
                    if let Err(e) = agent.shutdown().await {
                        error!(agent_id = %id, error = %e, "Error shutting down agent");
                    }
                });
            }
            Err(_) => {
                warn!(agent_id = %agent_id, "No runtime available, skipping agent shutdown");
            }
        }

        info!(agent_id = %agent_id, "Unregistered agent");
        self.announce(&AgentEvent::AgentUnregistered {
            agent_id: agent_id.to_string(),
        });
        true
    }

    /// Get an agent by id.
    pub fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().get(agent_id).cloned()
    }

    /// All registered agents, ordered by id.
    pub fn list(&self) -> Vec<Arc<dyn Agent>> {
        let mut agents: Vec<Arc<dyn Agent>> = self.agents.read().values().cloned().collect();
        agents.sort_by(|a, b| a.id().cmp(b.id()));
        agents
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    /// Whether no agents are registered.
    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }

    /// Initialize every registered agent, stopping at the first failure.
    pub async fn initialize_all(&self) -> AquilaResult<()> {
        for agent in self.list() {
            if let Err(e) = agent.init().await {
                error!(agent_id = %agent.id(), error = %e, "Failed to initialize agent");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Shut down every agent and clear the registry. Errors are logged.
    pub async fn shutdown_all(&self) {
        let agents: Vec<Arc<dyn Agent>> = self.agents.write().drain().map(|(_, a)| a).collect();
        for agent in agents {
            if let Err(e) = agent.shutdown().await {
                error!(agent_id = %agent.id(), error = %e, "Failed to shutdown agent");
            }
        }
    }

    fn notify_removed(&self, agent_id: &str) {
        let observers: Vec<Arc<dyn RemovalObserver>> =
            self.observers.read().iter().filter_map(Weak::upgrade).collect();
        for observer in &observers {
            observer.agent_removed(agent_id);
        }
        self.observers.write().retain(|o| o.strong_count() > 0);
    }

    fn announce(&self, event: &AgentEvent) {
        if let Err(e) = self.bus.emit(subjects::SYSTEM, event) {
            warn!(error = %e, "Failed to publish agent event");
        }
    }
}

impl AgentDirectory for AgentRegistry {
    fn lookup(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.get(agent_id)
    }

    fn observe_removals(&self, observer: Weak<dyn RemovalObserver>) {
        self.observers.write().push(observer);
    }
}
