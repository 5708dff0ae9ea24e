use crate::error::AquilaResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

/// Well-known event subjects.
pub mod subjects {
    /// Scheduler and agent lifecycle events. Payloads carry an `action` field.
    pub const SYSTEM: &str = "system";
    /// Chat traffic between users and agents.
    pub const CHAT: &str = "chat";
}

/// A single event published on the [`EventBus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Subject the event was published under (see [`subjects`]).
    pub subject: String,
    /// Arbitrary JSON payload.
    pub payload: serde_json::Value,
    /// UTC timestamp of publication.
    pub ts: DateTime<Utc>,
}

impl Event {
    /// Creates a new event stamped with the current time.
    pub fn new(subject: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            subject: subject.into(),
            payload,
            ts: Utc::now(),
        }
    }

    /// The `action` discriminator of a system event payload, if any.
    pub fn action(&self) -> Option<&str> {
        self.payload.get("action").and_then(serde_json::Value::as_str)
    }
}

/// In-process publish/subscribe bus backed by a tokio broadcast channel.
///
/// Cloning the bus yields another handle onto the same channel. Publishing
/// never blocks and never fails: with no subscribers the event is dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a raw JSON payload under `subject`.
    pub fn publish(&self, subject: &str, payload: serde_json::Value) {
        // Err only means nobody is listening.
        let _ = self.tx.send(Event::new(subject, payload));
    }

    /// Serialize `payload` and publish it under `subject`.
    pub fn emit<T: Serialize>(&self, subject: &str, payload: &T) -> AquilaResult<()> {
        let value = serde_json::to_value(payload)?;
        self.publish(subject, value);
        Ok(())
    }

    /// Open a new subscription receiving every event published from now on.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// What [`EventSubscription::recv_or_lag`] yielded.
#[derive(Debug, Clone)]
pub enum Received {
    /// The next event.
    Event(Event),
    /// This many events were dropped because the subscriber fell behind.
    Lagged(u64),
}

/// A subscription handle returned by [`EventBus::subscribe`].
pub struct EventSubscription {
    rx: broadcast::Receiver<Event>,
}

impl EventSubscription {
    /// Wait for the next event.
    ///
    /// Events lost because this subscriber fell behind are skipped with a
    /// warning. Returns `None` once every bus handle has been dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.recv_or_lag().await? {
                Received::Event(event) => return Some(event),
                Received::Lagged(skipped) => {
                    warn!(skipped, "Event subscriber lagged, skipping events");
                }
            }
        }
    }

    /// Wait for the next event, reporting lost events instead of skipping
    /// them. Subscribers that must not miss an event re-sync on `Lagged`.
    pub async fn recv_or_lag(&mut self) -> Option<Received> {
        match self.rx.recv().await {
            Ok(event) => Some(Received::Event(event)),
            Err(RecvError::Lagged(skipped)) => Some(Received::Lagged(skipped)),
            Err(RecvError::Closed) => None,
        }
    }

    /// Wait for the next event published under `subject`.
    pub async fn recv_subject(&mut self, subject: &str) -> Option<Event> {
        loop {
            let event = self.recv().await?;
            if event.subject == subject {
                return Some(event);
            }
        }
    }

    /// Take the next already-buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged, skipping events");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}
