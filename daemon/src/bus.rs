/// In-process publish/subscribe bus and the per-session telemetry stores.
///
/// [`SharedState`] is built once in `main` and handed out as an `Arc` to every
/// component that needs to publish or read telemetry. It lives as long as the
/// process; only the stores are ever reset.
use chrono::{DateTime, Local};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

use crate::telemetry::{InfoSnapshot, TelemetryEvent};

/// Messages retained for subscribers that fall behind before they lag.
const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Event,
    Info,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Event => "event",
            Topic::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    Event(TelemetryEvent),
    Info(InfoSnapshot),
}

impl BusMessage {
    pub fn topic(&self) -> Topic {
        match self {
            BusMessage::Event(_) => Topic::Event,
            BusMessage::Info(_) => Topic::Info,
        }
    }
}

pub struct EventBus {
    tx: broadcast::Sender<BusMessage>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Delivers a copy of `message` to every current subscriber of its topic.
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, message: BusMessage) {
        let _ = self.tx.send(message);
    }

    pub fn subscribe(&self, topic: Topic) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            topic: Some(topic),
        }
    }

    /// Subscribes to both topics.
    pub fn subscribe_all(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            topic: None,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<BusMessage>,
    topic: Option<Topic>,
}

impl Subscription {
    /// Next message on the subscribed topic, in publish order.
    /// Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) if self.accepts(&message) => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "bus", "Subscriber lagged, {skipped} messages skipped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.rx.try_recv() {
                Ok(message) if self.accepts(&message) => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "bus", "Subscriber lagged, {skipped} messages skipped");
                }
                Err(_) => return None,
            }
        }
    }

    fn accepts(&self, message: &BusMessage) -> bool {
        self.topic.map_or(true, |t| t == message.topic())
    }
}

/// A stored value and the local time it was received.
#[derive(Debug, Clone)]
pub struct Stamped<T> {
    pub received_at: DateTime<Local>,
    pub value: T,
}

/// Append-only sequence held for one game session.
pub struct Store<T> {
    items: Mutex<Vec<Stamped<T>>>,
}

impl<T: Clone> Store<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, value: T) {
        self.lock().push(Stamped {
            received_at: Local::now(),
            value,
        });
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The newest value, if any.
    pub fn last(&self) -> Option<Stamped<T>> {
        self.lock().last().cloned()
    }

    /// Copies the stored values out in arrival order.
    #[cfg(test)]
    pub fn values(&self) -> Vec<T> {
        self.lock().iter().map(|s| s.value.clone()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Stamped<T>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub type EventStore = Store<TelemetryEvent>;
pub type InfoStore = Store<InfoSnapshot>;

/// Bus and stores shared by every component for the process lifetime.
#[derive(Default)]
pub struct SharedState {
    pub bus: EventBus,
    pub events: EventStore,
    pub info: InfoStore,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties both stores. Called only when a new supported game session starts.
    pub fn reset_session(&self) {
        self.events.clear();
        self.info.clear();
    }
}

/// Logs every bus message at trace level until the bus goes away.
pub async fn trace_messages(mut subscription: Subscription) {
    while let Some(message) = subscription.recv().await {
        match &message {
            BusMessage::Event(e) => {
                tracing::trace!(target: "bus", topic = message.topic().as_str(), event = %e.name, data = %e.data)
            }
            BusMessage::Info(i) => {
                tracing::trace!(target: "bus", topic = message.topic().as_str(), info = %i.0)
            }
        }
    }
}
