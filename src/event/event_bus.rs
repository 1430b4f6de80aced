use std::collections::HashMap;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Metadata key carrying the correlation id of an inbound event.
pub const ID_KEY: &str = "id";
/// Metadata key carrying the string-encoded payload of an inbound event.
pub const DATA_KEY: &str = "data";

/// A named event delivered by the external runtime.
///
/// The bridge only observes these; the correlation id and the payload both
/// travel inside `metadata`, never in the event name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InboundEvent {
    pub event_name: String,
    pub metadata: HashMap<String, String>,
}

impl InboundEvent {
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.with_metadata(ID_KEY, id)
    }

    pub fn with_data(self, data: impl Into<String>) -> Self {
        self.with_metadata(DATA_KEY, data)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.metadata.get(ID_KEY).map(String::as_str)
    }

    /// Raw payload, if the runtime attached one.
    pub fn data(&self) -> Option<&str> {
        self.metadata.get(DATA_KEY).map(String::as_str)
    }
}

/// # EventBus
///
/// Broadcast medium for inbound events. Each event name gets its own
/// broadcast channel, created lazily on first subscription, so a listener
/// only ever wakes up for the name it asked for. A channel whose receivers
/// are all gone is released on the next publish to its name or the next
/// subscription to a new name.
///
/// ## Capacity and Backpressure
///
/// `capacity` bounds every per-name channel. A receiver that falls further
/// behind than that observes [`EventError::Lagged`] and skips ahead.
pub struct EventBus {
    topics: DashMap<String, broadcast::Sender<InboundEvent>>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given per-topic buffer capacity.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use bridgekit::event::EventBus;
    /// let event_bus = EventBus::new(100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Starts listening on `event_name`.
    ///
    /// The returned receiver sees every event published on that name after
    /// this call returns. Dropping it releases the subscription.
    pub fn subscribe(&self, event_name: &str) -> EventReceiver {
        if !self.topics.contains_key(event_name) {
            self.prune();
        }
        let receiver = self
            .topics
            .entry(event_name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        EventReceiver::new(event_name, receiver)
    }

    /// Publishes an event to everyone currently listening on its name.
    ///
    /// Returns the number of receivers the event was handed to. Zero is not
    /// an error: nobody was listening and the event is dropped.
    pub fn publish(&self, event: InboundEvent) -> usize {
        debug_event("Publishing", &event);
        let event_name = event.event_name.clone();
        let delivered = match self.topics.get(&event_name) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        };
        if delivered == 0 {
            trace!("No listener for event: {}", event_name);
            self.topics
                .remove_if(&event_name, |_, sender| sender.receiver_count() == 0);
        }
        delivered
    }

    /// Number of live receivers on `event_name`.
    pub fn subscribers_size(&self, event_name: &str) -> usize {
        self.topics
            .get(event_name)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn queue_size(&self, event_name: &str) -> usize {
        self.topics
            .get(event_name)
            .map(|sender| sender.len())
            .unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of event names that currently have a channel.
    pub fn topics_size(&self) -> usize {
        self.topics.len()
    }

    // Channels live only while someone listens. Dropped receivers never
    // reach the bus, so idle names are swept before a new one is added.
    fn prune(&self) {
        self.topics.retain(|_, sender| sender.receiver_count() > 0);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EVENT_BUFFER_SIZE)
    }
}

pub fn debug_event(prefix: &str, event: &InboundEvent) {
    match event.data() {
        Some(data) => debug!(
            "{} Event: {} id={:?} data={}",
            prefix,
            event.event_name,
            event.id(),
            data
        ),
        None => debug!("{} Event: {} id={:?}", prefix, event.event_name, event.id()),
    }
}

pub struct EventReceiver {
    event_name: String,
    pub receiver: broadcast::Receiver<InboundEvent>,
}

impl EventReceiver {
    pub fn new(event_name: &str, receiver: broadcast::Receiver<InboundEvent>) -> Self {
        Self {
            event_name: event_name.to_string(),
            receiver,
        }
    }

    /// Receives the next event. On lag the receiver is resubscribed at the
    /// head of the channel and the skipped count is reported as an error;
    /// the next call continues with fresh events.
    pub async fn recv(&mut self) -> EventResult<InboundEvent> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Receiver on {} lagged, skipped {} events", self.event_name, n);
                self.receiver = self.receiver.resubscribe();
                Err(EventError::Lagged { count: n })
            }
            Err(e) => Err(EventError::ReceiveFailed {
                message: e.to_string(),
            }),
        }
    }
}

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Event Receive failed: {message}")]
    ReceiveFailed { message: String },

    #[error("Event lagged: {count}")]
    Lagged { count: u64 },
}

pub type EventResult<T> = Result<T, EventError>;
