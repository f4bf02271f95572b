//! Event types for the mediakit ingest pipeline
//!
//! Provides the shared `IngestEvent` definitions and an `EventBus` that fans
//! events out to any number of subscribers (progress reporters, log sinks).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Ingest event types
///
/// Events are broadcast via EventBus and can be serialized for transmission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum IngestEvent {
    /// Document entered the processor chain
    DocumentStarted {
        /// Asset document id
        document_id: Uuid,
        /// Source path
        path: String,
        /// When processing started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One processor finished (successfully or with a soft failure)
    ProcessorCompleted {
        /// Asset document id
        document_id: Uuid,
        /// Processor name
        processor: String,
        /// False when the processor reported a soft failure
        success: bool,
    },

    /// Document abandoned without error (e.g. secondary representation)
    DocumentSkipped {
        /// Asset document id
        document_id: Uuid,
        /// Source path
        path: String,
        /// Why the document was skipped
        reason: String,
    },

    /// Document hit an unrecoverable failure and is excluded from the index
    DocumentFailed {
        /// Asset document id
        document_id: Uuid,
        /// Source path
        path: String,
        /// Processor that failed
        processor: String,
        /// Failure cause
        message: String,
    },

    /// Document ran through the whole chain
    DocumentCompleted {
        /// Asset document id
        document_id: Uuid,
        /// Source path
        path: String,
        /// Soft failures encountered along the way
        warnings: usize,
        /// When processing finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl IngestEvent {
    /// Document this event refers to
    pub fn document_id(&self) -> Uuid {
        match self {
            IngestEvent::DocumentStarted { document_id, .. }
            | IngestEvent::ProcessorCompleted { document_id, .. }
            | IngestEvent::DocumentSkipped { document_id, .. }
            | IngestEvent::DocumentFailed { document_id, .. }
            | IngestEvent::DocumentCompleted { document_id, .. } => *document_id,
        }
    }
}

/// Broadcast channel for ingest events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IngestEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use mediakit_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(1000);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: IngestEvent,
    ) -> Result<usize, broadcast::error::SendError<IngestEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: IngestEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
