use plateful_common::error::QueueError;
use plateful_common::types::{Message, QueueKind};

/// Contract the worker needs from a message-queue broker.
///
/// Implementations must guarantee that a fetched message is held by at
/// most one consumer until it is acked or nacked (competing-consumers
/// delivery semantics); the worker itself does no distributed locking.
pub trait QueueClient {
    /// Whether the backend for this queue is configured and connected.
    /// Derived from configuration, never from queue emptiness.
    fn is_enabled(&self, kind: QueueKind) -> bool;

    /// Append a payload to the tail of a queue.
    fn enqueue(
        &self,
        kind: QueueKind,
        payload: serde_json::Value,
    ) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Fetch up to `max_messages` messages in delivery order.
    ///
    /// Returns an empty vec when the queue is empty; errors only on
    /// connectivity failure.
    fn fetch_batch(
        &self,
        kind: QueueKind,
        max_messages: usize,
    ) -> impl Future<Output = Result<Vec<Message>, QueueError>> + Send;

    /// Acknowledge a message, removing it from the broker for good.
    /// Acknowledging a message that is already gone is a no-op.
    fn ack(&self, message: &Message) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Return a message to the broker for redelivery.
    fn nack(&self, message: &Message) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Make every unacknowledged in-flight message eligible for
    /// redelivery again. Called at startup and after a failed batch
    /// run, so a connectivity error partway through a batch cannot
    /// strand the rest of the fetched messages. Returns how many
    /// messages were requeued.
    fn recover(&self, kind: QueueKind) -> impl Future<Output = Result<u64, QueueError>> + Send;
}
