use thiserror::Error;

use crate::types::QueueKind;

/// Errors surfaced by the queue-client contract.
///
/// Only connectivity-class failures (`Redis`, `Connectivity`) are
/// expected to escape a batch run; they put the worker loop on the
/// error-backoff path. Per-message problems never travel through this
/// type — they become counted outcomes inside the batch.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Broker connectivity error: {0}")]
    Connectivity(String),

    #[error("Envelope codec error: {0}")]
    Codec(String),

    #[error("Queue not configured: {0}")]
    Disabled(QueueKind),
}
