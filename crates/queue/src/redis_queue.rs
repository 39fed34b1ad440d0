//! Redis list-backed queue adapter.
//!
//! Implements the reliable-queue pattern with three lists per queue:
//!
//! - `queue:{kind}` — ready messages, producers RPUSH to the tail
//! - `queue:{kind}:processing` — in-flight messages, moved here by fetch
//! - `queue:{kind}:dead` — dead letters (undecodable envelopes, or
//!   messages nacked past the redelivery bound)
//!
//! A message only leaves the broker on ack (`LREM` from processing).
//! Anything left in the processing list by a crashed or interrupted
//! worker, or by a batch that aborted partway through, is drained back
//! to the ready list by `recover` — at startup and again whenever a
//! batch run fails — so no message is ever lost.

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use plateful_common::config::WorkerConfig;
use plateful_common::error::QueueError;
use plateful_common::redis_pool::connect_redis;
use plateful_common::types::{Message, QueueKind};

use crate::client::QueueClient;

/// Wire envelope stored in the Redis lists. The raw JSON string doubles
/// as the delivery tag, which is what `LREM` matches on.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    id: Uuid,
    #[serde(default)]
    redeliveries: u32,
    enqueued_at: DateTime<Utc>,
    payload: serde_json::Value,
}

/// Queue client backed by Redis lists.
#[derive(Clone)]
pub struct RedisQueueClient {
    /// `None` when no broker credentials were configured; every queue
    /// reports disabled in that case.
    conn: Option<ConnectionManager>,
    notification_jobs_enabled: bool,
    completed_emails_enabled: bool,
    max_redeliveries: u32,
}

impl RedisQueueClient {
    /// Connect to the broker named in the configuration.
    ///
    /// A missing `REDIS_URL` yields a client with both queues disabled.
    /// An unreachable broker is an error — the caller treats it as a
    /// fatal startup failure.
    pub async fn connect(config: &WorkerConfig) -> anyhow::Result<Self> {
        let conn = match &config.redis_url {
            Some(url) => Some(connect_redis(url).await?),
            None => {
                tracing::warn!("REDIS_URL not set — queue backend disabled");
                None
            }
        };

        Ok(Self {
            conn,
            notification_jobs_enabled: config.queue_enabled(QueueKind::NotificationJobs),
            completed_emails_enabled: config.queue_enabled(QueueKind::CompletedEmails),
            max_redeliveries: config.max_redeliveries,
        })
    }

    /// A clone of the underlying connection, for collaborators that
    /// share the broker (e.g. the dedup store).
    pub fn connection(&self) -> Option<ConnectionManager> {
        self.conn.clone()
    }

    fn connection_for(&self, kind: QueueKind) -> Result<ConnectionManager, QueueError> {
        match &self.conn {
            Some(conn) if self.is_enabled(kind) => Ok(conn.clone()),
            _ => Err(QueueError::Disabled(kind)),
        }
    }
}

impl QueueClient for RedisQueueClient {
    fn is_enabled(&self, kind: QueueKind) -> bool {
        if self.conn.is_none() {
            return false;
        }
        match kind {
            QueueKind::NotificationJobs => self.notification_jobs_enabled,
            QueueKind::CompletedEmails => self.completed_emails_enabled,
        }
    }

    async fn enqueue(&self, kind: QueueKind, payload: serde_json::Value) -> Result<(), QueueError> {
        let mut conn = self.connection_for(kind)?;

        let envelope = Envelope {
            id: Uuid::new_v4(),
            redeliveries: 0,
            enqueued_at: Utc::now(),
            payload,
        };
        let raw = serde_json::to_string(&envelope).map_err(|e| QueueError::Codec(e.to_string()))?;

        conn.rpush::<_, _, ()>(queue_key(kind), raw).await?;

        tracing::debug!(queue = %kind, message_id = %envelope.id, "Message enqueued");
        Ok(())
    }

    async fn fetch_batch(
        &self,
        kind: QueueKind,
        max_messages: usize,
    ) -> Result<Vec<Message>, QueueError> {
        let mut conn = self.connection_for(kind)?;
        let mut batch = Vec::new();

        while batch.len() < max_messages {
            let raw: Option<String> = redis::cmd("LMOVE")
                .arg(queue_key(kind))
                .arg(processing_key(kind))
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;

            let Some(raw) = raw else {
                break;
            };

            match serde_json::from_str::<Envelope>(&raw) {
                Ok(envelope) => batch.push(Message {
                    id: envelope.id,
                    queue_kind: kind,
                    payload: envelope.payload,
                    delivery_tag: raw,
                    redelivery_count: envelope.redeliveries,
                }),
                Err(e) => {
                    // An envelope we cannot even parse can never be
                    // processed; route it to the dead list immediately.
                    tracing::warn!(
                        queue = %kind,
                        error = %e,
                        "Undecodable queue entry moved to dead-letter list"
                    );
                    conn.lrem::<_, _, ()>(processing_key(kind), 1, &raw).await?;
                    conn.rpush::<_, _, ()>(dead_key(kind), &raw).await?;
                }
            }
        }

        Ok(batch)
    }

    async fn ack(&self, message: &Message) -> Result<(), QueueError> {
        let kind = message.queue_kind;
        let mut conn = self.connection_for(kind)?;

        let removed: i64 = conn
            .lrem(processing_key(kind), 1, &message.delivery_tag)
            .await?;
        if removed == 0 {
            tracing::debug!(
                queue = %kind,
                message_id = %message.id,
                "Ack for a message no longer in processing"
            );
        }

        Ok(())
    }

    async fn nack(&self, message: &Message) -> Result<(), QueueError> {
        let kind = message.queue_kind;
        let mut conn = self.connection_for(kind)?;

        let removed: i64 = conn
            .lrem(processing_key(kind), 1, &message.delivery_tag)
            .await?;
        if removed == 0 {
            // Already reclaimed elsewhere; nothing to redeliver.
            return Ok(());
        }

        let mut envelope: Envelope = serde_json::from_str(&message.delivery_tag)
            .map_err(|e| QueueError::Codec(e.to_string()))?;
        envelope.redeliveries += 1;
        let raw = serde_json::to_string(&envelope).map_err(|e| QueueError::Codec(e.to_string()))?;

        if envelope.redeliveries >= self.max_redeliveries {
            tracing::warn!(
                queue = %kind,
                message_id = %message.id,
                redeliveries = envelope.redeliveries,
                "Redelivery bound reached, message moved to dead-letter list"
            );
            conn.rpush::<_, _, ()>(dead_key(kind), raw).await?;
        } else {
            conn.rpush::<_, _, ()>(queue_key(kind), raw).await?;
        }

        Ok(())
    }

    /// Drain the processing list back onto the ready list.
    ///
    /// Messages abandoned in flight by a previous run, or left behind
    /// when a batch aborts partway through, become eligible for
    /// redelivery. Returns how many were requeued.
    async fn recover(&self, kind: QueueKind) -> Result<u64, QueueError> {
        let mut conn = self.connection_for(kind)?;
        let mut requeued = 0u64;

        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(processing_key(kind))
                .arg(queue_key(kind))
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            requeued += 1;
        }

        Ok(requeued)
    }
}

fn queue_key(kind: QueueKind) -> String {
    format!("queue:{}", kind)
}

fn processing_key(kind: QueueKind) -> String {
    format!("queue:{}:processing", kind)
}

fn dead_key(kind: QueueKind) -> String {
    format!("queue:{}:dead", kind)
}
