//! Job processors — one per queue kind.
//!
//! A processor turns one message into one completed side effect and an
//! outcome. Errors are captured per message, never propagated: one bad
//! message must not abort the rest of its batch.

use std::sync::Arc;

use plateful_common::types::{
    CompletedEmailPayload, ExecutionMode, Message, NotificationJobPayload, NotificationKind,
    QueueKind,
};
use plateful_queue::QueueClient;

use crate::dedup::DedupStore;
use crate::delivery::{DeliveryError, EmailSender, OutboundEmail, PushSender, StaffNotification};

/// Per-message processing outcome, reported to the batch runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Side effect performed; ack.
    Completed,
    /// Dedup key already claimed — the side effect already happened on
    /// an earlier delivery; ack without re-sending.
    Duplicate,
    /// Retrying cannot succeed (malformed payload, rejected request);
    /// drop with a log line.
    Permanent(String),
    /// Worth a redelivery (timeout, rate limit, broker hiccup); nack.
    Transient(String),
}

pub trait JobProcessor {
    fn process(&self, message: &Message) -> impl Future<Output = ProcessOutcome> + Send;
}

/// Processes `notification_jobs` messages: one staff push per message.
pub struct NotificationJobProcessor<S, D> {
    sender: S,
    dedup: D,
}

impl<S, D> NotificationJobProcessor<S, D> {
    pub fn new(sender: S, dedup: D) -> Self {
        Self { sender, dedup }
    }
}

impl<S, D> JobProcessor for NotificationJobProcessor<S, D>
where
    S: PushSender + Send + Sync,
    D: DedupStore + Send + Sync,
{
    async fn process(&self, message: &Message) -> ProcessOutcome {
        let payload: NotificationJobPayload = match serde_json::from_value(message.payload.clone())
        {
            Ok(payload) => payload,
            Err(e) => return ProcessOutcome::Permanent(format!("malformed payload: {}", e)),
        };

        let dedup_key = payload.dedup_key();
        match self.dedup.claim(&dedup_key).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(
                    message_id = %message.id,
                    dedup_key = %dedup_key,
                    "Duplicate notification skipped"
                );
                return ProcessOutcome::Duplicate;
            }
            Err(e) => return ProcessOutcome::Transient(format!("dedup claim failed: {}", e)),
        }

        let notification = StaffNotification {
            staff_id: payload.staff_id,
            order_id: payload.order_id,
            kind: payload.kind,
            body: payload.body,
        };

        match self.sender.send(&notification).await {
            Ok(()) => {
                tracing::info!(
                    message_id = %message.id,
                    order_id = %notification.order_id,
                    kind = %notification.kind,
                    "Staff notification delivered"
                );
                ProcessOutcome::Completed
            }
            Err(DeliveryError::Transient(detail)) => {
                // Give the claim back so the redelivery is not treated
                // as a duplicate.
                if let Err(e) = self.dedup.release(&dedup_key).await {
                    tracing::warn!(dedup_key = %dedup_key, error = %e, "Dedup release failed");
                }
                ProcessOutcome::Transient(detail)
            }
            Err(DeliveryError::Permanent(detail)) => ProcessOutcome::Permanent(detail),
        }
    }
}

/// Processes `completed_emails` messages: one customer email per message.
///
/// On success the application layer wants a `receipt_emailed` staff
/// notification; that follow-up is enqueued only when the execution
/// mode allows it. The worker runs in [`ExecutionMode::Worker`], which
/// suppresses the enqueue so the worker's own side effects never feed
/// back into the queues it drains.
pub struct CompletedEmailProcessor<S, D, Q> {
    sender: S,
    dedup: D,
    queue: Arc<Q>,
    mode: ExecutionMode,
}

impl<S, D, Q> CompletedEmailProcessor<S, D, Q> {
    pub fn new(sender: S, dedup: D, queue: Arc<Q>, mode: ExecutionMode) -> Self {
        Self {
            sender,
            dedup,
            queue,
            mode,
        }
    }
}

impl<S, D, Q> CompletedEmailProcessor<S, D, Q>
where
    Q: QueueClient + Send + Sync,
{
    /// Best-effort follow-up; a failed enqueue never fails the email.
    async fn enqueue_receipt_notification(&self, payload: &CompletedEmailPayload) {
        let Some(staff_id) = payload.staff_id else {
            return;
        };

        let follow_up = NotificationJobPayload {
            order_id: payload.order_id,
            staff_id,
            kind: NotificationKind::ReceiptEmailed,
            body: format!("Receipt for order {} emailed to {}", payload.order_id, payload.to),
            dedup_key: None,
        };

        let value = match serde_json::to_value(&follow_up) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(order_id = %payload.order_id, error = %e, "Follow-up payload encode failed");
                return;
            }
        };

        if let Err(e) = self
            .queue
            .enqueue(QueueKind::NotificationJobs, value)
            .await
        {
            tracing::warn!(
                order_id = %payload.order_id,
                error = %e,
                "Follow-up notification enqueue failed"
            );
        }
    }
}

impl<S, D, Q> JobProcessor for CompletedEmailProcessor<S, D, Q>
where
    S: EmailSender + Send + Sync,
    D: DedupStore + Send + Sync,
    Q: QueueClient + Send + Sync,
{
    async fn process(&self, message: &Message) -> ProcessOutcome {
        let payload: CompletedEmailPayload = match serde_json::from_value(message.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => return ProcessOutcome::Permanent(format!("malformed payload: {}", e)),
        };

        let dedup_key = payload.dedup_key();
        match self.dedup.claim(&dedup_key).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(
                    message_id = %message.id,
                    dedup_key = %dedup_key,
                    "Duplicate email skipped"
                );
                return ProcessOutcome::Duplicate;
            }
            Err(e) => return ProcessOutcome::Transient(format!("dedup claim failed: {}", e)),
        }

        let email = OutboundEmail {
            to: payload.to.clone(),
            subject: payload.subject.clone(),
            body: payload.body.clone(),
        };

        match self.sender.send(&email).await {
            Ok(()) => {
                tracing::info!(
                    message_id = %message.id,
                    order_id = %payload.order_id,
                    "Completed-order email delivered"
                );
                if self.mode.allows_follow_up_enqueue() {
                    self.enqueue_receipt_notification(&payload).await;
                }
                ProcessOutcome::Completed
            }
            Err(DeliveryError::Transient(detail)) => {
                if let Err(e) = self.dedup.release(&dedup_key).await {
                    tracing::warn!(dedup_key = %dedup_key, error = %e, "Dedup release failed");
                }
                ProcessOutcome::Transient(detail)
            }
            Err(DeliveryError::Permanent(detail)) => ProcessOutcome::Permanent(detail),
        }
    }
}
