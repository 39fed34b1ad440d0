use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two independent logical message streams handled by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    NotificationJobs,
    CompletedEmails,
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueKind::NotificationJobs => write!(f, "notification_jobs"),
            QueueKind::CompletedEmails => write!(f, "completed_emails"),
        }
    }
}

/// How the processing code path was entered.
///
/// Side effects triggered from inside the worker must not enqueue
/// follow-up jobs back into the queues the worker itself drains, or the
/// same work would cycle forever. The mode is set once at process start
/// and passed down the call chain instead of living in ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Called from the application layer; follow-up enqueues are allowed.
    Api,
    /// Called from the background worker; follow-up enqueues are suppressed.
    Worker,
}

impl ExecutionMode {
    pub fn allows_follow_up_enqueue(&self) -> bool {
        matches!(self, ExecutionMode::Api)
    }
}

/// One unit of work pulled from a queue.
///
/// `delivery_tag` is an opaque handle the queue adapter needs to ack or
/// nack this exact delivery; the worker never inspects it.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub queue_kind: QueueKind,
    pub payload: serde_json::Value,
    pub delivery_tag: String,
    /// How many times this message was redelivered after a prior failure.
    pub redelivery_count: u32,
}

/// Aggregate counters for one batch-runner invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Messages successfully handled and acknowledged.
    pub processed: u32,
    /// Messages nacked or dropped without successful handling.
    pub failed: u32,
    /// True when the queue backend for this run is not configured.
    /// Distinct from an enabled-but-empty queue, which yields
    /// `processed == 0, disabled == false`.
    pub disabled: bool,
}

impl BatchResult {
    pub fn disabled() -> Self {
        Self {
            processed: 0,
            failed: 0,
            disabled: true,
        }
    }
}

/// Outcome of one full worker-loop iteration, derived from the two
/// batch results of that iteration. Drives the backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Neither queue backend is configured.
    BothDisabled,
    /// At least one queue is enabled but nothing was processed.
    Idle,
    /// Combined processed count > 0 — re-poll immediately.
    Productive,
    /// A batch run failed with a connectivity error.
    Error,
}

impl CycleOutcome {
    /// Derive the outcome from the two batch results of one iteration.
    ///
    /// Failed-only cycles (processed == 0, failed > 0) count as idle:
    /// the failing messages are already back with the broker and
    /// hammering it again immediately would not help.
    pub fn derive(jobs: &BatchResult, emails: &BatchResult) -> Self {
        if jobs.disabled && emails.disabled {
            CycleOutcome::BothDisabled
        } else if jobs.processed + emails.processed > 0 {
            CycleOutcome::Productive
        } else {
            CycleOutcome::Idle
        }
    }
}

/// Staff-facing notification categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPlaced,
    OrderReady,
    OrderCancelled,
    PaymentReceived,
    ReceiptEmailed,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::OrderPlaced => write!(f, "order_placed"),
            NotificationKind::OrderReady => write!(f, "order_ready"),
            NotificationKind::OrderCancelled => write!(f, "order_cancelled"),
            NotificationKind::PaymentReceived => write!(f, "payment_received"),
            NotificationKind::ReceiptEmailed => write!(f, "receipt_emailed"),
        }
    }
}

/// Payload schema for the `notification_jobs` queue.
///
/// `body` arrives pre-rendered from the application layer; the worker
/// does no templating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJobPayload {
    pub order_id: Uuid,
    pub staff_id: Uuid,
    pub kind: NotificationKind,
    pub body: String,
    /// Explicit dedup key; omitted keys fall back to a derived one.
    pub dedup_key: Option<String>,
}

impl NotificationJobPayload {
    /// Key used to recognize a redelivered duplicate of this job.
    pub fn dedup_key(&self) -> String {
        self.dedup_key.clone().unwrap_or_else(|| {
            format!(
                "notification:{}:{}:{}",
                self.order_id, self.staff_id, self.kind
            )
        })
    }
}

/// Payload schema for the `completed_emails` queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedEmailPayload {
    pub order_id: Uuid,
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Staff member to notify once the receipt email is out.
    pub staff_id: Option<Uuid>,
    pub dedup_key: Option<String>,
}

impl CompletedEmailPayload {
    pub fn dedup_key(&self) -> String {
        self.dedup_key
            .clone()
            .unwrap_or_else(|| format!("completed_email:{}:{}", self.order_id, self.to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(processed: u32, failed: u32, disabled: bool) -> BatchResult {
        BatchResult {
            processed,
            failed,
            disabled,
        }
    }

    #[test]
    fn test_outcome_both_disabled() {
        let outcome = CycleOutcome::derive(&BatchResult::disabled(), &BatchResult::disabled());
        assert_eq!(outcome, CycleOutcome::BothDisabled);
    }

    #[test]
    fn test_outcome_idle_when_enabled_but_empty() {
        // One queue disabled is still Idle, not BothDisabled.
        let outcome = CycleOutcome::derive(&result(0, 0, false), &BatchResult::disabled());
        assert_eq!(outcome, CycleOutcome::Idle);

        let outcome = CycleOutcome::derive(&result(0, 0, false), &result(0, 0, false));
        assert_eq!(outcome, CycleOutcome::Idle);
    }

    #[test]
    fn test_outcome_productive_from_either_queue() {
        let outcome = CycleOutcome::derive(&result(3, 0, false), &result(0, 0, false));
        assert_eq!(outcome, CycleOutcome::Productive);

        let outcome = CycleOutcome::derive(&result(0, 0, false), &result(1, 2, false));
        assert_eq!(outcome, CycleOutcome::Productive);
    }

    #[test]
    fn test_outcome_failures_alone_are_idle() {
        let outcome = CycleOutcome::derive(&result(0, 5, false), &result(0, 0, false));
        assert_eq!(outcome, CycleOutcome::Idle);
    }

    #[test]
    fn test_notification_dedup_key_fallback() {
        let order_id = Uuid::new_v4();
        let staff_id = Uuid::new_v4();
        let payload = NotificationJobPayload {
            order_id,
            staff_id,
            kind: NotificationKind::OrderReady,
            body: "Order ready for pickup".to_string(),
            dedup_key: None,
        };
        assert_eq!(
            payload.dedup_key(),
            format!("notification:{}:{}:order_ready", order_id, staff_id)
        );
    }

    #[test]
    fn test_explicit_dedup_key_wins() {
        let payload = CompletedEmailPayload {
            order_id: Uuid::new_v4(),
            to: "guest@example.com".to_string(),
            subject: "Your order".to_string(),
            body: "Thanks!".to_string(),
            staff_id: None,
            dedup_key: Some("custom-key".to_string()),
        };
        assert_eq!(payload.dedup_key(), "custom-key");
    }

    #[test]
    fn test_worker_mode_suppresses_follow_up() {
        assert!(!ExecutionMode::Worker.allows_follow_up_enqueue());
        assert!(ExecutionMode::Api.allows_follow_up_enqueue());
    }
}
