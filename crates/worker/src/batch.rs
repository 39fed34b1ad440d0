//! Batch runner — one fetch-process-acknowledge cycle for one queue.

use std::sync::Arc;

use plateful_common::types::{BatchResult, QueueKind};
use plateful_queue::QueueClient;

use crate::processor::{JobProcessor, ProcessOutcome};

/// One batch run; implemented by [`BatchRunner`] and by test doubles.
pub trait BatchRun {
    fn run_batch(
        &mut self,
        max_messages: usize,
    ) -> impl Future<Output = anyhow::Result<BatchResult>> + Send;

    /// Requeue messages left in flight by an aborted run. Returns how
    /// many were made eligible for redelivery again.
    fn reclaim(&mut self) -> impl Future<Output = anyhow::Result<u64>> + Send;
}

/// Drives one processor through fetch → process → ack/nack for a single
/// queue kind and aggregates the counters.
pub struct BatchRunner<C, P> {
    kind: QueueKind,
    client: Arc<C>,
    processor: P,
}

impl<C, P> BatchRunner<C, P> {
    pub fn new(kind: QueueKind, client: Arc<C>, processor: P) -> Self {
        Self {
            kind,
            client,
            processor,
        }
    }
}

impl<C, P> BatchRun for BatchRunner<C, P>
where
    C: QueueClient + Send + Sync,
    P: JobProcessor + Send + Sync,
{
    /// Run one bounded batch.
    ///
    /// A disabled backend short-circuits before any broker call — the
    /// scheduler must not mistake a misconfigured queue for productive
    /// idleness. A fetch failure propagates out as the error-backoff
    /// signal. Per-message failures never do: each message is acked or
    /// nacked individually, in delivery order, and becomes a counter.
    async fn run_batch(&mut self, max_messages: usize) -> anyhow::Result<BatchResult> {
        if !self.client.is_enabled(self.kind) {
            return Ok(BatchResult::disabled());
        }

        let messages = self.client.fetch_batch(self.kind, max_messages).await?;

        let mut result = BatchResult::default();
        for message in &messages {
            match self.processor.process(message).await {
                ProcessOutcome::Completed | ProcessOutcome::Duplicate => {
                    self.client.ack(message).await?;
                    result.processed += 1;
                }
                ProcessOutcome::Permanent(detail) => {
                    // Retrying cannot succeed; drop the message instead
                    // of cycling it through redelivery.
                    tracing::warn!(
                        queue = %self.kind,
                        message_id = %message.id,
                        detail = %detail,
                        "Permanent failure, message dropped"
                    );
                    self.client.ack(message).await?;
                    result.failed += 1;
                }
                ProcessOutcome::Transient(detail) => {
                    tracing::warn!(
                        queue = %self.kind,
                        message_id = %message.id,
                        redeliveries = message.redelivery_count,
                        detail = %detail,
                        "Transient failure, message nacked for redelivery"
                    );
                    self.client.nack(message).await?;
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }

    /// A broker error partway through [`Self::run_batch`] leaves the
    /// rest of the fetched messages sitting in flight. The scheduler
    /// calls this before the next run so they are redelivered instead
    /// of waiting for a process restart.
    async fn reclaim(&mut self) -> anyhow::Result<u64> {
        if !self.client.is_enabled(self.kind) {
            return Ok(0);
        }
        Ok(self.client.recover(self.kind).await?)
    }
}
