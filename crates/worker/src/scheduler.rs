//! Worker loop — the process's top-level control loop.
//!
//! Each iteration runs the notification-jobs batch and then the
//! completed-emails batch, sequentially and in that fixed order. The
//! ordering is a deliberate trade-off: it needs no cross-queue
//! synchronization, and the per-batch cap bounds the worst-case
//! starvation of the email queue to one batch per cycle.
//!
//! The loop never terminates on a processing or connectivity error; it
//! backs off and retries indefinitely. A failed run additionally marks
//! its queue for reclaim, so messages the aborted batch left in flight
//! are requeued once the broker answers again. Only cancellation ends
//! it, and
//! cancellation is observed at each iteration boundary and during the
//! inter-cycle sleep.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use plateful_common::config::WorkerConfig;
use plateful_common::types::{BatchResult, CycleOutcome, QueueKind};

use crate::backoff::backoff_for;
use crate::batch::BatchRun;

pub struct Scheduler<A, B> {
    notification_jobs: A,
    completed_emails: B,
    max_messages: usize,
    idle_sleep: Duration,
    error_sleep: Duration,
    shutdown: CancellationToken,
}

impl<A, B> Scheduler<A, B>
where
    A: BatchRun + Send,
    B: BatchRun + Send,
{
    pub fn new(
        notification_jobs: A,
        completed_emails: B,
        config: &WorkerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            notification_jobs,
            completed_emails,
            max_messages: config.max_messages,
            idle_sleep: config.idle_sleep(),
            error_sleep: config.error_sleep(),
            shutdown,
        }
    }

    /// Run the loop until the cancellation token fires.
    pub async fn run(mut self) -> anyhow::Result<()> {
        tracing::info!(
            max_messages = self.max_messages,
            idle_sleep_ms = self.idle_sleep.as_millis() as u64,
            error_sleep_ms = self.error_sleep.as_millis() as u64,
            "Worker loop started"
        );

        // Set when a run fails and cleared once a reclaim succeeds, so
        // messages that run left in flight are requeued even if the
        // broker stays down for several cycles.
        let mut reclaim_jobs = false;
        let mut reclaim_emails = false;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            if reclaim_jobs {
                reclaim_jobs =
                    !reclaim_in_flight(&mut self.notification_jobs, QueueKind::NotificationJobs)
                        .await;
            }
            if reclaim_emails {
                reclaim_emails =
                    !reclaim_in_flight(&mut self.completed_emails, QueueKind::CompletedEmails)
                        .await;
            }

            let mut cycle_failed = false;

            // A failed run on one queue must not keep the other queue
            // from being drained in the same iteration.
            let jobs = match self.notification_jobs.run_batch(self.max_messages).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(queue = %QueueKind::NotificationJobs, error = %e, "Batch run failed");
                    cycle_failed = true;
                    reclaim_jobs = true;
                    BatchResult::default()
                }
            };

            let emails = match self.completed_emails.run_batch(self.max_messages).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(queue = %QueueKind::CompletedEmails, error = %e, "Batch run failed");
                    cycle_failed = true;
                    reclaim_emails = true;
                    BatchResult::default()
                }
            };

            let outcome = if cycle_failed {
                CycleOutcome::Error
            } else {
                CycleOutcome::derive(&jobs, &emails)
            };

            if jobs.processed + emails.processed + jobs.failed + emails.failed > 0 {
                tracing::debug!(
                    processed = jobs.processed + emails.processed,
                    failed = jobs.failed + emails.failed,
                    "Cycle complete"
                );
            }

            let pause = backoff_for(outcome, self.idle_sleep, self.error_sleep);
            if pause.is_zero() {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = self.shutdown.cancelled() => break,
            }
        }

        tracing::info!("Worker loop stopped");
        Ok(())
    }
}

/// Requeue whatever an aborted run left in flight. Returns whether the
/// attempt succeeded; a failure keeps the queue marked for another
/// attempt on the next iteration.
async fn reclaim_in_flight<R: BatchRun + Send>(runner: &mut R, kind: QueueKind) -> bool {
    match runner.reclaim().await {
        Ok(requeued) => {
            if requeued > 0 {
                tracing::warn!(
                    queue = %kind,
                    requeued,
                    "Requeued messages left in flight by a failed batch run"
                );
            }
            true
        }
        Err(e) => {
            tracing::debug!(queue = %kind, error = %e, "Reclaim attempt failed");
            false
        }
    }
}
