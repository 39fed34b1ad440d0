use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use plateful_common::config::WorkerConfig;
use plateful_common::types::{ExecutionMode, QueueKind};
use plateful_queue::{QueueClient, RedisQueueClient};
use plateful_worker::batch::BatchRunner;
use plateful_worker::dedup::RedisDedupStore;
use plateful_worker::delivery::{ResendEmailSender, WebhookPushSender};
use plateful_worker::processor::{CompletedEmailProcessor, NotificationJobProcessor};
use plateful_worker::scheduler::Scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plateful_worker=info,plateful_queue=info".into()),
        )
        .json()
        .init();

    tracing::info!("Plateful notification worker starting...");

    // Load configuration
    let config = WorkerConfig::from_env()?;

    // Connect to the broker. An unreachable broker is the one fatal
    // startup error; a missing REDIS_URL just disables both queues.
    let client = RedisQueueClient::connect(&config).await?;

    // Per-queue startup log and crash recovery. Disabled queues are
    // logged once here and stay silent afterwards.
    for kind in [QueueKind::NotificationJobs, QueueKind::CompletedEmails] {
        if client.is_enabled(kind) {
            let requeued = client.recover(kind).await?;
            if requeued > 0 {
                tracing::warn!(
                    queue = %kind,
                    requeued,
                    "Requeued messages left in flight by a previous run"
                );
            }
            tracing::info!(queue = %kind, "Queue enabled");
        } else {
            tracing::info!(queue = %kind, "Queue disabled for this deployment");
        }
    }

    let client = Arc::new(client);
    let dedup = RedisDedupStore::new(client.connection(), config.dedup_ttl_seconds);

    // Senders receive empty credentials when their queue is disabled;
    // a disabled queue never reaches its sender.
    let push_sender =
        WebhookPushSender::new(config.staff_push_webhook_url.clone().unwrap_or_default());
    let email_sender = ResendEmailSender::new(
        config.resend_api_key.clone().unwrap_or_default(),
        config.email_from.clone().unwrap_or_default(),
    );

    let jobs_runner = BatchRunner::new(
        QueueKind::NotificationJobs,
        client.clone(),
        NotificationJobProcessor::new(push_sender, dedup.clone()),
    );
    let emails_runner = BatchRunner::new(
        QueueKind::CompletedEmails,
        client.clone(),
        CompletedEmailProcessor::new(email_sender, dedup, client.clone(), ExecutionMode::Worker),
    );

    // Signals cancel the token; the loop drains out at the next
    // iteration boundary or sleep.
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Received shutdown signal, stopping gracefully...");
        signal_token.cancel();
    });

    Scheduler::new(jobs_runner, emails_runner, &config, shutdown)
        .run()
        .await?;

    tracing::info!("Plateful notification worker stopped.");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
