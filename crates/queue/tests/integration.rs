//! Integration tests for the Redis queue adapter.
//!
//! Requires a running Redis instance with `REDIS_URL` env var set.
//! Run with:
//!
//! ```bash
//! REDIS_URL="redis://localhost:6379" \
//!   cargo test -p plateful-queue --test integration -- --ignored --nocapture
//! ```

use redis::AsyncCommands;
use serde_json::json;
use uuid::Uuid;

use plateful_common::config::WorkerConfig;
use plateful_common::types::QueueKind;
use plateful_queue::{QueueClient, RedisQueueClient};

fn test_config() -> WorkerConfig {
    WorkerConfig {
        redis_url: Some(
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        ),
        queues_enabled: true,
        notification_queue_enabled: true,
        completed_email_queue_enabled: true,
        max_messages: 50,
        idle_sleep_ms: 2000,
        error_sleep_ms: 10000,
        max_redeliveries: 2,
        dedup_ttl_seconds: 60,
        resend_api_key: Some("re_test".to_string()),
        email_from: Some("orders@plateful.example".to_string()),
        staff_push_webhook_url: Some("https://push.plateful.example/hook".to_string()),
    }
}

/// Remove every key the adapter uses for a queue kind.
async fn flush_queue(client: &RedisQueueClient, kind: QueueKind) {
    let mut conn = client.connection().unwrap();
    for key in [
        format!("queue:{}", kind),
        format!("queue:{}:processing", kind),
        format!("queue:{}:dead", kind),
    ] {
        conn.del::<_, ()>(key).await.unwrap();
    }
}

async fn list_len(client: &RedisQueueClient, key: &str) -> i64 {
    let mut conn = client.connection().unwrap();
    conn.llen(key).await.unwrap()
}

#[tokio::test]
#[ignore]
async fn test_enqueue_fetch_ack_round_trip() {
    let client = RedisQueueClient::connect(&test_config()).await.unwrap();
    let kind = QueueKind::NotificationJobs;
    flush_queue(&client, kind).await;

    for i in 0..3 {
        client
            .enqueue(kind, json!({ "order": i, "marker": Uuid::new_v4() }))
            .await
            .unwrap();
    }

    // Bounded fetch preserves delivery order.
    let batch = client.fetch_batch(kind, 2).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].payload["order"], 0);
    assert_eq!(batch[1].payload["order"], 1);
    assert_eq!(list_len(&client, "queue:notification_jobs:processing").await, 2);

    // Ack removes from processing for good.
    client.ack(&batch[0]).await.unwrap();
    client.ack(&batch[1]).await.unwrap();
    assert_eq!(list_len(&client, "queue:notification_jobs:processing").await, 0);
    assert_eq!(list_len(&client, "queue:notification_jobs").await, 1);
}

#[tokio::test]
#[ignore]
async fn test_nack_redelivers_with_incremented_count() {
    let client = RedisQueueClient::connect(&test_config()).await.unwrap();
    let kind = QueueKind::CompletedEmails;
    flush_queue(&client, kind).await;

    client.enqueue(kind, json!({ "to": "a@b.c" })).await.unwrap();

    let batch = client.fetch_batch(kind, 10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].redelivery_count, 0);
    client.nack(&batch[0]).await.unwrap();

    let batch = client.fetch_batch(kind, 10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].redelivery_count, 1);

    // max_redeliveries = 2 in the test config: the next nack dead-letters.
    client.nack(&batch[0]).await.unwrap();
    assert_eq!(list_len(&client, "queue:completed_emails").await, 0);
    assert_eq!(list_len(&client, "queue:completed_emails:dead").await, 1);
}

#[tokio::test]
#[ignore]
async fn test_recover_drains_processing_list() {
    let client = RedisQueueClient::connect(&test_config()).await.unwrap();
    let kind = QueueKind::NotificationJobs;
    flush_queue(&client, kind).await;

    client.enqueue(kind, json!({ "n": 1 })).await.unwrap();
    client.enqueue(kind, json!({ "n": 2 })).await.unwrap();

    // Simulate a crash: fetch moves both into processing, then the
    // worker dies without acking.
    let batch = client.fetch_batch(kind, 10).await.unwrap();
    assert_eq!(batch.len(), 2);
    drop(batch);

    let requeued = client.recover(kind).await.unwrap();
    assert_eq!(requeued, 2);
    assert_eq!(list_len(&client, "queue:notification_jobs").await, 2);
    assert_eq!(list_len(&client, "queue:notification_jobs:processing").await, 0);
}

#[tokio::test]
#[ignore]
async fn test_undecodable_entry_goes_to_dead_letter() {
    let client = RedisQueueClient::connect(&test_config()).await.unwrap();
    let kind = QueueKind::NotificationJobs;
    flush_queue(&client, kind).await;

    let mut conn = client.connection().unwrap();
    conn.rpush::<_, _, ()>("queue:notification_jobs", "not json")
        .await
        .unwrap();
    client.enqueue(kind, json!({ "ok": true })).await.unwrap();

    let batch = client.fetch_batch(kind, 10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].payload["ok"], true);
    assert_eq!(list_len(&client, "queue:notification_jobs:dead").await, 1);
}
