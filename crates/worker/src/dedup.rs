//! Redis-backed delivery deduplication.
//!
//! The broker guarantees at-least-once delivery, so a crash between the
//! side effect and the ack redelivers an already-sent message. Each job
//! carries a dedup key; a processor claims the key before sending and
//! short-circuits when the claim already exists.
//!
//! Uses Redis `SET NX EX` for atomic check-and-set with automatic TTL
//! expiry. A claim is released again when the send fails transiently,
//! so redelivery of a genuinely unsent message is not mistaken for a
//! duplicate.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

pub trait DedupStore {
    /// Try to claim a dedup key. Returns `true` when this caller made
    /// the claim, `false` when the key was already claimed.
    fn claim(&self, key: &str) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Give a claim back, e.g. after a transient send failure.
    fn release(&self, key: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[derive(Clone)]
pub struct RedisDedupStore {
    /// `None` only when the broker itself is unconfigured, in which
    /// case every queue is disabled and no processor ever runs.
    conn: Option<ConnectionManager>,
    ttl_seconds: u64,
}

impl RedisDedupStore {
    pub fn new(conn: Option<ConnectionManager>, ttl_seconds: u64) -> Self {
        Self { conn, ttl_seconds }
    }

    fn connection(&self) -> anyhow::Result<ConnectionManager> {
        self.conn
            .clone()
            .ok_or_else(|| anyhow::anyhow!("dedup store has no broker connection"))
    }
}

impl DedupStore for RedisDedupStore {
    async fn claim(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.connection()?;

        // SET key "1" NX EX ttl — Some("OK") means we made the claim,
        // None means the key already existed.
        let result: Option<String> = redis::cmd("SET")
            .arg(format!("dedup:{}", key))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    async fn release(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.connection()?;
        conn.del::<_, ()>(format!("dedup:{}", key)).await?;
        Ok(())
    }
}
