use redis::Client;
use redis::aio::ConnectionManager;

/// Open a managed async connection to the Redis broker.
///
/// The returned manager reconnects automatically and is cheap to clone
/// for sequential reuse across loop iterations.
pub async fn connect_redis(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!("Connected to Redis broker");
    Ok(manager)
}
