use std::time::Duration;

use crate::types::QueueKind;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Redis broker connection string. Absent means both queues are
    /// disabled — a degraded-but-healthy state, not an error.
    pub redis_url: Option<String>,

    /// Process-wide broker enable flag (default: true)
    pub queues_enabled: bool,

    /// Per-queue enable flag for staff notification jobs (default: true)
    pub notification_queue_enabled: bool,

    /// Per-queue enable flag for completed-order emails (default: true)
    pub completed_email_queue_enabled: bool,

    /// Per-batch fetch cap (default: 50)
    pub max_messages: usize,

    /// Sleep after an idle or fully-disabled cycle, in ms (default: 2000)
    pub idle_sleep_ms: u64,

    /// Sleep after a failed cycle, in ms (default: 10000)
    pub error_sleep_ms: u64,

    /// Redeliveries before a nacked message is dead-lettered (default: 5)
    pub max_redeliveries: u32,

    /// TTL of a dedup claim in seconds (default: 86400)
    pub dedup_ttl_seconds: u64,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Email sender address
    pub email_from: Option<String>,

    /// Webhook endpoint for staff push notifications
    pub staff_push_webhook_url: Option<String>,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            redis_url: std::env::var("REDIS_URL").ok(),
            queues_enabled: env_bool("QUEUE_ENABLED", true)?,
            notification_queue_enabled: env_bool("NOTIFICATION_QUEUE_ENABLED", true)?,
            completed_email_queue_enabled: env_bool("COMPLETED_EMAIL_QUEUE_ENABLED", true)?,
            max_messages: std::env::var("WORKER_MAX_MESSAGES")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_MAX_MESSAGES must be a valid usize"))?,
            idle_sleep_ms: std::env::var("WORKER_IDLE_SLEEP_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_IDLE_SLEEP_MS must be a valid u64"))?,
            error_sleep_ms: std::env::var("WORKER_ERROR_SLEEP_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_ERROR_SLEEP_MS must be a valid u64"))?,
            max_redeliveries: std::env::var("WORKER_MAX_REDELIVERIES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_MAX_REDELIVERIES must be a valid u32"))?,
            dedup_ttl_seconds: std::env::var("DEDUP_TTL_SECONDS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DEDUP_TTL_SECONDS must be a valid u64"))?,
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM").ok(),
            staff_push_webhook_url: std::env::var("STAFF_PUSH_WEBHOOK_URL").ok(),
        })
    }

    /// Whether a queue is enabled for this deployment.
    ///
    /// A queue counts as enabled only when the global flag, its own
    /// flag, and its delivery credentials are all present. A queue
    /// missing credentials is disabled, never an error, so partial
    /// deployments (email only, push only) stay healthy.
    pub fn queue_enabled(&self, kind: QueueKind) -> bool {
        if !self.queues_enabled {
            return false;
        }
        match kind {
            QueueKind::NotificationJobs => {
                self.notification_queue_enabled && self.staff_push_webhook_url.is_some()
            }
            QueueKind::CompletedEmails => {
                self.completed_email_queue_enabled && self.email_delivery_configured()
            }
        }
    }

    pub fn email_delivery_configured(&self) -> bool {
        self.resend_api_key.is_some() && self.email_from.is_some()
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn error_sleep(&self) -> Duration {
        Duration::from_millis(self.error_sleep_ms)
    }
}

/// Parse an environment boolean, accepting `true/false/1/0` (any case).
fn env_bool(name: &str, default: bool) -> anyhow::Result<bool> {
    match std::env::var(name) {
        Ok(raw) => parse_bool(&raw)
            .ok_or_else(|| anyhow::anyhow!("{} must be one of true/false/1/0", name)),
        Err(_) => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> WorkerConfig {
        WorkerConfig {
            redis_url: Some("redis://localhost:6379".to_string()),
            queues_enabled: true,
            notification_queue_enabled: true,
            completed_email_queue_enabled: true,
            max_messages: 50,
            idle_sleep_ms: 2000,
            error_sleep_ms: 10000,
            max_redeliveries: 5,
            dedup_ttl_seconds: 86400,
            resend_api_key: Some("re_test".to_string()),
            email_from: Some("orders@plateful.example".to_string()),
            staff_push_webhook_url: Some("https://push.plateful.example/hook".to_string()),
        }
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("FALSE"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn test_global_flag_disables_both_queues() {
        let mut config = base_config();
        config.queues_enabled = false;
        assert!(!config.queue_enabled(QueueKind::NotificationJobs));
        assert!(!config.queue_enabled(QueueKind::CompletedEmails));
    }

    #[test]
    fn test_missing_credentials_disable_only_that_queue() {
        let mut config = base_config();
        config.resend_api_key = None;
        assert!(config.queue_enabled(QueueKind::NotificationJobs));
        assert!(!config.queue_enabled(QueueKind::CompletedEmails));

        let mut config = base_config();
        config.staff_push_webhook_url = None;
        assert!(!config.queue_enabled(QueueKind::NotificationJobs));
        assert!(config.queue_enabled(QueueKind::CompletedEmails));
    }

    #[test]
    fn test_sleep_durations() {
        let config = base_config();
        assert_eq!(config.idle_sleep(), Duration::from_millis(2000));
        assert_eq!(config.error_sleep(), Duration::from_millis(10000));
    }
}
