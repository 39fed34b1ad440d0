//! Outbound delivery channels: staff push webhook and Resend email.
//!
//! Senders classify every failure as transient (worth a broker
//! redelivery) or permanent (retrying cannot succeed), which is the
//! distinction the processors and batch runner act on.

use reqwest::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use plateful_common::types::NotificationKind;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Delivery failure, classified for the retry decision.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Timeout, connection failure, rate limit, provider 5xx — the
    /// message should be nacked for redelivery.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Rejected outright (bad recipient, bad request) — redelivery
    /// cannot succeed.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

/// A staff push notification ready to send.
#[derive(Debug, Clone)]
pub struct StaffNotification {
    pub staff_id: Uuid,
    pub order_id: Uuid,
    pub kind: NotificationKind,
    pub body: String,
}

/// A completed-order email ready to send.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait PushSender {
    fn send(
        &self,
        notification: &StaffNotification,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

pub trait EmailSender {
    fn send(&self, email: &OutboundEmail) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Pushes staff notifications to the configured webhook endpoint.
pub struct WebhookPushSender {
    http: reqwest::Client,
    webhook_url: String,
}

impl WebhookPushSender {
    /// `webhook_url` may be empty only when the notification queue is
    /// disabled; a disabled queue never reaches the sender.
    pub fn new(webhook_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
        }
    }
}

impl PushSender for WebhookPushSender {
    async fn send(&self, notification: &StaffNotification) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(&self.webhook_url)
            .json(&serde_json::json!({
                "staff_id": notification.staff_id,
                "order_id": notification.order_id,
                "kind": notification.kind,
                "body": notification.body,
            }))
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        check_response_status(response.status(), "push webhook")
    }
}

/// Sends emails through the Resend HTTP API.
pub struct ResendEmailSender {
    http: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendEmailSender {
    /// Credentials may be empty only when the email queue is disabled.
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            from,
        }
    }
}

impl EmailSender for ResendEmailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": [email.to],
                "subject": email.subject,
                "text": email.body,
            }))
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        check_response_status(response.status(), "resend")
    }
}

/// Map an HTTP response status to a delivery outcome.
fn check_response_status(status: StatusCode, channel: &str) -> Result<(), DeliveryError> {
    if status.is_success() {
        return Ok(());
    }

    let detail = format!("{} returned {}", channel, status);
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        Err(DeliveryError::Transient(detail))
    } else {
        Err(DeliveryError::Permanent(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_statuses_pass() {
        assert!(check_response_status(StatusCode::OK, "t").is_ok());
        assert!(check_response_status(StatusCode::ACCEPTED, "t").is_ok());
    }

    #[test]
    fn test_rate_limit_and_5xx_are_transient() {
        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
        ] {
            match check_response_status(status, "t") {
                Err(DeliveryError::Transient(_)) => {}
                other => panic!("expected transient for {}, got {:?}", status, other),
            }
        }
    }

    #[test]
    fn test_client_errors_are_permanent() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::UNPROCESSABLE_ENTITY,
        ] {
            match check_response_status(status, "t") {
                Err(DeliveryError::Permanent(_)) => {}
                other => panic!("expected permanent for {}, got {:?}", status, other),
            }
        }
    }
}
