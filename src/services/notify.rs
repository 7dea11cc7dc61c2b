use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("sms gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sms gateway rejected message: {0}")]
    Rejected(String),
}

/// Outbound message delivery. Never part of an atomic unit.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, phone_no: &str, message: &str) -> Result<String, NotifyError>;
}

#[derive(Debug, Serialize)]
struct SmsPayload<'a> {
    api_key: &'a str,
    to: &'a str,
    message: &'a str,
}

/// HTTP SMS gateway client.
pub struct SmsGateway {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl SmsGateway {
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
        })
    }
}

#[async_trait]
impl Notifier for SmsGateway {
    async fn send(&self, phone_no: &str, message: &str) -> Result<String, NotifyError> {
        let response = self
            .client
            .post(&self.api_url)
            .json(&SmsPayload {
                api_key: &self.api_key,
                to: phone_no,
                message,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(NotifyError::Rejected(format!("{status}: {body}")));
        }
        Ok(body)
    }
}

/// Used when no gateway is configured; messages only reach the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, phone_no: &str, message: &str) -> Result<String, NotifyError> {
        tracing::info!(phone_no, message, "sms delivery disabled, message logged");
        Ok("logged".to_string())
    }
}

/// Sends after the unit has committed. Failures and sends that outlive
/// `limit` are logged and dropped.
pub async fn notify_best_effort(notifier: &dyn Notifier, limit: Duration, phone_no: &str, message: &str) {
    match tokio::time::timeout(limit, notifier.send(phone_no, message)).await {
        Ok(Ok(_)) => tracing::debug!(phone_no, "notification sent"),
        Ok(Err(err)) => tracing::warn!(phone_no, "notification failed: {err}"),
        Err(_) => tracing::warn!(phone_no, timeout_ms = limit.as_millis() as u64, "notification timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StalledGateway;

    #[async_trait]
    impl Notifier for StalledGateway {
        async fn send(&self, _phone_no: &str, _message: &str) -> Result<String, NotifyError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_send_is_abandoned_after_the_limit() {
        let bounded = tokio::time::timeout(
            Duration::from_secs(2),
            notify_best_effort(&StalledGateway, Duration::from_millis(20), "01700000000", "hello"),
        )
        .await;
        assert!(bounded.is_ok());
    }

    #[test]
    fn gateway_client_builds_with_a_timeout() {
        let gateway = SmsGateway::new(
            "http://localhost:9/sms".to_string(),
            "key".to_string(),
            Duration::from_secs(3),
        );
        assert!(gateway.is_ok());
    }
}
