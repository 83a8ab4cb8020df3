//! Outbound email delivery

use async_trait::async_trait;
use classbook_common::{Error, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::EmailConfig;
use crate::templates::RenderedEmail;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub html: String,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, rendered: RenderedEmail) -> Self {
        Self {
            to: to.into(),
            subject: rendered.subject,
            body: rendered.body,
            html: rendered.html,
        }
    }
}

/// A single delivery attempt; failures surface as `Error::NotificationDelivery`
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Payload posted to the provider
#[derive(Serialize)]
struct ProviderRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Posts messages as JSON to an HTTP email provider
pub struct HttpEmailSender {
    http_client: reqwest::Client,
    provider_url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpEmailSender {
    pub fn new(
        provider_url: impl Into<String>,
        api_key: Option<String>,
        from: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            provider_url: provider_url.into(),
            api_key,
            from: from.into(),
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload = ProviderRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.body,
            html: &message.html,
        };

        let mut request = self.http_client.post(&self.provider_url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::NotificationDelivery(format!("email to {}: {}", message.to, e)))?;

        if !response.status().is_success() {
            return Err(Error::NotificationDelivery(format!(
                "email provider returned {} for {}",
                response.status(),
                message.to
            )));
        }

        debug!("Email accepted by provider for: {}", message.to);
        Ok(())
    }
}

/// Writes messages to the log instead of sending them
#[derive(Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            "[email disabled] to: {} subject: {:?}\n{}",
            message.to, message.subject, message.body
        );
        Ok(())
    }
}

/// Pick the sender described by the configuration
pub fn sender_from_config(config: &EmailConfig) -> anyhow::Result<Box<dyn EmailSender>> {
    match (&config.provider_url, config.enabled) {
        (Some(url), true) => {
            info!("Email delivery enabled via {}", url);
            Ok(Box::new(HttpEmailSender::new(
                url.clone(),
                config.api_key.clone(),
                config.from.clone(),
            )?))
        }
        _ => {
            info!("Email delivery disabled; messages will be logged");
            Ok(Box::new(LogEmailSender))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage::new(
            "ada@example.com",
            RenderedEmail {
                subject: "Hello".to_string(),
                body: "Body".to_string(),
                html: "<p>Body</p>".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        assert!(LogEmailSender.send(&message()).await.is_ok());
    }

    #[tokio::test]
    async fn test_http_sender_reports_unreachable_provider() {
        // Port 9 (discard) is closed on test machines
        let sender = HttpEmailSender::new("http://127.0.0.1:9/send", None, "test@local").unwrap();
        let err = sender.send(&message()).await.unwrap_err();
        assert!(matches!(err, Error::NotificationDelivery(_)));
    }

    #[test]
    fn test_disabled_config_selects_log_sender() {
        let config = EmailConfig {
            enabled: false,
            provider_url: Some("https://mail.example/send".to_string()),
            api_key: None,
            from: "ClassBook <no-reply@classbook.local>".to_string(),
        };
        assert!(sender_from_config(&config).is_ok());
    }
}
