use anyhow::{Context, Result};
use async_trait::async_trait;
use experience_types::OutboundEvent;
#[cfg(test)]
use mockall::automock;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Receiver of analytics events.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn send(&self, event: &OutboundEvent) -> Result<()>;
}

/// `POST <url>?t=<token>` with the event as JSON body.
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
    token: Option<SecretString>,
}

impl WebhookClient {
    pub fn new(url: &str, token: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            token,
        }
    }
}

#[async_trait]
impl WebhookSink for WebhookClient {
    async fn send(&self, event: &OutboundEvent) -> Result<()> {
        let mut request = self.client.post(&self.url).json(event);
        if let Some(token) = &self.token {
            request = request.query(&[("t", token.expose_secret())]);
        }

        request
            .send()
            .await
            .context("Failed to reach webhook")?
            .error_for_status()
            .context("Webhook rejected event")?;
        Ok(())
    }
}

/// Fire-and-forget delivery. Nothing here ever reaches the caller: failures
/// are logged and dropped, and nothing is retried.
#[derive(Clone, Default)]
pub struct OutboundForwarder {
    sink: Option<Arc<dyn WebhookSink>>,
}

impl OutboundForwarder {
    pub fn new(sink: Arc<dyn WebhookSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// A forwarder that drops every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn forward(&self, event: OutboundEvent) -> Option<JoinHandle<()>> {
        let Some(sink) = self.sink.clone() else {
            tracing::debug!(event_type = event.event_type(), "no webhook configured, dropping event");
            return None;
        };

        Some(tokio::spawn(async move {
            match sink.send(&event).await {
                Ok(()) => tracing::debug!(event_type = event.event_type(), "event forwarded"),
                Err(e) => tracing::debug!(
                    event_type = event.event_type(),
                    "event forward failed: {e:#}"
                ),
            }
        }))
    }
}
