use anyhow::{Context, Result};
use async_trait::async_trait;
use conversation_transport::{Client, ServerRx, TransportEvent};
use experience_core::source::EventSource;
use experience_core::types::RawMessage;
use tokio::sync::broadcast::error::RecvError;

/// Adapts the transport relay to the generic `EventSource` trait.
pub struct TransportSource {
    client: Option<Client>,
    events: ServerRx,
}

impl TransportSource {
    /// Connects to the relay for `conversation_id` using `TRANSPORT_URL` and `TRANSPORT_API_KEY`.
    pub async fn connect(conversation_id: &str) -> Result<Self> {
        let client = conversation_transport::connect(conversation_id)
            .await
            .context("Failed to connect to the conversation transport")?;
        let events = client.server_events()?;
        Ok(Self {
            client: Some(client),
            events,
        })
    }

    pub fn from_receiver(events: ServerRx) -> Self {
        Self {
            client: None,
            events,
        }
    }

    fn log_stats(&self) {
        if let Some(stats) = self.client.as_ref().and_then(|c| c.stats().ok()) {
            tracing::info!(
                received = stats.received(),
                unparsable = stats.unparsable(),
                "Transport closed"
            );
        }
    }
}

#[async_trait]
impl EventSource for TransportSource {
    async fn next_message(&mut self) -> Result<Option<RawMessage>> {
        loop {
            match self.events.recv().await {
                Ok(TransportEvent::Message(message)) => return Ok(Some(message)),
                Ok(TransportEvent::Closed { reason }) => {
                    tracing::info!("Relay closed the connection: {:?}", reason);
                    self.log_stats();
                    return Ok(None);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Fell behind the transport, messages were dropped");
                }
                Err(RecvError::Closed) => {
                    self.log_stats();
                    return Ok(None);
                }
            }
        }
    }
}
