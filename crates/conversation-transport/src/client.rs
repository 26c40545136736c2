use crate::client::stats::Stats;
use anyhow::Result;
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio_tungstenite::tungstenite::Message;

pub(crate) mod config;
mod consts;
pub(crate) mod stats;
mod utils;

type ServerTx = tokio::sync::broadcast::Sender<TransportEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<TransportEvent>;

/// What the relay delivers. Message payloads are passed on untouched; making
/// sense of them is the session's job.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message(Value),
    Closed { reason: Option<String> },
}

// Holds the event transmitter once connected along with the
// receive counters. The relay is listen-only; nothing is written back.
pub struct Client {
    capacity: usize,
    config: config::Config,
    s_tx: Option<ServerTx>,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    fn new(capacity: usize, config: config::Config) -> Self {
        Self {
            capacity,
            config,
            s_tx: None,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    async fn connect(&mut self) -> Result<()> {
        if self.s_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }

        let request = utils::build_request(&self.config)?;
        let (mut read, _) = tokio_tungstenite::connect_async(request).await?;
        tracing::info!(
            conversation_id = self.config.conversation_id(),
            "Connected to conversation relay"
        );

        let (s_tx, _) = tokio::sync::broadcast::channel(self.capacity);
        self.s_tx = Some(s_tx.clone());

        let stats = self.stats.clone();
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        break;
                    }
                    Ok(message) => message,
                };

                match message {
                    Message::Text(text) => {
                        let parsed = serde_json::from_str::<Value>(&text);
                        if let Ok(mut stats_guard) = stats.lock() {
                            stats_guard.record_received();
                            if parsed.is_err() {
                                stats_guard.record_unparsable();
                            }
                        }

                        match parsed {
                            Ok(json) => {
                                let event_type = json
                                    .get("event_type")
                                    .or_else(|| json.get("type"))
                                    .and_then(Value::as_str);
                                tracing::debug!(
                                    "received message: {}",
                                    event_type.unwrap_or("unknown")
                                );
                                // No subscribers is not an error; the message is simply dropped.
                                let _ = s_tx.send(TransportEvent::Message(json));
                            }
                            Err(e) => {
                                tracing::warn!("unparsable message: {}, text=> {:?}", e, text);
                            }
                        }
                    }
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        let close_event = TransportEvent::Closed {
                            reason: reason.map(|frame| frame.reason.to_string()),
                        };
                        if let Err(e) = s_tx.send(close_event) {
                            tracing::error!("failed to send close event: {}", e);
                        }
                        break;
                    }
                    _ => {}
                }
            }
            drop(s_tx);
        });
        Ok(())
    }

    /// A receiver for everything the relay sends from now on.
    pub fn server_events(&self) -> Result<ServerRx> {
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    pub fn stats(&self) -> Result<Stats> {
        if let Ok(stats_guard) = self.stats.lock() {
            Ok(stats_guard.clone())
        } else {
            Err(anyhow::anyhow!("failed to get stats"))
        }
    }
}

pub async fn connect_with_config(capacity: usize, config: config::Config) -> Result<Client> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}

/// Connects using `TRANSPORT_URL` and `TRANSPORT_API_KEY` for the given conversation.
pub async fn connect(conversation_id: &str) -> Result<Client> {
    let config = config::Config::builder()
        .with_conversation_id(conversation_id)
        .build();
    connect_with_config(1024, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconnected() -> Client {
        let config = config::Config::builder()
            .with_base_url("wss://relay.example.com")
            .with_conversation_id("c-1")
            .build();
        Client::new(8, config)
    }

    #[tokio::test]
    async fn requires_a_connection() {
        let client = unconnected();
        assert!(client.server_events().is_err());
        assert_eq!(client.stats().unwrap(), Stats::default());
    }

    #[tokio::test]
    async fn connect_fails_without_a_url() {
        let config = config::Config::builder()
            .with_base_url("")
            .with_conversation_id("c-1")
            .build();
        assert!(connect_with_config(8, config).await.is_err());
    }
}
