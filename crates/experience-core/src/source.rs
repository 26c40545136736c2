//! Where raw conversation messages come from.
//!
//! A live transport and a recorded replay both implement [`EventSource`];
//! [`pump`] feeds either into a session.

use crate::session::SessionHandle;
use anyhow::{Context, Result};
use async_trait::async_trait;
use experience_types::RawMessage;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventSource: Send {
    /// The next message, or `None` once the stream is over.
    async fn next_message(&mut self) -> Result<Option<RawMessage>>;
}

#[derive(Debug, Clone, PartialEq)]
struct ReplayEntry {
    /// Offset from the start of the replay.
    at: Option<Duration>,
    message: RawMessage,
}

/// Plays back a recorded conversation.
///
/// The recording is JSON Lines. Each line is either a raw message or
/// `{"at_ms": <offset>, "message": {...}}` to reproduce the original pacing.
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug)]
pub struct ReplaySource {
    entries: VecDeque<ReplayEntry>,
    started: Option<Instant>,
}

impl ReplaySource {
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut entries = VecDeque::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read recording")?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let value: Value = serde_json::from_str(line)
                .with_context(|| format!("Invalid JSON on line {}", index + 1))?;
            entries.push_back(Self::entry(value));
        }

        tracing::debug!(messages = entries.len(), "Loaded recording");
        Ok(Self {
            entries,
            started: None,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open recording {}", path.display()))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    fn entry(value: Value) -> ReplayEntry {
        let at = value.get("at_ms").and_then(Value::as_u64);
        match (at, value.get("message")) {
            (Some(ms), Some(message)) => ReplayEntry {
                at: Some(Duration::from_millis(ms)),
                message: message.clone(),
            },
            _ => ReplayEntry {
                at: None,
                message: value,
            },
        }
    }
}

#[async_trait]
impl EventSource for ReplaySource {
    async fn next_message(&mut self) -> Result<Option<RawMessage>> {
        let started = *self.started.get_or_insert_with(Instant::now);
        let Some(entry) = self.entries.pop_front() else {
            return Ok(None);
        };

        if let Some(at) = entry.at {
            tokio::time::sleep_until(started + at).await;
        }
        Ok(Some(entry.message))
    }
}

/// Feeds `source` into the session until either side stops. Returns the number
/// of messages delivered.
pub async fn pump<S>(source: &mut S, session: &SessionHandle) -> Result<usize>
where
    S: EventSource + ?Sized,
{
    let mut delivered = 0;
    while let Some(message) = source.next_message().await? {
        if session.ingest(message).await.is_err() {
            tracing::info!(delivered, "Session ended before the source did");
            return Ok(delivered);
        }
        delivered += 1;
    }
    tracing::info!(delivered, "Event source finished");
    Ok(delivered)
}
