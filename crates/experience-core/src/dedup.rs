use experience_types::{ToolCall, ToolName};
use std::time::Duration;
use tokio::time::Instant;

/// The most recently forwarded tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupEntry {
    key: String,
    timestamp: Instant,
}

impl DedupEntry {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

/// Suppresses repeated tool calls that the upstream emits in bursts.
///
/// Only one entry is tracked for the whole session: any call that is forwarded
/// replaces it, whatever its key. A call is suppressed when it repeats the
/// key of that entry within the window.
#[derive(Debug)]
pub struct DedupGate {
    window: Duration,
    last: Option<DedupEntry>,
}

impl DedupGate {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn should_forward(&mut self, call: &ToolCall, now: Instant) -> bool {
        let key = dedup_key(call);

        if let Some(last) = &self.last {
            let elapsed = now.saturating_duration_since(last.timestamp);
            if last.key == key && elapsed < self.window {
                tracing::debug!(%key, ?elapsed, "suppressing duplicate tool call");
                return false;
            }
        }

        self.last = Some(DedupEntry {
            key,
            timestamp: now,
        });
        true
    }

    pub fn last(&self) -> Option<&DedupEntry> {
        self.last.as_ref()
    }
}

/// `name:fingerprint`
pub fn dedup_key(call: &ToolCall) -> String {
    format!("{}:{}", call.name(), fingerprint(call))
}

/// Lower-cased title for fetch_video (or the serialized arguments when no
/// title is present); empty for every other tool.
pub fn fingerprint(call: &ToolCall) -> String {
    if call.name() != ToolName::FetchVideo {
        return String::new();
    }
    match call.title() {
        Some(title) => title.trim().to_lowercase(),
        None => serde_json::to_string(call.args()).unwrap_or_default(),
    }
}
