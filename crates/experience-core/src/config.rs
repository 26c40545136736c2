//! Session configuration.
//!
//! Everything here is validated once, when a conversation starts. Invalid
//! configuration is the only error the orchestration layer surfaces to the host.

use std::time::Duration;

/// Suppression window of the dedup gate.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(1500);
/// Lifetime requested for signed playback URLs.
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;

/// A custom error type for configuration failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Caption timing. All values are fixed per session.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleTiming {
    /// Maximum characters shown at once.
    pub max_chunk_chars: usize,
    /// How long the typing indicator shows before the first chunk.
    pub typing_delay: Duration,
    pub min_display: Duration,
    pub per_word: Duration,
    pub max_display: Duration,
    /// How long the last chunk lingers before the caption box empties.
    pub clear_delay: Duration,
}

impl Default for SubtitleTiming {
    fn default() -> Self {
        Self {
            max_chunk_chars: 100,
            typing_delay: Duration::from_millis(300),
            min_display: Duration::from_millis(2500),
            per_word: Duration::from_millis(150),
            max_display: Duration::from_millis(6000),
            clear_delay: Duration::from_millis(1500),
        }
    }
}

/// Per-conversation settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    conversation_id: String,
    demo_id: String,
    dedup_window: Duration,
    subtitle_timing: SubtitleTiming,
    signed_url_ttl_secs: u64,
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn demo_id(&self) -> &str {
        &self.demo_id
    }

    pub fn dedup_window(&self) -> Duration {
        self.dedup_window
    }

    pub fn subtitle_timing(&self) -> &SubtitleTiming {
        &self.subtitle_timing
    }

    pub fn signed_url_ttl_secs(&self) -> u64 {
        self.signed_url_ttl_secs
    }
}

pub struct SessionConfigBuilder {
    conversation_id: Option<String>,
    demo_id: Option<String>,
    dedup_window: Duration,
    subtitle_timing: SubtitleTiming,
    signed_url_ttl_secs: u64,
}

impl SessionConfigBuilder {
    pub fn new() -> Self {
        Self {
            conversation_id: None,
            demo_id: None,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            subtitle_timing: SubtitleTiming::default(),
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: &str) -> Self {
        self.conversation_id = Some(conversation_id.trim().to_string());
        self
    }

    pub fn with_demo_id(mut self, demo_id: &str) -> Self {
        self.demo_id = Some(demo_id.trim().to_string());
        self
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    pub fn with_subtitle_timing(mut self, timing: SubtitleTiming) -> Self {
        self.subtitle_timing = timing;
        self
    }

    pub fn with_signed_url_ttl_secs(mut self, ttl: u64) -> Self {
        self.signed_url_ttl_secs = ttl;
        self
    }

    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        let conversation_id = self
            .conversation_id
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::Missing("conversation_id"))?;
        let demo_id = self
            .demo_id
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::Missing("demo_id"))?;

        if self.dedup_window.is_zero() {
            return Err(ConfigError::Invalid(
                "dedup_window",
                "must be greater than zero".to_string(),
            ));
        }
        if self.signed_url_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "signed_url_ttl_secs",
                "must be greater than zero".to_string(),
            ));
        }

        let timing = &self.subtitle_timing;
        if timing.max_chunk_chars == 0 {
            return Err(ConfigError::Invalid(
                "max_chunk_chars",
                "must be greater than zero".to_string(),
            ));
        }
        if timing.min_display > timing.max_display {
            return Err(ConfigError::Invalid(
                "min_display",
                format!(
                    "{:?} exceeds max_display {:?}",
                    timing.min_display, timing.max_display
                ),
            ));
        }

        Ok(SessionConfig {
            conversation_id,
            demo_id,
            dedup_window: self.dedup_window,
            subtitle_timing: self.subtitle_timing,
            signed_url_ttl_secs: self.signed_url_ttl_secs,
        })
    }
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
