use crate::config::SessionConfig;
use crate::dedup::DedupGate;
use crate::resolver::ResolvedVideo;
use crate::subtitles::SubtitleScheduler;
use experience_types::{Role, TranscriptEntry, Utterance};
use std::collections::HashSet;
use tokio::time::Instant;

/// What occupies the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    #[default]
    Conversation,
    VideoPlaying,
}

/// Visibility of the trial call-to-action, and when it was first clicked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CtaState {
    visible: bool,
    clicked_at: Option<Instant>,
}

impl CtaState {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_clicked(&self) -> bool {
        self.clicked_at.is_some()
    }

    pub fn clicked_at(&self) -> Option<Instant> {
        self.clicked_at
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    /// Returns whether the CTA was visible.
    pub fn hide(&mut self) -> bool {
        std::mem::replace(&mut self.visible, false)
    }

    /// Clicks count once per session and the time is never cleared. Returns
    /// true for the first click.
    pub fn click(&mut self, now: Instant) -> bool {
        if self.clicked_at.is_some() {
            return false;
        }
        self.clicked_at = Some(now);
        true
    }
}

/// One line of the conversation history.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptMessage {
    id: String,
    role: Role,
    content: String,
    received_at: Instant,
}

impl TranscriptMessage {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }
}

/// Conversation history, reconstructed from batches and utterances that may
/// repeat earlier messages.
#[derive(Debug, Default)]
pub struct TranscriptLog {
    messages: Vec<TranscriptMessage>,
    seen: HashSet<String>,
    /// Numbers utterances that arrive without an id.
    unnamed: u64,
}

impl TranscriptLog {
    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push(&mut self, id: String, role: Role, content: &str, now: Instant) -> bool {
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.messages.push(TranscriptMessage {
            id,
            role,
            content: content.to_string(),
            received_at: now,
        });
        true
    }

    /// Batches replay the history from the start, so an entry without an id is
    /// identified by its position.
    pub fn record_batch(&mut self, entries: &[TranscriptEntry], now: Instant) -> usize {
        entries
            .iter()
            .enumerate()
            .filter(|(index, entry)| {
                let id = entry
                    .id()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("batch:{index}"));
                self.push(id, entry.role(), entry.content(), now)
            })
            .count()
    }

    /// Partial captions are not history and are never recorded.
    ///
    /// Only a wire id collapses repeated deliveries. Without one, every arrival
    /// is a new message, since the same line can legitimately be said twice.
    pub fn record_utterance(&mut self, utterance: &Utterance, now: Instant) -> bool {
        if utterance.is_partial() {
            return false;
        }
        let id = match utterance.id() {
            Some(id) => id.to_string(),
            None => {
                self.unnamed += 1;
                format!("{}:{}", utterance.role(), self.unnamed)
            }
        };
        self.push(id, utterance.role(), utterance.text(), now)
    }
}

/// Everything one conversation owns. Created on join, dropped on leave.
pub struct SessionState {
    pub playback: PlaybackMode,
    pub current_video: Option<ResolvedVideo>,
    pub cta: CtaState,
    pub dedup: DedupGate,
    pub subtitles: SubtitleScheduler,
    pub transcript: TranscriptLog,
}

impl SessionState {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            playback: PlaybackMode::Conversation,
            current_video: None,
            cta: CtaState::default(),
            dedup: DedupGate::new(config.dedup_window()),
            subtitles: SubtitleScheduler::new(config.subtitle_timing().clone()),
            transcript: TranscriptLog::default(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback == PlaybackMode::VideoPlaying
    }
}
