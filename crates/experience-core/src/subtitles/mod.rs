//! The caption state machine.
//!
//! `Idle -> Typing -> Displaying(0) -> ... -> Displaying(n) -> Clearing -> Idle`
//!
//! The scheduler never sleeps itself. It records at most one [`ScheduledTask`]
//! and the owner of the scheduler wakes it with [`SubtitleScheduler::on_timer`]
//! once the deadline passes. Every new task bumps the epoch, so a task that
//! was replaced or cancelled is recognised as stale when it fires.

pub mod chunk;

pub use chunk::{SubtitleChunk, build_chunks, display_duration, split_into_chunks};

use crate::config::SubtitleTiming;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleState {
    Idle,
    Typing,
    Displaying(usize),
    /// Carries the chunk left on screen while the caption fades out.
    Clearing(Option<usize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePhase {
    Idle,
    Typing,
    Displaying,
    Clearing,
}

/// What the caption box should show after a transition.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SubtitleFrame {
    pub phase: FramePhase,
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    pub chunk_count: usize,
}

/// A pending timer, valid only while its epoch is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTask {
    epoch: u64,
    deadline: Instant,
}

impl ScheduledTask {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

pub struct SubtitleScheduler {
    timing: SubtitleTiming,
    state: SubtitleState,
    /// The full utterance currently on screen.
    source: Option<String>,
    chunks: Vec<SubtitleChunk>,
    epoch: u64,
    pending: Option<ScheduledTask>,
}

impl SubtitleScheduler {
    pub fn new(timing: SubtitleTiming) -> Self {
        Self {
            timing,
            state: SubtitleState::Idle,
            source: None,
            chunks: Vec::new(),
            epoch: 0,
            pending: None,
        }
    }

    pub fn state(&self) -> SubtitleState {
        self.state
    }

    pub fn pending(&self) -> Option<ScheduledTask> {
        self.pending
    }

    pub fn chunks(&self) -> &[SubtitleChunk] {
        &self.chunks
    }

    pub fn displayed_text(&self) -> Option<&str> {
        let index = match self.state {
            SubtitleState::Displaying(i) => Some(i),
            SubtitleState::Clearing(i) => i,
            SubtitleState::Idle | SubtitleState::Typing => None,
        }?;
        self.chunks.get(index).map(|chunk| chunk.text.as_str())
    }

    /// New text from the replica. Text identical to what is already on screen
    /// is ignored, anything else restarts the machine.
    pub fn on_text(&mut self, text: &str, now: Instant) -> Option<SubtitleFrame> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.state != SubtitleState::Idle && self.source.as_deref() == Some(text) {
            return None;
        }

        self.chunks = build_chunks(text, &self.timing);
        self.source = Some(text.to_string());
        self.state = SubtitleState::Typing;
        self.schedule(now + self.timing.typing_delay);
        tracing::trace!(chunks = self.chunks.len(), "caption typing");
        Some(self.frame())
    }

    /// Stop-speaking or an explicit clear: go straight to Clearing.
    pub fn clear(&mut self, now: Instant) -> Option<SubtitleFrame> {
        self.state = match self.state {
            SubtitleState::Idle | SubtitleState::Clearing(_) => return None,
            SubtitleState::Typing => SubtitleState::Clearing(None),
            SubtitleState::Displaying(i) => SubtitleState::Clearing(Some(i)),
        };
        self.schedule(now + self.timing.clear_delay);
        Some(self.frame())
    }

    /// Advances the machine when `task` fires. Stale tasks are ignored.
    pub fn on_timer(&mut self, task: ScheduledTask, now: Instant) -> Option<SubtitleFrame> {
        if self.pending != Some(task) {
            tracing::trace!(epoch = task.epoch, current = self.epoch, "stale caption timer");
            return None;
        }
        self.pending = None;

        match self.state {
            SubtitleState::Idle => return None,
            SubtitleState::Typing => self.show_chunk(0, now),
            SubtitleState::Displaying(i) => self.show_chunk(i + 1, now),
            SubtitleState::Clearing(_) => {
                self.state = SubtitleState::Idle;
                self.source = None;
                self.chunks.clear();
            }
        }
        Some(self.frame())
    }

    /// Drops all caption state without emitting anything. Used when the
    /// conversation ends.
    pub fn cancel(&mut self) {
        self.cancel_pending();
        self.state = SubtitleState::Idle;
        self.source = None;
        self.chunks.clear();
    }

    pub fn frame(&self) -> SubtitleFrame {
        let (phase, chunk_index) = match self.state {
            SubtitleState::Idle => (FramePhase::Idle, None),
            SubtitleState::Typing => (FramePhase::Typing, None),
            SubtitleState::Displaying(i) => (FramePhase::Displaying, Some(i)),
            SubtitleState::Clearing(i) => (FramePhase::Clearing, i),
        };
        SubtitleFrame {
            phase,
            text: self.displayed_text().map(str::to_string),
            chunk_index,
            chunk_count: self.chunks.len(),
        }
    }

    fn show_chunk(&mut self, index: usize, now: Instant) {
        match self.chunks.get(index) {
            Some(chunk) => {
                let deadline = now + chunk.duration;
                self.state = SubtitleState::Displaying(index);
                self.schedule(deadline);
            }
            None => {
                let last = index.checked_sub(1).filter(|i| *i < self.chunks.len());
                self.state = SubtitleState::Clearing(last);
                self.schedule(now + self.timing.clear_delay);
            }
        }
    }

    fn cancel_pending(&mut self) {
        self.epoch += 1;
        self.pending = None;
    }

    fn schedule(&mut self, deadline: Instant) {
        self.cancel_pending();
        self.pending = Some(ScheduledTask {
            epoch: self.epoch,
            deadline,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn fire(scheduler: &mut SubtitleScheduler) -> (Instant, Option<SubtitleFrame>) {
        let task = scheduler.pending().expect("a pending task");
        let at = task.deadline();
        (at, scheduler.on_timer(task, at))
    }

    #[test]
    fn short_utterance_runs_the_full_cycle() {
        let mut scheduler = SubtitleScheduler::new(SubtitleTiming::default());
        let t0 = Instant::now();

        let frame = scheduler.on_text("Hello there, welcome!", t0).unwrap();
        assert_eq!(frame.phase, FramePhase::Typing);
        assert_eq!(frame.text, None);
        assert_eq!(scheduler.pending().unwrap().deadline(), t0 + ms(300));

        let (shown_at, frame) = fire(&mut scheduler);
        let frame = frame.unwrap();
        assert_eq!(frame.phase, FramePhase::Displaying);
        assert_eq!(frame.text.as_deref(), Some("Hello there, welcome!"));
        assert_eq!(frame.chunk_count, 1);
        assert_eq!(scheduler.pending().unwrap().deadline(), shown_at + ms(2950));

        let (cleared_at, frame) = fire(&mut scheduler);
        let frame = frame.unwrap();
        assert_eq!(frame.phase, FramePhase::Clearing);
        assert_eq!(frame.text.as_deref(), Some("Hello there, welcome!"));
        assert_eq!(scheduler.pending().unwrap().deadline(), cleared_at + ms(1500));

        let (_, frame) = fire(&mut scheduler);
        assert_eq!(frame.unwrap().phase, FramePhase::Idle);
        assert_eq!(scheduler.state(), SubtitleState::Idle);
        assert_eq!(scheduler.displayed_text(), None);
        assert!(scheduler.pending().is_none());
    }

    #[test]
    fn long_utterance_advances_chunk_by_chunk() {
        let mut scheduler = SubtitleScheduler::new(SubtitleTiming::default());
        let text = "We built dashboards so every team can see its numbers at a glance. \
                    Reports refresh every hour and can be shared with a single link. \
                    Alerts fire when a metric moves outside the range you choose.";
        scheduler.on_text(text, Instant::now());
        let count = scheduler.chunks().len();
        assert!(count > 1);

        for expected in 0..count {
            let (_, frame) = fire(&mut scheduler);
            assert_eq!(frame.unwrap().chunk_index, Some(expected));
        }
        let (_, frame) = fire(&mut scheduler);
        assert_eq!(frame.unwrap().phase, FramePhase::Clearing);
    }

    #[test]
    fn repeated_text_is_ignored_but_new_text_restarts() {
        let mut scheduler = SubtitleScheduler::new(SubtitleTiming::default());
        let t0 = Instant::now();
        scheduler.on_text("Hello", t0);
        fire(&mut scheduler);

        assert_eq!(scheduler.on_text("Hello", t0 + ms(400)), None);
        assert_eq!(scheduler.state(), SubtitleState::Displaying(0));

        let before = scheduler.pending().unwrap();
        let frame = scheduler.on_text("Something else", t0 + ms(500)).unwrap();
        assert_eq!(frame.phase, FramePhase::Typing);
        assert_ne!(scheduler.pending().unwrap().epoch(), before.epoch());
        // The replaced timer no longer does anything.
        assert_eq!(scheduler.on_timer(before, before.deadline()), None);
        assert_eq!(scheduler.state(), SubtitleState::Typing);
    }

    #[test]
    fn clear_forces_clearing_and_invalidates_timers() {
        let mut scheduler = SubtitleScheduler::new(SubtitleTiming::default());
        let t0 = Instant::now();
        scheduler.on_text("Hello", t0);
        fire(&mut scheduler);
        let chunk_timer = scheduler.pending().unwrap();

        let frame = scheduler.clear(t0 + ms(1000)).unwrap();
        assert_eq!(frame.phase, FramePhase::Clearing);
        assert_eq!(scheduler.on_timer(chunk_timer, chunk_timer.deadline()), None);

        // Clearing twice does not extend the fade.
        let clear_timer = scheduler.pending().unwrap();
        assert_eq!(scheduler.clear(t0 + ms(1200)), None);
        assert_eq!(scheduler.pending(), Some(clear_timer));

        let (_, frame) = fire(&mut scheduler);
        assert_eq!(frame.unwrap().phase, FramePhase::Idle);
        assert_eq!(scheduler.clear(t0 + ms(5000)), None);
    }

    #[test]
    fn cancel_is_silent_and_final() {
        let mut scheduler = SubtitleScheduler::new(SubtitleTiming::default());
        scheduler.on_text("Hello", Instant::now());
        let task = scheduler.pending().unwrap();

        scheduler.cancel();
        assert!(scheduler.pending().is_none());
        assert_eq!(scheduler.on_timer(task, task.deadline()), None);
        assert_eq!(scheduler.state(), SubtitleState::Idle);
    }
}
