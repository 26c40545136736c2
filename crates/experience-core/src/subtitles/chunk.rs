//! Caption chunking.
//!
//! Text longer than the character budget is split at the coarsest boundary
//! that fits: sentences, then clauses, then words. Boundaries only count when
//! followed by whitespace, so re-joining the chunks with single spaces gives
//! back the original word sequence.

use crate::config::SubtitleTiming;
use std::time::Duration;

/// A piece of an utterance sized for the caption box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleChunk {
    pub text: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Sentence,
    Clause,
    Word,
}

impl Level {
    fn finer(self) -> Option<Level> {
        match self {
            Level::Sentence => Some(Level::Clause),
            Level::Clause => Some(Level::Word),
            Level::Word => None,
        }
    }

    fn pieces(self, text: &str) -> Vec<&str> {
        match self {
            Level::Sentence => split_after(text, |c| matches!(c, '.' | '!' | '?')),
            Level::Clause => split_after(text, |c| matches!(c, ',' | ';' | '-' | '–' | '—')),
            Level::Word => text.split_whitespace().collect(),
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Splits after every boundary character that is followed by whitespace.
fn split_after(text: &str, is_boundary: impl Fn(char) -> bool) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        let at_boundary = is_boundary(ch)
            && chars
                .peek()
                .is_some_and(|(_, next)| next.is_whitespace());
        if at_boundary {
            let end = pos + ch.len_utf8();
            pieces.push(text[start..end].trim());
            start = end;
        }
    }
    pieces.push(text[start..].trim());
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

fn split_level(text: &str, budget: usize, level: Level, out: &mut Vec<String>) {
    let mut current = String::new();

    for piece in level.pieces(text) {
        let piece_len = char_len(piece);

        if piece_len > budget {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            match level.finer() {
                Some(finer) => split_level(piece, budget, finer, out),
                // A single word longer than the budget is kept whole.
                None => out.push(piece.to_string()),
            }
            continue;
        }

        let joined_len = if current.is_empty() {
            piece_len
        } else {
            char_len(&current) + 1 + piece_len
        };
        if joined_len > budget {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(piece);
    }

    if !current.is_empty() {
        out.push(current);
    }
}

/// Splits `text` into caption-sized pieces of at most `budget` characters.
pub fn split_into_chunks(text: &str, budget: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if char_len(text) <= budget {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    split_level(text, budget, Level::Sentence, &mut out);
    out
}

/// `clamp(min + words * per_word, min, max)`
pub fn display_duration(text: &str, timing: &SubtitleTiming) -> Duration {
    let words = text.split_whitespace().count() as u32;
    let raw = timing.min_display + timing.per_word * words;
    raw.clamp(timing.min_display, timing.max_display)
}

pub fn build_chunks(text: &str, timing: &SubtitleTiming) -> Vec<SubtitleChunk> {
    split_into_chunks(text, timing.max_chunk_chars)
        .into_iter()
        .map(|text| {
            let duration = display_duration(&text, timing);
            SubtitleChunk { text, duration }
        })
        .collect()
}
