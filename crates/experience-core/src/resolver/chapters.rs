//! Chapter metadata stored alongside a video.
//!
//! The console stores chapters either as JSON (an array of markers, or an
//! object with a `chapters` array) or as plain text with one `mm:ss Title`
//! line per marker. Anything else yields no chapters.

use experience_types::Chapter;
use serde_json::Value;

const TITLE_KEYS: [&str; 3] = ["title", "name", "label"];
const START_KEYS: [&str; 5] = ["start_time", "startTime", "start", "time", "timestamp"];

/// Parses `hh:mm:ss`, `mm:ss` or bare seconds. Negative and non-finite values
/// are rejected.
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let seconds = if raw.contains(':') {
        let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
        if parts.len() > 3 {
            return None;
        }
        let (last, leading) = parts.split_last()?;
        let mut total = 0.0;
        for part in leading {
            let value: u64 = part.parse().ok()?;
            total = total * 60.0 + value as f64;
        }
        let secs: f64 = last.parse().ok()?;
        if secs < 0.0 {
            return None;
        }
        total * 60.0 + secs
    } else {
        raw.parse::<f64>().ok()?
    };

    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

fn start_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|s| s.is_finite() && *s >= 0.0),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

fn chapter_from_object(entry: &Value) -> Option<Chapter> {
    let object = entry.as_object()?;
    let title = TITLE_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|title| !title.is_empty())?;
    let start_time = START_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(start_of))?;
    Some(Chapter {
        title: title.to_string(),
        start_time,
    })
}

fn chapters_from_json(value: &Value) -> Option<Vec<Chapter>> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(object) => object.get("chapters")?.as_array()?,
        _ => return None,
    };
    entries.iter().map(chapter_from_object).collect()
}

/// `mm:ss Title`, also accepting a dash or colon between the time and the title.
fn chapter_from_line(line: &str) -> Option<Chapter> {
    let (time, rest) = line.split_once(char::is_whitespace)?;
    let start_time = parse_timestamp(time)?;
    let title = rest
        .trim()
        .trim_start_matches(['-', '–', '—', ':', '|'])
        .trim();
    if title.is_empty() {
        return None;
    }
    Some(Chapter {
        title: title.to_string(),
        start_time,
    })
}

fn chapters_from_text(text: &str) -> Option<Vec<Chapter>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(chapter_from_line)
        .collect()
}

/// Parses stored chapter metadata into markers ordered by start time.
pub fn parse_chapters(metadata: &Value) -> Vec<Chapter> {
    let parsed = match metadata {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(json @ (Value::Array(_) | Value::Object(_))) => chapters_from_json(&json),
            _ => chapters_from_text(text),
        },
        other => chapters_from_json(other),
    };

    match parsed {
        Some(mut chapters) => {
            chapters.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
            chapters
        }
        None => {
            tracing::debug!("unreadable chapter metadata, ignoring");
            Vec::new()
        }
    }
}
