//! Typed views over the transport's message shapes.
//!
//! Every field is optional or defaulted: the transport does not guarantee any
//! of them, so a missing field must read as "absent" rather than fail the whole
//! message.

use serde_json::Value;

/// A function invocation as found in `tool_calls` arrays.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct WireFunction {
    #[serde(default)]
    pub name: Option<String>,
    /// Either a JSON object or a JSON-encoded string.
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct WireToolCall {
    #[serde(default)]
    pub function: WireFunction,
}

/// One line of a `transcript` / `messages` array.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TranscriptLine {
    #[serde(default, alias = "message_id")]
    pub id: Option<Value>,
    #[serde(default)]
    pub role: Option<String>,
    /// A plain string, or an array of `{type, text}` parts.
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub tool_calls: Option<Vec<Value>>,
}

impl TranscriptLine {
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Flattened text content, empty when the line carries none.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.trim().to_string(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        }
    }

    /// Tool calls that deserialize cleanly; malformed entries are skipped.
    pub fn tool_calls(&self) -> Vec<WireToolCall> {
        self.tool_calls
            .iter()
            .flatten()
            .filter_map(|call| serde_json::from_value(call.clone()).ok())
            .collect()
    }
}

/// Finds the transcript array in any of the places the transport puts it.
pub fn transcript_lines(raw: &Value) -> Option<Vec<TranscriptLine>> {
    let array = raw
        .get("transcript")
        .or_else(|| raw.pointer("/properties/transcript"))
        .or_else(|| raw.get("messages"))?
        .as_array()?;
    Some(
        array
            .iter()
            .filter_map(|line| serde_json::from_value(line.clone()).ok())
            .collect(),
    )
}
