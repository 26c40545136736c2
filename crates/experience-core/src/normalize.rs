//! Turns raw transport messages into [`NormalizedEvent`]s.
//!
//! Each wire shape has its own extractor. They are tried in a fixed order and
//! the first one that recognises the message wins, so a message is never
//! interpreted two ways.

use experience_types::events::{event_types, wire};
use experience_types::{
    NormalizedEvent, RawMessage, Role, StatusEvent, ToolCall, ToolName, TranscriptEntry,
    Utterance,
};
use serde_json::{Map, Value};

type Extractor = fn(&RawMessage) -> Option<NormalizedEvent>;

const EXTRACTORS: [(&str, Extractor); 6] = [
    ("status", extract_status),
    ("structured_tool_call", extract_structured_tool_call),
    ("legacy_tool_call", extract_legacy_tool_call),
    ("transcript_tool_call", extract_transcript_tool_call),
    ("utterance", extract_utterance),
    ("transcript_batch", extract_transcript_batch),
];

/// Top-level fields that may carry a live caption, in priority order.
const CAPTION_POINTERS: [&str; 7] = [
    "/partial_transcript",
    "/speech",
    "/text",
    "/caption",
    "/subtitle",
    "/message/text",
    "/content/text",
];

static NULL: Value = Value::Null;

/// Fields of `properties` that may carry utterance text.
const UTTERANCE_TEXT_KEYS: [&str; 3] = ["speech", "text", "content"];

pub fn normalize(raw: &RawMessage) -> NormalizedEvent {
    if !raw.is_object() {
        tracing::trace!("ignoring non-object message");
        return NormalizedEvent::Unrecognized;
    }

    for (strategy, extract) in EXTRACTORS {
        if let Some(event) = extract(raw) {
            tracing::trace!(strategy, kind = event.kind(), "normalized message");
            return event;
        }
    }

    tracing::trace!("unrecognized message");
    NormalizedEvent::Unrecognized
}

/// Why a tool-call shaped message was not turned into a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    UnknownTool(String),
    MissingArguments(ToolName),
}

fn build_tool_call(name: &str, arguments: &Value) -> Result<ToolCall, Rejection> {
    let name = name
        .parse::<ToolName>()
        .map_err(|unknown| Rejection::UnknownTool(unknown.0))?;
    let args = parse_arguments(name, arguments);

    if name == ToolName::FetchVideo && args.is_empty() {
        return Err(Rejection::MissingArguments(name));
    }
    Ok(ToolCall::new(name, args))
}

/// Accepts an object, a JSON-encoded object, or (for fetch_video) a bare
/// string that is taken to be the title.
fn parse_arguments(name: ToolName, arguments: &Value) -> Map<String, Value> {
    match arguments {
        Value::Object(map) => map.clone(),
        Value::String(encoded) => {
            let encoded = encoded.trim();
            if encoded.is_empty() {
                return Map::new();
            }
            match serde_json::from_str::<Value>(encoded) {
                Ok(Value::Object(map)) => map,
                Ok(Value::String(inner)) => title_argument(name, inner.trim()),
                _ => title_argument(name, encoded),
            }
        }
        _ => Map::new(),
    }
}

fn title_argument(name: ToolName, raw: &str) -> Map<String, Value> {
    let mut args = Map::new();
    if name == ToolName::FetchVideo && !raw.is_empty() {
        args.insert("title".to_string(), Value::String(raw.to_string()));
    }
    args
}

/// Resolves a tool-call shape into an event. A rejected call is final: the
/// message is a tool call, just not one we will dispatch.
fn finish_tool_call(name: &str, arguments: &Value) -> NormalizedEvent {
    match build_tool_call(name, arguments) {
        Ok(call) => NormalizedEvent::ToolCall(call),
        Err(Rejection::UnknownTool(name)) => {
            tracing::trace!(tool = %name, "ignoring tool outside the whitelist");
            NormalizedEvent::Unrecognized
        }
        Err(Rejection::MissingArguments(name)) => {
            tracing::debug!(tool = %name, "dropping tool call without arguments");
            NormalizedEvent::Unrecognized
        }
    }
}

fn str_at<'a>(raw: &'a Value, pointers: &[&str]) -> Option<&'a str> {
    pointers
        .iter()
        .filter_map(|pointer| raw.pointer(pointer).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn value_at<'a>(raw: &'a Value, pointers: &[&str]) -> &'a Value {
    pointers
        .iter()
        .filter_map(|pointer| raw.pointer(pointer))
        .find(|value| !value.is_null())
        .unwrap_or(&NULL)
}

fn extract_status(raw: &RawMessage) -> Option<NormalizedEvent> {
    let event_type = raw.get("event_type")?.as_str()?;
    StatusEvent::from_event_type(event_type, raw.get("properties")).map(NormalizedEvent::Status)
}

/// `{ event_type: "conversation_toolcall", name, arguments }`, also with
/// `name`/`arguments` nested under `properties`.
fn extract_structured_tool_call(raw: &RawMessage) -> Option<NormalizedEvent> {
    let event_type = raw.get("event_type")?.as_str()?;
    if !event_types::TOOL_CALL.contains(&event_type) {
        return None;
    }

    let Some(name) = str_at(raw, &["/name", "/properties/name", "/tool_name"]) else {
        tracing::debug!(event_type, "tool call event without a name");
        return Some(NormalizedEvent::Unrecognized);
    };
    let arguments = value_at(raw, &["/arguments", "/properties/arguments", "/args"]);
    Some(finish_tool_call(name, arguments))
}

/// `{ type: "tool_call", name | function.name, args | arguments }`
fn extract_legacy_tool_call(raw: &RawMessage) -> Option<NormalizedEvent> {
    if raw.get("type")?.as_str()? != event_types::LEGACY_TOOL_CALL {
        return None;
    }

    let Some(name) = str_at(raw, &["/name", "/function/name"]) else {
        tracing::debug!("legacy tool call without a name");
        return Some(NormalizedEvent::Unrecognized);
    };
    let arguments = value_at(raw, &["/args", "/arguments", "/function/arguments"]);
    Some(finish_tool_call(name, arguments))
}

/// `{ transcript: [ { role, tool_calls: [ { function: { name, arguments } } ] } ] }`
///
/// Only the last assistant line carrying tool calls is considered, and only its
/// first call. A rejected call falls through so the transcript can still be
/// read as a batch.
fn extract_transcript_tool_call(raw: &RawMessage) -> Option<NormalizedEvent> {
    let lines = wire::transcript_lines(raw)?;
    let calls = lines.iter().rev().find_map(|line| {
        let role = line.role.as_deref().and_then(Role::parse);
        let calls = line.tool_calls();
        (role == Some(Role::Assistant) && !calls.is_empty()).then_some(calls)
    })?;

    let function = &calls.first()?.function;
    let name = function.name.as_deref()?;
    match build_tool_call(name, &function.arguments) {
        Ok(call) => Some(NormalizedEvent::ToolCall(call)),
        Err(rejection) => {
            tracing::debug!(?rejection, "transcript tool call not dispatchable");
            None
        }
    }
}

/// `{ event_type: "conversation.utterance", properties: { role, speech | text | content } }`
/// or a bare caption field at the top level.
fn extract_utterance(raw: &RawMessage) -> Option<NormalizedEvent> {
    let event_type = raw.get("event_type").and_then(Value::as_str);

    if event_type == Some(event_types::UTTERANCE) {
        let properties = raw.get("properties")?;
        let role = Role::parse(properties.get("role")?.as_str()?)?;
        let text = UTTERANCE_TEXT_KEYS
            .iter()
            .filter_map(|key| properties.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())?;

        let mut utterance = Utterance::new(role, text);
        if let Some(id) = str_at(
            raw,
            &["/inference_id", "/properties/inference_id", "/properties/id", "/id"],
        ) {
            utterance = utterance.with_id(id);
        }
        return Some(NormalizedEvent::Utterance(utterance));
    }

    let text = str_at(raw, &CAPTION_POINTERS)?;
    let utterance = match raw.get("role").and_then(Value::as_str) {
        Some(role) => Utterance::new(Role::parse(role)?, text),
        None => Utterance::partial(text),
    };
    Some(NormalizedEvent::Utterance(utterance))
}

/// `{ transcript: [ { role, content } ] }`
fn extract_transcript_batch(raw: &RawMessage) -> Option<NormalizedEvent> {
    let entries: Vec<TranscriptEntry> = wire::transcript_lines(raw)?
        .iter()
        .filter_map(|line| {
            let role = Role::parse(line.role.as_deref()?)?;
            let text = line.text();
            if text.is_empty() {
                return None;
            }
            let entry = TranscriptEntry::new(role, text);
            Some(match line.id_string() {
                Some(id) => entry.with_id(id),
                None => entry,
            })
        })
        .collect();

    (!entries.is_empty()).then_some(NormalizedEvent::TranscriptBatch(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_call(event: NormalizedEvent) -> ToolCall {
        match event {
            NormalizedEvent::ToolCall(call) => call,
            other => panic!("expected a tool call, got {other:?}"),
        }
    }

    #[test]
    fn structured_tool_call() {
        let raw = json!({
            "event_type": "conversation_toolcall",
            "name": "fetch_video",
            "arguments": {"title": "Pricing Overview"}
        });
        let call = tool_call(normalize(&raw));
        assert_eq!(call.name(), ToolName::FetchVideo);
        assert_eq!(call.title().as_deref(), Some("Pricing Overview"));
    }

    #[test]
    fn structured_tool_call_with_nested_properties_and_encoded_arguments() {
        let raw = json!({
            "event_type": "conversation.tool_call",
            "properties": {"name": "seek_video", "arguments": "{\"time\": \"1:30\"}"}
        });
        let call = tool_call(normalize(&raw));
        assert_eq!(call.name(), ToolName::SeekVideo);
        assert_eq!(call.arg_str("time").as_deref(), Some("1:30"));
    }

    #[test]
    fn legacy_flat_shapes() {
        let raw = json!({"type": "tool_call", "name": "pause_video", "args": {}});
        assert_eq!(tool_call(normalize(&raw)).name(), ToolName::PauseVideo);

        let raw = json!({
            "type": "tool_call",
            "function": {"name": "fetch_video", "arguments": "{\"title\":\"Dashboards\"}"}
        });
        let call = tool_call(normalize(&raw));
        assert_eq!(call.title().as_deref(), Some("Dashboards"));
    }

    #[test]
    fn transcript_embedded_tool_call_uses_last_assistant_entry() {
        let raw = json!({
            "transcript": [
                {"role": "assistant", "tool_calls": [{"function": {"name": "pause_video", "arguments": "{}"}}]},
                {"role": "user", "content": "show me reports"},
                {"role": "assistant", "tool_calls": [
                    {"function": {"name": "fetch_video", "arguments": "{\"title\": \"Reports\"}"}},
                    {"function": {"name": "close_video", "arguments": "{}"}}
                ]},
                {"role": "user", "content": "thanks"}
            ]
        });
        let call = tool_call(normalize(&raw));
        assert_eq!(call.name(), ToolName::FetchVideo);
        assert_eq!(call.title().as_deref(), Some("Reports"));
    }

    #[test]
    fn unparsable_fetch_arguments_become_the_title() {
        let raw = json!({
            "transcript": [
                {"role": "assistant", "tool_calls": [{"function": {"name": "fetch_video", "arguments": "Feature: Dashboards"}}]}
            ]
        });
        let call = tool_call(normalize(&raw));
        assert_eq!(call.title().as_deref(), Some("Feature: Dashboards"));
    }

    #[test]
    fn fetch_without_arguments_is_unrecognized() {
        for raw in [
            json!({"event_type": "conversation_toolcall", "name": "fetch_video", "arguments": {}}),
            json!({"event_type": "conversation_toolcall", "name": "fetch_video"}),
            json!({"type": "tool_call", "name": "fetch_video", "arguments": ""}),
        ] {
            assert_eq!(normalize(&raw), NormalizedEvent::Unrecognized, "{raw}");
        }
    }

    #[test]
    fn unknown_tools_are_unrecognized() {
        let raw = json!({"event_type": "conversation_toolcall", "name": "rm_rf", "arguments": {}});
        assert_eq!(normalize(&raw), NormalizedEvent::Unrecognized);
    }

    #[test]
    fn utterance_reads_alternate_text_fields() {
        let raw = json!({
            "event_type": "conversation.utterance",
            "inference_id": "inf-1",
            "properties": {"role": "replica", "speech": "Hello there, welcome!"}
        });
        match normalize(&raw) {
            NormalizedEvent::Utterance(u) => {
                assert_eq!(u.role(), Role::Assistant);
                assert_eq!(u.text(), "Hello there, welcome!");
                assert_eq!(u.id(), Some("inf-1"));
                assert!(!u.is_partial());
            }
            other => panic!("unexpected {other:?}"),
        }

        let raw = json!({
            "event_type": "conversation.utterance",
            "properties": {"role": "user", "content": "what does it cost?"}
        });
        assert!(matches!(normalize(&raw), NormalizedEvent::Utterance(u) if u.role() == Role::User));
    }

    #[test]
    fn partial_caption_fields() {
        for raw in [
            json!({"partial_transcript": "Let me show"}),
            json!({"caption": "Let me show"}),
            json!({"message": {"text": "Let me show"}}),
            json!({"content": {"text": "Let me show"}}),
        ] {
            match normalize(&raw) {
                NormalizedEvent::Utterance(u) => {
                    assert!(u.is_partial());
                    assert_eq!(u.text(), "Let me show");
                }
                other => panic!("unexpected {other:?} for {raw}"),
            }
        }
    }

    #[test]
    fn bulk_transcript_batch() {
        let raw = json!({
            "messages": [
                {"id": "m1", "role": "user", "content": "hi"},
                {"role": "system", "content": "you are a demo agent"},
                {"role": "assistant", "content": "Hello!"},
                {"role": "assistant", "content": ""}
            ]
        });
        match normalize(&raw) {
            NormalizedEvent::TranscriptBatch(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].id(), Some("m1"));
                assert_eq!(entries[1].role(), Role::Assistant);
                assert_eq!(entries[1].content(), "Hello!");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn transcript_with_rejected_tool_call_is_still_a_batch() {
        let raw = json!({
            "transcript": [
                {"role": "user", "content": "play it"},
                {"role": "assistant", "content": "Sure", "tool_calls": [{"function": {"name": "fetch_video", "arguments": "{}"}}]}
            ]
        });
        assert!(matches!(normalize(&raw), NormalizedEvent::TranscriptBatch(e) if e.len() == 2));
    }

    #[test]
    fn status_markers() {
        let raw = json!({"event_type": "conversation.replica.stopped_speaking"});
        assert_eq!(
            normalize(&raw),
            NormalizedEvent::Status(StatusEvent::ReplicaStoppedSpeaking)
        );
    }

    #[test]
    fn everything_else_is_unrecognized() {
        for raw in [
            json!(null),
            json!("text"),
            json!({}),
            json!({"event_type": "system.replica_joined"}),
            json!({"text": "   "}),
        ] {
            assert_eq!(normalize(&raw), NormalizedEvent::Unrecognized, "{raw}");
        }
    }
}
