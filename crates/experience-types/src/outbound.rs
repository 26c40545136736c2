use serde_json::Value;

/// A payload for the webhook/analytics sink.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OutboundEvent {
    conversation_id: String,
    event_type: String,
    properties: Value,
}

impl OutboundEvent {
    pub fn new(
        conversation_id: impl Into<String>,
        event_type: impl Into<String>,
        properties: Value,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            event_type: event_type.into(),
            properties,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }
}

/// What caused the call-to-action to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtaTrigger {
    VideoClosed,
    ToolCall,
}

/// Product analytics emitted for the host UI to record.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackingEvent {
    VideoPlayed { video_id: String, title: String },
    CtaShown { trigger: CtaTrigger },
    CtaClicked,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbound_body_has_required_fields() {
        let event = OutboundEvent::new("c-1", "conversation.toolcall", json!({"name": "fetch_video"}));
        let body = serde_json::to_value(&event).unwrap();
        assert_eq!(body["conversation_id"], "c-1");
        assert_eq!(body["event_type"], "conversation.toolcall");
        assert_eq!(body["properties"]["name"], "fetch_video");
    }

    #[test]
    fn tracking_events_are_tagged() {
        let body = serde_json::to_value(TrackingEvent::CtaShown {
            trigger: CtaTrigger::VideoClosed,
        })
        .unwrap();
        assert_eq!(body, json!({"event": "cta_shown", "trigger": "video_closed"}));
    }
}
