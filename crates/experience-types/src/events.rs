pub mod wire;

use crate::tools::ToolCall;
use crate::transcript::{Role, TranscriptEntry};
use serde_json::Value;

/// An opaque key/value payload as delivered by the transport.
pub type RawMessage = Value;

/// `event_type` values this layer understands.
pub mod event_types {
    pub const TOOL_CALL: [&str; 3] = [
        "conversation_toolcall",
        "conversation.toolcall",
        "conversation.tool_call",
    ];
    pub const LEGACY_TOOL_CALL: &str = "tool_call";
    pub const UTTERANCE: &str = "conversation.utterance";
    pub const REPLICA_STARTED_SPEAKING: &str = "conversation.replica.started_speaking";
    pub const REPLICA_STOPPED_SPEAKING: &str = "conversation.replica.stopped_speaking";
    pub const USER_STARTED_SPEAKING: &str = "conversation.user.started_speaking";
    pub const USER_STOPPED_SPEAKING: &str = "conversation.user.stopped_speaking";
    pub const OBJECTIVE_COMPLETED: [&str; 2] = [
        "conversation.objective.completed",
        "conversation.objective_completed",
    ];
    pub const SHUTDOWN: &str = "system.shutdown";
}

/// The canonical form of every inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    ToolCall(ToolCall),
    TranscriptBatch(Vec<TranscriptEntry>),
    Utterance(Utterance),
    Status(StatusEvent),
    Unrecognized,
}

impl NormalizedEvent {
    /// Short label used as the dispatch key and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            NormalizedEvent::ToolCall(_) => "tool_call",
            NormalizedEvent::TranscriptBatch(_) => "transcript_batch",
            NormalizedEvent::Utterance(_) => "utterance",
            NormalizedEvent::Status(_) => "status",
            NormalizedEvent::Unrecognized => "unrecognized",
        }
    }
}

/// A discrete unit of spoken text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    id: Option<String>,
    role: Role,
    text: String,
    /// Set for caption fragments that arrive while the replica is still talking.
    partial: bool,
}

impl Utterance {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            text: text.into(),
            partial: false,
        }
    }

    /// A caption fragment attributed to the replica.
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::Assistant,
            text: text.into(),
            partial: true,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }
}

/// Lifecycle markers emitted by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    ReplicaStartedSpeaking,
    ReplicaStoppedSpeaking,
    UserStartedSpeaking,
    UserStoppedSpeaking,
    ObjectiveCompleted {
        objective: Option<String>,
        properties: Value,
    },
    Shutdown,
}

impl StatusEvent {
    pub fn from_event_type(event_type: &str, properties: Option<&Value>) -> Option<Self> {
        let status = match event_type {
            event_types::REPLICA_STARTED_SPEAKING => StatusEvent::ReplicaStartedSpeaking,
            event_types::REPLICA_STOPPED_SPEAKING => StatusEvent::ReplicaStoppedSpeaking,
            event_types::USER_STARTED_SPEAKING => StatusEvent::UserStartedSpeaking,
            event_types::USER_STOPPED_SPEAKING => StatusEvent::UserStoppedSpeaking,
            event_types::SHUTDOWN => StatusEvent::Shutdown,
            t if event_types::OBJECTIVE_COMPLETED.contains(&t) => {
                let properties = properties.cloned().unwrap_or(Value::Null);
                let objective = ["objective_name", "objective", "name"]
                    .iter()
                    .find_map(|key| properties.get(*key).and_then(Value::as_str))
                    .map(str::to_string);
                StatusEvent::ObjectiveCompleted {
                    objective,
                    properties,
                }
            }
            _ => return None,
        };
        Some(status)
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            StatusEvent::ReplicaStartedSpeaking => event_types::REPLICA_STARTED_SPEAKING,
            StatusEvent::ReplicaStoppedSpeaking => event_types::REPLICA_STOPPED_SPEAKING,
            StatusEvent::UserStartedSpeaking => event_types::USER_STARTED_SPEAKING,
            StatusEvent::UserStoppedSpeaking => event_types::USER_STOPPED_SPEAKING,
            StatusEvent::ObjectiveCompleted { .. } => event_types::OBJECTIVE_COMPLETED[0],
            StatusEvent::Shutdown => event_types::SHUTDOWN,
        }
    }
}
