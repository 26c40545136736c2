//now people using the types library can use these types
pub mod events;
pub mod outbound;
pub mod tools;
pub mod transcript;
pub mod video;

//re-export types for easier access
pub use events::{NormalizedEvent, RawMessage, StatusEvent, Utterance};
pub use outbound::{CtaTrigger, OutboundEvent, TrackingEvent};
pub use tools::{FunctionTool, Tool, ToolCall, ToolName};
pub use transcript::{Role, TranscriptEntry};
pub use video::{Chapter, VideoAsset};
