use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Argument keys that may carry the requested video title, in priority order.
const TITLE_KEYS: [&str; 3] = ["title", "video_title", "query"];

/// The fixed whitelist of tools the host UI knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    FetchVideo,
    PauseVideo,
    PlayVideo,
    SeekVideo,
    CloseVideo,
    ShowTrialCta,
}

impl ToolName {
    pub const ALL: [ToolName; 6] = [
        ToolName::FetchVideo,
        ToolName::PauseVideo,
        ToolName::PlayVideo,
        ToolName::SeekVideo,
        ToolName::CloseVideo,
        ToolName::ShowTrialCta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::FetchVideo => "fetch_video",
            ToolName::PauseVideo => "pause_video",
            ToolName::PlayVideo => "play_video",
            ToolName::SeekVideo => "seek_video",
            ToolName::CloseVideo => "close_video",
            ToolName::ShowTrialCta => "show_trial_cta",
        }
    }

    /// The function definition a persona needs to be able to emit this tool.
    pub fn definition(&self) -> Tool {
        let (description, parameters) = match self {
            ToolName::FetchVideo => (
                "Play the demo video whose title best matches the request.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "title": {
                            "type": "string",
                            "description": "Title of the video to play"
                        }
                    },
                    "required": ["title"]
                }),
            ),
            ToolName::SeekVideo => (
                "Jump to a position in the video that is currently playing.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "time": {
                            "type": "string",
                            "description": "Target position as mm:ss or seconds"
                        }
                    },
                    "required": ["time"]
                }),
            ),
            ToolName::PauseVideo => (
                "Pause the video that is currently playing.",
                empty_parameters(),
            ),
            ToolName::PlayVideo => (
                "Resume the video that is currently paused.",
                empty_parameters(),
            ),
            ToolName::CloseVideo => (
                "Close the current video and return to the conversation.",
                empty_parameters(),
            ),
            ToolName::ShowTrialCta => (
                "Show the free trial call-to-action to the visitor.",
                empty_parameters(),
            ),
        };
        Tool::Function(FunctionTool::new(
            self.as_str().to_string(),
            description.to_string(),
            parameters,
        ))
    }
}

fn empty_parameters() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTool(pub String);

impl fmt::Display for UnknownTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tool: {}", self.0)
    }
}

impl std::error::Error for UnknownTool {}

impl FromStr for ToolName {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| UnknownTool(name.to_string()))
    }
}

/// A whitelisted command extracted from the conversation stream.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    name: ToolName,
    #[serde(default)]
    args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: ToolName, args: Map<String, Value>) -> Self {
        Self { name, args }
    }

    pub fn name(&self) -> ToolName {
        self.name
    }

    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }

    /// Returns a string argument, trimmed. Numbers are rendered as text.
    pub fn arg_str(&self, key: &str) -> Option<String> {
        match self.args.get(key)? {
            Value::String(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The requested video title, if any title-like argument is present.
    pub fn title(&self) -> Option<String> {
        TITLE_KEYS.iter().find_map(|key| self.arg_str(key))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Tool {
    #[serde(rename = "function")]
    Function(FunctionTool),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionTool {
    /// The name of the function
    name: String,

    /// The description of the function
    description: String,

    /// The parameters of the function in JSON Schema format
    parameters: Value,
}

impl FunctionTool {
    pub fn new(name: String, description: String, parameters: Value) -> Self {
        Self {
            name,
            description,
            parameters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn parses_whitelisted_names_only() {
        assert_eq!("fetch_video".parse::<ToolName>(), Ok(ToolName::FetchVideo));
        assert_eq!(" show_trial_cta ".parse::<ToolName>(), Ok(ToolName::ShowTrialCta));
        assert!("delete_everything".parse::<ToolName>().is_err());
        assert!("FETCH_VIDEO".parse::<ToolName>().is_err());
    }

    #[test]
    fn title_prefers_title_key_and_skips_blank_values() {
        let call = ToolCall::new(
            ToolName::FetchVideo,
            args(json!({"title": "  ", "video_title": "Pricing Overview"})),
        );
        assert_eq!(call.title().as_deref(), Some("Pricing Overview"));

        let call = ToolCall::new(ToolName::FetchVideo, args(json!({"other": 1})));
        assert_eq!(call.title(), None);
    }

    #[test]
    fn every_tool_has_a_function_definition() {
        for tool in ToolName::ALL {
            let Tool::Function(function) = tool.definition();
            assert_eq!(function.name(), tool.as_str());
            assert_eq!(function.parameters()["type"], "object");
        }
        let encoded = serde_json::to_value(ToolName::FetchVideo.definition()).unwrap();
        assert_eq!(encoded["type"], "function");
        assert_eq!(encoded["parameters"]["required"][0], "title");
    }
}
