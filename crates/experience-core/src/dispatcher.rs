//! Tool calls to host commands.
//!
//! The dispatcher is synchronous. Anything that needs I/O comes back as an
//! [`Action`] for the session loop to carry out: `Resolve` starts a video
//! lookup whose outcome is fed back through [`ToolDispatcher::apply_resolution`],
//! `CancelResolve` discards a lookup still in flight, `Forward` goes to the
//! webhook.

use crate::Command;
use crate::resolver::{ResolveError, ResolvedVideo, parse_timestamp};
use crate::session_state::{PlaybackMode, SessionState};
use experience_types::events::event_types;
use experience_types::{CtaTrigger, OutboundEvent, RawMessage, ToolCall, ToolName, TrackingEvent};
use serde_json::{Value, json};
use tokio::time::Instant;

const SEEK_KEYS: [&str; 4] = ["time", "timestamp", "seconds", "position"];

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Emit(Command),
    /// Look the title up. `event` is the transport message the call came in.
    Resolve {
        title: String,
        call: ToolCall,
        event: RawMessage,
    },
    /// Leaving the video means whatever it was fetching no longer applies.
    CancelResolve,
    Forward(OutboundEvent),
}

/// Seconds requested by a seek_video call.
pub fn parse_seek(call: &ToolCall) -> Option<f64> {
    SEEK_KEYS
        .iter()
        .find_map(|key| call.arg_str(key))
        .and_then(|raw| parse_timestamp(&raw))
}

pub struct ToolDispatcher {
    conversation_id: String,
}

impl ToolDispatcher {
    pub fn new(conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
        }
    }

    pub fn dispatch(
        &self,
        state: &mut SessionState,
        call: &ToolCall,
        event: &RawMessage,
    ) -> Vec<Action> {
        tracing::debug!(tool = %call.name(), mode = ?state.playback, "dispatching tool call");

        match call.name() {
            ToolName::FetchVideo => match call.title() {
                Some(title) => vec![Action::Resolve {
                    title,
                    call: call.clone(),
                    event: event.clone(),
                }],
                None => {
                    tracing::debug!("fetch_video without a title");
                    Vec::new()
                }
            },
            ToolName::PauseVideo => Self::while_playing(state, call, Command::PauseVideo),
            ToolName::PlayVideo => Self::while_playing(state, call, Command::ResumeVideo),
            ToolName::SeekVideo => match parse_seek(call) {
                Some(seconds) => Self::while_playing(state, call, Command::SeekVideo { seconds }),
                None => {
                    tracing::debug!(args = ?call.args(), "unusable seek target");
                    Vec::new()
                }
            },
            ToolName::CloseVideo => {
                let mut actions = vec![Action::CancelResolve];
                actions.extend(Self::close(state));
                actions.extend(Self::show_cta(state, CtaTrigger::VideoClosed));
                actions
            }
            ToolName::ShowTrialCta => {
                let mut actions = vec![Action::CancelResolve];
                if state.is_playing() {
                    actions.extend(Self::close(state));
                }
                actions.extend(Self::show_cta(state, CtaTrigger::ToolCall));
                actions
            }
        }
    }

    /// Applies the outcome of a fetch_video lookup. Failures change nothing.
    ///
    /// The webhook receives the original transport message under `event`,
    /// alongside the parsed call and what it resolved to.
    pub fn apply_resolution(
        &self,
        state: &mut SessionState,
        call: &ToolCall,
        event: &RawMessage,
        result: Result<ResolvedVideo, ResolveError>,
    ) -> Vec<Action> {
        let video = match result {
            Ok(video) => video,
            Err(e) => {
                tracing::debug!("fetch_video not resolved: {e}");
                return Vec::new();
            }
        };

        let mut actions = Vec::new();
        if state.cta.hide() {
            actions.push(Action::Emit(Command::HideCta));
        }

        state.playback = PlaybackMode::VideoPlaying;
        state.current_video = Some(video.clone());

        let asset = video.asset();
        let tracking = TrackingEvent::VideoPlayed {
            video_id: asset.id().to_string(),
            title: asset.title().to_string(),
        };
        let forward = OutboundEvent::new(
            &self.conversation_id,
            event_types::TOOL_CALL[1],
            json!({
                "name": call.name(),
                "arguments": call.args(),
                "video_id": asset.id(),
                "video_title": asset.title(),
                "match_tier": video.tier(),
                "event": event,
            }),
        );

        actions.push(Action::Emit(Command::PlayVideo(video)));
        actions.push(Action::Emit(Command::Track(tracking)));
        actions.push(Action::Forward(forward));
        actions
    }

    /// Objective completions go to the webhook whatever the playback state.
    pub fn objective_completed(&self, objective: Option<&str>, properties: &Value) -> Action {
        tracing::info!(objective = objective.unwrap_or("unnamed"), "objective completed");
        Action::Forward(OutboundEvent::new(
            &self.conversation_id,
            event_types::OBJECTIVE_COMPLETED[0],
            properties.clone(),
        ))
    }

    pub fn cta_clicked(&self, state: &mut SessionState, now: Instant) -> Vec<Action> {
        if !state.cta.is_visible() || !state.cta.click(now) {
            return Vec::new();
        }
        vec![Action::Emit(Command::Track(TrackingEvent::CtaClicked))]
    }

    fn while_playing(state: &SessionState, call: &ToolCall, command: Command) -> Vec<Action> {
        if !state.is_playing() {
            tracing::debug!(tool = %call.name(), "no video playing, ignoring");
            return Vec::new();
        }
        vec![Action::Emit(command)]
    }

    fn close(state: &mut SessionState) -> Vec<Action> {
        let was_playing = state.is_playing();
        state.playback = PlaybackMode::Conversation;
        state.current_video = None;
        if was_playing {
            vec![Action::Emit(Command::CloseVideo)]
        } else {
            Vec::new()
        }
    }

    fn show_cta(state: &mut SessionState, trigger: CtaTrigger) -> Vec<Action> {
        state.cta.show();
        vec![
            Action::Emit(Command::ShowCta),
            Action::Emit(Command::Track(TrackingEvent::CtaShown { trigger })),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::resolver::{InMemoryCatalog, VideoResolver};
    use experience_types::VideoAsset;
    use serde_json::Map;
    use std::sync::Arc;

    fn state() -> SessionState {
        let config = SessionConfig::builder()
            .with_conversation_id("c-1")
            .with_demo_id("d-1")
            .build()
            .unwrap();
        SessionState::new(&config)
    }

    fn call(name: ToolName, args: Value) -> ToolCall {
        ToolCall::new(name, args.as_object().cloned().unwrap_or_else(Map::new))
    }

    fn raw_fetch() -> RawMessage {
        json!({
            "event_type": "conversation.toolcall",
            "properties": {"name": "fetch_video", "arguments": {"title": "Pricing Overview"}},
        })
    }

    fn dispatch(dispatcher: &ToolDispatcher, state: &mut SessionState, call: &ToolCall) -> Vec<Action> {
        dispatcher.dispatch(state, call, &raw_fetch())
    }

    async fn resolved(title: &str) -> ResolvedVideo {
        let catalog = InMemoryCatalog::new().with_asset(
            "d-1",
            VideoAsset::new("v1", title, "https://cdn.example.com/v1.mp4"),
        );
        VideoResolver::new(Arc::new(catalog), 3600)
            .resolve(title, "d-1")
            .await
            .unwrap()
    }

    async fn playing_state() -> (SessionState, ToolDispatcher) {
        let dispatcher = ToolDispatcher::new("c-1");
        let mut state = state();
        let fetch = call(ToolName::FetchVideo, json!({"title": "Pricing Overview"}));
        let video = resolved("Pricing Overview").await;
        dispatcher.apply_resolution(&mut state, &fetch, &raw_fetch(), Ok(video));
        (state, dispatcher)
    }

    #[test]
    fn seek_targets() {
        assert_eq!(parse_seek(&call(ToolName::SeekVideo, json!({"time": "1:30"}))), Some(90.0));
        assert_eq!(parse_seek(&call(ToolName::SeekVideo, json!({"seconds": 42}))), Some(42.0));
        assert_eq!(parse_seek(&call(ToolName::SeekVideo, json!({"time": "-3"}))), None);
        assert_eq!(parse_seek(&call(ToolName::SeekVideo, json!({"time": "later"}))), None);
        assert_eq!(parse_seek(&call(ToolName::SeekVideo, json!({}))), None);
    }

    #[test]
    fn fetch_requests_resolution() {
        let dispatcher = ToolDispatcher::new("c-1");
        let mut state = state();
        let fetch = call(ToolName::FetchVideo, json!({"title": " Pricing Overview "}));

        let actions = dispatch(&dispatcher, &mut state, &fetch);
        assert_eq!(
            actions,
            vec![Action::Resolve {
                title: "Pricing Overview".into(),
                call: fetch.clone(),
                event: raw_fetch(),
            }]
        );
        assert_eq!(state.playback, PlaybackMode::Conversation);
        assert!(dispatch(&dispatcher, &mut state, &call(ToolName::FetchVideo, json!({})))
            .is_empty());
    }

    #[tokio::test]
    async fn resolution_starts_playback_and_hides_the_cta() {
        let dispatcher = ToolDispatcher::new("c-1");
        let mut state = state();
        state.cta.show();
        let fetch = call(ToolName::FetchVideo, json!({"title": "Pricing Overview"}));
        let video = resolved("Pricing Overview").await;

        let actions = dispatcher.apply_resolution(&mut state, &fetch, &raw_fetch(), Ok(video.clone()));
        assert_eq!(actions.len(), 4);
        assert_eq!(actions[0], Action::Emit(Command::HideCta));
        assert_eq!(actions[1], Action::Emit(Command::PlayVideo(video)));
        assert!(matches!(
            &actions[2],
            Action::Emit(Command::Track(TrackingEvent::VideoPlayed { video_id, .. })) if video_id == "v1"
        ));
        let Action::Forward(event) = &actions[3] else {
            panic!("expected a webhook forward");
        };
        assert_eq!(event.conversation_id(), "c-1");
        assert_eq!(event.event_type(), "conversation.toolcall");
        assert_eq!(event.properties()["name"], "fetch_video");
        assert_eq!(event.properties()["arguments"]["title"], "Pricing Overview");
        assert_eq!(event.properties()["event"], raw_fetch());

        assert!(state.is_playing());
        assert!(!state.cta.is_visible());
    }

    #[test]
    fn failed_resolution_changes_nothing() {
        let dispatcher = ToolDispatcher::new("c-1");
        let mut state = state();
        let fetch = call(ToolName::FetchVideo, json!({"title": "Unknown"}));
        let actions = dispatcher.apply_resolution(
            &mut state,
            &fetch,
            &raw_fetch(),
            Err(ResolveError::NotFound {
                title: "Unknown".into(),
            }),
        );
        assert!(actions.is_empty());
        assert_eq!(state.playback, PlaybackMode::Conversation);
        assert!(state.current_video.is_none());
    }

    #[tokio::test]
    async fn player_controls_require_a_video() {
        let dispatcher = ToolDispatcher::new("c-1");
        let mut idle = state();
        assert!(dispatch(&dispatcher, &mut idle, &call(ToolName::PauseVideo, json!({}))).is_empty());
        assert!(dispatch(&dispatcher, &mut idle, &call(ToolName::SeekVideo, json!({"time": "0:10"})))
            .is_empty());

        let (mut playing, dispatcher) = playing_state().await;
        assert_eq!(
            dispatch(&dispatcher, &mut playing, &call(ToolName::PauseVideo, json!({}))),
            vec![Action::Emit(Command::PauseVideo)]
        );
        assert_eq!(
            dispatch(&dispatcher, &mut playing, &call(ToolName::PlayVideo, json!({}))),
            vec![Action::Emit(Command::ResumeVideo)]
        );
        assert_eq!(
            dispatch(&dispatcher, &mut playing, &call(ToolName::SeekVideo, json!({"time": "1:05"}))),
            vec![Action::Emit(Command::SeekVideo { seconds: 65.0 })]
        );
        assert!(dispatch(&dispatcher, &mut playing, &call(ToolName::SeekVideo, json!({"time": "-1"})))
            .is_empty());
    }

    #[tokio::test]
    async fn close_returns_to_conversation_with_the_cta() {
        let (mut state, dispatcher) = playing_state().await;
        let actions = dispatch(&dispatcher, &mut state, &call(ToolName::CloseVideo, json!({})));
        assert_eq!(
            actions,
            vec![
                Action::CancelResolve,
                Action::Emit(Command::CloseVideo),
                Action::Emit(Command::ShowCta),
                Action::Emit(Command::Track(TrackingEvent::CtaShown {
                    trigger: CtaTrigger::VideoClosed
                })),
            ]
        );
        assert_eq!(state.playback, PlaybackMode::Conversation);
        assert!(state.current_video.is_none());
        assert!(state.cta.is_visible());
    }

    #[tokio::test]
    async fn trial_cta_closes_a_playing_video_first() {
        let (mut state, dispatcher) = playing_state().await;
        let actions = dispatch(&dispatcher, &mut state, &call(ToolName::ShowTrialCta, json!({})));
        assert_eq!(actions[0], Action::CancelResolve);
        assert_eq!(actions[1], Action::Emit(Command::CloseVideo));
        assert_eq!(
            actions[3],
            Action::Emit(Command::Track(TrackingEvent::CtaShown {
                trigger: CtaTrigger::ToolCall
            }))
        );
        assert!(state.current_video.is_none());

        let mut idle = self::state();
        let actions = dispatch(&dispatcher, &mut idle, &call(ToolName::ShowTrialCta, json!({})));
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], Action::CancelResolve);
        assert!(idle.cta.is_visible());
    }

    #[test]
    fn cta_clicks_are_tracked_once_and_only_when_visible() {
        let dispatcher = ToolDispatcher::new("c-1");
        let mut state = state();
        let now = Instant::now();
        assert!(dispatcher.cta_clicked(&mut state, now).is_empty());
        assert_eq!(state.cta.clicked_at(), None);

        state.cta.show();
        assert_eq!(
            dispatcher.cta_clicked(&mut state, now),
            vec![Action::Emit(Command::Track(TrackingEvent::CtaClicked))]
        );
        assert!(dispatcher.cta_clicked(&mut state, now).is_empty());
        assert_eq!(state.cta.clicked_at(), Some(now));
    }

    #[test]
    fn objectives_are_forwarded_verbatim() {
        let dispatcher = ToolDispatcher::new("c-1");
        let props = json!({"objective_name": "qualified", "output_variables": {"team_size": 12}});
        let Action::Forward(event) = dispatcher.objective_completed(Some("qualified"), &props) else {
            panic!("expected a webhook forward");
        };
        assert_eq!(event.event_type(), "conversation.objective.completed");
        assert_eq!(event.properties(), &props);
    }
}
