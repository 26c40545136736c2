pub mod config;
pub mod dedup;
pub mod dispatcher;
pub mod forwarder;
pub mod normalize;
pub mod resolver;
pub mod session;
pub mod session_state;
pub mod source;
pub mod subtitles;

pub use experience_types as types;

use crate::resolver::ResolvedVideo;
use crate::subtitles::SubtitleFrame;
use experience_types::TrackingEvent;

/// Represents commands that the orchestration layer issues to the host UI.
///
/// This enum is the only way session logic reaches the outside world apart from
/// the webhook forwarder; the host owns the player, the CTA and the caption box
/// and applies these in the order received.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Switch the stage to the resolved video and start playback.
    PlayVideo(ResolvedVideo),
    PauseVideo,
    ResumeVideo,
    SeekVideo { seconds: f64 },
    /// Tear down the player and return to the avatar.
    CloseVideo,
    ShowCta,
    HideCta,
    Subtitle(SubtitleFrame),
    /// An analytics event for the host's tracker.
    Track(TrackingEvent),
}
