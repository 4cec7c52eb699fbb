//! Player engine bridge traits.
//!
//! A [`PlayerEngine`] wraps the platform media stack (AVPlayer, ExoPlayer, ...).
//! Each playback controller owns exactly one engine handle, created through
//! the host's [`EngineFactory`]. Control calls are async; transitions the
//! engine discovers on its own (ready to play, end of stream, failure) are
//! reported as [`EngineEvent`]s which the host re-delivers to the owning
//! controller.

use crate::{error::Result, media::PlayableSource, platform::PlatformSendSync};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Playback lifecycle state of a controller.
///
/// `Ended` and `Failed` are terminal: a controller that reached either needs
/// to be replaced to play again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Preparing,
    Ready,
    Playing,
    Paused,
    Ended,
    Failed,
}

impl PlaybackState {
    /// Returns `true` for states no transition can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::Ended | PlaybackState::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: PlaybackState) -> bool {
        use PlaybackState::*;

        match (*self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Preparing)
            | (Preparing, Ready)
            | (Ready, Playing)
            | (Playing, Paused)
            | (Paused, Playing)
            | (Playing, Ended) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Preparing => "preparing",
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Ended => "ended",
            PlaybackState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Transitions reported by the engine itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The prepared source can start playing.
    ReadyToPlay,
    /// The source has been played to its end.
    PlaybackEnded,
    /// Engine-level playback error.
    Failed { message: String },
}

/// Platform playback engine driven by a single controller.
#[async_trait]
pub trait PlayerEngine: PlatformSendSync {
    /// Start loading a source. Readiness is reported later as
    /// [`EngineEvent::ReadyToPlay`].
    async fn prepare(&self, source: PlayableSource) -> Result<()>;

    /// Begin or resume playback.
    async fn play(&self) -> Result<()>;

    /// Pause playback without releasing the source.
    async fn pause(&self) -> Result<()>;

    /// Stop playback.
    async fn stop(&self) -> Result<()>;

    /// Current playback position.
    async fn position(&self) -> Result<Duration>;

    /// Duration of the loaded source, when known.
    async fn duration(&self) -> Result<Option<Duration>>;

    /// Mirror the player as-is on an external screen instead of switching to
    /// full-screen external playback.
    async fn set_external_screen_mirroring(&self, mirrored: bool) -> Result<()>;

    /// Release every native resource held by the engine. The handle is not
    /// used afterwards.
    async fn release(&self) -> Result<()>;
}

/// Creates engine handles for new controllers.
pub trait EngineFactory: PlatformSendSync {
    fn create_engine(&self) -> Result<Arc<dyn PlayerEngine>>;
}
