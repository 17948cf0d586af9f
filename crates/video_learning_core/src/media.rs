//! crates/video_learning_core/src/media.rs
//!
//! The video playback adapter: recognises the kind of source a video URL points at,
//! tracks the player's state, and turns seek/pause requests into player commands.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.|m\.)?(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[?&#/].*)?$",
    )
    .expect("YouTube URL pattern is valid")
});

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VideoUrlError {
    #[error("Video URL is empty")]
    Empty,
    #[error("Not a valid YouTube URL: {0}")]
    NotYouTube(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    YouTube { video_id: String },
    Direct { url: String },
}

impl VideoSource {
    pub fn parse(url: &str) -> Self {
        let url = url.trim();
        match YOUTUBE_URL.captures(url).and_then(|c| c.get(1)) {
            Some(id) => VideoSource::YouTube {
                video_id: id.as_str().to_string(),
            },
            None => VideoSource::Direct { url: url.to_string() },
        }
    }

    pub fn is_youtube(&self) -> bool {
        matches!(self, VideoSource::YouTube { .. })
    }

    /// The iframe URL for YouTube sources. Seeking sets `start` and `autoplay=1`,
    /// which reloads the embed rather than seeking in place.
    pub fn embed_url(&self, start: Option<f64>) -> Option<String> {
        let VideoSource::YouTube { video_id } = self else {
            return None;
        };
        let mut url = format!("https://www.youtube.com/embed/{}?enablejsapi=1", video_id);
        if let Some(start) = start.filter(|s| s.is_finite()) {
            url.push_str(&format!("&start={}&autoplay=1", start.max(0.0).floor() as u64));
        }
        Some(url)
    }
}

/// Checks a URL the user wants to attach to a project.
pub fn validate_youtube_url(url: &str) -> Result<String, VideoUrlError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(VideoUrlError::Empty);
    }
    match VideoSource::parse(url) {
        VideoSource::YouTube { video_id } => Ok(video_id),
        VideoSource::Direct { .. } => Err(VideoUrlError::NotYouTube(url.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// Native events reported by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Load,
    Ready,
    Play,
    Pause,
    Ended,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Cannot apply {event:?} while {from}")]
pub struct InvalidTransition {
    pub from: PlaybackState,
    pub event: PlayerEvent,
}

impl PlaybackState {
    pub fn apply(self, event: PlayerEvent) -> Result<PlaybackState, InvalidTransition> {
        match (self, event) {
            (_, PlayerEvent::Load) => Ok(PlaybackState::Loading),
            (PlaybackState::Loading, PlayerEvent::Ready) => Ok(PlaybackState::Ready),
            (PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused, PlayerEvent::Play) => {
                Ok(PlaybackState::Playing)
            }
            (PlaybackState::Playing | PlaybackState::Paused, PlayerEvent::Pause) => Ok(PlaybackState::Paused),
            (PlaybackState::Playing | PlaybackState::Paused, PlayerEvent::Ended) => Ok(PlaybackState::Ready),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }
}

/// Instructions sent to the player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Pause,
    ReloadEmbed { url: String },
    SetCurrentTime { seconds: f64 },
}

#[derive(Debug, Clone)]
pub struct PlaybackController {
    source: VideoSource,
    state: PlaybackState,
    position: f64,
}

impl PlaybackController {
    pub fn new(source: VideoSource) -> Self {
        Self {
            source,
            state: PlaybackState::Idle,
            position: 0.0,
        }
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn handle(&mut self, event: PlayerEvent) -> Result<PlaybackState, InvalidTransition> {
        self.state = self.state.apply(event)?;
        Ok(self.state)
    }

    pub fn record_time(&mut self, seconds: f64) {
        if seconds.is_finite() {
            self.position = seconds.max(0.0);
        }
    }

    /// Pauses regardless of the current state. Used whenever a flashcard is shown.
    pub fn force_pause(&mut self) -> PlayerCommand {
        self.state = PlaybackState::Paused;
        PlayerCommand::Pause
    }

    pub fn seek(&mut self, seconds: f64) -> PlayerCommand {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.position = seconds;
        match &self.source {
            VideoSource::YouTube { .. } => {
                // The embed reloads and autoplays from `start`.
                self.state = PlaybackState::Loading;
                PlayerCommand::ReloadEmbed {
                    url: self.source.embed_url(Some(seconds)).unwrap_or_default(),
                }
            }
            VideoSource::Direct { .. } => PlayerCommand::SetCurrentTime { seconds },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognises_youtube_forms() {
        let forms = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?list=abc&v=dQw4w9WgXcQ&t=10s",
            "youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://m.youtube.com/shorts/dQw4w9WgXcQ",
        ];
        for form in forms {
            assert_eq!(
                VideoSource::parse(form),
                VideoSource::YouTube { video_id: "dQw4w9WgXcQ".to_string() },
                "{}",
                form
            );
        }
    }

    #[test]
    fn test_other_urls_are_direct_media() {
        let source = VideoSource::parse("https://cdn.example.com/lecture.mp4");
        assert_eq!(source, VideoSource::Direct { url: "https://cdn.example.com/lecture.mp4".to_string() });
        assert!(source.embed_url(None).is_none());
        assert!(!VideoSource::parse("https://vimeo.com/12345").is_youtube());
    }

    #[test]
    fn test_validate_youtube_url() {
        assert_eq!(validate_youtube_url("  "), Err(VideoUrlError::Empty));
        assert!(matches!(validate_youtube_url("https://example.com/watch?v=x"), Err(VideoUrlError::NotYouTube(_))));
        assert_eq!(validate_youtube_url("https://youtu.be/dQw4w9WgXcQ"), Ok("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_embed_url_with_start() {
        let source = VideoSource::parse("https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(
            source.embed_url(None).unwrap(),
            "https://www.youtube.com/embed/dQw4w9WgXcQ?enablejsapi=1"
        );
        assert_eq!(
            source.embed_url(Some(95.7)).unwrap(),
            "https://www.youtube.com/embed/dQw4w9WgXcQ?enablejsapi=1&start=95&autoplay=1"
        );
    }

    #[test]
    fn test_state_machine_happy_path() {
        let mut player = PlaybackController::new(VideoSource::parse("https://cdn.example.com/a.mp4"));
        assert_eq!(player.handle(PlayerEvent::Load), Ok(PlaybackState::Loading));
        assert_eq!(player.handle(PlayerEvent::Ready), Ok(PlaybackState::Ready));
        assert_eq!(player.handle(PlayerEvent::Play), Ok(PlaybackState::Playing));
        assert_eq!(player.handle(PlayerEvent::Pause), Ok(PlaybackState::Paused));
        assert_eq!(player.handle(PlayerEvent::Play), Ok(PlaybackState::Playing));
        assert_eq!(player.handle(PlayerEvent::Ended), Ok(PlaybackState::Ready));
    }

    #[test]
    fn test_invalid_transitions_leave_state_alone() {
        let mut player = PlaybackController::new(VideoSource::parse("https://cdn.example.com/a.mp4"));
        assert_eq!(
            player.handle(PlayerEvent::Play),
            Err(InvalidTransition { from: PlaybackState::Idle, event: PlayerEvent::Play })
        );
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_force_pause_from_any_state() {
        let mut player = PlaybackController::new(VideoSource::parse("https://youtu.be/dQw4w9WgXcQ"));
        assert_eq!(player.force_pause(), PlayerCommand::Pause);
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_seek_reloads_youtube_but_sets_time_on_direct_media() {
        let mut youtube = PlaybackController::new(VideoSource::parse("https://youtu.be/dQw4w9WgXcQ"));
        assert_eq!(
            youtube.seek(120.0),
            PlayerCommand::ReloadEmbed {
                url: "https://www.youtube.com/embed/dQw4w9WgXcQ?enablejsapi=1&start=120&autoplay=1".to_string()
            }
        );
        assert_eq!(youtube.state(), PlaybackState::Loading);

        let mut direct = PlaybackController::new(VideoSource::parse("https://cdn.example.com/a.mp4"));
        assert_eq!(direct.seek(-5.0), PlayerCommand::SetCurrentTime { seconds: 0.0 });
        assert_eq!(direct.position(), 0.0);
    }
}
