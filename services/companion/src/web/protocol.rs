//! services/companion/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the video player UI and the companion
//! for a single learning session.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;
use video_learning_core::{
    domain::{FlashCard, SourceSegment},
    media::{PlayerCommand, PlayerEvent, VideoSource},
    scheduler::AnswerOutcome,
};

/// Everything a session wants to say to its client goes through this channel; a single
/// writer task owns the socket sink.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

//=========================================================================================
// Messages Sent FROM the Client (Player UI) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Attaches to a session created via `POST /sessions`. This must be the first message.
    Init { session_id: Uuid },

    /// Sent on every timer/native time update of the player.
    TimeUpdate {
        current_time: f64,
        #[serde(default)]
        duration: Option<f64>,
    },

    /// A native state change of the player (load, ready, play, pause, ended).
    Player { event: PlayerEventKind },

    AnswerFlashcard { question_id: String, selected_answer: usize },

    /// Skips the missed flashcard on screen.
    SkipMissed,

    /// Skips every remaining missed flashcard and closes the modal.
    SkipRemainingMissed,

    /// Closes the flashcard on screen without answering.
    CloseFlashcard,

    /// Jumps the player to the segment a question was generated from.
    ReviewSegment { question_id: String },

    SetFlashcardsEnabled { enabled: bool },
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerEventKind {
    Load,
    Ready,
    Play,
    Pause,
    Ended,
}

impl From<PlayerEventKind> for PlayerEvent {
    fn from(kind: PlayerEventKind) -> Self {
        match kind {
            PlayerEventKind::Load => PlayerEvent::Load,
            PlayerEventKind::Ready => PlayerEvent::Ready,
            PlayerEventKind::Play => PlayerEvent::Play,
            PlayerEventKind::Pause => PlayerEvent::Pause,
            PlayerEventKind::Ended => PlayerEvent::Ended,
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Player UI)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms successful session initialization.
    SessionInitialized {
        session_id: Uuid,
        video_id: Uuid,
        source: SourcePayload,
        flashcard_count: usize,
        status: String,
    },

    /// Reports an error to the client, which should display it inline.
    Error { message: String },

    /// Latest processing status, with batch progress when generation runs in batches.
    ProcessingStatus {
        status: String,
        batch_current: u32,
        batch_total: u32,
        progress: Option<f64>,
    },

    /// The flashcard list was re-fetched.
    FlashcardsUpdated { total: usize, missed: usize },

    /// A flashcard reached its timestamp. Always preceded by a pause command.
    ShowFlashcard { flashcard: FlashcardPayload },

    /// One entry of the missed-flashcard queue, shown once playback reaches the end.
    ShowMissedFlashcard {
        flashcard: FlashcardPayload,
        index: usize,
        total: usize,
    },

    /// Something the player must do: pause, reload the embed, or jump.
    Player { command: PlayerCommandPayload },

    AnswerResult {
        question_id: String,
        correct: bool,
        correct_answer: usize,
        explanation: Option<String>,
        segment: SegmentPayload,
    },

    /// The flashcard modal is closed; the user resumes playback themselves.
    ModalClosed,

    /// Processing is complete and every flashcard is handled; the quiz can start.
    QuizAvailable { video_id: Uuid },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }
}

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourcePayload {
    Youtube { video_id: String, embed_url: String },
    Direct { url: String },
}

impl From<&VideoSource> for SourcePayload {
    fn from(source: &VideoSource) -> Self {
        match source {
            VideoSource::YouTube { video_id } => SourcePayload::Youtube {
                video_id: video_id.clone(),
                embed_url: source.embed_url(None).unwrap_or_default(),
            },
            VideoSource::Direct { url } => SourcePayload::Direct { url: url.clone() },
        }
    }
}

/// A flashcard as the modal renders it. The correct answer is only revealed in `AnswerResult`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FlashcardPayload {
    pub id: String,
    pub question_id: String,
    pub question: String,
    pub options: Vec<String>,
    pub show_at_timestamp: f64,
    pub difficulty: &'static str,
}

impl From<&FlashCard> for FlashcardPayload {
    fn from(card: &FlashCard) -> Self {
        Self {
            id: card.id.clone(),
            question_id: card.question.id.clone(),
            question: card.question.text.clone(),
            options: card.question.options.clone(),
            show_at_timestamp: card.show_at_timestamp,
            difficulty: card.question.difficulty.as_str(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SegmentPayload {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

impl From<SourceSegment> for SegmentPayload {
    fn from(segment: SourceSegment) -> Self {
        Self {
            start_time: segment.start_time,
            end_time: segment.end_time,
            text: segment.text,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerCommandPayload {
    Pause,
    ReloadEmbed { url: String },
    SetCurrentTime { seconds: f64 },
}

impl From<PlayerCommand> for PlayerCommandPayload {
    fn from(command: PlayerCommand) -> Self {
        match command {
            PlayerCommand::Pause => PlayerCommandPayload::Pause,
            PlayerCommand::ReloadEmbed { url } => PlayerCommandPayload::ReloadEmbed { url },
            PlayerCommand::SetCurrentTime { seconds } => PlayerCommandPayload::SetCurrentTime { seconds },
        }
    }
}

impl From<AnswerOutcome> for ServerMessage {
    fn from(outcome: AnswerOutcome) -> Self {
        ServerMessage::AnswerResult {
            question_id: outcome.question_id,
            correct: outcome.correct,
            correct_answer: outcome.correct_answer,
            explanation: outcome.explanation,
            segment: outcome.segment.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_parse() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "time_update", "current_time": 12.5, "duration": 600}"#).unwrap();
        assert_eq!(msg, ClientMessage::TimeUpdate { current_time: 12.5, duration: Some(600.0) });

        let msg: ClientMessage = serde_json::from_str(r#"{"type": "time_update", "current_time": 1}"#).unwrap();
        assert_eq!(msg, ClientMessage::TimeUpdate { current_time: 1.0, duration: None });

        let msg: ClientMessage = serde_json::from_str(r#"{"type": "player", "event": "play"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Player { event: PlayerEventKind::Play });

        let msg: ClientMessage = serde_json::from_str(r#"{"type": "skip_remaining_missed"}"#).unwrap();
        assert_eq!(msg, ClientMessage::SkipRemainingMissed);
    }

    #[test]
    fn test_server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMessage::Player {
            command: PlayerCommandPayload::ReloadEmbed { url: "https://x".to_string() },
        })
        .unwrap();
        assert_eq!(json["type"], "player");
        assert_eq!(json["command"]["action"], "reload_embed");
        assert_eq!(json["command"]["url"], "https://x");

        let json = serde_json::to_value(ServerMessage::ModalClosed).unwrap();
        assert_eq!(json, serde_json::json!({"type": "modal_closed"}));
    }

    #[test]
    fn test_source_payload_for_youtube() {
        let source = VideoSource::parse("https://youtu.be/dQw4w9WgXcQ");
        let json = serde_json::to_value(SourcePayload::from(&source)).unwrap();
        assert_eq!(json["kind"], "youtube");
        assert_eq!(json["embed_url"], "https://www.youtube.com/embed/dQw4w9WgXcQ?enablejsapi=1");
    }
}
