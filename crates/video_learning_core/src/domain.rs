//! crates/video_learning_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// The portion of a video a question was generated from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSegment {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Parses the backend's difficulty label. Unknown labels fall back to `Medium`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// A multiple-choice question generated server-side. Immutable once generated.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: Option<String>,
    pub segment: SourceSegment,
    pub difficulty: Difficulty,
}

impl Question {
    pub fn is_correct(&self, selected_answer: usize) -> bool {
        selected_answer == self.correct_answer
    }
}

/// A question tied to the playback position at which it should appear.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashCard {
    pub id: String,
    pub question: Question,
    /// Seconds into the video.
    pub show_at_timestamp: f64,
}

/// The server-reported phase of background video processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingStatus {
    Pending,
    Downloading,
    Transcribing,
    GeneratingFlashcards,
    /// Any batch-prefixed or batch-suffixed phase, e.g. `generating_flashcards_batch`.
    Batch(String),
    Completed,
    Failed,
    Other(String),
}

impl ProcessingStatus {
    /// Known phases match case-insensitively. `Batch` and `Other` keep the trimmed
    /// backend string so it displays exactly as received.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "pending" | "queued" => ProcessingStatus::Pending,
            "downloading" => ProcessingStatus::Downloading,
            "transcribing" => ProcessingStatus::Transcribing,
            "generating_flashcards" => ProcessingStatus::GeneratingFlashcards,
            "completed" => ProcessingStatus::Completed,
            "failed" => ProcessingStatus::Failed,
            s if s.contains("batch") => ProcessingStatus::Batch(trimmed.to_string()),
            _ => ProcessingStatus::Other(trimmed.to_string()),
        }
    }

    /// Polling stops once one of these is reached.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, ProcessingStatus::Batch(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Downloading => "downloading",
            ProcessingStatus::Transcribing => "transcribing",
            ProcessingStatus::GeneratingFlashcards => "generating_flashcards",
            ProcessingStatus::Batch(s) | ProcessingStatus::Other(s) => s,
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One answer to the processing-status endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: ProcessingStatus,
    pub batch_current: u32,
    pub batch_total: u32,
    pub progress: Option<f64>,
    pub error: Option<String>,
}

impl StatusReport {
    pub fn new(status: ProcessingStatus) -> Self {
        Self {
            status,
            batch_current: 0,
            batch_total: 0,
            progress: None,
            error: None,
        }
    }

    /// Batch generation is running: either counters are present or the status names a batch.
    pub fn is_batch_active(&self) -> bool {
        self.batch_total > 0 || self.status.is_batch()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptSource {
    Flashcard,
    Quiz,
}

/// A single recorded response to a question.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub video_id: Uuid,
    pub question_id: String,
    pub selected_answer: usize,
    pub is_correct: bool,
    pub source: AttemptSource,
}

#[derive(Debug, Clone)]
pub struct Quiz {
    pub id: String,
    pub video_id: Uuid,
    pub questions: Vec<Question>,
}

/// A performance report computed by the backend once all attempts are recorded.
#[derive(Debug, Clone)]
pub struct Report {
    pub video_id: Uuid,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub accuracy: f64,
    pub summary: Option<String>,
    pub recommendations: Vec<String>,
}

/// Generated study notes for a single video.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: Uuid,
    pub video_id: Uuid,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

// Represents a user's project - a collection of videos
#[derive(Debug, Clone)]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Video {
    pub id: Uuid,
    pub project_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    /// Seconds; unknown until the backend has inspected the media.
    pub duration: Option<f64>,
    pub processing_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A realtime notification that a project row changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectChange {
    pub operation: String,
    pub project_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct SubscriptionPlan {
    pub id: String,
    pub name: String,
    pub price_pence: u64,
    pub monthly_credits: u32,
    pub features: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CreditPackage {
    pub id: String,
    pub credits: u32,
    pub price_pence: u64,
}

#[derive(Debug, Clone)]
pub struct CreditTransaction {
    pub id: String,
    /// Positive for purchases, negative for consumption.
    pub amount: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditBalance {
    pub credits: i64,
}

/// Where the user is sent to pay. Redirection itself is the UI's business.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub url: String,
}
