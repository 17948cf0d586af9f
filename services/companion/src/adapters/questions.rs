//! services/companion/src/adapters/questions.rs
//!
//! The REST adapter for flashcards, quizzes, attempts and reports. It implements the
//! `QuestionService` port from the `core` crate.

use crate::adapters::http::BackendClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use video_learning_core::{
    domain::{Attempt, AttemptSource, Difficulty, FlashCard, Question, Quiz, Report, SourceSegment},
    ports::{PortResult, QuestionService},
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct RestQuestionAdapter {
    client: BackendClient,
}

impl RestQuestionAdapter {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

/// Question ids arrive as either strings or integers depending on the endpoint.
#[derive(Deserialize, Clone)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Text(s) => f.write_str(s),
            RawId::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Deserialize, Default)]
struct SegmentRecord {
    #[serde(default)]
    start_time: f64,
    #[serde(default)]
    end_time: f64,
    #[serde(default, alias = "transcript", alias = "text")]
    transcript_text: String,
}

#[derive(Deserialize)]
struct QuestionRecord {
    id: RawId,
    #[serde(alias = "question", alias = "text")]
    question_text: String,
    options: Vec<String>,
    correct_answer: usize,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default, alias = "source_segment")]
    segment: Option<SegmentRecord>,
    #[serde(default)]
    difficulty: Option<String>,
}

impl QuestionRecord {
    fn to_domain(self) -> Question {
        let segment = self.segment.unwrap_or_default();
        Question {
            id: self.id.to_string(),
            text: self.question_text,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
            segment: SourceSegment {
                start_time: segment.start_time,
                end_time: segment.end_time,
                text: segment.transcript_text,
            },
            difficulty: self
                .difficulty
                .as_deref()
                .map(Difficulty::parse)
                .unwrap_or(Difficulty::Medium),
        }
    }
}

#[derive(Deserialize)]
struct FlashcardRecord {
    id: RawId,
    show_at_timestamp: f64,
    question: QuestionRecord,
}

impl FlashcardRecord {
    fn to_domain(self) -> FlashCard {
        FlashCard {
            id: self.id.to_string(),
            question: self.question.to_domain(),
            show_at_timestamp: self.show_at_timestamp,
        }
    }
}

#[derive(Serialize)]
struct GenerateQuizRequest {
    video_id: Uuid,
    num_questions: u32,
}

#[derive(Deserialize)]
struct QuizRecord {
    #[serde(alias = "id")]
    quiz_id: RawId,
    questions: Vec<QuestionRecord>,
}

#[derive(Serialize)]
struct AttemptRequest<'a> {
    video_id: Uuid,
    question_id: &'a str,
    selected_answer: usize,
    is_correct: bool,
    attempt_type: &'static str,
}

impl<'a> From<&'a Attempt> for AttemptRequest<'a> {
    fn from(attempt: &'a Attempt) -> Self {
        Self {
            video_id: attempt.video_id,
            question_id: &attempt.question_id,
            selected_answer: attempt.selected_answer,
            is_correct: attempt.is_correct,
            attempt_type: match attempt.source {
                AttemptSource::Flashcard => "flashcard",
                AttemptSource::Quiz => "quiz",
            },
        }
    }
}

#[derive(Serialize)]
struct ReportRequest {
    video_id: Uuid,
}

#[derive(Deserialize)]
struct ReportRecord {
    #[serde(default)]
    total_questions: u32,
    #[serde(default)]
    correct_answers: u32,
    #[serde(default)]
    accuracy: Option<f64>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

impl ReportRecord {
    fn to_domain(self, video_id: Uuid) -> Report {
        let accuracy = self.accuracy.unwrap_or_else(|| {
            if self.total_questions == 0 {
                0.0
            } else {
                self.correct_answers as f64 * 100.0 / self.total_questions as f64
            }
        });
        Report {
            video_id,
            total_questions: self.total_questions,
            correct_answers: self.correct_answers,
            accuracy,
            summary: self.summary,
            recommendations: self.recommendations,
        }
    }
}

//=========================================================================================
// `QuestionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuestionService for RestQuestionAdapter {
    async fn get_flashcards(&self, video_id: Uuid) -> PortResult<Vec<FlashCard>> {
        let records: Vec<FlashcardRecord> = self
            .client
            .get_json(&format!("/api/videos/{}/flashcards", video_id))
            .await?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_questions(&self, video_id: Uuid) -> PortResult<Vec<Question>> {
        let records: Vec<QuestionRecord> = self
            .client
            .get_json(&format!("/api/videos/{}/questions", video_id))
            .await?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn generate_quiz(&self, video_id: Uuid, num_questions: u32) -> PortResult<Quiz> {
        let record: QuizRecord = self
            .client
            .post_json("/api/quiz/generate", &GenerateQuizRequest { video_id, num_questions })
            .await?;
        Ok(Quiz {
            id: record.quiz_id.to_string(),
            video_id,
            questions: record.questions.into_iter().map(|q| q.to_domain()).collect(),
        })
    }

    async fn record_attempt(&self, attempt: &Attempt) -> PortResult<()> {
        self.client
            .post_unit("/api/attempts", &AttemptRequest::from(attempt))
            .await
    }

    async fn generate_report(&self, video_id: Uuid) -> PortResult<Report> {
        let record: ReportRecord = self
            .client
            .post_json("/api/reports/generate", &ReportRequest { video_id })
            .await?;
        Ok(record.to_domain(video_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flashcard_record_accepts_numeric_ids_and_nested_segment() {
        let json = r#"[{
            "id": 7,
            "show_at_timestamp": 42.5,
            "question": {
                "id": 19,
                "question_text": "What is ownership?",
                "options": ["a", "b", "c", "d"],
                "correct_answer": 2,
                "explanation": "Because.",
                "segment": {"start_time": 30.0, "end_time": 42.0, "transcript_text": "..."},
                "difficulty": "hard"
            }
        }]"#;
        let records: Vec<FlashcardRecord> = serde_json::from_str(json).unwrap();
        let card = records.into_iter().next().unwrap().to_domain();
        assert_eq!(card.id, "7");
        assert_eq!(card.question.id, "19");
        assert_eq!(card.question.difficulty, Difficulty::Hard);
        assert_eq!(card.question.segment.start_time, 30.0);
        assert_eq!(card.show_at_timestamp, 42.5);
    }

    #[test]
    fn test_question_record_without_segment() {
        let json = r#"{"id": "q-1", "question": "Q?", "options": ["x", "y"], "correct_answer": 0}"#;
        let question = serde_json::from_str::<QuestionRecord>(json).unwrap().to_domain();
        assert_eq!(question.id, "q-1");
        assert_eq!(question.text, "Q?");
        assert_eq!(question.difficulty, Difficulty::Medium);
        assert_eq!(question.segment.end_time, 0.0);
    }

    #[test]
    fn test_attempt_request_shape() {
        let attempt = Attempt {
            video_id: Uuid::nil(),
            question_id: "q1".to_string(),
            selected_answer: 2,
            is_correct: false,
            source: AttemptSource::Flashcard,
        };
        let value = serde_json::to_value(AttemptRequest::from(&attempt)).unwrap();
        assert_eq!(value["attempt_type"], "flashcard");
        assert_eq!(value["question_id"], "q1");
        assert_eq!(value["selected_answer"], 2);
    }

    #[test]
    fn test_report_accuracy_is_derived_when_missing() {
        let record: ReportRecord = serde_json::from_str(r#"{"total_questions": 4, "correct_answers": 3}"#).unwrap();
        let report = record.to_domain(Uuid::nil());
        assert_eq!(report.accuracy, 75.0);
        assert!(report.recommendations.is_empty());
    }
}
