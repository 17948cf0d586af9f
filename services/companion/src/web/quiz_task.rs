//! services/companion/src/web/quiz_task.rs
//!
//! Quiz submission. The backend computes a report from the recorded attempts, so every
//! attempt must be stored before the report is requested.

use crate::web::state::AppState;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use video_learning_core::{
    domain::Report,
    ports::PortError,
    quiz::{grade_quiz, QuizAnswer, QuizError},
};

#[derive(Debug, thiserror::Error)]
pub enum QuizSubmitError {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Port(#[from] PortError),
}

/// Grades a submitted quiz, records each attempt in order, then asks for the report.
pub async fn submit_quiz(
    app_state: Arc<AppState>,
    user_id: Uuid,
    video_id: Uuid,
    answers: Vec<QuizAnswer>,
) -> Result<Report, QuizSubmitError> {
    let questions = app_state.questions.get_questions(video_id).await?;
    let grade = grade_quiz(video_id, &questions, &answers)?;
    info!(
        "Quiz for video {} graded locally: {}/{} correct",
        video_id, grade.correct, grade.total
    );

    for attempt in &grade.attempts {
        app_state.questions.record_attempt(attempt).await?;
    }

    let report = app_state.questions.generate_report(video_id).await?;

    let description = format!("Scored {:.0}% on a quiz", grade.score_percent());
    if let Err(e) = app_state.db.log_activity(user_id, "quiz_completed", &description).await {
        warn!("Failed to log quiz activity: {:?}", e);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::test_support::{question, FakeProcessing, FakeQuestions, Fakes};

    fn fakes() -> Fakes {
        let questions = FakeQuestions::default();
        *questions.questions.lock().unwrap() = vec![question("q1", 0), question("q2", 2), question("q3", 3)];
        Fakes::new(FakeProcessing::default(), questions)
    }

    fn answer(question_id: &str, selected_answer: usize) -> QuizAnswer {
        QuizAnswer {
            question_id: question_id.to_string(),
            selected_answer,
        }
    }

    #[tokio::test]
    async fn test_report_is_generated_after_every_attempt() {
        let fakes = fakes();
        let user_id = Uuid::new_v4();
        let report = submit_quiz(
            fakes.app_state(),
            user_id,
            Uuid::new_v4(),
            vec![answer("q1", 0), answer("q2", 1), answer("q3", 3)],
        )
        .await
        .unwrap();

        assert_eq!(
            fakes.questions.calls(),
            vec![
                "get_questions",
                "record_attempt:q1",
                "record_attempt:q2",
                "record_attempt:q3",
                "generate_report",
            ]
        );
        assert_eq!(report.total_questions, 3);
        assert_eq!(report.correct_answers, 2);
        assert_eq!(fakes.db.activity_kinds(), vec!["quiz_completed"]);
    }

    #[tokio::test]
    async fn test_failed_attempt_aborts_before_report() {
        let fakes = fakes();
        *fakes.questions.fail_attempts.lock().unwrap() = true;

        let err = submit_quiz(fakes.app_state(), Uuid::new_v4(), Uuid::new_v4(), vec![answer("q1", 0)])
            .await
            .unwrap_err();

        assert!(matches!(err, QuizSubmitError::Port(_)));
        assert_eq!(fakes.questions.count("generate_report"), 0);
    }

    #[tokio::test]
    async fn test_invalid_answers_record_nothing() {
        let fakes = fakes();
        let err = submit_quiz(fakes.app_state(), Uuid::new_v4(), Uuid::new_v4(), vec![answer("nope", 0)])
            .await
            .unwrap_err();

        assert!(matches!(err, QuizSubmitError::Quiz(QuizError::UnknownQuestion(_))));
        assert_eq!(fakes.questions.calls(), vec!["get_questions"]);
    }
}
