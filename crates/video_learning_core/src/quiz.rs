//! crates/video_learning_core/src/quiz.rs
//!
//! Grades a submitted quiz into attempts ready to be recorded.

use crate::domain::{Attempt, AttemptSource, Question};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("Quiz submission contains no answers")]
    Empty,
    #[error("Unknown question: {0}")]
    UnknownQuestion(String),
    #[error("Answer {selected} is out of range for question {question_id}")]
    AnswerOutOfRange { question_id: String, selected: usize },
    #[error("Question {0} was answered more than once")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAnswer {
    pub question_id: String,
    pub selected_answer: usize,
}

#[derive(Debug, Clone)]
pub struct QuizGrade {
    /// In submission order; this is the order they must be recorded in.
    pub attempts: Vec<Attempt>,
    pub correct: usize,
    pub total: usize,
}

impl QuizGrade {
    pub fn score_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 * 100.0 / self.total as f64
        }
    }
}

pub fn grade_quiz(video_id: Uuid, questions: &[Question], answers: &[QuizAnswer]) -> Result<QuizGrade, QuizError> {
    if answers.is_empty() {
        return Err(QuizError::Empty);
    }
    let by_id: HashMap<&str, &Question> = questions.iter().map(|q| (q.id.as_str(), q)).collect();

    let mut seen = std::collections::HashSet::new();
    let mut attempts = Vec::with_capacity(answers.len());
    for answer in answers {
        let question = by_id
            .get(answer.question_id.as_str())
            .ok_or_else(|| QuizError::UnknownQuestion(answer.question_id.clone()))?;
        if answer.selected_answer >= question.options.len() {
            return Err(QuizError::AnswerOutOfRange {
                question_id: answer.question_id.clone(),
                selected: answer.selected_answer,
            });
        }
        if !seen.insert(answer.question_id.as_str()) {
            return Err(QuizError::Duplicate(answer.question_id.clone()));
        }
        attempts.push(Attempt {
            video_id,
            question_id: answer.question_id.clone(),
            selected_answer: answer.selected_answer,
            is_correct: question.is_correct(answer.selected_answer),
            source: AttemptSource::Quiz,
        });
    }

    let correct = attempts.iter().filter(|a| a.is_correct).count();
    Ok(QuizGrade {
        total: attempts.len(),
        correct,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Difficulty, SourceSegment};

    fn question(id: &str, correct: usize) -> Question {
        Question {
            id: id.to_string(),
            text: "?".to_string(),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer: correct,
            explanation: None,
            segment: SourceSegment { start_time: 0.0, end_time: 5.0, text: String::new() },
            difficulty: Difficulty::Easy,
        }
    }

    fn answer(id: &str, selected: usize) -> QuizAnswer {
        QuizAnswer { question_id: id.to_string(), selected_answer: selected }
    }

    #[test]
    fn test_grades_in_submission_order() {
        let video_id = Uuid::new_v4();
        let questions = vec![question("q1", 0), question("q2", 2)];
        let grade = grade_quiz(video_id, &questions, &[answer("q2", 2), answer("q1", 1)]).unwrap();
        assert_eq!(grade.total, 2);
        assert_eq!(grade.correct, 1);
        assert_eq!(grade.score_percent(), 50.0);
        assert_eq!(grade.attempts[0].question_id, "q2");
        assert!(grade.attempts[0].is_correct);
        assert_eq!(grade.attempts[1].source, AttemptSource::Quiz);
    }

    #[test]
    fn test_rejects_bad_submissions() {
        let video_id = Uuid::new_v4();
        let questions = vec![question("q1", 0)];
        assert_eq!(grade_quiz(video_id, &questions, &[]).unwrap_err(), QuizError::Empty);
        assert_eq!(
            grade_quiz(video_id, &questions, &[answer("nope", 0)]).unwrap_err(),
            QuizError::UnknownQuestion("nope".to_string())
        );
        assert!(matches!(
            grade_quiz(video_id, &questions, &[answer("q1", 3)]),
            Err(QuizError::AnswerOutOfRange { .. })
        ));
        assert_eq!(
            grade_quiz(video_id, &questions, &[answer("q1", 0), answer("q1", 1)]).unwrap_err(),
            QuizError::Duplicate("q1".to_string())
        );
    }
}
