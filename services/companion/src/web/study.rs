//! services/companion/src/web/study.rs
//!
//! REST handlers for studying a single video: processing status, quizzes and notes.

use crate::web::{
    quiz_task::{submit_quiz, QuizSubmitError},
    rest::{authorize_video, port_error_response, ApiResult},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use video_learning_core::{
    domain::{Note, Question, Quiz, Report, StatusReport},
    quiz::QuizAnswer,
};

const DEFAULT_QUIZ_QUESTIONS: u32 = 10;
const MAX_QUIZ_QUESTIONS: u32 = 50;

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Serialize, ToSchema, Debug)]
pub struct StatusResponse {
    pub status: String,
    pub batch_current: u32,
    pub batch_total: u32,
    pub progress: Option<f64>,
    pub error: Option<String>,
    pub finished: bool,
}

impl From<StatusReport> for StatusResponse {
    fn from(r: StatusReport) -> Self {
        Self {
            finished: r.status.is_terminal(),
            status: r.status.to_string(),
            batch_current: r.batch_current,
            batch_total: r.batch_total,
            progress: r.progress,
            error: r.error,
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
pub struct GenerateQuizRequest {
    pub num_questions: Option<u32>,
}

/// A quiz question without its answer.
#[derive(Serialize, ToSchema, Debug)]
pub struct QuizQuestionResponse {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub difficulty: String,
}

impl From<Question> for QuizQuestionResponse {
    fn from(q: Question) -> Self {
        Self {
            difficulty: q.difficulty.as_str().to_string(),
            id: q.id,
            question: q.text,
            options: q.options,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct QuizResponse {
    pub id: String,
    pub video_id: Uuid,
    pub questions: Vec<QuizQuestionResponse>,
}

impl From<Quiz> for QuizResponse {
    fn from(q: Quiz) -> Self {
        Self {
            id: q.id,
            video_id: q.video_id,
            questions: q.questions.into_iter().map(QuizQuestionResponse::from).collect(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct QuizAnswerRequest {
    pub question_id: String,
    pub selected_answer: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitQuizRequest {
    pub answers: Vec<QuizAnswerRequest>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ReportResponse {
    pub video_id: Uuid,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub accuracy: f64,
    pub summary: Option<String>,
    pub recommendations: Vec<String>,
}

impl From<Report> for ReportResponse {
    fn from(r: Report) -> Self {
        Self {
            video_id: r.video_id,
            total_questions: r.total_questions,
            correct_answers: r.correct_answers,
            accuracy: r.accuracy,
            summary: r.summary,
            recommendations: r.recommendations,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct NoteResponse {
    pub id: Uuid,
    pub video_id: Uuid,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

impl From<Note> for NoteResponse {
    fn from(n: Note) -> Self {
        Self {
            id: n.id,
            video_id: n.video_id,
            content: n.content,
            updated_at: n.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateNoteRequest {
    pub content: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/videos/{video_id}/status",
    responses(
        (status = 200, description = "Latest processing status", body = StatusResponse),
        (status = 404, description = "Video not found"),
    ),
    params(
        ("video_id" = Uuid, Path, description = "The video."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn video_status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(video_id): Path<Uuid>,
) -> ApiResult<Json<StatusResponse>> {
    authorize_video(&app_state, user_id, video_id).await?;
    let report = app_state
        .processing
        .get_processing_status(video_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(report.into()))
}

#[utoipa::path(
    post,
    path = "/videos/{video_id}/quiz",
    request_body = GenerateQuizRequest,
    responses(
        (status = 200, description = "A freshly generated quiz", body = QuizResponse),
        (status = 400, description = "Question count out of range"),
        (status = 402, description = "Insufficient credits"),
    ),
    params(
        ("video_id" = Uuid, Path, description = "The video to quiz on."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn generate_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(video_id): Path<Uuid>,
    Json(body): Json<GenerateQuizRequest>,
) -> ApiResult<Json<QuizResponse>> {
    let num_questions = body.num_questions.unwrap_or(DEFAULT_QUIZ_QUESTIONS);
    if num_questions == 0 || num_questions > MAX_QUIZ_QUESTIONS {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("A quiz has between 1 and {} questions", MAX_QUIZ_QUESTIONS),
        ));
    }
    authorize_video(&app_state, user_id, video_id).await?;

    let quiz = app_state
        .questions
        .generate_quiz(video_id, num_questions)
        .await
        .map_err(port_error_response)?;
    info!("Generated quiz {} with {} questions", quiz.id, quiz.questions.len());
    Ok(Json(quiz.into()))
}

/// Submit quiz answers and receive the performance report.
#[utoipa::path(
    post,
    path = "/videos/{video_id}/quiz/submit",
    request_body = SubmitQuizRequest,
    responses(
        (status = 200, description = "The report computed from the recorded attempts", body = ReportResponse),
        (status = 400, description = "Empty, duplicate or unknown answers"),
    ),
    params(
        ("video_id" = Uuid, Path, description = "The video the quiz belongs to."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn submit_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(video_id): Path<Uuid>,
    Json(body): Json<SubmitQuizRequest>,
) -> ApiResult<Json<ReportResponse>> {
    authorize_video(&app_state, user_id, video_id).await?;
    let answers = body
        .answers
        .into_iter()
        .map(|a| QuizAnswer {
            question_id: a.question_id,
            selected_answer: a.selected_answer,
        })
        .collect();

    match submit_quiz(app_state, user_id, video_id, answers).await {
        Ok(report) => Ok(Json(report.into())),
        Err(QuizSubmitError::Quiz(e)) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(QuizSubmitError::Port(e)) => Err(port_error_response(e)),
    }
}

#[utoipa::path(
    get,
    path = "/videos/{video_id}/notes",
    responses(
        (status = 200, description = "The video's notes", body = NoteResponse),
        (status = 404, description = "No notes generated yet"),
    ),
    params(
        ("video_id" = Uuid, Path, description = "The video."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_notes_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(video_id): Path<Uuid>,
) -> ApiResult<Json<NoteResponse>> {
    authorize_video(&app_state, user_id, video_id).await?;
    let note = app_state.notes.get_notes(video_id).await.map_err(port_error_response)?;
    Ok(Json(note.into()))
}

#[utoipa::path(
    post,
    path = "/videos/{video_id}/notes",
    responses(
        (status = 201, description = "Notes generated", body = NoteResponse),
        (status = 402, description = "Insufficient credits"),
    ),
    params(
        ("video_id" = Uuid, Path, description = "The video."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn generate_notes_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(video_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<NoteResponse>)> {
    let video = authorize_video(&app_state, user_id, video_id).await?;
    let note = app_state.notes.generate_notes(video_id).await.map_err(port_error_response)?;

    let description = format!("Generated notes for {}", video.title.as_deref().unwrap_or(&video.url));
    if let Err(e) = app_state.db.log_activity(user_id, "notes_generated", &description).await {
        warn!("Failed to log activity: {:?}", e);
    }
    Ok((StatusCode::CREATED, Json(note.into())))
}

#[utoipa::path(
    put,
    path = "/videos/{video_id}/notes/{note_id}",
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Notes saved", body = NoteResponse),
        (status = 404, description = "Note not found"),
    ),
    params(
        ("video_id" = Uuid, Path, description = "The video."),
        ("note_id" = Uuid, Path, description = "The note to overwrite."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn update_notes_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((video_id, note_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateNoteRequest>,
) -> ApiResult<Json<NoteResponse>> {
    authorize_video(&app_state, user_id, video_id).await?;
    let note = app_state
        .notes
        .update_notes(note_id, &body.content)
        .await
        .map_err(port_error_response)?;
    Ok(Json(note.into()))
}
