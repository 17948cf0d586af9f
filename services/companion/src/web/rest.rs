//! services/companion/src/web/rest.rs
//!
//! Contains the Axum handlers for sessions, projects, videos and activity, the shared
//! error mapping, and the master definition for the OpenAPI specification.

use crate::web::{
    billing, study,
    state::{AppState, PendingSession},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    Extension,
};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;
use video_learning_core::{
    credits::estimate_processing_credits,
    domain::{Activity, Project, ProjectChange, Video},
    media::validate_youtube_url,
    ports::PortError,
};

pub type ApiResult<T> = Result<T, (StatusCode, String)>;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session_handler,
        list_projects_handler,
        create_project_handler,
        delete_project_handler,
        list_videos_handler,
        add_video_handler,
        list_activity_handler,
        project_events_handler,
        study::video_status_handler,
        study::generate_quiz_handler,
        study::submit_quiz_handler,
        study::get_notes_handler,
        study::generate_notes_handler,
        study::update_notes_handler,
        billing::list_plans_handler,
        billing::subscribe_handler,
        billing::list_packages_handler,
        billing::purchase_package_handler,
        billing::purchase_custom_handler,
        billing::credit_history_handler,
        billing::credit_balance_handler,
    ),
    components(schemas(
        CreateSessionRequest,
        CreateSessionResponse,
        ProjectResponse,
        CreateProjectRequest,
        VideoResponse,
        AddVideoRequest,
        ActivityResponse,
        ProjectChangeEvent,
        study::StatusResponse,
        study::GenerateQuizRequest,
        study::QuizResponse,
        study::QuizQuestionResponse,
        study::SubmitQuizRequest,
        study::QuizAnswerRequest,
        study::ReportResponse,
        study::NoteResponse,
        study::UpdateNoteRequest,
        billing::PlanResponse,
        billing::PackageResponse,
        billing::CheckoutResponse,
        billing::SubscribeRequest,
        billing::PurchasePackageRequest,
        billing::PurchaseCustomRequest,
        billing::TransactionResponse,
        billing::BalanceResponse,
    )),
    tags(
        (name = "Video Learning Companion", description = "Projects, videos, study sessions and credits for the video learning app.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Helpers
//=========================================================================================

/// Turns a port failure into the status and message the client sees.
pub fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {}", what)),
        PortError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not signed in to the backend.".to_string()),
        PortError::PaymentRequired(msg) => {
            warn!("Backend refused a request for lack of credits: {}", msg);
            (
                StatusCode::PAYMENT_REQUIRED,
                "Insufficient credits. Purchase more credits to continue.".to_string(),
            )
        }
        PortError::Unexpected(msg) => {
            error!("Backend call failed: {}", msg);
            (StatusCode::BAD_GATEWAY, "The learning backend could not complete the request.".to_string())
        }
    }
}

/// Loads a project and checks it belongs to the caller. Foreign projects look missing.
pub async fn authorize_project(app_state: &AppState, user_id: Uuid, project_id: Uuid) -> ApiResult<Project> {
    let project = app_state.db.get_project(project_id).await.map_err(port_error_response)?;
    if project.user_id != user_id {
        warn!("User {} tried to access project {}", user_id, project_id);
        return Err((StatusCode::NOT_FOUND, format!("Not found: Project {}", project_id)));
    }
    Ok(project)
}

/// Loads a video and checks the project it belongs to is the caller's.
pub async fn authorize_video(app_state: &AppState, user_id: Uuid, video_id: Uuid) -> ApiResult<Video> {
    let video = app_state.db.get_video(video_id).await.map_err(port_error_response)?;
    authorize_project(app_state, user_id, video.project_id)
        .await
        .map_err(|_| (StatusCode::NOT_FOUND, format!("Not found: Video {}", video_id)))?;
    Ok(video)
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub video_id: Uuid,
}

/// The response payload sent after successfully creating a session.
#[derive(Serialize, ToSchema, Debug)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub video_id: Uuid,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Project> for ProjectResponse {
    fn from(p: Project) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            created_at: p.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct VideoResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub processing_status: String,
    /// Credits the backend will charge to process this video, when the length is known.
    pub estimated_credits: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl From<Video> for VideoResponse {
    fn from(v: Video) -> Self {
        Self {
            id: v.id,
            project_id: v.project_id,
            estimated_credits: v.duration.map(estimate_processing_credits),
            url: v.url,
            title: v.title,
            duration: v.duration,
            processing_status: v.processing_status.to_string(),
            created_at: v.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AddVideoRequest {
    pub url: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ActivityResponse {
    pub id: Uuid,
    pub kind: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<Activity> for ActivityResponse {
    fn from(a: Activity) -> Self {
        Self {
            id: a.id,
            kind: a.kind,
            description: a.description,
            created_at: a.created_at,
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    /// Defaults to 20, capped at 100.
    pub limit: Option<i64>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ProjectChangeEvent {
    pub operation: String,
    pub project_id: Uuid,
}

impl From<ProjectChange> for ProjectChangeEvent {
    fn from(c: ProjectChange) -> Self {
        Self {
            operation: c.operation,
            project_id: c.project_id,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a learning session for one of the caller's videos.
///
/// The returned id is sent in the `init` message once the `/ws` connection is open.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created successfully", body = CreateSessionResponse),
        (status = 404, description = "Video not found"),
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(body): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<CreateSessionResponse>)> {
    let video = authorize_video(&app_state, user_id, body.video_id).await?;
    let video_id = video.id;
    let session_id = app_state.sessions.register(PendingSession { user_id, video }).await;
    info!("Created learning session {} for video {}", session_id, video_id);
    Ok((StatusCode::CREATED, Json(CreateSessionResponse { session_id, video_id })))
}

#[utoipa::path(
    get,
    path = "/projects",
    responses((status = 200, description = "The caller's projects", body = [ProjectResponse])),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn list_projects_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Vec<ProjectResponse>>> {
    let projects = app_state.db.list_projects(user_id).await.map_err(port_error_response)?;
    Ok(Json(projects.into_iter().map(ProjectResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 400, description = "Empty project name"),
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn create_project_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(body): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectResponse>)> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Project name is required".to_string()));
    }
    let description = body.description.as_deref().map(str::trim).filter(|d| !d.is_empty());

    let project = app_state
        .db
        .create_project(user_id, name, description)
        .await
        .map_err(port_error_response)?;

    let note = format!("Created project \"{}\"", project.name);
    if let Err(e) = app_state.db.log_activity(user_id, "project_created", &note).await {
        warn!("Failed to log activity: {:?}", e);
    }
    Ok((StatusCode::CREATED, Json(project.into())))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}",
    responses(
        (status = 204, description = "Project deleted"),
        (status = 404, description = "Project not found"),
    ),
    params(
        ("project_id" = Uuid, Path, description = "The project to delete."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn delete_project_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let project = authorize_project(&app_state, user_id, project_id).await?;
    app_state.db.delete_project(project_id).await.map_err(port_error_response)?;

    let note = format!("Deleted project \"{}\"", project.name);
    if let Err(e) = app_state.db.log_activity(user_id, "project_deleted", &note).await {
        warn!("Failed to log activity: {:?}", e);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/videos",
    responses(
        (status = 200, description = "Videos in the project", body = [VideoResponse]),
        (status = 404, description = "Project not found"),
    ),
    params(
        ("project_id" = Uuid, Path, description = "The project to list."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_videos_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<VideoResponse>>> {
    authorize_project(&app_state, user_id, project_id).await?;
    let videos = app_state.db.list_videos(project_id).await.map_err(port_error_response)?;
    Ok(Json(videos.into_iter().map(VideoResponse::from).collect()))
}

/// Attach a YouTube video to a project and start processing it.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/videos",
    request_body = AddVideoRequest,
    responses(
        (status = 201, description = "Processing started", body = VideoResponse),
        (status = 400, description = "Not a YouTube URL"),
        (status = 402, description = "Insufficient credits"),
        (status = 404, description = "Project not found"),
    ),
    params(
        ("project_id" = Uuid, Path, description = "The project to add the video to."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn add_video_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(project_id): Path<Uuid>,
    Json(body): Json<AddVideoRequest>,
) -> ApiResult<(StatusCode, Json<VideoResponse>)> {
    // Validation happens before any backend call.
    validate_youtube_url(&body.url).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    authorize_project(&app_state, user_id, project_id).await?;

    let video = app_state
        .processing
        .process_video(project_id, body.url.trim())
        .await
        .map_err(port_error_response)?;
    info!("Video {} submitted for processing", video.id);

    let note = format!("Added video {}", video.title.as_deref().unwrap_or(&video.url));
    if let Err(e) = app_state.db.log_activity(user_id, "video_added", &note).await {
        warn!("Failed to log activity: {:?}", e);
    }
    Ok((StatusCode::CREATED, Json(video.into())))
}

#[utoipa::path(
    get,
    path = "/activity",
    responses((status = 200, description = "Most recent activity first", body = [ActivityResponse])),
    params(
        ActivityQuery,
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_activity_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<Vec<ActivityResponse>>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let activity = app_state
        .db
        .recent_activity(user_id, limit)
        .await
        .map_err(port_error_response)?;
    Ok(Json(activity.into_iter().map(ActivityResponse::from).collect()))
}

/// Server-sent events for changes to the caller's projects.
#[utoipa::path(
    get,
    path = "/projects/events",
    responses((status = 200, description = "A `project_change` event per change", content_type = "text/event-stream", body = ProjectChangeEvent)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn project_events_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let mut changes = app_state
        .db
        .subscribe_project_changes(user_id)
        .await
        .map_err(port_error_response)?;
    info!("User {} subscribed to project changes", user_id);

    let stream = async_stream::stream! {
        while let Some(item) = changes.next().await {
            match item {
                Ok(change) => {
                    yield Event::default()
                        .event("project_change")
                        .json_data(ProjectChangeEvent::from(change));
                }
                Err(e) => warn!("Project change stream error: {:?}", e),
            }
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::test_support::{video, FakeProcessing, FakeQuestions, Fakes};

    fn fakes() -> Fakes {
        Fakes::new(FakeProcessing::default(), FakeQuestions::default())
    }

    #[test]
    fn test_payment_required_is_tailored() {
        let (status, msg) = port_error_response(PortError::PaymentRequired("balance 0".into()));
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert!(msg.contains("Insufficient credits"));

        let (status, _) = port_error_response(PortError::Unexpected("boom".into()));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_add_video_rejects_non_youtube_before_backend() {
        let fakes = fakes();
        let user_id = Uuid::new_v4();
        let project = fakes.db.add_project(user_id);

        let err = add_video_handler(
            State(fakes.app_state()),
            Extension(user_id),
            Path(project.id),
            Json(AddVideoRequest { url: "https://vimeo.com/123".into() }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(fakes.processing.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_video_submits_and_logs() {
        let fakes = fakes();
        let user_id = Uuid::new_v4();
        let project = fakes.db.add_project(user_id);

        let (status, Json(video)) = add_video_handler(
            State(fakes.app_state()),
            Extension(user_id),
            Path(project.id),
            Json(AddVideoRequest { url: " https://youtu.be/dQw4w9WgXcQ ".into() }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(video.processing_status, "pending");
        assert_eq!(video.estimated_credits, Some(10));
        assert_eq!(
            fakes.processing.submitted.lock().unwrap()[0],
            (project.id, "https://youtu.be/dQw4w9WgXcQ".to_string())
        );
        assert_eq!(fakes.db.activity_kinds(), vec!["video_added"]);
    }

    #[tokio::test]
    async fn test_add_video_without_credits_is_402() {
        let fakes = fakes();
        let user_id = Uuid::new_v4();
        let project = fakes.db.add_project(user_id);
        *fakes.processing.reject_with.lock().unwrap() = Some(PortError::PaymentRequired("no credits".into()));

        let err = add_video_handler(
            State(fakes.app_state()),
            Extension(user_id),
            Path(project.id),
            Json(AddVideoRequest { url: "https://youtu.be/dQw4w9WgXcQ".into() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn test_foreign_projects_look_missing() {
        let fakes = fakes();
        let project = fakes.db.add_project(Uuid::new_v4());

        let err = delete_project_handler(State(fakes.app_state()), Extension(Uuid::new_v4()), Path(project.id))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        assert_eq!(fakes.db.projects.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_session_is_claimed_once_by_its_owner() {
        let fakes = fakes();
        let app_state = fakes.app_state();
        let user_id = Uuid::new_v4();
        let project = fakes.db.add_project(user_id);
        let v = video(project.id, "https://youtu.be/dQw4w9WgXcQ");
        let video_id = v.id;
        fakes.db.add_video(v);

        let (status, Json(session)) = create_session_handler(
            State(app_state.clone()),
            Extension(user_id),
            Json(CreateSessionRequest { video_id }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        assert!(app_state.sessions.claim(session.session_id, Uuid::new_v4()).await.is_none());
        assert!(app_state.sessions.claim(session.session_id, user_id).await.is_some());
        assert!(app_state.sessions.claim(session.session_id, user_id).await.is_none());
    }

    #[tokio::test]
    async fn test_create_project_requires_a_name() {
        let fakes = fakes();
        let err = create_project_handler(
            State(fakes.app_state()),
            Extension(Uuid::new_v4()),
            Json(CreateProjectRequest { name: "  ".into(), description: None }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }
}
