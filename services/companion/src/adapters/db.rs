//! services/companion/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It talks to the hosted
//! Postgres database (`projects`, `videos`, `activity_log`) using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{postgres::PgListener, FromRow, PgPool};
use tracing::{info, warn};
use uuid::Uuid;
use video_learning_core::domain::{Activity, ProcessingStatus, Project, ProjectChange, Video};
use video_learning_core::ports::{DatabaseService, PortError, PortResult, ProjectChangeStream};

/// `NOTIFY` channel the database trigger publishes project row changes on.
pub const PROJECT_CHANGES_CHANNEL: &str = "project_changes";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Verifies the connection at startup. The schema itself belongs to the hosted service.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProjectRecord {
    id: Uuid,
    user_id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}
impl ProjectRecord {
    fn to_domain(self) -> Project {
        Project {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct VideoRecord {
    id: Uuid,
    project_id: Uuid,
    url: String,
    title: Option<String>,
    duration: Option<f64>,
    processing_status: String,
    created_at: DateTime<Utc>,
}
impl VideoRecord {
    fn to_domain(self) -> Video {
        Video {
            id: self.id,
            project_id: self.project_id,
            url: self.url,
            title: self.title,
            duration: self.duration,
            processing_status: ProcessingStatus::parse(&self.processing_status),
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ActivityRecord {
    id: Uuid,
    user_id: Uuid,
    activity_type: String,
    description: String,
    created_at: DateTime<Utc>,
}
impl ActivityRecord {
    fn to_domain(self) -> Activity {
        Activity {
            id: self.id,
            user_id: self.user_id,
            kind: self.activity_type,
            description: self.description,
            created_at: self.created_at,
        }
    }
}

/// Payload published by the `project_changes` trigger.
#[derive(Deserialize)]
struct ProjectChangePayload {
    operation: String,
    project_id: Uuid,
    user_id: Uuid,
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn list_projects(&self, user_id: Uuid) -> PortResult<Vec<Project>> {
        let records = sqlx::query_as::<_, ProjectRecord>(
            "SELECT id, user_id, name, description, created_at FROM projects WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_project(
        &self,
        user_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> PortResult<Project> {
        let record = sqlx::query_as::<_, ProjectRecord>(
            "INSERT INTO projects (id, user_id, name, description) VALUES ($1, $2, $3, $4) RETURNING id, user_id, name, description, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn get_project(&self, project_id: Uuid) -> PortResult<Project> {
        let record = sqlx::query_as::<_, ProjectRecord>(
            "SELECT id, user_id, name, description, created_at FROM projects WHERE id = $1",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Project {} not found", project_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_project(&self, project_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Project {} not found", project_id)));
        }
        Ok(())
    }

    async fn list_videos(&self, project_id: Uuid) -> PortResult<Vec<Video>> {
        let records = sqlx::query_as::<_, VideoRecord>(
            "SELECT id, project_id, url, title, duration, processing_status, created_at FROM videos WHERE project_id = $1 ORDER BY created_at ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_video(&self, video_id: Uuid) -> PortResult<Video> {
        let record = sqlx::query_as::<_, VideoRecord>(
            "SELECT id, project_id, url, title, duration, processing_status, created_at FROM videos WHERE id = $1",
        )
        .bind(video_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Video {} not found", video_id)))?;
        Ok(record.to_domain())
    }

    async fn log_activity(&self, user_id: Uuid, kind: &str, description: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO activity_log (id, user_id, activity_type, description) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(kind)
        .bind(description)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn recent_activity(&self, user_id: Uuid, limit: i64) -> PortResult<Vec<Activity>> {
        let records = sqlx::query_as::<_, ActivityRecord>(
            "SELECT id, user_id, activity_type, description, created_at FROM activity_log WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn subscribe_project_changes(&self, user_id: Uuid) -> PortResult<ProjectChangeStream> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        listener
            .listen(PROJECT_CHANGES_CHANNEL)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        info!("Listening for project changes for user {}", user_id);

        let stream = async_stream::stream! {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        match serde_json::from_str::<ProjectChangePayload>(notification.payload()) {
                            Ok(payload) if payload.user_id == user_id => {
                                yield Ok(ProjectChange {
                                    operation: payload.operation,
                                    project_id: payload.project_id,
                                });
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Ignoring malformed project change payload: {}", e),
                        }
                    }
                    Err(e) => {
                        yield Err(PortError::Unexpected(e.to_string()));
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
