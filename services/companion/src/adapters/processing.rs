//! services/companion/src/adapters/processing.rs
//!
//! The REST adapter for video processing. It implements the `VideoProcessingService`
//! port from the `core` crate.

use crate::adapters::http::BackendClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use video_learning_core::{
    domain::{ProcessingStatus, StatusReport, Video},
    ports::{PortResult, VideoProcessingService},
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct RestProcessingAdapter {
    client: BackendClient,
}

impl RestProcessingAdapter {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Serialize)]
struct ProcessVideoRequest<'a> {
    project_id: Uuid,
    url: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct VideoRecord {
    id: Uuid,
    project_id: Uuid,
    #[serde(alias = "youtube_url")]
    url: String,
    title: Option<String>,
    duration: Option<f64>,
    #[serde(default = "default_status")]
    processing_status: String,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
}

fn default_status() -> String {
    "pending".to_string()
}

impl VideoRecord {
    pub(crate) fn to_domain(self) -> Video {
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

#[derive(Deserialize)]
pub(crate) struct StatusRecord {
    #[serde(alias = "processing_status")]
    status: String,
    #[serde(default)]
    batch_current: Option<u32>,
    #[serde(default)]
    batch_total: Option<u32>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default, alias = "error_message")]
    error: Option<String>,
}

impl StatusRecord {
    pub(crate) fn to_domain(self) -> StatusReport {
        StatusReport {
            status: ProcessingStatus::parse(&self.status),
            batch_current: self.batch_current.unwrap_or(0),
            batch_total: self.batch_total.unwrap_or(0),
            progress: self.progress,
            error: self.error,
        }
    }
}

//=========================================================================================
// `VideoProcessingService` Trait Implementation
//=========================================================================================

#[async_trait]
impl VideoProcessingService for RestProcessingAdapter {
    async fn process_video(&self, project_id: Uuid, url: &str) -> PortResult<Video> {
        let record: VideoRecord = self
            .client
            .post_json("/api/videos/process", &ProcessVideoRequest { project_id, url })
            .await?;
        Ok(record.to_domain())
    }

    async fn get_processing_status(&self, video_id: Uuid) -> PortResult<StatusReport> {
        let record: StatusRecord = self
            .client
            .get_json(&format!("/api/videos/{}/status", video_id))
            .await?;
        Ok(record.to_domain())
    }
}
