//! services/companion/src/adapters/notes.rs
//!
//! The REST adapter for generated study notes. It implements the `NotesService`
//! port from the `core` crate.

use crate::adapters::http::BackendClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use video_learning_core::{
    domain::Note,
    ports::{NotesService, PortResult},
};

#[derive(Clone)]
pub struct RestNotesAdapter {
    client: BackendClient,
}

impl RestNotesAdapter {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct GenerateNotesRequest {
    video_id: Uuid,
}

#[derive(Serialize)]
struct UpdateNotesRequest<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct NoteRecord {
    id: Uuid,
    video_id: Uuid,
    content: String,
    #[serde(default = "Utc::now", alias = "created_at")]
    updated_at: DateTime<Utc>,
}

impl NoteRecord {
    fn to_domain(self) -> Note {
        Note {
            id: self.id,
            video_id: self.video_id,
            content: self.content,
            updated_at: self.updated_at,
        }
    }
}

#[async_trait]
impl NotesService for RestNotesAdapter {
    /// Generation consumes credits; a 402 from the backend surfaces as `PaymentRequired`.
    async fn generate_notes(&self, video_id: Uuid) -> PortResult<Note> {
        let record: NoteRecord = self
            .client
            .post_json("/api/notes/generate", &GenerateNotesRequest { video_id })
            .await?;
        Ok(record.to_domain())
    }

    async fn get_notes(&self, video_id: Uuid) -> PortResult<Note> {
        let record: NoteRecord = self
            .client
            .get_json(&format!("/api/videos/{}/notes", video_id))
            .await?;
        Ok(record.to_domain())
    }

    async fn update_notes(&self, note_id: Uuid, content: &str) -> PortResult<Note> {
        let record: NoteRecord = self
            .client
            .put_json(&format!("/api/notes/{}", note_id), &UpdateNotesRequest { content })
            .await?;
        Ok(record.to_domain())
    }
}
