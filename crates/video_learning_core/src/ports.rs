//! crates/video_learning_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the REST backend and the hosted database.

use crate::credits::CustomCreditAmount;
use crate::domain::{
    Activity, Attempt, CheckoutSession, CreditBalance, CreditPackage, CreditTransaction,
    FlashCard, Note, Project, ProjectChange, Question, Quiz, Report, StatusReport,
    SubscriptionPlan, Video,
};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The backend refused the request because the account lacks credits (HTTP 402).
    #[error("Payment required: {0}")]
    PaymentRequired(String),
    #[error("Invalid request: {0}")]
    Invalid(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

pub type ProjectChangeStream = Pin<Box<dyn Stream<Item = PortResult<ProjectChange>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Direct access to the hosted database tables.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Projects ---
    async fn list_projects(&self, user_id: Uuid) -> PortResult<Vec<Project>>;

    async fn create_project(
        &self,
        user_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> PortResult<Project>;

    async fn get_project(&self, project_id: Uuid) -> PortResult<Project>;

    async fn delete_project(&self, project_id: Uuid) -> PortResult<()>;

    // --- Videos ---
    async fn list_videos(&self, project_id: Uuid) -> PortResult<Vec<Video>>;

    async fn get_video(&self, video_id: Uuid) -> PortResult<Video>;

    // --- Activity Log ---
    async fn log_activity(&self, user_id: Uuid, kind: &str, description: &str) -> PortResult<()>;

    async fn recent_activity(&self, user_id: Uuid, limit: i64) -> PortResult<Vec<Activity>>;

    /// Streams insert/update/delete notifications for the user's projects.
    async fn subscribe_project_changes(&self, user_id: Uuid) -> PortResult<ProjectChangeStream>;
}

#[async_trait]
pub trait VideoProcessingService: Send + Sync {
    /// Asks the backend to download, transcribe and generate questions for a video.
    async fn process_video(&self, project_id: Uuid, url: &str) -> PortResult<Video>;

    async fn get_processing_status(&self, video_id: Uuid) -> PortResult<StatusReport>;
}

#[async_trait]
pub trait QuestionService: Send + Sync {
    async fn get_flashcards(&self, video_id: Uuid) -> PortResult<Vec<FlashCard>>;

    async fn get_questions(&self, video_id: Uuid) -> PortResult<Vec<Question>>;

    async fn generate_quiz(&self, video_id: Uuid, num_questions: u32) -> PortResult<Quiz>;

    async fn record_attempt(&self, attempt: &Attempt) -> PortResult<()>;

    /// Must only be called once every attempt for the video has been recorded.
    async fn generate_report(&self, video_id: Uuid) -> PortResult<Report>;
}

#[async_trait]
pub trait NotesService: Send + Sync {
    async fn generate_notes(&self, video_id: Uuid) -> PortResult<Note>;

    async fn get_notes(&self, video_id: Uuid) -> PortResult<Note>;

    async fn update_notes(&self, note_id: Uuid, content: &str) -> PortResult<Note>;
}

#[async_trait]
pub trait BillingService: Send + Sync {
    async fn list_plans(&self) -> PortResult<Vec<SubscriptionPlan>>;

    async fn create_subscription_checkout(&self, plan_id: &str) -> PortResult<CheckoutSession>;

    async fn list_credit_packages(&self) -> PortResult<Vec<CreditPackage>>;

    async fn purchase_package(&self, package_id: &str) -> PortResult<CheckoutSession>;

    async fn purchase_custom_amount(&self, amount: CustomCreditAmount) -> PortResult<CheckoutSession>;

    async fn credit_history(&self) -> PortResult<Vec<CreditTransaction>>;

    async fn credit_balance(&self) -> PortResult<CreditBalance>;
}
