//! services/companion/src/web/state.rs
//!
//! Defines the application's shared and session-specific states.

use crate::{auth::AuthContext, config::Config};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::{
    sync::RwLock,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;
use video_learning_core::{
    domain::{ProcessingStatus, Video},
    media::{PlaybackController, VideoSource},
    ports::{
        BillingService, DatabaseService, NotesService, PortResult, QuestionService,
        VideoProcessingService,
    },
    scheduler::FlashcardSchedule,
};

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub processing: Arc<dyn VideoProcessingService>,
    pub questions: Arc<dyn QuestionService>,
    pub notes: Arc<dyn NotesService>,
    pub billing: Arc<dyn BillingService>,
    pub config: Arc<Config>,
    pub auth: AuthContext,
    pub sessions: Arc<SessionRegistry>,
}

/// A learning session created over REST and waiting for its WebSocket to attach.
#[derive(Debug, Clone)]
pub struct PendingSession {
    pub user_id: Uuid,
    pub video: Video,
}

/// How long a session created over REST waits for its WebSocket before it is dropped.
pub const PENDING_SESSION_TTL: Duration = Duration::from_secs(10 * 60);

struct RegisteredSession {
    pending: PendingSession,
    created_at: Instant,
}

/// Sessions live only as long as the viewing they belong to; nothing here is persisted.
pub struct SessionRegistry {
    pending: RwLock<HashMap<Uuid, RegisteredSession>>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_ttl(PENDING_SESSION_TTL)
    }
}

impl SessionRegistry {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Stores a new pending session. Entries older than the TTL are swept first.
    pub async fn register(&self, pending: PendingSession) -> Uuid {
        let session_id = Uuid::new_v4();
        let mut sessions = self.pending.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.created_at.elapsed() < self.ttl);
        let swept = before - sessions.len();
        if swept > 0 {
            debug!("Dropped {} unclaimed sessions", swept);
        }
        sessions.insert(
            session_id,
            RegisteredSession {
                pending,
                created_at: Instant::now(),
            },
        );
        session_id
    }

    /// Hands the session to its WebSocket. A session can only be claimed once, by its owner,
    /// and only before it expires.
    pub async fn claim(&self, session_id: Uuid, user_id: Uuid) -> Option<PendingSession> {
        let mut sessions = self.pending.write().await;
        match sessions.get(&session_id) {
            Some(s) if s.pending.user_id == user_id && s.created_at.elapsed() < self.ttl => {
                sessions.remove(&session_id).map(|s| s.pending)
            }
            _ => None,
        }
    }

    /// Puts back a claimed session whose setup failed, so the client can retry.
    pub async fn restore(&self, session_id: Uuid, pending: PendingSession) {
        self.pending.write().await.insert(
            session_id,
            RegisteredSession {
                pending,
                created_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.pending.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

//=========================================================================================
// SessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single, active learning session.
pub struct SessionState {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub schedule: FlashcardSchedule,
    pub player: PlaybackController,
    pub status: Option<ProcessingStatus>,
    pub batch_current: u32,
    pub batch_total: u32,
    pub quiz_announced: bool,
    /// A token to stop the status poller when the connection goes away.
    pub cancellation_token: CancellationToken,
}

//=========================================================================================
// SessionState Implementation (Constructor)
//=========================================================================================

impl SessionState {
    /// Creates a new `SessionState` by fetching the flashcards and current status from the backend.
    pub async fn new(app_state: Arc<AppState>, session_id: Uuid, pending: PendingSession) -> PortResult<Self> {
        let video_id = pending.video.id;
        let flashcards = app_state.questions.get_flashcards(video_id).await?;
        let report = app_state.processing.get_processing_status(video_id).await?;

        let mut schedule = FlashcardSchedule::new(flashcards);
        if let Some(duration) = pending.video.duration {
            schedule.set_duration(duration);
        }

        Ok(Self {
            session_id,
            user_id: pending.user_id,
            video_id,
            schedule,
            player: PlaybackController::new(VideoSource::parse(&pending.video.url)),
            status: Some(report.status),
            batch_current: report.batch_current,
            batch_total: report.batch_total,
            quiz_announced: false,
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn processing_finished(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.is_terminal())
    }

    /// The quiz unlocks once processing completed and every flashcard was answered or skipped.
    /// A completed video without flashcards unlocks it straight away.
    pub fn quiz_ready(&self) -> bool {
        self.status == Some(ProcessingStatus::Completed) && self.schedule.is_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::test_support::{video, FakeProcessing, FakeQuestions, Fakes};
    use video_learning_core::{domain::StatusReport, ports::PortError};

    fn pending(user_id: Uuid) -> PendingSession {
        PendingSession {
            user_id,
            video: video(Uuid::new_v4(), "https://youtu.be/dQw4w9WgXcQ"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_sweeps_expired_sessions() {
        let registry = SessionRegistry::with_ttl(Duration::from_secs(60));
        let user_id = Uuid::new_v4();
        for _ in 0..100 {
            registry.register(pending(user_id)).await;
        }
        assert_eq!(registry.len().await, 100);

        tokio::time::advance(Duration::from_secs(61)).await;
        let fresh = registry.register(pending(user_id)).await;

        assert_eq!(registry.len().await, 1);
        assert!(registry.claim(fresh, user_id).await.is_some());
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_cannot_be_claimed() {
        let registry = SessionRegistry::with_ttl(Duration::from_secs(60));
        let user_id = Uuid::new_v4();
        let session_id = registry.register(pending(user_id)).await;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(registry.claim(session_id, user_id).await.is_none());
    }

    #[tokio::test]
    async fn test_restored_session_can_be_claimed_again() {
        let fakes = Fakes::new(
            FakeProcessing::with_script(vec![Err(PortError::Unexpected("status unavailable".to_string()))]),
            FakeQuestions::default(),
        );
        let app_state = fakes.app_state();
        let user_id = Uuid::new_v4();
        let session_id = app_state.sessions.register(pending(user_id)).await;

        let claimed = app_state.sessions.claim(session_id, user_id).await.unwrap();
        let built = SessionState::new(app_state.clone(), session_id, claimed.clone()).await;
        assert!(built.is_err());
        app_state.sessions.restore(session_id, claimed).await;

        assert!(app_state.sessions.claim(session_id, Uuid::new_v4()).await.is_none());
        assert!(app_state.sessions.claim(session_id, user_id).await.is_some());
    }

    #[tokio::test]
    async fn test_completed_video_without_flashcards_unlocks_quiz() {
        let fakes = Fakes::new(
            FakeProcessing::with_script(vec![Ok(StatusReport::new(ProcessingStatus::Completed))]),
            FakeQuestions::default(),
        );
        let state = SessionState::new(fakes.app_state(), Uuid::new_v4(), pending(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(state.quiz_ready());
    }

    #[tokio::test]
    async fn test_unfinished_processing_keeps_quiz_locked() {
        let fakes = Fakes::new(
            FakeProcessing::with_script(vec![Ok(StatusReport::new(ProcessingStatus::Transcribing))]),
            FakeQuestions::default(),
        );
        let state = SessionState::new(fakes.app_state(), Uuid::new_v4(), pending(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(!state.quiz_ready());
    }
}
