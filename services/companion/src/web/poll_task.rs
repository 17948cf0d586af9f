//! services/companion/src/web/poll_task.rs
//!
//! The background worker that follows server-side video processing for one session.
//!
//! While processing runs it polls the status endpoint on a fixed interval, forwards the
//! status to the client, and re-fetches the flashcard list whenever batch generation is
//! active. It stops on a terminal status or when the session's token is cancelled.

use crate::web::{
    learning_task::{announce_quiz_if_ready, send},
    protocol::{Outbox, ServerMessage},
    state::{AppState, SessionState},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::Mutex, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use video_learning_core::polling::PollDecision;

/// Polls until processing finishes or the session goes away.
pub async fn poll_process(
    app_state: Arc<AppState>,
    session_state_lock: Arc<Mutex<SessionState>>,
    outbox: Outbox,
    cancellation_token: CancellationToken,
    period: Duration,
) {
    info!("Status poller started with a {:?} interval.", period);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The session was just initialised with a fresh status; the first poll is one period away.
    interval.reset();

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Status poller cancelled.");
                return;
            }
            _ = interval.tick() => {
                if poll_once(&app_state, &session_state_lock, &outbox).await {
                    info!("Processing reached a terminal status; status poller finished.");
                    return;
                }
            }
        }
    }
}

/// Runs a single poll tick. Returns `true` once polling should stop.
///
/// Failures are logged and otherwise ignored; the next tick simply tries again.
pub async fn poll_once(
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    outbox: &Outbox,
) -> bool {
    let (video_id, previous) = {
        let session = session_state_lock.lock().await;
        (session.video_id, session.status.clone())
    };

    let report = match app_state.processing.get_processing_status(video_id).await {
        Ok(report) => report,
        Err(e) => {
            warn!("Status poll for video {} failed: {:?}", video_id, e);
            return false;
        }
    };
    let decision = PollDecision::evaluate(previous.as_ref(), &report);
    debug!("Video {} is {} ({:?})", video_id, report.status, decision);

    send(
        outbox,
        ServerMessage::ProcessingStatus {
            status: report.status.to_string(),
            batch_current: report.batch_current,
            batch_total: report.batch_total,
            progress: report.progress,
        },
    );
    if let Some(error) = &report.error {
        send(outbox, ServerMessage::error(format!("Processing failed: {}", error)));
    }

    let flashcards = if decision.refresh_flashcards {
        match app_state.questions.get_flashcards(video_id).await {
            Ok(flashcards) => Some(flashcards),
            Err(e) => {
                warn!("Failed to refresh flashcards for video {}: {:?}", video_id, e);
                None
            }
        }
    } else {
        None
    };

    let mut session = session_state_lock.lock().await;
    session.status = Some(report.status);
    session.batch_current = report.batch_current;
    session.batch_total = report.batch_total;
    if let Some(flashcards) = flashcards {
        let missed = session.schedule.replace_flashcards(flashcards);
        let total = session.schedule.flashcards().len();
        send(outbox, ServerMessage::FlashcardsUpdated { total, missed });
    }
    announce_quiz_if_ready(&mut session, outbox);

    decision.stop
}
