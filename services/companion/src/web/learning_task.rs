//! services/companion/src/web/learning_task.rs
//!
//! Applies one client message to a learning session: drives the flashcard schedule from
//! playback time, pauses the player whenever a card appears, records answers, and
//! announces the quiz once the video has been fully worked through.

use crate::web::{
    protocol::{ClientMessage, FlashcardPayload, Outbox, ServerMessage},
    state::{AppState, SessionState},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use video_learning_core::{
    domain::{Attempt, AttemptSource},
    media::PlayerEvent,
    scheduler::{ModalState, ScheduleEvent},
};

pub(crate) fn send(outbox: &Outbox, msg: ServerMessage) {
    if outbox.send(msg).is_err() {
        debug!("Client outbox closed; dropping message.");
    }
}

/// Handles a single message from the player UI.
pub async fn apply_client_message(
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    outbox: &Outbox,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::TimeUpdate { current_time, duration } => {
            let mut session = session_state_lock.lock().await;
            session.player.record_time(current_time);
            match session.schedule.on_time_update(current_time, duration) {
                Some(ScheduleEvent::FlashcardDue(card)) => {
                    info!("Flashcard {} due at {:.1}s", card.id, current_time);
                    let pause = session.player.force_pause();
                    send(outbox, ServerMessage::Player { command: pause.into() });
                    send(outbox, ServerMessage::ShowFlashcard { flashcard: FlashcardPayload::from(&card) });
                }
                Some(ScheduleEvent::MissedQueueOpened { card, total }) => {
                    info!("Showing {} missed flashcards", total);
                    let pause = session.player.force_pause();
                    send(outbox, ServerMessage::Player { command: pause.into() });
                    send(
                        outbox,
                        ServerMessage::ShowMissedFlashcard {
                            flashcard: FlashcardPayload::from(&card),
                            index: 0,
                            total,
                        },
                    );
                }
                None => {}
            }
        }

        ClientMessage::Player { event } => {
            let event = PlayerEvent::from(event);
            let mut session = session_state_lock.lock().await;
            if let Err(e) = session.player.handle(event) {
                warn!("{}", e);
                return;
            }
            // The modal keeps playback paused until it closes.
            if event == PlayerEvent::Play && session.schedule.modal_open() {
                let pause = session.player.force_pause();
                send(outbox, ServerMessage::Player { command: pause.into() });
            }
        }

        ClientMessage::AnswerFlashcard { question_id, selected_answer } => {
            let (attempt, outcome) = {
                let mut session = session_state_lock.lock().await;
                match session.schedule.answer(&question_id, selected_answer) {
                    Ok(outcome) => {
                        let attempt = Attempt {
                            video_id: session.video_id,
                            question_id: outcome.question_id.clone(),
                            selected_answer,
                            is_correct: outcome.correct,
                            source: AttemptSource::Flashcard,
                        };
                        (attempt, outcome)
                    }
                    Err(e) => {
                        warn!("Rejected flashcard answer: {}", e);
                        send(outbox, ServerMessage::error(e.to_string()));
                        return;
                    }
                }
            };

            let next = outcome.next.clone();
            send(outbox, outcome.into());

            // The answer stands locally even when the backend does not take it.
            if let Err(e) = app_state.questions.record_attempt(&attempt).await {
                warn!("Failed to record attempt for question {}: {:?}", attempt.question_id, e);
            }

            send_modal_state(outbox, next);
            let mut session = session_state_lock.lock().await;
            announce_quiz_if_ready(&mut session, outbox);
        }

        ClientMessage::SkipMissed => {
            let mut session = session_state_lock.lock().await;
            match session.schedule.skip_missed() {
                Ok(next) => send_modal_state(outbox, next),
                Err(e) => send(outbox, ServerMessage::error(e.to_string())),
            }
            announce_quiz_if_ready(&mut session, outbox);
        }

        ClientMessage::SkipRemainingMissed => {
            let mut session = session_state_lock.lock().await;
            match session.schedule.skip_remaining_missed() {
                Ok(next) => send_modal_state(outbox, next),
                Err(e) => send(outbox, ServerMessage::error(e.to_string())),
            }
            announce_quiz_if_ready(&mut session, outbox);
        }

        ClientMessage::CloseFlashcard => {
            let mut session = session_state_lock.lock().await;
            let next = session.schedule.dismiss_active();
            send_modal_state(outbox, next);
            announce_quiz_if_ready(&mut session, outbox);
        }

        ClientMessage::ReviewSegment { question_id } => {
            let mut session = session_state_lock.lock().await;
            let start = session
                .schedule
                .flashcards()
                .iter()
                .find(|fc| fc.question.id == question_id)
                .map(|fc| fc.question.segment.start_time);
            match start {
                Some(start) => {
                    let command = session.player.seek(start);
                    send(outbox, ServerMessage::Player { command: command.into() });
                }
                None => send(outbox, ServerMessage::error(format!("Unknown question {}", question_id))),
            }
        }

        ClientMessage::SetFlashcardsEnabled { enabled } => {
            let mut session = session_state_lock.lock().await;
            session.schedule.set_enabled(enabled);
            info!("Flashcards {} for session {}", if enabled { "enabled" } else { "disabled" }, session.session_id);
        }

        ClientMessage::Init { .. } => {
            warn!("Received subsequent Init message, which is ignored.");
        }
    }
}

fn send_modal_state(outbox: &Outbox, state: ModalState) {
    match state {
        ModalState::Closed => send(outbox, ServerMessage::ModalClosed),
        ModalState::Missed { card, index, total } => send(
            outbox,
            ServerMessage::ShowMissedFlashcard {
                flashcard: FlashcardPayload::from(&card),
                index,
                total,
            },
        ),
    }
}

/// Sends `QuizAvailable` once per session, the first time the quiz becomes reachable.
pub(crate) fn announce_quiz_if_ready(session: &mut SessionState, outbox: &Outbox) {
    if !session.quiz_announced && session.quiz_ready() {
        session.quiz_announced = true;
        info!("Quiz unlocked for video {}", session.video_id);
        send(outbox, ServerMessage::QuizAvailable { video_id: session.video_id });
    }
}
