//! services/companion/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a learning-session WebSocket.
//! It attaches the connection to a pending session, starts the status poller, and
//! hands every client message to the learning task.

use crate::web::{
    learning_task::{apply_client_message, send},
    poll_task::poll_process,
    protocol::{ClientMessage, Outbox, ServerMessage, SourcePayload},
    state::{AppState, SessionState},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{stream::StreamExt, SinkExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;
use video_learning_core::ports::PortError;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    info!("New WebSocket connection established for user: {}", user_id);

    let (mut sink, mut receiver) = socket.split();

    // A single writer owns the sink; everyone else talks to it through the outbox.
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                warn!("Failed to send message; client is gone.");
                break;
            }
        }
    });

    // --- 1. Initialization Phase ---
    let Some(session_state_lock) = init_session(&mut receiver, &app_state, user_id, &outbox).await else {
        drop(outbox);
        let _ = writer.await;
        return;
    };

    let token = {
        let session = session_state_lock.lock().await;
        if !session.processing_finished() {
            let app_state = app_state.clone();
            let session_state_lock = session_state_lock.clone();
            let outbox = outbox.clone();
            let token = session.cancellation_token.clone();
            let period = app_state.config.poll_interval;
            tokio::spawn(async move {
                poll_process(app_state, session_state_lock, outbox, token, period).await;
            });
        }
        session.cancellation_token.clone()
    };

    // --- 2. Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    apply_client_message(&app_state, &session_state_lock, &outbox, client_msg).await;
                }
                Err(e) => {
                    warn!("Failed to deserialize client message: {}", e);
                    send(&outbox, ServerMessage::error("Unrecognised message."));
                }
            },
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- 3. Cleanup ---
    token.cancel();
    drop(outbox);
    writer.abort();
    info!("WebSocket connection closed.");
}

/// Why a connection could not be attached to a session. The display text is what the
/// client is told.
#[derive(Debug, Error)]
pub(crate) enum SessionInitError {
    #[error("Expected an init message.")]
    NotInit,
    #[error("Unauthorized: Session does not belong to this user.")]
    Unclaimed(Uuid),
    #[error("Failed to load session data.")]
    Load(#[source] PortError),
}

/// Waits for the `Init` message and builds the session state. Returns `None` when the
/// connection should be closed.
async fn init_session(
    receiver: &mut futures::stream::SplitStream<WebSocket>,
    app_state: &Arc<AppState>,
    user_id: Uuid,
    outbox: &Outbox,
) -> Option<Arc<Mutex<SessionState>>> {
    let Some(Ok(Message::Text(init_json))) = receiver.next().await else {
        error!("Client disconnected before sending Init message.");
        return None;
    };

    match open_session(app_state, user_id, init_json.as_str()).await {
        Ok(state) => {
            let status = state.status.as_ref().map(|s| s.to_string()).unwrap_or_default();
            send(
                outbox,
                ServerMessage::SessionInitialized {
                    session_id: state.session_id,
                    video_id: state.video_id,
                    source: SourcePayload::from(state.player.source()),
                    flashcard_count: state.schedule.flashcards().len(),
                    status: status.clone(),
                },
            );
            send(
                outbox,
                ServerMessage::ProcessingStatus {
                    status,
                    batch_current: state.batch_current,
                    batch_total: state.batch_total,
                    progress: None,
                },
            );
            Some(Arc::new(Mutex::new(state)))
        }
        Err(e) => {
            send(outbox, ServerMessage::error(e.to_string()));
            None
        }
    }
}

/// Parses the first client message, claims the session it names, and loads its state.
/// A claimed session whose state fails to load goes back to the registry.
pub(crate) async fn open_session(
    app_state: &Arc<AppState>,
    user_id: Uuid,
    init_json: &str,
) -> Result<SessionState, SessionInitError> {
    let session_id = match serde_json::from_str::<ClientMessage>(init_json) {
        Ok(ClientMessage::Init { session_id }) => session_id,
        _ => {
            error!("First message was not a valid Init message.");
            return Err(SessionInitError::NotInit);
        }
    };
    info!("Initializing session with ID: {}", session_id);

    let Some(pending) = app_state.sessions.claim(session_id, user_id).await else {
        error!("Session {} is unknown or does not belong to user {}", session_id, user_id);
        return Err(SessionInitError::Unclaimed(session_id));
    };

    match SessionState::new(app_state.clone(), session_id, pending.clone()).await {
        Ok(state) => Ok(state),
        Err(e) => {
            error!("Failed to initialize session state: {:?}", e);
            app_state.sessions.restore(session_id, pending).await;
            Err(SessionInitError::Load(e))
        }
    }
}
