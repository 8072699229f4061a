//! Manages the WebSocket connection lifecycle for a lesson session.

use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use anyhow::{Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use lesson_core::{
    ChannelPresenter, Cursor, Interpreter, LessonEvent, SessionError, SessionHandle, session,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

type SocketSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Every connection plays its own copy of the lesson. Presenter events and
/// state changes share one channel, so the client sees them in the order they
/// happened. They and the cursor moves are forwarded by a separate task so that
/// a long running command never holds up the outgoing stream.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", &session_id.to_string());
    info!("New WebSocket connection.");

    let (socket_tx, socket_rx) = socket.split();
    let socket_tx: SocketSink = Arc::new(Mutex::new(socket_tx));

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let presenter = Arc::new(ChannelPresenter::new(event_tx, state.config.pacing));
    let forward_state = presenter.state_forwarder();
    let (handle, actor) = session::spawn(Interpreter::new(state.lesson.clone(), presenter));
    let subscription = handle.subscribe(forward_state);

    let initialized = ServerMessage::Initialized {
        session_id,
        title: state.lesson.title.clone(),
        total_steps: state.lesson.script.len(),
    };
    if send_msg(&mut *socket_tx.lock().await, &initialized)
        .await
        .is_err()
    {
        error!("Failed to send Initialized message to client.");
        actor.abort();
        return;
    }

    let forwarder = tokio::spawn(
        forward_updates(
            socket_tx.clone(),
            event_rx,
            handle.cursor_updates(),
        )
        .instrument(tracing::Span::current()),
    );

    if let Err(e) = run_client_loop(socket_rx, &socket_tx, &handle).await {
        error!(error = ?e, "Lesson session terminated with error.");
        let message = ServerMessage::Error {
            message: e.to_string(),
        };
        let _ = send_msg(&mut *socket_tx.lock().await, &message).await;
    }

    // Clean up background tasks on exit.
    subscription.unsubscribe();
    forwarder.abort();
    actor.abort();
    info!("WebSocket connection closed and lesson session terminated.");
}

/// Reads client messages and turns them into session commands.
async fn run_client_loop(
    mut socket_rx: SplitStream<WebSocket>,
    socket_tx: &SocketSink,
    handle: &SessionHandle,
) -> Result<()> {
    while let Some(msg_result) = socket_rx.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    debug!(?msg, "Client message");
                    if let Err(e) = dispatch(handle, msg).await {
                        if matches!(e, SessionError::Closed) {
                            return Err(anyhow!(e));
                        }
                        warn!(error = %e, "Client message rejected");
                        let rejected = ServerMessage::Rejected {
                            message: e.to_string(),
                        };
                        send_msg(&mut *socket_tx.lock().await, &rejected).await?;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed client message.");
                    let rejected = ServerMessage::Rejected {
                        message: format!("Unrecognised message: {}", e),
                    };
                    send_msg(&mut *socket_tx.lock().await, &rejected).await?;
                }
            },
            Ok(Message::Binary(_)) => warn!("Ignoring binary message from client."),
            Ok(Message::Close(_)) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        }
    }
    Ok(())
}

async fn dispatch(handle: &SessionHandle, msg: ClientMessage) -> Result<(), SessionError> {
    match msg {
        ClientMessage::Start => handle.start().await?,
        ClientMessage::Advance => handle.advance().await?,
        ClientMessage::Restart => handle.restart().await?,
        ClientMessage::Reset => handle.reset().await?,
        ClientMessage::Choose { index } => handle.submit_choice(index).await?,
        ClientMessage::Answer { text } => handle.submit_text(&text).await?,
    };
    Ok(())
}

/// Pushes lesson events (state changes included) and cursor moves to the client.
async fn forward_updates(
    socket_tx: SocketSink,
    mut event_rx: mpsc::UnboundedReceiver<LessonEvent>,
    mut cursor_rx: watch::Receiver<Cursor>,
) -> Result<()> {
    loop {
        // A command's events are all queued before its cursor is published.
        tokio::select! {
            biased;
            Some(event) = event_rx.recv() => {
                send_msg(&mut *socket_tx.lock().await, &event).await?;
            },
            Ok(()) = cursor_rx.changed() => {
                let cursor = *cursor_rx.borrow_and_update();
                let moved = ServerMessage::Phase {
                    phase: cursor.phase.name().to_string(),
                    index: cursor.index,
                };
                send_msg(&mut *socket_tx.lock().await, &moved).await?;
            },
            else => break,
        }
    }
    Ok(())
}

/// A helper function to serialize and send a message to the client.
pub(crate) async fn send_msg<T: Serialize>(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: &T,
) -> Result<()> {
    let serialized = serde_json::to_string(msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
