//! Per-session server-push event stream over a websocket.
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    http::StatusCode,
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::service::State;
use roast_protocol::{ServerEvent, SessionId};

/// Query string for opening an event stream.
#[derive(Debug, Deserialize)]
pub struct EventStreamQuery {
    /// The session whose events to stream.
    pub session_id: SessionId,
}

/// Upgrade to the event stream of a session.
///
/// Opening a stream with an unknown session id fails; losing the
/// stream ends the session.
pub async fn upgrade(
    Extension(state): Extension<State>,
    Query(query): Query<EventStreamQuery>,
    ws: WebSocketUpgrade,
) -> std::result::Result<Response, StatusCode> {
    tracing::debug!(
        session_id = %query.session_id,
        "event stream request"
    );

    let mut writer = state.write().await;
    let Ok(events) = writer.attach_event_sink(query.session_id)
    else {
        return Err(StatusCode::NOT_FOUND);
    };
    drop(writer);

    let session_id = query.session_id;
    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, state, session_id, events)
    }))
}

async fn handle_socket(
    socket: WebSocket,
    state: State,
    session_id: SessionId,
    events: mpsc::Receiver<ServerEvent>,
) {
    let (writer, reader) = socket.split();
    tokio::spawn(write(writer, state.clone(), session_id, events));
    tokio::spawn(read(reader, state, session_id));
}

async fn read(
    mut receiver: SplitStream<WebSocket>,
    state: State,
    session_id: SessionId,
) {
    while let Some(message) = receiver.next().await {
        match message {
            // The stream is one-way; only close frames matter.
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    lost_stream(state, session_id).await;
}

async fn write(
    mut sender: SplitSink<WebSocket, Message>,
    state: State,
    session_id: SessionId,
    mut events: mpsc::Receiver<ServerEvent>,
) {
    while let Some(event) = events.recv().await {
        let encoded = match serde_json::to_string(&event) {
            Ok(encoded) => encoded,
            Err(error) => {
                tracing::warn!(%error, "could not encode event");
                continue;
            }
        };
        if sender.send(Message::Text(encoded)).await.is_err() {
            lost_stream(state, session_id).await;
            return;
        }
    }
}

/// The subscriber is gone; the session is over.
async fn lost_stream(state: State, session_id: SessionId) {
    tracing::debug!(session_id = %session_id, "event stream lost");
    let mut writer = state.write().await;
    writer.end_session(session_id);
}
